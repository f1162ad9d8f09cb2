use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::deployments::vsphere::VsphereOpts;
use crate::deployments::Platform;
use crate::errors::Error;
use crate::version::VersionSpec;

/// Deployment description of one appliance, read from the deployment YAML file.
#[derive(Deserialize, Debug, Clone)]
pub struct ApplianceConfig {
    pub name: String,
    #[serde(rename = "version")]
    pub desired_version: String,
    #[serde(rename = "ip")]
    pub target: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub pivnet_token: String,
    #[serde(default)]
    pub provider: Platform,
    pub opts: VsphereOpts,
}

impl ApplianceConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| Error::ConfigFile {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, Error> {
        let config: ApplianceConfig = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check required keys and the desired version, returning the parsed version.
    pub fn validate(&self) -> Result<VersionSpec, Error> {
        let required = [
            ("name", &self.name),
            ("version", &self.desired_version),
            ("ip", &self.target),
            ("username", &self.username),
            ("password", &self.password),
        ];
        for &(key, value) in required.iter() {
            if value.trim().is_empty() {
                return Err(Error::MissingKey(key));
            }
        }
        self.opts.validate()?;
        self.desired_version()
    }

    pub fn desired_version(&self) -> Result<VersionSpec, Error> {
        match VersionSpec::parse(Some(&self.desired_version))? {
            VersionSpec::Empty => Err(Error::MissingKey("version")),
            version => Ok(version),
        }
    }
}

fn default_config_file() -> String {
    "ops_manager_deployment.yml".to_owned()
}

fn default_work_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_installation_timeout_secs() -> u64 {
    2 * 60 * 60
}

fn default_installation_poll_secs() -> u64 {
    30
}

fn default_insecure() -> bool {
    true
}

fn default_pivnet_url() -> String {
    "https://network.pivotal.io".to_owned()
}

/// Process settings read from `APPLIANCE_*` environment variables.
#[derive(Deserialize, Debug, Clone)]
pub struct DeployerEnvironmentConfig {
    #[serde(default = "default_config_file")]
    pub config_file: String,
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    #[serde(default = "default_installation_timeout_secs")]
    pub installation_timeout_secs: u64,
    #[serde(default = "default_installation_poll_secs")]
    pub installation_poll_secs: u64,
    #[serde(default = "default_insecure")]
    pub insecure: bool,
    #[serde(default)]
    pub metrics_file: Option<PathBuf>,
    #[serde(default = "default_pivnet_url")]
    pub pivnet_url: String,
}

impl Default for DeployerEnvironmentConfig {
    fn default() -> Self {
        DeployerEnvironmentConfig {
            config_file: default_config_file(),
            work_dir: default_work_dir(),
            installation_timeout_secs: default_installation_timeout_secs(),
            installation_poll_secs: default_installation_poll_secs(),
            insecure: default_insecure(),
            metrics_file: None,
            pivnet_url: default_pivnet_url(),
        }
    }
}

impl DeployerEnvironmentConfig {
    pub const ENV_PREFIX: &'static str = "APPLIANCE_";

    pub fn from_env() -> Result<Self, Error> {
        Ok(envy::prefixed(Self::ENV_PREFIX).from_env::<DeployerEnvironmentConfig>()?)
    }

    pub fn installation_timeout(&self) -> Duration {
        Duration::from_secs(self.installation_timeout_secs)
    }

    pub fn installation_poll_interval(&self) -> Duration {
        Duration::from_secs(self.installation_poll_secs)
    }
}
