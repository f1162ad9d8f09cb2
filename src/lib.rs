pub mod appliance;
pub mod artifacts;
pub mod config;
pub mod deployments;
pub mod errors;
pub mod metrics;
pub mod retry;
pub mod utils;
pub mod version;

use std::sync::Arc;

use log::info;

pub use appliance::{ApplianceDeployment, CancelHandle, Collaborators, Decision};
pub use config::{ApplianceConfig, DeployerEnvironmentConfig};
pub use errors::Error;
pub use version::VersionSpec;

use crate::appliance::ApplianceClient;
use crate::artifacts::Pivnet;
use crate::deployments::vcenter::RestConnector;
use crate::deployments::vsphere::SystemCommandRunner;
use crate::deployments::{Platform, Vsphere};

/// Build a deployment wired to the real appliance, vCenter and Pivotal Network.
pub fn init_deployment(config: ApplianceConfig, env_config: &DeployerEnvironmentConfig) -> Result<ApplianceDeployment, Error> {
    info!("Preparing deployment of {} at {}", config.name, config.target);

    let client = Arc::new(ApplianceClient::new(
        &config,
        env_config.insecure,
        env_config.installation_poll_interval(),
    )?);
    let backend = match config.provider {
        Platform::Vsphere => {
            let commands = SystemCommandRunner {
                secrets: Vsphere::secrets(&config),
            };
            let vsphere = Vsphere::new(&config, client.clone(), Box::new(RestConnector), Box::new(commands))?;
            if env_config.insecure {
                vsphere
            } else {
                vsphere.verify_certificates()
            }
        }
    };
    let artifacts = Pivnet::new(&env_config.pivnet_url, &config.pivnet_token, &env_config.work_dir)?;

    let collaborators = Collaborators {
        backend: Box::new(backend),
        diagnostics: client.clone(),
        appliance: client.clone(),
        settings: client.clone(),
        installations: client,
        artifacts: Box::new(artifacts),
    };
    Ok(ApplianceDeployment::new(config, collaborators)?
        .with_work_dir(&env_config.work_dir)
        .with_installation_timeout(env_config.installation_timeout()))
}
