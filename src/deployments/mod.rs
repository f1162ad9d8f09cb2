use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::Error;
use crate::version::VersionSpec;

pub mod vcenter;
pub mod vsphere;

pub use vsphere::Vsphere;

/// Virtualization flavor an appliance runs on; also selects matching artifacts.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Vsphere,
}

impl Default for Platform {
    fn default() -> Self {
        Platform::Vsphere
    }
}

impl Platform {
    pub fn tag(&self) -> &'static str {
        match self {
            Platform::Vsphere => "vsphere",
        }
    }

    /// Whether an artifact key or file name belongs to this platform
    pub fn matches(&self, artifact_key: &str) -> bool {
        artifact_key.to_ascii_lowercase().contains(self.tag())
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Virtualization target hosting the appliance VM.
///
/// Backends override the VM lifecycle operations they support; the provided defaults fail with
/// [`Error::NotImplemented`].
#[async_trait]
pub trait DeploymentBackend: Send + Sync {
    fn platform(&self) -> Platform;

    /// Version of the appliance VM currently running, `Empty` if there is none.
    async fn current_version(&self) -> Result<VersionSpec, Error>;

    /// Power off the running appliance so its address can be reused.
    async fn stop_current_vm(&self) -> Result<(), Error> {
        Err(Error::NotImplemented("stop_current_vm"))
    }

    /// Create and power on an appliance VM at the desired version.
    async fn deploy_vm(&self) -> Result<(), Error> {
        Err(Error::NotImplemented("deploy_vm"))
    }
}
