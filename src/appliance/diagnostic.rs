use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::Error;

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ReportVersions {
    #[serde(default)]
    pub release_version: String,
}

/// The parts of the appliance's diagnostic report this crate reads.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct DiagnosticReport {
    #[serde(default)]
    pub versions: ReportVersions,
}

impl DiagnosticReport {
    pub fn with_release_version(release_version: &str) -> Self {
        DiagnosticReport {
            versions: ReportVersions {
                release_version: release_version.to_owned(),
            },
        }
    }
}

/// Reads the diagnostic report of the appliance at the configured target.
#[async_trait]
pub trait DiagnosticReader: Send + Sync {
    /// `Ok(None)` when the appliance is unreachable or answers with a non-2xx status.
    async fn diagnostic_report(&self) -> Result<Option<DiagnosticReport>, Error>;
}
