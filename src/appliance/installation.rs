use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::Error;

/// A stemcell an installation needs, identified by its version.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct StemcellDescriptor {
    pub version: String,
    #[serde(rename = "file")]
    pub filename: String,
}

impl StemcellDescriptor {
    pub fn new(version: &str, filename: &str) -> Self {
        StemcellDescriptor {
            version: version.to_owned(),
            filename: filename.to_owned(),
        }
    }
}

impl PartialEq for StemcellDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
    }
}

impl Eq for StemcellDescriptor {}

/// Installation manifest of the running appliance.
#[derive(Clone, Debug, Default)]
pub struct InstallationSettings {
    pub stemcells: Vec<StemcellDescriptor>,
    pub raw: Value,
}

impl InstallationSettings {
    pub fn with_stemcells(stemcells: Vec<StemcellDescriptor>) -> Self {
        InstallationSettings {
            stemcells,
            raw: Value::Null,
        }
    }

    /// Collect the stemcells of every product, in product order, one per version.
    pub fn from_json(raw: Value) -> Result<Self, Error> {
        let mut stemcells: Vec<StemcellDescriptor> = Vec::new();
        let products = raw.get("products").and_then(Value::as_array);
        for product in products.into_iter().flatten() {
            let stemcell = match product.get("stemcell") {
                Some(stemcell) if !stemcell.is_null() => stemcell,
                _ => continue,
            };
            let stemcell: StemcellDescriptor = serde_json::from_value(stemcell.clone())?;
            if !stemcells.contains(&stemcell) {
                stemcells.push(stemcell);
            }
        }
        Ok(InstallationSettings { stemcells, raw })
    }
}

#[async_trait]
pub trait InstallationSettingsFetcher: Send + Sync {
    async fn installation_settings(&self) -> Result<InstallationSettings, Error>;
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum InstallationStatus {
    Running,
    Succeeded,
    Failed,
}

impl InstallationStatus {
    /// Map the appliance's status strings, anything unrecognised counts as still running.
    pub fn from_api(status: &str) -> Self {
        match status.to_ascii_lowercase().as_str() {
            "success" | "succeeded" => InstallationStatus::Succeeded,
            "failed" | "failure" | "cancelled" => InstallationStatus::Failed,
            _ => InstallationStatus::Running,
        }
    }
}

/// Final result of an installation run.
#[derive(Clone, Debug, PartialEq)]
pub struct InstallationOutcome {
    pub status: InstallationStatus,
    pub details: String,
}

impl InstallationOutcome {
    pub fn succeeded(details: &str) -> Self {
        InstallationOutcome {
            status: InstallationStatus::Succeeded,
            details: details.to_owned(),
        }
    }

    pub fn failed(details: &str) -> Self {
        InstallationOutcome {
            status: InstallationStatus::Failed,
            details: details.to_owned(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == InstallationStatus::Succeeded
    }
}

/// A triggered installation.
#[async_trait]
pub trait InstallationHandle: Send {
    /// Block until the installation leaves the running state.
    async fn wait_for_result(&mut self) -> Result<InstallationOutcome, Error>;
}

#[async_trait]
pub trait InstallationRunner: Send + Sync {
    async fn trigger(&self, settings: &InstallationSettings) -> Result<Box<dyn InstallationHandle>, Error>;
}
