use std::path::PathBuf;

use async_trait::async_trait;

use crate::deployments::Platform;
use crate::errors::Error;

pub mod pivnet;

pub use pivnet::Pivnet;

/// Product slug stemcells are published under.
pub const STEMCELL_PRODUCT: &str = "stemcells";

/// A versioned artifact to fetch from the artifact repository.
#[derive(Clone, Debug, PartialEq)]
pub struct AssetRequest {
    pub product: String,
    pub version: String,
    /// Local file name the artifact is saved as.
    pub filename: String,
    /// When set, only artifacts built for this platform are considered.
    pub platform: Option<Platform>,
}

#[async_trait]
pub trait ArtifactProvider: Send + Sync {
    /// Download an artifact, returning where it was saved.
    async fn download_asset(&self, request: &AssetRequest) -> Result<PathBuf, Error>;

    async fn download_stemcell(&self, version: &str, filename: &str, platform: Platform) -> Result<PathBuf, Error> {
        self.download_asset(&AssetRequest {
            product: STEMCELL_PRODUCT.to_owned(),
            version: version.to_owned(),
            filename: filename.to_owned(),
            platform: Some(platform),
        })
        .await
    }
}
