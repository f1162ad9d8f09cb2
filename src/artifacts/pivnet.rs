use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, info};
use serde::Deserialize;

use crate::artifacts::{ArtifactProvider, AssetRequest};
use crate::errors::Error;
use crate::utils::{file_in_dir, join_url, write_response_to_file};

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct Release {
    pub id: u64,
    pub version: String,
}

#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Link {
    pub href: String,
}

#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
pub struct FileLinks {
    #[serde(default)]
    pub download: Link,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct ProductFile {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    pub aws_object_key: String,
    #[serde(rename = "_links", default)]
    pub links: FileLinks,
}

#[derive(Deserialize)]
struct Releases {
    releases: Vec<Release>,
}

#[derive(Deserialize)]
struct ProductFiles {
    product_files: Vec<ProductFile>,
}

pub fn find_release<'a>(releases: &'a [Release], version: &str) -> Option<&'a Release> {
    releases.iter().find(|release| release.version == version)
}

/// Pick the product file for a request by its file name, within the platform's files when one
/// is given. A platform with no file of that name falls back to its first file.
pub fn select_product_file<'a>(files: &'a [ProductFile], request: &AssetRequest) -> Option<&'a ProductFile> {
    let named = |file: &&ProductFile| file.aws_object_key.ends_with(&request.filename);
    match request.platform {
        Some(platform) => {
            let for_platform = move || files.iter().filter(move |file| platform.matches(&file.aws_object_key));
            for_platform().find(named).or_else(|| for_platform().next())
        }
        None => files.iter().find(named),
    }
}

/// Client for the Pivotal Network artifact repository.
pub struct Pivnet {
    http: reqwest::Client,
    base_url: String,
    token: String,
    download_dir: PathBuf,
}

impl Pivnet {
    pub fn new(base_url: &str, token: &str, download_dir: &Path) -> Result<Self, Error> {
        Ok(Pivnet {
            http: reqwest::Client::builder().build()?,
            base_url: base_url.to_owned(),
            token: token.to_owned(),
            download_dir: download_dir.to_path_buf(),
        })
    }

    fn authorization(&self) -> String {
        format!("Token {}", self.token)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, operation: &'static str, path: &str) -> Result<T, Error> {
        let url = join_url(&self.base_url, path);
        debug!("GET {}", url);
        let response = self
            .http
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, self.authorization())
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::UnexpectedStatus {
                operation,
                status: response.status(),
            });
        }
        Ok(response.json::<T>().await?)
    }

    async fn post(&self, operation: &'static str, url: &str) -> Result<reqwest::Response, Error> {
        let response = self
            .http
            .post(url)
            .header(reqwest::header::AUTHORIZATION, self.authorization())
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::UnexpectedStatus {
                operation,
                status: response.status(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl ArtifactProvider for Pivnet {
    async fn download_asset(&self, request: &AssetRequest) -> Result<PathBuf, Error> {
        let destination = file_in_dir(&self.download_dir, &request.filename)?;
        let releases: Releases = self
            .get_json("list_releases", &format!("/api/v2/products/{}/releases", request.product))
            .await?;
        let release = find_release(&releases.releases, &request.version)
            .ok_or_else(|| Error::NotFound(format!("{} release {}", request.product, request.version)))?;

        let release_path = format!("/api/v2/products/{}/releases/{}", request.product, release.id);
        let files: ProductFiles = self
            .get_json("list_product_files", &format!("{}/product_files", release_path))
            .await?;
        let file = select_product_file(&files.product_files, request).ok_or_else(|| {
            let wanted = match request.platform {
                Some(platform) => platform.to_string(),
                None => request.filename.to_owned(),
            };
            Error::NotFound(format!(
                "{} file for {} release {}",
                wanted, request.product, request.version
            ))
        })?;

        self.post(
            "accept_eula",
            &join_url(&self.base_url, &format!("{}/eula_acceptance", release_path)),
        )
        .await?;

        info!(
            "Downloading {} {} ({}) as {}",
            request.product, request.version, file.aws_object_key, request.filename
        );
        let response = self.post("download_product_file", &file.links.download.href).await?;
        write_response_to_file(response, &destination).await
    }
}
