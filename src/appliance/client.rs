use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde_json::{json, Value};

use crate::appliance::diagnostic::{DiagnosticReader, DiagnosticReport};
use crate::appliance::installation::{
    InstallationHandle, InstallationOutcome, InstallationRunner, InstallationSettings, InstallationSettingsFetcher,
    InstallationStatus,
};
use crate::config::ApplianceConfig;
use crate::errors::Error;
use crate::utils::{join_url, timestamped_file_name, write_response_to_file};

/// Operations on the appliance's own API used while deploying and upgrading it.
#[async_trait]
pub trait ApplianceApi: Send + Sync {
    /// Create the first admin user, returning the status the appliance answered with.
    async fn create_user(&self) -> Result<StatusCode, Error>;

    /// Export the installation asset collection into `destination_dir`.
    async fn download_installation_assets(&self, destination_dir: &Path) -> Result<PathBuf, Error>;

    async fn upload_installation_assets(&self, assets: &Path) -> Result<(), Error>;

    async fn import_stemcell(&self, stemcell: &Path) -> Result<(), Error>;
}

pub const DIAGNOSTIC_REPORT_PATH: &str = "/api/v0/diagnostic_report";
pub const SETUP_PATH: &str = "/api/v0/setup";
pub const INSTALLATION_ASSETS_PATH: &str = "/api/installation_asset_collection";
pub const INSTALLATION_SETTINGS_PATH: &str = "/api/installation_settings";
pub const STEMCELLS_PATH: &str = "/api/stemcells";
pub const INSTALLATION_PATH: &str = "/api/installation";

/// HTTPS client for the appliance at the configured target.
#[derive(Clone)]
pub struct ApplianceClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    poll_interval: Duration,
}

impl ApplianceClient {
    pub fn new(config: &ApplianceConfig, insecure: bool, poll_interval: Duration) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(insecure)
            .build()?;
        Ok(ApplianceClient {
            http,
            base_url: format!("https://{}", config.target),
            username: config.username.to_owned(),
            password: config.password.to_owned(),
            poll_interval,
        })
    }

    pub fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .get(&self.url(path))
            .basic_auth(&self.username, Some(&self.password))
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .post(&self.url(path))
            .basic_auth(&self.username, Some(&self.password))
    }

    async fn upload_file(&self, path: &str, field: &str, file: &Path) -> Result<reqwest::Response, Error> {
        let file_name = file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let contents = tokio::fs::read(file).await?;
        info!("Uploading {} ({} bytes) to {}", file.display(), contents.len(), path);
        let form = Form::new().part(field.to_owned(), Part::bytes(contents).file_name(file_name));
        Ok(self.post(path).multipart(form).send().await?)
    }
}

fn expect_success(operation: &'static str, response: &reqwest::Response) -> Result<(), Error> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(Error::UnexpectedStatus { operation, status })
    }
}

/// Installation id from the response to triggering an installation.
pub fn parse_install_id(body: &Value) -> Result<u64, Error> {
    body.pointer("/install/id")
        .and_then(Value::as_u64)
        .ok_or_else(|| Error::NotFound("install.id in installation response".to_owned()))
}

#[async_trait]
impl DiagnosticReader for ApplianceClient {
    async fn diagnostic_report(&self) -> Result<Option<DiagnosticReport>, Error> {
        let response = match self.get(DIAGNOSTIC_REPORT_PATH).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!("Appliance at {} is unreachable: {}", self.base_url, err);
                return Ok(None);
            }
        };
        if !response.status().is_success() {
            warn!(
                "Diagnostic report at {} answered with {}",
                self.base_url,
                response.status()
            );
            return Ok(None);
        }
        Ok(Some(response.json::<DiagnosticReport>().await?))
    }
}

#[async_trait]
impl ApplianceApi for ApplianceClient {
    async fn create_user(&self) -> Result<StatusCode, Error> {
        let body = json!({
            "setup": {
                "user_name": &self.username,
                "password": &self.password,
                "password_confirmation": &self.password,
                "eula_accepted": "true",
            }
        });
        // The appliance has no user yet, so this call is unauthenticated.
        let response = self.http.post(&self.url(SETUP_PATH)).json(&body).send().await?;
        debug!("Create user answered with {}", response.status());
        Ok(response.status())
    }

    async fn download_installation_assets(&self, destination_dir: &Path) -> Result<PathBuf, Error> {
        let response = self.get(INSTALLATION_ASSETS_PATH).send().await?;
        expect_success("download_installation_assets", &response)?;
        let destination = destination_dir.join(timestamped_file_name("installation_assets", "zip"));
        write_response_to_file(response, &destination).await
    }

    async fn upload_installation_assets(&self, assets: &Path) -> Result<(), Error> {
        let response = self.upload_file(INSTALLATION_ASSETS_PATH, "installation[file]", assets).await?;
        expect_success("upload_installation_assets", &response)
    }

    async fn import_stemcell(&self, stemcell: &Path) -> Result<(), Error> {
        let response = self.upload_file(STEMCELLS_PATH, "stemcell[file]", stemcell).await?;
        expect_success("import_stemcell", &response)
    }
}

#[async_trait]
impl InstallationSettingsFetcher for ApplianceClient {
    async fn installation_settings(&self) -> Result<InstallationSettings, Error> {
        let response = self.get(INSTALLATION_SETTINGS_PATH).send().await?;
        expect_success("installation_settings", &response)?;
        InstallationSettings::from_json(response.json::<Value>().await?)
    }
}

#[async_trait]
impl InstallationRunner for ApplianceClient {
    async fn trigger(&self, _settings: &InstallationSettings) -> Result<Box<dyn InstallationHandle>, Error> {
        let response = self
            .post(INSTALLATION_PATH)
            .json(&json!({ "ignore_warnings": true }))
            .send()
            .await?;
        expect_success("trigger_installation", &response)?;
        let id = parse_install_id(&response.json::<Value>().await?)?;
        info!("Triggered installation {}", id);
        Ok(Box::new(PolledInstallation {
            client: self.clone(),
            id,
        }))
    }
}

/// Installation tracked by polling its status endpoint.
pub struct PolledInstallation {
    client: ApplianceClient,
    id: u64,
}

#[async_trait]
impl InstallationHandle for PolledInstallation {
    async fn wait_for_result(&mut self) -> Result<InstallationOutcome, Error> {
        let path = format!("{}/{}", INSTALLATION_PATH, self.id);
        loop {
            let response = self.client.get(&path).send().await?;
            expect_success("installation_status", &response)?;
            let body = response.json::<Value>().await?;
            let status = body.get("status").and_then(Value::as_str).unwrap_or_default();
            match InstallationStatus::from_api(status) {
                InstallationStatus::Running => {
                    debug!("Installation {} is {}", self.id, status);
                    tokio::time::sleep(self.client.poll_interval).await;
                }
                InstallationStatus::Succeeded => {
                    return Ok(InstallationOutcome::succeeded(&format!("installation {} {}", self.id, status)))
                }
                InstallationStatus::Failed => {
                    return Ok(InstallationOutcome::failed(&format!("installation {} {}", self.id, status)))
                }
            }
        }
    }
}
