#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use appliance_deployer::appliance::{
    ApplianceApi, DiagnosticReader, DiagnosticReport, InstallationHandle, InstallationOutcome, InstallationRunner,
    InstallationSettings, InstallationSettingsFetcher, StemcellDescriptor,
};
use appliance_deployer::artifacts::{ArtifactProvider, AssetRequest};
use appliance_deployer::deployments::{DeploymentBackend, Platform};
use appliance_deployer::{ApplianceConfig, ApplianceDeployment, CancelHandle, Collaborators, Error, VersionSpec};

pub const TARGET: &str = "1.2.3.4";

pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn record(calls: &CallLog, call: &str) {
    calls.lock().unwrap().push(call.to_owned());
}

pub fn calls_of(calls: &CallLog) -> Vec<String> {
    calls.lock().unwrap().clone()
}

// A deployment config for the vSphere example appliance
pub fn config_yaml(desired_version: &str) -> String {
    format!(
        r#"
name: ops-manager
version: "{}"
ip: {}
username: foo
password: bar
pivnet_token: asd123
opts:
  portgroup: VM Network
  datastore: datastore1
  netmask: 255.255.255.0
  gateway: 1.2.3.1
  dns: 8.8.8.8
  ntp_servers:
    - 0.pool.ntp.org
    - 1.pool.ntp.org
  ova_path: /tmp/ops-manager.ova
  vcenter:
    username: vcenter_username
    password: vcenter_password
    host: vcenter.example.com
    datacenter: dc1
    cluster: cluster1
"#,
        desired_version, TARGET
    )
}

pub fn config(desired_version: &str) -> ApplianceConfig {
    ApplianceConfig::from_yaml(&config_yaml(desired_version)).expect("Unable to parse example config")
}

/// Operator output captured for assertions.
#[derive(Clone, Default)]
pub struct SharedOutput(Arc<Mutex<Vec<u8>>>);

impl SharedOutput {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for SharedOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Fails the named call of a fake with a 500 from the appliance, after recording it.
pub fn injected_failure(fail_on: Option<&'static str>, call: &'static str) -> Result<(), Error> {
    match fail_on {
        Some(failing) if failing == call => Err(Error::UnexpectedStatus {
            operation: call,
            status: StatusCode::INTERNAL_SERVER_ERROR,
        }),
        _ => Ok(()),
    }
}

pub struct FakeBackend {
    pub calls: CallLog,
    pub cancel_on_stop: Option<CancelHandle>,
    pub fail_on: Option<&'static str>,
}

#[async_trait]
impl DeploymentBackend for FakeBackend {
    fn platform(&self) -> Platform {
        Platform::Vsphere
    }

    async fn current_version(&self) -> Result<VersionSpec, Error> {
        Ok(VersionSpec::Empty)
    }

    async fn stop_current_vm(&self) -> Result<(), Error> {
        record(&self.calls, "stop_current_vm");
        if let Some(cancel) = &self.cancel_on_stop {
            cancel.cancel();
        }
        injected_failure(self.fail_on, "stop_current_vm")
    }

    async fn deploy_vm(&self) -> Result<(), Error> {
        record(&self.calls, "deploy_vm");
        injected_failure(self.fail_on, "deploy_vm")
    }
}

pub struct FakeDiagnostics {
    pub report: Option<DiagnosticReport>,
}

#[async_trait]
impl DiagnosticReader for FakeDiagnostics {
    async fn diagnostic_report(&self) -> Result<Option<DiagnosticReport>, Error> {
        Ok(self.report.clone())
    }
}

pub struct FakeAppliance {
    pub calls: CallLog,
    pub create_user_statuses: Mutex<VecDeque<StatusCode>>,
    pub fail_on: Option<&'static str>,
}

#[async_trait]
impl ApplianceApi for FakeAppliance {
    async fn create_user(&self) -> Result<StatusCode, Error> {
        record(&self.calls, "create_user");
        injected_failure(self.fail_on, "create_user")?;
        Ok(self.create_user_statuses.lock().unwrap().pop_front().unwrap_or(StatusCode::OK))
    }

    async fn download_installation_assets(&self, destination_dir: &Path) -> Result<PathBuf, Error> {
        record(&self.calls, "get_installation_assets");
        Ok(destination_dir.join("installation_assets.zip"))
    }

    async fn upload_installation_assets(&self, assets: &Path) -> Result<(), Error> {
        let file_name = assets.file_name().unwrap().to_string_lossy().into_owned();
        record(&self.calls, &format!("upload_installation_assets {}", file_name));
        Ok(())
    }

    async fn import_stemcell(&self, stemcell: &Path) -> Result<(), Error> {
        record(&self.calls, &format!("import_stemcell {}", stemcell.display()));
        injected_failure(self.fail_on, "import_stemcell")
    }
}

pub struct FakeSettings {
    pub calls: CallLog,
    pub settings: InstallationSettings,
}

#[async_trait]
impl InstallationSettingsFetcher for FakeSettings {
    async fn installation_settings(&self) -> Result<InstallationSettings, Error> {
        record(&self.calls, "get_installation_settings");
        Ok(self.settings.clone())
    }
}

pub struct FakeRunner {
    pub calls: CallLog,
    pub outcome: InstallationOutcome,
    pub delay: Option<Duration>,
}

pub struct FakeHandle {
    calls: CallLog,
    outcome: InstallationOutcome,
    delay: Option<Duration>,
}

#[async_trait]
impl InstallationRunner for FakeRunner {
    async fn trigger(&self, _settings: &InstallationSettings) -> Result<Box<dyn InstallationHandle>, Error> {
        record(&self.calls, "trigger_installation");
        Ok(Box::new(FakeHandle {
            calls: self.calls.clone(),
            outcome: self.outcome.clone(),
            delay: self.delay,
        }))
    }
}

#[async_trait]
impl InstallationHandle for FakeHandle {
    async fn wait_for_result(&mut self) -> Result<InstallationOutcome, Error> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        record(&self.calls, "wait_for_result");
        Ok(self.outcome.clone())
    }
}

pub struct FakeArtifacts {
    pub calls: CallLog,
    pub fail_on: Option<&'static str>,
}

#[async_trait]
impl ArtifactProvider for FakeArtifacts {
    async fn download_asset(&self, request: &AssetRequest) -> Result<PathBuf, Error> {
        let platform = request.platform.map(|p| p.to_string()).unwrap_or_default();
        record(
            &self.calls,
            &format!(
                "download {} {} {} {}",
                request.product, request.version, request.filename, platform
            ),
        );
        injected_failure(self.fail_on, "download")?;
        Ok(PathBuf::from(&request.filename))
    }
}

/// Knobs for the fakes behind a test deployment.
pub struct Fakes {
    pub current_version: Option<String>,
    pub desired_version: String,
    pub create_user_statuses: Vec<u16>,
    pub stemcells: Vec<StemcellDescriptor>,
    pub outcome: InstallationOutcome,
    pub installation_delay: Option<Duration>,
    pub cancel_on_stop: bool,
    /// Call that fails, e.g. `"stop_current_vm"` or `"import_stemcell"`.
    pub fail_on: Option<&'static str>,
}

impl Default for Fakes {
    fn default() -> Self {
        Fakes {
            current_version: Some("1.5.5".to_owned()),
            desired_version: "1.5.5".to_owned(),
            create_user_statuses: vec![],
            stemcells: vec![],
            outcome: InstallationOutcome::succeeded("installation 1 success"),
            installation_delay: None,
            cancel_on_stop: false,
            fail_on: None,
        }
    }
}

pub struct Harness {
    pub deployment: ApplianceDeployment,
    pub calls: CallLog,
    pub output: SharedOutput,
    pub cancel: CancelHandle,
}

impl Fakes {
    pub fn versions(current: Option<&str>, desired: &str) -> Self {
        Fakes {
            current_version: current.map(str::to_owned),
            desired_version: desired.to_owned(),
            ..Fakes::default()
        }
    }

    pub fn build(self) -> Harness {
        let calls: CallLog = Arc::new(Mutex::new(Vec::new()));
        let output = SharedOutput::default();
        let cancel = CancelHandle::default();

        let statuses = self
            .create_user_statuses
            .iter()
            .map(|code| StatusCode::from_u16(*code).unwrap())
            .collect();
        let collaborators = Collaborators {
            backend: Box::new(FakeBackend {
                calls: calls.clone(),
                cancel_on_stop: if self.cancel_on_stop { Some(cancel.clone()) } else { None },
                fail_on: self.fail_on,
            }),
            diagnostics: Arc::new(FakeDiagnostics {
                report: self
                    .current_version
                    .as_ref()
                    .map(|version| DiagnosticReport::with_release_version(version)),
            }),
            appliance: Arc::new(FakeAppliance {
                calls: calls.clone(),
                create_user_statuses: Mutex::new(statuses),
                fail_on: self.fail_on,
            }),
            settings: Arc::new(FakeSettings {
                calls: calls.clone(),
                settings: InstallationSettings::with_stemcells(self.stemcells),
            }),
            installations: Arc::new(FakeRunner {
                calls: calls.clone(),
                outcome: self.outcome,
                delay: self.installation_delay,
            }),
            artifacts: Box::new(FakeArtifacts {
                calls: calls.clone(),
                fail_on: self.fail_on,
            }),
        };

        let deployment = ApplianceDeployment::new(config(&self.desired_version), collaborators)
            .expect("Unable to create deployment")
            .with_output(Box::new(output.clone()))
            .with_cancel_handle(cancel.clone());
        Harness {
            deployment,
            calls,
            output,
            cancel,
        }
    }
}
