use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{error, info};

pub mod client;
pub mod diagnostic;
pub mod installation;

pub use client::{ApplianceApi, ApplianceClient};
pub use diagnostic::{DiagnosticReader, DiagnosticReport};
pub use installation::{
    InstallationHandle, InstallationOutcome, InstallationRunner, InstallationSettings, InstallationSettingsFetcher,
    StemcellDescriptor,
};

use crate::artifacts::ArtifactProvider;
use crate::config::ApplianceConfig;
use crate::deployments::DeploymentBackend;
use crate::errors::Error;
use crate::metrics;
use crate::retry::retry_until;
use crate::version::VersionSpec;

/// Attempts made at creating the first user before giving up.
pub const CREATE_USER_ATTEMPTS: usize = 2;

pub const DEFAULT_INSTALLATION_TIMEOUT: Duration = Duration::from_secs(2 * 60 * 60);

/// What `run` does given the current and desired versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Deploy,
    Skip,
    Upgrade,
}

impl Decision {
    pub fn new(current: &VersionSpec, desired: &VersionSpec) -> Self {
        if current.is_empty() {
            Decision::Deploy
        } else if current == desired {
            Decision::Skip
        } else {
            Decision::Upgrade
        }
    }

    fn outcome(&self) -> &'static str {
        match self {
            Decision::Deploy => "deployed",
            Decision::Skip => "skipped",
            Decision::Upgrade => "upgraded",
        }
    }
}

/// Stops a deployment from starting its next step once cancelled.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything the deployment talks to.
pub struct Collaborators {
    pub backend: Box<dyn DeploymentBackend>,
    pub diagnostics: Arc<dyn DiagnosticReader>,
    pub appliance: Arc<dyn ApplianceApi>,
    pub settings: Arc<dyn InstallationSettingsFetcher>,
    pub installations: Arc<dyn InstallationRunner>,
    pub artifacts: Box<dyn ArtifactProvider>,
}

/// Deploys, upgrades or leaves alone the appliance described by an `ApplianceConfig`.
pub struct ApplianceDeployment {
    config: ApplianceConfig,
    desired_version: VersionSpec,
    collaborators: Collaborators,
    out: Box<dyn Write + Send>,
    work_dir: PathBuf,
    installation_timeout: Duration,
    cancel: CancelHandle,
}

fn step_failed(step: &'static str) -> impl FnOnce(Error) -> Error {
    move |err| {
        error!("Step '{}' failed: {}", step, err);
        metrics::step_failed(step);
        err
    }
}

impl ApplianceDeployment {
    /// Fails with a configuration error before anything external is contacted.
    pub fn new(config: ApplianceConfig, collaborators: Collaborators) -> Result<Self, Error> {
        let desired_version = config.validate()?;
        Ok(ApplianceDeployment {
            config,
            desired_version,
            collaborators,
            out: Box::new(std::io::stdout()),
            work_dir: PathBuf::from("."),
            installation_timeout: DEFAULT_INSTALLATION_TIMEOUT,
            cancel: CancelHandle::default(),
        })
    }

    /// Write operator status lines to `out` instead of stdout.
    pub fn with_output(mut self, out: Box<dyn Write + Send>) -> Self {
        self.out = out;
        self
    }

    pub fn with_work_dir(mut self, work_dir: &Path) -> Self {
        self.work_dir = work_dir.to_path_buf();
        self
    }

    pub fn with_installation_timeout(mut self, timeout: Duration) -> Self {
        self.installation_timeout = timeout;
        self
    }

    /// Share an existing cancel handle, e.g. one already wired to a signal.
    pub fn with_cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &ApplianceConfig {
        &self.config
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    fn checkpoint(&self, step: &'static str) -> Result<(), Error> {
        if self.cancel.is_cancelled() {
            info!("Cancelled, not starting '{}'", step);
            return Err(Error::Cancelled { step });
        }
        info!("Starting '{}'", step);
        Ok(())
    }

    fn say(&mut self, message: &str) -> Result<(), Error> {
        info!("{}", message);
        writeln!(self.out, "{}", message)?;
        self.out.flush()?;
        Ok(())
    }

    /// Version running at the target, `Empty` when nothing answers there.
    pub async fn current_version(&self) -> Result<VersionSpec, Error> {
        let report = self.collaborators.diagnostics.diagnostic_report().await?;
        VersionSpec::from_report(report.as_ref())
    }

    /// Bring the target to the desired version, returning what was decided.
    pub async fn run(&mut self) -> Result<Decision, Error> {
        let result = self.run_decision().await;
        match &result {
            Ok(decision) => metrics::run_finished(decision.outcome()),
            Err(_) => metrics::run_finished("failed"),
        }
        result
    }

    async fn run_decision(&mut self) -> Result<Decision, Error> {
        self.checkpoint("current_version")?;
        let current = self.current_version().await?;
        let desired = self.desired_version;
        let target = self.config.target.to_owned();

        let decision = Decision::new(&current, &desired);
        match decision {
            Decision::Deploy => {
                self.say(&format!("No appliance deployed at {}. Deploying...", target))?;
                self.checkpoint("deploy")?;
                self.deploy().await.map_err(step_failed("deploy"))?;
                self.checkpoint("create_first_user")?;
                self.create_first_user().await.map_err(step_failed("create_first_user"))?;
            }
            Decision::Skip => {
                self.say(&format!(
                    "Appliance at {} version is already {}. Skipping...",
                    target, current
                ))?;
            }
            Decision::Upgrade => {
                self.say(&format!(
                    "Appliance at {} version is {}. Upgrading to {}...",
                    target, current, desired
                ))?;
                self.upgrade().await?;
            }
        }
        Ok(decision)
    }

    /// Fresh install of the appliance VM.
    pub async fn deploy(&self) -> Result<(), Error> {
        self.collaborators.backend.deploy_vm().await
    }

    /// Replace the running appliance with one at the desired version and reinstall onto it.
    pub async fn upgrade(&self) -> Result<(), Error> {
        self.checkpoint("get_installation_assets")?;
        let assets = self
            .get_installation_assets()
            .await
            .map_err(step_failed("get_installation_assets"))?;

        self.checkpoint("get_installation_settings")?;
        let settings = self
            .get_installation_settings()
            .await
            .map_err(step_failed("get_installation_settings"))?;

        self.checkpoint("stop_current_vm")?;
        self.stop_current_vm().await.map_err(step_failed("stop_current_vm"))?;

        self.checkpoint("deploy")?;
        self.deploy().await.map_err(step_failed("deploy"))?;

        self.checkpoint("upload_installation_assets")?;
        self.upload_installation_assets(&assets)
            .await
            .map_err(step_failed("upload_installation_assets"))?;

        self.checkpoint("provision_missing_stemcells")?;
        self.provision_missing_stemcells(&settings)
            .await
            .map_err(step_failed("provision_missing_stemcells"))?;

        self.checkpoint("install")?;
        self.install(&settings).await.map_err(step_failed("install"))?;
        Ok(())
    }

    pub async fn get_installation_assets(&self) -> Result<PathBuf, Error> {
        self.collaborators
            .appliance
            .download_installation_assets(&self.work_dir)
            .await
    }

    pub async fn get_installation_settings(&self) -> Result<InstallationSettings, Error> {
        self.collaborators.settings.installation_settings().await
    }

    pub async fn stop_current_vm(&self) -> Result<(), Error> {
        self.collaborators.backend.stop_current_vm().await
    }

    pub async fn upload_installation_assets(&self, assets: &Path) -> Result<(), Error> {
        self.collaborators.appliance.upload_installation_assets(assets).await
    }

    /// Download and import every stemcell the installation lists, in order.
    ///
    /// Stemcells already present on the appliance are imported again.
    pub async fn provision_missing_stemcells(&self, settings: &InstallationSettings) -> Result<(), Error> {
        let platform = self.collaborators.backend.platform();
        for stemcell in &settings.stemcells {
            info!("Provisioning {} stemcell {}", platform, stemcell.version);
            let path = self
                .collaborators
                .artifacts
                .download_stemcell(&stemcell.version, &stemcell.filename, platform)
                .await?;
            self.collaborators.appliance.import_stemcell(&path).await?;
        }
        Ok(())
    }

    /// Trigger an installation and wait, at most the installation timeout, for its result.
    pub async fn install(&self, settings: &InstallationSettings) -> Result<InstallationOutcome, Error> {
        let mut installation = self.collaborators.installations.trigger(settings).await?;
        let outcome = tokio::time::timeout(self.installation_timeout, installation.wait_for_result())
            .await
            .map_err(|_| Error::InstallationTimeout(self.installation_timeout))??;
        if !outcome.is_success() {
            return Err(Error::InstallationFailed(outcome.details));
        }
        info!("Installation finished: {}", outcome.details);
        Ok(outcome)
    }

    /// Create the first user, retrying once if the appliance rejects the first attempt.
    pub async fn create_first_user(&self) -> Result<(), Error> {
        let appliance = &self.collaborators.appliance;
        let attempts = retry_until(
            "create_user",
            CREATE_USER_ATTEMPTS,
            || {
                metrics::create_user_attempted(1);
                appliance.create_user()
            },
            |status| status.is_success(),
        )
        .await?;

        if attempts.succeeded {
            info!("Created user {} after {} attempt(s)", self.config.username, attempts.attempts);
            Ok(())
        } else {
            Err(Error::TransientApi {
                operation: "create_user",
                status: attempts.value,
                attempts: attempts.attempts,
            })
        }
    }
}
