use std::fmt;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use log::info;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;

use crate::appliance::diagnostic::DiagnosticReader;
use crate::config::ApplianceConfig;
use crate::deployments::vcenter::{ConnectParams, VcenterConnector};
use crate::deployments::{DeploymentBackend, Platform};
use crate::errors::Error;
use crate::utils::{mask_secrets, vm_name};
use crate::version::VersionSpec;

pub const OVFTOOL: &str = "ovftool";

#[derive(Deserialize, Debug, Clone, Default)]
pub struct VcenterOpts {
    pub username: String,
    pub password: String,
    pub host: String,
    pub datacenter: String,
    pub cluster: String,
}

/// The `opts` section of the deployment file for vSphere.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct VsphereOpts {
    pub portgroup: String,
    pub datastore: String,
    pub netmask: String,
    pub gateway: String,
    pub dns: String,
    #[serde(default)]
    pub ntp_servers: Vec<String>,
    pub ova_path: String,
    pub vcenter: VcenterOpts,
}

impl VsphereOpts {
    pub fn validate(&self) -> Result<(), Error> {
        let required = [
            ("opts.portgroup", &self.portgroup),
            ("opts.datastore", &self.datastore),
            ("opts.ova_path", &self.ova_path),
            ("opts.vcenter.host", &self.vcenter.host),
            ("opts.vcenter.datacenter", &self.vcenter.datacenter),
            ("opts.vcenter.cluster", &self.vcenter.cluster),
            ("opts.vcenter.username", &self.vcenter.username),
        ];
        for &(key, value) in required.iter() {
            if value.trim().is_empty() {
                return Err(Error::MissingKey(key));
            }
        }
        Ok(())
    }

    /// `vi://` locator of the target cluster with percent-encoded credentials
    pub fn vcenter_target(&self) -> String {
        format!(
            "vi://{}:{}@{}/{}/host/{}",
            urlencoding::encode(&self.vcenter.username),
            urlencoding::encode(&self.vcenter.password),
            self.vcenter.host,
            self.vcenter.datacenter,
            self.vcenter.cluster
        )
    }
}

/// An external command, fed `stdin` once started.
#[derive(Clone, Debug, PartialEq)]
pub struct ExternalCommand {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<String>,
}

impl fmt::Display for ExternalCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(input) = &self.stdin {
            write!(f, "echo {} | ", input.trim_end())?;
        }
        f.write_str(&self.program)?;
        for arg in &self.args {
            if !arg.contains(' ') {
                write!(f, " {}", arg)?;
                continue;
            }
            // Quote the value part of `--flag:value` / `--flag=value`
            match arg.find(|c: char| c == ':' || c == '=') {
                Some(at) => write!(f, " {}\"{}\"", &arg[..=at], &arg[at + 1..])?,
                None => write!(f, " \"{}\"", arg)?,
            }
        }
        Ok(())
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &ExternalCommand) -> Result<(), Error>;
}

/// Runs commands as child processes of this one.
#[derive(Clone, Debug, Default)]
pub struct SystemCommandRunner {
    /// Values hidden when a command is logged or reported.
    pub secrets: Vec<String>,
}

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, command: &ExternalCommand) -> Result<(), Error> {
        let secrets: Vec<&str> = self.secrets.iter().map(String::as_str).collect();
        let rendered = mask_secrets(&command.to_string(), &secrets);
        info!("Running: {}", rendered);

        let mut child = tokio::process::Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::piped())
            .spawn()?;
        if let (Some(input), Some(mut stdin)) = (&command.stdin, child.stdin.take()) {
            stdin.write_all(input.as_bytes()).await?;
        }
        let status = child.wait().await?;
        if status.success() {
            Ok(())
        } else {
            Err(Error::CommandFailed {
                command: rendered,
                status: status.to_string(),
            })
        }
    }
}

/// Appliance VMs deployed from an OVA with ovftool into a vCenter cluster.
pub struct Vsphere {
    name: String,
    desired_version: VersionSpec,
    target: String,
    admin_password: String,
    opts: VsphereOpts,
    insecure: bool,
    diagnostics: Arc<dyn DiagnosticReader>,
    vcenter: Box<dyn VcenterConnector>,
    commands: Box<dyn CommandRunner>,
}

impl Vsphere {
    pub fn new(
        config: &ApplianceConfig,
        diagnostics: Arc<dyn DiagnosticReader>,
        vcenter: Box<dyn VcenterConnector>,
        commands: Box<dyn CommandRunner>,
    ) -> Result<Self, Error> {
        Ok(Vsphere {
            name: config.name.to_owned(),
            desired_version: config.desired_version()?,
            target: config.target.to_owned(),
            admin_password: config.password.to_owned(),
            opts: config.opts.clone(),
            insecure: true,
            diagnostics,
            vcenter,
            commands,
        })
    }

    /// Verify the vCenter certificate when connecting to stop VMs.
    pub fn verify_certificates(mut self) -> Self {
        self.insecure = false;
        self
    }

    /// Values that must not appear in logs of the deploy command.
    pub fn secrets(config: &ApplianceConfig) -> Vec<String> {
        vec![
            config.password.to_owned(),
            urlencoding::encode(&config.opts.vcenter.password).into_owned(),
        ]
    }

    /// Both deploy and stop name VMs from the normalized version, so `1.8.2.0` is `<name>-1.8.2`.
    pub fn new_vm_name(&self) -> String {
        vm_name(&self.name, &self.desired_version.to_string())
    }

    pub fn ovftool_command(&self) -> ExternalCommand {
        let opts = &self.opts;
        let args = vec![
            "--acceptAllEulas".to_owned(),
            "--noSSLVerify".to_owned(),
            "--powerOn".to_owned(),
            "--X:waitForIp".to_owned(),
            format!("--net:Network 1={}", opts.portgroup),
            format!("--name={}", self.new_vm_name()),
            format!("-ds={}", opts.datastore),
            format!("--prop:ip0={}", self.target),
            format!("--prop:netmask0={}", opts.netmask),
            format!("--prop:gateway={}", opts.gateway),
            format!("--prop:DNS={}", opts.dns),
            format!("--prop:ntp_servers={}", opts.ntp_servers.join(",")),
            format!("--prop:admin_password={}", self.admin_password),
            opts.ova_path.to_owned(),
            opts.vcenter_target(),
        ];
        ExternalCommand {
            program: OVFTOOL.to_owned(),
            args,
            stdin: Some("yes\n".to_owned()),
        }
    }

    fn connect_params(&self) -> ConnectParams {
        ConnectParams {
            host: self.opts.vcenter.host.to_owned(),
            user: self.opts.vcenter.username.to_owned(),
            password: self.opts.vcenter.password.to_owned(),
            insecure: self.insecure,
        }
    }
}

#[async_trait]
impl DeploymentBackend for Vsphere {
    fn platform(&self) -> Platform {
        Platform::Vsphere
    }

    async fn current_version(&self) -> Result<VersionSpec, Error> {
        let report = self.diagnostics.diagnostic_report().await?;
        VersionSpec::from_report(report.as_ref())
    }

    async fn stop_current_vm(&self) -> Result<(), Error> {
        let current_vm = vm_name(&self.name, &self.current_version().await?.to_string());
        info!("Stopping VM {} to release {}", current_vm, self.target);

        let session = self.vcenter.connect(&self.connect_params()).await?;
        let datacenter = session.find_datacenter(&self.opts.vcenter.datacenter).await?;
        let vm = session.find_vm(&datacenter, &current_vm).await?;
        session.power_off_vm(&vm).await
    }

    async fn deploy_vm(&self) -> Result<(), Error> {
        info!("Deploying VM {} from {}", self.new_vm_name(), self.opts.ova_path);
        self.commands.run(&self.ovftool_command()).await
    }
}
