use async_trait::async_trait;
use log::{debug, info};
use serde::Deserialize;
use serde_json::Value;

use crate::errors::Error;
use crate::utils::join_url;

/// Credentials and endpoint used to open a vCenter session.
#[derive(Clone, Debug, PartialEq)]
pub struct ConnectParams {
    pub host: String,
    pub user: String,
    pub password: String,
    pub insecure: bool,
}

/// Opens sessions against a vCenter.
#[async_trait]
pub trait VcenterConnector: Send + Sync {
    async fn connect(&self, params: &ConnectParams) -> Result<Box<dyn VcenterSession>, Error>;
}

/// An authenticated vCenter session. Objects are referred to by their managed object ids.
#[async_trait]
pub trait VcenterSession: Send + Sync {
    async fn find_datacenter(&self, name: &str) -> Result<String, Error>;

    async fn find_vm(&self, datacenter: &str, name: &str) -> Result<String, Error>;

    async fn power_off_vm(&self, vm: &str) -> Result<(), Error>;
}

const SESSION_HEADER: &str = "vmware-api-session-id";

/// Connector for the vSphere Automation REST API.
#[derive(Clone, Debug, Default)]
pub struct RestConnector;

#[derive(Deserialize)]
struct Wrapped<T> {
    value: T,
}

#[derive(Deserialize)]
struct DatacenterSummary {
    datacenter: String,
}

#[derive(Deserialize)]
struct VmSummary {
    vm: String,
}

#[async_trait]
impl VcenterConnector for RestConnector {
    async fn connect(&self, params: &ConnectParams) -> Result<Box<dyn VcenterSession>, Error> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(params.insecure)
            .build()?;
        let base_url = format!("https://{}/rest", params.host);

        info!("Connecting to vCenter {} as {}", params.host, params.user);
        let response = http
            .post(&join_url(&base_url, "com/vmware/cis/session"))
            .basic_auth(&params.user, Some(&params.password))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::UnexpectedStatus {
                operation: "vcenter_login",
                status: response.status(),
            });
        }
        let session: Wrapped<String> = response.json().await?;

        Ok(Box::new(RestSession {
            http,
            base_url,
            session_id: session.value,
        }))
    }
}

pub struct RestSession {
    http: reqwest::Client,
    base_url: String,
    session_id: String,
}

impl RestSession {
    async fn get_json(&self, operation: &'static str, path: &str, query: &[(&str, &str)]) -> Result<Value, Error> {
        let response = self
            .http
            .get(&join_url(&self.base_url, path))
            .header(SESSION_HEADER, &self.session_id)
            .query(query)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::UnexpectedStatus {
                operation,
                status: response.status(),
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl VcenterSession for RestSession {
    async fn find_datacenter(&self, name: &str) -> Result<String, Error> {
        let body = self
            .get_json("find_datacenter", "vcenter/datacenter", &[("filter.names", name)])
            .await?;
        let found: Wrapped<Vec<DatacenterSummary>> = serde_json::from_value(body)?;
        found
            .value
            .into_iter()
            .next()
            .map(|summary| summary.datacenter)
            .ok_or_else(|| Error::NotFound(format!("Datacenter '{}'", name)))
    }

    async fn find_vm(&self, datacenter: &str, name: &str) -> Result<String, Error> {
        let body = self
            .get_json(
                "find_vm",
                "vcenter/vm",
                &[("filter.names", name), ("filter.datacenters", datacenter)],
            )
            .await?;
        let found: Wrapped<Vec<VmSummary>> = serde_json::from_value(body)?;
        found
            .value
            .into_iter()
            .next()
            .map(|summary| summary.vm)
            .ok_or_else(|| Error::NotFound(format!("VM '{}'", name)))
    }

    async fn power_off_vm(&self, vm: &str) -> Result<(), Error> {
        let response = self
            .http
            .post(&join_url(&self.base_url, &format!("vcenter/vm/{}/power/stop", vm)))
            .header(SESSION_HEADER, &self.session_id)
            .send()
            .await?;
        debug!("Power off of {} answered with {}", vm, response.status());
        if !response.status().is_success() {
            return Err(Error::UnexpectedStatus {
                operation: "power_off_vm",
                status: response.status(),
            });
        }
        Ok(())
    }
}
