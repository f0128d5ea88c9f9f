/// Fleet API clients module
use crate::config::EngineConfig;
use crate::domain::{
    alerts_from_payload, machines_from_payload, organizations_from_payload, Alert, EngineHours,
    Machine, MachineDetail, Organization,
};
use crate::errors::{FetchError, FetchResult};
use async_trait::async_trait;
use reqwest::{header, Client};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use urlencoding::encode;

/// A read-only resource exposed by the fleet API
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    Organizations,
    Machines { organization_id: String },
    Machine { machine_id: String },
    MachineAlerts { machine_id: String },
    EngineHours { machine_id: String },
}

impl Resource {
    /// Request path relative to the API base. Ids are percent-encoded as
    /// single path segments.
    pub fn path(&self) -> String {
        match self {
            Resource::Organizations => "/organizations".to_string(),
            Resource::Machines { organization_id } => {
                format!("/organizations/{}/machines", encode(organization_id))
            }
            Resource::Machine { machine_id } => format!("/machines/{}", encode(machine_id)),
            Resource::MachineAlerts { machine_id } => {
                format!("/machines/{}/alerts", encode(machine_id))
            }
            Resource::EngineHours { machine_id } => {
                format!("/machines/{}/engineHours", encode(machine_id))
            }
        }
    }
}

/// HTTP client wrapper with common configuration
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> FetchResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("fleet-view/1.0")
            .build()?;
        Ok(Self { client })
    }

    pub fn get_client(&self) -> &Client {
        &self.client
    }
}

/// Single outbound request with uniform error classification.
/// No retries happen here.
pub struct FetchGateway {
    http_client: HttpClient,
    base_url: String,
    token: String,
}

impl FetchGateway {
    pub fn new(base_url: String, token: String, timeout: Duration) -> FetchResult<Self> {
        Ok(Self {
            http_client: HttpClient::new(timeout)?,
            base_url,
            token,
        })
    }

    pub fn from_config(config: &EngineConfig) -> FetchResult<Self> {
        Self::new(
            config.api_base_url.clone(),
            config.api_token.clone(),
            Duration::from_secs(config.request_timeout_seconds),
        )
    }

    /// Get base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn fetch(&self, resource: &Resource) -> FetchResult<Value> {
        let url = format!("{}{}", self.base_url, resource.path());
        debug!("GET {}", url);

        let mut req = self
            .http_client
            .get_client()
            .get(&url)
            .header(header::ACCEPT, "application/json")
            .header("x-deere-no-paging", "true");

        if !self.token.is_empty() {
            req = req.bearer_auth(&self.token);
        }

        let resp = req.send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::http_status(
                status.as_u16(),
                format!("{} returned {}", resource.path(), status),
            ));
        }

        // Read as text first so transport and parse failures stay distinct.
        let body = resp.text().await?;
        let json = serde_json::from_str(&body)?;
        Ok(json)
    }
}

/// The read-only calls the engine makes against the fleet API
#[async_trait]
pub trait FleetApi: Send + Sync {
    async fn list_organizations(&self) -> FetchResult<Vec<Organization>>;

    async fn list_machines(&self, organization_id: &str) -> FetchResult<Vec<Machine>>;

    async fn machine_detail(&self, machine_id: &str) -> FetchResult<MachineDetail>;

    async fn machine_alerts(&self, machine_id: &str) -> FetchResult<Vec<Alert>>;

    async fn engine_hours(&self, machine_id: &str) -> FetchResult<EngineHours>;
}

/// `FleetApi` over the HTTP gateway
pub struct HttpFleetApi {
    gateway: FetchGateway,
}

impl HttpFleetApi {
    pub fn new(gateway: FetchGateway) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl FleetApi for HttpFleetApi {
    async fn list_organizations(&self) -> FetchResult<Vec<Organization>> {
        let json = self.gateway.fetch(&Resource::Organizations).await?;
        organizations_from_payload(&json)
            .ok_or_else(|| FetchError::parse("organization list is not a collection"))
    }

    async fn list_machines(&self, organization_id: &str) -> FetchResult<Vec<Machine>> {
        let resource = Resource::Machines {
            organization_id: organization_id.to_string(),
        };
        let json = self.gateway.fetch(&resource).await?;
        machines_from_payload(&json)
            .ok_or_else(|| FetchError::parse("machine list is not a collection"))
    }

    async fn machine_detail(&self, machine_id: &str) -> FetchResult<MachineDetail> {
        let resource = Resource::Machine {
            machine_id: machine_id.to_string(),
        };
        let json = self.gateway.fetch(&resource).await?;
        MachineDetail::from_value(&json)
            .ok_or_else(|| FetchError::parse(format!("machine {} has no usable id", machine_id)))
    }

    async fn machine_alerts(&self, machine_id: &str) -> FetchResult<Vec<Alert>> {
        let resource = Resource::MachineAlerts {
            machine_id: machine_id.to_string(),
        };
        let json = self.gateway.fetch(&resource).await?;
        alerts_from_payload(&json).ok_or_else(|| FetchError::parse("alert list is not a collection"))
    }

    async fn engine_hours(&self, machine_id: &str) -> FetchResult<EngineHours> {
        let resource = Resource::EngineHours {
            machine_id: machine_id.to_string(),
        };
        let json = self.gateway.fetch(&resource).await?;
        EngineHours::from_value(&json)
            .ok_or_else(|| FetchError::parse("engine hours payload has no reading"))
    }
}
