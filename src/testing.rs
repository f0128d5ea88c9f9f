/// Scripted `FleetApi` for engine tests

use crate::clients::FleetApi;
use crate::domain::{Alert, EngineHours, Machine, MachineDetail, Organization};
use crate::errors::{FetchError, FetchResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Unscripted calls succeed: empty fleets, bare details, no alerts.
/// Engine hours default to a 404.
#[derive(Default)]
pub struct FakeApi {
    organizations: Option<FetchResult<Vec<Organization>>>,
    fleets: HashMap<String, FetchResult<Vec<Machine>>>,
    details: HashMap<String, FetchResult<MachineDetail>>,
    alerts: HashMap<String, FetchResult<Vec<Alert>>>,
    hours: HashMap<String, FetchResult<EngineHours>>,
    delays: HashMap<String, Duration>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_organizations(mut self, organizations: Vec<Organization>) -> Self {
        self.organizations = Some(Ok(organizations));
        self
    }

    pub fn failing_organizations(mut self, err: FetchError) -> Self {
        self.organizations = Some(Err(err));
        self
    }

    pub fn with_fleet(mut self, organization_id: &str, machines: Vec<Machine>) -> Self {
        self.fleets.insert(organization_id.to_string(), Ok(machines));
        self
    }

    pub fn failing_fleet(mut self, organization_id: &str, err: FetchError) -> Self {
        self.fleets.insert(organization_id.to_string(), Err(err));
        self
    }

    pub fn with_detail(mut self, machine_id: &str, name: &str) -> Self {
        self.details.insert(
            machine_id.to_string(),
            Ok(detail(Machine::new(machine_id).with_name(name))),
        );
        self
    }

    pub fn failing_detail(mut self, machine_id: &str, err: FetchError) -> Self {
        self.details.insert(machine_id.to_string(), Err(err));
        self
    }

    pub fn with_alerts(mut self, machine_id: &str, alerts: Vec<Alert>) -> Self {
        self.alerts.insert(machine_id.to_string(), Ok(alerts));
        self
    }

    pub fn failing_alerts(mut self, machine_id: &str, err: FetchError) -> Self {
        self.alerts.insert(machine_id.to_string(), Err(err));
        self
    }

    pub fn with_hours(mut self, machine_id: &str, hours: f64) -> Self {
        self.hours.insert(
            machine_id.to_string(),
            Ok(EngineHours {
                hours,
                unit: "Hours".to_string(),
                reported_at: None,
            }),
        );
        self
    }

    /// Delay one call, keyed `organizations`, `fleet:<org>`, `detail:<id>`,
    /// `alerts:<id>` or `hours:<id>`.
    pub fn delay(mut self, key: &str, delay: Duration) -> Self {
        self.delays.insert(key.to_string(), delay);
        self
    }

    async fn enter(&self, key: String) {
        if let Some(delay) = self.delays.get(&key) {
            tokio::time::sleep(*delay).await;
        }
    }
}

fn detail(machine: Machine) -> MachineDetail {
    MachineDetail {
        machine,
        serial_number: None,
        status: "ACTIVE".to_string(),
        hours_of_operation: None,
        fuel_level: None,
        last_updated: None,
    }
}

#[async_trait]
impl FleetApi for FakeApi {
    async fn list_organizations(&self) -> FetchResult<Vec<Organization>> {
        self.enter("organizations".to_string()).await;
        self.organizations
            .clone()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn list_machines(&self, organization_id: &str) -> FetchResult<Vec<Machine>> {
        self.enter(format!("fleet:{}", organization_id)).await;
        self.fleets
            .get(organization_id)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn machine_detail(&self, machine_id: &str) -> FetchResult<MachineDetail> {
        self.enter(format!("detail:{}", machine_id)).await;
        self.details
            .get(machine_id)
            .cloned()
            .unwrap_or_else(|| Ok(detail(Machine::new(machine_id))))
    }

    async fn machine_alerts(&self, machine_id: &str) -> FetchResult<Vec<Alert>> {
        self.enter(format!("alerts:{}", machine_id)).await;
        self.alerts
            .get(machine_id)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn engine_hours(&self, machine_id: &str) -> FetchResult<EngineHours> {
        self.enter(format!("hours:{}", machine_id)).await;
        self.hours.get(machine_id).cloned().unwrap_or_else(|| {
            Err(FetchError::http_status(
                404,
                format!("no engine hours for {}", machine_id),
            ))
        })
    }
}
