/// Domain models decoded from the fleet API
use crate::utils::{collection, n_pick, num, primitive_str, s_pick, t_pick};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

mod view;

pub use view::*;

/// Machine id -> alerts known for it during one fleet load
pub type AlertMap = HashMap<String, Vec<Alert>>;

/// A `model`/`type` field resolved once to its display text.
/// The API sends either a plain string or an object with a `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisplayName(String);

impl DisplayName {
    pub fn from_value(v: &Value) -> Option<Self> {
        let text = match v {
            Value::Object(_) => s_pick(v, &["name", "displayName", "value"]),
            other => primitive_str(other),
        }?;
        let text = text.trim();
        if text.is_empty() {
            None
        } else {
            Some(Self(text.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DisplayName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Last known position fix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: Option<DateTime<Utc>>,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp: None,
        }
    }

    /// Both coordinates must be present and in range; nothing is defaulted.
    pub fn from_value(v: &Value) -> Option<Self> {
        let latitude = n_pick(v, &["latitude", "lat"])?;
        let longitude = n_pick(v, &["longitude", "lon", "lng"])?;
        if !latitude.is_finite()
            || !longitude.is_finite()
            || latitude.abs() > 90.0
            || longitude.abs() > 180.0
        {
            return None;
        }
        Some(Self {
            latitude,
            longitude,
            timestamp: t_pick(v, &["timestamp", "time", "gpsFixTimestamp"]),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    /// `None` when the API sent an id that is not a string-like primitive.
    /// Such a machine is listed and searchable by name but never keyed.
    pub id: Option<String>,
    pub name: Option<String>,
    pub model: Option<DisplayName>,
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub machine_type: Option<DisplayName>,
    pub location: Option<Location>,
}

impl Machine {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            name: None,
            model: None,
            category: None,
            machine_type: None,
            location: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = Some(DisplayName::from(model));
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_location(mut self, latitude: f64, longitude: f64) -> Self {
        self.location = Some(Location::new(latitude, longitude));
        self
    }

    /// A machine with no usable id, as decoded from a malformed record
    pub fn unkeyed() -> Self {
        Self {
            id: None,
            ..Self::new(String::new())
        }
    }

    /// Decode one machine record. Returns `None` only when the record is not
    /// an object; an id that cannot be coerced leaves the machine unkeyed.
    pub fn from_value(v: &Value) -> Option<Self> {
        if !v.is_object() {
            return None;
        }
        let id = v.get("id").and_then(primitive_str);
        let category = s_pick(v, &["category"]);
        let machine_type = v
            .get("type")
            .and_then(DisplayName::from_value)
            .or_else(|| category.as_deref().map(DisplayName::from));
        let location = ["location", "lastKnownLocation"]
            .iter()
            .filter_map(|k| v.get(*k))
            .find_map(Location::from_value);

        Some(Self {
            id,
            name: s_pick(v, &["name"]),
            model: v.get("model").and_then(DisplayName::from_value),
            category,
            machine_type,
            location,
        })
    }

    pub fn display_name(&self) -> String {
        match (&self.name, &self.id) {
            (Some(name), _) => name.clone(),
            (None, Some(id)) => format!("Machine {}", id),
            (None, None) => "Unnamed machine".to_string(),
        }
    }

    /// Id comparisons never match an unkeyed machine.
    pub fn has_id(&self, id: &str) -> bool {
        self.id.as_deref() == Some(id)
    }

    pub fn model_text(&self) -> &str {
        self.model.as_ref().map(DisplayName::as_str).unwrap_or("")
    }
}

/// Decode a machine list payload. Records without a usable id are kept
/// unkeyed; records that are not objects are skipped.
pub fn machines_from_payload(json: &Value) -> Option<Vec<Machine>> {
    let records = collection(json)?;
    let mut machines = Vec::with_capacity(records.len());
    for record in records {
        match Machine::from_value(record) {
            Some(machine) => {
                if machine.id.is_none() {
                    warn!("Machine record has no usable id, it cannot be selected: {}", record);
                }
                machines.push(machine);
            }
            None => warn!("Skipping malformed machine record: {}", record),
        }
    }
    Some(machines)
}

/// An organization whose fleet can be loaded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub org_type: Option<String>,
    pub links: Vec<Link>,
}

impl Organization {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
            org_type: None,
            links: Vec::new(),
        }
    }

    /// An organization without an id cannot be loaded, so it is rejected.
    pub fn from_value(v: &Value) -> Option<Self> {
        Some(Self {
            id: v.get("id").and_then(primitive_str)?,
            name: s_pick(v, &["name"]),
            org_type: s_pick(v, &["type"]),
            links: links_from_value(v),
        })
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

pub fn organizations_from_payload(json: &Value) -> Option<Vec<Organization>> {
    let records = collection(json)?;
    let mut organizations = Vec::with_capacity(records.len());
    for record in records {
        match Organization::from_value(record) {
            Some(org) => organizations.push(org),
            None => warn!("Skipping organization record without an id: {}", record),
        }
    }
    Some(organizations)
}

/// Fixed alert severity vocabulary
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
    Info,
    Dtc,
    #[default]
    Unknown,
}

impl Severity {
    /// Case-insensitive; anything outside the vocabulary is `Unknown`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "high" => Severity::High,
            "medium" => Severity::Medium,
            "low" => Severity::Low,
            "info" => Severity::Info,
            "dtc" => Severity::Dtc,
            _ => Severity::Unknown,
        }
    }

    /// Precedence: high > medium > low > info > dtc/unknown
    pub fn rank(self) -> u8 {
        match self {
            Severity::High => 4,
            Severity::Medium => 3,
            Severity::Low => 2,
            Severity::Info => 1,
            Severity::Dtc | Severity::Unknown => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
            Severity::Dtc => "dtc",
            Severity::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub rel: String,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub status: String,
    #[serde(rename = "type")]
    pub alert_type: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub links: Vec<Link>,
}

impl Alert {
    pub fn new(id: impl Into<String>, severity: Severity) -> Self {
        Self {
            id: id.into(),
            title: "Untitled alert".to_string(),
            description: "No description".to_string(),
            severity,
            status: "ACTIVE".to_string(),
            alert_type: "UNDEFINED".to_string(),
            timestamp: None,
            links: Vec::new(),
        }
    }

    /// Decode one alert. `position` stands in for a missing id so that
    /// every alert in a pane stays addressable.
    pub fn from_value(v: &Value, position: usize) -> Self {
        let links = links_from_value(v);

        Self {
            id: s_pick(v, &["id"]).unwrap_or_else(|| format!("alert-{}", position)),
            title: s_pick(v, &["title"]).unwrap_or_else(|| "Untitled alert".to_string()),
            description: s_pick(v, &["description"])
                .unwrap_or_else(|| "No description".to_string()),
            severity: v
                .get("severity")
                .and_then(|s| s.as_str())
                .map(Severity::parse)
                .unwrap_or_default(),
            status: s_pick(v, &["status"]).unwrap_or_else(|| "ACTIVE".to_string()),
            alert_type: s_pick(v, &["type"]).unwrap_or_else(|| "UNDEFINED".to_string()),
            timestamp: t_pick(v, &["timestamp", "time"]),
            links,
        }
    }

    /// The link pointing at this alert's definition, if any
    pub fn definition_uri(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|l| l.rel.to_ascii_lowercase().contains("definition"))
            .map(|l| l.uri.as_str())
    }
}

fn links_from_value(v: &Value) -> Vec<Link> {
    v.get("links")
        .and_then(|l| l.as_array())
        .map(|links| {
            links
                .iter()
                .filter_map(|l| {
                    Some(Link {
                        rel: s_pick(l, &["rel"])?,
                        uri: s_pick(l, &["uri", "href"])?,
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

pub fn alerts_from_payload(json: &Value) -> Option<Vec<Alert>> {
    let records = collection(json)?;
    Some(
        records
            .iter()
            .enumerate()
            .map(|(i, v)| Alert::from_value(v, i))
            .collect(),
    )
}

/// Detail view of one machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineDetail {
    #[serde(flatten)]
    pub machine: Machine,
    pub serial_number: Option<String>,
    pub status: String,
    pub hours_of_operation: Option<f64>,
    pub fuel_level: Option<f64>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl MachineDetail {
    pub fn from_value(v: &Value) -> Option<Self> {
        let machine = Machine::from_value(v).filter(|m| m.id.is_some())?;
        let last_updated = t_pick(v, &["lastUpdated", "timestamp"])
            .or_else(|| machine.location.as_ref().and_then(|l| l.timestamp));
        Some(Self {
            machine,
            serial_number: s_pick(v, &["serialNumber", "vin"]),
            status: s_pick(v, &["status"]).unwrap_or_else(|| "ACTIVE".to_string()),
            hours_of_operation: n_pick(v, &["hoursOfOperation"]),
            fuel_level: n_pick(v, &["fuelLevel"]),
            last_updated,
        })
    }
}

/// Accumulated engine-hours reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineHours {
    pub hours: f64,
    pub unit: String,
    pub reported_at: Option<DateTime<Utc>>,
}

impl EngineHours {
    /// Accepts `{values:[{reading:{valueAsDouble,unit},reportTime}]}`
    /// or a flat `{hours}` object.
    pub fn from_value(v: &Value) -> Option<Self> {
        let entry = collection(v).and_then(|vals| vals.first()).unwrap_or(v);
        if let Some(reading) = entry.get("reading") {
            let hours = n_pick(reading, &["valueAsDouble", "value"])?;
            return Some(Self {
                hours,
                unit: s_pick(reading, &["unit"]).unwrap_or_else(|| "Hours".to_string()),
                reported_at: t_pick(entry, &["reportTime", "timestamp"]),
            });
        }
        let hours = ["hours", "engineHours"]
            .iter()
            .filter_map(|k| entry.get(*k))
            .find_map(num)?;
        Some(Self {
            hours,
            unit: s_pick(entry, &["unit"]).unwrap_or_else(|| "Hours".to_string()),
            reported_at: t_pick(entry, &["reportTime", "timestamp"]),
        })
    }
}
