use super::{Alert, AlertMap, EngineHours, Machine, MachineDetail, Severity};
use serde::Serialize;
use std::collections::BTreeMap;

/// Load state of the live fleet snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FleetState {
    Idle,
    Loading,
    Empty,
    Ready,
    Error { message: String },
}

/// The one list render path, shared by the full fleet and search results
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListView {
    pub query: String,
    pub entries: Vec<Machine>,
    pub visible: usize,
    /// Partial matches hidden by the search cap
    pub capped_matches: usize,
}

impl ListView {
    pub fn render(query: String, entries: Vec<Machine>, capped_matches: usize, chunk: usize) -> Self {
        let visible = entries.len().min(chunk);
        Self {
            query,
            entries,
            visible,
            capped_matches,
        }
    }

    pub fn visible_entries(&self) -> &[Machine] {
        &self.entries[..self.visible.min(self.entries.len())]
    }

    pub fn remaining(&self) -> usize {
        self.entries.len().saturating_sub(self.visible)
    }

    pub fn has_more(&self) -> bool {
        self.remaining() > 0
    }

    /// Reveal the next chunk. Returns how many entries became visible.
    pub fn load_more(&mut self, chunk: usize) -> usize {
        let before = self.visible;
        self.visible = self.visible.saturating_add(chunk).min(self.entries.len());
        self.visible - before
    }
}

/// What the map surface currently shows, for the user-facing notice
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MapStatus {
    pub drawn: usize,
    pub located: usize,
    pub clipped: usize,
    pub unavailable: Option<String>,
}

/// The single live fleet snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FleetSnapshot {
    /// Bumped on every organization load; stale continuations compare against it
    pub generation: u64,
    pub organization_id: Option<String>,
    pub state: FleetState,
    pub machines: Vec<Machine>,
    pub alerts: AlertMap,
    pub alerts_loaded: bool,
    pub list: ListView,
    pub map: MapStatus,
}

impl Default for FleetSnapshot {
    fn default() -> Self {
        Self {
            generation: 0,
            organization_id: None,
            state: FleetState::Idle,
            machines: Vec::new(),
            alerts: AlertMap::new(),
            alerts_loaded: false,
            list: ListView::default(),
            map: MapStatus::default(),
        }
    }
}

impl FleetSnapshot {
    /// A fresh, loading snapshot for `organization_id`
    pub fn loading(generation: u64, organization_id: &str) -> Self {
        Self {
            generation,
            organization_id: Some(organization_id.to_string()),
            state: FleetState::Loading,
            ..Self::default()
        }
    }

    pub fn machine(&self, id: &str) -> Option<&Machine> {
        self.machines.iter().find(|m| m.has_id(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.machine(id).is_some()
    }

    pub fn alerts_for(&self, id: &str) -> &[Alert] {
        self.alerts.get(id).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// One independently loaded region of the selection view
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Pane<T> {
    Idle,
    Loading,
    Ready(T),
    Error(String),
}

impl<T> Pane<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Pane::Ready(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Pane::Error(_))
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Pane::Ready(value) => Some(value),
            _ => None,
        }
    }
}

/// An alert row with its expand/collapse toggle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertView {
    #[serde(flatten)]
    pub alert: Alert,
    pub expanded: bool,
}

impl From<Alert> for AlertView {
    fn from(alert: Alert) -> Self {
        Self {
            alert,
            expanded: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SelectionPhase {
    None,
    Loading,
    Ready,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionState {
    pub organization_id: Option<String>,
    pub machine_id: Option<String>,
    /// Bumped on every `select`; late responses compare against it
    pub request: u64,
    pub detail: Pane<MachineDetail>,
    pub alerts: Pane<Vec<AlertView>>,
    pub engine_hours: Pane<EngineHours>,
}

impl Default for SelectionState {
    fn default() -> Self {
        Self {
            organization_id: None,
            machine_id: None,
            request: 0,
            detail: Pane::Idle,
            alerts: Pane::Idle,
            engine_hours: Pane::Idle,
        }
    }
}

impl SelectionState {
    /// Engine hours are optional and never drive the phase.
    pub fn phase(&self) -> SelectionPhase {
        if self.machine_id.is_none() {
            SelectionPhase::None
        } else if self.detail.is_error() || self.alerts.is_error() {
            SelectionPhase::Error
        } else if self.detail.is_ready() && self.alerts.is_ready() {
            SelectionPhase::Ready
        } else {
            SelectionPhase::Loading
        }
    }

    pub fn is_current(&self, request: u64, machine_id: &str) -> bool {
        self.request == request && self.machine_id.as_deref() == Some(machine_id)
    }
}

/// Visual emphasis of a map marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerTone {
    Selected,
    Alert(Severity),
    Normal,
}

impl MarkerTone {
    pub fn color(self) -> &'static str {
        match self {
            MarkerTone::Selected => "#007bff",
            MarkerTone::Alert(Severity::High) => "#dc3545",
            MarkerTone::Alert(Severity::Medium) => "#fd7e14",
            MarkerTone::Alert(Severity::Low) => "#ffc107",
            MarkerTone::Alert(Severity::Info) => "#17a2b8",
            MarkerTone::Alert(Severity::Dtc) => "#6f42c1",
            MarkerTone::Alert(Severity::Unknown) => "#6c757d",
            MarkerTone::Normal => "#28a745",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub machine_id: String,
    pub label: String,
    pub latitude: f64,
    pub longitude: f64,
    pub tone: MarkerTone,
    pub color: &'static str,
}

impl Marker {
    pub fn is_selected(&self) -> bool {
        self.tone == MarkerTone::Selected
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Bounds {
    pub fn around(latitude: f64, longitude: f64) -> Self {
        Self {
            south: latitude,
            west: longitude,
            north: latitude,
            east: longitude,
        }
    }

    pub fn extend(&mut self, latitude: f64, longitude: f64) {
        self.south = self.south.min(latitude);
        self.north = self.north.max(latitude);
        self.west = self.west.min(longitude);
        self.east = self.east.max(longitude);
    }

    pub fn of<'a>(markers: impl IntoIterator<Item = &'a Marker>) -> Option<Self> {
        let mut bounds: Option<Bounds> = None;
        for m in markers {
            match bounds.as_mut() {
                Some(b) => b.extend(m.latitude, m.longitude),
                None => bounds = Some(Bounds::around(m.latitude, m.longitude)),
            }
        }
        bounds
    }
}

/// Changes to apply to the map surface
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MarkerDiff {
    pub create: Vec<Marker>,
    pub update: Vec<Marker>,
    pub remove: Vec<String>,
}

impl MarkerDiff {
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.update.is_empty() && self.remove.is_empty()
    }
}

/// Aggregates for the chart panels
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FleetSummary {
    pub machines: usize,
    pub located: usize,
    pub unlocated: usize,
    pub machines_with_alerts: usize,
    pub alerts_by_severity: BTreeMap<Severity, usize>,
    pub machines_by_category: BTreeMap<String, usize>,
}

impl FleetSummary {
    pub fn from_snapshot(snapshot: &FleetSnapshot) -> Self {
        let mut summary = FleetSummary {
            machines: snapshot.machines.len(),
            ..Default::default()
        };
        for machine in &snapshot.machines {
            if machine.location.is_some() {
                summary.located += 1;
            }
            let category = machine
                .category
                .clone()
                .unwrap_or_else(|| "UNKNOWN".to_string());
            *summary.machines_by_category.entry(category).or_default() += 1;

            let alerts = machine
                .id
                .as_deref()
                .map(|id| snapshot.alerts_for(id))
                .unwrap_or(&[]);
            if !alerts.is_empty() {
                summary.machines_with_alerts += 1;
            }
            for alert in alerts {
                *summary.alerts_by_severity.entry(alert.severity).or_default() += 1;
            }
        }
        summary.unlocated = summary.machines - summary.located;
        summary
    }
}

/// Change notifications for list/detail/map/chart panels
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    FleetChanged { generation: u64 },
    ListChanged { generation: u64 },
    SelectionChanged { machine_id: Option<String> },
    MarkersChanged { drawn: usize, clipped: usize },
    MapUnavailable { message: String },
}
