/// Map marker reconciliation
use crate::domain::{AlertMap, Bounds, Machine, MapStatus, Marker, MarkerDiff, MarkerTone, Severity};
use crate::errors::MapError;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;

/// The rendering backend the reconciler drives
pub trait MapSurface: Send + Sync {
    fn apply(&self, diff: &MarkerDiff) -> Result<(), MapError>;

    fn fit_bounds(&self, bounds: Bounds) -> Result<(), MapError>;
}

/// Desired marker set for one fleet/alert/selection state
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerPlan {
    pub markers: Vec<Marker>,
    pub located: usize,
    pub clipped: usize,
    pub bounds: Option<Bounds>,
}

/// Selected wins; otherwise the highest-precedence alert, else normal.
pub fn tone_for(machine: &Machine, alerts: &AlertMap, selected: Option<&str>) -> MarkerTone {
    if selected.is_some_and(|id| machine.has_id(id)) {
        return MarkerTone::Selected;
    }
    // Ties keep the first alert seen, so dtc and unknown never displace each other.
    let worst = machine
        .id
        .as_ref()
        .and_then(|id| alerts.get(id))
        .into_iter()
        .flatten()
        .map(|alert| alert.severity)
        .fold(None, |acc: Option<Severity>, s| match acc {
            Some(current) if s.rank() <= current.rank() => Some(current),
            _ => Some(s),
        });
    worst.map(MarkerTone::Alert).unwrap_or(MarkerTone::Normal)
}

fn marker_for(machine: &Machine, alerts: &AlertMap, selected: Option<&str>) -> Option<Marker> {
    let id = machine.id.as_ref()?;
    let location = machine.location.as_ref()?;
    let tone = tone_for(machine, alerts, selected);
    Some(Marker {
        machine_id: id.clone(),
        label: machine.display_name(),
        latitude: location.latitude,
        longitude: location.longitude,
        tone,
        color: tone.color(),
    })
}

/// Build the capped marker set. Machines without a location or an id are
/// omitted. When capped, the selected machine goes first, then fleet order.
pub fn plan_markers(
    fleet: &[Machine],
    alerts: &AlertMap,
    selected: Option<&str>,
    max_markers: usize,
) -> MarkerPlan {
    let located = fleet
        .iter()
        .filter(|m| m.id.is_some() && m.location.is_some())
        .count();
    let mut markers = Vec::with_capacity(located.min(max_markers));

    if let Some(id) = selected {
        if let Some(marker) = fleet
            .iter()
            .find(|m| m.has_id(id))
            .and_then(|m| marker_for(m, alerts, selected))
        {
            markers.push(marker);
        }
    }

    for machine in fleet {
        if markers.len() >= max_markers {
            break;
        }
        if selected.is_some_and(|id| machine.has_id(id)) {
            continue;
        }
        if let Some(marker) = marker_for(machine, alerts, selected) {
            markers.push(marker);
        }
    }

    let bounds = Bounds::of(&markers);
    MarkerPlan {
        clipped: located - markers.len(),
        located,
        markers,
        bounds,
    }
}

/// Tracks what the map currently shows and emits minimal diffs
pub struct MarkerReconciler {
    placed: HashMap<String, Marker>,
    max_markers: usize,
}

impl MarkerReconciler {
    pub fn new(max_markers: usize) -> Self {
        Self {
            placed: HashMap::new(),
            max_markers,
        }
    }

    pub fn placed(&self) -> usize {
        self.placed.len()
    }

    pub fn diff(&self, plan: &MarkerPlan) -> MarkerDiff {
        let mut diff = MarkerDiff::default();
        for marker in &plan.markers {
            match self.placed.get(&marker.machine_id) {
                None => diff.create.push(marker.clone()),
                Some(existing) if existing != marker => diff.update.push(marker.clone()),
                Some(_) => {}
            }
        }
        let mut removed: Vec<String> = self
            .placed
            .keys()
            .filter(|id| !plan.markers.iter().any(|m| &m.machine_id == *id))
            .cloned()
            .collect();
        removed.sort();
        diff.remove = removed;
        diff
    }

    /// Bring the map in line with the fleet, alerts and selection. On
    /// failure the previous marker set stays the baseline for the next call.
    pub fn reconcile(
        &mut self,
        map: &dyn MapSurface,
        fleet: &[Machine],
        alerts: &AlertMap,
        selected: Option<&str>,
    ) -> Result<MapStatus, MapError> {
        let plan = plan_markers(fleet, alerts, selected, self.max_markers);
        let diff = self.diff(&plan);
        if !diff.is_empty() {
            map.apply(&diff)?;
        }
        self.placed = plan
            .markers
            .iter()
            .map(|m| (m.machine_id.clone(), m.clone()))
            .collect();
        if let Some(bounds) = plan.bounds {
            map.fit_bounds(bounds)?;
        }
        Ok(MapStatus {
            drawn: plan.markers.len(),
            located: plan.located,
            clipped: plan.clipped,
            unavailable: None,
        })
    }

    /// Remove every placed marker
    pub fn clear(&mut self, map: &dyn MapSurface) -> Result<(), MapError> {
        if self.placed.is_empty() {
            return Ok(());
        }
        let mut remove: Vec<String> = self.placed.keys().cloned().collect();
        remove.sort();
        map.apply(&MarkerDiff {
            remove,
            ..MarkerDiff::default()
        })?;
        self.placed.clear();
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct MapView {
    pub markers: Vec<Marker>,
    pub bounds: Option<Bounds>,
}

struct MapState {
    ready: bool,
    markers: Vec<Marker>,
    bounds: Option<Bounds>,
}

/// Map surface kept in memory and served to the browser-side renderer
pub struct InMemoryMap {
    state: Mutex<MapState>,
}

impl InMemoryMap {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MapState {
                ready: true,
                markers: Vec::new(),
                bounds: None,
            }),
        }
    }

    /// A surface that rejects changes until `mark_ready`
    pub fn uninitialized() -> Self {
        let map = Self::new();
        map.state.lock().ready = false;
        map
    }

    pub fn mark_ready(&self) {
        self.state.lock().ready = true;
    }

    pub fn view(&self) -> MapView {
        let state = self.state.lock();
        MapView {
            markers: state.markers.clone(),
            bounds: state.bounds,
        }
    }
}

impl Default for InMemoryMap {
    fn default() -> Self {
        Self::new()
    }
}

impl MapSurface for InMemoryMap {
    fn apply(&self, diff: &MarkerDiff) -> Result<(), MapError> {
        let mut state = self.state.lock();
        if !state.ready {
            return Err(MapError::NotReady);
        }
        state.markers.retain(|m| !diff.remove.contains(&m.machine_id));
        for marker in &diff.update {
            match state.markers.iter_mut().find(|m| m.machine_id == marker.machine_id) {
                Some(slot) => *slot = marker.clone(),
                None => {
                    return Err(MapError::Backend(format!(
                        "no marker to update for {}",
                        marker.machine_id
                    )))
                }
            }
        }
        state.markers.extend(diff.create.iter().cloned());
        if state.markers.is_empty() {
            state.bounds = None;
        }
        Ok(())
    }

    fn fit_bounds(&self, bounds: Bounds) -> Result<(), MapError> {
        let mut state = self.state.lock();
        if !state.ready {
            return Err(MapError::NotReady);
        }
        state.bounds = Some(bounds);
        Ok(())
    }
}
