/// Fleet view coordination: organization load, list, search, selection and map
use super::alerts::load_alerts;
use super::markers::{MapSurface, MarkerReconciler};
use super::search::{filter_organizations, rank};
use super::selection::SelectionController;
use crate::clients::FleetApi;
use crate::config::ViewLimits;
use crate::domain::{
    FleetSnapshot, FleetState, FleetSummary, ListView, Organization, SelectionState, ViewEvent,
};
use crate::errors::{EngineError, Outcome};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error, info, warn};

const EVENT_CAPACITY: usize = 256;

/// Root of the engine. Cheap to clone; all clones share one view.
#[derive(Clone)]
pub struct FleetView {
    inner: Arc<Inner>,
}

struct Inner {
    api: Arc<dyn FleetApi>,
    map: Arc<dyn MapSurface>,
    limits: ViewLimits,
    snapshot: watch::Sender<FleetSnapshot>,
    selection: SelectionController,
    // Held while reading the snapshot and touching the map so that map
    // updates and fleet resets never interleave.
    reconciler: Mutex<MarkerReconciler>,
    events: broadcast::Sender<ViewEvent>,
    generation: AtomicU64,
    search_generation: AtomicU64,
    pending_search: Mutex<Option<AbortHandle>>,
}

impl FleetView {
    pub fn new(api: Arc<dyn FleetApi>, map: Arc<dyn MapSurface>, limits: ViewLimits) -> Self {
        let (snapshot, _) = watch::channel(FleetSnapshot::default());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                selection: SelectionController::new(api.clone()),
                reconciler: Mutex::new(MarkerReconciler::new(limits.max_markers)),
                api,
                map,
                limits,
                snapshot,
                events,
                generation: AtomicU64::new(0),
                search_generation: AtomicU64::new(0),
                pending_search: Mutex::new(None),
            }),
        }
    }

    pub fn subscribe_snapshot(&self) -> watch::Receiver<FleetSnapshot> {
        self.inner.snapshot.subscribe()
    }

    pub fn subscribe_selection(&self) -> watch::Receiver<SelectionState> {
        self.inner.selection.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ViewEvent> {
        self.inner.events.subscribe()
    }

    pub fn snapshot(&self) -> FleetSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    pub fn selection(&self) -> SelectionState {
        self.inner.selection.current()
    }

    pub fn summary(&self) -> FleetSummary {
        FleetSummary::from_snapshot(&self.inner.snapshot.borrow())
    }

    pub fn limits(&self) -> &ViewLimits {
        &self.inner.limits
    }

    /// Organizations the user may load, narrowed by the picker's query
    pub async fn organizations(&self, query: &str) -> Result<Vec<Organization>, EngineError> {
        let organizations = self.inner.api.list_organizations().await?;
        info!("Fetched {} organizations", organizations.len());
        Ok(filter_organizations(&organizations, query))
    }

    /// Start loading `organization_id`, discarding the current fleet and
    /// selection. Progress is observable through the snapshot.
    pub fn load_organization(&self, organization_id: &str) -> JoinHandle<()> {
        let this = self.clone();
        let organization_id = organization_id.to_string();
        tokio::spawn(async move { this.run_load(organization_id, None).await })
    }

    /// Reload the current organization and reselect the current machine if
    /// it is still part of the new fleet.
    pub fn refresh(&self) -> Result<JoinHandle<()>, EngineError> {
        let organization_id = self
            .inner
            .snapshot
            .borrow()
            .organization_id
            .clone()
            .ok_or(EngineError::NoFleet)?;
        let reselect = self.inner.selection.selected_id();
        let this = self.clone();
        Ok(tokio::spawn(async move {
            this.run_load(organization_id, reselect).await
        }))
    }

    async fn run_load(&self, organization_id: String, reselect: Option<String>) {
        let generation = self.begin_load(&organization_id);
        info!(
            "Loading fleet for organization {} (generation {})",
            organization_id, generation
        );

        let machines = match self.inner.api.list_machines(&organization_id).await {
            Ok(machines) => machines,
            Err(e) => {
                error!("Fleet load failed for organization {}: {}", organization_id, e);
                let message = e.user_message();
                if self
                    .apply_if_current(generation, |snap| {
                        snap.state = FleetState::Error { message };
                    })
                    .is_stale()
                {
                    debug!("Dropping stale fleet error for {}", organization_id);
                } else {
                    self.emit(ViewEvent::FleetChanged { generation });
                }
                return;
            }
        };

        if machines.is_empty() {
            info!("Organization {} has no machines", organization_id);
            if !self
                .apply_if_current(generation, |snap| snap.state = FleetState::Empty)
                .is_stale()
            {
                self.emit(ViewEvent::FleetChanged { generation });
            }
            return;
        }

        let machine_ids: Vec<String> = machines.iter().filter_map(|m| m.id.clone()).collect();
        let chunk = self.inner.limits.list_chunk_size;
        let count = machines.len();
        let rendered = self.apply_if_current(generation, |snap| {
            snap.list = ListView::render(String::new(), machines.clone(), 0, chunk);
            snap.machines = machines;
            snap.state = FleetState::Ready;
        });
        if rendered.is_stale() {
            debug!("Dropping stale machine list for {}", organization_id);
            return;
        }
        info!("Organization {} has {} machines", organization_id, count);
        self.emit(ViewEvent::FleetChanged { generation });
        self.emit(ViewEvent::ListChanged { generation });

        if let Some(id) = reselect {
            match self.select(Some(&id)) {
                Ok(_) => debug!("Reselected machine {} after reload", id),
                Err(e) => debug!("Previous selection dropped after reload: {}", e),
            }
        }

        let alerts = load_alerts(self.inner.api.as_ref(), &machine_ids).await;
        let applied = self.apply_if_current(generation, |snap| {
            snap.alerts = alerts;
            snap.alerts_loaded = true;
        });
        if applied.is_stale() {
            debug!("Dropping stale alert aggregation for {}", organization_id);
            return;
        }
        self.emit(ViewEvent::FleetChanged { generation });
        self.sync_map();
    }

    /// Atomic reset: selection, search, markers and snapshot go together.
    fn begin_load(&self, organization_id: &str) -> u64 {
        let mut reconciler = self.inner.reconciler.lock();
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;

        self.cancel_pending_search();
        self.inner
            .selection
            .reset(Some(organization_id.to_string()));

        let mut snapshot = FleetSnapshot::loading(generation, organization_id);
        if let Err(e) = reconciler.clear(self.inner.map.as_ref()) {
            warn!("Could not clear map markers: {}", e);
            snapshot.map.unavailable = Some(e.to_string());
        }
        self.inner.snapshot.send_replace(snapshot);
        drop(reconciler);

        self.emit(ViewEvent::SelectionChanged { machine_id: None });
        self.emit(ViewEvent::FleetChanged { generation });
        generation
    }

    /// Mutate the snapshot only if `generation` is still the live load.
    fn apply_if_current(
        &self,
        generation: u64,
        write: impl FnOnce(&mut FleetSnapshot),
    ) -> Outcome<()> {
        let applied = self.inner.snapshot.send_if_modified(|snap| {
            if snap.generation != generation {
                return false;
            }
            write(snap);
            true
        });
        if applied {
            Outcome::Ok(())
        } else {
            Outcome::Stale
        }
    }

    /// Select a machine of the current fleet, or clear with `None`.
    /// Returns the task refreshing the detail and alert panes.
    pub fn select(&self, machine_id: Option<&str>) -> Result<Option<JoinHandle<()>>, EngineError> {
        let Some(machine_id) = machine_id else {
            self.inner.selection.clear();
            self.emit(ViewEvent::SelectionChanged { machine_id: None });
            self.sync_map();
            return Ok(None);
        };

        let ticket = {
            let _guard = self.inner.reconciler.lock();
            let snapshot = self.inner.snapshot.borrow();
            if snapshot.state != FleetState::Ready {
                return Err(EngineError::NoFleet);
            }
            if !snapshot.contains(machine_id) {
                return Err(EngineError::UnknownMachine(machine_id.to_string()));
            }
            self.inner.selection.begin(machine_id)
        };
        info!("Selected machine {}", machine_id);
        self.emit(ViewEvent::SelectionChanged {
            machine_id: Some(machine_id.to_string()),
        });
        self.sync_map();

        let this = self.clone();
        Ok(Some(tokio::spawn(async move {
            let on_ready = || this.sync_map();
            this.inner.selection.load(&ticket, &on_ready).await;
            this.emit(ViewEvent::SelectionChanged {
                machine_id: Some(ticket.machine_id.clone()),
            });
        })))
    }

    pub fn toggle_alert(&self, alert_id: &str) -> bool {
        let toggled = self.inner.selection.toggle_alert(alert_id);
        if toggled {
            self.emit(ViewEvent::SelectionChanged {
                machine_id: self.inner.selection.selected_id(),
            });
        }
        toggled
    }

    /// Debounced search: a newer call before the delay elapses cancels
    /// this one.
    pub fn search(&self, query: &str) -> JoinHandle<()> {
        let token = self.inner.search_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = self.inner.limits.search_debounce();
        let query = query.to_string();
        let this = self.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if this.inner.search_generation.load(Ordering::SeqCst) != token {
                return;
            }
            this.search_now(&query);
        });
        if let Some(previous) = self.inner.pending_search.lock().replace(handle.abort_handle()) {
            previous.abort();
        }
        handle
    }

    /// Rank the current fleet and render the result through the list path.
    /// Returns the number of machines listed.
    pub fn search_now(&self, query: &str) -> usize {
        let limits = &self.inner.limits;
        let mut listed = 0;
        let mut generation = 0;
        let changed = self.inner.snapshot.send_if_modified(|snap| {
            if snap.state != FleetState::Ready {
                return false;
            }
            let result = rank(&snap.machines, query, limits.search_max_results);
            if result.capped > 0 {
                info!(
                    "Search '{}' capped: {} partial matches hidden",
                    query, result.capped
                );
            }
            listed = result.machines.len();
            generation = snap.generation;
            snap.list = ListView::render(
                query.trim().to_string(),
                result.machines,
                result.capped,
                limits.list_chunk_size,
            );
            true
        });
        if changed {
            self.emit(ViewEvent::ListChanged { generation });
        }
        listed
    }

    /// Reveal the next chunk of the list. Returns how many became visible.
    pub fn load_more(&self) -> usize {
        let chunk = self.inner.limits.list_chunk_size;
        let mut added = 0;
        let mut generation = 0;
        self.inner.snapshot.send_if_modified(|snap| {
            added = snap.list.load_more(chunk);
            generation = snap.generation;
            added > 0
        });
        if added > 0 {
            self.emit(ViewEvent::ListChanged { generation });
        }
        added
    }

    fn cancel_pending_search(&self) {
        self.inner.search_generation.fetch_add(1, Ordering::SeqCst);
        if let Some(pending) = self.inner.pending_search.lock().take() {
            pending.abort();
        }
    }

    /// Re-run the marker reconciler against the current fleet, alerts and
    /// selection. Map failures are recorded, never propagated.
    fn sync_map(&self) {
        let mut reconciler = self.inner.reconciler.lock();
        let selected = self.inner.selection.selected_id();

        let (generation, result) = {
            let snapshot = self.inner.snapshot.borrow();
            if snapshot.state != FleetState::Ready {
                return;
            }
            let result = reconciler.reconcile(
                self.inner.map.as_ref(),
                &snapshot.machines,
                &snapshot.alerts,
                selected.as_deref(),
            );
            (snapshot.generation, result)
        };
        drop(reconciler);

        match result {
            Ok(status) => {
                let (drawn, clipped) = (status.drawn, status.clipped);
                if clipped > 0 {
                    info!("Showing {} of {} located machines", drawn, status.located);
                }
                if !self
                    .apply_if_current(generation, |snap| snap.map = status)
                    .is_stale()
                {
                    self.emit(ViewEvent::MarkersChanged { drawn, clipped });
                }
            }
            Err(e) => {
                warn!("Map update failed, fleet view stays usable: {}", e);
                let message = e.to_string();
                self.apply_if_current(generation, |snap| {
                    snap.map.unavailable = Some(message.clone());
                });
                self.emit(ViewEvent::MapUnavailable { message });
            }
        }
    }

    fn emit(&self, event: ViewEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }
}
