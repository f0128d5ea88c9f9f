/// Selected-machine state and its detail/alerts/engine-hours refresh
use crate::clients::FleetApi;
use crate::domain::{AlertView, Pane, SelectionPhase, SelectionState};
use crate::errors::{FetchError, FetchResult, Outcome};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Identity of one `select` call; continuations carry it back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionTicket {
    pub request: u64,
    pub machine_id: String,
}

/// Phase before and after an applied update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseChange {
    pub from: SelectionPhase,
    pub to: SelectionPhase,
}

impl PhaseChange {
    pub fn entered(&self, phase: SelectionPhase) -> bool {
        self.from != phase && self.to == phase
    }
}

pub struct SelectionController {
    api: Arc<dyn FleetApi>,
    state: watch::Sender<SelectionState>,
}

impl SelectionController {
    pub fn new(api: Arc<dyn FleetApi>) -> Self {
        let (state, _) = watch::channel(SelectionState::default());
        Self { api, state }
    }

    pub fn subscribe(&self) -> watch::Receiver<SelectionState> {
        self.state.subscribe()
    }

    pub fn current(&self) -> SelectionState {
        self.state.borrow().clone()
    }

    pub fn selected_id(&self) -> Option<String> {
        self.state.borrow().machine_id.clone()
    }

    pub fn phase(&self) -> SelectionPhase {
        self.state.borrow().phase()
    }

    /// Any state -> LOADING for `machine_id`. Earlier tickets become stale.
    pub fn begin(&self, machine_id: &str) -> SelectionTicket {
        let mut request = 0;
        self.state.send_modify(|s| {
            s.request += 1;
            request = s.request;
            s.machine_id = Some(machine_id.to_string());
            s.detail = Pane::Loading;
            s.alerts = Pane::Loading;
            s.engine_hours = Pane::Loading;
        });
        SelectionTicket {
            request,
            machine_id: machine_id.to_string(),
        }
    }

    /// `select(null)`: back to NONE with both panes cleared
    pub fn clear(&self) {
        self.state.send_modify(clear_selection);
    }

    /// Clear the selection and record the organization it now belongs to
    pub fn reset(&self, organization_id: Option<String>) {
        self.state.send_modify(|s| {
            s.organization_id = organization_id;
            clear_selection(s);
        });
    }

    /// Issue the detail, alerts and engine-hours fetches concurrently and
    /// apply each as it resolves. `on_ready` runs on every entry into READY.
    pub async fn load(&self, ticket: &SelectionTicket, on_ready: &(dyn Fn() + Send + Sync)) {
        let id = ticket.machine_id.as_str();

        let detail = async {
            let result = self.api.machine_detail(id).await;
            if let Outcome::Ok(change) = self.apply(ticket, result, |s, r| {
                s.detail = match r {
                    Ok(detail) => Pane::Ready(detail),
                    Err(e) => Pane::Error(format!("Could not load details: {}", e.user_message())),
                }
            }) {
                if change.entered(SelectionPhase::Ready) {
                    on_ready();
                }
            }
        };

        // No automatic retry: a failure stays in the alerts pane.
        let alerts = async {
            let result = self.api.machine_alerts(id).await;
            if let Outcome::Ok(change) = self.apply(ticket, result, |s, r| {
                s.alerts = match r {
                    Ok(alerts) => Pane::Ready(alerts.into_iter().map(AlertView::from).collect()),
                    Err(e) => Pane::Error(format!("Could not load alerts: {}", e.user_message())),
                }
            }) {
                if change.entered(SelectionPhase::Ready) {
                    on_ready();
                }
            }
        };

        let hours = async {
            let result = self.api.engine_hours(id).await;
            self.apply(ticket, result, |s, r| {
                s.engine_hours = match r {
                    Ok(hours) => Pane::Ready(hours),
                    Err(e) => Pane::Error(e.user_message()),
                }
            });
        };

        tokio::join!(detail, alerts, hours);
    }

    /// Apply one fetch result if `ticket` still names the current selection.
    fn apply<T>(
        &self,
        ticket: &SelectionTicket,
        result: FetchResult<T>,
        write: impl FnOnce(&mut SelectionState, FetchResult<T>),
    ) -> Outcome<PhaseChange> {
        let error: Option<FetchError> = result.as_ref().err().cloned();
        let mut change = None;
        self.state.send_if_modified(|s| {
            if !s.is_current(ticket.request, &ticket.machine_id) {
                return false;
            }
            let from = s.phase();
            write(s, result);
            change = Some(PhaseChange { from, to: s.phase() });
            true
        });

        match (change, error) {
            (None, _) => {
                debug!(
                    "Dropping stale response for machine {} (request {})",
                    ticket.machine_id, ticket.request
                );
                Outcome::Stale
            }
            (Some(_), Some(e)) => {
                warn!("Selection fetch failed for machine {}: {}", ticket.machine_id, e);
                Outcome::Err(e)
            }
            (Some(change), None) => Outcome::Ok(change),
        }
    }

    /// Flip the expanded flag of one alert row
    pub fn toggle_alert(&self, alert_id: &str) -> bool {
        self.state.send_if_modified(|s| match &mut s.alerts {
            Pane::Ready(alerts) => match alerts.iter_mut().find(|a| a.alert.id == alert_id) {
                Some(row) => {
                    row.expanded = !row.expanded;
                    true
                }
                None => false,
            },
            _ => false,
        })
    }
}

fn clear_selection(s: &mut SelectionState) {
    s.request += 1;
    s.machine_id = None;
    s.detail = Pane::Idle;
    s.alerts = Pane::Idle;
    s.engine_hours = Pane::Idle;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Alert, Severity};
    use crate::testing::FakeApi;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn controller(api: FakeApi) -> SelectionController {
        SelectionController::new(Arc::new(api))
    }

    #[tokio::test]
    async fn test_select_loads_both_panes() {
        let ctl = controller(
            FakeApi::new()
                .with_detail("m1", "Tractor A")
                .with_alerts("m1", vec![Alert::new("a1", Severity::Low)]),
        );
        let ready_calls = AtomicUsize::new(0);
        let ticket = ctl.begin("m1");
        assert_eq!(ctl.phase(), SelectionPhase::Loading);

        ctl.load(&ticket, &|| {
            ready_calls.fetch_add(1, Ordering::SeqCst);
        })
        .await;

        let state = ctl.current();
        assert_eq!(state.phase(), SelectionPhase::Ready);
        assert_eq!(
            state.detail.ready().unwrap().machine.name.as_deref(),
            Some("Tractor A")
        );
        assert_eq!(state.alerts.ready().unwrap().len(), 1);
        assert_eq!(ready_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_alert_failure_keeps_detail_visible() {
        let ctl = controller(
            FakeApi::new()
                .with_detail("m1", "Tractor A")
                .failing_alerts("m1", FetchError::http_status(500, "boom")),
        );
        let ticket = ctl.begin("m1");
        ctl.load(&ticket, &|| {}).await;

        let state = ctl.current();
        assert_eq!(state.phase(), SelectionPhase::Error);
        assert!(state.detail.is_ready());
        assert!(state.alerts.is_error());
    }

    #[tokio::test]
    async fn test_detail_failure_keeps_alerts_visible() {
        let ctl = controller(
            FakeApi::new()
                .failing_detail("m1", FetchError::network("reset"))
                .with_alerts("m1", vec![Alert::new("a1", Severity::High)]),
        );
        let ticket = ctl.begin("m1");
        ctl.load(&ticket, &|| {}).await;

        let state = ctl.current();
        assert!(state.detail.is_error());
        assert_eq!(state.alerts.ready().map(Vec::len), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_panes_update_independently() {
        let ctl = Arc::new(controller(
            FakeApi::new()
                .with_detail("m1", "Tractor A")
                .delay("detail:m1", Duration::from_secs(10))
                .delay("alerts:m1", Duration::from_secs(1)),
        ));
        let ticket = ctl.begin("m1");
        let task = {
            let ctl = ctl.clone();
            let ticket = ticket.clone();
            tokio::spawn(async move { ctl.load(&ticket, &|| {}).await })
        };

        tokio::time::sleep(Duration::from_secs(2)).await;
        let state = ctl.current();
        assert!(state.alerts.is_ready());
        assert_eq!(state.detail, Pane::Loading);

        task.await.unwrap();
        assert_eq!(ctl.phase(), SelectionPhase::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_response_for_superseded_selection_is_dropped() {
        let ctl = Arc::new(controller(
            FakeApi::new()
                .with_detail("a", "Slow A")
                .with_detail("b", "Fast B")
                .delay("detail:a", Duration::from_secs(5))
                .delay("alerts:a", Duration::from_secs(5)),
        ));

        let first = ctl.begin("a");
        let slow = {
            let ctl = ctl.clone();
            tokio::spawn(async move { ctl.load(&first, &|| {}).await })
        };
        let second = ctl.begin("b");
        ctl.load(&second, &|| {}).await;
        slow.await.unwrap();

        let state = ctl.current();
        assert_eq!(state.machine_id.as_deref(), Some("b"));
        assert_eq!(
            state.detail.ready().unwrap().machine.name.as_deref(),
            Some("Fast B")
        );
    }

    #[tokio::test]
    async fn test_clear_returns_to_none_and_drops_inflight() {
        let ctl = controller(FakeApi::new().with_detail("m1", "Tractor A"));
        let ticket = ctl.begin("m1");
        ctl.clear();
        ctl.load(&ticket, &|| {}).await;

        let state = ctl.current();
        assert_eq!(state.phase(), SelectionPhase::None);
        assert_eq!(state.detail, Pane::Idle);
        assert_eq!(state.alerts, Pane::Idle);
    }

    #[tokio::test]
    async fn test_toggle_alert_flips_expanded() {
        let ctl = controller(
            FakeApi::new()
                .with_detail("m1", "Tractor A")
                .with_alerts("m1", vec![Alert::new("a1", Severity::Info)]),
        );
        let ticket = ctl.begin("m1");
        ctl.load(&ticket, &|| {}).await;

        assert!(ctl.toggle_alert("a1"));
        assert!(ctl.current().alerts.ready().unwrap()[0].expanded);
        assert!(ctl.toggle_alert("a1"));
        assert!(!ctl.current().alerts.ready().unwrap()[0].expanded);
        assert!(!ctl.toggle_alert("missing"));
    }

    #[tokio::test]
    async fn test_engine_hours_pane_carries_reading() {
        let ctl = controller(
            FakeApi::new()
                .with_detail("m1", "Tractor A")
                .with_hours("m1", 1520.0),
        );
        let ticket = ctl.begin("m1");
        ctl.load(&ticket, &|| {}).await;

        let state = ctl.current();
        let hours = state.engine_hours.ready().unwrap();
        assert_eq!(hours.hours, 1520.0);
        assert_eq!(hours.unit, "Hours");
        assert_eq!(state.phase(), SelectionPhase::Ready);
    }

    #[tokio::test]
    async fn test_engine_hours_failure_does_not_block_ready() {
        let ctl = controller(FakeApi::new().with_detail("m1", "Tractor A"));
        let ticket = ctl.begin("m1");
        ctl.load(&ticket, &|| {}).await;

        let state = ctl.current();
        assert!(state.engine_hours.is_error());
        assert_eq!(state.phase(), SelectionPhase::Ready);
    }
}
