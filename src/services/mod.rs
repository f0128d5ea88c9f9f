/// View-synchronization services layer
mod alerts;
mod fleet;
mod markers;
mod search;
mod selection;

pub use alerts::load_alerts;
pub use fleet::FleetView;
pub use markers::{
    plan_markers, tone_for, InMemoryMap, MapSurface, MapView, MarkerPlan, MarkerReconciler,
};
pub use search::{filter_organizations, rank, SearchResult};
pub use selection::{PhaseChange, SelectionController, SelectionTicket};
