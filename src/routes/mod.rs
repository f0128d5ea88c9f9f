/// Application routes configuration
use crate::handlers::{
    get_fleet, get_map, get_selection, get_summary, health, list_organizations, load_more,
    load_organization, refresh, search, select, toggle_alert, AppState,
};
use axum::{
    routing::{get, post},
    Router,
};

/// Build the application router with all routes
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health))
        // Fleet snapshot and list
        .route("/fleet", get(get_fleet))
        .route("/fleet/summary", get(get_summary))
        .route("/fleet/refresh", post(refresh))
        // Organization picker
        .route("/organizations", get(list_organizations))
        .route("/organizations/:id/load", post(load_organization))
        .route("/search", post(search))
        .route("/list/more", post(load_more))
        // Selection
        .route("/selection", get(get_selection).post(select))
        .route("/selection/alerts/:alert_id/toggle", post(toggle_alert))
        // Map
        .route("/map", get(get_map))
        .with_state(state)
}
