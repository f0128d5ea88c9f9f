/// HTTP request handlers
use crate::domain::{
    Bounds, FleetState, FleetSummary, Machine, MapStatus, Marker, Organization, SelectionState,
};
use crate::errors::{ApiError, ApiResult};
use crate::services::{FleetView, InMemoryMap};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub view: FleetView,
    pub map: Arc<InMemoryMap>,
}

/// Successful response wrapper
#[derive(Serialize)]
pub struct SuccessResponse<T: Serialize> {
    pub ok: bool,
    #[serde(flatten)]
    pub data: T,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn new(data: T) -> Self {
        Self { ok: true, data }
    }
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub now: DateTime<Utc>,
}

/// The visible page of the fleet list
#[derive(Debug, Serialize)]
pub struct FleetPage {
    pub generation: u64,
    pub organization_id: Option<String>,
    #[serde(flatten)]
    pub state: FleetState,
    pub machines: usize,
    pub alerts_loaded: bool,
    pub query: String,
    pub items: Vec<Machine>,
    pub total: usize,
    pub has_more: bool,
    pub capped_matches: usize,
}

#[derive(Debug, Serialize)]
pub struct MapPage {
    pub markers: Vec<Marker>,
    pub bounds: Option<Bounds>,
    #[serde(flatten)]
    pub status: MapStatus,
}

#[derive(Debug, Serialize)]
pub struct Accepted {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrganizationQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct OrganizationList {
    pub organizations: Vec<Organization>,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct SelectRequest {
    pub machine_id: Option<String>,
}

/// Health check handler
pub async fn health() -> Json<Health> {
    Json(Health {
        status: "ok",
        now: Utc::now(),
    })
}

/// Current fleet snapshot with the visible list page
pub async fn get_fleet(State(state): State<AppState>) -> Json<SuccessResponse<FleetPage>> {
    let snapshot = state.view.snapshot();
    let list = &snapshot.list;
    let page = FleetPage {
        generation: snapshot.generation,
        organization_id: snapshot.organization_id.clone(),
        state: snapshot.state.clone(),
        machines: snapshot.machines.len(),
        alerts_loaded: snapshot.alerts_loaded,
        query: list.query.clone(),
        items: list.visible_entries().to_vec(),
        total: list.entries.len(),
        has_more: list.has_more(),
        capped_matches: list.capped_matches,
    };
    Json(SuccessResponse::new(page))
}

/// Aggregates for the chart panels
pub async fn get_summary(State(state): State<AppState>) -> Json<SuccessResponse<FleetSummary>> {
    Json(SuccessResponse::new(state.view.summary()))
}

/// Organizations for the picker, optionally filtered with `?q=`
pub async fn list_organizations(
    Query(params): Query<OrganizationQuery>,
    State(state): State<AppState>,
) -> ApiResult<Json<SuccessResponse<OrganizationList>>> {
    let organizations = state.view.organizations(&params.q).await?;
    Ok(Json(SuccessResponse::new(OrganizationList { organizations })))
}

/// Start loading an organization; progress shows up in `GET /fleet`
pub async fn load_organization(
    Path(organization_id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<Json<SuccessResponse<Accepted>>> {
    let organization_id = organization_id.trim().to_string();
    if organization_id.is_empty() {
        return Err(ApiError::InvalidInput("organization id is empty".to_string()));
    }
    state.view.load_organization(&organization_id);
    Ok(Json(SuccessResponse::new(Accepted {
        accepted: true,
        target: Some(organization_id),
    })))
}

/// Reload the current organization, keeping the selection when possible
pub async fn refresh(State(state): State<AppState>) -> ApiResult<Json<SuccessResponse<Accepted>>> {
    state.view.refresh()?;
    Ok(Json(SuccessResponse::new(Accepted {
        accepted: true,
        target: state.view.snapshot().organization_id,
    })))
}

/// Debounced search over the loaded fleet
pub async fn search(
    State(state): State<AppState>,
    Json(body): Json<SearchRequest>,
) -> Json<SuccessResponse<Accepted>> {
    state.view.search(&body.query);
    Json(SuccessResponse::new(Accepted {
        accepted: true,
        target: Some(body.query),
    }))
}

/// Reveal the next chunk of the list
pub async fn load_more(State(state): State<AppState>) -> Json<SuccessResponse<serde_json::Value>> {
    let added = state.view.load_more();
    Json(SuccessResponse::new(serde_json::json!({ "added": added })))
}

pub async fn get_selection(State(state): State<AppState>) -> Json<SuccessResponse<SelectionState>> {
    Json(SuccessResponse::new(state.view.selection()))
}

/// Select a machine, or clear the selection with `{"machine_id": null}`
pub async fn select(
    State(state): State<AppState>,
    Json(body): Json<SelectRequest>,
) -> ApiResult<Json<SuccessResponse<SelectionState>>> {
    state.view.select(body.machine_id.as_deref())?;
    Ok(Json(SuccessResponse::new(state.view.selection())))
}

pub async fn toggle_alert(
    Path(alert_id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<Json<SuccessResponse<SelectionState>>> {
    if !state.view.toggle_alert(&alert_id) {
        return Err(ApiError::InvalidInput(format!(
            "alert {} is not shown for the selected machine",
            alert_id
        )));
    }
    Ok(Json(SuccessResponse::new(state.view.selection())))
}

/// Markers currently on the map surface
pub async fn get_map(State(state): State<AppState>) -> Json<SuccessResponse<MapPage>> {
    let view = state.map.view();
    Json(SuccessResponse::new(MapPage {
        markers: view.markers,
        bounds: view.bounds,
        status: state.view.snapshot().map,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ViewLimits;
    use crate::errors::{EngineError, FetchError};
    use crate::testing::FakeApi;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    fn app_state(api: FakeApi) -> AppState {
        let map = Arc::new(InMemoryMap::new());
        AppState {
            view: FleetView::new(Arc::new(api), map.clone(), ViewLimits::default()),
            map,
        }
    }

    #[tokio::test]
    async fn test_fleet_page_lists_visible_machines() {
        let state = app_state(FakeApi::new().with_fleet(
            "org1",
            vec![Machine::new("m1").with_location(1.0, 2.0), Machine::new("m2")],
        ));
        state.view.load_organization("org1").await.unwrap();

        let Json(page) = get_fleet(State(state.clone())).await;
        assert!(page.ok);
        assert_eq!(page.data.items.len(), 2);
        assert_eq!(page.data.state, FleetState::Ready);

        let Json(map) = get_map(State(state)).await;
        assert_eq!(map.data.markers.len(), 1);
        assert_eq!(map.data.status.drawn, 1);
    }

    #[tokio::test]
    async fn test_select_unknown_machine_is_not_found() {
        let state = app_state(FakeApi::new().with_fleet("org1", vec![Machine::new("m1")]));
        state.view.load_organization("org1").await.unwrap();

        let err = select(
            State(state),
            Json(SelectRequest {
                machine_id: Some("zz".to_string()),
            }),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, ApiError::Engine(EngineError::UnknownMachine(_))));
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_refresh_without_fleet_conflicts() {
        let state = app_state(FakeApi::new());
        let err = refresh(State(state)).await.err().unwrap();
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_organization_picker_filters_and_reports_upstream_errors() {
        let state = app_state(FakeApi::new().with_organizations(vec![
            Organization::new("4711", "Green Acres"),
            Organization::new("9001", "Prairie Farms"),
        ]));
        let Json(found) = list_organizations(
            Query(OrganizationQuery {
                q: "green".to_string(),
            }),
            State(state),
        )
        .await
        .unwrap();
        assert_eq!(found.data.organizations.len(), 1);
        assert_eq!(found.data.organizations[0].id, "4711");

        let failing = app_state(
            FakeApi::new().failing_organizations(FetchError::http_status(503, "maintenance")),
        );
        let err = list_organizations(Query(OrganizationQuery::default()), State(failing))
            .await
            .err()
            .unwrap();
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_blank_organization_rejected() {
        let state = app_state(FakeApi::new());
        let err = load_organization(Path("  ".to_string()), State(state))
            .await
            .err()
            .unwrap();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
