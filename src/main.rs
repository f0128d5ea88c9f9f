/// Fleet view shell: engine wiring plus the HTTP surface
use fleet_view::clients::{FetchGateway, HttpFleetApi};
use fleet_view::config::EngineConfig;
use fleet_view::domain::ViewEvent;
use fleet_view::handlers::AppState;
use fleet_view::routes::build_router;
use fleet_view::services::{FleetView, InMemoryMap};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    // Load configuration
    let config = EngineConfig::from_env()?;
    info!("Configuration loaded successfully");
    if config.api_token.is_empty() {
        warn!("FLEET_API_TOKEN is not set; requests go out unauthenticated");
    }

    // Initialize the fleet API client
    let gateway = FetchGateway::from_config(&config)?;
    info!("Fleet API at {}", gateway.base_url());
    let api = Arc::new(HttpFleetApi::new(gateway));

    // Initialize the engine
    let map = Arc::new(InMemoryMap::new());
    let view = FleetView::new(api, map.clone(), config.limits.clone());

    start_event_logger(&view);

    if let Some(organization_id) = &config.default_organization_id {
        info!("Loading default organization {}", organization_id);
        view.load_organization(organization_id);
    }

    let state = AppState { view, map };

    // Build router
    let app = build_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("fleet_view listening on {}", config.bind_addr);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

/// Log every change notification the engine emits
fn start_event_logger(view: &FleetView) {
    let mut events = view.subscribe_events();
    tokio::spawn(async move {
        info!("Starting view event logger");
        loop {
            match events.recv().await {
                Ok(ViewEvent::MapUnavailable { message }) => warn!("Map unavailable: {}", message),
                Ok(ViewEvent::MarkersChanged { drawn, clipped }) if clipped > 0 => {
                    info!("Map shows {} markers, {} clipped", drawn, clipped)
                }
                Ok(event) => debug!("View event: {:?}", event),
                Err(RecvError::Lagged(skipped)) => warn!("View event logger skipped {} events", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    });
}
