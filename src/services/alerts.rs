/// Best-effort alert fan-out across a fleet
use crate::clients::FleetApi;
use crate::domain::AlertMap;
use futures::future::join_all;
use tracing::{info, warn};

/// Fetch alerts for every machine concurrently.
///
/// Resolves once every call has settled. A failed call maps its machine to
/// an empty list; it never fails the aggregate.
pub async fn load_alerts(api: &dyn FleetApi, machine_ids: &[String]) -> AlertMap {
    let calls = machine_ids.iter().map(|id| async move {
        let alerts = match api.machine_alerts(id).await {
            Ok(alerts) => alerts,
            Err(e) => {
                warn!("Alert fetch failed for machine {} ({}): {}", id, e.kind, e.message);
                Vec::new()
            }
        };
        (id.clone(), alerts)
    });

    let settled = join_all(calls).await;
    let total: usize = settled.iter().map(|(_, alerts)| alerts.len()).sum();
    info!(
        "Aggregated {} alerts across {} machines",
        total,
        settled.len()
    );
    settled.into_iter().collect()
}
