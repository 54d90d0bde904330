use std::time::Instant;
use tracing::{info, warn};

use crate::config::MetricsConfig;
use crate::observability::ExporterMetrics;
use crate::upstream::models::{Alert, AlertList};
use crate::upstream::{ApiCall, Endpoint, Upstream};

const ALERTS_PATH: &str = "/api/alerts";

/// Fetch the first alert page; an unavailable endpoint yields no alerts
pub async fn collect_alerts(
    upstream: &dyn Upstream,
    config: &MetricsConfig,
    metrics: &ExporterMetrics,
) -> Vec<Alert> {
    let started = Instant::now();
    let call = ApiCall::get(
        Endpoint::Alerts,
        ALERTS_PATH,
        config.timeouts.for_endpoint(Endpoint::Alerts),
    )
    .query("page", 0)
    .query("pageSize", config.page_size);

    let alerts = match upstream.request(call).await {
        Some(value) => match serde_json::from_value::<AlertList>(value) {
            Ok(list) => list.alerts,
            Err(e) => {
                warn!(error = %e, "Malformed alert list");
                metrics.record_error(Endpoint::Alerts, "decode");
                Vec::new()
            }
        },
        None => Vec::new(),
    };

    let elapsed = started.elapsed();
    metrics.observe_collection(Endpoint::Alerts, elapsed);
    info!(count = alerts.len(), elapsed_ms = elapsed.as_millis() as u64, "Collected alerts");

    alerts
}
