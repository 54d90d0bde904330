use std::time::Instant;
use tracing::{info, warn};

use crate::config::MetricsConfig;
use crate::observability::ExporterMetrics;
use crate::upstream::models::SuperMetricList;
use crate::upstream::{ApiCall, Endpoint, Upstream};

const SUPERMETRICS_PATH: &str = "/api/supermetrics";

/// Number of super metric definitions, or `None` when the listing failed
pub async fn collect_supermetrics(
    upstream: &dyn Upstream,
    config: &MetricsConfig,
    metrics: &ExporterMetrics,
) -> Option<usize> {
    let started = Instant::now();
    let call = ApiCall::get(
        Endpoint::SuperMetrics,
        SUPERMETRICS_PATH,
        config.timeouts.for_endpoint(Endpoint::SuperMetrics),
    );

    let count = match upstream.request(call).await {
        Some(value) => match serde_json::from_value::<SuperMetricList>(value) {
            Ok(list) => Some(list.super_metrics.len()),
            Err(e) => {
                warn!(error = %e, "Malformed super metric list");
                metrics.record_error(Endpoint::SuperMetrics, "decode");
                None
            }
        },
        None => None,
    };

    metrics.observe_collection(Endpoint::SuperMetrics, started.elapsed());
    if let Some(count) = count {
        info!(count, "Collected super metrics");
    }

    count
}
