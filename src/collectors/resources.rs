use std::time::Instant;
use tracing::{info, warn};

use crate::config::MetricsConfig;
use crate::observability::ExporterMetrics;
use crate::upstream::models::{Resource, ResourcePage};
use crate::upstream::{ApiCall, Endpoint, Upstream};

const RESOURCES_PATH: &str = "/api/resources";

/// Fetch the whole inventory, page by page.
///
/// Stops once the reported total is covered, or on the first page that is
/// unavailable or empty. Whatever was fetched up to that point is returned.
pub async fn collect_resources(
    upstream: &dyn Upstream,
    config: &MetricsConfig,
    metrics: &ExporterMetrics,
) -> Vec<Resource> {
    let started = Instant::now();
    let timeout = config.timeouts.for_endpoint(Endpoint::Resources);
    let page_size = u64::from(config.page_size);

    let mut resources = Vec::new();
    let mut page: u64 = 0;

    loop {
        let call = ApiCall::get(Endpoint::Resources, RESOURCES_PATH, timeout)
            .query("page", page)
            .query("pageSize", page_size);

        let Some(value) = upstream.request(call).await else {
            if page > 0 {
                warn!(page, fetched = resources.len(), "Resource page unavailable, keeping partial inventory");
            }
            break;
        };

        let body: ResourcePage = match serde_json::from_value(value) {
            Ok(body) => body,
            Err(e) => {
                warn!(page, error = %e, "Malformed resource page");
                metrics.record_error(Endpoint::Resources, "decode");
                break;
            }
        };

        let received = body.resource_list.len();
        resources.extend(body.resource_list);
        if received == 0 {
            break;
        }

        let info = body.page_info.unwrap_or_default();
        let total = info.total_count.unwrap_or(0);
        let current = info.page.unwrap_or(page);
        let size = info.page_size.unwrap_or(page_size).max(1);
        if (current + 1) * size >= total {
            break;
        }
        page += 1;
    }

    let elapsed = started.elapsed();
    metrics.observe_collection(Endpoint::Resources, elapsed);
    info!(
        count = resources.len(),
        pages = page + 1,
        elapsed_ms = elapsed.as_millis() as u64,
        "Collected resources"
    );

    resources
}
