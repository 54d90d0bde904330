use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tracing::debug;

use crate::config::MetricsConfig;
use crate::upstream::models::StatsResponse;
use crate::upstream::{ApiCall, Endpoint, Upstream};

const UNKNOWN_KEY: &str = "unknown";

/// Most recent value of one statistic
#[derive(Debug, Clone, PartialEq)]
pub struct StatSample {
    pub metric_key: String,
    pub unit: String,
    pub value: f64,
}

/// Query window `[now - hours, now]` in epoch milliseconds
pub fn stats_window(now: DateTime<Utc>, hours: u32) -> (i64, i64) {
    let begin = now - ChronoDuration::hours(i64::from(hours));
    (begin.timestamp_millis(), now.timestamp_millis())
}

/// Keep the first `max` statistics, each reduced to its last value.
///
/// A statistic without data, or whose last point is not a number, is dropped.
pub fn latest_samples(response: StatsResponse, max: usize) -> Vec<StatSample> {
    response
        .values
        .into_iter()
        .take(max)
        .filter_map(|stat| {
            let value = stat.data.last()?.as_f64()?;
            Some(StatSample {
                metric_key: stat.stat_key.key.unwrap_or_else(|| UNKNOWN_KEY.to_string()),
                unit: stat.stat_key.unit.unwrap_or_default(),
                value,
            })
        })
        .collect()
}

/// Averaged statistics of one resource over the configured window
pub async fn collect_stats(
    upstream: &dyn Upstream,
    config: &MetricsConfig,
    resource_id: &str,
) -> Vec<StatSample> {
    let (begin, end) = stats_window(Utc::now(), config.stats_time_range_hours);
    let call = ApiCall::get(
        Endpoint::Stats,
        format!("/api/resources/{resource_id}/stats"),
        config.timeouts.for_endpoint(Endpoint::Stats),
    )
    .query("begin", begin)
    .query("end", end)
    .query("rollUpType", "AVG")
    .query("intervalType", "MINUTES")
    .query("intervalQuantifier", 5);

    let Some(value) = upstream.request(call).await else {
        return Vec::new();
    };

    match serde_json::from_value::<StatsResponse>(value) {
        Ok(response) => latest_samples(response, config.max_stats_per_resource),
        Err(e) => {
            debug!(resource_id, error = %e, "Malformed stats response");
            Vec::new()
        }
    }
}
