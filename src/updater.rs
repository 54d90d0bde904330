//! One collection cycle: fetch everything, then apply it to the registry
//!
//! Fetching happens without holding the snapshot lock. The apply phase takes
//! the write half and sets every series of the cycle before releasing it, so
//! scrapes see either the previous cycle or this one.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

use crate::collectors::{self, StatSample};
use crate::config::AppConfig;
use crate::labels::{LabelDeriver, LabelSet};
use crate::observability::{ExporterMetrics, MetricsError};
use crate::upstream::Upstream;
use crate::upstream::models::{Alert, Resource};

const UPSTREAM_VERSION: &str = "unknown";

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("failed to update metrics: {0}")]
    Registry(#[from] MetricsError),

    #[error("collection task panicked: {0}")]
    Panicked(String),
}

/// Everything one cycle observed, ready to be written
#[derive(Debug, Default)]
pub struct CycleSnapshot {
    /// (resource kind, adapter kind) -> count
    pub resource_counts: BTreeMap<(String, String), i64>,
    /// (criticality, status) -> count
    pub alert_counts: BTreeMap<(String, String), i64>,
    pub performance: Vec<(LabelSet, f64)>,
    pub supermetrics: Option<usize>,
}

pub struct Updater {
    upstream: Arc<dyn Upstream>,
    config: Arc<AppConfig>,
    metrics: Arc<ExporterMetrics>,
    deriver: LabelDeriver,
    static_labels: LabelSet,
}

impl Updater {
    pub fn new(
        upstream: Arc<dyn Upstream>,
        config: Arc<AppConfig>,
        metrics: Arc<ExporterMetrics>,
    ) -> Self {
        let deriver = LabelDeriver::new(&config.labels.resource_patterns);
        let mut static_labels = LabelSet::new();
        static_labels.extend(&config.labels.static_labels);

        Self {
            upstream,
            config,
            metrics,
            deriver,
            static_labels,
        }
    }

    pub async fn run_cycle(&self) -> Result<(), CycleError> {
        let started = Instant::now();
        info!("Starting metrics collection");

        let snapshot = self.collect().await;
        self.apply(&snapshot).await?;

        info!(
            resource_series = snapshot.resource_counts.len(),
            alert_series = snapshot.alert_counts.len(),
            performance_series = snapshot.performance.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Metrics collection completed"
        );
        Ok(())
    }

    /// Fetch phase; never touches the registry series
    pub async fn collect(&self) -> CycleSnapshot {
        let metrics_config = &self.config.metrics;
        let upstream = self.upstream.as_ref();

        let (resources, alerts, supermetrics) = tokio::join!(
            collectors::collect_resources(upstream, metrics_config, &self.metrics),
            collectors::collect_alerts(upstream, metrics_config, &self.metrics),
            collectors::collect_supermetrics(upstream, metrics_config, &self.metrics),
        );

        let mut snapshot = CycleSnapshot {
            supermetrics,
            ..CycleSnapshot::default()
        };
        self.walk_resources(&resources, &mut snapshot).await;
        count_alerts(&alerts, &mut snapshot);

        snapshot
    }

    async fn walk_resources(&self, resources: &[Resource], snapshot: &mut CycleSnapshot) {
        for resource in resources {
            *snapshot
                .resource_counts
                .entry((resource.kind().to_string(), resource.adapter_kind().to_string()))
                .or_default() += 1;

            if !self.config.metrics.is_detailed(resource.kind()) {
                continue;
            }
            let Some(resource_id) = resource.identifier.as_deref() else {
                debug!(resource_name = resource.name(), "Detailed resource has no identifier");
                continue;
            };

            let samples =
                collectors::collect_stats(self.upstream.as_ref(), &self.config.metrics, resource_id)
                    .await;
            if samples.is_empty() {
                continue;
            }

            let derived = self.deriver.derive(resource.name());
            for sample in samples {
                let labels = self.performance_labels(resource, resource_id, &sample, &derived);
                snapshot.performance.push((labels, sample.value));
            }
        }
    }

    fn performance_labels(
        &self,
        resource: &Resource,
        resource_id: &str,
        sample: &StatSample,
        derived: &LabelSet,
    ) -> LabelSet {
        let mut labels = self
            .static_labels
            .clone()
            .with("resource_id", resource_id)
            .with("resource_name", resource.name())
            .with("resource_type", resource.kind())
            .with("metric_name", sample.metric_key.as_str())
            .with("unit", sample.unit.as_str());
        for (name, value) in derived.iter() {
            labels.insert(name, value);
        }
        labels
    }

    /// Apply phase; holds the snapshot write lock throughout
    pub async fn apply(&self, snapshot: &CycleSnapshot) -> Result<(), CycleError> {
        let update = self.metrics.begin_update().await;

        update.set_info(
            &self
                .static_labels
                .clone()
                .with("host", self.config.upstream.host.as_str())
                .with("version", UPSTREAM_VERSION)
                .with("exporter_version", env!("CARGO_PKG_VERSION")),
        )?;

        for (labels, value) in &snapshot.performance {
            update.set_performance(labels, *value)?;
        }

        for ((kind, adapter_kind), count) in &snapshot.resource_counts {
            let labels = self
                .static_labels
                .clone()
                .with("resource_type", kind.as_str())
                .with("adapter_kind", adapter_kind.as_str());
            update.set_resource_count(&labels, *count)?;
        }

        for ((criticality, status), count) in &snapshot.alert_counts {
            let labels = self
                .static_labels
                .clone()
                .with("criticality", criticality.as_str())
                .with("status", status.as_str());
            update.set_alert_count(&labels, *count)?;
        }

        if let Some(count) = snapshot.supermetrics {
            update.set_supermetric_count(&self.static_labels, count as i64)?;
        }

        Ok(())
    }
}

fn count_alerts(alerts: &[Alert], snapshot: &mut CycleSnapshot) {
    for alert in alerts {
        *snapshot
            .alert_counts
            .entry((alert.criticality().to_string(), alert.status().to_string()))
            .or_default() += 1;
    }
}
