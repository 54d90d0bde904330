//! Metrics registry shared by the collection cycle and the scrape listener
//!
//! All metric families are registered once at startup with label schemas
//! derived from configuration. Cycle results are written through a
//! [`SnapshotUpdate`], which holds the write half of the snapshot lock, so a
//! scrape never sees a half-applied cycle.

use prometheus::{
    Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{RwLock, RwLockWriteGuard};

use crate::config::LabelsConfig;
use crate::labels::{LabelSchema, LabelSet, SchemaError};
use crate::upstream::Endpoint;

pub const INFO_LABELS: &[&str] = &["host", "version", "exporter_version"];
pub const RESOURCE_LABELS: &[&str] = &["resource_type", "adapter_kind"];
pub const ALERT_LABELS: &[&str] = &["criticality", "status"];
pub const PERFORMANCE_LABELS: &[&str] = &[
    "resource_id",
    "resource_name",
    "resource_type",
    "metric_name",
    "unit",
];

const COLLECTION_BUCKETS: &[f64] = &[0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0];

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("metrics registry error: {0}")]
    Registry(#[from] prometheus::Error),

    #[error("label schema error: {0}")]
    Schema(#[from] SchemaError),
}

/// Process-owned registry and every metric family the exporter writes
pub struct ExporterMetrics {
    registry: Registry,
    snapshot: RwLock<()>,

    pub info: GaugeVec,
    pub resources: IntGaugeVec,
    pub alerts: IntGaugeVec,
    pub performance: GaugeVec,
    pub supermetrics: IntGaugeVec,

    pub collection_duration: HistogramVec,
    pub collection_errors: IntCounterVec,
    pub api_requests: IntCounterVec,
    pub api_request_duration: HistogramVec,

    info_schema: LabelSchema,
    resource_schema: LabelSchema,
    alert_schema: LabelSchema,
    performance_schema: LabelSchema,
    supermetric_schema: LabelSchema,
}

impl ExporterMetrics {
    /// Register all families.
    ///
    /// Static label names join every data family; pattern label names join
    /// the performance family as optional labels.
    pub fn new(labels: &LabelsConfig) -> Result<Self, MetricsError> {
        let registry = Registry::new();
        let static_names: Vec<&str> = labels.static_labels.keys().map(String::as_str).collect();
        let pattern_names: Vec<&str> =
            labels.resource_patterns.keys().map(String::as_str).collect();
        let with_static = |base: &[&str]| -> Vec<String> {
            base.iter().chain(&static_names).map(|s| s.to_string()).collect()
        };

        let info_schema = LabelSchema::new(
            "vmware_aria_operations_info",
            with_static(INFO_LABELS),
            Vec::<String>::new(),
        )?;
        let resource_schema = LabelSchema::new(
            "vmware_aria_resources_total",
            with_static(RESOURCE_LABELS),
            Vec::<String>::new(),
        )?;
        let alert_schema = LabelSchema::new(
            "vmware_aria_alerts_total",
            with_static(ALERT_LABELS),
            Vec::<String>::new(),
        )?;
        let performance_schema = LabelSchema::new(
            "vmware_aria_performance_metric",
            with_static(PERFORMANCE_LABELS),
            pattern_names,
        )?;
        let supermetric_schema = LabelSchema::new(
            "vmware_aria_supermetrics_total",
            static_names.clone(),
            Vec::<String>::new(),
        )?;

        let info = register(
            &registry,
            GaugeVec::new(
                Opts::new(info_schema.metric(), "VMware Aria Operations system information"),
                &info_schema.names(),
            )?,
        )?;
        let resources = register(
            &registry,
            IntGaugeVec::new(
                Opts::new(resource_schema.metric(), "Total number of resources by type"),
                &resource_schema.names(),
            )?,
        )?;
        let alerts = register(
            &registry,
            IntGaugeVec::new(
                Opts::new(alert_schema.metric(), "Total number of alerts by criticality"),
                &alert_schema.names(),
            )?,
        )?;
        let performance = register(
            &registry,
            GaugeVec::new(
                Opts::new(
                    performance_schema.metric(),
                    "Performance metrics from resources",
                ),
                &performance_schema.names(),
            )?,
        )?;
        let supermetrics = register(
            &registry,
            IntGaugeVec::new(
                Opts::new(
                    supermetric_schema.metric(),
                    "Number of super metric definitions",
                ),
                &supermetric_schema.names(),
            )?,
        )?;

        let collection_duration = register(
            &registry,
            HistogramVec::new(
                HistogramOpts::new(
                    "vmware_aria_collection_duration_seconds",
                    "Time spent collecting metrics",
                )
                .buckets(COLLECTION_BUCKETS.to_vec()),
                &["endpoint"],
            )?,
        )?;
        let collection_errors = register(
            &registry,
            IntCounterVec::new(
                Opts::new(
                    "vmware_aria_collection_errors_total",
                    "Total number of collection errors",
                ),
                &["endpoint", "error_type"],
            )?,
        )?;
        let api_requests = register(
            &registry,
            IntCounterVec::new(
                Opts::new("vmware_aria_api_requests_total", "Total number of API requests"),
                &["endpoint", "method", "status_code"],
            )?,
        )?;
        let api_request_duration = register(
            &registry,
            HistogramVec::new(
                HistogramOpts::new(
                    "vmware_aria_api_request_duration_seconds",
                    "API request duration",
                ),
                &["endpoint", "method"],
            )?,
        )?;

        Ok(Self {
            registry,
            snapshot: RwLock::new(()),
            info,
            resources,
            alerts,
            performance,
            supermetrics,
            collection_duration,
            collection_errors,
            api_requests,
            api_request_duration,
            info_schema,
            resource_schema,
            alert_schema,
            performance_schema,
            supermetric_schema,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// One HTTP exchange with the upstream, whatever its outcome
    pub fn record_request(&self, endpoint: Endpoint, method: &str, status: &str, elapsed: Duration) {
        self.api_requests
            .with_label_values(&[endpoint.as_str(), method, status])
            .inc();
        self.api_request_duration
            .with_label_values(&[endpoint.as_str(), method])
            .observe(elapsed.as_secs_f64());
    }

    pub fn record_error(&self, endpoint: Endpoint, error_type: &str) {
        self.collection_errors
            .with_label_values(&[endpoint.as_str(), error_type])
            .inc();
        tracing::debug!(counter = "collection_errors", %endpoint, error_type, "Metric incremented");
    }

    pub fn observe_collection(&self, endpoint: Endpoint, elapsed: Duration) {
        self.collection_duration
            .with_label_values(&[endpoint.as_str()])
            .observe(elapsed.as_secs_f64());
    }

    /// Exclusive access for applying one cycle
    pub async fn begin_update(&self) -> SnapshotUpdate<'_> {
        SnapshotUpdate {
            metrics: self,
            _guard: self.snapshot.write().await,
        }
    }

    /// Text exposition of the current snapshot
    pub async fn encode(&self) -> Result<String, MetricsError> {
        let families = {
            let _guard = self.snapshot.read().await;
            self.registry.gather()
        };

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()).into())
    }
}

/// Series writes for one cycle; holds the snapshot write lock until dropped
pub struct SnapshotUpdate<'a> {
    metrics: &'a ExporterMetrics,
    _guard: RwLockWriteGuard<'a, ()>,
}

impl SnapshotUpdate<'_> {
    pub fn set_info(&self, labels: &LabelSet) -> Result<(), MetricsError> {
        let values = self.metrics.info_schema.resolve(labels)?;
        self.metrics
            .info
            .get_metric_with_label_values(&values)?
            .set(1.0);
        Ok(())
    }

    pub fn set_performance(&self, labels: &LabelSet, value: f64) -> Result<(), MetricsError> {
        let values = self.metrics.performance_schema.resolve(labels)?;
        self.metrics
            .performance
            .get_metric_with_label_values(&values)?
            .set(value);
        Ok(())
    }

    pub fn set_resource_count(&self, labels: &LabelSet, count: i64) -> Result<(), MetricsError> {
        let values = self.metrics.resource_schema.resolve(labels)?;
        self.metrics
            .resources
            .get_metric_with_label_values(&values)?
            .set(count);
        Ok(())
    }

    pub fn set_alert_count(&self, labels: &LabelSet, count: i64) -> Result<(), MetricsError> {
        let values = self.metrics.alert_schema.resolve(labels)?;
        self.metrics
            .alerts
            .get_metric_with_label_values(&values)?
            .set(count);
        Ok(())
    }

    pub fn set_supermetric_count(&self, labels: &LabelSet, count: i64) -> Result<(), MetricsError> {
        let values = self.metrics.supermetric_schema.resolve(labels)?;
        self.metrics
            .supermetrics
            .get_metric_with_label_values(&values)?
            .set(count);
        Ok(())
    }
}

fn register<C>(registry: &Registry, collector: C) -> Result<C, prometheus::Error>
where
    C: prometheus::core::Collector + Clone + 'static,
{
    registry.register(Box::new(collector.clone()))?;
    Ok(collector)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn labels_config() -> LabelsConfig {
        LabelsConfig {
            static_labels: BTreeMap::from([("datacenter".to_string(), "dc1".to_string())]),
            resource_patterns: BTreeMap::from([(
                "vm_number".to_string(),
                r"^vm-(\d+)$".to_string(),
            )]),
        }
    }

    #[tokio::test]
    async fn test_counts_are_replaced_not_accumulated() {
        let metrics = ExporterMetrics::new(&labels_config()).unwrap();
        let labels = LabelSet::new()
            .with("resource_type", "VirtualMachine")
            .with("adapter_kind", "VMWARE")
            .with("datacenter", "dc1");

        metrics.begin_update().await.set_resource_count(&labels, 5).unwrap();
        metrics.begin_update().await.set_resource_count(&labels, 7).unwrap();

        let value = metrics
            .resources
            .with_label_values(&["VirtualMachine", "VMWARE", "dc1"])
            .get();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_missing_static_label_is_rejected() {
        let metrics = ExporterMetrics::new(&labels_config()).unwrap();
        let labels = LabelSet::new()
            .with("criticality", "CRITICAL")
            .with("status", "ACTIVE");

        let result = metrics.begin_update().await.set_alert_count(&labels, 1);
        assert!(matches!(result, Err(MetricsError::Schema(_))));
    }

    #[tokio::test]
    async fn test_optional_pattern_label_and_encoding() {
        let metrics = ExporterMetrics::new(&labels_config()).unwrap();
        let labels = LabelSet::new()
            .with("resource_id", "r-1")
            .with("resource_name", "host-1")
            .with("resource_type", "HostSystem")
            .with("metric_name", "cpu|usage_average")
            .with("unit", "%")
            .with("datacenter", "dc1");

        metrics
            .begin_update()
            .await
            .set_performance(&labels, 12.5)
            .unwrap();

        let text = metrics.encode().await.unwrap();
        assert!(text.contains("vmware_aria_performance_metric{"));
        assert!(text.contains("resource_name=\"host-1\""));
        assert!(text.contains("12.5"));
        assert!(text.contains("vm_number=\"\""));
    }

    #[test]
    fn test_request_and_error_counters() {
        let metrics = ExporterMetrics::new(&LabelsConfig::default()).unwrap();

        metrics.record_request(Endpoint::Alerts, "GET", "200", Duration::from_millis(20));
        metrics.record_request(Endpoint::Alerts, "GET", "200", Duration::from_millis(30));
        metrics.record_error(Endpoint::Stats, "timeout");

        let families: Vec<String> = metrics
            .registry()
            .gather()
            .iter()
            .map(|f| f.get_name().to_string())
            .collect();
        assert!(families.contains(&"vmware_aria_api_requests_total".to_string()));
        assert!(families.contains(&"vmware_aria_collection_errors_total".to_string()));

        assert_eq!(
            metrics
                .api_requests
                .with_label_values(&["alerts", "GET", "200"])
                .get(),
            2
        );
        assert_eq!(
            metrics
                .collection_errors
                .with_label_values(&["stats", "timeout"])
                .get(),
            1
        );
    }
}
