use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::upstream::Endpoint;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default, rename = "vmware_aria")]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub exporter: ExporterConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub labels: LabelsConfig,
}

impl AppConfig {
    /// Copy of the configuration that is safe to print.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.upstream.password.is_empty() {
            copy.upstream.password = "********".to_string();
        }
        copy
    }
}

/// Connection settings for the Aria Operations host
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_username")]
    pub username: String,
    /// Falls back to `VMWARE_ARIA_PASSWORD` when left empty
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub verify_ssl: bool,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl UpstreamConfig {
    /// Base URL of the suite API.
    ///
    /// A host given with an explicit scheme is used as-is, otherwise HTTPS is
    /// assumed.
    pub fn base_url(&self) -> String {
        let host = self.host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            format!("{host}/suite-api")
        } else {
            format!("https://{host}/suite-api")
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            username: default_username(),
            password: String::new(),
            verify_ssl: false,
            retry: RetryConfig::default(),
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_username() -> String {
    "admin".to_string()
}

/// Retry budget for idempotent upstream calls
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Total attempts, the first one included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    1000
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

/// Exporter runtime settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExporterConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Seconds between two collection cycles
    #[serde(default = "default_interval")]
    pub interval: u64,
    #[serde(default)]
    pub log_level: LogLevel,
    /// Seconds to wait after a failed cycle
    #[serde(default = "default_error_cooldown")]
    pub error_cooldown: u64,
}

impl ExporterConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    pub fn error_cooldown(&self) -> Duration {
        Duration::from_secs(self.error_cooldown)
    }
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            interval: default_interval(),
            log_level: LogLevel::default(),
            error_cooldown: default_error_cooldown(),
        }
    }
}

fn default_port() -> u16 {
    8000
}

fn default_interval() -> u64 {
    300
}

fn default_error_cooldown() -> u64 {
    60
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    #[serde(alias = "debug")]
    Debug,
    #[default]
    #[serde(alias = "info")]
    Info,
    #[serde(alias = "warning", alias = "WARN", alias = "warn")]
    Warning,
    #[serde(alias = "error")]
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }

    /// Directive understood by `tracing_subscriber::EnvFilter`
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARNING" | "WARN" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level: {other}")),
        }
    }
}

/// Collection tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricsConfig {
    /// Resource kinds that get per-resource stats fetches
    #[serde(default = "default_detailed_resource_types")]
    pub detailed_resource_types: Vec<String>,
    #[serde(default = "default_max_stats_per_resource")]
    pub max_stats_per_resource: usize,
    #[serde(default = "default_stats_time_range_hours")]
    pub stats_time_range_hours: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default)]
    pub timeouts: Timeouts,
}

impl MetricsConfig {
    pub fn is_detailed(&self, resource_kind: &str) -> bool {
        self.detailed_resource_types
            .iter()
            .any(|kind| kind == resource_kind)
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            detailed_resource_types: default_detailed_resource_types(),
            max_stats_per_resource: default_max_stats_per_resource(),
            stats_time_range_hours: default_stats_time_range_hours(),
            page_size: default_page_size(),
            timeouts: Timeouts::default(),
        }
    }
}

fn default_detailed_resource_types() -> Vec<String> {
    ["VirtualMachine", "HostSystem", "ClusterComputeResource"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_max_stats_per_resource() -> usize {
    10
}

fn default_stats_time_range_hours() -> u32 {
    1
}

fn default_page_size() -> u32 {
    1000
}

/// Per-endpoint request timeouts in seconds.
///
/// Every key has its own default so a file that sets only some of them keeps
/// the rest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Timeouts {
    #[serde(default = "default_auth_timeout")]
    pub auth: u64,
    #[serde(default = "default_resources_timeout")]
    pub resources: u64,
    #[serde(default = "default_alerts_timeout")]
    pub alerts: u64,
    #[serde(default = "default_stats_timeout")]
    pub stats: u64,
    #[serde(default = "default_supermetrics_timeout")]
    pub supermetrics: u64,
}

impl Timeouts {
    pub fn for_endpoint(&self, endpoint: Endpoint) -> Duration {
        let secs = match endpoint {
            Endpoint::Auth => self.auth,
            Endpoint::Resources => self.resources,
            Endpoint::Alerts => self.alerts,
            Endpoint::Stats => self.stats,
            Endpoint::SuperMetrics => self.supermetrics,
        };
        Duration::from_secs(secs)
    }

    pub(crate) fn entries(&self) -> [(&'static str, u64); 5] {
        [
            ("auth", self.auth),
            ("resources", self.resources),
            ("alerts", self.alerts),
            ("stats", self.stats),
            ("supermetrics", self.supermetrics),
        ]
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            auth: default_auth_timeout(),
            resources: default_resources_timeout(),
            alerts: default_alerts_timeout(),
            stats: default_stats_timeout(),
            supermetrics: default_supermetrics_timeout(),
        }
    }
}

fn default_auth_timeout() -> u64 {
    30
}

fn default_resources_timeout() -> u64 {
    60
}

fn default_alerts_timeout() -> u64 {
    30
}

fn default_stats_timeout() -> u64 {
    45
}

fn default_supermetrics_timeout() -> u64 {
    30
}

/// Label configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LabelsConfig {
    /// Labels attached to every series
    #[serde(default, rename = "static")]
    pub static_labels: BTreeMap<String, String>,
    /// Label name -> regex matched against the resource name
    #[serde(default)]
    pub resource_patterns: BTreeMap<String, String>,
}
