//! Response shapes of the suite API.
//!
//! Every field is optional on the wire; accessors fall back to `"unknown"`
//! the same way for every resource and alert.

use serde::{Deserialize, Serialize};
use serde_json::Value;

const UNKNOWN: &str = "unknown";

#[derive(Debug, Serialize)]
pub struct TokenRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub token: Option<String>,
}

/// One page of `GET /api/resources`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcePage {
    #[serde(default)]
    pub resource_list: Vec<Resource>,
    pub page_info: Option<PageInfo>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub total_count: Option<u64>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub identifier: Option<String>,
    #[serde(default)]
    pub resource_key: ResourceKey,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceKey {
    pub name: Option<String>,
    pub resource_kind_key: Option<String>,
    pub adapter_kind_key: Option<String>,
}

impl Resource {
    pub fn name(&self) -> &str {
        self.resource_key.name.as_deref().unwrap_or(UNKNOWN)
    }

    pub fn kind(&self) -> &str {
        self.resource_key
            .resource_kind_key
            .as_deref()
            .unwrap_or(UNKNOWN)
    }

    pub fn adapter_kind(&self) -> &str {
        self.resource_key
            .adapter_kind_key
            .as_deref()
            .unwrap_or(UNKNOWN)
    }
}

/// `GET /api/alerts`
#[derive(Debug, Default, Deserialize)]
pub struct AlertList {
    #[serde(default)]
    pub alerts: Vec<Alert>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub alert_level: Option<String>,
    pub status: Option<String>,
}

impl Alert {
    pub fn criticality(&self) -> &str {
        self.alert_level.as_deref().unwrap_or(UNKNOWN)
    }

    pub fn status(&self) -> &str {
        self.status.as_deref().unwrap_or(UNKNOWN)
    }
}

/// `GET /api/resources/{id}/stats`
#[derive(Debug, Default, Deserialize)]
pub struct StatsResponse {
    #[serde(default)]
    pub values: Vec<RawStat>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStat {
    #[serde(default)]
    pub stat_key: StatKey,
    /// Kept untyped: the upstream mixes numbers and nulls
    #[serde(default)]
    pub data: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatKey {
    pub key: Option<String>,
    pub unit: Option<String>,
}

/// `GET /api/supermetrics`
#[derive(Debug, Default, Deserialize)]
pub struct SuperMetricList {
    #[serde(default, rename = "super-metrics")]
    pub super_metrics: Vec<Value>,
}
