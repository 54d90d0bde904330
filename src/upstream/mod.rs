//! Upstream (Aria Operations suite API) access
//!
//! [`AriaClient`] owns the authenticated session. Collectors only see the
//! [`Upstream`] trait, so they can run against a stub in tests.

mod client;
pub mod error;
pub mod models;
pub mod retry;

pub use client::AriaClient;
pub use error::{AuthError, EndpointError};
pub use retry::RetryPolicy;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// Logical endpoint of a call, used as the `endpoint` label.
///
/// Closed on purpose: per-resource paths must not become label values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Auth,
    Resources,
    Alerts,
    Stats,
    SuperMetrics,
}

impl Endpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Auth => "auth",
            Endpoint::Resources => "resources",
            Endpoint::Alerts => "alerts",
            Endpoint::Stats => "stats",
            Endpoint::SuperMetrics => "supermetrics",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One upstream call
#[derive(Debug, Clone)]
pub struct ApiCall {
    pub endpoint: Endpoint,
    pub method: Method,
    /// Path below the suite API base, e.g. `/api/resources`
    pub path: String,
    pub query: Vec<(&'static str, String)>,
    pub body: Option<Value>,
    pub timeout: Duration,
}

impl ApiCall {
    pub fn get(endpoint: Endpoint, path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint,
            method: Method::GET,
            path: path.into(),
            query: Vec::new(),
            body: None,
            timeout,
        }
    }

    pub fn post(endpoint: Endpoint, path: impl Into<String>, body: Value, timeout: Duration) -> Self {
        Self {
            endpoint,
            method: Method::POST,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
            timeout,
        }
    }

    pub fn query(mut self, key: &'static str, value: impl ToString) -> Self {
        self.query.push((key, value.to_string()));
        self
    }

    /// Looks up a query parameter; mostly useful to stubs.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// "Call endpoint, get parsed JSON or no data."
///
/// Implementations swallow terminal failures after recording them, so
/// `None` is the only failure signal collectors ever see.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn request(&self, call: ApiCall) -> Option<Value>;
}
