//! In-process stand-in for the Aria Operations suite API

#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::net::TcpListener;

use aria_exporter::config::AppConfig;

pub struct StubUpstream {
    pub auth_status: StatusCode,
    pub total_resources: usize,
    pub resource_kind: String,
    pub alerts: Vec<Value>,
    /// Resource requests answered with 503 before the first success
    pub resource_failures: AtomicUsize,
    /// Answer the next data call with 401
    pub expire_token: AtomicBool,
    /// Reject the current token until a new one is issued
    pub revoked: AtomicBool,
    /// Reject every data call while still issuing tokens
    pub reject_data: AtomicBool,

    pub auth_calls: AtomicUsize,
    pub resource_calls: AtomicUsize,
    pub stats_calls: AtomicUsize,
}

impl Default for StubUpstream {
    fn default() -> Self {
        Self {
            auth_status: StatusCode::OK,
            total_resources: 0,
            resource_kind: "Datastore".to_string(),
            alerts: Vec::new(),
            resource_failures: AtomicUsize::new(0),
            expire_token: AtomicBool::new(false),
            revoked: AtomicBool::new(false),
            reject_data: AtomicBool::new(false),
            auth_calls: AtomicUsize::new(0),
            resource_calls: AtomicUsize::new(0),
            stats_calls: AtomicUsize::new(0),
        }
    }
}

impl StubUpstream {
    fn current_token(&self) -> String {
        format!("token-{}", self.auth_calls.load(Ordering::SeqCst))
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let expected = format!("vRealizeOpsToken {}", self.current_token());
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == expected)
    }

    /// Checks the token and consumes a pending forced expiry
    fn admit(&self, headers: &HeaderMap) -> Result<(), Response> {
        if self.expire_token.swap(false, Ordering::SeqCst)
            || self.revoked.load(Ordering::SeqCst)
            || self.reject_data.load(Ordering::SeqCst)
            || !self.authorized(headers)
        {
            return Err(StatusCode::UNAUTHORIZED.into_response());
        }
        Ok(())
    }
}

/// Serve the stub on an ephemeral port; returns its `http://` origin
pub async fn start_stub(stub: Arc<StubUpstream>) -> String {
    let api = Router::new()
        .route("/api/auth/token/acquire", post(acquire_token))
        .route("/api/resources", get(list_resources))
        .route("/api/resources/{id}/stats", get(resource_stats))
        .route("/api/alerts", get(list_alerts))
        .route("/api/supermetrics", get(list_supermetrics))
        .with_state(stub);
    let app = Router::new().nest("/suite-api", api);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{address}")
}

/// Configuration pointing at the stub with a fast retry budget
pub fn config_for(origin: &str) -> AppConfig {
    let mut config = AppConfig::default();
    config.upstream.host = origin.to_string();
    config.upstream.password = "secret".to_string();
    config.upstream.retry.backoff_ms = 10;
    config.upstream.retry.max_backoff_ms = 50;
    config.metrics.timeouts.auth = 5;
    config.metrics.timeouts.resources = 5;
    config.metrics.timeouts.alerts = 5;
    config.metrics.timeouts.stats = 5;
    config.metrics.timeouts.supermetrics = 5;
    config
}

async fn acquire_token(State(stub): State<Arc<StubUpstream>>, Json(body): Json<Value>) -> Response {
    stub.auth_calls.fetch_add(1, Ordering::SeqCst);
    stub.revoked.store(false, Ordering::SeqCst);

    if stub.auth_status != StatusCode::OK {
        return stub.auth_status.into_response();
    }
    if body["username"].as_str().is_none() || body["password"] != "secret" {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    Json(json!({"token": stub.current_token(), "validity": 0})).into_response()
}

async fn list_resources(
    State(stub): State<Arc<StubUpstream>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, usize>>,
) -> Response {
    stub.resource_calls.fetch_add(1, Ordering::SeqCst);

    if stub
        .resource_failures
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
    {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    if let Err(response) = stub.admit(&headers) {
        return response;
    }

    let page = query.get("page").copied().unwrap_or(0);
    let size = query.get("pageSize").copied().unwrap_or(1000);
    let start = page * size;
    let end = stub.total_resources.min(start + size);

    let list: Vec<Value> = (start..end.max(start))
        .map(|i| {
            json!({
                "identifier": format!("id-{i}"),
                "resourceKey": {
                    "name": format!("vm-{i}"),
                    "resourceKindKey": stub.resource_kind,
                    "adapterKindKey": "VMWARE"
                }
            })
        })
        .collect();

    Json(json!({
        "pageInfo": {"totalCount": stub.total_resources, "page": page, "pageSize": size},
        "resourceList": list
    }))
    .into_response()
}

async fn resource_stats(
    State(stub): State<Arc<StubUpstream>>,
    headers: HeaderMap,
    Path(_id): Path<String>,
) -> Response {
    stub.stats_calls.fetch_add(1, Ordering::SeqCst);
    if let Err(response) = stub.admit(&headers) {
        return response;
    }

    Json(json!({"values": [
        {"statKey": {"key": "cpu|usage_average", "unit": "%"}, "data": [3.0, 42.0]}
    ]}))
    .into_response()
}

async fn list_alerts(State(stub): State<Arc<StubUpstream>>, headers: HeaderMap) -> Response {
    if let Err(response) = stub.admit(&headers) {
        return response;
    }
    Json(json!({"alerts": stub.alerts})).into_response()
}

async fn list_supermetrics(State(stub): State<Arc<StubUpstream>>, headers: HeaderMap) -> Response {
    if let Err(response) = stub.admit(&headers) {
        return response;
    }
    Json(json!({"super-metrics": [{"id": "sm-1"}]})).into_response()
}
