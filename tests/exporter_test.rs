mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tower::ServiceExt; // for `oneshot`

use aria_exporter::app::{Exporter, ExporterError};
use aria_exporter::observability::ExporterMetrics;
use aria_exporter::server;
use aria_exporter::upstream::{ApiCall, AriaClient, AuthError, Endpoint, Upstream};
use common::{StubUpstream, config_for, start_stub};

async fn scrape(metrics: Arc<ExporterMetrics>) -> (StatusCode, String, String) {
    let response = server::router(metrics)
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    (status, content_type, String::from_utf8(body.to_vec()).unwrap())
}

/// Sample lines of one metric, with or without labels
fn series<'a>(text: &'a str, metric: &str) -> Vec<&'a str> {
    text.lines()
        .filter(|l| {
            l.strip_prefix(metric)
                .is_some_and(|rest| rest.starts_with('{') || rest.starts_with(' '))
        })
        .collect()
}

fn sample_value(line: &str) -> f64 {
    line.rsplit(' ').next().unwrap().parse().unwrap()
}

#[tokio::test]
async fn test_full_inventory_across_pages() {
    let stub = Arc::new(StubUpstream {
        total_resources: 1340,
        ..StubUpstream::default()
    });
    let origin = start_stub(Arc::clone(&stub)).await;

    let exporter = Exporter::bootstrap(config_for(&origin)).await.unwrap();
    exporter.updater().run_cycle().await.unwrap();

    let (status, content_type, text) = scrape(exporter.metrics()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(content_type.starts_with("text/plain"));

    let total: f64 = series(&text, "vmware_aria_resources_total")
        .into_iter()
        .map(sample_value)
        .sum();
    assert_eq!(total, 1340.0);
    assert!(series(&text, "vmware_aria_alerts_total").is_empty());
    assert_eq!(stub.resource_calls.load(Ordering::SeqCst), 2);
    assert_eq!(stub.stats_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_detailed_resources_get_performance_series() {
    let stub = Arc::new(StubUpstream {
        total_resources: 3,
        resource_kind: "VirtualMachine".to_string(),
        alerts: vec![serde_json::json!({"alertLevel": "CRITICAL", "status": "ACTIVE"})],
        ..StubUpstream::default()
    });
    let origin = start_stub(Arc::clone(&stub)).await;

    let mut config = config_for(&origin);
    config.labels.static_labels = BTreeMap::from([("env".to_string(), "test".to_string())]);
    config.labels.resource_patterns =
        BTreeMap::from([("vm_number".to_string(), r"^vm-(\d+)$".to_string())]);

    let exporter = Exporter::bootstrap(config).await.unwrap();
    exporter.updater().run_cycle().await.unwrap();
    let (_, _, text) = scrape(exporter.metrics()).await;

    let performance = series(&text, "vmware_aria_performance_metric");
    assert_eq!(performance.len(), 3);
    assert!(performance.iter().all(|l| l.contains("env=\"test\"")));
    assert!(performance.iter().any(|l| l.contains("vm_number=\"2\"")));
    assert!(performance.iter().all(|l| sample_value(l) == 42.0));
    assert_eq!(stub.stats_calls.load(Ordering::SeqCst), 3);

    let alerts = series(&text, "vmware_aria_alerts_total");
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].contains("criticality=\"CRITICAL\""));

    let supermetrics = series(&text, "vmware_aria_supermetrics_total");
    assert_eq!(supermetrics.len(), 1);
    assert_eq!(sample_value(supermetrics[0]), 1.0);
}

#[tokio::test]
async fn test_rejected_credentials_abort_startup() {
    let stub = Arc::new(StubUpstream {
        auth_status: StatusCode::UNAUTHORIZED,
        ..StubUpstream::default()
    });
    let origin = start_stub(Arc::clone(&stub)).await;

    let result = Exporter::bootstrap(config_for(&origin)).await;

    assert!(matches!(
        result,
        Err(ExporterError::Auth(AuthError::Rejected { status: 401 }))
    ));
    assert_eq!(stub.auth_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_token_request_is_never_retried() {
    let stub = Arc::new(StubUpstream {
        auth_status: StatusCode::SERVICE_UNAVAILABLE,
        ..StubUpstream::default()
    });
    let origin = start_stub(Arc::clone(&stub)).await;

    let result = Exporter::bootstrap(config_for(&origin)).await;

    assert!(result.is_err());
    assert_eq!(stub.auth_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unreachable_upstream_aborts_startup() {
    let mut config = config_for("http://127.0.0.1:1");
    config.metrics.timeouts.auth = 1;

    let result = Exporter::bootstrap(config).await;
    assert!(matches!(result, Err(ExporterError::Auth(_))));
}

async fn connect(stub: &Arc<StubUpstream>) -> (AriaClient, Arc<ExporterMetrics>) {
    let origin = start_stub(Arc::clone(stub)).await;
    let config = config_for(&origin);
    let metrics = Arc::new(ExporterMetrics::new(&config.labels).unwrap());
    let client = AriaClient::connect(&config.upstream, &config.metrics.timeouts, Arc::clone(&metrics))
        .await
        .unwrap();
    (client, metrics)
}

fn first_page() -> ApiCall {
    ApiCall::get(Endpoint::Resources, "/api/resources", Duration::from_secs(5))
        .query("page", 0)
        .query("pageSize", 1000)
}

#[tokio::test]
async fn test_retryable_status_is_retried_within_budget() {
    let stub = Arc::new(StubUpstream {
        total_resources: 5,
        resource_failures: 2.into(),
        ..StubUpstream::default()
    });
    let (client, metrics) = connect(&stub).await;

    let body = client.request(first_page()).await.unwrap();

    assert_eq!(body["resourceList"].as_array().unwrap().len(), 5);
    assert_eq!(stub.resource_calls.load(Ordering::SeqCst), 3);
    assert_eq!(
        metrics
            .api_requests
            .with_label_values(&["resources", "GET", "503"])
            .get(),
        2
    );
    assert_eq!(
        metrics
            .api_requests
            .with_label_values(&["resources", "GET", "200"])
            .get(),
        1
    );
}

#[tokio::test]
async fn test_exhausted_retries_yield_no_data() {
    let stub = Arc::new(StubUpstream {
        total_resources: 5,
        resource_failures: 10.into(),
        ..StubUpstream::default()
    });
    let (client, metrics) = connect(&stub).await;

    assert!(client.request(first_page()).await.is_none());
    assert_eq!(stub.resource_calls.load(Ordering::SeqCst), 3);
    assert_eq!(
        metrics
            .collection_errors
            .with_label_values(&["resources", "http_status"])
            .get(),
        1
    );
}

#[tokio::test]
async fn test_expired_token_triggers_reauthentication() {
    let stub = Arc::new(StubUpstream {
        total_resources: 2,
        ..StubUpstream::default()
    });
    let (client, _) = connect(&stub).await;
    assert!(client.is_authenticated().await);
    assert!(client.base_url().ends_with("/suite-api"));
    assert_eq!(stub.auth_calls.load(Ordering::SeqCst), 1);

    stub.expire_token.store(true, Ordering::SeqCst);
    let body = client.request(first_page()).await;

    assert!(body.is_some());
    assert_eq!(stub.auth_calls.load(Ordering::SeqCst), 2);
    assert_eq!(stub.resource_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_second_rejection_is_terminal() {
    let stub = Arc::new(StubUpstream {
        total_resources: 2,
        ..StubUpstream::default()
    });
    let (client, metrics) = connect(&stub).await;

    stub.reject_data.store(true, Ordering::SeqCst);
    let body = client.request(first_page()).await;

    assert!(body.is_none());
    assert_eq!(stub.auth_calls.load(Ordering::SeqCst), 2);
    assert_eq!(stub.resource_calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        metrics
            .collection_errors
            .with_label_values(&["resources", "http_status"])
            .get(),
        1
    );
}

#[tokio::test]
async fn test_concurrent_rejections_share_one_login() {
    let stub = Arc::new(StubUpstream {
        total_resources: 3,
        ..StubUpstream::default()
    });
    let origin = start_stub(Arc::clone(&stub)).await;
    let exporter = Exporter::bootstrap(config_for(&origin)).await.unwrap();
    assert_eq!(stub.auth_calls.load(Ordering::SeqCst), 1);

    stub.revoked.store(true, Ordering::SeqCst);
    exporter.updater().run_cycle().await.unwrap();

    assert_eq!(stub.auth_calls.load(Ordering::SeqCst), 2);
    let (_, _, text) = scrape(exporter.metrics()).await;
    let total: f64 = series(&text, "vmware_aria_resources_total")
        .into_iter()
        .map(sample_value)
        .sum();
    assert_eq!(total, 3.0);
    assert_eq!(series(&text, "vmware_aria_supermetrics_total").len(), 1);
}

#[tokio::test]
async fn test_health_endpoint() {
    let metrics = Arc::new(ExporterMetrics::new(&Default::default()).unwrap());

    let response = server::router(metrics)
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"ok");
}

#[tokio::test]
async fn test_exporter_serves_until_shutdown() {
    let stub = Arc::new(StubUpstream {
        total_resources: 4,
        ..StubUpstream::default()
    });
    let origin = start_stub(Arc::clone(&stub)).await;
    let exporter = Exporter::bootstrap(config_for(&origin)).await.unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let running = tokio::spawn(exporter.serve(listener, async move {
        let _ = stop_rx.await;
    }));

    let url = format!("http://{address}/metrics");
    let mut text = String::new();
    for _ in 0..50 {
        text = reqwest::get(&url).await.unwrap().text().await.unwrap();
        if text.contains("vmware_aria_resources_total{") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(text.contains("vmware_aria_resources_total{adapter_kind=\"VMWARE\",resource_type=\"Datastore\"} 4"));

    stop_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .expect("exporter did not stop")
        .unwrap()
        .unwrap();
}
