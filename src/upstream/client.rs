//! HTTP client for the suite API

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use super::error::{AuthError, EndpointError};
use super::models::{TokenRequest, TokenResponse};
use super::retry::RetryPolicy;
use super::{ApiCall, Endpoint, Upstream};
use crate::config::{Timeouts, UpstreamConfig};
use crate::observability::ExporterMetrics;

const TOKEN_PATH: &str = "/api/auth/token/acquire";
const TOKEN_SCHEME: &str = "vRealizeOpsToken";

/// Authenticated session against one Aria Operations host
pub struct AriaClient {
    http: Client,
    base_url: String,
    username: String,
    password: String,
    token: RwLock<Option<String>>,
    retry: RetryPolicy,
    auth_timeout: Duration,
    metrics: Arc<ExporterMetrics>,
}

impl AriaClient {
    /// Build the client without authenticating
    pub fn new(
        config: &UpstreamConfig,
        timeouts: &Timeouts,
        metrics: Arc<ExporterMetrics>,
    ) -> Result<Self, AuthError> {
        if !config.verify_ssl {
            warn!("TLS certificate verification is disabled for the upstream host");
        }

        let http = Client::builder()
            .danger_accept_invalid_certs(!config.verify_ssl)
            .user_agent(concat!("aria-exporter/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url(),
            username: config.username.clone(),
            password: config.password.clone(),
            token: RwLock::new(None),
            retry: RetryPolicy::from(&config.retry),
            auth_timeout: timeouts.for_endpoint(Endpoint::Auth),
            metrics,
        })
    }

    /// Build the client and acquire the first token
    pub async fn connect(
        config: &UpstreamConfig,
        timeouts: &Timeouts,
        metrics: Arc<ExporterMetrics>,
    ) -> Result<Self, AuthError> {
        let client = Self::new(config, timeouts, metrics)?;
        client.authenticate().await?;
        Ok(client)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn is_authenticated(&self) -> bool {
        self.token.read().await.is_some()
    }

    /// Acquire a token and attach it to every later call
    pub async fn authenticate(&self) -> Result<(), AuthError> {
        let mut token = self.token.write().await;
        *token = Some(self.login().await?);
        Ok(())
    }

    /// Replace `stale` with a fresh token.
    ///
    /// Callers that lost the race for the write lock find the token already
    /// replaced and reuse it instead of logging in again.
    async fn refresh(&self, stale: Option<&str>) -> Result<(), AuthError> {
        let mut token = self.token.write().await;
        if token.as_deref() != stale {
            debug!("Token already refreshed by a concurrent call");
            return Ok(());
        }
        *token = Some(self.login().await?);
        Ok(())
    }

    async fn login(&self) -> Result<String, AuthError> {
        let body = serde_json::to_value(TokenRequest {
            username: &self.username,
            password: &self.password,
        })
        .map_err(|e| AuthError::Request(EndpointError::Decode(e.to_string())))?;
        let call = ApiCall::post(Endpoint::Auth, TOKEN_PATH, body, self.auth_timeout);

        match self.acquire_token(&call).await {
            Ok(token) => {
                info!(base_url = %self.base_url, "Authenticated with Aria Operations");
                Ok(token)
            }
            Err(e) => {
                error!(base_url = %self.base_url, error = %e, "Authentication failed");
                self.metrics.record_error(Endpoint::Auth, e.kind());
                Err(e)
            }
        }
    }

    async fn acquire_token(&self, call: &ApiCall) -> Result<String, AuthError> {
        let value = self.send_with_retry(call, None).await?;
        let response: TokenResponse = serde_json::from_value(value)
            .map_err(|e| AuthError::Request(EndpointError::Decode(e.to_string())))?;

        response
            .token
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingToken)
    }

    /// Send with retry, re-authenticating once if the token was rejected
    async fn execute(&self, call: &ApiCall) -> Result<Value, EndpointError> {
        let token = self.token.read().await.clone();

        match self.send_with_retry(call, token.as_deref()).await {
            Err(e) if e.is_unauthorized() && call.endpoint != Endpoint::Auth => {
                warn!(endpoint = %call.endpoint, "Token rejected, re-authenticating");
                if self.refresh(token.as_deref()).await.is_err() {
                    return Err(e);
                }
                let token = self.token.read().await.clone();
                self.send_with_retry(call, token.as_deref()).await
            }
            result => result,
        }
    }

    async fn send_with_retry(
        &self,
        call: &ApiCall,
        token: Option<&str>,
    ) -> Result<Value, EndpointError> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.send_once(call, token).await {
                Ok(value) => {
                    if attempts > 1 {
                        debug!(endpoint = %call.endpoint, path = %call.path, attempts, "Request succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => {
                    if !self.retry.should_retry(&call.method, &e, attempts) {
                        return Err(e);
                    }

                    let backoff = self.retry.backoff(attempts);
                    warn!(
                        endpoint = %call.endpoint,
                        path = %call.path,
                        attempts,
                        error = %e,
                        backoff_ms = backoff.as_millis() as u64,
                        "Request failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    /// One HTTP exchange (no retry); always recorded
    async fn send_once(&self, call: &ApiCall, token: Option<&str>) -> Result<Value, EndpointError> {
        let url = format!("{}{}", self.base_url, call.path);

        let mut request = self
            .http
            .request(call.method.clone(), &url)
            .timeout(call.timeout)
            .header(ACCEPT, "application/json");

        if !call.query.is_empty() {
            request = request.query(&call.query);
        }
        if let Some(body) = &call.body {
            request = request.json(body);
        }
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("{TOKEN_SCHEME} {token}"));
        }

        let started = Instant::now();
        let outcome = async {
            let response = request.send().await?;
            let status = response.status();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, body))
        }
        .await;
        let elapsed = started.elapsed();

        let status_label = match &outcome {
            Ok((status, _)) => status.as_u16().to_string(),
            Err(_) => "error".to_string(),
        };
        self.metrics
            .record_request(call.endpoint, call.method.as_str(), &status_label, elapsed);

        let (status, body) = outcome?;
        if !status.is_success() {
            return Err(EndpointError::Status {
                status: status.as_u16(),
            });
        }

        serde_json::from_slice(&body).map_err(|e| EndpointError::Decode(e.to_string()))
    }
}

#[async_trait]
impl Upstream for AriaClient {
    async fn request(&self, call: ApiCall) -> Option<Value> {
        match self.execute(&call).await {
            Ok(value) => Some(value),
            Err(e) => {
                // Per-resource stats misses are routine
                if call.endpoint == Endpoint::Stats {
                    debug!(path = %call.path, error = %e, "Stats request failed");
                } else {
                    error!(endpoint = %call.endpoint, path = %call.path, error = %e, "API request failed");
                }
                self.metrics.record_error(call.endpoint, e.kind());
                None
            }
        }
    }
}
