//! Capped exponential backoff for idempotent upstream calls

use reqwest::Method;
use std::time::Duration;

use super::error::EndpointError;
use crate::config::RetryConfig;

/// Statuses worth another attempt
pub const RETRY_STATUSES: &[u16] = &[429, 500, 502, 503, 504];

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, the first one included
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_backoff,
            max_backoff,
        }
    }

    /// Delay before attempt `attempt + 1`: base, 2x base, 4x base, ... capped
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }

    /// Whether a failed `attempt` (1-based) should be followed by another
    pub fn should_retry(&self, method: &Method, error: &EndpointError, attempt: u32) -> bool {
        if attempt >= self.max_attempts || !is_idempotent(method) {
            return false;
        }

        match error {
            EndpointError::Status { status } => RETRY_STATUSES.contains(status),
            EndpointError::Timeout | EndpointError::Connect(_) | EndpointError::Transport(_) => {
                true
            }
            EndpointError::Decode(_) => false,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        RetryPolicy::new(
            config.max_attempts,
            Duration::from_millis(config.backoff_ms),
            Duration::from_millis(config.max_backoff_ms),
        )
    }
}

fn is_idempotent(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD
}
