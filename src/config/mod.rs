//! Configuration management for the exporter
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. YAML / TOML / JSON configuration file (format picked by extension)
//! 3. Environment variables
//! 4. Explicit overrides (command line)
//!
//! # Usage
//!
//! ```no_run
//! use aria_exporter::config::{AppConfig, ConfigOverrides};
//! use std::path::Path;
//!
//! let config = AppConfig::load(Some(Path::new("config/exporter.yaml")), &ConfigOverrides::default())
//!     .expect("Failed to load configuration");
//! println!("Polling {}", config.upstream.base_url());
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `ARIA_EXPORTER__<section>__<key>`
//!
//! Examples:
//! - `ARIA_EXPORTER__EXPORTER__PORT=9100`
//! - `ARIA_EXPORTER__VMWARE_ARIA__HOST=aria.example.com`
//!
//! The password may also come from `VMWARE_ARIA_PASSWORD`.

mod models;
mod sources;
mod validation;

pub use models::{
    AppConfig, ExporterConfig, LabelsConfig, LogLevel, MetricsConfig, RetryConfig, Timeouts,
    UpstreamConfig,
};
pub use sources::ConfigOverrides;
pub use validation::ValidationError;

use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),

    #[error(
        "Password must be provided in the config file, via --password or the {} environment variable",
        sources::PASSWORD_ENV_VAR
    )]
    MissingPassword,
}

impl AppConfig {
    /// Load configuration from all sources (file + environment + overrides)
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file is malformed
    /// - Validation fails (label names, zero timeouts, etc.)
    /// - No password is available after merging
    pub fn load(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let config = sources::load(path, overrides)?;
        config.finish()
    }

    /// Load configuration with an explicit password fallback instead of the
    /// process environment.
    pub fn load_with_password_fallback(
        path: Option<&Path>,
        overrides: &ConfigOverrides,
        password_fallback: Option<String>,
    ) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path, overrides, password_fallback)?;
        config.finish()
    }

    fn finish(self) -> Result<Self, ConfigError> {
        if self.upstream.password.is_empty() {
            return Err(ConfigError::MissingPassword);
        }
        validation::validate(&self)?;
        Ok(self)
    }
}
