use super::models::{AppConfig, LogLevel};
use config::{ConfigError, Environment, File};
use std::env;
use std::path::Path;

pub(crate) const PASSWORD_ENV_VAR: &str = "VMWARE_ARIA_PASSWORD";
const ENV_PREFIX: &str = "ARIA_EXPORTER";
const ENV_SEPARATOR: &str = "__";

/// Individually settable values, applied on top of every other source
#[derive(Debug, Clone, Default, bon::Builder)]
pub struct ConfigOverrides {
    #[builder(into)]
    pub host: Option<String>,
    #[builder(into)]
    pub username: Option<String>,
    #[builder(into)]
    pub password: Option<String>,
    pub port: Option<u16>,
    pub interval: Option<u64>,
    pub verify_ssl: Option<bool>,
    pub log_level: Option<LogLevel>,
}

/// Load configuration with priority (lowest to highest):
/// 1. Defaults (embedded in structs)
/// 2. Configuration file (if given and present)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (`ARIA_EXPORTER__<SECTION>__<KEY>`)
/// 5. Explicit overrides
///
/// The password falls back to `VMWARE_ARIA_PASSWORD` when still empty.
pub fn load(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<AppConfig, ConfigError> {
    // Load .env file if it exists (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    load_from_sources(path, overrides, env::var(PASSWORD_ENV_VAR).ok())
}

/// Load configuration from an explicit file and password fallback.
///
/// Useful for testing without touching the process environment for secrets.
pub fn load_from_sources(
    path: Option<&Path>,
    overrides: &ConfigOverrides,
    password_fallback: Option<String>,
) -> Result<AppConfig, ConfigError> {
    let mut builder = config::Config::builder();

    // Defaults are handled by serde, so nested keys the file omits keep
    // their default values.
    match path {
        Some(path) if path.exists() => {
            tracing::info!("Loading configuration from: {}", path.display());
            builder = builder.add_source(File::from(path).required(false));
        }
        Some(path) => {
            tracing::warn!(
                "Configuration file not found at {}, using defaults and overrides",
                path.display()
            );
        }
        None => tracing::debug!("No configuration file given, using defaults and overrides"),
    }

    // ARIA_EXPORTER__EXPORTER__PORT -> exporter.port
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    if let Some(host) = &overrides.host {
        builder = builder.set_override("vmware_aria.host", host.as_str())?;
    }
    if let Some(username) = &overrides.username {
        builder = builder.set_override("vmware_aria.username", username.as_str())?;
    }
    if let Some(password) = &overrides.password {
        builder = builder.set_override("vmware_aria.password", password.as_str())?;
    }
    if let Some(verify_ssl) = overrides.verify_ssl {
        builder = builder.set_override("vmware_aria.verify_ssl", verify_ssl)?;
    }
    if let Some(port) = overrides.port {
        builder = builder.set_override("exporter.port", i64::from(port))?;
    }
    if let Some(interval) = overrides.interval {
        let interval = i64::try_from(interval).unwrap_or(i64::MAX);
        builder = builder.set_override("exporter.interval", interval)?;
    }
    if let Some(level) = overrides.log_level {
        builder = builder.set_override("exporter.log_level", level.as_str())?;
    }

    let mut config: AppConfig = builder.build()?.try_deserialize()?;

    if config.upstream.password.is_empty() {
        if let Some(password) = password_fallback.filter(|p| !p.is_empty()) {
            config.upstream.password = password;
        }
    }

    Ok(config)
}
