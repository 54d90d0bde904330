use super::models::AppConfig;
use crate::observability::{
    ALERT_LABELS, INFO_LABELS, PERFORMANCE_LABELS, RESOURCE_LABELS,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Upstream host must not be empty")]
    EmptyHost,

    #[error("Label name '{name}' is not a valid metric label name")]
    InvalidLabelName { name: String },

    #[error("Static label '{name}' collides with a built-in label")]
    StaticLabelCollision { name: String },

    #[error("Pattern label '{name}' collides with a static or built-in label")]
    PatternLabelCollision { name: String },

    #[error("{field} must be positive")]
    NotPositive { field: String },
}

/// Validate the entire configuration
pub fn validate(config: &AppConfig) -> Result<(), ValidationError> {
    validate_upstream(config)?;
    validate_runtime(config)?;
    validate_labels(config)?;
    Ok(())
}

fn validate_upstream(config: &AppConfig) -> Result<(), ValidationError> {
    if config.upstream.host.trim().is_empty() {
        return Err(ValidationError::EmptyHost);
    }

    if config.upstream.retry.max_attempts == 0 {
        return Err(not_positive("vmware_aria.retry.max_attempts"));
    }

    Ok(())
}

fn validate_runtime(config: &AppConfig) -> Result<(), ValidationError> {
    if config.exporter.interval == 0 {
        return Err(not_positive("exporter.interval"));
    }

    if config.metrics.page_size == 0 {
        return Err(not_positive("metrics.page_size"));
    }

    for (endpoint, secs) in config.metrics.timeouts.entries() {
        if secs == 0 {
            return Err(not_positive(&format!("metrics.timeouts.{endpoint}")));
        }
    }

    Ok(())
}

/// Label names end up in every series schema, so they are checked once here
/// instead of per resource.
fn validate_labels(config: &AppConfig) -> Result<(), ValidationError> {
    let builtin = |name: &str| {
        INFO_LABELS
            .iter()
            .chain(RESOURCE_LABELS)
            .chain(ALERT_LABELS)
            .chain(PERFORMANCE_LABELS)
            .any(|label| *label == name)
    };

    for name in config.labels.static_labels.keys() {
        if !is_valid_label_name(name) {
            return Err(ValidationError::InvalidLabelName { name: name.clone() });
        }
        if builtin(name) {
            return Err(ValidationError::StaticLabelCollision { name: name.clone() });
        }
    }

    for name in config.labels.resource_patterns.keys() {
        if !is_valid_label_name(name) {
            return Err(ValidationError::InvalidLabelName { name: name.clone() });
        }
        if PERFORMANCE_LABELS.contains(&name.as_str())
            || config.labels.static_labels.contains_key(name)
        {
            return Err(ValidationError::PatternLabelCollision { name: name.clone() });
        }
    }

    Ok(())
}

/// `[a-zA-Z_][a-zA-Z0-9_]*`, with the `__` prefix reserved
pub(crate) fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');

    starts_ok
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with("__")
}

fn not_positive(field: &str) -> ValidationError {
    ValidationError::NotPositive {
        field: field.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.upstream.password = "secret".to_string();
        config
            .labels
            .static_labels
            .insert("datacenter".to_string(), "dc1".to_string());
        config
            .labels
            .resource_patterns
            .insert("vm_number".to_string(), r"^vm-(\d+)$".to_string());
        config
    }

    #[test]
    fn test_valid_config() {
        let config = create_test_config();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_label_name_rules() {
        assert!(is_valid_label_name("datacenter"));
        assert!(is_valid_label_name("_private"));
        assert!(is_valid_label_name("zone2"));
        assert!(!is_valid_label_name(""));
        assert!(!is_valid_label_name("2zone"));
        assert!(!is_valid_label_name("data-center"));
        assert!(!is_valid_label_name("__reserved"));
    }

    #[test]
    fn test_invalid_static_label_name() {
        let mut config = create_test_config();
        config
            .labels
            .static_labels
            .insert("data-center".to_string(), "x".to_string());

        let result = validate(&config);
        assert!(matches!(
            result,
            Err(ValidationError::InvalidLabelName { .. })
        ));
    }

    #[test]
    fn test_static_label_collides_with_builtin() {
        let mut config = create_test_config();
        config
            .labels
            .static_labels
            .insert("resource_type".to_string(), "x".to_string());

        let result = validate(&config);
        assert!(matches!(
            result,
            Err(ValidationError::StaticLabelCollision { .. })
        ));
    }

    #[test]
    fn test_pattern_label_collides_with_static() {
        let mut config = create_test_config();
        config
            .labels
            .resource_patterns
            .insert("datacenter".to_string(), "^(dc\\d)".to_string());

        let result = validate(&config);
        assert!(matches!(
            result,
            Err(ValidationError::PatternLabelCollision { .. })
        ));
    }

    #[test]
    fn test_pattern_label_collides_with_performance_label() {
        let mut config = create_test_config();
        config
            .labels
            .resource_patterns
            .insert("unit".to_string(), "(.*)".to_string());

        let result = validate(&config);
        assert!(matches!(
            result,
            Err(ValidationError::PatternLabelCollision { .. })
        ));
    }

    #[test]
    fn test_zero_timeout() {
        let mut config = create_test_config();
        config.metrics.timeouts.stats = 0;

        let result = validate(&config);
        assert!(matches!(result, Err(ValidationError::NotPositive { .. })));
    }

    #[test]
    fn test_empty_host() {
        let mut config = create_test_config();
        config.upstream.host = "  ".to_string();

        assert!(matches!(validate(&config), Err(ValidationError::EmptyHost)));
    }
}
