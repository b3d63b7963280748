//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and cross-field
//! consistency. All errors are collected, not just the first.

use std::net::SocketAddr;

use crate::config::schema::ProxyConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field (e.g. `target.port`).
    pub field: &'static str,
    /// Human readable description.
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validate a parsed configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.target.host.trim().is_empty() {
        errors.push(ValidationError::new("target.host", "must not be empty"));
    }
    if config.target.port == 0 {
        errors.push(ValidationError::new("target.port", "must be between 1 and 65535"));
    }
    if config.listen.host.trim().is_empty() {
        errors.push(ValidationError::new("listen.host", "must not be empty"));
    }
    if config.poll.fds_count == 0 {
        errors.push(ValidationError::new("poll.fds_count", "must be at least 1"));
    }
    if config.socket.non_blocking > 1 {
        errors.push(ValidationError::new(
            "socket.non_blocking",
            format!("must be 0 or 1, got {}", config.socket.non_blocking),
        ));
    }
    if config.limits.initial_buffer_size == 0 {
        errors.push(ValidationError::new("limits.initial_buffer_size", "must be at least 1"));
    }
    if config.limits.initial_buffer_size > config.limits.max_message_size {
        errors.push(ValidationError::new(
            "limits.initial_buffer_size",
            "must not exceed limits.max_message_size",
        ));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address '{}'", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&ProxyConfig::default()).is_ok());
    }

    #[test]
    fn reports_every_error() {
        let mut config = ProxyConfig::default();
        config.target.host = String::new();
        config.target.port = 0;
        config.poll.fds_count = 0;
        config.socket.non_blocking = 7;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec!["target.host", "target.port", "poll.fds_count", "socket.non_blocking"]
        );
    }

    #[test]
    fn buffer_limits_must_be_ordered() {
        let mut config = ProxyConfig::default();
        config.limits.initial_buffer_size = 1024;
        config.limits.max_message_size = 512;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "limits.initial_buffer_size");
    }

    #[test]
    fn metrics_address_checked_only_when_enabled() {
        let mut config = ProxyConfig::default();
        config.observability.metrics_address = "not an address".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert!(validate_config(&config).is_err());
    }
}
