//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts and intervals > 0)
//! - Check that addresses parse and file names stay inside the config dir
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ControllerConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::ControllerConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("haproxy.config_name must be a plain file name, got {0:?}")]
    ConfigName(String),

    #[error("{field} is not a valid socket address: {value}")]
    Address { field: &'static str, value: String },
}

/// Check a parsed configuration for semantic problems.
pub fn validate_config(config: &ControllerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.haproxy.binary.trim().is_empty() {
        errors.push(ValidationError::Empty("haproxy.binary"));
    }
    if config.haproxy.config_path.as_os_str().is_empty() {
        errors.push(ValidationError::Empty("haproxy.config_path"));
    }
    if config.haproxy.socket.trim().is_empty() {
        errors.push(ValidationError::Empty("haproxy.socket"));
    }

    let name = &config.haproxy.config_name;
    if name.is_empty() || name.contains('/') || name == "." || name == ".." {
        errors.push(ValidationError::ConfigName(name.clone()));
    }

    for (field, value) in [
        ("timeouts.syntax_check_secs", config.timeouts.syntax_check_secs),
        ("timeouts.reload_secs", config.timeouts.reload_secs),
        ("timeouts.socket_secs", config.timeouts.socket_secs),
        ("schedule.interval_secs", config.schedule.interval_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::Zero(field));
        }
    }

    if config.source.runtime_config.as_os_str().is_empty() {
        errors.push(ValidationError::Empty("source.runtime_config"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::Address {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if config.admin.enabled {
        if config.admin.api_key.is_empty() {
            errors.push(ValidationError::Empty("admin.api_key"));
        }
        if config.admin.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::Address {
                field: "admin.bind_address",
                value: config.admin.bind_address.clone(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
