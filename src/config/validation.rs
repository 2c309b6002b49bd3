//! Configuration validation.
//!
//! Serde handles the syntax; this module checks value ranges and combinations.
//! Returns every violation, not just the first.

use std::fmt;

use crate::config::schema::AppConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
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

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a loaded configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.host.trim().is_empty() {
        errors.push(ValidationError::new("listener.host", "must not be empty"));
    }
    if config.listener.port == 0 {
        errors.push(ValidationError::new("listener.port", "must not be 0"));
    }

    let db = &config.database;
    if db.uri.trim().is_empty() {
        errors.push(ValidationError::new("database.uri", "must not be empty"));
    }
    if db.max_pool_size == 0 {
        errors.push(ValidationError::new("database.max_pool_size", "must be greater than 0"));
    }
    if db.min_pool_size > db.max_pool_size {
        errors.push(ValidationError::new(
            "database.min_pool_size",
            format!(
                "{} exceeds max_pool_size {}",
                db.min_pool_size, db.max_pool_size
            ),
        ));
    }
    if db.server_selection_timeout_ms == 0 {
        errors.push(ValidationError::new(
            "database.server_selection_timeout_ms",
            "must be greater than 0",
        ));
    }

    if config.security.max_body_bytes == 0 {
        errors.push(ValidationError::new("security.max_body_bytes", "must be greater than 0"));
    }

    if let Some(Err(e)) = config.observability.metrics_socket_addr() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("not a socket address: {e}"),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
