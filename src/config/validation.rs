//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, retry bounds > 0)
//! - Reject identifiers that are interpolated into SQL unless they are plain words
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::AppConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field}: must be greater than zero")]
    NotPositive { field: &'static str },

    #[error("{field}: '{value}' may only contain letters, digits and underscores")]
    InvalidIdentifier { field: &'static str, value: String },

    #[error("kafka: ca_path, certificate_path and private_key_path must be set together")]
    PartialTls,
}

/// Validate the whole configuration, collecting every error.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    let positive = [
        ("http.request_timeout_secs", config.http.request_timeout_secs),
        ("probes.test_timeout_secs", config.probes.test_timeout_secs),
        ("database.connect_timeout_secs", config.database.connect_timeout_secs),
        ("database.max_retry_secs", config.database.max_retry_secs),
        ("database.retry_interval_secs", config.database.retry_interval_secs),
        ("bigquery.job_timeout_secs", config.bigquery.job_timeout_secs),
        ("bigquery.max_retry_secs", config.bigquery.max_retry_secs),
        ("bigquery.retry_interval_secs", config.bigquery.retry_interval_secs),
        ("kafka.connect_timeout_secs", config.kafka.connect_timeout_secs),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::NotPositive { field });
        }
    }

    let identifiers = [
        ("database.table", &config.database.table),
        ("bigquery.dataset", &config.bigquery.dataset),
        ("bigquery.table", &config.bigquery.table),
    ];
    for (field, value) in identifiers {
        if !value.is_empty() && !is_identifier(value) {
            errors.push(ValidationError::InvalidIdentifier {
                field,
                value: value.clone(),
            });
        }
    }

    let kafka = &config.kafka;
    if kafka.tls_enabled()
        && (kafka.ca_path.is_empty() || kafka.certificate_path.is_empty() || kafka.private_key_path.is_empty())
    {
        errors.push(ValidationError::PartialTls);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_identifier(value: &str) -> bool {
    value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
