//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use crate::config::schema::AppConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load configuration from an optional TOML file, apply environment
/// overrides, and validate the result.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
            toml::from_str(&content).map_err(ConfigError::Parse)?
        }
        None => AppConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay the environment variables the platform injects for managed
/// service bindings. Empty values are ignored.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let targets: [(&str, &mut String); 18] = [
        ("BIND_ADDRESS", &mut config.listener.bind_address),
        ("BUCKET_NAME", &mut config.bucket.name),
        ("BUCKET_OBJECT_NAME", &mut config.bucket.object_name),
        ("CEPH_HOST", &mut config.ceph.host),
        ("CEPH_BUCKET", &mut config.ceph.bucket),
        ("CEPH_ACCESS_KEY", &mut config.ceph.access_key),
        ("CEPH_SECRET_KEY", &mut config.ceph.secret_key),
        ("DB_HOST", &mut config.database.host),
        ("DB_USER", &mut config.database.user),
        ("DB_PASSWORD", &mut config.database.password),
        ("DB_NAME", &mut config.database.name),
        ("GCP_TEAM_PROJECT_ID", &mut config.bigquery.project_id),
        ("BIGQUERY_DATASET", &mut config.bigquery.dataset),
        ("BIGQUERY_TABLE", &mut config.bigquery.table),
        ("KAFKA_BROKERS", &mut config.kafka.brokers),
        ("KAFKA_CA_PATH", &mut config.kafka.ca_path),
        ("KAFKA_CERTIFICATE_PATH", &mut config.kafka.certificate_path),
        ("KAFKA_PRIVATE_KEY_PATH", &mut config.kafka.private_key_path),
    ];

    for (key, target) in targets {
        if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
            *target = value;
        }
    }
}
