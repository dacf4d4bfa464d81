//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (environment overrides for platform-injected bindings)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → handed to the probe registry and HTTP server at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - An empty backend identifier means "this probe is not deployed"

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AppConfig, BigQueryConfig, BucketConfig, CephConfig, DatabaseConfig, HttpConfig, KafkaConfig, ListenerConfig,
    LogFormat, ObservabilityConfig, ProbesConfig, TokenConfig,
};
