//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Probe initialization:
//!     → retries.rs (repeat until success / acceptable error / budget spent / shutdown)
//!
//! Probe round trips:
//!     → never retried; the HTTP layer applies a per-call timeout instead
//! ```
//!
//! # Design Decisions
//! - Every retry loop has a wall-clock ceiling
//! - Shutdown cancels waiting immediately
//! - "Already exists" style errors count as success, classified by the caller

pub mod retries;

pub use retries::{retry, RetryConfig, RetryError};
