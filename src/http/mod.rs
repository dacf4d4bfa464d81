//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, timeout, tracing)
//!     → diagnostics.rs (/ping, /version, /hostname, /log, /logerror, /connect, /metrics)
//!     → verify.rs (/{probe}/test)
//!         → expected value → Testable::test → compare
//!         → 200 | 500 with error or mismatch detail
//! ```
//!
//! # Design Decisions
//! - The verification handler is the only place that picks status codes for probes
//! - Probe routes exist only for probes that survived initialization

pub mod diagnostics;
pub mod server;
pub mod verify;

pub use server::HttpServer;
pub use verify::{expected_value, round_trip, RoundTrip, VerifyState};
