//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Init logging/metrics → Bind listener → Init probes → Serve
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → grace period → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     Root token cancelled
//!     → retries and in-flight round trips abort
//!     → server drains and stops
//!     → probe cleanup fan-out
//! ```
//!
//! # Design Decisions
//! - A single root `CancellationToken` carries shutdown everywhere
//! - Only a failed bind is fatal; probe failures never stop the process

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::shutdown_on_signal;
