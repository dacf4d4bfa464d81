//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGTERM or SIGINT
//! - Keep serving for the configured grace period, so load balancers can
//!   stop routing to the pod first
//! - Trigger shutdown
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A second signal during the grace period triggers shutdown immediately

use std::time::Duration;

use crate::lifecycle::Shutdown;

/// Resolve when the process receives SIGTERM or SIGINT.
pub async fn wait_for_signal() -> std::io::Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate())?;
        let mut interrupt = signal(SignalKind::interrupt())?;
        tokio::select! {
            _ = terminate.recv() => Ok("SIGTERM"),
            _ = interrupt.recv() => Ok("SIGINT"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        Ok("ctrl-c")
    }
}

/// Wait for a signal, hold for `grace`, then trigger `shutdown`.
pub async fn shutdown_on_signal(shutdown: Shutdown, grace: Duration) {
    match wait_for_signal().await {
        Ok(signal) => tracing::info!(signal, grace_secs = grace.as_secs(), "Shutdown signal received"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to install signal handlers, shutting down");
            shutdown.trigger();
            return;
        }
    }

    if !grace.is_zero() {
        tokio::select! {
            _ = tokio::time::sleep(grace) => {}
            _ = wait_for_signal() => tracing::warn!("Second signal received, skipping grace period"),
        }
    }

    shutdown.trigger();
}
