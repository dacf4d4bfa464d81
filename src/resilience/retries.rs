//! Bounded retry loop used while bringing probes up.
//!
//! # Responsibilities
//! - Run an operation until it succeeds or its error is classified as acceptable
//! - Wait a fixed poll interval between attempts
//! - Give up once the total time budget is spent
//! - Abandon waiting immediately when the parent token is cancelled
//!
//! # Design Decisions
//! - `max_duration` caps wall-clock time across all attempts, including a
//!   hanging attempt, not each attempt individually
//! - Only used for initialization; round trips are never retried

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Time budget for a retried operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    max_duration: Duration,
    poll_interval: Duration,
}

impl RetryConfig {
    /// Both durations must be non-zero.
    pub fn new(max_duration: Duration, poll_interval: Duration) -> Result<Self, RetryError> {
        if poll_interval.is_zero() {
            return Err(RetryError::InvalidPollInterval);
        }
        if max_duration.is_zero() {
            return Err(RetryError::InvalidMaxDuration);
        }
        Ok(Self {
            max_duration,
            poll_interval,
        })
    }

    /// Convenience constructor for whole-second settings from the config file.
    pub fn from_secs(max_secs: u64, poll_secs: u64) -> Result<Self, RetryError> {
        Self::new(Duration::from_secs(max_secs), Duration::from_secs(poll_secs))
    }

    pub fn max_duration(&self) -> Duration {
        self.max_duration
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

/// Errors produced by the retry loop itself.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RetryError {
    #[error(
        "gave up retrying after {elapsed:?} (max {max:?}): last error: {}",
        .last.as_deref().unwrap_or("none")
    )]
    GaveUp {
        elapsed: Duration,
        max: Duration,
        last: Option<String>,
    },

    #[error("retry cancelled: last error: {}", .last.as_deref().unwrap_or("none"))]
    Cancelled { last: Option<String> },

    #[error("retry poll interval must be greater than zero")]
    InvalidPollInterval,

    #[error("retry max duration must be greater than zero")]
    InvalidMaxDuration,
}

/// Run `operation` until it succeeds, `acceptable` accepts its error, the
/// budget in `config` runs out, or `cancel` fires.
pub async fn retry<F, Fut, E, P>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut operation: F,
    acceptable: P,
) -> Result<(), RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: Display,
    P: Fn(&E) -> bool,
{
    let started = Instant::now();
    let deadline = started + config.max_duration;
    let mut attempt: u32 = 0;
    let mut last: Option<String> = None;

    loop {
        attempt += 1;

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetryError::Cancelled { last }),
            _ = sleep_until(deadline) => {
                return Err(RetryError::GaveUp {
                    elapsed: started.elapsed(),
                    max: config.max_duration,
                    last: last.or_else(|| Some(format!("attempt {attempt} still running at the deadline"))),
                });
            }
            outcome = operation() => outcome,
        };

        match outcome {
            Ok(()) => {
                tracing::debug!(attempt, "Operation succeeded");
                return Ok(());
            }
            Err(e) if acceptable(&e) => {
                tracing::debug!(attempt, error = %e, "Operation returned an acceptable error");
                return Ok(());
            }
            Err(e) => {
                tracing::warn!(
                    attempt,
                    error = %e,
                    retry_in = ?config.poll_interval,
                    "Operation failed, retrying"
                );
                last = Some(e.to_string());
            }
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetryError::Cancelled { last }),
            _ = sleep_until(deadline) => {
                return Err(RetryError::GaveUp {
                    elapsed: started.elapsed(),
                    max: config.max_duration,
                    last,
                });
            }
            _ = sleep(config.poll_interval) => {}
        }
    }
}
