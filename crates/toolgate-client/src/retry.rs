//! Bounded exponential-backoff retry executor.
//!
//! Each call to [`with_retry`] is independent: the executor holds no state
//! between calls, so any number may run concurrently.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use log::{debug, warn};
use rand::Rng;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use toolgate_common::RetryConfig;

use crate::error::{ClientError, ErrorKind};

/// Progress callback invoked with the number of the attempt about to be made.
pub type AttemptCallback<'a> = &'a (dyn Fn(u32) + Send + Sync);

/// Errors that know whether repeating the failed operation could help.
pub trait Retryable {
    /// Whether another attempt is worth making.
    fn is_retryable(&self) -> bool;
}

impl Retryable for ClientError {
    fn is_retryable(&self) -> bool {
        Self::is_retryable(self)
    }
}

impl Retryable for anyhow::Error {
    fn is_retryable(&self) -> bool {
        // Structured errors first; fall back to the message text.
        if let Some(client_err) = self.downcast_ref::<ClientError>() {
            return client_err.is_retryable();
        }
        ErrorKind::from_message(&format!("{self:#}")).is_retryable()
    }
}

/// Terminal outcome of a retried operation.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// The operation failed with an error that is not worth retrying.
    #[error(transparent)]
    Fatal(E),

    /// Every allowed attempt failed with a retryable error.
    #[error("{operation} failed after {attempts} attempts: {source}")]
    Exhausted {
        /// Label of the operation, for operators.
        operation: String,
        /// Number of attempts made.
        attempts: u32,
        /// Error of the final attempt.
        source: E,
    },

    /// The sequence was abandoned through its cancellation token.
    #[error("{operation} cancelled after {attempts} attempts")]
    Cancelled {
        /// Label of the operation, for operators.
        operation: String,
        /// Number of attempts that completed before cancellation.
        attempts: u32,
        /// Error of the last completed attempt, if any.
        last_error: Option<E>,
    },
}

impl<E> RetryError<E> {
    /// Number of attempts made, when known.
    ///
    /// Fatal errors always stop the sequence on the attempt that raised them,
    /// which the error itself does not record.
    pub const fn attempts(&self) -> Option<u32> {
        match self {
            Self::Fatal(_) => None,
            Self::Exhausted { attempts, .. } | Self::Cancelled { attempts, .. } => Some(*attempts),
        }
    }

    /// The underlying error of the last attempt, if there was one.
    pub const fn last_error(&self) -> Option<&E> {
        match self {
            Self::Fatal(e) | Self::Exhausted { source: e, .. } => Some(e),
            Self::Cancelled { last_error, .. } => last_error.as_ref(),
        }
    }

    /// Whether the sequence ended through cancellation.
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Delay to wait after the failed `attempt`, with jitter applied when enabled.
///
/// Jitter scales the delay into `[50%, 100%]` of its un-jittered value, so the
/// cap still holds.
#[must_use]
pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let delay = config.delay_for_attempt(attempt);
    if config.jitter && !delay.is_zero() {
        delay.mul_f64(rand::thread_rng().gen_range(0.5..=1.0))
    } else {
        delay
    }
}

/// Runs `op` until it succeeds, fails fatally or runs out of attempts.
///
/// `config.max_retries` bounds the total number of attempts. Between attempts
/// the executor sleeps for [`RetryConfig::delay_for_attempt`], after calling
/// `on_attempt` with the number of the attempt about to start.
///
/// # Errors
///
/// Returns [`RetryError::Fatal`] for the first non-retryable error and
/// [`RetryError::Exhausted`] when every attempt failed retryably.
pub async fn with_retry<T, E, F, Fut>(
    operation: &str,
    config: &RetryConfig,
    op: F,
    on_attempt: Option<AttemptCallback<'_>>,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    run(operation, config, op, on_attempt, None).await
}

/// [`with_retry`] that also stops when `cancel` fires.
///
/// Cancellation interrupts both an in-flight attempt and a backoff sleep.
///
/// # Errors
///
/// As [`with_retry`], plus [`RetryError::Cancelled`] once `cancel` is triggered.
pub async fn with_retry_cancellable<T, E, F, Fut>(
    operation: &str,
    config: &RetryConfig,
    op: F,
    on_attempt: Option<AttemptCallback<'_>>,
    cancel: &CancellationToken,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    run(operation, config, op, on_attempt, Some(cancel)).await
}

async fn run<T, E, F, Fut>(
    operation: &str,
    config: &RetryConfig,
    mut op: F,
    on_attempt: Option<AttemptCallback<'_>>,
    cancel: Option<&CancellationToken>,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    let max_attempts = config.max_retries.max(1);
    let mut last_error: Option<E> = None;
    let mut attempt = 1;

    loop {
        let cancelled = |attempts, last_error| RetryError::Cancelled {
            operation: operation.to_string(),
            attempts,
            last_error,
        };

        let result = match cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    () = token.cancelled() => {
                        debug!("{operation} cancelled before attempt {attempt}");
                        return Err(cancelled(attempt - 1, last_error));
                    }
                    result = op() => result,
                }
            }
            None => op().await,
        };

        let error = match result {
            Ok(value) => {
                if attempt > 1 {
                    debug!("{operation} succeeded on attempt {attempt}/{max_attempts}");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if !error.is_retryable() {
            debug!("{operation} failed with non-retryable error: {error}");
            return Err(RetryError::Fatal(error));
        }

        if attempt >= max_attempts {
            warn!("{operation} failed after {attempt} attempts: {error}");
            return Err(RetryError::Exhausted {
                operation: operation.to_string(),
                attempts: attempt,
                source: error,
            });
        }

        let delay = backoff_delay(config, attempt);
        warn!(
            "{operation} failed (attempt {attempt}/{max_attempts}), retrying in {delay:?}: {error}"
        );
        last_error = Some(error);

        if let Some(callback) = on_attempt {
            callback(attempt + 1);
        }

        match cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    () = token.cancelled() => {
                        debug!("{operation} cancelled during backoff");
                        return Err(cancelled(attempt, last_error));
                    }
                    () = tokio::time::sleep(delay) => {}
                }
            }
            None => tokio::time::sleep(delay).await,
        }

        attempt += 1;
    }
}
