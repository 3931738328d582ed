//! Bounded retry with configurable backoff
//!
//! With the default [`RetryConfig`] this is a constant backoff: up to 3
//! retries, 1000 ms apart. A multiplier above 1.0 turns it into exponential
//! backoff capped at `max_delay`, and jitter can be enabled to spread retries.
//!
//! # Example
//!
//! ```no_run
//! use batch_zip::retry::{IsRetryable, download_with_retry};
//! use batch_zip::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{self:?}")
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() {
//! let config = RetryConfig::default();
//! let report = download_with_retry(&config, || async {
//!     Ok::<_, MyError>(())
//! }).await;
//! assert_eq!(report.retries, 0);
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::FetchError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            // Retried like any other failure, even though it cannot succeed
            FetchError::InvalidUrl { .. } => true,
            // Any non-2xx answer is retried, not just 5xx
            FetchError::Status { .. } => true,
            FetchError::Transport(_) => true,
            FetchError::Body(_) => true,
        }
    }
}

/// Final result of a retried operation plus the retries it consumed
#[derive(Debug)]
pub struct RetryReport<T, E> {
    /// Last result: the success, or the error that ended the loop
    pub result: Result<T, E>,
    /// Retries consumed (attempts - 1)
    pub retries: u32,
}

/// Execute an async operation, retrying retryable failures
///
/// The operation is attempted once, then retried while the error is
/// retryable and fewer than `config.max_retries` retries have been made.
///
/// # Example
///
/// ```no_run
/// use batch_zip::retry::download_with_retry;
/// use batch_zip::config::RetryConfig;
/// use batch_zip::error::FetchError;
///
/// # async fn example() {
/// let config = RetryConfig::default();
/// let report = download_with_retry(&config, || async {
///     Ok::<String, FetchError>("success".to_string())
/// }).await;
/// assert!(report.result.is_ok());
/// # }
/// ```
pub async fn download_with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    mut operation: F,
) -> RetryReport<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut retries = 0;
    let mut delay = config.initial_delay;

    loop {
        match operation().await {
            Ok(result) => {
                if retries > 0 {
                    tracing::info!(attempts = retries + 1, "Operation succeeded after retry");
                }
                return RetryReport {
                    result: Ok(result),
                    retries,
                };
            }
            Err(e) if e.is_retryable() && retries < config.max_retries => {
                retries += 1;

                tracing::warn!(
                    error = %e,
                    retry = retries,
                    max_retries = config.max_retries,
                    delay_ms = delay.as_millis(),
                    "Operation failed, retrying"
                );

                let wait = if config.jitter {
                    add_jitter(delay)
                } else {
                    delay
                };
                tokio::time::sleep(wait).await;

                delay = next_delay(delay, config);
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = retries + 1,
                        "Operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::error!(error = %e, "Operation failed with non-retryable error");
                }
                return RetryReport {
                    result: Err(e),
                    retries,
                };
            }
        }
    }
}

/// Grow the delay by the backoff multiplier, capped at `max_delay`
///
/// The cap is applied in floating point so huge multipliers cannot overflow
/// `Duration`.
fn next_delay(delay: Duration, config: &RetryConfig) -> Duration {
    let grown = delay.as_secs_f64() * config.backoff_multiplier;
    let capped = grown.min(config.max_delay.as_secs_f64());
    Duration::try_from_secs_f64(capped).unwrap_or(config.max_delay)
}

/// Add random jitter to a delay
///
/// The result is uniformly distributed between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
