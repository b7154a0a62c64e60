//! Retry Logic with Exponential Backoff
//!
//! Provides configurable retry behavior for chain RPC calls.
//! Only retries errors that classify themselves as retryable.

use std::fmt::Display;
use std::future::Future;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// Errors that know whether repeating the call can help
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay between retries in milliseconds
    pub initial_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_delay_ms: u64,
    /// Backoff multiplier
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 100,
            max_delay_ms: 5000,
            backoff_factor: 2.0,
        }
    }
}

/// Execute an async closure with retry logic.
///
/// Only retries if `Retryable::is_retryable()` returns true for the error.
pub async fn with_retry<T, E, F, Fut>(config: &RetryConfig, operation_name: &str, mut f: F) -> Result<T, E>
where
    E: Retryable + Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    let mut delay_ms = config.initial_delay_ms;

    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(err) => {
                attempt += 1;

                if !err.is_retryable() || attempt > config.max_retries {
                    if err.is_retryable() && config.max_retries > 0 {
                        warn!(
                            "[Retry] {} failed after {} attempts: {}",
                            operation_name, attempt, err
                        );
                    }
                    return Err(err);
                }

                debug!(
                    "[Retry] {} attempt {}/{} failed ({}), retrying in {}ms",
                    operation_name, attempt, config.max_retries, err, delay_ms
                );

                sleep(Duration::from_millis(delay_ms)).await;

                // Exponential backoff with cap
                delay_ms = ((delay_ms as f64 * config.backoff_factor) as u64).min(config.max_delay_ms);
            }
        }
    }
}
