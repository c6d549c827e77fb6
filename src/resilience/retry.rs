// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Retry with exponential backoff for the record source.
//!
//! Index pushes are deliberately not retried: a bulk sync aborts on the first
//! failure and a singleton failure is logged and dropped. Retries only wrap
//! relational access, where a dropped connection is the common failure.
//!
//! # Example
//!
//! ```
//! use index_sync::RetryConfig;
//!
//! // Startup: fail fast on bad config
//! let startup = RetryConfig::startup();
//! assert_eq!(startup.max_retries, 5);
//!
//! // Query: quick retry, then fail
//! let query = RetryConfig::query();
//! assert_eq!(query.max_retries, 3);
//! ```

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::metrics;

/// Backoff settings for one class of operation.
///
/// `max_retries` counts attempts, including the first.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub factor: f64,
    pub max_retries: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::query()
    }
}

impl RetryConfig {
    /// Connecting the pool: 5 attempts, failing after ~5 seconds so a bad
    /// URL surfaces quickly.
    #[must_use]
    pub fn startup() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
            factor: 2.0,
        }
    }

    /// Counts and page fetches: 3 attempts with fast backoff.
    #[must_use]
    pub fn query() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            factor: 2.0,
        }
    }

    /// Fast retry for tests (minimal delays)
    #[must_use]
    pub fn test() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            factor: 2.0,
        }
    }

    fn next_delay(&self, delay: Duration) -> Duration {
        delay.mul_f64(self.factor).min(self.max_delay)
    }
}

pub async fn retry<F, Fut, T, E>(
    operation_name: &str,
    config: &RetryConfig,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut delay = config.initial_delay;
    let mut attempts = 0;

    loop {
        match operation().await {
            Ok(val) => {
                if attempts > 0 {
                    info!(operation = operation_name, retries = attempts, "Operation succeeded after retry");
                }
                return Ok(val);
            }
            Err(err) => {
                attempts += 1;
                if attempts >= config.max_retries {
                    return Err(err);
                }

                warn!(
                    operation = operation_name,
                    attempt = attempts,
                    max = config.max_retries,
                    error = %err,
                    ?delay,
                    "Operation failed, retrying"
                );
                metrics::record_retry(operation_name);

                sleep(delay).await;
                delay = config.next_delay(delay);
            }
        }
    }
}
