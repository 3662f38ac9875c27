//! Generic retry-with-backoff executor.
//!
//! [`ResilientExecutor`] is provider-agnostic: it wraps any fallible async
//! operation, retries it on a capped exponential schedule and reports the
//! outcome as an [`ExecutionResult`] instead of an error.

use crate::resilience::backoff::{is_cancelled, sleep_unless_cancelled, Backoff};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Retry budget and delay schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            backoff_factor: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::exponential(Duration::from_millis(self.base_delay_ms))
            .with_factor(self.backoff_factor)
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
    }

    /// A zero budget still runs the operation once.
    pub fn effective_max_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Outcome of an executor run. Failures are data, not errors.
#[derive(Debug, Clone)]
pub struct ExecutionResult<T> {
    pub success: bool,
    pub value: Option<T>,
    pub error: Option<String>,
    /// Attempts spent; cumulative across the chain for `execute_with_fallback`.
    pub attempts: u32,
    pub elapsed_ms: u64,
    /// Stopped by the cancellation token rather than by running out of attempts.
    pub cancelled: bool,
}

impl<T> ExecutionResult<T> {
    fn succeeded(value: T, attempts: u32, started: Instant) -> Self {
        Self {
            success: true,
            value: Some(value),
            error: None,
            attempts,
            elapsed_ms: started.elapsed().as_millis() as u64,
            cancelled: false,
        }
    }

    fn failed(error: String, attempts: u32, started: Instant) -> Self {
        Self {
            success: false,
            value: None,
            error: Some(error),
            attempts,
            elapsed_ms: started.elapsed().as_millis() as u64,
            cancelled: false,
        }
    }

    fn cancelled(attempts: u32, started: Instant) -> Self {
        Self {
            cancelled: true,
            ..Self::failed(CANCELLED_MESSAGE.to_string(), attempts, started)
        }
    }

    /// Convert into a plain `Result`, keeping only the error message.
    pub fn into_result(self) -> std::result::Result<T, String> {
        match self.value {
            Some(v) if self.success => Ok(v),
            _ => Err(self
                .error
                .unwrap_or_else(|| "execution failed".to_string())),
        }
    }
}

/// Type-erased operation used for fallback chains.
pub type BoxOperation<'a, T, E> =
    Box<dyn FnMut() -> BoxFuture<'a, std::result::Result<T, E>> + Send + 'a>;

/// Box a closure into a [`BoxOperation`].
pub fn boxed_operation<'a, F, Fut, T, E>(mut f: F) -> BoxOperation<'a, T, E>
where
    F: FnMut() -> Fut + Send + 'a,
    Fut: Future<Output = std::result::Result<T, E>> + Send + 'a,
{
    Box::new(move || f().boxed())
}

pub(crate) const CANCELLED_MESSAGE: &str = "cancelled";

/// Retry wrapper around any fallible async operation.
#[derive(Debug, Clone, Default)]
pub struct ResilientExecutor {
    config: RetryConfig,
    cancel: Option<CancellationToken>,
}

impl ResilientExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            cancel: None,
        }
    }

    /// Abort pending sleeps and further attempts once `token` is cancelled.
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `operation` until it succeeds or the attempt budget is spent.
    ///
    /// The delay before attempt `k + 1` is `min(base * factor^(k-1), max_delay)`.
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> ExecutionResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Display,
    {
        let started = Instant::now();
        let max_attempts = self.config.effective_max_attempts();
        let backoff = self.config.backoff();
        let cancel = self.cancel.as_ref();
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            if is_cancelled(cancel) {
                return ExecutionResult::cancelled(attempt - 1, started);
            }

            debug!(attempt, max_attempts, "executing operation");
            match operation().await {
                Ok(value) => return ExecutionResult::succeeded(value, attempt, started),
                Err(e) => {
                    last_error = e.to_string();
                    warn!(attempt, max_attempts, error = %last_error, "operation attempt failed");
                }
            }

            if attempt < max_attempts {
                let delay = backoff.delay_for(attempt);
                if !sleep_unless_cancelled(delay, cancel).await {
                    return ExecutionResult::cancelled(attempt, started);
                }
            }
        }

        ExecutionResult::failed(last_error, max_attempts, started)
    }

    /// Run `primary`, then each fallback in order, stopping at the first success.
    ///
    /// `attempts` in the result is the sum over every operation tried.
    pub async fn execute_with_fallback<'a, T, E>(
        &self,
        primary: BoxOperation<'a, T, E>,
        fallbacks: Vec<BoxOperation<'a, T, E>>,
    ) -> ExecutionResult<T>
    where
        E: Display,
    {
        let started = Instant::now();
        let mut total_attempts = 0u32;
        let mut tried = 0usize;
        let mut last_error = None;

        for (index, mut op) in std::iter::once(primary).chain(fallbacks).enumerate() {
            if index > 0 && is_cancelled(self.cancel.as_ref()) {
                return ExecutionResult::cancelled(total_attempts, started);
            }
            tried += 1;
            let result = self.execute(&mut op).await;
            total_attempts += result.attempts;

            if result.success {
                if index > 0 {
                    debug!(fallback = index, "fallback operation succeeded");
                }
                return ExecutionResult {
                    attempts: total_attempts,
                    elapsed_ms: started.elapsed().as_millis() as u64,
                    ..result
                };
            }

            if result.cancelled {
                return ExecutionResult::cancelled(total_attempts, started);
            }
            last_error = result.error;
            warn!(operation = index, "operation exhausted its retries; moving on");
        }

        let message = format!(
            "All {} operations failed; last error: {}",
            tried,
            last_error.unwrap_or_default()
        );
        error!(operations = tried, attempts = total_attempts, "fallback chain exhausted");
        ExecutionResult::failed(message, total_attempts, started)
    }
}
