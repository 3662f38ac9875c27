//! Exponential backoff schedule shared by the executor and the provider router.

use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Exponential delay schedule: `base * factor^(attempt-1)`, optionally capped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    base_delay: Duration,
    factor: f64,
    max_delay: Option<Duration>,
}

impl Backoff {
    /// Doubling schedule with no cap.
    pub fn exponential(base_delay: Duration) -> Self {
        Self {
            base_delay,
            factor: 2.0,
            max_delay: None,
        }
    }

    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = factor;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Delay to wait after the failed 1-based `attempt`, before attempt `attempt + 1`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let nanos = self.base_delay.as_nanos() as f64 * self.factor.powi(exponent);

        // Work in whole nanoseconds so integral factors stay exact.
        let delay = if nanos.is_finite() && nanos >= 0.0 {
            if nanos >= u64::MAX as f64 {
                Duration::from_nanos(u64::MAX)
            } else {
                Duration::from_nanos(nanos.round() as u64)
            }
        } else if nanos.is_nan() || nanos < 0.0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(u64::MAX)
        };

        match self.max_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }
}

/// Sleep for `delay`, returning `false` if `cancel` fired first.
pub(crate) async fn sleep_unless_cancelled(
    delay: Duration,
    cancel: Option<&CancellationToken>,
) -> bool {
    match cancel {
        Some(token) => {
            tokio::select! {
                _ = token.cancelled() => false,
                _ = tokio::time::sleep(delay) => true,
            }
        }
        None => {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            true
        }
    }
}

pub(crate) fn is_cancelled(cancel: Option<&CancellationToken>) -> bool {
    cancel.map(|t| t.is_cancelled()).unwrap_or(false)
}
