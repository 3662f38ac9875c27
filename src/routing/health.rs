//! Per-provider health bookkeeping.
//!
//! [`HealthStore`] is the only state shared between concurrent users of a
//! router. Every read and update takes the store mutex for the duration of
//! the bookkeeping only, never across an `.await`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    Healthy,
    /// Only set manually, or reported once the recovery timeout has elapsed.
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProviderStatus::Healthy => "healthy",
            ProviderStatus::Degraded => "degraded",
            ProviderStatus::Unhealthy => "unhealthy",
        };
        f.write_str(s)
    }
}

/// Thresholds for the health state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Consecutive failures that force a provider to `Unhealthy`.
    pub unhealthy_threshold: u32,
    /// Capacity of the latency window.
    pub latency_window: usize,
    /// When set, an unhealthy provider is reported `Degraded` once this many
    /// seconds have passed since it went unhealthy. `None` keeps manual-only
    /// recovery via [`HealthStore::mark_healthy`].
    pub recovery_timeout_secs: Option<u64>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            unhealthy_threshold: 5,
            latency_window: 50,
            recovery_timeout_secs: None,
        }
    }
}

impl HealthConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unhealthy_threshold(mut self, threshold: u32) -> Self {
        self.unhealthy_threshold = threshold;
        self
    }

    pub fn with_latency_window(mut self, capacity: usize) -> Self {
        self.latency_window = capacity;
        self
    }

    pub fn with_recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout_secs = Some(timeout.as_secs());
        self
    }

    pub fn recovery_timeout(&self) -> Option<Duration> {
        self.recovery_timeout_secs.map(Duration::from_secs)
    }
}

/// Health record for a single provider.
#[derive(Debug, Clone)]
pub struct ProviderHealth {
    pub status: ProviderStatus,
    pub failure_count: u64,
    pub success_count: u64,
    pub consecutive_failures: u32,
    pub recent_latencies: VecDeque<Duration>,
    pub last_failure_time: Option<Instant>,
    pub last_success_time: Option<Instant>,
    unhealthy_since: Option<Instant>,
}

impl Default for ProviderHealth {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderHealth {
    pub fn new() -> Self {
        Self {
            status: ProviderStatus::Healthy,
            failure_count: 0,
            success_count: 0,
            consecutive_failures: 0,
            recent_latencies: VecDeque::new(),
            last_failure_time: None,
            last_success_time: None,
            unhealthy_since: None,
        }
    }

    /// Status as seen by routing, taking an optional recovery timeout into account.
    pub fn effective_status(&self, recovery_timeout: Option<Duration>, now: Instant) -> ProviderStatus {
        match (self.status, recovery_timeout, self.unhealthy_since) {
            (ProviderStatus::Unhealthy, Some(timeout), Some(since))
                if now.saturating_duration_since(since) >= timeout =>
            {
                ProviderStatus::Degraded
            }
            (status, _, _) => status,
        }
    }

    pub fn average_latency(&self) -> Option<Duration> {
        if self.recent_latencies.is_empty() {
            return None;
        }
        let total: Duration = self.recent_latencies.iter().sum();
        Some(total / self.recent_latencies.len() as u32)
    }

    fn set_unhealthy(&mut self, now: Instant) {
        self.status = ProviderStatus::Unhealthy;
        self.unhealthy_since = Some(now);
    }
}

/// Read-only view of one provider's health.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub status: ProviderStatus,
    pub failure_count: u64,
    pub success_count: u64,
    pub consecutive_failures: u32,
    pub avg_latency_ms: Option<f64>,
}

/// Mutex-guarded map of provider health records.
///
/// Records are created on the first recorded event for a provider and never
/// removed. A provider with no record reads as `Healthy`.
#[derive(Debug, Default)]
pub struct HealthStore {
    config: HealthConfig,
    records: Mutex<HashMap<String, ProviderHealth>>,
}

impl HealthStore {
    pub fn new(config: HealthConfig) -> Self {
        Self {
            config,
            records: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    // Bookkeeping must keep working after a panic elsewhere.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, ProviderHealth>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update<R>(&self, provider: &str, f: impl FnOnce(&mut ProviderHealth) -> R) -> R {
        let mut records = self.lock();
        let record = records.entry(provider.to_string()).or_default();
        f(record)
    }

    pub fn status(&self, provider: &str) -> ProviderStatus {
        let now = Instant::now();
        self.lock()
            .get(provider)
            .map(|h| h.effective_status(self.config.recovery_timeout(), now))
            .unwrap_or(ProviderStatus::Healthy)
    }

    pub fn is_unhealthy(&self, provider: &str) -> bool {
        self.status(provider) == ProviderStatus::Unhealthy
    }

    pub fn record_success(&self, provider: &str) {
        let recovery = self.config.recovery_timeout();
        let now = Instant::now();
        let recovered = self.update(provider, |h| {
            h.success_count = h.success_count.saturating_add(1);
            h.consecutive_failures = 0;
            h.last_success_time = Some(now);
            if h.effective_status(recovery, now) == ProviderStatus::Degraded {
                h.status = ProviderStatus::Healthy;
                h.unhealthy_since = None;
                true
            } else {
                false
            }
        });
        if recovered {
            info!(provider, "provider recovered to healthy");
        }
    }

    pub fn record_failure(&self, provider: &str) {
        let threshold = self.config.unhealthy_threshold;
        let recovery = self.config.recovery_timeout();
        let now = Instant::now();
        let (tripped, reopened) = self.update(provider, |h| {
            h.failure_count = h.failure_count.saturating_add(1);
            h.consecutive_failures = h.consecutive_failures.saturating_add(1);
            h.last_failure_time = Some(now);
            let was_unhealthy = h.status == ProviderStatus::Unhealthy;
            // A failure while the recovery window is open restarts the timeout
            // no matter how the provider became unhealthy.
            let reopened =
                was_unhealthy && h.effective_status(recovery, now) == ProviderStatus::Degraded;
            if reopened || h.consecutive_failures >= threshold {
                h.set_unhealthy(now);
            }
            (!was_unhealthy && h.status == ProviderStatus::Unhealthy, reopened)
        });
        if tripped {
            warn!(provider, threshold, "provider marked unhealthy after consecutive failures");
        } else if reopened {
            warn!(provider, "recovery attempt failed; provider unhealthy again");
        }
    }

    pub fn record_latency(&self, provider: &str, latency: Duration) {
        let capacity = self.config.latency_window;
        self.update(provider, |h| {
            if capacity == 0 {
                return;
            }
            while h.recent_latencies.len() >= capacity {
                h.recent_latencies.pop_front();
            }
            h.recent_latencies.push_back(latency);
        });
    }

    pub fn mark_unhealthy(&self, provider: &str) {
        let now = Instant::now();
        self.update(provider, |h| h.set_unhealthy(now));
        warn!(provider, "provider manually marked unhealthy");
    }

    pub fn mark_healthy(&self, provider: &str) {
        self.update(provider, |h| {
            h.status = ProviderStatus::Healthy;
            h.consecutive_failures = 0;
            h.unhealthy_since = None;
        });
        info!(provider, "provider manually marked healthy");
    }

    /// Set `Degraded` explicitly. A later success closes it back to `Healthy`.
    pub fn mark_degraded(&self, provider: &str) {
        self.update(provider, |h| {
            h.status = ProviderStatus::Degraded;
            h.unhealthy_since = None;
        });
    }

    /// Clone of the raw record, if the provider has been seen.
    pub fn record(&self, provider: &str) -> Option<ProviderHealth> {
        self.lock().get(provider).cloned()
    }

    pub fn snapshot(&self, provider: &str) -> Option<HealthSnapshot> {
        let now = Instant::now();
        let recovery = self.config.recovery_timeout();
        self.lock()
            .get(provider)
            .map(|h| to_snapshot(h, recovery, now))
    }

    /// Snapshot of every known provider, ordered by name.
    pub fn summary(&self) -> BTreeMap<String, HealthSnapshot> {
        let now = Instant::now();
        let recovery = self.config.recovery_timeout();
        self.lock()
            .iter()
            .map(|(name, h)| (name.clone(), to_snapshot(h, recovery, now)))
            .collect()
    }
}

fn to_snapshot(h: &ProviderHealth, recovery: Option<Duration>, now: Instant) -> HealthSnapshot {
    HealthSnapshot {
        status: h.effective_status(recovery, now),
        failure_count: h.failure_count,
        success_count: h.success_count,
        consecutive_failures: h.consecutive_failures,
        avg_latency_ms: h.average_latency().map(|d| d.as_secs_f64() * 1000.0),
    }
}
