use crate::resilience::backoff::{is_cancelled, sleep_unless_cancelled, Backoff};
use crate::routing::config::{RouteTarget, RoutingConfig};
use crate::routing::health::{HealthSnapshot, HealthStore, ProviderStatus};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Outcome of resolving a role against current health.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteResult {
    pub provider: String,
    pub model: String,
    pub is_fallback: bool,
}

impl RouteResult {
    fn from_target(target: &RouteTarget, is_fallback: bool) -> Self {
        Self {
            provider: target.provider.clone(),
            model: target.model.clone(),
            is_fallback,
        }
    }
}

/// Retry budget for [`ProviderRouter::call_with_fallback`].
#[derive(Debug, Clone)]
pub struct CallOptions {
    /// Attempts per provider in the chain.
    pub max_attempts: u32,
    /// First backoff delay; doubles on every retry of the same provider.
    pub base_delay: Duration,
    pub cancel: Option<CancellationToken>,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            cancel: None,
        }
    }
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Health-aware router from logical roles to (provider, model) pairs.
///
/// Routing never fails: unknown roles and exhausted fallbacks both resolve
/// to the configured ultimate fallback.
#[derive(Debug, Clone)]
pub struct ProviderRouter {
    config: Arc<RoutingConfig>,
    health: Arc<HealthStore>,
}

impl Default for ProviderRouter {
    fn default() -> Self {
        Self::new(RoutingConfig::default())
    }
}

impl ProviderRouter {
    /// Router with its own, empty health store.
    pub fn new(config: RoutingConfig) -> Self {
        Self::with_health_store(config, Arc::new(HealthStore::default()))
    }

    /// Router sharing an externally owned health store.
    pub fn with_health_store(config: RoutingConfig, health: Arc<HealthStore>) -> Self {
        Self {
            config: Arc::new(config),
            health,
        }
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    pub fn health(&self) -> &Arc<HealthStore> {
        &self.health
    }

    pub fn resolve(&self, role: &str) -> RouteResult {
        let primary = match self.config.route(role) {
            Some(target) => target,
            None => {
                debug!(role, "no route configured; using ultimate fallback");
                return RouteResult::from_target(&self.config.ultimate_fallback, true);
            }
        };

        if !self.health.is_unhealthy(&primary.provider) {
            return RouteResult::from_target(primary, false);
        }

        let fallback = self.config.fallback_for(&primary.provider);
        if !self.health.is_unhealthy(&fallback.provider) {
            warn!(
                role,
                primary = %primary.provider,
                fallback = %fallback.provider,
                "primary provider unhealthy; routing to fallback"
            );
            return RouteResult::from_target(fallback, true);
        }

        warn!(role, "primary and fallback unhealthy; using ultimate fallback");
        RouteResult::from_target(&self.config.ultimate_fallback, true)
    }

    pub fn record_success(&self, provider: &str) {
        self.health.record_success(provider);
    }

    pub fn record_failure(&self, provider: &str) {
        self.health.record_failure(provider);
    }

    pub fn record_latency(&self, provider: &str, latency: Duration) {
        self.health.record_latency(provider, latency);
    }

    pub fn mark_unhealthy(&self, provider: &str) {
        self.health.mark_unhealthy(provider);
    }

    pub fn mark_healthy(&self, provider: &str) {
        self.health.mark_healthy(provider);
    }

    pub fn status(&self, provider: &str) -> ProviderStatus {
        self.health.status(provider)
    }

    /// `[primary, primary's fallback, ultimate fallback]`, duplicates removed.
    ///
    /// Health is not consulted here.
    pub fn provider_chain(&self, role: &str) -> Vec<RouteTarget> {
        let ultimate = &self.config.ultimate_fallback;
        let primary = self.config.route(role).unwrap_or(ultimate);
        let fallback = self.config.fallback_for(&primary.provider);

        let mut chain: Vec<RouteTarget> = Vec::with_capacity(3);
        for target in [primary, fallback, ultimate] {
            if !chain.contains(target) {
                chain.push(target.clone());
            }
        }
        chain
    }

    /// Run `operation(provider, model)` along the provider chain for `role`.
    ///
    /// Each provider gets `max_attempts` tries with doubling backoff between
    /// tries of the same provider; moving to the next provider does not sleep.
    /// Returns on the first success anywhere in the chain.
    pub async fn call_with_fallback<F, Fut, T, E>(
        &self,
        role: &str,
        mut operation: F,
        options: CallOptions,
    ) -> Result<T>
    where
        F: FnMut(String, String) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Display,
    {
        let chain = self.provider_chain(role);
        let max_attempts = options.max_attempts.max(1);
        let backoff = Backoff::exponential(options.base_delay);
        let cancel = options.cancel.as_ref();
        let mut attempted: Vec<String> = Vec::with_capacity(chain.len());
        let mut last_error = String::new();

        for target in &chain {
            let provider = target.provider.as_str();
            if !attempted.iter().any(|p| p == provider) {
                attempted.push(provider.to_string());
            }

            for attempt in 1..=max_attempts {
                if is_cancelled(cancel) {
                    return Err(Error::Cancelled);
                }

                debug!(role, provider, model = %target.model, attempt, "calling provider");
                let started = Instant::now();
                match operation(target.provider.clone(), target.model.clone()).await {
                    Ok(value) => {
                        self.health.record_success(provider);
                        self.health.record_latency(provider, started.elapsed());
                        if attempted.len() > 1 {
                            info!(role, provider, "call succeeded on fallback provider");
                        }
                        return Ok(value);
                    }
                    Err(e) => {
                        last_error = e.to_string();
                        self.health.record_failure(provider);
                        warn!(role, provider, attempt, error = %last_error, "provider call failed");
                    }
                }

                if attempt < max_attempts
                    && !sleep_unless_cancelled(backoff.delay_for(attempt), cancel).await
                {
                    return Err(Error::Cancelled);
                }
            }
        }

        error!(role, providers = ?attempted, "all providers in chain failed");
        Err(Error::Exhausted {
            role: role.to_string(),
            providers: attempted,
            last_error,
        })
    }

    /// Health of every provider seen so far.
    pub fn health_summary(&self) -> BTreeMap<String, HealthSnapshot> {
        self.health.summary()
    }

    /// Currently resolved route for every configured role.
    pub fn list_routes(&self) -> BTreeMap<String, RouteResult> {
        self.config
            .roles()
            .map(|role| (role.to_string(), self.resolve(role)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::config::{ULTIMATE_FALLBACK_MODEL, ULTIMATE_FALLBACK_PROVIDER};
    use crate::routing::health::HealthConfig;

    fn router() -> ProviderRouter {
        let config = RoutingConfig::empty()
            .with_route("director", "openai", "gpt-4o")
            .with_route("qa", "xai", "grok-3")
            .with_fallback("openai", "google", "gemini-3-pro-preview");
        ProviderRouter::new(config)
    }

    #[test]
    fn test_resolve_primary_when_healthy() {
        let r = router();
        let route = r.resolve("director");
        assert_eq!(route.provider, "openai");
        assert_eq!(route.model, "gpt-4o");
        assert!(!route.is_fallback);
    }

    #[test]
    fn test_unknown_role_uses_ultimate_fallback() {
        let route = router().resolve("nobody");
        assert_eq!(route.provider, ULTIMATE_FALLBACK_PROVIDER);
        assert_eq!(route.model, ULTIMATE_FALLBACK_MODEL);
        assert!(route.is_fallback);
    }

    #[test]
    fn test_unhealthy_primary_routes_to_configured_fallback() {
        let r = router();
        for _ in 0..5 {
            r.record_failure("openai");
        }
        let route = r.resolve("director");
        assert_eq!(route.provider, "google");
        assert!(route.is_fallback);
    }

    #[test]
    fn test_unconfigured_fallback_uses_ultimate() {
        let r = router();
        r.mark_unhealthy("xai");
        let route = r.resolve("qa");
        assert_eq!(route.provider, ULTIMATE_FALLBACK_PROVIDER);
        assert!(route.is_fallback);
    }

    #[test]
    fn test_all_unhealthy_degrades_to_ultimate() {
        let r = router();
        r.mark_unhealthy("openai");
        r.mark_unhealthy("google");
        r.mark_unhealthy(ULTIMATE_FALLBACK_PROVIDER);
        let route = r.resolve("director");
        assert_eq!(route.provider, ULTIMATE_FALLBACK_PROVIDER);
        assert!(route.is_fallback);
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let r = router();
        r.record_failure("openai");
        assert_eq!(r.resolve("director"), r.resolve("director"));
    }

    #[test]
    fn test_mark_healthy_restores_primary() {
        let r = router();
        r.mark_unhealthy("openai");
        assert!(r.resolve("director").is_fallback);
        r.mark_healthy("openai");
        assert!(!r.resolve("director").is_fallback);
    }

    #[test]
    fn test_chain_is_deduplicated() {
        let config = RoutingConfig::empty()
            .with_route("writer", ULTIMATE_FALLBACK_PROVIDER, ULTIMATE_FALLBACK_MODEL);
        let r = ProviderRouter::new(config);
        assert_eq!(r.provider_chain("writer").len(), 1);

        let chain = router().provider_chain("director");
        let providers: Vec<&str> = chain.iter().map(|t| t.provider.as_str()).collect();
        assert_eq!(providers, vec!["openai", "google", ULTIMATE_FALLBACK_PROVIDER]);
    }

    #[test]
    fn test_shared_health_store() {
        let store = Arc::new(HealthStore::new(
            HealthConfig::new().with_unhealthy_threshold(1),
        ));
        let a = ProviderRouter::with_health_store(RoutingConfig::default(), store.clone());
        let b = ProviderRouter::with_health_store(RoutingConfig::default(), store);
        a.record_failure("anthropic");
        assert!(b.resolve("director").is_fallback);
    }

    #[test]
    fn test_list_routes_covers_every_role() {
        let r = ProviderRouter::default();
        let routes = r.list_routes();
        assert_eq!(routes.len(), 8);
        assert!(routes.values().all(|route| !route.is_fallback));
    }

    #[tokio::test(start_paused = true)]
    async fn test_primary_success_short_circuits() {
        let r = router();
        let started = Instant::now();
        let mut calls = Vec::new();
        let out = r
            .call_with_fallback(
                "director",
                |provider, model| {
                    calls.push(provider.clone());
                    async move { Ok::<_, String>(format!("{provider}/{model}")) }
                },
                CallOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(out, "openai/gpt-4o");
        assert_eq!(calls, vec!["openai".to_string()]);
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(r.health_summary()["openai"].success_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_between_retries_of_same_provider() {
        let r = router();
        let started = Instant::now();
        let mut openai_calls = 0u32;
        let out = r
            .call_with_fallback(
                "director",
                |provider, _model| {
                    let fail = provider == "openai" && {
                        openai_calls += 1;
                        openai_calls < 3
                    };
                    async move {
                        if fail {
                            Err("rate limit")
                        } else {
                            Ok(provider)
                        }
                    }
                },
                CallOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(out, "openai");
        // 1s after the first failure, 2s after the second.
        assert_eq!(started.elapsed(), Duration::from_secs(3));
        let snap = &r.health_summary()["openai"];
        assert_eq!(snap.failure_count, 2);
        assert_eq!(snap.consecutive_failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_chain_names_every_provider() {
        let r = router();
        let err = r
            .call_with_fallback(
                "director",
                |provider, _| async move { Err::<(), _>(format!("{provider} down")) },
                CallOptions::new()
                    .with_max_attempts(2)
                    .with_base_delay(Duration::from_millis(10)),
            )
            .await
            .unwrap_err();
        match err {
            Error::Exhausted {
                providers,
                last_error,
                ..
            } => {
                assert_eq!(providers, vec!["openai", "google", ULTIMATE_FALLBACK_PROVIDER]);
                assert_eq!(last_error, format!("{} down", ULTIMATE_FALLBACK_PROVIDER));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(r.health_summary()["google"].failure_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_backoff_sleep() {
        let r = router();
        let token = CancellationToken::new();
        let trigger = token.clone();
        let err = r
            .call_with_fallback(
                "director",
                |_, _| {
                    trigger.cancel();
                    async { Err::<(), _>("boom") }
                },
                CallOptions::new().with_cancel_token(token),
            )
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(r.health_summary()["openai"].failure_count, 1);
    }
}
