use healing_orchestrator::routing::{
    CallOptions, HealthConfig, HealthStore, ProviderRouter, ProviderStatus, RouteTarget,
    RoutingConfig, ULTIMATE_FALLBACK_MODEL, ULTIMATE_FALLBACK_PROVIDER,
};
use healing_orchestrator::{Error, OrchestratorConfig};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn director_on_openai() -> ProviderRouter {
    let yaml = r#"
routing:
  routes:
    director: { provider: openai, model: gpt-4o }
  fallbacks:
    openai: { provider: google, model: gemini-3-pro-preview }
"#;
    OrchestratorConfig::from_yaml_str(yaml)
        .expect("valid config")
        .build_router()
}

#[test]
fn test_five_consecutive_failures_route_to_fallback() {
    let router = ProviderRouter::default();
    let primary = router.resolve("director");
    assert_eq!(primary.provider, "anthropic");
    assert!(!primary.is_fallback);

    for _ in 0..4 {
        router.record_failure("anthropic");
    }
    assert_eq!(router.resolve("director"), primary);

    router.record_failure("anthropic");
    let route = router.resolve("director");
    assert!(route.is_fallback);
    assert_eq!(route.provider, "google");
    assert_eq!(route.model, "gemini-3-pro-preview");
}

#[test]
fn test_success_resets_consecutive_failures() {
    let router = ProviderRouter::default();
    for _ in 0..4 {
        router.record_failure("google");
    }
    router.record_success("google");
    router.record_failure("google");

    let snap = router.health_summary()["google"].clone();
    assert_eq!(snap.consecutive_failures, 1);
    assert_ne!(snap.status, ProviderStatus::Unhealthy);
    assert!(!router.resolve("design_system").is_fallback);
}

#[test]
fn test_resolve_is_deterministic() {
    let router = ProviderRouter::default();
    router.record_failure("openai");
    assert_eq!(router.resolve("seo_content"), router.resolve("seo_content"));
}

#[test]
fn test_unknown_role_uses_ultimate_fallback() {
    let route = ProviderRouter::default().resolve("no_such_role");
    assert_eq!(route.provider, ULTIMATE_FALLBACK_PROVIDER);
    assert_eq!(route.model, ULTIMATE_FALLBACK_MODEL);
    assert!(route.is_fallback);
}

#[test]
fn test_manual_recovery_restores_primary() {
    let router = ProviderRouter::default();
    router.mark_unhealthy("xai");
    assert!(router.resolve("qa").is_fallback);
    router.mark_healthy("xai");
    assert!(!router.resolve("qa").is_fallback);
}

#[tokio::test(start_paused = true)]
async fn test_director_falls_back_from_openai_to_google() {
    let router = director_on_openai();
    let calls = Arc::new(AtomicU32::new(0));

    let counter = calls.clone();
    let reply = router
        .call_with_fallback(
            "director",
            move |provider, model| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if provider == "openai" {
                        Err(format!("{provider} is down"))
                    } else {
                        Ok(format!("{provider}/{model}"))
                    }
                }
            },
            CallOptions::new(),
        )
        .await
        .expect("fallback succeeds");

    assert_eq!(reply, "google/gemini-3-pro-preview");
    // three tries on openai, one on google
    assert_eq!(calls.load(Ordering::SeqCst), 4);

    let summary = router.health_summary();
    assert!(summary["openai"].consecutive_failures >= 1);
    assert_eq!(summary["google"].success_count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_primary_success_never_touches_fallback_or_sleeps() {
    let router = director_on_openai();
    let started = Instant::now();
    let providers = std::sync::Mutex::new(Vec::new());

    let reply = router
        .call_with_fallback(
            "director",
            |provider, _model| {
                providers.lock().unwrap().push(provider.clone());
                async move { Ok::<_, String>(provider) }
            },
            CallOptions::new(),
        )
        .await
        .unwrap();

    assert_eq!(reply, "openai");
    assert_eq!(providers.into_inner().unwrap(), vec!["openai".to_string()]);
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_whole_chain_failing_is_exhausted() {
    let router = director_on_openai();
    let err = router
        .call_with_fallback(
            "director",
            |provider, _| async move { Err::<(), _>(format!("{provider} refused")) },
            CallOptions::new().with_max_attempts(1),
        )
        .await
        .unwrap_err();

    match err {
        Error::Exhausted {
            role,
            providers,
            last_error,
        } => {
            assert_eq!(role, "director");
            assert_eq!(providers, vec!["openai", "google", "anthropic"]);
            assert_eq!(last_error, "anthropic refused");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_shared_health_store_across_routers() {
    let store = Arc::new(HealthStore::new(HealthConfig::new().with_unhealthy_threshold(2)));
    let a = ProviderRouter::with_health_store(RoutingConfig::default(), store.clone());
    let b = ProviderRouter::with_health_store(RoutingConfig::default(), store);

    a.record_failure("anthropic");
    b.record_failure("anthropic");
    assert_eq!(a.status("anthropic"), ProviderStatus::Unhealthy);
    assert_eq!(
        b.provider_chain("frontend_dev")[0],
        RouteTarget::new("anthropic", "claude-sonnet-4-6")
    );
    assert!(b.resolve("frontend_dev").is_fallback);
}

#[test]
fn test_concurrent_failures_are_not_lost() {
    let router = ProviderRouter::default();
    std::thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| {
                for _ in 0..25 {
                    router.record_failure("openai");
                }
            });
        }
    });
    let snap = router.health_summary()["openai"].clone();
    assert_eq!(snap.failure_count, 200);
    assert_eq!(snap.consecutive_failures, 200);
    assert_eq!(snap.status, ProviderStatus::Unhealthy);
}
