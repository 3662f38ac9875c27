use healing_orchestrator::resilience::{boxed_operation, ResilientExecutor, RetryConfig};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

fn executor(max_attempts: u32, base_ms: u64, factor: f64, max_ms: u64) -> ResilientExecutor {
    ResilientExecutor::new(
        RetryConfig::new()
            .with_max_attempts(max_attempts)
            .with_base_delay(Duration::from_millis(base_ms))
            .with_backoff_factor(factor)
            .with_max_delay(Duration::from_millis(max_ms)),
    )
}

#[tokio::test(start_paused = true)]
async fn test_delays_grow_geometrically_until_capped() {
    let exec = executor(6, 100, 3.0, 2_000);
    let started = Instant::now();
    let stamps = Arc::new(Mutex::new(Vec::new()));

    let seen = stamps.clone();
    let result = exec
        .execute(move || {
            seen.lock().unwrap().push(started.elapsed());
            async { Err::<(), _>("still failing") }
        })
        .await;

    assert!(!result.success);
    assert_eq!(result.attempts, 6);
    let stamps = stamps.lock().unwrap();
    let gaps: Vec<Duration> = stamps.windows(2).map(|w| w[1] - w[0]).collect();
    assert_eq!(
        gaps,
        vec![
            Duration::from_millis(100),
            Duration::from_millis(300),
            Duration::from_millis(900),
            Duration::from_millis(2_000),
            Duration::from_millis(2_000),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_recovers_on_third_attempt() {
    let exec = executor(3, 1_000, 2.0, 60_000);
    let calls = AtomicU32::new(0);
    let started = Instant::now();

    let result = exec
        .execute(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(format!("transient #{n}"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

    assert!(result.success);
    assert_eq!(result.value, Some(3));
    assert_eq!(result.attempts, 3);
    assert!(result.error.is_none());
    // 1s + 2s of backoff
    assert_eq!(started.elapsed(), Duration::from_secs(3));
    assert_eq!(result.elapsed_ms, 3_000);
}

#[tokio::test(start_paused = true)]
async fn test_fallback_operations_in_order() {
    let exec = executor(2, 10, 2.0, 1_000);
    let order = Arc::new(Mutex::new(Vec::new()));

    let o1 = order.clone();
    let o2 = order.clone();
    let o3 = order.clone();
    let result = exec
        .execute_with_fallback(
            boxed_operation(move || {
                o1.lock().unwrap().push("primary");
                async { Err::<&str, _>("primary down") }
            }),
            vec![
                boxed_operation(move || {
                    o2.lock().unwrap().push("secondary");
                    async { Err::<&str, _>("secondary down") }
                }),
                boxed_operation(move || {
                    o3.lock().unwrap().push("tertiary");
                    async { Ok::<_, &str>("served by tertiary") }
                }),
            ],
        )
        .await;

    assert!(result.success);
    assert_eq!(result.value, Some("served by tertiary"));
    assert_eq!(result.attempts, 5);
    assert_eq!(
        *order.lock().unwrap(),
        vec!["primary", "primary", "secondary", "secondary", "tertiary"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_backoff_stops_retrying() {
    let token = CancellationToken::new();
    let exec = executor(5, 10_000, 2.0, 60_000).with_cancel_token(token.clone());
    let calls = Arc::new(AtomicU32::new(0));

    let canceller = tokio::spawn({
        let token = token.clone();
        async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            token.cancel();
        }
    });

    let counter = calls.clone();
    let result = exec
        .execute(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>("boom") }
        })
        .await;
    canceller.await.unwrap();

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("cancelled"));
    assert!(result.cancelled);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.attempts, 1);
}

#[test]
fn test_retry_config_from_yaml_keeps_defaults() {
    let cfg: RetryConfig = serde_yaml::from_str("max_attempts: 7\n").unwrap();
    assert_eq!(cfg.max_attempts, 7);
    assert_eq!(cfg.base_delay_ms, 1_000);
    assert_eq!(cfg.max_delay_ms, 60_000);
    assert_eq!(cfg.backoff_factor, 2.0);
}
