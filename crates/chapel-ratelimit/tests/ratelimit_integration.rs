//! ---
//! chapel_section: "06-security-access-control"
//! chapel_subsection: "integration-tests"
//! chapel_type: "source"
//! chapel_scope: "code"
//! chapel_description: "Persisted rate limiting for sensitive operations."
//! chapel_version: "v0.1.0"
//! chapel_owner: "platform"
//! ---
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chapel_common::{AppConfig, Clock, ManualClock};
use chapel_persistence::{FileStore, KeyValueStore, PersistenceError};
use chapel_ratelimit::{
    RateLimitMetrics, RateLimitPolicy, RateLimiter, SensitiveOperation, STORAGE_PREFIX,
};
use prometheus::Registry;
use tempfile::tempdir;

/// Backend that rejects every call.
struct BrokenStore;

#[async_trait]
impl KeyValueStore for BrokenStore {
    async fn get(&self, _key: &str) -> chapel_persistence::Result<Option<String>> {
        Err(PersistenceError::Unavailable("disk gone".into()))
    }

    async fn set(&self, _key: &str, _value: String) -> chapel_persistence::Result<()> {
        Err(PersistenceError::Unavailable("disk gone".into()))
    }

    async fn remove(&self, _key: &str) -> chapel_persistence::Result<()> {
        Err(PersistenceError::Unavailable("disk gone".into()))
    }

    async fn keys_with_prefix(&self, _prefix: &str) -> chapel_persistence::Result<Vec<String>> {
        Err(PersistenceError::Unavailable("disk gone".into()))
    }
}

#[tokio::test]
async fn login_lockout_scenario() {
    let clock = Arc::new(ManualClock::at_millis(1_700_000_000_000));
    let store = Arc::new(chapel_persistence::MemoryStore::new());
    let limiter = RateLimiter::new(store).with_clock(clock.clone());
    let policy = RateLimitPolicy::new(5, Duration::from_millis(900_000), Duration::from_millis(900_000));

    for _ in 0..5 {
        clock.advance(Duration::from_millis(10));
        limiter.record("login:test@x.com", &policy).await;
    }
    let t0 = clock.now();

    let decision = limiter.check("login:test@x.com", &policy).await;
    assert!(!decision.allowed);
    assert_eq!(
        decision.retry_after.unwrap().timestamp_millis(),
        t0.timestamp_millis() + 900_000
    );
    assert!(decision.retry_after.unwrap() >= clock.now());

    limiter.reset("login:test@x.com").await;
    let after_reset = limiter.check("login:test@x.com", &policy).await;
    assert!(after_reset.allowed);
    assert_eq!(after_reset.remaining_attempts, Some(4));
}

#[tokio::test]
async fn block_survives_process_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("rate_limits.json");
    let clock = Arc::new(ManualClock::at_millis(1_700_000_000_000));

    {
        let limiter = RateLimiter::new(Arc::new(FileStore::open(&path))).with_clock(clock.clone());
        for _ in 0..3 {
            limiter
                .record_operation(SensitiveOperation::Signup, "new@x.com")
                .await;
        }
        let decision = limiter
            .check_operation(SensitiveOperation::Signup, "new@x.com")
            .await;
        assert!(!decision.allowed);
    }

    clock.advance(Duration::from_secs(10 * 60));
    let reopened = RateLimiter::new(Arc::new(FileStore::open(&path))).with_clock(clock.clone());
    let decision = reopened
        .check_operation(SensitiveOperation::Signup, "NEW@x.com")
        .await;
    assert!(!decision.allowed);
    assert_eq!(
        decision.retry_message(clock.now()).unwrap(),
        "Too many attempts. Please try again in 50 minutes."
    );
    assert_eq!(reopened.tracked_keys().await, vec!["signup:new@x.com"]);

    let raw = FileStore::open(&path)
        .get(&format!("{STORAGE_PREFIX}signup:new@x.com"))
        .await
        .unwrap()
        .unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["attempts"], 3);
    assert!(json["blockedUntil"].is_i64());
}

#[tokio::test]
async fn storage_failures_fail_open() {
    let registry = Arc::new(Registry::new());
    let metrics = RateLimitMetrics::new(registry).unwrap();
    let limiter = RateLimiter::new(Arc::new(BrokenStore)).with_metrics(metrics.clone());

    for _ in 0..10 {
        limiter
            .record_operation(SensitiveOperation::Login, "a@b.c")
            .await;
    }
    let decision = limiter
        .check_operation(SensitiveOperation::Login, "a@b.c")
        .await;
    assert!(decision.allowed);
    assert_eq!(decision.remaining_attempts, Some(4));
    assert!(limiter.tracked_keys().await.is_empty());
    assert!(metrics.storage_errors() >= 11);
}

#[tokio::test]
async fn configured_overrides_replace_builtin_policy() {
    let config: AppConfig = r#"
        [rate_limits.otp]
        max_attempts = 2
        window_ms = 60000
        block_duration_ms = 5000
    "#
    .parse()
    .unwrap();
    let limiter = RateLimiter::new(Arc::new(chapel_persistence::MemoryStore::new()))
        .with_config(&config);

    assert_eq!(limiter.policy_for(SensitiveOperation::Otp).max_attempts, 2);
    assert_eq!(
        limiter.policy_for(SensitiveOperation::Login),
        RateLimitPolicy::login()
    );

    let decision = limiter
        .check_operation(SensitiveOperation::Otp, "+15550100")
        .await;
    assert_eq!(decision.remaining_attempts, Some(1));
}
