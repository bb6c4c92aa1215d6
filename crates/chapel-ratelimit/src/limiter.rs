//! ---
//! chapel_section: "06-security-access-control"
//! chapel_subsection: "module"
//! chapel_type: "source"
//! chapel_scope: "code"
//! chapel_description: "Persisted rate limiting for sensitive operations."
//! chapel_version: "v0.1.0"
//! chapel_owner: "platform"
//! ---
use std::sync::Arc;

use chapel_common::time::to_chrono;
use chapel_common::{AppConfig, Clock, RateLimitPolicy, SystemClock};
use chapel_logging::{chapel_debug, chapel_warn, log_access_event, AccessOutcome, LogContext};
use chapel_persistence::KeyValueStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::metrics::RateLimitMetrics;
use crate::operation::SensitiveOperation;
use crate::record::RateLimitRecord;

/// Prefix under which records are stored in the key-value backend.
pub const STORAGE_PREFIX: &str = "rate_limit:";

/// Outcome of [`RateLimiter::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    /// Whether the caller may attempt the operation now.
    pub allowed: bool,
    /// When a blocked key becomes usable again.
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub retry_after: Option<DateTime<Utc>>,
    /// Attempts left after the one about to be made.
    #[serde(default)]
    pub remaining_attempts: Option<u32>,
}

impl RateLimitDecision {
    fn allow(remaining: u32) -> Self {
        Self {
            allowed: true,
            retry_after: None,
            remaining_attempts: Some(remaining),
        }
    }

    fn deny(retry_after: DateTime<Utc>) -> Self {
        Self {
            allowed: false,
            retry_after: Some(retry_after),
            remaining_attempts: None,
        }
    }

    /// User-facing message for a refused decision, rounded up to whole minutes.
    pub fn retry_message(&self, now: DateTime<Utc>) -> Option<String> {
        let retry_after = self.retry_after.filter(|_| !self.allowed)?;
        let millis = (retry_after - now).num_milliseconds().max(0);
        let minutes = ((millis + 59_999) / 60_000).max(1);
        let unit = if minutes == 1 { "minute" } else { "minutes" };
        Some(format!(
            "Too many attempts. Please try again in {minutes} {unit}."
        ))
    }
}

/// Sliding-window attempt limiter persisted through a [`KeyValueStore`].
///
/// `check` never counts an attempt; callers follow an allowed check with
/// `record`, and call `reset` once the sensitive action succeeds. The two
/// calls are separate storage round trips, so concurrent attempts on the
/// same key may both pass `check` before either is recorded.
///
/// Storage failures never surface: unreadable records count as absent and
/// failed writes are logged and dropped.
pub struct RateLimiter {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    config: AppConfig,
    metrics: Option<RateLimitMetrics>,
}

impl RateLimiter {
    /// Limiter on the system clock with built-in policies.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            config: AppConfig::default(),
            metrics: None,
        }
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Apply `[rate_limits]` overrides from configuration.
    pub fn with_config(mut self, config: &AppConfig) -> Self {
        self.config = config.clone();
        self
    }

    /// Attach Prometheus counters.
    pub fn with_metrics(mut self, metrics: RateLimitMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Effective policy for an operation, honouring configuration overrides.
    pub fn policy_for(&self, operation: SensitiveOperation) -> RateLimitPolicy {
        self.config
            .rate_limit_override(operation.as_ref())
            .copied()
            .unwrap_or_else(|| operation.default_policy())
    }

    /// Decide whether another attempt is allowed for `key` right now.
    ///
    /// Persists a new block when the limit is reached and drops records
    /// whose window has expired.
    pub async fn check(&self, key: &str, policy: &RateLimitPolicy) -> RateLimitDecision {
        let record = self.load(key).await;
        let (decision, change) = evaluate(record, self.clock.now(), policy);
        match change {
            StoredChange::Keep => {}
            StoredChange::Drop => self.delete(key).await,
            StoredChange::Block(blocked) => self.save(key, &blocked).await,
        }
        self.observe(key, &decision);
        decision
    }

    /// Decision `check` would return, without writing to storage or
    /// counting a check.
    pub async fn preview(&self, key: &str, policy: &RateLimitPolicy) -> RateLimitDecision {
        let record = self.load(key).await;
        evaluate(record, self.clock.now(), policy).0
    }

    /// Count one attempt against `key`, creating the record on first use.
    ///
    /// A record whose window under `policy` has expired is replaced by a
    /// fresh one, so attempts made without a preceding `check` still count.
    pub async fn record(&self, key: &str, policy: &RateLimitPolicy) {
        let now = self.clock.now();
        let record = match self.load(key).await {
            Some(record) if record.window_expired(now, policy.window) => {
                RateLimitRecord::first(now)
            }
            Some(mut record) => {
                record.bump(now);
                record
            }
            None => RateLimitRecord::first(now),
        };
        chapel_debug!(
            context = LogContext::new().with_key(key),
            "attempt {} recorded",
            record.attempts
        );
        self.save(key, &record).await;
    }

    /// Forget all attempts for `key`.
    pub async fn reset(&self, key: &str) {
        self.delete(key).await;
    }

    /// Stored record for `key`, if readable.
    pub async fn status(&self, key: &str) -> Option<RateLimitRecord> {
        self.load(key).await
    }

    /// Keys that currently have a stored record.
    pub async fn tracked_keys(&self) -> Vec<String> {
        match self.store.keys_with_prefix(STORAGE_PREFIX).await {
            Ok(keys) => keys
                .into_iter()
                .filter_map(|key| key.strip_prefix(STORAGE_PREFIX).map(str::to_owned))
                .collect(),
            Err(err) => {
                self.storage_failure(STORAGE_PREFIX, "list", &err);
                Vec::new()
            }
        }
    }

    /// [`RateLimiter::check`] with the operation's key and effective policy.
    pub async fn check_operation(
        &self,
        operation: SensitiveOperation,
        discriminator: &str,
    ) -> RateLimitDecision {
        let policy = self.policy_for(operation);
        self.check(&operation.key(discriminator), &policy).await
    }

    /// [`RateLimiter::record`] for an operation key.
    pub async fn record_operation(&self, operation: SensitiveOperation, discriminator: &str) {
        let policy = self.policy_for(operation);
        self.record(&operation.key(discriminator), &policy).await;
    }

    /// [`RateLimiter::reset`] for an operation key.
    pub async fn reset_operation(&self, operation: SensitiveOperation, discriminator: &str) {
        self.reset(&operation.key(discriminator)).await;
    }

    async fn load(&self, key: &str) -> Option<RateLimitRecord> {
        let raw = match self.store.get(&storage_key(key)).await {
            Ok(raw) => raw?,
            Err(err) => {
                self.storage_failure(key, "read", &err);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(record) => Some(record),
            Err(err) => {
                self.storage_failure(key, "decode", &err);
                None
            }
        }
    }

    async fn save(&self, key: &str, record: &RateLimitRecord) {
        let raw = match serde_json::to_string(record) {
            Ok(raw) => raw,
            Err(err) => {
                self.storage_failure(key, "encode", &err);
                return;
            }
        };
        if let Err(err) = self.store.set(&storage_key(key), raw).await {
            self.storage_failure(key, "write", &err);
        }
    }

    async fn delete(&self, key: &str) {
        if let Err(err) = self.store.remove(&storage_key(key)).await {
            self.storage_failure(key, "remove", &err);
        }
    }

    fn storage_failure(&self, key: &str, action: &str, err: &dyn std::error::Error) {
        chapel_warn!(
            context = LogContext::new().with_key(key),
            "rate-limit {} failed: {}",
            action,
            err
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_storage_error();
        }
    }

    fn observe(&self, key: &str, decision: &RateLimitDecision) {
        let operation = operation_label(key);
        if let Some(metrics) = &self.metrics {
            metrics.record_check(operation, decision.allowed);
        }
        if !decision.allowed {
            let ctx = LogContext::new().with_operation(operation).with_key(key);
            log_access_event(Some(&ctx), "rate_limit.check", AccessOutcome::Denied);
        }
    }
}

/// Storage side effect of a check.
#[derive(Debug, PartialEq, Eq)]
enum StoredChange {
    Keep,
    Drop,
    Block(RateLimitRecord),
}

fn evaluate(
    record: Option<RateLimitRecord>,
    now: DateTime<Utc>,
    policy: &RateLimitPolicy,
) -> (RateLimitDecision, StoredChange) {
    let fresh = RateLimitDecision::allow(policy.max_attempts.saturating_sub(1));
    let Some(record) = record else {
        return (fresh, StoredChange::Keep);
    };

    if let Some(until) = record.active_block(now) {
        (RateLimitDecision::deny(until), StoredChange::Keep)
    } else if record.window_expired(now, policy.window) {
        (fresh, StoredChange::Drop)
    } else if record.attempts >= policy.max_attempts {
        let until = now
            .checked_add_signed(to_chrono(policy.block_duration))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let blocked = RateLimitRecord {
            blocked_until: Some(until),
            ..record
        };
        (RateLimitDecision::deny(until), StoredChange::Block(blocked))
    } else {
        let remaining = policy
            .max_attempts
            .saturating_sub(record.attempts.saturating_add(1));
        (RateLimitDecision::allow(remaining), StoredChange::Keep)
    }
}

fn storage_key(key: &str) -> String {
    format!("{STORAGE_PREFIX}{key}")
}

fn operation_label(key: &str) -> &str {
    key.split_once(':').map_or(key, |(operation, _)| operation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chapel_common::ManualClock;
    use chapel_persistence::MemoryStore;
    use std::time::Duration;

    fn limiter() -> (RateLimiter, Arc<ManualClock>, MemoryStore) {
        let clock = Arc::new(ManualClock::at_millis(1_700_000_000_000));
        let store = MemoryStore::new();
        let limiter = RateLimiter::new(Arc::new(store.clone())).with_clock(clock.clone());
        (limiter, clock, store)
    }

    #[tokio::test]
    async fn unknown_key_is_allowed_with_full_budget() {
        let (limiter, _, _) = limiter();
        let decision = limiter.check("login:a@b.c", &RateLimitPolicy::login()).await;
        assert_eq!(decision, RateLimitDecision::allow(4));
    }

    #[tokio::test]
    async fn check_does_not_consume_attempts() {
        let (limiter, _, store) = limiter();
        let policy = RateLimitPolicy::login();
        for _ in 0..10 {
            assert!(limiter.check("login:a@b.c", &policy).await.allowed);
        }
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn remaining_attempts_count_down() {
        let (limiter, _, _) = limiter();
        let policy = RateLimitPolicy::signup();
        limiter.record("signup:a@b.c", &policy).await;
        let decision = limiter.check("signup:a@b.c", &policy).await;
        assert_eq!(decision.remaining_attempts, Some(1));
        limiter.record("signup:a@b.c", &policy).await;
        let decision = limiter.check("signup:a@b.c", &policy).await;
        assert_eq!(decision.remaining_attempts, Some(0));
        assert!(decision.allowed);
    }

    #[tokio::test]
    async fn exceeding_limit_blocks_and_persists() {
        let (limiter, clock, _) = limiter();
        let policy = RateLimitPolicy::login();
        for _ in 0..5 {
            limiter.record("login:a@b.c", &policy).await;
        }
        let t0 = clock.now();
        let decision = limiter.check("login:a@b.c", &policy).await;
        assert!(!decision.allowed);
        assert_eq!(
            decision.retry_after,
            Some(t0 + chrono::Duration::milliseconds(900_000))
        );

        clock.advance(Duration::from_secs(60));
        let again = limiter.check("login:a@b.c", &policy).await;
        assert_eq!(again.retry_after, decision.retry_after);
        let stored = limiter.status("login:a@b.c").await.unwrap();
        assert_eq!(stored.blocked_until, decision.retry_after);
    }

    #[tokio::test]
    async fn elapsed_window_resets_the_key() {
        let (limiter, clock, store) = limiter();
        let policy = RateLimitPolicy::login();
        limiter.record("login:a@b.c", &policy).await;
        clock.advance(policy.window + Duration::from_millis(1));
        let decision = limiter.check("login:a@b.c", &policy).await;
        assert_eq!(decision, RateLimitDecision::allow(4));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn elapsed_block_inside_window_blocks_again() {
        let (limiter, clock, _) = limiter();
        let policy = RateLimitPolicy::new(2, Duration::from_secs(60), Duration::from_secs(30));
        limiter.record("otp:a", &policy).await;
        limiter.record("otp:a", &policy).await;
        assert!(!limiter.check("otp:a", &policy).await.allowed);

        clock.advance(Duration::from_secs(30));
        let reblocked = limiter.check("otp:a", &policy).await;
        let expected = clock.now() + chrono::Duration::seconds(30);
        assert_eq!(reblocked, RateLimitDecision::deny(expected));
        assert_eq!(
            limiter.status("otp:a").await.unwrap().blocked_until,
            Some(expected)
        );

        clock.advance(Duration::from_secs(10));
        assert_eq!(limiter.check("otp:a", &policy).await.retry_after, Some(expected));
    }

    #[tokio::test]
    async fn block_outliving_window_clears_once_it_ends() {
        let (limiter, clock, store) = limiter();
        let policy = RateLimitPolicy::new(2, Duration::from_secs(60), Duration::from_secs(30));
        limiter.record("otp:a", &policy).await;
        limiter.record("otp:a", &policy).await;
        clock.advance(Duration::from_secs(50));
        assert!(!limiter.check("otp:a", &policy).await.allowed);

        clock.advance(Duration::from_secs(30));
        assert_eq!(
            limiter.check("otp:a", &policy).await,
            RateLimitDecision::allow(1)
        );
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn preview_leaves_storage_untouched() {
        let (limiter, clock, _) = limiter();
        let policy = RateLimitPolicy::signup();
        for _ in 0..3 {
            limiter.record("signup:a@b.c", &policy).await;
        }
        let preview = limiter.preview("signup:a@b.c", &policy).await;
        assert_eq!(
            preview,
            RateLimitDecision::deny(clock.now() + chrono::Duration::hours(1))
        );
        assert!(limiter
            .status("signup:a@b.c")
            .await
            .unwrap()
            .blocked_until
            .is_none());
    }

    #[tokio::test]
    async fn record_after_expired_window_starts_fresh() {
        let (limiter, clock, _) = limiter();
        let policy = RateLimitPolicy::login();
        limiter.record("login:a@b.c", &policy).await;
        clock.advance(policy.window + Duration::from_secs(1));
        for _ in 0..4 {
            limiter.record("login:a@b.c", &policy).await;
        }

        let stored = limiter.status("login:a@b.c").await.unwrap();
        assert_eq!(stored.attempts, 4);
        assert_eq!(stored.first_attempt_time, clock.now());
        assert_eq!(
            limiter.check("login:a@b.c", &policy).await,
            RateLimitDecision::allow(0)
        );
    }

    #[tokio::test]
    async fn reset_clears_history() {
        let (limiter, _, _) = limiter();
        let policy = RateLimitPolicy::login();
        for _ in 0..5 {
            limiter.record("login:a@b.c", &policy).await;
        }
        limiter.reset("login:a@b.c").await;
        assert_eq!(
            limiter.check("login:a@b.c", &policy).await,
            RateLimitDecision::allow(4)
        );
    }

    #[tokio::test]
    async fn undecodable_record_counts_as_absent() {
        let (limiter, _, store) = limiter();
        store
            .set("rate_limit:login:a@b.c", "garbage".into())
            .await
            .unwrap();
        let policy = RateLimitPolicy::login();
        assert!(limiter.check("login:a@b.c", &policy).await.allowed);
        limiter.record("login:a@b.c", &policy).await;
        assert_eq!(limiter.status("login:a@b.c").await.unwrap().attempts, 1);
    }

    #[test]
    fn retry_message_rounds_up_minutes() {
        let now = Utc::now();
        let denied = RateLimitDecision::deny(now + chrono::Duration::seconds(61));
        assert_eq!(
            denied.retry_message(now).unwrap(),
            "Too many attempts. Please try again in 2 minutes."
        );
        let soon = RateLimitDecision::deny(now + chrono::Duration::seconds(5));
        assert_eq!(
            soon.retry_message(now).unwrap(),
            "Too many attempts. Please try again in 1 minute."
        );
        assert!(RateLimitDecision::allow(3).retry_message(now).is_none());
    }

    #[test]
    fn operation_label_uses_key_prefix() {
        assert_eq!(operation_label("login:a@b.c"), "login");
        assert_eq!(operation_label("bare"), "bare");
    }
}
