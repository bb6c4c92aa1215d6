//! ---
//! chapel_section: "06-security-access-control"
//! chapel_subsection: "module"
//! chapel_type: "source"
//! chapel_scope: "code"
//! chapel_description: "Persisted rate limiting for sensitive operations."
//! chapel_version: "v0.1.0"
//! chapel_owner: "platform"
//! ---
use std::time::Duration;

use chapel_common::time::to_chrono;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Attempt history for one rate-limit key, stored as JSON with millisecond timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitRecord {
    /// Attempts recorded since `first_attempt_time`.
    pub attempts: u32,
    /// Start of the sliding window.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub first_attempt_time: DateTime<Utc>,
    /// Most recent recorded attempt.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_attempt_time: DateTime<Utc>,
    /// Set once the key exceeded its limit.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub blocked_until: Option<DateTime<Utc>>,
}

impl RateLimitRecord {
    /// Record for a first attempt at `now`.
    pub fn first(now: DateTime<Utc>) -> Self {
        Self {
            attempts: 1,
            first_attempt_time: now,
            last_attempt_time: now,
            blocked_until: None,
        }
    }

    /// Count another attempt.
    pub fn bump(&mut self, now: DateTime<Utc>) {
        self.attempts = self.attempts.saturating_add(1);
        self.last_attempt_time = now;
    }

    /// Strictly more than `window` has passed since the first attempt.
    pub fn window_expired(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now - self.first_attempt_time > to_chrono(window)
    }

    /// Active block, if `blocked_until` lies in the future.
    pub fn active_block(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.blocked_until.filter(|until| *until > now)
    }
}
