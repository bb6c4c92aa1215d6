//! ---
//! chapel_section: "06-security-access-control"
//! chapel_subsection: "module"
//! chapel_type: "source"
//! chapel_scope: "code"
//! chapel_description: "Persisted rate limiting for sensitive operations."
//! chapel_version: "v0.1.0"
//! chapel_owner: "platform"
//! ---
//! Throttling for login, signup, password reset and OTP attempts, keyed per
//! user and persisted so limits survive restarts.

pub mod limiter;
pub mod metrics;
pub mod operation;
pub mod record;

pub use chapel_common::RateLimitPolicy;
pub use limiter::{RateLimitDecision, RateLimiter, STORAGE_PREFIX};
pub use metrics::RateLimitMetrics;
pub use operation::SensitiveOperation;
pub use record::RateLimitRecord;
