//! ---
//! chapel_section: "06-security-access-control"
//! chapel_subsection: "module"
//! chapel_type: "source"
//! chapel_scope: "code"
//! chapel_description: "Persisted rate limiting for sensitive operations."
//! chapel_version: "v0.1.0"
//! chapel_owner: "platform"
//! ---
use chapel_common::RateLimitPolicy;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Authentication-related actions that are throttled per user.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SensitiveOperation {
    Login,
    Signup,
    ForgotPassword,
    Otp,
}

impl SensitiveOperation {
    /// Built-in limits for this operation.
    pub fn default_policy(&self) -> RateLimitPolicy {
        match self {
            SensitiveOperation::Login => RateLimitPolicy::login(),
            SensitiveOperation::Signup => RateLimitPolicy::signup(),
            SensitiveOperation::ForgotPassword => RateLimitPolicy::forgot_password(),
            SensitiveOperation::Otp => RateLimitPolicy::otp(),
        }
    }

    /// Rate-limit key, e.g. `login:someone@example.com`.
    ///
    /// The discriminator is trimmed and lower-cased so that `Ann@X.com ` and
    /// `ann@x.com` share a counter.
    pub fn key(&self, discriminator: &str) -> String {
        format!(
            "{}:{}",
            self.as_ref(),
            discriminator.trim().to_lowercase()
        )
    }
}
