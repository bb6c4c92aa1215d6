//! ---
//! chapel_section: "03-persistence-logging"
//! chapel_subsection: "module"
//! chapel_type: "source"
//! chapel_scope: "code"
//! chapel_description: "Structured logging adapters and sinks."
//! chapel_version: "v0.1.0"
//! chapel_owner: "platform"
//! ---
#![warn(missing_docs)]
//! Structured logging helpers shared by the access and rate-limit crates.

use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

pub mod macros;

/// Initialize a baseline tracing subscriber suitable for development and tests.
pub fn init() {
    let _ = Registry::default()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(subscriber_fmt::layer().with_test_writer())
        .try_init();
}

/// Structured logging context propagated by the convenience macros.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogContext<'a> {
    /// Authenticated identity the event concerns.
    pub identity: Option<&'a str>,
    /// Resolved role identifier.
    pub role: Option<&'a str>,
    /// Sensitive operation or permission being evaluated.
    pub operation: Option<&'a str>,
    /// Rate-limit or storage key.
    pub key: Option<&'a str>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an identity.
    pub fn with_identity(mut self, identity: &'a str) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Attach a role identifier.
    pub fn with_role(mut self, role: &'a str) -> Self {
        self.role = Some(role);
        self
    }

    /// Attach an operation name.
    pub fn with_operation(mut self, operation: &'a str) -> Self {
        self.operation = Some(operation);
        self
    }

    /// Attach a storage key.
    pub fn with_key(mut self, key: &'a str) -> Self {
        self.key = Some(key);
        self
    }
}

/// Outcome attached to access-control log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessOutcome {
    /// The check or attempt was allowed.
    Granted,
    /// The check or attempt was refused.
    Denied,
    /// A collaborator failed and a safe default was applied.
    Degraded,
}

impl AccessOutcome {
    /// Stable lowercase label.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessOutcome::Granted => "granted",
            AccessOutcome::Denied => "denied",
            AccessOutcome::Degraded => "degraded",
        }
    }
}

/// Emit a standardized access event with an outcome label.
pub fn log_access_event(context: Option<&LogContext>, event: &str, outcome: AccessOutcome) {
    let ctx = context.copied().unwrap_or_default();
    let identity = ctx.identity.unwrap_or("");
    let role = ctx.role.unwrap_or("");
    let operation = ctx.operation.unwrap_or("");
    let key = ctx.key.unwrap_or("");
    let outcome_label = outcome.as_str();
    // `tracing` callsites need a const level, hence the match.
    match outcome {
        AccessOutcome::Granted => {
            tracing::debug!(event, outcome = outcome_label, identity, role, operation, key)
        }
        AccessOutcome::Denied => {
            tracing::info!(event, outcome = outcome_label, identity, role, operation, key)
        }
        AccessOutcome::Degraded => {
            tracing::warn!(event, outcome = outcome_label, identity, role, operation, key)
        }
    }
}
