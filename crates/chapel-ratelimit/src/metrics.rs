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

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

/// Metrics published by the rate limiter.
#[derive(Clone)]
pub struct RateLimitMetrics {
    checks: IntCounterVec,
    blocks: IntCounterVec,
    storage_errors: IntCounter,
    registry: Arc<Registry>,
}

impl RateLimitMetrics {
    /// Register all rate-limit metrics with the provided registry.
    pub fn new(registry: Arc<Registry>) -> anyhow::Result<Self> {
        let checks = IntCounterVec::new(
            Opts::new(
                "chapel_rate_limit_checks_total",
                "Rate-limit checks evaluated, by operation",
            ),
            &["operation"],
        )?;
        registry.register(Box::new(checks.clone()))?;

        let blocks = IntCounterVec::new(
            Opts::new(
                "chapel_rate_limit_blocks_total",
                "Checks refused because the key is blocked, by operation",
            ),
            &["operation"],
        )?;
        registry.register(Box::new(blocks.clone()))?;

        let storage_errors = IntCounter::new(
            "chapel_rate_limit_storage_errors_total",
            "Rate-limit record reads or writes that failed",
        )?;
        registry.register(Box::new(storage_errors.clone()))?;

        Ok(Self {
            checks,
            blocks,
            storage_errors,
            registry,
        })
    }

    /// Registry the counters live in.
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    /// Record one evaluated check.
    pub fn record_check(&self, operation: &str, allowed: bool) {
        self.checks.with_label_values(&[operation]).inc();
        if !allowed {
            self.blocks.with_label_values(&[operation]).inc();
        }
    }

    /// Record a failed storage round trip.
    pub fn record_storage_error(&self) {
        self.storage_errors.inc();
    }

    /// Blocks counted for an operation.
    pub fn blocks(&self, operation: &str) -> u64 {
        self.blocks.with_label_values(&[operation]).get()
    }

    /// Storage failures counted so far.
    pub fn storage_errors(&self) -> u64 {
        self.storage_errors.get()
    }
}
