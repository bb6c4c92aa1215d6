//! ---
//! chapel_section: "06-security-access-control"
//! chapel_subsection: "module"
//! chapel_type: "source"
//! chapel_scope: "code"
//! chapel_description: "Role table, permission resolution, and identity collaborators."
//! chapel_version: "v0.1.0"
//! chapel_owner: "platform"
//! ---
use prometheus::{IntCounter, Registry};
use std::sync::Arc;

/// Access-control metrics exported via Prometheus.
#[derive(Clone)]
pub struct AccessMetrics {
    registry: Arc<Registry>,
    permission_checks_total: IntCounter,
    permission_denials_total: IntCounter,
    role_fetch_failures_total: IntCounter,
    role_cache_hits_total: IntCounter,
}

impl AccessMetrics {
    /// Register metrics with the provided registry.
    pub fn new(registry: Arc<Registry>) -> anyhow::Result<Self> {
        let permission_checks_total = IntCounter::new(
            "chapel_permission_checks_total",
            "Permission queries evaluated",
        )?;
        let permission_denials_total = IntCounter::new(
            "chapel_permission_denials_total",
            "Permission queries that were refused",
        )?;
        let role_fetch_failures_total = IntCounter::new(
            "chapel_role_fetch_failures_total",
            "Profile lookups that failed and degraded to member",
        )?;
        let role_cache_hits_total = IntCounter::new(
            "chapel_role_cache_hits_total",
            "Role lookups answered from the session cache",
        )?;

        registry.register(Box::new(permission_checks_total.clone()))?;
        registry.register(Box::new(permission_denials_total.clone()))?;
        registry.register(Box::new(role_fetch_failures_total.clone()))?;
        registry.register(Box::new(role_cache_hits_total.clone()))?;

        Ok(Self {
            registry,
            permission_checks_total,
            permission_denials_total,
            role_fetch_failures_total,
            role_cache_hits_total,
        })
    }

    /// Access the underlying registry.
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Count one evaluated query and, when refused, one denial.
    pub fn observe_check(&self, granted: bool) {
        self.permission_checks_total.inc();
        if !granted {
            self.permission_denials_total.inc();
        }
    }

    /// Increment role fetch failures.
    pub fn inc_fetch_failure(&self) {
        self.role_fetch_failures_total.inc();
    }

    /// Increment cache hits.
    pub fn inc_cache_hit(&self) {
        self.role_cache_hits_total.inc();
    }

    /// Current denial count.
    pub fn denials(&self) -> u64 {
        self.permission_denials_total.get()
    }

    /// Current fetch failure count.
    pub fn fetch_failures(&self) -> u64 {
        self.role_fetch_failures_total.get()
    }
}
