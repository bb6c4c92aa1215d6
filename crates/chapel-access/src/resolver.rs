//! ---
//! chapel_section: "06-security-access-control"
//! chapel_subsection: "module"
//! chapel_type: "source"
//! chapel_scope: "code"
//! chapel_description: "Role table, permission resolution, and identity collaborators."
//! chapel_version: "v0.1.0"
//! chapel_owner: "platform"
//! ---
use std::sync::Arc;

use chapel_logging::{chapel_debug, chapel_warn, log_access_event, AccessOutcome, LogContext};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::identity::{IdentityId, IdentitySource, ProfileStore};
use crate::metrics::AccessMetrics;
use crate::rbac::{Permission, Role, StoredRole};

/// Role resolved for one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedRole {
    /// Identity the role belongs to.
    pub identity: IdentityId,
    /// Resolved role.
    pub role: Role,
    /// When the profile was read.
    pub fetched_at: DateTime<Utc>,
}

/// Answers permission queries for whoever is signed in.
///
/// A resolver is meant to be created per signed-in session and passed to
/// the code that needs it. It holds at most one cached role; the entry is
/// ignored as soon as the current identity differs from the cached one, and
/// [`PermissionResolver::clear_cache`] drops it on sign-out.
///
/// None of the query methods fail: lookup errors and unrecognised role
/// values resolve to [`Role::Member`], which holds no permissions.
pub struct PermissionResolver {
    identity: Arc<dyn IdentitySource>,
    profiles: Arc<dyn ProfileStore>,
    cache: Mutex<Option<CachedRole>>,
    metrics: Option<AccessMetrics>,
}

impl PermissionResolver {
    /// Create a resolver with an empty cache.
    pub fn new(identity: Arc<dyn IdentitySource>, profiles: Arc<dyn ProfileStore>) -> Self {
        Self {
            identity,
            profiles,
            cache: Mutex::new(None),
            metrics: None,
        }
    }

    /// Attach Prometheus counters.
    pub fn with_metrics(mut self, metrics: AccessMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Role of the current identity, fetched at most once per identity.
    pub async fn get_role(&self) -> Role {
        let Some(identity) = self.identity.current_identity() else {
            self.clear_cache();
            return Role::Member;
        };

        if let Some(role) = self.cached_for(&identity) {
            if let Some(metrics) = &self.metrics {
                metrics.inc_cache_hit();
            }
            return role;
        }

        let role = self.fetch_role(&identity).await;

        // Skip caching if the identity changed while the lookup was in flight.
        if self.identity.current_identity().as_deref() == Some(identity.as_str()) {
            *self.cache.lock() = Some(CachedRole {
                identity,
                role,
                fetched_at: Utc::now(),
            });
        }
        role
    }

    /// Whether the current role holds `permission` (or `full_access`).
    pub async fn has_permission(&self, permission: Permission) -> bool {
        let role = self.get_role().await;
        let granted = role.grants(permission);
        self.observe(role, permission.as_ref(), granted);
        granted
    }

    /// Whether the current role holds any of `permissions`. False for `[]`
    /// unless the role has `full_access`.
    pub async fn has_any_permission(&self, permissions: &[Permission]) -> bool {
        let role = self.get_role().await;
        let granted = role.grants_any(permissions);
        self.observe(role, "any", granted);
        granted
    }

    /// Whether the current role holds all of `permissions`. True for `[]`.
    pub async fn has_all_permissions(&self, permissions: &[Permission]) -> bool {
        let role = self.get_role().await;
        let granted = role.grants_all(permissions);
        self.observe(role, "all", granted);
        granted
    }

    /// Permissions of the current role, in table order.
    pub async fn permissions(&self) -> Vec<Permission> {
        self.get_role().await.permissions().to_vec()
    }

    /// Drop the cached role. Call on sign-out and before switching identity.
    pub fn clear_cache(&self) {
        if self.cache.lock().take().is_some() {
            chapel_debug!("role cache cleared");
        }
    }

    /// Currently cached entry, if any.
    pub fn cached_role(&self) -> Option<CachedRole> {
        self.cache.lock().clone()
    }

    fn cached_for(&self, identity: &str) -> Option<Role> {
        self.cache
            .lock()
            .as_ref()
            .filter(|entry| entry.identity == identity)
            .map(|entry| entry.role)
    }

    async fn fetch_role(&self, identity: &str) -> Role {
        let ctx = LogContext::new().with_identity(identity);
        match self.profiles.fetch_profile(identity).await {
            Ok(Some(profile)) => {
                if let Some(StoredRole::Unknown(raw)) = &profile.role {
                    chapel_warn!(context = ctx, "unrecognised role '{}', treating as member", raw);
                }
                profile.effective_role()
            }
            Ok(None) => {
                chapel_debug!(context = ctx, "no profile record, treating as member");
                Role::Member
            }
            Err(err) => {
                chapel_warn!(context = ctx, "role lookup failed: {}", err);
                log_access_event(Some(&ctx), "role.fetch", AccessOutcome::Degraded);
                if let Some(metrics) = &self.metrics {
                    metrics.inc_fetch_failure();
                }
                Role::Member
            }
        }
    }

    fn observe(&self, role: Role, operation: &str, granted: bool) {
        if let Some(metrics) = &self.metrics {
            metrics.observe_check(granted);
        }
        let outcome = if granted {
            AccessOutcome::Granted
        } else {
            AccessOutcome::Denied
        };
        let ctx = LogContext::new()
            .with_role(role.as_ref())
            .with_operation(operation);
        log_access_event(Some(&ctx), "permission.check", outcome);
    }
}
