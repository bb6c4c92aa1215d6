//! ---
//! chapel_section: "06-security-access-control"
//! chapel_subsection: "module"
//! chapel_type: "source"
//! chapel_scope: "code"
//! chapel_description: "Role table, permission resolution, and identity collaborators."
//! chapel_version: "v0.1.0"
//! chapel_owner: "platform"
//! ---
#![warn(missing_docs)]
//! Who may do what: the static role table, the identity and profile
//! collaborators, and the session-scoped [`PermissionResolver`].

pub mod identity;
pub mod metrics;
pub mod rbac;
pub mod resolver;

pub use identity::{
    IdentityId, IdentitySource, InMemoryProfileStore, ProfileError, ProfileRecord, ProfileStore,
    SessionIdentity,
};
pub use metrics::AccessMetrics;
pub use rbac::{permissions_for, role_grants, Permission, Role, StoredRole};
pub use resolver::{CachedRole, PermissionResolver};
