//! ---
//! chapel_section: "06-security-access-control"
//! chapel_subsection: "module"
//! chapel_type: "source"
//! chapel_scope: "code"
//! chapel_description: "Role table, permission resolution, and identity collaborators."
//! chapel_version: "v0.1.0"
//! chapel_owner: "platform"
//! ---
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rbac::{Role, StoredRole};

/// Identifier of an authenticated user.
pub type IdentityId = String;

/// Reports who is currently signed in.
pub trait IdentitySource: Send + Sync {
    /// Current authenticated identity, if any.
    fn current_identity(&self) -> Option<IdentityId>;
}

/// User profile document as held by the document store.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRecord {
    /// Role attribute, validated at deserialization.
    #[serde(default)]
    pub role: Option<StoredRole>,
    /// Name shown in the directory.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Contact email.
    #[serde(default)]
    pub email: Option<String>,
}

impl ProfileRecord {
    /// Profile carrying only a role.
    pub fn with_role(role: Role) -> Self {
        Self {
            role: Some(StoredRole::Known(role)),
            ..Self::default()
        }
    }

    /// Role to evaluate checks against; absent or unknown means `Member`.
    pub fn effective_role(&self) -> Role {
        self.role
            .as_ref()
            .map(StoredRole::effective)
            .unwrap_or_default()
    }
}

/// Errors surfaced by profile lookups.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// The document store could not be reached.
    #[error("profile store unavailable: {0}")]
    Unavailable(String),
}

/// Point lookups of profile records by identity.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Fetch the profile for `id`; `Ok(None)` when no record exists.
    async fn fetch_profile(&self, id: &str) -> Result<Option<ProfileRecord>, ProfileError>;
}

/// Signed-in state held in process, for tools and tests.
#[derive(Debug, Default, Clone)]
pub struct SessionIdentity {
    current: Arc<RwLock<Option<IdentityId>>>,
}

impl SessionIdentity {
    /// Start signed out.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start signed in as `id`.
    pub fn signed_in(id: impl Into<IdentityId>) -> Self {
        let session = Self::new();
        session.sign_in(id);
        session
    }

    /// Switch the current identity.
    pub fn sign_in(&self, id: impl Into<IdentityId>) {
        *self.current.write() = Some(id.into());
    }

    /// Clear the current identity.
    pub fn sign_out(&self) {
        *self.current.write() = None;
    }
}

impl IdentitySource for SessionIdentity {
    fn current_identity(&self) -> Option<IdentityId> {
        self.current.read().clone()
    }
}

/// In-memory profile store suitable for development/testing.
#[derive(Debug, Default, Clone)]
pub struct InMemoryProfileStore {
    profiles: Arc<RwLock<HashMap<IdentityId, ProfileRecord>>>,
}

impl InMemoryProfileStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a profile.
    pub fn upsert(&self, id: impl Into<IdentityId>, record: ProfileRecord) {
        self.profiles.write().insert(id.into(), record);
    }

    /// Delete a profile.
    pub fn remove(&self, id: &str) -> bool {
        self.profiles.write().remove(id).is_some()
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn fetch_profile(&self, id: &str) -> Result<Option<ProfileRecord>, ProfileError> {
        Ok(self.profiles.read().get(id).cloned())
    }
}
