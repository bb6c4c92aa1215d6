//! ---
//! chapel_section: "03-persistence-logging"
//! chapel_subsection: "module"
//! chapel_type: "source"
//! chapel_scope: "code"
//! chapel_description: "Persistence abstractions and storage bindings."
//! chapel_version: "v0.1.0"
//! chapel_owner: "platform"
//! ---
#![warn(missing_docs)]
//! String-keyed local storage used for state that must survive restarts.

use async_trait::async_trait;

/// Result alias used throughout the persistence crate.
pub type Result<T> = std::result::Result<T, PersistenceError>;

/// Error type for the persistence subsystem.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// Wrapper for IO errors encountered while reading/writing the store file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Wrapper for JSON (de)serialization issues.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    /// The backing store refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Get/set/remove by string key, durable for as long as the backend is.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: String) -> Result<()>;

    /// Delete `key`. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;

    /// List keys beginning with `prefix`, sorted.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;
