//! ---
//! chapel_section: "01-core-functionality"
//! chapel_subsection: "module"
//! chapel_type: "source"
//! chapel_scope: "code"
//! chapel_description: "Shared primitives and utilities for the core runtime."
//! chapel_version: "v0.1.0"
//! chapel_owner: "platform"
//! ---
//! Core shared primitives for the chapel workspace.
//! This crate exposes configuration loading, tracing initialisation, and the
//! clock abstraction consumed by the access and rate-limit crates.

pub mod config;
pub mod logging;
pub mod time;

pub use config::{
    AppConfig, LoadedAppConfig, LoggingConfig, MetricsConfig, RateLimitPolicy, StorageConfig,
    RATE_LIMITED_OPERATIONS,
};
pub use logging::{init_tracing, LogFormat};
pub use time::{Clock, ManualClock, SystemClock};
