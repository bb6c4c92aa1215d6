//! ---
//! chapel_section: "01-core-functionality"
//! chapel_subsection: "module"
//! chapel_type: "source"
//! chapel_scope: "code"
//! chapel_description: "Shared primitives and utilities for the core runtime."
//! chapel_version: "v0.1.0"
//! chapel_owner: "platform"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use tracing::debug;

use crate::logging::LogFormat;

/// Operation names accepted in the `[rate_limits]` table.
pub const RATE_LIMITED_OPERATIONS: &[&str] = &["login", "signup", "forgot_password", "otp"];

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

fn default_rate_limit_path() -> PathBuf {
    PathBuf::from("target/state/rate_limits.json")
}

fn default_metrics_enabled() -> bool {
    true
}

/// Primary configuration object for chapel services and tooling.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// Per-operation overrides of the built-in rate-limit policies.
    #[serde(default)]
    pub rate_limits: IndexMap<String, RateLimitPolicy>,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: Option<PathBuf>,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "CHAPEL_CONFIG";

    /// Load configuration together with the effective source path.
    ///
    /// Falls back to [`AppConfig::default`] (with `source: None`) when neither the
    /// environment override nor any candidate exists.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        Ok(LoadedAppConfig {
            config: Self::default(),
            source: None,
        })
    }

    fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        contents
            .parse::<AppConfig>()
            .with_context(|| format!("failed to load config file {}", path.display()))
    }

    /// Look up a rate-limit override by operation name.
    pub fn rate_limit_override(&self, operation: &str) -> Option<&RateLimitPolicy> {
        self.rate_limits.get(operation)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        for (operation, policy) in &self.rate_limits {
            if !RATE_LIMITED_OPERATIONS.contains(&operation.as_str()) {
                return Err(anyhow!(
                    "unknown rate-limited operation '{}' (expected one of: {})",
                    operation,
                    RATE_LIMITED_OPERATIONS.join(", ")
                ));
            }
            policy
                .validate()
                .with_context(|| format!("invalid rate limit for '{}'", operation))?;
        }
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Throttling policy for one sensitive operation.
#[serde_as]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Attempts permitted inside one window before the key is blocked.
    pub max_attempts: u32,
    /// Sliding window measured from the first recorded attempt.
    #[serde(rename = "window_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub window: Duration,
    /// How long a key stays blocked once the limit is hit.
    #[serde(rename = "block_duration_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub block_duration: Duration,
}

impl RateLimitPolicy {
    pub const fn new(max_attempts: u32, window: Duration, block_duration: Duration) -> Self {
        Self {
            max_attempts,
            window,
            block_duration,
        }
    }

    /// 5 attempts per 15 minutes, 15 minute block.
    pub const fn login() -> Self {
        Self::new(5, Duration::from_secs(15 * 60), Duration::from_secs(15 * 60))
    }

    /// 3 attempts per hour, 1 hour block.
    pub const fn signup() -> Self {
        Self::new(3, Duration::from_secs(60 * 60), Duration::from_secs(60 * 60))
    }

    /// 3 attempts per hour, 1 hour block.
    pub const fn forgot_password() -> Self {
        Self::new(3, Duration::from_secs(60 * 60), Duration::from_secs(60 * 60))
    }

    /// 5 attempts per 30 minutes, 30 minute block.
    pub const fn otp() -> Self {
        Self::new(5, Duration::from_secs(30 * 60), Duration::from_secs(30 * 60))
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(anyhow!("max_attempts must be at least 1"));
        }
        if self.window.is_zero() {
            return Err(anyhow!("window_ms must be greater than zero"));
        }
        if self.block_duration.is_zero() {
            return Err(anyhow!("block_duration_ms must be greater than zero"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
    /// Skip the rolling file sink (useful for CLI invocations).
    #[serde(default)]
    pub console_only: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
            console_only: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// JSON document holding persisted rate-limit records.
    #[serde(default = "default_rate_limit_path")]
    pub rate_limit_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            rate_limit_path: default_rate_limit_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}
