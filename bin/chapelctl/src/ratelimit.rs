//! ---
//! chapel_section: "05-networking-external-interfaces"
//! chapel_subsection: "binary"
//! chapel_type: "source"
//! chapel_scope: "code"
//! chapel_description: "Control CLI for administrators inspecting access state."
//! chapel_version: "v0.1.0"
//! chapel_owner: "platform"
//! ---
use std::sync::Arc;

use anyhow::{anyhow, Result};
use chapel_common::AppConfig;
use chapel_persistence::FileStore;
use chapel_ratelimit::{RateLimitMetrics, RateLimiter, SensitiveOperation};
use chrono::Utc;
use clap::{Args, Subcommand};
use prometheus::Registry;

#[derive(Debug, Subcommand)]
pub enum RateLimitCommand {
    /// Show the stored record and the decision a check would return, without
    /// modifying the record.
    Status(KeyArgs),
    /// Count one attempt against a key.
    Record(KeyArgs),
    /// Delete the record for a key.
    Reset(KeyArgs),
    /// List keys with stored records.
    List,
}

#[derive(Debug, Args)]
pub struct KeyArgs {
    /// Operation: login, signup, forgot_password or otp.
    operation: String,
    /// Per-user discriminator, usually an email address.
    discriminator: String,
}

impl KeyArgs {
    fn operation(&self) -> Result<SensitiveOperation> {
        self.operation
            .parse()
            .map_err(|_| anyhow!("unknown operation '{}'", self.operation))
    }
}

pub async fn run(
    command: RateLimitCommand,
    config: &AppConfig,
    registry: Option<Arc<Registry>>,
) -> Result<()> {
    let store = FileStore::open(&config.storage.rate_limit_path);
    let mut limiter = RateLimiter::new(Arc::new(store)).with_config(config);
    if let Some(registry) = registry {
        limiter = limiter.with_metrics(RateLimitMetrics::new(registry)?);
    }

    match command {
        RateLimitCommand::Status(args) => {
            let operation = args.operation()?;
            let key = operation.key(&args.discriminator);
            let record = limiter.status(&key).await;
            let decision = limiter
                .preview(&key, &limiter.policy_for(operation))
                .await;
            let report = serde_json::json!({
                "key": key,
                "record": record,
                "decision": decision,
                "message": decision.retry_message(Utc::now()),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        RateLimitCommand::Record(args) => {
            let operation = args.operation()?;
            limiter.record_operation(operation, &args.discriminator).await;
            let key = operation.key(&args.discriminator);
            let attempts = limiter
                .status(&key)
                .await
                .map(|record| record.attempts)
                .unwrap_or_default();
            println!("{key}: {attempts} attempt(s)");
        }
        RateLimitCommand::Reset(args) => {
            let operation = args.operation()?;
            limiter.reset_operation(operation, &args.discriminator).await;
            println!("{}: reset", operation.key(&args.discriminator));
        }
        RateLimitCommand::List => {
            for key in limiter.tracked_keys().await {
                println!("{key}");
            }
        }
    }
    Ok(())
}
