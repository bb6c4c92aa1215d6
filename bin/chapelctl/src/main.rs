//! ---
//! chapel_section: "05-networking-external-interfaces"
//! chapel_subsection: "binary"
//! chapel_type: "source"
//! chapel_scope: "code"
//! chapel_description: "Control CLI for administrators inspecting access state."
//! chapel_version: "v0.1.0"
//! chapel_owner: "platform"
//! ---
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chapel_common::{init_tracing, AppConfig};
use clap::{ArgAction, Parser, Subcommand};
use prometheus::{Registry, TextEncoder};

mod ratelimit;
mod roles;

const DEFAULT_CONFIG_CANDIDATES: &[&str] = &["chapel.toml", "configs/chapel.toml"];

#[derive(Debug, Parser)]
#[command(
    author,
    disable_version_flag = true,
    about = "chapel role and rate-limit administration utility",
    long_about = None
)]
struct Cli {
    #[arg(
        short = 'V',
        long = "version",
        action = ArgAction::SetTrue,
        help = "Print version information and exit"
    )]
    version: bool,
    /// Configuration file (defaults to CHAPEL_CONFIG, then ./chapel.toml).
    #[arg(long, short = 'c', value_name = "FILE", global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(subcommand, about = "Inspect the role table")]
    Roles(roles::RolesCommand),
    #[command(about = "Evaluate permissions for a stored role value")]
    Check(roles::CheckCommand),
    #[command(subcommand, name = "rate-limit", about = "Inspect or reset rate-limit records")]
    RateLimit(ratelimit::RateLimitCommand),
}

fn load_config(explicit: Option<PathBuf>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        return contents.parse();
    }
    Ok(AppConfig::load_with_source(DEFAULT_CONFIG_CANDIDATES)?.config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.version {
        println!("chapelctl {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }
    let Some(command) = cli.command else {
        anyhow::bail!("no command given; see --help");
    };

    let config = load_config(cli.config)?;
    let mut logging = config.logging.clone();
    logging.console_only = true;
    init_tracing("chapelctl", &logging)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let registry = config.metrics.enabled.then(|| Arc::new(Registry::new()));
    runtime.block_on(async {
        match command {
            Commands::Roles(cmd) => roles::run_roles(cmd),
            Commands::Check(cmd) => roles::run_check(cmd, registry.clone()).await,
            Commands::RateLimit(cmd) => ratelimit::run(cmd, &config, registry.clone()).await,
        }
    })?;

    if let Some(registry) = registry {
        dump_metrics(&registry)?;
    }
    Ok(())
}

/// Write the Prometheus text exposition to stderr so stdout stays parseable.
fn dump_metrics(registry: &Registry) -> Result<()> {
    let body = TextEncoder::new()
        .encode_to_string(&registry.gather())
        .context("failed to encode metrics")?;
    eprint!("{body}");
    Ok(())
}
