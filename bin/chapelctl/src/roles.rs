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
use chapel_access::{
    AccessMetrics, InMemoryProfileStore, Permission, PermissionResolver, ProfileRecord, Role,
    SessionIdentity,
};
use clap::{Args, Subcommand};
use prometheus::Registry;
use strum::IntoEnumIterator;

const CLI_IDENTITY: &str = "chapelctl";

#[derive(Debug, Subcommand)]
pub enum RolesCommand {
    /// List every role with its permissions.
    List,
    /// Show the permissions of one role.
    Show {
        /// Role identifier (e.g. `sundaySchoolHead`).
        role: String,
    },
}

#[derive(Debug, Args)]
pub struct CheckCommand {
    /// Role value as stored on a profile; unknown values evaluate as `member`.
    #[arg(long)]
    role: String,
    /// Require every permission instead of any one of them.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    all: bool,
    /// Permission identifiers (e.g. `manage_members`).
    #[arg(required = true, num_args = 1..)]
    permissions: Vec<String>,
}

pub fn run_roles(command: RolesCommand) -> Result<()> {
    match command {
        RolesCommand::List => {
            for role in Role::iter() {
                print_role(role);
            }
        }
        RolesCommand::Show { role } => {
            let parsed = role
                .parse::<Role>()
                .map_err(|_| anyhow!("unknown role '{}'", role))?;
            print_role(parsed);
        }
    }
    Ok(())
}

fn print_role(role: Role) {
    let permissions: Vec<&str> = role.permissions().iter().map(|p| p.as_ref()).collect();
    println!(
        "{} ({}): {}",
        role,
        role.display_name(),
        if permissions.is_empty() {
            "-".to_owned()
        } else {
            permissions.join(", ")
        }
    );
}

/// Resolve the stored role through a throwaway session and evaluate the query.
pub async fn run_check(command: CheckCommand, registry: Option<Arc<Registry>>) -> Result<()> {
    let permissions = command
        .permissions
        .iter()
        .map(|raw| {
            raw.parse::<Permission>()
                .map_err(|_| anyhow!("unknown permission '{}'", raw))
        })
        .collect::<Result<Vec<_>>>()?;

    let profiles = InMemoryProfileStore::new();
    profiles.upsert(
        CLI_IDENTITY,
        ProfileRecord {
            role: Some(Role::parse_stored(&command.role)),
            ..ProfileRecord::default()
        },
    );
    let mut resolver = PermissionResolver::new(
        Arc::new(SessionIdentity::signed_in(CLI_IDENTITY)),
        Arc::new(profiles),
    );
    if let Some(registry) = registry {
        resolver = resolver.with_metrics(AccessMetrics::new(registry)?);
    }

    let role = resolver.get_role().await;
    let granted = match permissions.as_slice() {
        [single] => resolver.has_permission(*single).await,
        many if command.all => resolver.has_all_permissions(many).await,
        many => resolver.has_any_permission(many).await,
    };
    println!(
        "role={} result={}",
        role,
        if granted { "granted" } else { "denied" }
    );
    Ok(())
}
