//! Administration: users, role permissions, runtime configuration, backend
//! services and the audit trail.

use std::collections::BTreeSet;

use kyc_console::{
    Permission,
    model::{ManagedService, NewUser, ServiceAction, ServiceState, User, UserAudit},
    services::admin::RolePermissions,
};
use tracing::instrument;

use super::{
    Context,
    changes::format_timestamp,
    terminal::{self, Colorize, Table, or_dash},
};

/// Users, permissions, services and audit logs
#[derive(Debug, clap::Parser)]
pub struct Admin {
    #[command(subcommand)]
    command: AdminCommand,
}

#[derive(Debug, clap::Subcommand)]
enum AdminCommand {
    /// Manage console users
    #[command(subcommand)]
    Users(UsersCommand),

    /// Manage the permissions granted to each role
    #[command(subcommand)]
    Permissions(PermissionsCommand),

    /// Show the backend's runtime configuration
    Config,

    /// Show the state of backend services
    Services,

    /// Start, stop or restart a backend service
    Service {
        /// What to do
        #[arg(value_enum)]
        action: ServiceAction,

        /// Service key as listed by `admin services`
        key: String,
    },

    /// Show the user audit trail, newest first
    Audits {
        /// Only entries of this user
        #[arg(long)]
        user: Option<String>,

        /// Only entries whose action contains this text
        #[arg(long)]
        action: Option<String>,

        /// Show at most this many entries
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
}

#[derive(Debug, clap::Subcommand)]
enum UsersCommand {
    /// List users
    List,

    /// Create a user
    Create {
        /// Login name
        username: String,

        /// Role to grant
        #[arg(long)]
        role: String,

        /// Create the account disabled
        #[arg(long)]
        inactive: bool,

        /// Read the password from this environment variable instead of prompting
        #[arg(long, value_name = "VAR")]
        password_env: Option<String>,
    },

    /// Change a user's role
    SetRole {
        /// Login name
        username: String,

        /// New role
        role: String,
    },
}

#[derive(Debug, clap::Subcommand)]
enum PermissionsCommand {
    /// Permissions granted to each role
    Show,

    /// Every permission the backend knows
    All,

    /// Replace the permissions of a role
    Set {
        /// Role name
        role: String,

        /// Permissions to grant; an empty list revokes everything
        permissions: Vec<String>,
    },

    /// Add permissions to a role
    Grant {
        /// Role name
        role: String,

        /// Permissions to add
        #[arg(required = true)]
        permissions: Vec<String>,
    },

    /// Remove permissions from a role
    Revoke {
        /// Role name
        role: String,

        /// Permissions to remove
        #[arg(required = true)]
        permissions: Vec<String>,
    },
}

impl Admin {
    #[instrument(skip(ctx))]
    pub async fn run(self, ctx: &mut Context) -> anyhow::Result<()> {
        match self.command {
            AdminCommand::Users(command) => {
                ctx.require(Permission::ManageUsers).await?;
                users(ctx, command).await
            }
            AdminCommand::Permissions(command) => {
                ctx.require(Permission::ManagePermissions).await?;
                permissions(ctx, command).await
            }
            AdminCommand::Config => {
                ctx.require(Permission::ManageConfig).await?;
                let config = ctx.api.admin().runtime_config().await?;
                ctx.render(&config, |config| {
                    let mut table = Table::new(vec!["Property", "Value"]);
                    for (key, value) in config {
                        table.row(vec![key.clone(), display_value(value)]);
                    }
                    table.print("No properties exposed.");
                })
            }
            AdminCommand::Services => {
                ctx.require(Permission::ManageConfig).await?;
                let services = ctx.api.admin().services().await?;
                ctx.render(&services, |services| service_table(services).print("No managed services."))
            }
            AdminCommand::Service { action, key } => {
                ctx.require(Permission::ManageConfig).await?;
                ctx.api.admin().service_action(&key, action).await?;
                println!("{}", format!("Sent {action} to {key}").success());
                let services = ctx.api.admin().services().await?;
                ctx.render(&services, |services| service_table(services).print("No managed services."))
            }
            AdminCommand::Audits {
                user,
                action,
                limit,
            } => {
                ctx.require(Permission::ManageAudits).await?;
                let audits = filter_audits(
                    ctx.api.admin().audits().await?,
                    user.as_deref(),
                    action.as_deref(),
                    limit,
                );
                ctx.render(&audits, |audits| audit_table(audits).print("No audit entries."))
            }
        }
    }
}

async fn users(ctx: &Context, command: UsersCommand) -> anyhow::Result<()> {
    let admin = ctx.api.admin();
    match command {
        UsersCommand::List => {}
        UsersCommand::Create {
            username,
            role,
            inactive,
            password_env,
        } => {
            let username = username.trim().to_string();
            if username.is_empty() {
                anyhow::bail!("Username is required");
            }
            let password = match password_env {
                Some(var) => std::env::var(&var)
                    .map_err(|_| anyhow::anyhow!("environment variable {var} is not set"))?,
                None => dialoguer::Password::new()
                    .with_prompt(format!("Password for {username}"))
                    .with_confirmation("Repeat password", "Passwords do not match")
                    .interact()?,
            };
            let user = NewUser {
                username,
                password,
                role: role.trim().to_ascii_uppercase(),
                active: !inactive,
            };
            admin.create_user(&user).await?;
            println!("{}", format!("User {} created", user.username).success());
        }
        UsersCommand::SetRole { username, role } => {
            admin.set_role(&username, role.trim()).await?;
            println!("{}", format!("{username} is now {role}").success());
        }
    }
    let users = admin.users().await?;
    ctx.render(&users, |users| user_table(users).print("No users."))
}

async fn permissions(ctx: &Context, command: PermissionsCommand) -> anyhow::Result<()> {
    let admin = ctx.api.admin();
    let (role, updated) = match command {
        PermissionsCommand::Show => {
            let granted = admin.permissions().await?;
            return ctx.render(&granted, |granted| print_role_permissions(granted));
        }
        PermissionsCommand::All => {
            let all = admin.all_permissions().await?;
            return ctx.render(&all, |all| {
                for permission in all {
                    println!("{permission}");
                }
            });
        }
        PermissionsCommand::Set { role, permissions } => (role, permissions),
        PermissionsCommand::Grant { role, permissions } => {
            let current = admin.permissions().await?;
            let updated = merge(current.get(&role).map(Vec::as_slice).unwrap_or_default(), &permissions, &[]);
            (role, updated)
        }
        PermissionsCommand::Revoke { role, permissions } => {
            let current = admin.permissions().await?;
            let updated = merge(current.get(&role).map(Vec::as_slice).unwrap_or_default(), &[], &permissions);
            (role, updated)
        }
    };

    admin.set_role_permissions(&role, &updated).await?;
    println!("{}", format!("Permissions of {role} updated").success());
    let granted = admin.permissions().await?;
    ctx.render(&granted, |granted| print_role_permissions(granted))
}

/// `current` plus `grant` minus `revoke`, sorted and without duplicates.
fn merge(current: &[String], grant: &[String], revoke: &[String]) -> Vec<String> {
    let mut set: BTreeSet<String> = current.iter().cloned().collect();
    set.extend(grant.iter().map(|p| p.trim().to_ascii_uppercase()));
    for permission in revoke {
        set.remove(&permission.trim().to_ascii_uppercase());
    }
    set.into_iter().collect()
}

fn print_role_permissions(granted: &RolePermissions) {
    if granted.is_empty() {
        println!("{}", "No roles defined.".dim());
        return;
    }
    for (role, permissions) in granted {
        println!("{}", role.info());
        if permissions.is_empty() {
            println!("  {}", "none".dim());
        }
        for permission in permissions {
            println!("  • {permission}");
        }
    }
}

fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

pub fn user_table(users: &[User]) -> Table {
    let mut table = Table::new(vec!["Username", "Role", "Active", "Last Login"]);
    for user in users {
        table.row(vec![
            user.username.clone(),
            or_dash(user.role.as_deref()),
            match user.active {
                Some(true) => "yes".success(),
                Some(false) => "no".danger(),
                None => "-".to_string(),
            },
            or_dash(user.last_login.as_ref().map(format_timestamp)),
        ]);
    }
    table
}

const fn state_label(state: ServiceState) -> &'static str {
    match state {
        ServiceState::Up => "UP",
        ServiceState::Down => "DOWN",
        ServiceState::Unknown => "UNKNOWN",
    }
}

fn service_table(services: &[ManagedService]) -> Table {
    let mut table = Table::new(vec!["Key", "Name", "Port", "Status"]);
    for service in services {
        table.row(vec![
            service.key.clone(),
            or_dash(service.name.as_deref()),
            or_dash(service.port),
            terminal::status(state_label(service.status)),
        ]);
    }
    table
}

fn filter_audits(
    mut audits: Vec<UserAudit>,
    user: Option<&str>,
    action: Option<&str>,
    limit: Option<usize>,
) -> Vec<UserAudit> {
    if let Some(user) = user {
        audits.retain(|a| a.username.as_deref().is_some_and(|u| u.eq_ignore_ascii_case(user)));
    }
    if let Some(action) = action {
        let needle = action.to_ascii_lowercase();
        audits.retain(|a| {
            a.action
                .as_deref()
                .is_some_and(|a| a.to_ascii_lowercase().contains(&needle))
        });
    }
    audits.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    if let Some(limit) = limit {
        audits.truncate(limit);
    }
    audits
}

fn audit_table(audits: &[UserAudit]) -> Table {
    let mut table = Table::new(vec!["When", "User", "Action", "Details", "IP"]);
    for audit in audits {
        table.row(vec![
            or_dash(audit.timestamp.as_ref().map(format_timestamp)),
            or_dash(audit.username.as_deref()),
            or_dash(audit.action.as_deref()),
            or_dash(audit.details.as_deref()),
            or_dash(audit.ip_address.as_deref()),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use test_case::test_case;

    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[test_case(&["VIEW_CLIENTS"], &["manage_cases"], &[], &["MANAGE_CASES", "VIEW_CLIENTS"]; "grant")]
    #[test_case(&["VIEW_CLIENTS", "MANAGE_CASES"], &[], &["MANAGE_CASES"], &["VIEW_CLIENTS"]; "revoke")]
    #[test_case(&["VIEW_CLIENTS"], &["VIEW_CLIENTS"], &[], &["VIEW_CLIENTS"]; "grant twice")]
    fn merging_permissions(current: &[&str], grant: &[&str], revoke: &[&str], expected: &[&str]) {
        assert_eq!(
            merge(&strings(current), &strings(grant), &strings(revoke)),
            strings(expected)
        );
    }

    #[test]
    fn audits_are_filtered_and_newest_first() {
        let audits: Vec<UserAudit> = serde_json::from_value(json!([
            {"auditID": 1, "username": "jdoe", "action": "LOGIN", "timestamp": "2024-01-01T08:00:00"},
            {"auditID": 2, "username": "JDOE", "action": "LOGOUT", "timestamp": "2024-01-01T09:00:00"},
            {"auditID": 3, "username": "admin", "action": "LOGIN", "timestamp": "2024-01-01T10:00:00"},
            {"auditID": 4, "username": "jdoe", "action": "LOGIN", "timestamp": "2024-01-02T08:00:00"},
        ]))
        .unwrap();

        let ids = |audits: Vec<UserAudit>| audits.into_iter().filter_map(|a| a.audit_id).collect::<Vec<_>>();

        assert_eq!(ids(filter_audits(audits.clone(), Some("jdoe"), None, None)), [4, 2, 1]);
        assert_eq!(ids(filter_audits(audits.clone(), None, Some("log"), Some(2))), [4, 3]);
        assert_eq!(ids(filter_audits(audits, Some("jdoe"), Some("out"), None)), [2]);
    }

    #[test]
    fn runtime_values_print_without_quotes() {
        assert_eq!(display_value(&json!("jdbc:postgresql://db")), "jdbc:postgresql://db");
        assert_eq!(display_value(&json!(8080)), "8080");
        assert_eq!(display_value(&json!(null)), "-");
    }
}
