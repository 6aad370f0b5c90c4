//! Landing page: the areas the user may open and what changed recently.

use kyc_console::{Permission, Session, model::MaterialChange, services::changes::ChangeFilter};
use tracing::instrument;

use super::{
    Context,
    terminal::{self, Colorize, Table},
};

/// Show the pages available to you and recent activity
#[derive(Debug, clap::Parser)]
pub struct Dashboard {
    /// Number of recent material changes to show
    #[arg(long, default_value_t = 5)]
    recent: u32,
}

impl Default for Dashboard {
    fn default() -> Self {
        Self { recent: 5 }
    }
}

struct Card {
    title: &'static str,
    description: &'static str,
    command: &'static str,
    permission: Permission,
}

static CARDS: [Card; 8] = [
    Card {
        title: "Client Directory",
        description: "View and manage client profiles, identities, and related parties.",
        command: "kyc clients list",
        permission: Permission::ViewClients,
    },
    Card {
        title: "Material Changes",
        description: "Audit trail for all material changes across client entities.",
        command: "kyc changes list",
        permission: Permission::ViewChanges,
    },
    Card {
        title: "User Management",
        description: "Create users and manage role assignments.",
        command: "kyc admin users list",
        permission: Permission::ManageUsers,
    },
    Card {
        title: "Role Permissions",
        description: "Configure fine-grained authorities for each system role.",
        command: "kyc admin permissions show",
        permission: Permission::ManagePermissions,
    },
    Card {
        title: "Case Manager",
        description: "Manage KYC lifecycles, approvals, and document verification.",
        command: "kyc cases list",
        permission: Permission::ManageCases,
    },
    Card {
        title: "Questionnaire",
        description: "Questionnaire sections and answers for KYC cases.",
        command: "kyc questionnaire template",
        permission: Permission::ManageCases,
    },
    Card {
        title: "User Audit History",
        description: "View logs of all user actions in the system.",
        command: "kyc admin audits",
        permission: Permission::ManageAudits,
    },
    Card {
        title: "System Configuration",
        description: "View backend system settings and properties.",
        command: "kyc admin config",
        permission: Permission::ManageConfig,
    },
];

fn visible_cards(session: &Session) -> impl Iterator<Item = &'static Card> + '_ {
    CARDS
        .iter()
        .filter(|card| session.has_permission(card.permission))
}

impl Dashboard {
    #[instrument(skip(ctx))]
    pub async fn run(self, ctx: &mut Context) -> anyhow::Result<()> {
        let session = ctx.session().await?;
        let recent = if session.has_permission(Permission::ViewChanges) {
            recent_changes(ctx, self.recent).await
        } else {
            Vec::new()
        };

        if ctx.json() {
            return Context::print_json(&serde_json::json!({
                "user": session.user(),
                "pages": visible_cards(&session).map(|card| card.command).collect::<Vec<_>>(),
                "recentChanges": recent,
            }));
        }

        println!(
            "{}",
            format!("Welcome, {} ({})", session.username(), session.role()).info()
        );
        println!();
        for card in visible_cards(&session) {
            println!("{}  {}", card.title.info(), card.command.dim());
            println!("  {}", card.description);
        }

        if session.has_permission(Permission::ManageCases) {
            let open = ctx.api.cases().inbox_count().await;
            println!();
            println!("Inbox: {open} open task(s)  {}", "kyc inbox".dim());
        }

        if session.has_permission(Permission::ViewChanges) {
            println!();
            println!("{}", "Recent Material Changes".info());
            recent_table(&recent).print("No pending material changes found.");
        }
        Ok(())
    }
}

/// Fetch failures only cost the section, not the page.
async fn recent_changes(ctx: &Context, size: u32) -> Vec<MaterialChange> {
    match ctx.api.changes().list(0, size, &ChangeFilter::default()).await {
        Ok(page) => page.content,
        Err(e) => {
            tracing::warn!(error = %e, "dashboard changes fetch failed");
            Vec::new()
        }
    }
}

fn recent_table(changes: &[MaterialChange]) -> Table {
    let mut table = Table::new(vec!["Date", "Client", "Field", "Category", "Status"]);
    for change in changes {
        table.row(vec![
            change
                .change_date
                .map_or_else(|| "-".to_string(), |date| date.date().to_string()),
            change
                .client_name
                .clone()
                .unwrap_or_else(|| format!("Client #{}", change.client_id)),
            change.column_name.clone().unwrap_or_else(|| "-".to_string()),
            change.category.to_string(),
            terminal::status(&change.status),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn unnamed_clients_fall_back_to_their_id() {
        let changes: Vec<MaterialChange> = serde_json::from_value(json!([{
            "changeID": 1,
            "changeDate": "2024-06-01T10:15:00",
            "clientID": 77,
            "columnName": "citizenship1",
            "status": "PENDING",
            "category": "SCREENING",
        }]))
        .unwrap();

        let lines = recent_table(&changes).render(true);

        assert_eq!(lines[0], "Date: 2024-06-01");
        assert_eq!(lines[1], "Client: Client #77");
        assert_eq!(lines[2], "Field: citizenship1");
    }

    #[test]
    fn every_card_points_at_a_real_command() {
        use clap::CommandFactory;

        let cli = crate::cli::Cli::command();
        for card in &CARDS {
            let path: Vec<&str> = card.command.split_whitespace().skip(1).collect();
            let mut command = &cli;
            for name in path {
                command = command
                    .find_subcommand(name)
                    .unwrap_or_else(|| panic!("{} has no subcommand {name}", card.command));
            }
        }
    }
}
