//! Material change audit log.

use chrono::{Local, NaiveDate, NaiveDateTime};
use kyc_console::{
    Permission,
    export,
    model::{ChangeAction, ChangeCategory, MaterialChange, MaterialChangeConfig, Page, Pagination},
    services::changes::{ChangeFilter, SortDirection},
};
use tracing::instrument;

use super::{
    Context, parse_date,
    terminal::{self, Colorize, Table, or_dash},
};

/// Review material changes to client records
#[derive(Debug, clap::Parser)]
pub struct Changes {
    #[command(subcommand)]
    command: ChangesCommand,
}

#[derive(Debug, clap::Subcommand)]
enum ChangesCommand {
    /// List changes, newest first
    List(ListArgs),

    /// Export every change in a date range to CSV
    Export {
        #[command(flatten)]
        range: DateRange,

        /// Target file (defaults to `clients_export_<today>.csv` in the export directory)
        #[arg(short, long)]
        file: Option<std::path::PathBuf>,
    },

    /// Run a row action on a pending change
    ///
    /// The change is looked up on the listed page and the action must be one
    /// the row offers. The page is shown again afterwards.
    Apply {
        /// Change id
        change_id: i64,

        /// Action to run
        #[arg(value_enum)]
        action: ChangeAction,

        #[command(flatten)]
        listing: ListArgs,
    },

    /// Show which columns are tracked as material
    Configs,

    /// Track a column as material, or change its category
    Track {
        /// Entity (table) name
        entity: String,

        /// Column name
        column: String,

        /// RISK, SCREENING, BOTH or NONE
        category: ChangeCategory,

        /// Id of an existing entry to update
        #[arg(long)]
        id: Option<i64>,
    },
}

#[derive(Debug, Clone, clap::Args)]
struct DateRange {
    /// Earliest change date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    from: Option<NaiveDate>,

    /// Latest change date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    to: Option<NaiveDate>,
}

#[derive(Debug, Clone, clap::Args)]
struct ListArgs {
    /// Zero-based page index
    #[arg(long, default_value_t = 0)]
    page: u32,

    /// Rows per page (defaults to the configured page size)
    #[arg(long)]
    size: Option<u32>,

    #[command(flatten)]
    range: DateRange,

    /// Column to sort by
    #[arg(long)]
    sort_by: Option<String>,

    /// Sort direction
    #[arg(long, value_enum, default_value = "desc")]
    sort_dir: SortDirection,
}

impl ListArgs {
    fn filter(&self) -> ChangeFilter {
        ChangeFilter {
            start: self.range.from,
            end: self.range.to,
            sort_by: self.sort_by.clone(),
            sort_dir: self.sort_dir,
        }
    }
}

impl Changes {
    #[instrument(skip(ctx))]
    pub async fn run(self, ctx: &mut Context) -> anyhow::Result<()> {
        match self.command {
            ChangesCommand::List(args) => {
                ctx.require(Permission::ViewChanges).await?;
                list(ctx, &args).await
            }
            ChangesCommand::Export { range, file } => {
                ctx.require(Permission::ViewChanges).await?;
                let filter = ChangeFilter {
                    start: range.from,
                    end: range.to,
                    ..ChangeFilter::default()
                };
                let rows = ctx.api.changes().export(&filter).await?;
                let path = file.unwrap_or_else(|| {
                    ctx.config
                        .export_dir
                        .join(export::default_file_name(Local::now().date_naive()))
                });
                if let Some(path) = export::export_csv(&rows, &path, ctx.notifier.as_ref())? {
                    println!("{}", path.display());
                }
                Ok(())
            }
            ChangesCommand::Apply {
                change_id,
                action,
                listing,
            } => {
                ctx.require(Permission::ViewChanges).await?;
                let size = listing.size.unwrap_or(ctx.config.page_size);
                let page = ctx
                    .api
                    .changes()
                    .apply_listed(change_id, action, listing.page, size, &listing.filter())
                    .await?;
                println!(
                    "{}",
                    format!("{} applied to change {change_id}", action.label()).success()
                );
                let pagination = Pagination::from_page(&page, listing.page, size);
                ctx.render(&page, |page| print_page(page, &pagination))
            }
            ChangesCommand::Configs => {
                ctx.require(Permission::ManageConfig).await?;
                let configs = ctx.api.changes().configs().await?;
                ctx.render(&configs, |configs| print_configs(configs))
            }
            ChangesCommand::Track {
                entity,
                column,
                category,
                id,
            } => {
                ctx.require(Permission::ManageConfig).await?;
                let config = MaterialChangeConfig {
                    config_id: id,
                    entity_name: entity,
                    column_name: column,
                    category,
                };
                ctx.api.changes().save_config(&config).await?;
                println!("{}", "Configuration saved".success());
                let configs = ctx.api.changes().configs().await?;
                ctx.render(&configs, |configs| print_configs(configs))
            }
        }
    }
}

async fn list(ctx: &Context, args: &ListArgs) -> anyhow::Result<()> {
    let size = args.size.unwrap_or(ctx.config.page_size);
    let page = ctx.api.changes().list(args.page, size, &args.filter()).await?;
    let pagination = Pagination::from_page(&page, args.page, size);
    ctx.render(&page, |page| print_page(page, &pagination))
}

fn print_page(page: &Page<MaterialChange>, pagination: &Pagination) {
    change_table(&page.content).print("No material changes found.");
    println!("{}", pagination.summary().dim());
}

pub fn change_table(changes: &[MaterialChange]) -> Table {
    let mut table = Table::new(vec![
        "ID", "Date/Time", "Client", "Category", "Status", "Field", "Old Value", "New Value",
        "Actions",
    ]);
    for change in changes {
        table.row(vec![
            change.change_id.to_string(),
            or_dash(change.change_date.as_ref().map(format_timestamp)),
            change
                .client_name
                .clone()
                .unwrap_or_else(|| change.client_id.to_string()),
            change.category.to_string(),
            terminal::status(&change.status),
            field(change),
            or_dash(change.old_value.as_deref()),
            or_dash(change.new_value.as_deref()),
            actions(change),
        ]);
    }
    table
}

fn field(change: &MaterialChange) -> String {
    match (change.entity_name.as_deref(), change.column_name.as_deref()) {
        (Some(entity), Some(column)) => format!("{entity}.{column}"),
        (None, Some(column)) => column.to_string(),
        (Some(entity), None) => entity.to_string(),
        (None, None) => "-".to_string(),
    }
}

fn actions(change: &MaterialChange) -> String {
    let actions = change.available_actions();
    if actions.is_empty() {
        return "-".to_string();
    }
    actions
        .iter()
        .map(|action| action.label())
        .collect::<Vec<_>>()
        .join(" ")
}

fn print_configs(configs: &[MaterialChangeConfig]) {
    let mut table = Table::new(vec!["ID", "Entity", "Column", "Category"]);
    for config in configs {
        table.row(vec![
            or_dash(config.config_id),
            config.entity_name.clone(),
            config.column_name.clone(),
            config.category.to_string(),
        ]);
    }
    table.print("No columns are tracked.");
}

pub fn format_timestamp(timestamp: &NaiveDateTime) -> String {
    timestamp.format("%Y-%m-%d %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn change(status: &str, category: &str) -> MaterialChange {
        serde_json::from_value(json!({
            "changeID": 7,
            "changeDate": "2024-05-01T09:30:00",
            "clientID": 3,
            "clientName": "Jane Roe",
            "entityName": "clients",
            "columnName": "lastName",
            "oldValue": "Doe",
            "newValue": "Roe",
            "status": status,
            "category": category,
        }))
        .unwrap()
    }

    #[test]
    fn pending_change_lists_its_buttons() {
        assert_eq!(actions(&change("PENDING", "BOTH")), "Risk Screen Done");
        assert_eq!(actions(&change("PENDING", "RISK")), "Risk Done");
    }

    #[test]
    fn reviewed_change_has_no_buttons() {
        assert_eq!(actions(&change("REVIEWED", "BOTH")), "-");
    }

    #[test]
    fn rows_show_qualified_field_and_time() {
        let lines = change_table(&[change("REVIEWED", "NONE")]).render(true);
        assert!(lines.contains(&"Field: clients.lastName".to_string()));
        assert!(lines.contains(&"Date/Time: 2024-05-01 09:30".to_string()));
    }

    #[test]
    fn apply_targets_the_listed_page() {
        use clap::Parser;

        let changes =
            Changes::try_parse_from(["changes", "apply", "9", "screen", "--page", "2", "--size", "5"])
                .unwrap();

        let ChangesCommand::Apply {
            change_id,
            action,
            listing,
        } = changes.command
        else {
            panic!("expected apply");
        };
        assert_eq!((change_id, action), (9, ChangeAction::Screen));
        assert_eq!((listing.page, listing.size), (2, Some(5)));
        assert_eq!(listing.filter().sort_dir, SortDirection::Desc);
    }
}
