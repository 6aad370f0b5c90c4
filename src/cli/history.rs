use chrono::NaiveDate;
use kyc_console::{
    Permission,
    history::{self, BatchService, HistoryEntry, HistoryFilter, SortKey},
    services::changes::SortDirection,
};
use tracing::instrument;

use super::{
    Context, parse_date,
    changes::format_timestamp,
    terminal::{self, Colorize, Table, or_dash},
};

/// Combined history of risk and screening batch runs
#[derive(Debug, clap::Parser)]
pub struct History {
    /// Services to include (repeatable; defaults to both)
    #[arg(long = "service", value_enum)]
    services: Vec<BatchService>,

    /// Keep only runs with this status
    #[arg(long)]
    status: Option<String>,

    /// Earliest creation date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    from: Option<NaiveDate>,

    /// Latest creation date, whole day included (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    to: Option<NaiveDate>,

    /// Column to sort by
    #[arg(long, value_enum, default_value = "created-at")]
    sort: SortKey,

    /// Sort direction
    #[arg(long, value_enum, default_value = "desc")]
    direction: SortDirection,
}

impl History {
    fn filter(&self) -> HistoryFilter {
        let defaults = HistoryFilter::default();
        HistoryFilter {
            services: if self.services.is_empty() {
                defaults.services
            } else {
                self.services.clone()
            },
            status: self.status.clone().filter(|s| !s.trim().is_empty()),
            start: self.from,
            end: self.to,
            sort: self.sort,
            direction: self.direction,
        }
    }

    #[instrument(skip(ctx))]
    pub async fn run(self, ctx: &mut Context) -> anyhow::Result<()> {
        ctx.require(Permission::ManageConfig).await?;
        let entries = self.filter().apply(history::load(&ctx.api).await?);
        ctx.render(&entries, |entries| {
            history_table(entries).print("No batch runs match.");
            println!("{}", format!("{} runs", entries.len()).dim());
        })
    }
}

fn history_table(entries: &[HistoryEntry]) -> Table {
    let mut table = Table::new(vec![
        "Batch", "Name", "Service", "Status", "Notification", "Feedback", "Created", "Updated",
    ]);
    for entry in entries {
        let run = &entry.run;
        table.row(vec![
            run.batch_id.to_string(),
            or_dash(run.batch_name.as_deref()),
            entry.service.to_string(),
            run.run_status
                .as_deref()
                .map_or_else(|| "-".to_string(), terminal::status),
            or_dash(run.notification_status.as_deref()),
            or_dash(run.feedback_count),
            or_dash(run.created_at.as_ref().map(format_timestamp)),
            or_dash(run.updated_at.as_ref().map(format_timestamp)),
        ]);
    }
    table
}
