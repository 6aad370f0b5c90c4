//! Screening panel: start a screening and watch it finish.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use kyc_console::{
    Permission,
    model::{ContextResult, ContextStatus, ScreeningLog, ScreeningStatus},
    monitor::{MonitorError, PanelState, PollTask, ScreeningMonitor, Snapshot},
};
use tokio::sync::watch;
use tracing::instrument;

use super::{
    Context,
    changes::format_timestamp,
    terminal::{self, Table, or_dash},
};

/// Run and inspect client screenings
#[derive(Debug, clap::Parser)]
pub struct Screening {
    #[command(subcommand)]
    command: ScreeningCommand,
}

#[derive(Debug, clap::Subcommand)]
enum ScreeningCommand {
    /// Start a screening and poll it until every context has finished
    Run {
        /// Client id
        client_id: i64,

        /// Print the request id and return without waiting
        #[arg(long)]
        no_wait: bool,
    },

    /// Show the current status of a screening request
    Status {
        /// Request id returned when the screening started
        request_id: String,
    },

    /// Past screenings of a client
    History {
        /// Client id
        client_id: i64,
    },
}

impl Screening {
    #[instrument(skip(ctx))]
    pub async fn run(self, ctx: &mut Context) -> anyhow::Result<()> {
        match self.command {
            ScreeningCommand::Run { client_id, no_wait } => {
                let session = ctx.require(Permission::ManageScreening).await?;
                let mut monitor = ScreeningMonitor::new(ctx.api.clone(), client_id, ctx.notifier());
                let state = monitor.start(&session).await?.clone();

                if no_wait {
                    if let PanelState::InProgress { request_id } = state {
                        println!("{request_id}");
                    }
                    return Ok(());
                }

                let task = PollTask::spawn(monitor, ctx.config.poll_interval(), ctx.config.poll_timeout())?;
                let monitor = watch_until_done(task).await?;
                let snapshot = monitor.snapshot();
                ctx.render(&snapshot.results, |_| print_panel(&snapshot))
            }
            ScreeningCommand::Status { request_id } => {
                ctx.require(Permission::ViewClients).await?;
                let status = ctx.api.screening().status(&request_id).await?;
                ctx.render(&status, |status| {
                    print_panel(&Snapshot {
                        state: state_of(status, &request_id),
                        results: status.results.clone(),
                    });
                })
            }
            ScreeningCommand::History { client_id } => {
                ctx.require(Permission::ViewClients).await?;
                let history = ctx.api.screening().history(client_id).await?;
                ctx.render(&history, |history| print_history(history))
            }
        }
    }
}

/// Shows a spinner with the per-context states until the poller stops.
///
/// Ctrl-C stops polling; the screening keeps running on the backend.
async fn watch_until_done(task: PollTask) -> anyhow::Result<ScreeningMonitor> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message(progress_line(&task.updates().borrow()));

    let updates = task.updates();
    let outcome = tokio::select! {
        (result, ()) = async { tokio::join!(task.wait(), follow(updates, &spinner)) } => result,
        _ = tokio::signal::ctrl_c() => Err(MonitorError::Cancelled),
    };
    spinner.finish_and_clear();

    Ok(outcome?)
}

async fn follow(mut updates: watch::Receiver<Snapshot>, spinner: &ProgressBar) {
    while updates.changed().await.is_ok() {
        spinner.set_message(progress_line(&updates.borrow_and_update()));
    }
}

fn progress_line(snapshot: &Snapshot) -> String {
    let contexts = snapshot
        .results
        .iter()
        .map(|result| format!("{} {}", result.context_type.code(), result.status.as_str()))
        .collect::<Vec<_>>()
        .join(" · ");
    format!("Screening {} {contexts}", snapshot.state.label())
}

fn state_of(status: &ScreeningStatus, request_id: &str) -> PanelState {
    if status.in_progress() {
        PanelState::InProgress {
            request_id: request_id.to_string(),
        }
    } else if status.any_hit() {
        PanelState::Hit
    } else {
        PanelState::NoHit
    }
}

fn print_panel(snapshot: &Snapshot) {
    println!("Overall: {}", terminal::status(snapshot.state.label()));
    let mut table = Table::new(vec!["Context", "Status", "Alert"]);
    for result in &snapshot.results {
        table.row(context_row(result));
    }
    table.print("No screening results.");
}

fn context_row(result: &ContextResult) -> Vec<String> {
    let alert = match result.status {
        ContextStatus::Hit => result
            .alert_message
            .clone()
            .unwrap_or_else(|| "Alert found".to_string()),
        _ => "-".to_string(),
    };
    vec![
        result.context_type.label().to_string(),
        terminal::status(result.status.as_str()),
        alert,
    ]
}

fn print_history(history: &[ScreeningLog]) {
    let mut table = Table::new(vec!["Log", "Request", "Status", "Created"]);
    for log in history {
        table.row(vec![
            or_dash(log.log_id),
            or_dash(log.external_request_id.as_deref()),
            log.overall_status
                .as_deref()
                .map_or_else(|| "-".to_string(), terminal::status),
            or_dash(log.created_at.as_ref().map(format_timestamp)),
        ]);
    }
    table.print("No screenings yet.");
}

#[cfg(test)]
mod tests {
    use kyc_console::model::ContextType;
    use serde_json::json;

    use super::*;

    #[test]
    fn progress_line_lists_every_context() {
        let snapshot = Snapshot {
            state: PanelState::InProgress {
                request_id: "req-1".into(),
            },
            results: ContextType::PANEL.into_iter().map(ContextResult::pending).collect(),
        };

        assert_eq!(
            progress_line(&snapshot),
            "Screening IN_PROGRESS PEP IN_PROGRESS · ADM IN_PROGRESS · INT IN_PROGRESS · SAN IN_PROGRESS"
        );
    }

    #[test]
    fn finished_status_with_a_hit_is_an_alert() {
        let status: ScreeningStatus = serde_json::from_value(json!({
            "requestId": "req-1",
            "results": [
                {"contextType": "PEP", "status": "NO_HIT"},
                {"contextType": "SAN", "status": "HIT", "alertMessage": "OFAC match"},
            ]
        }))
        .unwrap();

        assert_eq!(state_of(&status, "req-1"), PanelState::Hit);
        assert_eq!(context_row(&status.results[1])[2], "OFAC match");
        assert_eq!(context_row(&status.results[0])[2], "-");
    }
}
