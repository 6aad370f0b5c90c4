//! Ad-hoc tasks: free-form requests users send each other.

use kyc_console::model::{AdHocTask, NewAdHocTask};
use tracing::instrument;

use super::{
    Context,
    changes::format_timestamp,
    terminal::{self, Colorize, Table, or_dash},
};

/// Ad-hoc tasks exchanged between users
#[derive(Debug, clap::Parser)]
pub struct Adhoc {
    #[command(subcommand)]
    command: AdhocCommand,
}

#[derive(Debug, clap::Subcommand)]
enum AdhocCommand {
    /// Tasks waiting on you, or the ones you sent
    List {
        /// Show tasks you sent instead of your inbox
        #[arg(long)]
        sent: bool,

        /// Include answered and completed tasks
        #[arg(short, long)]
        all: bool,
    },

    /// Show one task with its request and response
    Show {
        /// Task id
        id: String,
    },

    /// Send a request to another user
    Create {
        /// User who should answer
        assignee: String,

        /// What you are asking for
        request: String,

        /// Client the request is about
        #[arg(long)]
        client: Option<i64>,
    },

    /// Answer a task
    Respond {
        /// Task id
        id: String,

        /// The answer
        response: String,
    },

    /// Hand a task over to another user
    Reassign {
        /// Task id
        id: String,

        /// New assignee
        assignee: String,
    },

    /// Close a task
    Complete {
        /// Task id
        id: String,
    },
}

impl Adhoc {
    #[instrument(skip(ctx))]
    pub async fn run(self, ctx: &mut Context) -> anyhow::Result<()> {
        let session = ctx.session().await?;
        let tasks = ctx.api.adhoc();

        match self.command {
            AdhocCommand::List { sent, all } => {
                let listed = select(tasks.list().await?, session.username(), sent, all);
                let empty = if sent { "You have not sent any tasks." } else { "Your inbox is empty." };
                ctx.render(&listed, |listed| task_table(listed).print(empty))
            }
            AdhocCommand::Show { id } => {
                let task = tasks.get(&id).await?;
                ctx.render(&task, print_task)
            }
            AdhocCommand::Create {
                assignee,
                request,
                client,
            } => {
                let task = NewAdHocTask {
                    assignee: assignee.trim().to_string(),
                    request_text: request,
                    client_id: client,
                };
                tasks.create(&task).await?;
                println!("{}", format!("Task sent to {}", task.assignee).success());
                Ok(())
            }
            AdhocCommand::Respond { id, response } => {
                tasks.respond(&id, &response).await?;
                println!("{}", "Response sent".success());
                Ok(())
            }
            AdhocCommand::Reassign { id, assignee } => {
                tasks.reassign(&id, assignee.trim()).await?;
                println!("{}", format!("Task {id} reassigned to {assignee}").success());
                Ok(())
            }
            AdhocCommand::Complete { id } => {
                tasks.complete(&id).await?;
                println!("{}", format!("Task {id} completed").success());
                Ok(())
            }
        }
    }
}

fn select(tasks: Vec<AdHocTask>, username: &str, sent: bool, all: bool) -> Vec<AdHocTask> {
    tasks
        .into_iter()
        .filter(|task| {
            if sent {
                task.is_sent_by(username)
            } else {
                task.is_inbox_of(username)
            }
        })
        .filter(|task| all || task.is_open())
        .collect()
}

fn task_table(tasks: &[AdHocTask]) -> Table {
    let mut table = Table::new(vec!["ID", "From", "To", "Client", "Request", "Status", "Created"]);
    for task in tasks {
        table.row(vec![
            task.id.clone(),
            or_dash(task.owner.as_deref()),
            or_dash(task.assignee.as_deref()),
            or_dash(task.client_id),
            or_dash(task.request_text.as_deref().map(|text| summary(text, 40))),
            task.status
                .as_deref()
                .map_or_else(|| "-".to_string(), terminal::status),
            or_dash(task.create_time.as_ref().map(format_timestamp)),
        ]);
    }
    table
}

/// First line of `text`, cut to `width` characters.
fn summary(text: &str, width: usize) -> String {
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() > width || text.lines().nth(1).is_some() {
        let cut: String = line.chars().take(width.saturating_sub(1)).collect();
        format!("{}…", cut.trim_end())
    } else {
        line.to_string()
    }
}

fn print_task(task: &AdHocTask) {
    println!("{}", format!("Task {}", task.id).info());
    println!("  From     {}", or_dash(task.owner.as_deref()));
    println!("  To       {}", or_dash(task.assignee.as_deref()));
    println!("  Client   {}", or_dash(task.client_id));
    println!(
        "  Status   {}",
        task.status.as_deref().map_or_else(|| "-".to_string(), terminal::status)
    );
    println!("  Created  {}", or_dash(task.create_time.as_ref().map(format_timestamp)));
    println!();
    println!("{}", "Request".info());
    println!("{}", task.request_text.as_deref().unwrap_or("-"));
    if let Some(response) = &task.response_text {
        println!();
        println!("{}", "Response".info());
        println!("{response}");
    }
}
