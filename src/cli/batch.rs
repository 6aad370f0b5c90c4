//! Screening and risk batch pipelines.

use std::path::PathBuf;

use anyhow::Context as _;
use kyc_console::{
    Permission,
    model::{BatchId, Client, RiskMapping, ScreeningMapping},
    pipeline::{Flow, Pipeline},
    services::batches::BatchFile,
};
use nonempty::NonEmpty;
use tracing::instrument;

use super::{
    Context, print_response,
    terminal::{Colorize, Table, or_dash},
};

/// Drive the screening and risk batch pipelines
#[derive(Debug, clap::Parser)]
pub struct Batch {
    /// Pipeline to drive
    #[arg(value_enum)]
    flow: Flow,

    #[command(subcommand)]
    command: BatchCommand,
}

#[derive(Debug, clap::Subcommand)]
enum BatchCommand {
    /// List the steps of the pipeline
    Steps,

    /// Create a batch from the selected clients
    Create {
        /// Client ids
        #[arg(required = true)]
        clients: Vec<i64>,

        /// Run every remaining step, stopping at the first failure
        #[arg(long)]
        all: bool,
    },

    /// Run one step of an existing batch
    Step {
        /// Batch id
        batch: String,

        /// Step to run (1 is the first step after client selection)
        #[arg(long, default_value_t = 1)]
        step: usize,

        /// Keep going until the last step
        #[arg(long)]
        all: bool,
    },

    /// Print a file generated by the pipeline
    File {
        /// Batch id
        batch: String,

        /// Which file
        #[arg(value_enum)]
        file: BatchFile,
    },

    /// Compare the XML with its published SHA-256 checksum
    Verify {
        /// Batch id
        batch: String,
    },

    /// Show the field mapping, or replace it from a JSON file
    Mapping {
        /// JSON array of mapping entries to save
        #[arg(long, value_name = "FILE")]
        set: Option<PathBuf>,
    },

    /// Render the request for one client without creating a batch
    TestGenerate {
        /// Client id
        client_id: i64,
    },

    /// Run the whole risk batch on the server in one call
    Initiate {
        /// Client ids
        #[arg(required = true)]
        clients: Vec<i64>,
    },
}

impl Batch {
    #[instrument(skip(ctx))]
    pub async fn run(self, ctx: &mut Context) -> anyhow::Result<()> {
        ctx.require(Permission::ManageConfig).await?;
        let flow = self.flow;

        match self.command {
            BatchCommand::Steps => print_steps(flow, None),
            BatchCommand::Create { clients, all } => {
                let clients = fetch_clients(ctx, &clients).await?;
                let mut pipeline = Pipeline::new(ctx.api.clone(), ctx.notifier(), flow);
                let batch = pipeline.create(clients).await?.clone();
                println!("{batch}");
                if all {
                    pipeline.run_to_end().await?;
                }
                print_steps(flow, Some(&pipeline));
            }
            BatchCommand::Step { batch, step, all } => {
                let mut pipeline =
                    Pipeline::resume(ctx.api.clone(), ctx.notifier(), flow, BatchId::from(batch.as_str()), step)?;
                if all {
                    pipeline.run_to_end().await?;
                } else {
                    pipeline.advance().await?;
                }
                print_steps(flow, Some(&pipeline));
            }
            BatchCommand::File { batch, file } => {
                let pipeline = Pipeline::resume(ctx.api.clone(), ctx.notifier(), flow, BatchId::from(batch.as_str()), 1)?;
                let content = pipeline.file(file).await?;
                println!("{}", content.trim_end());
            }
            BatchCommand::Verify { batch } => {
                if flow != Flow::Screening {
                    anyhow::bail!("only the screening pipeline publishes a checksum");
                }
                let pipeline = Pipeline::resume(ctx.api.clone(), ctx.notifier(), flow, BatchId::from(batch.as_str()), 1)?;
                let check = pipeline.verify_checksum().await?;
                println!("computed   {}", check.computed);
                println!("published  {}", check.published);
                if check.matches() {
                    println!("{}", "Checksum matches".success());
                } else {
                    anyhow::bail!("checksum mismatch for batch {batch}");
                }
            }
            BatchCommand::Mapping { set } => mapping(ctx, flow, set).await?,
            BatchCommand::TestGenerate { client_id } => {
                let client = ctx.api.clients().get(client_id).await?;
                let response = match flow {
                    Flow::Screening => ctx.api.screening_batches().test_generate(&client).await?,
                    Flow::Risk => ctx.api.risk_batches().test_generate(&client).await?,
                };
                print_response(&response);
            }
            BatchCommand::Initiate { clients } => {
                if flow != Flow::Risk {
                    anyhow::bail!("only the risk pipeline can be initiated in one call");
                }
                let clients = NonEmpty::from_vec(fetch_clients(ctx, &clients).await?)
                    .context("Select at least one client")?;
                let response = ctx.api.risk_batches().initiate(&clients).await?;
                println!("{}", "Risk batch initiated".success());
                print_response(&response);
            }
        }
        Ok(())
    }
}

async fn fetch_clients(ctx: &Context, ids: &[i64]) -> anyhow::Result<Vec<Client>> {
    let mut clients = Vec::with_capacity(ids.len());
    for &id in ids {
        let client = ctx
            .api
            .clients()
            .get(id)
            .await
            .with_context(|| format!("failed to load client {id}"))?;
        clients.push(client);
    }
    Ok(clients)
}

async fn mapping(ctx: &Context, flow: Flow, set: Option<PathBuf>) -> anyhow::Result<()> {
    let input = set
        .map(|path| {
            std::fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))
        })
        .transpose()?;

    match flow {
        Flow::Screening => {
            let service = ctx.api.screening_batches();
            if let Some(input) = input {
                let entries: Vec<ScreeningMapping> =
                    serde_json::from_str(&input).context("mapping file is not a list of mapping entries")?;
                service.save_mapping(&entries).await?;
                println!("{}", "Mapping saved".success());
            }
            let entries = service.mapping().await?;
            ctx.render(&entries, |entries| screening_mapping_table(entries).print("No mapping configured."))
        }
        Flow::Risk => {
            let service = ctx.api.risk_batches();
            if let Some(input) = input {
                let entries: Vec<RiskMapping> =
                    serde_json::from_str(&input).context("mapping file is not a list of mapping entries")?;
                service.save_mapping(&entries).await?;
                println!("{}", "Mapping saved".success());
            }
            let entries = service.mapping().await?;
            ctx.render(&entries, |entries| risk_mapping_table(entries).print("No mapping configured."))
        }
    }
}

fn screening_mapping_table(entries: &[ScreeningMapping]) -> Table {
    let mut table = Table::new(vec!["Target", "Source", "Default", "Transformation"]);
    for entry in entries {
        table.row(vec![
            entry.target_path.clone(),
            or_dash(entry.source_field.as_deref()),
            or_dash(entry.default_value.as_deref()),
            or_dash(entry.transformation.as_deref()),
        ]);
    }
    table
}

fn risk_mapping_table(entries: &[RiskMapping]) -> Table {
    let mut table = Table::new(vec!["Target", "Source", "Default", "Category"]);
    for entry in entries {
        table.row(vec![
            entry.target_path.clone(),
            or_dash(entry.source_field.as_deref()),
            or_dash(entry.default_value.as_deref()),
            or_dash(entry.category.as_deref()),
        ]);
    }
    table
}

fn print_steps(flow: Flow, pipeline: Option<&Pipeline>) {
    for line in step_lines(flow, pipeline.map(|p| (p.current_step(), p.is_finished()))) {
        println!("{line}");
    }
}

/// One line per step, marking finished steps and the next one to run.
fn step_lines(flow: Flow, progress: Option<(usize, bool)>) -> Vec<String> {
    flow.steps()
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let marker = match progress {
                Some((_, true)) => "✔",
                Some((current, false)) if index < current => "✔",
                Some((current, false)) if index == current => "▶",
                _ => " ",
            };
            format!("{marker} {index}. {name}")
        })
        .collect()
}
