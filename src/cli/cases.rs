//! Case manager: listing, case details, workflow actions and tasks.

use std::path::PathBuf;

use kyc_console::{
    Permission,
    model::{
        Case, CaseAction, CaseComment, CaseDocument, CaseEvent, NewCase, Page, ProcessInstance,
        TimelineItem, Transition, WorkflowTask,
    },
    notify::Notifier,
    services::cases::{CaseDetails, DEFAULT_CASE_REASON, DocumentUpload},
};
use non_empty_string::NonEmptyString;
use serde_json::{Map, Value};
use tracing::instrument;

use super::{
    Context,
    admin::user_table,
    confirm,
    changes::format_timestamp,
    risk::assessment_table,
    terminal::{self, Colorize, Table, or_dash},
};

/// Work on KYC cases, documents and workflow tasks
#[derive(Debug, clap::Parser)]
pub struct Cases {
    #[command(subcommand)]
    command: CasesCommand,
}

#[derive(Debug, clap::Subcommand)]
enum CasesCommand {
    /// List cases with pending and in-review counts
    List {
        /// Only cases with this status
        #[arg(long)]
        status: Option<String>,
    },

    /// Show a case with its documents, comments, events and tasks
    Show {
        /// Case id
        id: i64,
    },

    /// Open a case for a client
    Create {
        /// Client id
        client_id: i64,

        /// Why the case is opened
        #[arg(long, default_value = DEFAULT_CASE_REASON)]
        reason: String,

        /// Opening comment
        #[arg(long, default_value = "")]
        comment: String,
    },

    /// Approve or reject a case at its current step
    Transition {
        /// Case id
        id: i64,

        /// Decision
        #[arg(value_enum)]
        action: Transition,

        /// Comment recorded with the decision
        #[arg(short, long)]
        comment: String,
    },

    /// Assign a case to a user, or list who can take it
    Assign {
        /// Case id
        id: i64,

        /// User to assign; omit to list eligible users
        assignee: Option<String>,
    },

    /// Attach a document to a case
    Upload {
        /// Case id
        id: i64,

        /// File to upload
        file: PathBuf,

        /// Document category
        #[arg(long, default_value = "IDENTIFICATION")]
        category: String,

        /// Comment stored with the document
        #[arg(long, default_value = "")]
        comment: String,

        /// Display name; reusing an existing name adds a new version
        #[arg(long)]
        name: Option<String>,
    },

    /// List every version of a document
    Versions {
        /// Case id
        id: i64,

        /// Document name
        name: String,
    },

    /// Download a document
    Download {
        /// Document id
        document_id: i64,

        /// Where to write the file
        output: PathBuf,
    },

    /// List the discretionary actions available on a case
    Actions {
        /// Case id
        id: i64,
    },

    /// Trigger a discretionary action
    Trigger {
        /// Case id
        id: i64,

        /// Action id as listed by `cases actions`
        action_id: String,

        /// Form variable, repeatable
        #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_variable)]
        variables: Vec<(String, String)>,
    },

    /// Your workflow tasks
    #[command(subcommand)]
    Tasks(TasksCommand),

    /// Workflow engine administration
    #[command(subcommand)]
    Admin(AdminCommand),

    /// Users holding a role
    Users {
        /// Role name, for example KYC_ANALYST
        role: String,
    },
}

#[derive(Debug, clap::Subcommand)]
enum TasksCommand {
    /// List your open tasks
    List,

    /// Complete a task
    Complete {
        /// Task id
        task_id: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Remove all of your tasks
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Debug, clap::Subcommand)]
enum AdminCommand {
    /// Every open task in the engine
    Tasks,

    /// Running process instances
    Processes,

    /// Terminate a process instance
    Terminate {
        /// Process instance id
        process_id: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Move legacy cases onto the current workflow
    Migrate {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

pub fn parse_variable(value: &str) -> Result<(String, String), String> {
    let (key, value) = value
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{value}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err("variable name is empty".to_string());
    }
    Ok((key.to_string(), value.to_string()))
}

/// Keeps the cases in `status` as a single page whose totals count only them.
fn with_status(page: Page<Case>, status: &str) -> Page<Case> {
    Page::single(
        page.content
            .into_iter()
            .filter(|case| case.status().eq_ignore_ascii_case(status))
            .collect(),
    )
}

impl Cases {
    #[instrument(skip(ctx))]
    pub async fn run(self, ctx: &mut Context) -> anyhow::Result<()> {
        let session = ctx.require(Permission::ManageCases).await?;
        let cases = ctx.api.cases();

        match self.command {
            CasesCommand::List { status } => {
                let mut page = cases.list().await?;
                if let Some(status) = status {
                    page = with_status(page, &status);
                }
                ctx.render(&page, |page| {
                    print_stats(&page.content);
                    case_table(&page.content).print("No cases found.");
                })
            }
            CasesCommand::Show { id } => {
                let details = cases.details(id).await?;
                ctx.render(&details, |details| print_details(details, session.username()))
            }
            CasesCommand::Create {
                client_id,
                reason,
                comment,
            } => {
                let reason = if reason.trim().is_empty() {
                    DEFAULT_CASE_REASON.to_string()
                } else {
                    reason
                };
                let id = cases
                    .create(&NewCase {
                        client_id,
                        reason,
                        comment,
                    })
                    .await?;
                ctx.notifier.success(&format!("Case {id} created"));
                println!("{id}");
                Ok(())
            }
            CasesCommand::Transition {
                id,
                action,
                comment,
            } => {
                let Ok(comment) = NonEmptyString::new(comment.trim().to_string()) else {
                    ctx.notifier.warning("Comment is required for workflow actions");
                    anyhow::bail!("Comment is required for workflow actions");
                };
                let details = cases.details(id).await?;
                if !details.can_transition(session.username()) {
                    anyhow::bail!(
                        "case {id} is at {} and is not awaiting your decision",
                        details.case.status()
                    );
                }

                if let Err(e) = cases.transition(id, action, &comment).await {
                    ctx.notifier.error(&e.to_string());
                    return Err(e.into());
                }
                ctx.notifier
                    .success(&format!("Case transitioned to {action} successfully"));

                let case = cases.get(id).await?;
                println!("Status: {}", terminal::status(case.status()));
                Ok(())
            }
            CasesCommand::Assign { id, assignee } => {
                let case = cases.get(id).await?;
                if !case.can_assign() {
                    anyhow::bail!("case {id} is closed");
                }
                let Some(role) = case.assignee_role() else {
                    ctx.notifier
                        .warning(&format!("Cannot assign case in status: {}", case.status()));
                    return Ok(());
                };

                match assignee {
                    None => {
                        let users = cases.users_by_role(role).await?;
                        if users.is_empty() {
                            ctx.notifier.warning(&format!("No users found with role: {role}"));
                        }
                        ctx.render(&users, |users| user_table(users).print(""))
                    }
                    Some(assignee) => {
                        cases.assign(id, &assignee).await?;
                        ctx.notifier.success(&format!("Case assigned to {assignee}"));
                        Ok(())
                    }
                }
            }
            CasesCommand::Upload {
                id,
                file,
                category,
                comment,
                name,
            } => {
                let bytes = std::fs::read(&file)
                    .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", file.display()))?;
                let file_name = file
                    .file_name()
                    .map_or_else(|| "document".to_string(), |n| n.to_string_lossy().into_owned());
                let upload = DocumentUpload {
                    mime: mime_type(&file_name).map(ToString::to_string),
                    file_name,
                    bytes,
                    category,
                    comment,
                    document_name: name,
                };
                match cases.upload(id, upload, session.username()).await {
                    Ok(_) => ctx.notifier.success("Document uploaded successfully"),
                    Err(e) => {
                        ctx.notifier.error(&format!("Upload failed: {e}"));
                        return Err(e.into());
                    }
                }
                let documents = cases.documents(id).await?;
                ctx.render(&documents, |documents| document_table(documents).print(""))
            }
            CasesCommand::Versions { id, name } => {
                let versions = cases.document_versions(id, &name).await?;
                ctx.render(&versions, |versions| {
                    document_table(versions).print("No versions found.");
                })
            }
            CasesCommand::Download {
                document_id,
                output,
            } => {
                let bytes = cases.download(document_id).await?;
                std::fs::write(&output, &bytes)
                    .map_err(|e| anyhow::anyhow!("failed to write {}: {e}", output.display()))?;
                ctx.notifier
                    .success(&format!("Saved {} bytes to {}", bytes.len(), output.display()));
                Ok(())
            }
            CasesCommand::Actions { id } => {
                let actions = cases.actions(id).await?;
                ctx.render(&actions, |actions| print_actions(actions))
            }
            CasesCommand::Trigger {
                id,
                action_id,
                variables,
            } => {
                let actions = cases.actions(id).await?;
                let action = actions
                    .iter()
                    .find(|action| action.id == action_id)
                    .ok_or_else(|| anyhow::anyhow!("case {id} has no action '{action_id}'"))?;
                let variables: Map<String, Value> = variables
                    .into_iter()
                    .map(|(key, value)| (key, Value::String(value)))
                    .collect();
                let missing = missing_variables(action, &variables);
                if !missing.is_empty() {
                    anyhow::bail!("{} requires --var {}", action.label(), missing.join(", --var "));
                }

                cases.trigger_action(id, &action.id, &variables).await?;
                ctx.notifier.success(&format!("{} triggered", action.label()));
                Ok(())
            }
            CasesCommand::Tasks(command) => tasks(ctx, command).await,
            CasesCommand::Admin(command) => {
                session.require_role("ADMIN")?;
                admin(ctx, command).await
            }
            CasesCommand::Users { role } => {
                let users = cases.users_by_role(&role).await?;
                ctx.render(&users, |users| user_table(users).print("No users hold this role."))
            }
        }
    }
}

/// Lists the open tasks of the logged-in user.
#[instrument(skip(ctx))]
pub async fn inbox(ctx: &mut Context) -> anyhow::Result<()> {
    ctx.session().await?;
    let tasks = ctx.api.cases().my_tasks().await?;
    ctx.render(&tasks, |tasks| {
        println!("Pending actions: {}", tasks.len());
        task_table(tasks).print("All clear! No tasks are waiting for you.");
    })
}

async fn tasks(ctx: &Context, command: TasksCommand) -> anyhow::Result<()> {
    let cases = ctx.api.cases();
    match command {
        TasksCommand::List => {
            let tasks = cases.my_tasks().await?;
            ctx.render(&tasks, |tasks| task_table(tasks).print("No open tasks."))
        }
        TasksCommand::Complete { task_id, yes } => {
            if !confirm("Are you sure you want to complete this task?", yes)? {
                return Ok(());
            }
            match cases.complete_task(&task_id).await {
                Ok(_) => ctx.notifier.success("Task completed successfully"),
                Err(e) => {
                    ctx.notifier.error(&format!("Failed to complete task: {e}"));
                    return Err(e.into());
                }
            }
            Ok(())
        }
        TasksCommand::Clear { yes } => {
            if !confirm("Remove all of your tasks?", yes)? {
                return Ok(());
            }
            cases.clear_tasks().await?;
            ctx.notifier.success("Tasks cleared");
            Ok(())
        }
    }
}

async fn admin(ctx: &Context, command: AdminCommand) -> anyhow::Result<()> {
    let cases = ctx.api.cases();
    match command {
        AdminCommand::Tasks => {
            let tasks = cases.admin_tasks().await?;
            ctx.render(&tasks, |tasks| task_table(tasks).print("No open tasks."))
        }
        AdminCommand::Processes => {
            let processes = cases.admin_processes().await?;
            ctx.render(&processes, |processes| print_processes(processes))
        }
        AdminCommand::Terminate { process_id, yes } => {
            if !confirm(&format!("Terminate process {process_id}?"), yes)? {
                return Ok(());
            }
            cases.terminate_process(&process_id).await?;
            ctx.notifier.success(&format!("Process {process_id} terminated"));
            Ok(())
        }
        AdminCommand::Migrate { yes } => {
            if !confirm("Migrate legacy cases to the current workflow?", yes)? {
                return Ok(());
            }
            cases.migrate().await?;
            ctx.notifier.success("Migration started");
            Ok(())
        }
    }
}

fn missing_variables<'a>(action: &'a CaseAction, variables: &Map<String, Value>) -> Vec<&'a str> {
    action
        .required_variables()
        .iter()
        .copied()
        .filter(|name| {
            variables
                .get(*name)
                .and_then(Value::as_str)
                .is_none_or(|value| value.trim().is_empty())
        })
        .collect()
}

fn mime_type(file_name: &str) -> Option<&'static str> {
    let extension = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
    Some(match extension.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "xml" => "application/xml",
        "json" => "application/json",
        _ => return None,
    })
}

fn print_stats(cases: &[Case]) {
    let pending = cases.iter().filter(|case| case.is_pending()).count();
    let review = cases.iter().filter(|case| case.is_in_review()).count();
    println!(
        "Total {}  {}  {}",
        cases.len(),
        format!("Pending {pending}").info(),
        format!("In review {review}").warning()
    );
}

pub fn case_table(cases: &[Case]) -> Table {
    let mut table = Table::new(vec!["Case ID", "Client", "Status", "Created", "Assigned To"]);
    for case in cases {
        table.row(vec![
            case.case_id.to_string(),
            case.client_name
                .clone()
                .unwrap_or_else(|| case.client_id.to_string()),
            terminal::status(&case.status().replace('_', " ")),
            or_dash(case.created_date.as_ref().map(format_timestamp)),
            or_dash(case.assigned_to.as_deref()),
        ]);
    }
    table
}

fn print_details(details: &CaseDetails, username: &str) {
    let case = &details.case;
    println!(
        "{}",
        format!(
            "Case {} · {}",
            case.case_id,
            case.client_name.as_deref().unwrap_or("unknown client")
        )
        .info()
    );
    println!("  Status       {}", terminal::status(case.status()));
    println!("  Reason       {}", or_dash(case.reason.as_deref()));
    println!("  Assigned to  {}", or_dash(case.assigned_to.as_deref()));
    println!("  Workflow     {}", or_dash(case.workflow_type.as_deref()));
    println!("  Created      {}", or_dash(case.created_date.as_ref().map(format_timestamp)));
    if details.can_transition(username) {
        println!(
            "{}",
            format!("  Awaiting your decision: kyc cases transition {} approve|reject -c <comment>", case.case_id)
                .warning()
        );
    }

    if case.is_cmmn() {
        section("Case Timeline (CMMN)");
        print_timeline(&details.timeline);
    }

    if !details.tasks.is_empty() {
        section("My Active Tasks");
        task_table(&details.tasks).print("");
    }

    section("Documents");
    document_table(&details.documents).print("No documents uploaded.");

    section("Comments & Workflow Notes");
    print_comments(&details.comments);

    section("Case Events");
    print_events(&details.events);

    section("Risk");
    assessment_table(&details.risk_history).print("Not assessed yet.");

    section("Other cases for this client");
    case_table(&details.related_cases).print("None.");
}

fn section(title: &str) {
    println!();
    println!("{}", title.info());
}

fn print_timeline(items: &[TimelineItem]) {
    if items.is_empty() {
        println!("{}", "No plan items yet.".dim());
        return;
    }
    for item in items {
        let when = match (&item.start_time, &item.end_time) {
            (Some(start), Some(end)) => {
                format!("{} → {}", format_timestamp(start), format_timestamp(end))
            }
            (Some(start), None) => format!("since {}", format_timestamp(start)),
            _ => String::new(),
        };
        println!(
            "  {} {} {} {}",
            item.status.marker(),
            item.name.as_deref().unwrap_or("(unnamed)"),
            item.item_type.as_deref().map(|t| format!("[{t}]")).unwrap_or_default().dim(),
            when.dim()
        );
    }
}

fn print_comments(comments: &[CaseComment]) {
    if comments.is_empty() {
        println!("{}", "No comments.".dim());
        return;
    }
    for comment in comments {
        println!(
            "  {} {} {}",
            comment.user_id.as_deref().unwrap_or("system"),
            comment.role.as_deref().map(|r| format!("({r})")).unwrap_or_default().dim(),
            or_dash(comment.comment_date.as_ref().map(format_timestamp)).dim()
        );
        println!("    {}", comment.comment_text.as_deref().unwrap_or_default());
    }
}

fn print_events(events: &[CaseEvent]) {
    let mut table = Table::new(vec!["When", "Type", "Source", "Description"]);
    for event in events {
        table.row(vec![
            or_dash(event.event_date.as_ref().map(format_timestamp)),
            or_dash(event.event_type.as_deref()),
            or_dash(event.event_source.as_deref()),
            or_dash(event.event_description.as_deref()),
        ]);
    }
    table.print("No events recorded.");
}

fn document_table(documents: &[CaseDocument]) -> Table {
    let mut table = Table::new(vec!["ID", "Name", "Version", "Category", "Uploaded By", "Uploaded"]);
    for document in documents {
        table.row(vec![
            document.document_id.to_string(),
            or_dash(document.document_name.as_deref()),
            or_dash(document.version.map(|v| format!("v{v}"))),
            or_dash(document.category.as_deref()),
            or_dash(document.uploaded_by.as_deref()),
            or_dash(document.upload_date.as_ref().map(format_timestamp)),
        ]);
    }
    table
}

fn task_table(tasks: &[WorkflowTask]) -> Table {
    let mut table = Table::new(vec!["Task ID", "Task", "Case", "Client", "Initiator", "Created"]);
    for task in tasks {
        table.row(vec![
            task.task_id.clone(),
            or_dash(task.name.as_deref()),
            or_dash(task.case_id),
            or_dash(task.client_id),
            or_dash(task.initiator.as_deref()),
            or_dash(task.create_time.as_ref().map(format_timestamp)),
        ]);
    }
    table
}

fn print_actions(actions: &[CaseAction]) {
    let mut table = Table::new(vec!["ID", "Action", "Requires"]);
    for action in actions {
        table.row(vec![
            action.id.clone(),
            action.label(),
            action.required_variables().join(", "),
        ]);
    }
    table.print("No actions available at this stage.");
}

fn print_processes(processes: &[ProcessInstance]) {
    let mut table = Table::new(vec!["Process", "Definition", "Case", "Client", "Initiator", "Started"]);
    for process in processes {
        table.row(vec![
            process.id.clone(),
            or_dash(process.definition_key.as_deref()),
            or_dash(process.case_id),
            or_dash(process.client_id),
            or_dash(process.initiator.as_deref()),
            or_dash(process.start_time.as_ref().map(format_timestamp)),
        ]);
    }
    table.print("No running processes.");
}
