use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

mod adhoc;
mod admin;
mod batch;
mod cases;
mod changes;
mod clients;
mod complete;
mod config;
mod dashboard;
mod history;
mod questionnaire;
mod risk;
mod screening;
mod session;
mod terminal;

use anyhow::Context as _;
use clap::ArgAction;
use kyc_console::{
    ApiClient, Config, Permission, Session, SessionStore,
    http::{ApiResponse, HttpTransport},
    notify::Notifier,
    services::auth,
};
use serde::Serialize;
use tracing::instrument;

use self::terminal::TerminalNotifier;

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Directory holding the session and configuration files
    #[arg(long, env = "KYC_HOME", global = true, value_name = "DIR")]
    state_dir: Option<PathBuf>,

    /// Configuration file (defaults to `config.toml` in the state directory)
    #[arg(long, env = "KYC_CONFIG", global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Backend origin, overriding the configured server
    #[arg(long, env = "KYC_SERVER", global = true, value_name = "URL")]
    server: Option<String>,

    /// Output format for listings
    #[arg(long, value_enum, global = true, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Option<Command>,
}

/// How listings are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Aligned columns for humans
    Table,
    /// Pretty-printed JSON for scripts
    Json,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);

        let state_dir = self.state_dir.unwrap_or_else(default_state_dir);
        let config_path = self
            .config
            .unwrap_or_else(|| state_dir.join("config.toml"));

        let command = self
            .command
            .unwrap_or_else(|| Command::Dashboard(dashboard::Dashboard::default()));

        let mut config = Config::load_or_default(&config_path)
            .with_context(|| format!("failed to load {}", config_path.display()))?;
        if let Some(server) = self.server {
            config.set("server", &server)?;
        }

        let mut ctx = Context::new(config, config_path, &state_dir, self.output)?;
        command.run(&mut ctx).await
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

fn default_state_dir() -> PathBuf {
    std::env::var_os("HOME").map_or_else(|| PathBuf::from(".kyc"), |home| PathBuf::from(home).join(".kyc"))
}

#[derive(Debug, clap::Parser)]
pub enum Command {
    /// Log in and store the session token
    Login(session::Login),

    /// End the session and forget the stored token
    Logout,

    /// Show the logged-in user, role and permissions
    Whoami,

    /// Change your password
    Password(session::Password),

    /// Show the pages available to you and recent activity (default)
    Dashboard(dashboard::Dashboard),

    /// Browse the client directory
    Clients(clients::Clients),

    /// Work on KYC cases, documents and workflow tasks
    Cases(cases::Cases),

    /// Your open workflow tasks
    Inbox,

    /// Review material changes to client records
    Changes(changes::Changes),

    /// Evaluate and inspect client risk
    Risk(risk::Risk),

    /// Run and inspect client screenings
    ///
    /// A started screening is polled until every context has finished.
    Screening(screening::Screening),

    /// Drive the screening and risk batch pipelines
    Batch(batch::Batch),

    /// Combined history of risk and screening batch runs
    History(history::History),

    /// Users, permissions, services and audit logs
    Admin(admin::Admin),

    /// Ad-hoc tasks exchanged between users
    Adhoc(adhoc::Adhoc),

    /// Case questionnaires
    Questionnaire(questionnaire::Questionnaire),

    /// Show or modify configuration settings
    Config(config::Config),

    /// Generate shell completion scripts
    Completions(complete::Complete),
}

impl Command {
    async fn run(self, ctx: &mut Context) -> anyhow::Result<()> {
        match self {
            Self::Login(command) => command.run(ctx).await?,
            Self::Logout => session::logout(ctx).await?,
            Self::Whoami => session::whoami(ctx).await?,
            Self::Password(command) => command.run(ctx).await?,
            Self::Dashboard(command) => command.run(ctx).await?,
            Self::Clients(command) => command.run(ctx).await?,
            Self::Cases(command) => command.run(ctx).await?,
            Self::Inbox => cases::inbox(ctx).await?,
            Self::Changes(command) => command.run(ctx).await?,
            Self::Risk(command) => command.run(ctx).await?,
            Self::Screening(command) => command.run(ctx).await?,
            Self::Batch(command) => command.run(ctx).await?,
            Self::History(command) => command.run(ctx).await?,
            Self::Admin(command) => command.run(ctx).await?,
            Self::Adhoc(command) => command.run(ctx).await?,
            Self::Questionnaire(command) => command.run(ctx).await?,
            Self::Config(command) => command.run(&ctx.config_path)?,
            Self::Completions(command) => command.run(),
        }
        Ok(())
    }
}

/// Everything a command needs: settings, the session store and the client.
pub struct Context {
    config: Config,
    config_path: PathBuf,
    store: SessionStore,
    api: ApiClient,
    output: OutputFormat,
    notifier: Arc<TerminalNotifier>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("server", &self.config.server)
            .field("store", &self.store)
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}

impl Context {
    fn new(
        config: Config,
        config_path: PathBuf,
        state_dir: &Path,
        output: OutputFormat,
    ) -> anyhow::Result<Self> {
        let transport = HttpTransport::new(config.request_timeout())?;
        let api = ApiClient::new(config.api_base(), Arc::new(transport));
        Ok(Self {
            config_path,
            store: SessionStore::new(state_dir),
            api,
            output,
            notifier: Arc::new(TerminalNotifier),
            config,
        })
    }

    /// Restores and validates the stored session.
    #[instrument(skip(self))]
    async fn session(&mut self) -> anyhow::Result<Session> {
        Ok(auth::restore(&mut self.api, &self.store).await?)
    }

    /// Like [`Context::session`], then checks a permission.
    async fn require(&mut self, permission: Permission) -> anyhow::Result<Session> {
        let session = self.session().await?;
        session.require(permission)?;
        Ok(session)
    }

    fn notifier(&self) -> Arc<dyn Notifier> {
        self.notifier.clone()
    }

    const fn json(&self) -> bool {
        matches!(self.output, OutputFormat::Json)
    }

    fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
        serde_json::to_writer_pretty(std::io::stdout(), value)
            .context("failed to render json output")?;
        println!();
        Ok(())
    }

    /// Prints `value` as JSON when requested, otherwise calls `table`.
    fn render<T: Serialize + ?Sized>(&self, value: &T, table: impl FnOnce(&T)) -> anyhow::Result<()> {
        if self.json() {
            Self::print_json(value)
        } else {
            table(value);
            Ok(())
        }
    }
}

/// Prints whatever body a backend action answered with.
fn print_response(response: &ApiResponse) {
    match response {
        ApiResponse::Json(value) => {
            println!("{}", serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()));
        }
        ApiResponse::Text(text) if !text.trim().is_empty() => println!("{}", text.trim_end()),
        ApiResponse::Text(_) | ApiResponse::Empty => {}
    }
}

/// Parses a `YYYY-MM-DD` date argument.
fn parse_date(value: &str) -> Result<chrono::NaiveDate, String> {
    chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

/// Asks for confirmation unless `yes` is set.
fn confirm(prompt: &str, yes: bool) -> anyhow::Result<bool> {
    if yes {
        return Ok(true);
    }
    Ok(dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()?)
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use test_case::test_case;

    use super::*;

    #[test_case("2024-13-01"; "month out of range")]
    #[test_case("01/02/2024"; "wrong separator")]
    #[test_case(""; "empty")]
    fn rejects_bad_dates(value: &str) {
        assert!(parse_date(value).is_err());
    }

    #[test]
    fn parses_iso_dates() {
        assert_eq!(
            parse_date("2024-02-29").unwrap(),
            chrono::NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
    }

    #[test]
    fn no_subcommand_is_accepted() {
        let cli = Cli::try_parse_from(["kyc"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.output, OutputFormat::Table);
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = Cli::try_parse_from(["kyc", "clients", "list", "--output", "json", "-vv"]).unwrap();
        assert_eq!(cli.output, OutputFormat::Json);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn command_tree_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
