//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use memsync_core::{
    Classifier, KeywordTables, ProgressReporter, SyncConfig, SyncOrchestrator, SyncReport,
};
use memsync_notion::NotionClient;
use memsync_shared::{
    AppConfig, SyncAction, expand_tilde, init_config, load_config, load_config_from,
    read_api_key, resolve_database_id,
};
use memsync_storage::{FileSyncLog, Storage};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// memsync: mirror Markdown memory entries into a Notion database.
#[derive(Parser)]
#[command(
    name = "memsync",
    version,
    about = "One-way sync of Markdown memory files into a Notion database.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Compute and log every decision without writing to Notion or the sync state.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Only sync daily files dated on or after this day (YYYY-MM-DD).
    #[arg(long, value_parser = parse_since, global = true)]
    pub since: Option<NaiveDate>,

    /// Process at most this many entries.
    #[arg(long, global = true)]
    pub limit: Option<usize>,

    /// Workspace root (overrides `[workspace].root`).
    #[arg(long, env = "MEMSYNC_WORKSPACE", global = true)]
    pub workspace: Option<PathBuf>,

    /// Config file (defaults to ~/.memsync/memsync.toml).
    #[arg(long, env = "MEMSYNC_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands. Without one, memsync runs a sync.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Sync memory entries (the default).
    Sync,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

fn parse_since(value: &str) -> std::result::Result<NaiveDate, String> {
    memsync_discovery::parse_date(value).map_err(|e| e.to_string())
}

// ---------------------------------------------------------------------------
// Outcome and exit codes
// ---------------------------------------------------------------------------

/// How a command finished when it did not hit a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunOutcome {
    Success,
    CompletedWithFailures,
}

/// Process status for startup failures (bad config, missing credential, unreadable files).
const FATAL_STATUS: u8 = 2;

impl RunOutcome {
    fn status(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::CompletedWithFailures => 1,
        }
    }

    pub(crate) fn exit_code(self) -> ExitCode {
        ExitCode::from(self.status())
    }
}

pub(crate) fn fatal_exit() -> ExitCode {
    ExitCode::from(FATAL_STATUS)
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(cli.verbose)));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

fn default_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "memsync=info",
        1 => "memsync=debug",
        _ => "memsync=trace",
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<RunOutcome> {
    match &cli.command {
        None | Some(Command::Sync) => cmd_sync(&cli).await,
        Some(Command::Config { action }) => {
            match action {
                ConfigAction::Init => cmd_config_init(&cli)?,
                ConfigAction::Show => cmd_config_show(&cli)?,
            }
            Ok(RunOutcome::Success)
        }
    }
}

/// Load the config file and apply CLI overrides.
fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    if let Some(root) = &cli.workspace {
        config.workspace.root = root.to_string_lossy().into_owned();
    }
    Ok(config)
}

// ---------------------------------------------------------------------------
// sync
// ---------------------------------------------------------------------------

async fn cmd_sync(cli: &Cli) -> Result<RunOutcome> {
    // --- Startup: everything here is fatal on error ---
    let config = resolve_config(cli)?;

    let key_path = expand_tilde(&config.notion.api_key_path)?;
    let api_key = read_api_key(&key_path)?;
    let database_id = resolve_database_id(
        &config,
        std::env::var(&config.notion.database_id_env).ok(),
    )?;

    let paths = config.workspace.paths()?;
    let from = memsync_discovery::window_start(
        cli.since,
        Local::now().date_naive(),
        config.workspace.lookback_days,
    );
    let files = memsync_discovery::discover(&paths, from)?;

    let store = Storage::open(&paths.state_db)
        .await
        .wrap_err_with(|| format!("opening sync state at {}", paths.state_db.display()))?;
    let log = FileSyncLog::new(&paths.sync_log);
    let remote = NotionClient::new(&api_key, database_id, &config.notion)?;

    info!(
        workspace = %paths.root.display(),
        files = files.len(),
        from = %from,
        dry_run = cli.dry_run,
        limit = ?cli.limit,
        "starting sync"
    );

    // --- Run ---
    let sync_config = SyncConfig {
        dry_run: cli.dry_run,
        limit: cli.limit,
        limits: config.limits.clone(),
    };
    let classifier = Classifier::new(
        KeywordTables::from_config(&config.classifier),
        &config.limits,
    );
    let orchestrator = SyncOrchestrator::new(sync_config, classifier, &remote, &store, &log);

    let reporter = CliProgress::new();
    let report = orchestrator
        .sync_files(&files, &config.parser, &reporter)
        .await?;

    print_summary(&report, &paths.sync_log);

    Ok(if report.summary.has_failures() {
        RunOutcome::CompletedWithFailures
    } else {
        RunOutcome::Success
    })
}

fn print_summary(report: &SyncReport, log_path: &std::path::Path) {
    let s = &report.summary;
    println!();
    if report.dry_run {
        println!("  Dry run: nothing was written to Notion.");
    }
    println!("  Processed: {}", s.processed);
    println!("  Created:   {}", s.created);
    println!("  Updated:   {}", s.updated);
    println!("  Skipped:   {}", s.skipped);
    println!("  Failed:    {}", s.failed);
    if report.duplicates > 0 {
        println!("  Duplicates dropped: {}", report.duplicates);
    }
    println!("  Log:       {}", log_path.display());
    println!("  Time:      {:.1}s", report.elapsed.as_secs_f64());
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn entry_done(&self, title: &str, action: SyncAction, current: usize, total: usize) {
        self.spinner
            .set_message(format!("[{current}/{total}] {action} {title}"));
    }

    fn done(&self, _report: &SyncReport) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn cmd_config_init(cli: &Cli) -> Result<()> {
    let path = init_config(cli.config.as_deref())?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(cli: &Cli) -> Result<()> {
    let config = resolve_config(cli)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
