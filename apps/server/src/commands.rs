//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use dossier_core::Orchestrator;
use dossier_shared::{
    AppConfig, AuditEvent, AuditEventKind, AuditSink, SubjectQuery, init_config, load_config,
    resolve_api_key,
};
use dossier_sources::{DorkSearchAdapter, SanctionsAdapter, SourceAdapter};
use dossier_storage::Storage;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::routes::{self, AppState};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Dossier: subject intake and screening.
#[derive(Parser)]
#[command(
    name = "dossier",
    version,
    about = "Screen a person against sanctions lists and the open web, with a full audit trail.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Serve the HTTP intake endpoint.
    Serve {
        /// Address to listen on (overrides `server.bind`).
        #[arg(long)]
        bind: Option<String>,

        /// Database path (overrides `storage.db_path`).
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Run one lookup from the command line and print the report as JSON.
    Lookup {
        /// Given name of the subject.
        #[arg(long)]
        given: String,

        /// Family name of the subject.
        #[arg(long)]
        family: String,

        /// Database path (overrides `storage.db_path`).
        #[arg(long)]
        db: Option<PathBuf>,
    },

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

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "dossier=info",
        1 => "dossier=debug",
        _ => "dossier=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    // Logs go to stderr so `lookup` output stays parseable.
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

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Serve { bind, db } => cmd_serve(bind, db).await,
        Command::Lookup { given, family, db } => cmd_lookup(&given, &family, db).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

/// Build the configured adapters, in execution order.
fn build_adapters(config: &AppConfig) -> Result<Vec<Arc<dyn SourceAdapter>>> {
    let api_key = resolve_api_key(config.sanctions.api_key_env.as_deref())?;
    let sanctions = SanctionsAdapter::new(&config.sanctions, api_key)?;
    let dork = DorkSearchAdapter::from_config(&config.dork_search)?;
    let adapters: Vec<Arc<dyn SourceAdapter>> = vec![Arc::new(sanctions), Arc::new(dork)];
    Ok(adapters)
}

fn resolve_db_path(config: &AppConfig, db: Option<PathBuf>) -> PathBuf {
    db.unwrap_or_else(|| PathBuf::from(&config.storage.db_path))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_serve(bind: Option<String>, db: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let bind = bind.unwrap_or_else(|| config.server.bind.clone());
    let db_path = resolve_db_path(&config, db);

    let storage = Arc::new(Storage::open(&db_path).await?);
    let orchestrator = Arc::new(Orchestrator::new(
        build_adapters(&config)?,
        storage.clone(),
        storage.clone(),
    ));
    let app = routes::router(AppState {
        orchestrator,
        audit: storage,
    });

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .map_err(|e| eyre!("failed to bind to {bind}: {e}"))?;

    info!(%bind, db = %db_path.display(), "intake endpoint listening");
    println!("Listening on http://{bind}/process_osint_data");

    axum::serve(listener, app)
        .await
        .map_err(|e| eyre!("server error: {e}"))?;
    Ok(())
}

async fn cmd_lookup(given: &str, family: &str, db: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let db_path = resolve_db_path(&config, db);
    let storage = Arc::new(Storage::open(&db_path).await?);

    let subject = SubjectQuery::new(given, family);
    let identifier = subject.identifier();
    let request = serde_json::json!({ "given_name": given, "family_name": family });

    storage
        .record(
            AuditEvent::new(AuditEventKind::RequestReceived, &identifier)
                .source_module("cli")
                .query_details(request.clone()),
        )
        .await;

    if let Err(e) = subject.validate() {
        storage
            .record(
                AuditEvent::new(AuditEventKind::InputError, &identifier)
                    .source_module("cli")
                    .query_details(request)
                    .notes(e.to_string()),
            )
            .await;
        return Err(e.into());
    }

    info!(subject = %identifier, db = %db_path.display(), "running lookup");

    let progress = Arc::new(ProgressAudit::new(storage.clone()));
    let orchestrator = Orchestrator::new(build_adapters(&config)?, progress.clone(), storage);
    let report = orchestrator.run(&subject).await;
    progress.finish();
    let report = report?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Audit sink that mirrors pipeline steps onto an indicatif spinner before
/// forwarding them to the real sink.
struct ProgressAudit {
    inner: Arc<dyn AuditSink>,
    spinner: ProgressBar,
}

impl ProgressAudit {
    fn new(inner: Arc<dyn AuditSink>) -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { inner, spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

/// Spinner text for one audit event.
fn progress_message(event: &AuditEvent) -> String {
    let source = event.source_module.as_deref().unwrap_or("pipeline");
    match event.kind {
        AuditEventKind::ProcessingStarted => format!("Looking up {}", event.subject),
        AuditEventKind::AdapterStarted => format!("Querying {source}"),
        AuditEventKind::AdapterCompleted
        | AuditEventKind::AdapterEmptyResult
        | AuditEventKind::AdapterError => format!(
            "{source}: {}",
            event.result_summary.as_deref().unwrap_or("done")
        ),
        AuditEventKind::ResponseSent => "Done".to_string(),
        other => other.to_string(),
    }
}

#[async_trait]
impl AuditSink for ProgressAudit {
    async fn record(&self, event: AuditEvent) {
        self.spinner.set_message(progress_message(&event));
        self.inner.record(event).await;
    }
}
