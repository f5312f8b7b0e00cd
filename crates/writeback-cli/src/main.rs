//! Writeback CLI - write-back performance test for accounting record stores

mod console;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info};
use writeback_core::config::Config;
use writeback_core::error::Error;
use writeback_core::report::{Prompter, Reporter};
use writeback_core::store::{FixtureStore, HttpRecordStore, RecordStore};

use console::{ConsolePrompter, ConsoleReporter};

#[derive(Parser)]
#[command(name = "writeback")]
#[command(author, version, about = "Measure record write-back latency", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the interactive write-back test (default)
    Run(RunArgs),

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args, Clone, Default)]
struct RunArgs {
    /// Record store server name (prompted when omitted)
    #[arg(short, long)]
    server: Option<String>,

    /// Use a JSON fixture instead of a live server
    #[arg(short, long, value_name = "PATH")]
    fixture: Option<PathBuf>,

    /// Exit without waiting for Enter
    #[arg(long)]
    no_pause: bool,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show config file path
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Credential may come from a .env file next to the binary's working dir
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("writeback_core=warn".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run(cli.run)) {
        Commands::Run(args) => cmd_run(args).await,
        Commands::Config { action } => {
            cmd_config(action)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn cmd_run(args: RunArgs) -> anyhow::Result<ExitCode> {
    let config = Config::load()?;
    let credential = config.session.resolved_application_identifier()?;

    let reporter = ConsoleReporter::new();
    let mut prompter = ConsolePrompter::new()?;

    println!("Write-back performance test");

    let outcome = match open_store(&config, &args, &mut prompter) {
        Ok(store) => {
            writeback_core::run(store, credential, &config.workflow, &mut prompter, &reporter)
                .await
        }
        Err(e) => Err(e),
    };

    let code = match outcome {
        Ok(summary) => {
            info!(
                company = %summary.company.name,
                record = %summary.record_id,
                elapsed_ms = summary.measurement.elapsed_ms(),
                "run completed"
            );
            reporter.success("Completed");
            ExitCode::SUCCESS
        }
        Err(e) => {
            debug!(code = e.code(), "run failed");
            reporter.error(&e.to_string());
            if let Some(suggestion) = e.suggestion() {
                reporter.info(&format!("Hint: {}", suggestion));
            }
            ExitCode::FAILURE
        }
    };

    if !args.no_pause && prompter.is_interactive() {
        prompter.acknowledge();
    }
    Ok(code)
}

/// Pick the store backend; a live server is prompted for when not given
fn open_store(
    config: &Config,
    args: &RunArgs,
    prompter: &mut dyn Prompter,
) -> Result<Arc<dyn RecordStore>, Error> {
    if let Some(path) = &args.fixture {
        info!(fixture = %path.display(), "using fixture store");
        return Ok(Arc::new(FixtureStore::from_file(path)?));
    }

    let server = match &args.server {
        Some(server) => server.clone(),
        None => prompter.ask("Enter server name:")?,
    };
    let store = HttpRecordStore::new(&config.store, &server)?;
    info!(url = store.base_url(), "using record store gateway");
    Ok(Arc::new(store))
}

fn cmd_config(action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            println!("Set {} = {}", key, value);
        }
        ConfigAction::List => {
            let config = Config::load()?;
            for (key, value) in config.list()? {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            println!("Configuration reset to defaults.");
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}
