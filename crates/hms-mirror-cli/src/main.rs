//! hms-mirror CLI - Hive metastore migration planning.

use clap::{Parser, Subcommand};
use hms_mirror::{
    Config, MetastoreClient, MirrorError, Orchestrator, RunState, RunStatus, SnapshotClient,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "hms-mirror")]
#[command(about = "Hive metastore migration planning and orchestration")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "default.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan (and optionally apply) a migration
    Run {
        /// Metastore snapshot to read LEFT and RIGHT metadata from
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Apply the planned statements instead of a dry run
        #[arg(long)]
        execute: bool,

        /// Override the number of table workers
        #[arg(long)]
        concurrency: Option<usize>,

        /// Override the report and distcp output directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Check the configuration without touching any cluster
    Validate,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, MirrorError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format).map_err(MirrorError::Config)?;

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Validate => {
            if config.databases.is_empty() {
                return Err(MirrorError::NoDatabases);
            }
            let warnings = config.warnings();
            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&warnings)?);
            } else {
                println!("Configuration is valid ({})", config.data_strategy);
                for message in warnings.messages() {
                    println!("  Warning: {}", message);
                }
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Run {
            snapshot,
            execute,
            concurrency,
            output_dir,
        } => {
            if let Some(dir) = output_dir {
                config.output_dir = Some(dir);
            }
            let dry_run = !(execute || config.execute);

            let client: Arc<dyn MetastoreClient> = Arc::new(SnapshotClient::load(&snapshot)?);
            info!("Loaded metastore snapshot from {:?}", snapshot);

            let cancel_token = setup_signal_handler().await?;
            let orchestrator = Orchestrator::new(config, client).with_cancellation(cancel_token);
            let status = orchestrator.run(dry_run, concurrency).await?;

            if cli.output_json {
                println!("{}", status.to_json()?);
            } else {
                print_summary(&status);
            }

            Ok(match status.state {
                RunState::Cancelled => ExitCode::from(MirrorError::Cancelled.exit_code()),
                RunState::Failed => ExitCode::FAILURE,
                _ => ExitCode::SUCCESS,
            })
        }
    }
}

fn print_summary(status: &RunStatus) {
    let headline = match (status.state, status.dry_run) {
        (RunState::Cancelled, _) => "Run cancelled.",
        (RunState::Failed, _) => "Run finished with failures.",
        (_, true) => "Dry run completed!",
        (_, false) => "Migration completed!",
    };
    println!("\n{}", headline);
    println!("  Run ID: {}", status.run_id);
    println!("  Strategy: {}", status.data_strategy);
    println!("  Duration: {:.2}s", status.duration_seconds());
    println!(
        "  Tables: {}/{} ({} failed, {} skipped)",
        status.tables_success, status.tables_total, status.tables_failed, status.tables_skipped
    );
    for database in &status.databases {
        if let Some(report) = &database.report {
            println!("  Report: {}", report);
        }
    }
    for file in &status.distcp_files {
        println!("  Distcp: {}", file);
    }
    for message in status.errors.messages() {
        println!("  Error: {}", message);
    }
    for message in status.warnings.messages() {
        println!("  Warning: {}", message);
    }
    println!("  Return code: {}", status.return_code());
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        "json" => subscriber.json().init(),
        "text" => subscriber.init(),
        other => return Err(format!("unknown log format '{}'", other)),
    }

    Ok(())
}

/// Setup signal handlers for graceful shutdown.
/// Handles both SIGINT (Ctrl-C) and SIGTERM.
/// Returns a CancellationToken that will be cancelled when a signal is received.
#[cfg(unix)]
async fn setup_signal_handler() -> Result<CancellationToken, MirrorError> {
    let cancel_token = CancellationToken::new();

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => eprintln!("\nReceived SIGINT. Cancelling remaining tables..."),
            _ = sigterm.recv() => eprintln!("\nReceived SIGTERM. Cancelling remaining tables..."),
        }
        token.cancel();
    });

    Ok(cancel_token)
}

/// Setup signal handler for Windows (only Ctrl-C)
#[cfg(not(unix))]
async fn setup_signal_handler() -> Result<CancellationToken, MirrorError> {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Cancelling remaining tables...");
            token.cancel();
        }
    });

    Ok(cancel_token)
}
