//! table-sync CLI - copy one table between databases over ODBC.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use table_sync::{CopyEngine, OdbcConnector, ProgressEvent, SyncConfig, SyncError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "table-sync")]
#[command(about = "Copy a table between databases over ODBC")]
#[command(version)]
struct Cli {
    /// Path to settings file (.properties, or .yaml/.yml)
    #[arg(short, long, default_value = "sync.properties")]
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

    /// Print progress updates as JSON lines to stderr instead of text lines
    #[arg(long)]
    progress: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy every row of the source table into the target table
    Run {
        /// Override source.table
        #[arg(long)]
        source_table: Option<String>,

        /// Override target.table
        #[arg(long)]
        target_table: Option<String>,

        /// Override batch.size (rows per prefetch and per reconnect)
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Test database connections
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), SyncError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let mut config = SyncConfig::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Run {
            source_table,
            target_table,
            batch_size,
        } => {
            if let Some(table) = source_table {
                config.source.table = table;
            }
            if let Some(table) = target_table {
                config.target.table = table;
            }
            if let Some(size) = batch_size {
                config.batch_size = size;
            }
            config.validate()?;
            config.log_settings();

            let cancel_token = setup_signal_handler();
            let report = run_sync(config, cancel_token, cli.progress).await?;

            if cli.output_json {
                println!("{}", report.to_json()?);
            } else {
                println!("\nSynchronization completed!");
                println!("  Source: {}", report.source_table);
                println!("  Target: {}", report.target_table);
                println!("  Rows: {} (estimated {})", report.rows_copied, report.total_estimate);
                println!("  Reconnects: {}", report.cycles);
                println!("  Duration: {:.2}s", report.duration_seconds);
                println!("  Throughput: {} rows/sec", report.rows_per_second);
            }
        }

        Commands::HealthCheck => {
            let source = OdbcConnector::new("source", &config.source)?;
            let target = OdbcConnector::new("target", &config.target)?;

            let results = tokio::task::spawn_blocking(move || {
                (source.health_check(), target.health_check())
            })
            .await
            .map_err(|e| SyncError::Io(std::io::Error::other(e)))?;

            let healthy = results.0.is_ok() && results.1.is_ok();

            if cli.output_json {
                let json = serde_json::json!({
                    "source_connected": results.0.is_ok(),
                    "source_latency_ms": results.0.as_ref().ok(),
                    "source_error": results.0.as_ref().err().map(|e| e.to_string()),
                    "target_connected": results.1.is_ok(),
                    "target_latency_ms": results.1.as_ref().ok(),
                    "target_error": results.1.as_ref().err().map(|e| e.to_string()),
                    "healthy": healthy,
                });
                println!("{}", serde_json::to_string_pretty(&json)?);
            } else {
                println!("Health Check Results:");
                for (label, result) in [("Source", &results.0), ("Target", &results.1)] {
                    match result {
                        Ok(ms) => println!("  {}: OK ({}ms)", label, ms),
                        Err(e) => println!("  {}: FAILED\n    Error: {}", label, e),
                    }
                }
                println!(
                    "\n  Overall: {}",
                    if healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            // Report the first failure with its own exit code
            results.0?;
            results.1?;
        }
    }

    Ok(())
}

/// Run the blocking copy engine off the async runtime while rendering progress.
async fn run_sync(
    config: SyncConfig,
    cancel_token: CancellationToken,
    json_progress: bool,
) -> Result<table_sync::SyncReport, SyncError> {
    let source = OdbcConnector::new("source", &config.source)?;
    let target = OdbcConnector::new("target", &config.target)?;
    let (tx, mut rx) = mpsc::unbounded_channel::<ProgressEvent>();

    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if json_progress {
                if let Ok(line) = serde_json::to_string(&event) {
                    eprintln!("{}", line);
                }
            } else if matches!(event, ProgressEvent::Inserted { .. }) {
                println!("{}", event.to_line());
            }
        }
    });

    let source_table = config.source.table.clone();
    let target_table = config.target.table.clone();
    let batch_size = config.batch_size;

    let result = tokio::task::spawn_blocking(move || {
        let mut engine = CopyEngine::new(source, target, batch_size)
            .with_cancellation(cancel_token)
            .with_progress(tx);
        engine.synchronize(&source_table, &target_table)
    })
    .await
    .map_err(|e| SyncError::Io(std::io::Error::other(e)))?;

    // The engine (and its sender) is gone, so the printer drains and exits
    let _ = printer.await;
    result
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Setup signal handlers for graceful shutdown (SIGINT and SIGTERM).
/// Returns a CancellationToken that will be cancelled when a signal is received.
#[cfg(unix)]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();

    for (kind, label) in [
        (SignalKind::interrupt(), "SIGINT"),
        (SignalKind::terminate(), "SIGTERM"),
    ] {
        let token = cancel_token.clone();
        tokio::spawn(async move {
            let Ok(mut stream) = signal(kind) else {
                tracing::warn!("Failed to install {} handler", label);
                return;
            };
            stream.recv().await;
            eprintln!("\nReceived {}. Stopping after the current row...", label);
            token.cancel();
        });
    }

    cancel_token
}

/// Setup signal handler for Windows (only Ctrl-C)
#[cfg(not(unix))]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Stopping after the current row...");
            token.cancel();
        }
    });

    cancel_token
}
