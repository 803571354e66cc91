//! Storefront Indexer Main Entry Point
//!
//! Operator CLI for the storefront search indices: index lifecycle commands and
//! document imports from the commerce backend and the headless CMS.

use std::env;
use std::process::ExitCode;

use clap::Parser;
use dotenv::dotenv;
use storefront_indexer::cli::Cli;
use storefront_indexer::{commands, AppConfig, Dependencies, IndexingError};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging.
fn init_tracing() -> Result<(), IndexingError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(
            "storefront_indexer=info,storefront_indexer_repository=info,storefront_sources=info",
        )
    });

    let json = env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .try_init()
            .map_err(|e| IndexingError::config(format!("Failed to initialize tracing: {}", e)))?;

        info!(
            service_name = "storefront-indexer",
            service_version = env!("CARGO_PKG_VERSION"),
            "Tracing initialized with JSON format"
        );
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true).pretty())
            .try_init()
            .map_err(|e| IndexingError::config(format!("Failed to initialize tracing: {}", e)))?;
    }

    Ok(())
}

async fn run(cli: Cli, cancel: CancellationToken) -> Result<(), IndexingError> {
    let config = AppConfig::from_env()?;
    let deps = Dependencies::new(config, cancel).await?;
    info!("Dependencies initialized successfully");
    commands::run(cli.command, &deps).await
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables from .env file
    dotenv().ok();

    let cli = Cli::parse();

    if let Err(e) = init_tracing() {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received shutdown signal, cancelling");
            on_signal.cancel();
        }
    });

    match run(cli, cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            ExitCode::from(e.exit_code())
        }
    }
}
