//! Quarry Server Binary
//!
//! Opens the document and index stores, rebuilds the secondary index from
//! stored documents, then serves the document API over HTTP.
//!
//! @version 0.1.0
//! @author Quarry Development Team

use clap::Parser;
use quarry_common::{QuarryConfig, Result};
use quarry_server::{create_router, AppState};
use std::path::PathBuf;
use tokio::signal;

#[derive(Parser)]
#[command(name = "quarry-server")]
#[command(about = "Quarry Document Store Server")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind to
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Data directory for the document and index logs
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Serve immediately without rebuilding the index
    #[arg(long)]
    skip_reindex: bool,
}

impl Args {
    /// Load the configuration file, if any, and apply command line overrides.
    fn into_config(self) -> Result<QuarryConfig> {
        let mut config = match &self.config {
            Some(path) => QuarryConfig::from_file(path)?,
            None => QuarryConfig::default(),
        };

        if let Some(host) = self.host {
            config.network.host = host;
        }
        if let Some(port) = self.port {
            config.network.port = port;
        }
        if let Some(dir) = self.data_dir {
            config.storage.data_directory = Some(dir);
        }
        if self.skip_reindex {
            config.index.reindex_on_startup = false;
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run(Args::parse()).await {
        tracing::error!("Quarry Server failed: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let config = args.into_config()?;
    let addr = config.network.bind_address();

    match &config.storage.data_directory {
        Some(dir) => tracing::info!("Persistence enabled, data directory: {:?}", dir),
        None => tracing::warn!(
            "No data directory specified, running in-memory only (data will be lost on restart)"
        ),
    }

    let state = AppState::open(config)?;

    if state.config.index.reindex_on_startup {
        let report = state.engine.reindex().await?;
        tracing::info!(
            "Start-up re-index complete: {} documents indexed, {} skipped",
            report.documents,
            report.skipped
        );
    } else {
        tracing::info!("Start-up re-index disabled");
    }

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Quarry Server listening on http://{}", addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Quarry Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
