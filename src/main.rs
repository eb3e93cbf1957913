//! Variomedia DNS Export Service
//!
//! Runs one CSV export at startup, then serves on-demand exports over HTTP.
//!
//! # Usage
//! ```bash
//! # Export once and exit
//! variomedia-export --api-token $TOKEN --export-path ./exports --once
//!
//! # Export at startup, then serve GET /api/export/variomedia
//! variomedia-export --api-token $TOKEN --listen 0.0.0.0:8080
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::Notify;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use variomedia_export::server::{router, AppState};
use variomedia_export::startup::run_startup_export;
use variomedia_export::{Cli, VariomediaApi, VariomediaClient};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.json_logs)?;

    info!("🚀 Variomedia export service starting...");

    let interrupt = Arc::new(Notify::new());
    let settings = cli
        .export_settings()
        .context("Invalid export configuration")?
        .with_interrupt(Arc::clone(&interrupt));
    let api_settings = cli.api_settings();

    let client = VariomediaClient::new(
        api_settings.base_url,
        api_settings.token,
        api_settings.timeout,
    )
    .context("Failed to build Variomedia API client")?;
    let api: Arc<dyn VariomediaApi> = Arc::new(client);

    if !cli.skip_startup_export {
        let outcome = tokio::select! {
            outcome = run_startup_export(api.as_ref(), &settings) => outcome,
            () = shutdown_signal() => {
                warn!("Startup export aborted");
                return Ok(());
            }
        };

        if let Err(e) = outcome {
            if cli.once {
                return Err(e).context("Startup export failed");
            }
            error!(error = %e, "Continuing without startup export");
        }
    }

    if cli.once {
        info!("✅ Done");
        return Ok(());
    }

    let app = router(AppState::new(api, settings));

    let listener = tokio::net::TcpListener::bind(cli.listen)
        .await
        .with_context(|| format!("Failed to bind {}", cli.listen))?;
    info!("📡 Listening on {}", cli.listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Wakes exports currently pausing between customers.
            interrupt.notify_waiters();
        })
        .await?;

    info!("Server stopped");
    Ok(())
}

fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
