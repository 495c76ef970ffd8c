//! Bin Collector - serve the next waste collection dates for an address
//!
//! Starts the background refresh loop and the HTTP server. Both share one
//! in-memory cache cell.

use std::sync::Arc;

use clap::{error::ErrorKind, CommandFactory, Parser};
use tracing::info;
use tracing_subscriber::EnvFilter;

use bin_collector::cache::CacheCell;
use bin_collector::cli::{Cli, ServiceConfig};
use bin_collector::data::ScheduleClient;
use bin_collector::refresh::Refresher;
use bin_collector::server::{self, shutdown_signal, AppState, TemplateRenderer};

/// Sets up the global tracing subscriber, honouring `RUST_LOG` when set
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,bin_collector=info,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let cli = Cli::parse();
    let config = match ServiceConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(err) => Cli::command().error(ErrorKind::ValueValidation, err).exit(),
    };

    let client = ScheduleClient::with_base_url(
        config.upstream_url.clone(),
        config.address.clone(),
        config.request_timeout,
    )?
    .with_selection(config.selection);
    info!(address = client.address(), upstream = %config.upstream_url, "starting schedule refresh");

    let cell = Arc::new(CacheCell::new());
    let refresh = Refresher::new(client, cell.clone(), config.refresh.clone()).spawn();

    let renderer = TemplateRenderer::new(&config.template);
    info!(template = %renderer.path().display(), static_dir = %config.static_dir.display(), "serving views");
    let app = server::router(AppState::new(cell, renderer), &config.static_dir);

    // Failing to bind is the one fatal error.
    let listener = tokio::net::TcpListener::bind(config.listen).await?;
    info!("Server running on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    refresh.shutdown().await;
    Ok(())
}
