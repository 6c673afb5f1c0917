//! Favicon Server - serves a single icon with ETag cache validation

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;

use config::Config;
use favicon_api::{AppState, create_router};
use favicon_core::ConditionalResponder;

/// Favicon Server - serves a single icon with correct cache validation
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// Bind address
    #[arg(long, env = "FAVICON_BIND")]
    bind: Option<String>,

    /// Port
    #[arg(short, long, env = "FAVICON_PORT")]
    port: Option<u16>,

    /// Icon file to serve
    #[arg(long, env = "FAVICON_ICON")]
    icon: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(&args.config)?;
    if let Some(icon) = args.icon {
        config.icon.path = icon;
    }

    init_logging(&config.logging.level, &config.logging.format);

    info!("Starting Favicon Server v{}", env!("CARGO_PKG_VERSION"));

    // Fail before binding if the icon path is unusable
    let responder = ConditionalResponder::from_path(&config.icon.path, config.icon.options())
        .with_context(|| format!("Invalid icon path: {}", config.icon.path))?;

    let metrics_handle = if config.metrics.enabled {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("Failed to install Prometheus recorder")?;
        Some(Arc::new(handle))
    } else {
        None
    };

    let state = AppState::new(Arc::new(responder));
    let app = create_router(state, metrics_handle).layer(TraceLayer::new_for_http());

    let bind_addr = args.bind.unwrap_or(config.server.bind_address);
    let port = args.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", bind_addr, port).parse()?;

    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Initialize logging
fn init_logging(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    if format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
