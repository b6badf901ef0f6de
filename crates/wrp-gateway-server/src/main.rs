//! WRP Gateway - REST to WRP HTTP gateway
//!
//! This is the main entry point for the gateway service.
//!
//! # Configuration
//!
//! Settings come from the YAML file named by `--config` (or
//! `WRP_GATEWAY_CONFIG`). Without a file the built-in defaults are used.
//! `WRP_GATEWAY_LISTEN_ADDR` and `WRP_GATEWAY_TARGET_URL` override the
//! file.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wrp_gateway_core::RecorderSink;
use wrp_gateway_server::{create_router, GatewayConfig, GatewayState};

const UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

/// REST to WRP gateway.
#[derive(Parser, Debug)]
#[command(name = "wrp-gateway", author, version, about)]
struct Args {
    /// Path to the YAML configuration file.
    #[arg(long, env = "WRP_GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on.
    #[arg(long, env = "WRP_GATEWAY_LISTEN_ADDR")]
    listen_addr: Option<String>,

    /// Base URL of the device cluster.
    #[arg(long, env = "WRP_GATEWAY_TARGET_URL")]
    target_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,wrp_gateway=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting WRP Gateway");

    let args = Args::parse();
    let config = GatewayConfig::load(args.config.as_deref())?
        .with_overrides(args.listen_addr, args.target_url);

    tracing::info!(
        config_file = ?args.config,
        listen_addr = %config.listen_addr,
        target_url = %config.target_url,
        supported_services = ?config.supported_services,
        "Gateway configuration loaded"
    );

    // Metrics
    let prometheus = PrometheusBuilder::new().install_recorder()?;
    let shutdown = CancellationToken::new();
    tokio::spawn(run_metrics_upkeep(prometheus.clone(), shutdown.clone()));

    let listen_addr = config.listen_addr.clone();
    let state = GatewayState::from_config(config, Arc::new(RecorderSink))?.with_metrics(prometheus);

    // Webhook pulls
    let sync_task = state
        .webhooks
        .clone()
        .map(|webhooks| tokio::spawn(webhooks.run(shutdown.clone())));

    let app = create_router(state);
    tracing::info!("Router configured with all API endpoints");

    // Start HTTP server
    tracing::info!(listen_addr = %listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    if let Some(task) = sync_task {
        task.await?;
    }
    tracing::info!("Gateway stopped");
    Ok(())
}

/// Drain histogram buckets until shutdown.
async fn run_metrics_upkeep(handle: PrometheusHandle, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(UPKEEP_INTERVAL);
    loop {
        tokio::select! {
            () = shutdown.cancelled() => return,
            _ = ticker.tick() => handle.run_upkeep(),
        }
    }
}

/// Resolve on Ctrl-C, then cancel background work.
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}
