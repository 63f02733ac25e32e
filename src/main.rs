//! OSO Database Backup Kubernetes Operator
//!
//! Main entry point for the operator. Sets up the Kubernetes client,
//! registers the backup controller and the discovery loop, and runs until a
//! shutdown signal arrives.

use std::sync::Arc;

use kube::Client;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use database_backup_operator::{
    adapters::HttpClientFactory,
    controllers,
    metrics,
    reconcilers::backup::BackupHandler,
};

/// Default metrics port
const METRICS_PORT: u16 = 8080;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    info!("Starting OSO Database Backup Operator");

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes API server");

    let namespace = std::env::var("WATCH_NAMESPACE")
        .unwrap_or_else(|_| client.default_namespace().to_string());
    info!(namespace = %namespace, "Watching namespace");

    // Shared reconciliation handler
    let handler = Arc::new(BackupHandler::new(
        client.clone(),
        Arc::new(HttpClientFactory::new()),
        namespace,
    ));

    // Start metrics server
    let metrics_handle = tokio::spawn(metrics::serve(METRICS_PORT));
    info!("Metrics server starting on port {}", METRICS_PORT);

    // Out-of-band discovery loop, stopped between ticks on shutdown
    let shutdown = CancellationToken::new();
    let refresher = tokio::spawn(handler.clone().run_refresh_loop(shutdown.clone()));

    // Backup controller
    let backup_controller = controllers::run_backup_controller(client.clone(), handler);

    // Handle graceful shutdown
    tokio::select! {
        _ = backup_controller => {
            error!("Backup controller exited unexpectedly");
        }
        _ = refresher => {
            error!("Refresh loop exited unexpectedly");
        }
        _ = metrics_handle => {
            error!("Metrics server exited unexpectedly");
        }
        _ = shutdown_signal() => {
            info!("Received shutdown signal, stopping operator");
        }
    }

    shutdown.cancel();
    info!("OSO Database Backup Operator stopped");
    Ok(())
}

/// Initialize tracing subscriber
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,kube=warn,hyper=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received CTRL+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
