//! Facebook Data Deletion Callback server.
//!
//! This binary:
//! - Receives Facebook data deletion callbacks
//! - Verifies the signed request
//! - Answers with a confirmation code and status URL immediately
//! - Deletes the user's data and writes an audit record in the background
//!
//! On shutdown the deletion queue is drained before the process exits.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use url::Url;

use fbdeletion::{
    router, run_worker, AppState, Config, DeletionDispatcher, DeletionQueue, FirestoreStore,
    MemoryStore, SharedStore, StoreBackend,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Missing .env is fine, real deployments set the environment directly
    dotenvy::dotenv().ok();

    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("web_server_starting");

    // Load configuration
    let config = Config::from_env();
    info!(
        port = config.port,
        base_url = %config.base_url,
        store_backend = ?config.store_backend,
        app_secret_configured = config.app_secret.is_some(),
        service_account_configured = config.google_application_credentials.is_some(),
        deletion_concurrency = config.deletion_concurrency,
        "config_loaded"
    );

    let app_secret = config
        .app_secret
        .clone()
        .context("APP_SECRET must be set")?;
    let base_url = Url::parse(&config.base_url).context("BASE_URL is not a valid URL")?;

    let store: SharedStore = match config.store_backend {
        StoreBackend::Firestore => Arc::new(
            FirestoreStore::from_config(&config).context("Failed to create Firestore client")?,
        ),
        StoreBackend::Memory => {
            warn!("memory_store_in_use");
            Arc::new(MemoryStore::new())
        }
    };

    let dispatcher = DeletionDispatcher::new(
        store,
        config.users_collection.clone(),
        config.deletion_logs_collection.clone(),
    );

    // Start the background deletion worker
    let (queue, receiver) = DeletionQueue::new();
    let worker = tokio::spawn(run_worker(
        receiver,
        dispatcher.clone(),
        config.deletion_concurrency,
    ));

    // Build the router
    let state = AppState::new(&app_secret, base_url, dispatcher, queue);
    let app = router(state);

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // The router owned the last queue handle, so the worker now drains and exits
    worker.await.context("Deletion worker failed")?;

    info!("web_server_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
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
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("web_server_shutting_down");
}
