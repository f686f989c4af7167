//! SNS Endpoint Web Server - verified receiver for SNS HTTP(S) deliveries.
//!
//! This binary:
//! - Serves the SNS endpoint at `SNS_ENDPOINT_PATH` (default `/sns`)
//! - Verifies every delivery's signature against its signing certificate
//! - Confirms subscriptions and logs notifications
//!
//! Configuration is read from environment variables, see `Config::from_env`.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sns_endpoint::web::router;
use sns_endpoint::{AppState, Config, LoggingHandler, SnsEndpoint};

#[tokio::main]
async fn main() -> Result<()> {
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
        endpoint_path = %config.endpoint_path,
        topic_allowlist = ?config.topic_allowlist,
        cert_domain_pattern = %config.cert_domain_pattern,
        subscribe_domain_pattern = %config.subscribe_domain_pattern,
        verify_signature = config.verify_signature,
        account_restriction = ?config.account_restriction,
        allowed_message_types = ?config.allowed_message_types,
        request_timeout_ms = config.request_timeout_ms,
        cert_cache_capacity = config.cert_cache_capacity,
        "config_loaded"
    );

    let endpoint = SnsEndpoint::from_config(&config, Arc::new(LoggingHandler))
        .context("Invalid endpoint configuration")?;

    // Build the router
    let app = router(AppState::new(endpoint), &config.endpoint_path)
        .layer(TraceLayer::new_for_http());

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
