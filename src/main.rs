use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};

use wannabe_proxy::{AppState, Config, HttpUpstream, build_router, utils};

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env once, before logging reads RUST_LOG/LOG_FORMAT and before
    // Config::from_env reads the rest
    let _ = dotenvy::dotenv();
    utils::init_tracing();

    info!("Starting Wannabe Proxy v{}", env!("CARGO_PKG_VERSION"));

    match run().await {
        Ok(()) => ExitCode::from(exitcode::OK as u8),
        Err(exit_code) => ExitCode::from(exit_code as u8),
    }
}

/// Run the application, returning an exit code on error.
async fn run() -> Result<(), exitcode::ExitCode> {
    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Configuration error: {e}");
        exitcode::CONFIG
    })?;
    info!(
        host = %config.host,
        port = %config.port,
        synth_range = %format!("{}/{}", config.synth_base_address, config.synth_mask_bits),
        upstream_timeout = ?config.upstream_timeout(),
        log_format = %config.log_format,
        "Configuration loaded"
    );

    // Outbound client
    let upstream = HttpUpstream::new(config.upstream_connect_timeout).map_err(|e| {
        error!("Failed to initialise upstream client: {e}");
        exitcode::SOFTWARE
    })?;

    // Build application state and router
    let addr: SocketAddr = config.server_addr().parse().map_err(|e| {
        error!("Invalid server address: {e}");
        exitcode::CONFIG
    })?;
    let state = AppState::new(config, Arc::new(upstream)).map_err(|e| {
        error!("Failed to build application state: {e}");
        exitcode::CONFIG
    })?;
    let app = build_router(state);

    // Start server
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind to {addr}: {e}");
        exitcode::UNAVAILABLE
    })?;

    info!("Proxy listening on http://{addr}");
    info!("Forwarding any method on any path to the WannabeURL target");

    axum::serve(listener, app)
        .with_graceful_shutdown(utils::shutdown_signal())
        .await
        .map_err(|e| {
            error!("Server error: {e}");
            exitcode::SOFTWARE
        })?;

    info!("Server shutdown complete");
    Ok(())
}
