use lightship::builder::ImageBuilder;
use lightship::config::Config;
use lightship::orchestrator::Orchestrator;
use lightship::server::Gateway;
use lightship::{PKG_NAME, VERSION};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("lightship=debug".parse().expect("valid log directive")),
        )
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path.display(), error = %e, "Failed to load configuration");
        e
    })?;

    info!(
        name = PKG_NAME,
        version = VERSION,
        path = %config_path.display(),
        "Starting gateway"
    );
    info!(
        bind = %config.server.bind,
        port = config.server.port,
        stop_grace_secs = config.engine.stop_grace_secs,
        readiness_attempts = config.readiness.attempts,
        readiness_interval_ms = config.readiness.interval_ms,
        readiness_policy = ?config.readiness.policy,
        "Configuration loaded"
    );

    let bind_addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address: {}", e))?;

    // Connect to the container engine before accepting any traffic
    let orchestrator = Arc::new(
        Orchestrator::new(&config.engine, config.readiness.clone())
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to connect to container engine");
                e
            })?,
    );

    let builder = Arc::new(ImageBuilder::new().await.map_err(|e| {
        error!(error = %e, "Failed to locate Docker CLI");
        e
    })?);

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let gateway = Arc::new(Gateway::new(bind_addr, orchestrator, builder, shutdown_rx));
    let gateway_handle = tokio::spawn(async move {
        if let Err(e) = gateway.run().await {
            error!(error = %e, "Gateway server error");
        }
    });

    // Wait for shutdown signal (Ctrl+C or SIGTERM)
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT (Ctrl+C), shutting down...");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for Ctrl+C");
        info!("Received Ctrl+C, shutting down...");
    }

    // Signal shutdown and give the accept loop a moment to drain
    let _ = shutdown_tx.send(true);
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), gateway_handle).await;

    info!("Shutdown complete");
    Ok(())
}
