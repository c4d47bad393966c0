use anyhow::Context;
use loadramp_rest::{router, tracing_init, AppState};
use loadramp_service::{CancellationToken, Config, HttpLoadDriver, RampService};
use loadramp_storage::open_store;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load config: {}. Using defaults.", e);
        Config::default()
    });

    config.validate()?;

    tracing_init::init_tracing(&config.logging)?;

    let backend = config.store_backend()?;
    tracing::info!("Opening {} run store", backend.kind());
    let store = open_store(&backend)
        .await
        .context("opening the run store")?;

    let driver = Arc::new(HttpLoadDriver::new(config.driver_config()));
    let service = Arc::new(RampService::new(driver, store));

    // Cancelled on SIGINT/SIGTERM; interrupts any running ramp
    let shutdown = CancellationToken::new();
    let app = router(Arc::new(AppState::new(service, shutdown.clone())));

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    tracing::info!("REST server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}

/// Wait for SIGTERM or SIGINT, then cancel `shutdown`.
///
/// Running ramps observe the token, record what they gathered and return,
/// which lets axum finish in-flight requests.
async fn shutdown_signal(shutdown: CancellationToken) {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }

    shutdown.cancel();
}
