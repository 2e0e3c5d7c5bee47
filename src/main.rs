//! AIS tracker service

use sailtrack::{
    api::{self, AppState},
    config::AppConfig,
    database::MessageStore,
    errors::SailtrackError,
    service::{wait_for_signal, ListenerService},
};
use tokio::{net::TcpListener, signal};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), SailtrackError> {
    #[cfg(feature = "dotenv")]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Outbound TLS uses the ring provider
    let _ = rustls::crypto::ring::default_provider().install_default();

    // Load configuration, preferring environment variables and config files
    let config = AppConfig::load()?;
    config.validate()?;

    let store = MessageStore::open(&config.database).await?;
    let listener = ListenerService::from_config(&config.stream, store.clone())?;

    let app = api::router(AppState::new(store.clone()));
    let addr = config.server.socket_addr()?;
    info!("Listening on {}", addr);
    let tcp = TcpListener::bind(addr).await?;

    axum::serve(tcp, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down");
    if let Some(listener) = listener {
        if let Err(e) = listener.stop().await {
            error!("AIS listener ended with error: {}", e);
        }
    }
    store.close().await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = wait_for_signal("ctrl-c", signal::ctrl_c());

    #[cfg(unix)]
    let terminate = wait_for_signal("SIGTERM", async {
        signal::unix::signal(signal::unix::SignalKind::terminate())?
            .recv()
            .await;
        Ok::<_, std::io::Error>(())
    });

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("Shutdown signal received");
}
