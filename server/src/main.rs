//! Ratewatch server binary.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ratewatch_server::{router, AppState, ServerConfig};
use ratewatch_store::{InMemoryRateStore, RateStore, SqliteRateStore, SqliteStoreConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting Ratewatch");

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(e.into());
    }

    let (store, sqlite): (Arc<dyn RateStore>, Option<Arc<SqliteRateStore>>) =
        if config.store.is_in_process() {
            info!("Using in-process rate store");
            (Arc::new(InMemoryRateStore::new()), None)
        } else {
            let sqlite = Arc::new(
                SqliteRateStore::connect(&SqliteStoreConfig {
                    url: config.store.database_url.clone(),
                    max_connections: config.store.max_connections,
                    busy_timeout: config.store.busy_timeout,
                })
                .await?,
            );
            info!(url = %config.store.database_url, "Connected to rate store");
            (sqlite.clone(), Some(sqlite))
        };

    let app = router(AppState::new(store, &config));

    let listener = TcpListener::bind(config.bind_address()).await?;
    info!(
        listen_addr = %config.http.listen_addr,
        listen_port = %config.http.listen_port,
        snapshot_basis = ?config.trend.snapshot_basis,
        "Ratewatch running"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(sqlite) = sqlite {
        sqlite.close().await;
    }

    info!("Ratewatch shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await
        }
    }
}
