use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use steam_import_api::cache::Cache;
use steam_import_api::config::{Config, RateLimitBackend, StoreBackend};
use steam_import_api::middleware::rate_limit::RateLimiter;
use steam_import_api::services::steam_client::{CatalogClient, SteamClient};
use steam_import_api::store::{LibraryStore, MemoryStore, PgStore};
use steam_import_api::{build_router, db, AppState};

/// How often stale in-memory rate-limit windows are dropped.
const PURGE_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .json()
        .init();

    let store: Arc<dyn LibraryStore> = match config.store_backend {
        StoreBackend::Postgres => Arc::new(PgStore::new(db::create_pool(&config).await?)),
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; imported libraries are lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let cache = match config.rate_limit.backend {
        RateLimitBackend::Redis => Some(Cache::new(&config).await?),
        RateLimitBackend::Memory => None,
    };

    let rate_limiter = match &cache {
        Some(cache) => RateLimiter::with_redis(
            cache.clone(),
            config.rate_limit.max_requests,
            config.rate_limit.window_secs,
        ),
        None => RateLimiter::new(config.rate_limit.max_requests, config.rate_limit.window_secs),
    };

    let steam: Option<Arc<dyn CatalogClient>> = match SteamClient::new(&config.steam)? {
        Some(client) => Some(Arc::new(client)),
        None => {
            tracing::warn!("STEAM_API_KEY is not set; connect and sync will return 503");
            None
        }
    };

    spawn_limiter_purge(rate_limiter.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(
        %addr,
        env = %config.app_env,
        store = ?config.store_backend,
        rate_limit = ?config.rate_limit.backend,
        "Steam import API starting"
    );

    let state = AppState {
        store,
        cache,
        config: Arc::new(config),
        steam,
        rate_limiter,
    };

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        build_router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn spawn_limiter_purge(limiter: RateLimiter) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            interval.tick().await;
            let purged = limiter.purge_expired().await;
            if purged > 0 {
                tracing::debug!(purged, "Purged expired rate-limit windows");
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Received Ctrl-C, starting graceful shutdown");
}
