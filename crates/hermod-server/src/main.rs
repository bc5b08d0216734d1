//! Hermod Server — application entry point.

use serde_json::json;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use hermod_core::events::EventKind;
use hermod_core::registry::ConnectionState;
use hermod_db::{DbConfig, DbManager};
use hermod_routing::{CacheBackend, MemoryCache};
use hermod_server::routes::build_router;
use hermod_server::{AppState, HttpTextSender, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("hermod=info".parse()?),
        )
        .json()
        .init();

    let config = ServerConfig::from_env();
    let db_config = DbConfig::from_env();

    let db = DbManager::connect(&db_config).await?;
    hermod_db::run_migrations(db.client()).await?;

    let cache = build_cache(&config).await;
    let sender = HttpTextSender::new(config.instance_endpoints.clone());
    let state = AppState::new(config.clone(), db.client().clone(), cache, sender);

    // Configured instances start out open; the connection monitor
    // updates the registry as state changes arrive.
    for name in config.instance_endpoints.keys() {
        state.registry.set_state(name.clone(), ConnectionState::Open);
    }

    let dispatcher = state.dispatcher.clone();
    tokio::spawn(async move {
        dispatcher
            .dispatch(
                EventKind::ApplicationStartup,
                json!({ "service": "hermod" }),
                None,
            )
            .await;
    });

    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %config.bind_addr, "Hermod server listening");

    axum::serve(listener, build_router(state)).await?;

    Ok(())
}

#[cfg(feature = "redis")]
async fn build_cache(config: &ServerConfig) -> CacheBackend {
    match &config.redis_url {
        Some(url) => match hermod_routing::RedisCache::connect(url).await {
            Ok(cache) => {
                info!("rotation cache backed by Redis");
                CacheBackend::Redis(cache)
            }
            Err(error) => {
                tracing::warn!(%error, "Redis unavailable, using in-memory rotation cache");
                CacheBackend::Memory(MemoryCache::new())
            }
        },
        None => CacheBackend::Memory(MemoryCache::new()),
    }
}

#[cfg(not(feature = "redis"))]
async fn build_cache(config: &ServerConfig) -> CacheBackend {
    if config.redis_url.is_some() {
        tracing::warn!("HERMOD_REDIS_URL set but the redis feature is disabled");
    }
    CacheBackend::Memory(MemoryCache::new())
}
