use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use seat_inventory::{
    app,
    cache::CacheService,
    config::{Config, LogFormat},
    database::Database,
    redis_client::RedisClient,
    services::seed::seed_inventory,
    store::{InventoryStore, PgStore},
    AppState,
};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env().context("Invalid configuration")?;

    let json = config.app.log_format == LogFormat::Json;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.app.rust_log))
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();

    info!(environment = %config.app.environment, "Starting Seat Inventory API");

    // Connect to the database
    let db = Database::connect(&config.database)
        .await
        .context("Failed to connect to database")?;
    info!("Database connected");

    db.run_migrations()
        .await
        .context("Failed to run migrations")?;

    let store: Arc<dyn InventoryStore> = Arc::new(PgStore::new(db.pool.clone()));

    if config.features.seed_on_start {
        seed_inventory(store.as_ref(), &config.hierarchy.listings)
            .await
            .context("Failed to seed inventory")?;
    }

    // Redis is optional; the service runs uncached without it
    let cache = match &config.redis.url {
        Some(url) => match RedisClient::connect(url).await {
            Ok(redis) => match redis.ping().await {
                Ok(()) => {
                    info!("Redis connected");
                    Some(CacheService::new(redis, config.redis.seat_ttl_seconds))
                }
                Err(e) => {
                    warn!(error = %e, "Redis did not answer PING, seat view cache disabled");
                    None
                }
            },
            Err(e) => {
                warn!(error = %e, "Failed to connect to Redis, seat view cache disabled");
                None
            }
        },
        None => None,
    };

    let addr: SocketAddr = format!("{}:{}", config.app.host, config.app.port)
        .parse()
        .context("HOST/PORT do not form a socket address")?;

    let state = AppState::new(config, store, cache);
    state.invalidate_all().await;
    info!(
        listings = state.inventory.listings().len(),
        sibling_events = state.inventory.graph().includes_sibling_events(),
        kill_routes = state.config.features.enable_kill_routes,
        "Inventory ready"
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app(state).into_make_service()).await?;
    Ok(())
}
