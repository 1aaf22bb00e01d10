pub mod cache;
pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod inventory;
pub mod models;
pub mod redis_client;
pub mod services;
pub mod store;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::cache::CacheService;
use crate::config::Config;
use crate::services::InventoryService;
use crate::store::InventoryStore;

/// State shared by every request handler.
pub struct AppState {
    pub config: Config,
    pub inventory: InventoryService,
    pub cache: Option<CacheService>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn InventoryStore>,
        cache: Option<CacheService>,
    ) -> Arc<Self> {
        let inventory =
            InventoryService::new(store, config.graph(), config.hierarchy.listings.clone());
        Arc::new(Self {
            config,
            inventory,
            cache,
        })
    }

    pub async fn invalidate_events<'a, I>(&self, event_ids: I)
    where
        I: IntoIterator<Item = &'a String>,
    {
        if let Some(cache) = &self.cache {
            cache
                .invalidate_events(event_ids.into_iter().map(String::as_str))
                .await;
        }
    }

    pub async fn invalidate_all(&self) {
        self.invalidate_events(self.inventory.listings()).await;
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Seat Inventory API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/api", controllers::routes(&state.config.features))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
