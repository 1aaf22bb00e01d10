pub mod categories;
pub mod reports;
pub mod seats;

use axum::Router;
use std::sync::Arc;

use crate::config::FeatureFlags;

pub fn routes(features: &FeatureFlags) -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(seats::routes(features.enable_kill_routes))
        .merge(categories::routes())
        .merge(reports::routes())
}
