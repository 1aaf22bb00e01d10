use axum::{extract::State, routing::get, Json, Router};
use std::sync::Arc;

use crate::error::AppResult;
use crate::services::report::{availability_report, AvailabilityReport};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/reports/availability", get(get_availability))
}

// GET /api/reports/availability
async fn get_availability(State(state): State<Arc<AppState>>) -> AppResult<Json<AvailabilityReport>> {
    Ok(Json(availability_report(&state.inventory).await?))
}
