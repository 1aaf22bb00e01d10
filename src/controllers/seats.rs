use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use validator::Validate;

use crate::cache::CacheLookup;
use crate::error::AppResult;
use crate::models::{HoldName, Seat, SeatId, SeatWithIndirect};
use crate::services::inventory::{BatchOutcome, MutationOutcome, NotForSaleUpdate, RederiveSummary};
use crate::store::ResetCounts;
use crate::AppState;

pub fn routes(enable_kill_routes: bool) -> Router<Arc<AppState>> {
    let router = Router::new()
        .route("/events/{event_id}/seats", get(get_seats_by_event))
        .route("/events/{event_id}/seats/with-indirect", get(get_seats_with_indirect))
        .route("/events/{event_id}/related", get(get_related_events))
        .route("/seats/{id}", get(get_seat))
        .route("/seats/{id}/not-for-sale", put(set_not_for_sale))
        .route("/seats/{id}/hold", put(apply_hold).delete(remove_hold))
        .route("/seats/{id}/add-to-cart", put(add_to_cart))
        .route("/seats/{id}/sell", put(sell))
        .route("/seats/{id}/reserve", put(reserve))
        .route("/seats/{id}/list", put(list))
        .route("/seats/{id}/resell", put(resell))
        .route("/seats/{id}/release", put(release))
        .route("/seats/batch-update", post(batch_update))
        .route("/seats/reset-all", post(reset_all))
        .route("/seats/rederive", post(rederive));

    if enable_kill_routes {
        router.route("/seats/{id}/kill", put(apply_kill).delete(remove_kill))
    } else {
        router
    }
}

/* ---------- requests ---------- */

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldRequest {
    pub hold_name: HoldName,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KillRequest {
    pub kill_name: HoldName,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotForSaleRequest {
    pub not_for_sale: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BatchUpdateRequest {
    #[validate(length(min = 1, max = 1000, message = "between 1 and 1000 updates per batch"))]
    pub updates: Vec<NotForSaleUpdate>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedEventsResponse {
    pub event_id: String,
    pub related: BTreeSet<String>,
}

/* ---------- helpers ---------- */

async fn respond(state: &AppState, outcome: MutationOutcome) -> Json<Seat> {
    state.invalidate_events(&outcome.touched_events).await;
    Json(outcome.seat)
}

/* ---------- reads ---------- */

// GET /api/events/{event_id}/seats
async fn get_seats_by_event(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
) -> AppResult<Json<Vec<Seat>>> {
    Ok(Json(state.inventory.seats_for_event(&event_id).await?))
}

// GET /api/events/{event_id}/seats/with-indirect
async fn get_seats_with_indirect(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
) -> AppResult<Json<Vec<SeatWithIndirect>>> {
    let mut generation = None;
    if let Some(cache) = &state.cache {
        match cache.get_seat_views(&event_id).await {
            CacheLookup::Hit(views) => return Ok(Json(views)),
            CacheLookup::Miss { version } => generation = Some((cache, version)),
            CacheLookup::Unavailable => {}
        }
    }

    let views = state.inventory.seats_with_indirect(&event_id).await?;
    if let Some((cache, version)) = generation {
        cache.save_seat_views(&event_id, version, &views).await;
    }
    Ok(Json(views))
}

// GET /api/events/{event_id}/related
async fn get_related_events(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
) -> AppResult<Json<RelatedEventsResponse>> {
    let related = state.inventory.related_events(&event_id).await?;
    Ok(Json(RelatedEventsResponse { event_id, related }))
}

// GET /api/seats/{id}
async fn get_seat(
    State(state): State<Arc<AppState>>,
    Path(id): Path<SeatId>,
) -> AppResult<Json<Seat>> {
    Ok(Json(state.inventory.seat(id).await?))
}

/* ---------- direct actions ---------- */

// PUT /api/seats/{id}/not-for-sale
async fn set_not_for_sale(
    State(state): State<Arc<AppState>>,
    Path(id): Path<SeatId>,
    Json(req): Json<NotForSaleRequest>,
) -> AppResult<Json<Seat>> {
    let outcome = state.inventory.set_not_for_sale(id, req.not_for_sale).await?;
    Ok(respond(&state, outcome).await)
}

// PUT /api/seats/{id}/hold
async fn apply_hold(
    State(state): State<Arc<AppState>>,
    Path(id): Path<SeatId>,
    Json(req): Json<HoldRequest>,
) -> AppResult<Json<Seat>> {
    let outcome = state.inventory.apply_hold(id, req.hold_name).await?;
    Ok(respond(&state, outcome).await)
}

// DELETE /api/seats/{id}/hold
async fn remove_hold(
    State(state): State<Arc<AppState>>,
    Path(id): Path<SeatId>,
) -> AppResult<Json<Seat>> {
    let outcome = state.inventory.remove_hold(id).await?;
    Ok(respond(&state, outcome).await)
}

// PUT /api/seats/{id}/kill
async fn apply_kill(
    State(state): State<Arc<AppState>>,
    Path(id): Path<SeatId>,
    Json(req): Json<KillRequest>,
) -> AppResult<Json<Seat>> {
    let outcome = state.inventory.apply_kill(id, req.kill_name).await?;
    Ok(respond(&state, outcome).await)
}

// DELETE /api/seats/{id}/kill
async fn remove_kill(
    State(state): State<Arc<AppState>>,
    Path(id): Path<SeatId>,
) -> AppResult<Json<Seat>> {
    let outcome = state.inventory.remove_kill(id).await?;
    Ok(respond(&state, outcome).await)
}

// PUT /api/seats/{id}/add-to-cart
async fn add_to_cart(
    State(state): State<Arc<AppState>>,
    Path(id): Path<SeatId>,
) -> AppResult<Json<Seat>> {
    let outcome = state.inventory.add_to_cart(id).await?;
    Ok(respond(&state, outcome).await)
}

// PUT /api/seats/{id}/sell
async fn sell(State(state): State<Arc<AppState>>, Path(id): Path<SeatId>) -> AppResult<Json<Seat>> {
    let outcome = state.inventory.sell(id).await?;
    Ok(respond(&state, outcome).await)
}

// PUT /api/seats/{id}/reserve
async fn reserve(
    State(state): State<Arc<AppState>>,
    Path(id): Path<SeatId>,
) -> AppResult<Json<Seat>> {
    let outcome = state.inventory.reserve(id).await?;
    Ok(respond(&state, outcome).await)
}

// PUT /api/seats/{id}/list
async fn list(State(state): State<Arc<AppState>>, Path(id): Path<SeatId>) -> AppResult<Json<Seat>> {
    let outcome = state.inventory.list(id).await?;
    Ok(respond(&state, outcome).await)
}

// PUT /api/seats/{id}/resell
async fn resell(
    State(state): State<Arc<AppState>>,
    Path(id): Path<SeatId>,
) -> AppResult<Json<Seat>> {
    let outcome = state.inventory.resell(id).await?;
    Ok(respond(&state, outcome).await)
}

// PUT /api/seats/{id}/release
async fn release(
    State(state): State<Arc<AppState>>,
    Path(id): Path<SeatId>,
) -> AppResult<Json<Seat>> {
    let outcome = state.inventory.release(id).await?;
    Ok(respond(&state, outcome).await)
}

/* ---------- bulk ---------- */

// POST /api/seats/batch-update
async fn batch_update(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BatchUpdateRequest>,
) -> AppResult<Json<BatchOutcome>> {
    req.validate()?;
    let outcome = state.inventory.batch_update_not_for_sale(&req.updates).await?;
    let touched: BTreeSet<String> = outcome.updated.iter().map(|s| s.event_id.clone()).collect();
    state.invalidate_events(&touched).await;
    Ok(Json(outcome))
}

// POST /api/seats/reset-all
async fn reset_all(State(state): State<Arc<AppState>>) -> AppResult<Json<ResetCounts>> {
    let counts = state.inventory.reset_all().await?;
    state.invalidate_all().await;
    Ok(Json(counts))
}

// POST /api/seats/rederive
async fn rederive(State(state): State<Arc<AppState>>) -> AppResult<Json<RederiveSummary>> {
    let summary = state.inventory.rederive_indirect().await?;
    state.invalidate_all().await;
    Ok(Json(summary))
}
