use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::error::AppResult;
use crate::models::StateCategory;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/state-categories", get(list_categories).post(create_category))
        .route(
            "/state-categories/initialize-default",
            post(initialize_default),
        )
        .route(
            "/state-categories/{id}",
            put(rename_category).delete(delete_category),
        )
        .route("/state-categories/{id}/memberships", put(set_memberships))
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryRequest {
    #[validate(length(max = 255))]
    pub name: Option<String>,
    #[validate(range(min = 0))]
    pub display_order: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RenameCategoryRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MembershipsRequest {
    #[validate(length(max = 32))]
    pub state_names: Vec<String>,
}

// GET /api/state-categories
async fn list_categories(State(state): State<Arc<AppState>>) -> AppResult<Json<Vec<StateCategory>>> {
    Ok(Json(state.inventory.categories().await?))
}

// POST /api/state-categories
async fn create_category(
    State(state): State<Arc<AppState>>,
    body: Option<Json<CreateCategoryRequest>>,
) -> AppResult<(StatusCode, Json<StateCategory>)> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    req.validate()?;
    let category = state
        .inventory
        .create_category(req.name.as_deref(), req.display_order)
        .await?;
    Ok((StatusCode::CREATED, Json(category)))
}

// PUT /api/state-categories/{id}
async fn rename_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<RenameCategoryRequest>,
) -> AppResult<Json<StateCategory>> {
    req.validate()?;
    let category = state.inventory.rename_category(id, &req.name).await?;
    state.invalidate_all().await;
    Ok(Json(category))
}

// DELETE /api/state-categories/{id}
async fn delete_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    state.inventory.delete_category(id).await?;
    state.invalidate_all().await;
    Ok(StatusCode::NO_CONTENT)
}

// PUT /api/state-categories/{id}/memberships
async fn set_memberships(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<MembershipsRequest>,
) -> AppResult<Json<StateCategory>> {
    req.validate()?;
    let category = state
        .inventory
        .set_category_memberships(id, &req.state_names)
        .await?;
    state.invalidate_all().await;
    Ok(Json(category))
}

// POST /api/state-categories/initialize-default
async fn initialize_default(
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<Vec<StateCategory>>> {
    let categories = state.inventory.initialize_default_categories().await?;
    state.invalidate_all().await;
    Ok(Json(categories))
}
