use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::inventory::state::TransitionError;
use crate::models::SeatId;
use crate::store::StoreError;

/// Failure of an inventory operation.
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// A state precondition failed. Nothing was written.
    #[error(transparent)]
    IllegalTransition(#[from] TransitionError),

    #[error("{0}")]
    InvalidInput(String),

    /// The store failed mid-operation. Indirect rows may need a rederive.
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl InventoryError {
    pub fn seat_not_found(id: SeatId) -> Self {
        InventoryError::NotFound { entity: "Seat", id: id.to_string() }
    }

    pub fn category_not_found(id: i64) -> Self {
        InventoryError::NotFound { entity: "State category", id: id.to_string() }
    }
}

pub type InventoryResult<T> = Result<T, InventoryError>;

/// Error type returned by HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error("Validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Not found: {0}")]
    NotFound(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Inventory(InventoryError::Storage(err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Inventory(err) => match err {
                InventoryError::NotFound { .. } => {
                    (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string())
                }
                InventoryError::IllegalTransition(reason) => {
                    (StatusCode::BAD_REQUEST, "ILLEGAL_TRANSITION", reason.to_string())
                }
                InventoryError::InvalidInput(msg) => {
                    (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone())
                }
                InventoryError::Storage(store) => classify_store_error(store),
            },
            AppError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION_ERROR",
                errors.to_string(),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Storage failures never leak driver details to the client.
fn classify_store_error(err: &StoreError) -> (StatusCode, &'static str, String) {
    match err {
        StoreError::Conflict { .. } => {
            tracing::warn!(error = %err, "Seat action kept conflicting");
            (StatusCode::CONFLICT, "CONFLICT", err.to_string())
        }
        StoreError::Database(sqlx::Error::PoolTimedOut) => {
            tracing::error!(error = %err, "Database pool exhausted");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "UNAVAILABLE",
                "Storage is temporarily unavailable".to_string(),
            )
        }
        other => {
            tracing::error!(error = %other, "Storage error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}
