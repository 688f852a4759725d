//! Inbound status endpoint for control nodes
//!
//! POST /api/operations/status accepts a push envelope, a base64 document or
//! plain JSON. Lookup and decode failures are permanent for a message, so
//! they answer 4xx; store failures answer 5xx and may be redelivered.

use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use tracing::{error, warn};

use crate::error::{LookupError, ReconcileError};
use crate::handlers::operations::ApiError;
use crate::models::api::ErrorResponse;
use crate::AppState;

pub async fn receive_status(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let operation = state
        .reconciler
        .handle(&body)
        .await
        .map_err(map_reconcile_error)?;

    Ok(Json(serde_json::json!({
        "success": true,
        "operation_id": operation.id,
        "status": operation.status,
    })))
}

/// Map ReconcileError to HTTP response
pub fn map_reconcile_error(err: ReconcileError) -> ApiError {
    let (status, code) = match &err {
        ReconcileError::Decode(_) => (StatusCode::BAD_REQUEST, "INVALID_MESSAGE"),
        ReconcileError::Lookup(LookupError::Operation(_)) => {
            (StatusCode::NOT_FOUND, "UNKNOWN_OPERATION")
        }
        ReconcileError::Lookup(_) => (StatusCode::NOT_FOUND, "UNKNOWN_RECORD"),
        ReconcileError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
    };

    if status.is_server_error() {
        error!(error = %err, "Status message could not be applied");
    } else {
        warn!(error = %err, "Status message rejected");
    }

    (status, Json(ErrorResponse::new(err.to_string(), code)))
}
