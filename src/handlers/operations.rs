//! Operation endpoints
//!
//! POST /api/operations          - start an operation for a group or target
//! GET  /api/operations/{id}     - operation with its records and errors
//! POST /api/restores/schedule   - start a RESTORE at a later time

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use tracing::{error, info, warn};

use crate::entities::prelude::*;
use crate::entities::operation_records;
use crate::error::OrchestrationError;
use crate::models::api::{ErrorResponse, ScheduleRestoreRequest, ScheduleRestoreResponse};
use crate::models::operation::{
    OperationDetailResponse, OperationRecordResponse, OperationResponse, OperationScope,
    StartOperationRequest,
};
use crate::AppState;

pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// POST /api/operations
///
/// ```json
/// { "group_id": 3, "kind": "DEPLOY" }
/// ```
///
/// Responds 201 with the created operation. A control node that could not
/// be launched still yields 201, with the operation already FAILED.
pub async fn start_operation(
    State(state): State<AppState>,
    Json(req): Json<StartOperationRequest>,
) -> Result<(StatusCode, Json<OperationResponse>), ApiError> {
    let scope = req
        .scope()
        .map_err(|e| (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(e, "INVALID_SCOPE"))))?;

    let operation = state
        .orchestrator
        .start(scope, req.kind)
        .await
        .map_err(map_orchestration_error)?;

    info!(
        operation_id = operation.id,
        kind = %req.kind,
        status = %operation.status,
        "Operation start request handled"
    );

    Ok((StatusCode::CREATED, Json(operation.into())))
}

/// GET /api/operations/{id}
pub async fn get_operation(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<OperationDetailResponse>, ApiError> {
    let operation = Operations::find_by_id(id)
        .one(&state.db)
        .await
        .map_err(database_error)?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::new(format!("Operation {} not found", id), "NOT_FOUND")),
            )
        })?;

    let records = OperationRecords::find()
        .filter(operation_records::Column::OperationId.eq(id))
        .order_by_asc(operation_records::Column::Id)
        .find_with_related(OperationRecordErrors)
        .all(&state.db)
        .await
        .map_err(database_error)?;

    Ok(Json(OperationDetailResponse {
        operation: operation.into(),
        records: records
            .into_iter()
            .map(|(record, errors)| OperationRecordResponse::new(record, errors))
            .collect(),
    }))
}

/// POST /api/restores/schedule
///
/// ```json
/// { "group_id": 3, "run_at": "2026-03-01T02:00:00Z" }
/// ```
pub async fn schedule_restore(
    State(state): State<AppState>,
    Json(req): Json<ScheduleRestoreRequest>,
) -> Result<(StatusCode, Json<ScheduleRestoreResponse>), ApiError> {
    let scope = match (req.group_id, req.target_id) {
        (Some(id), None) => OperationScope::Group(id),
        (None, Some(id)) => OperationScope::Target(id),
        _ => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(
                    "Exactly one of group_id or target_id is required",
                    "INVALID_SCOPE",
                )),
            ));
        }
    };

    let schedule_id = state
        .scheduler
        .schedule_restore(scope, req.run_at)
        .await
        .map_err(|e| {
            warn!(scope = %scope, error = %e, "Restore schedule rejected");
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ErrorResponse::new(e.to_string(), "SCHEDULE_REJECTED")),
            )
        })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ScheduleRestoreResponse {
            schedule_id: schedule_id.to_string(),
            run_at: req.run_at.to_rfc3339(),
        }),
    ))
}

fn database_error(e: sea_orm::DbErr) -> ApiError {
    error!("Database error: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new(format!("Database error: {}", e), "DATABASE_ERROR")),
    )
}

/// Map OrchestrationError to HTTP response
pub fn map_orchestration_error(err: OrchestrationError) -> ApiError {
    let status = match &err {
        OrchestrationError::NotFound(_) => StatusCode::NOT_FOUND,
        OrchestrationError::Conflict { .. } => StatusCode::CONFLICT,
        OrchestrationError::InvalidState { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        OrchestrationError::NoWork(_) => StatusCode::UNPROCESSABLE_ENTITY,
        OrchestrationError::Database(e) => {
            error!("Database error while starting operation: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    let code = match &err {
        OrchestrationError::NotFound(_) => "NOT_FOUND",
        OrchestrationError::Conflict { .. } => "ALREADY_RUNNING",
        OrchestrationError::InvalidState { .. } => "INVALID_STATE",
        OrchestrationError::NoWork(_) => "NO_WORK",
        OrchestrationError::Database(_) => "DATABASE_ERROR",
    };
    (status, Json(ErrorResponse::new(err.to_string(), code)))
}
