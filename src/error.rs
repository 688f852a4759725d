//! Error taxonomy of the orchestration core

use sea_orm::DbErr;

use crate::models::operation::{OperationKind, OperationScope};
use crate::models::status_message::DecodeError;

/// Rejections raised by `OperationOrchestrator::start` before any state exists
#[derive(Debug, thiserror::Error)]
pub enum OrchestrationError {
    #[error("{0} does not exist")]
    NotFound(OperationScope),
    #[error("{scope} is already running an operation")]
    Conflict { scope: OperationScope },
    #[error("target {target_id} is {status}, which does not allow {kind}")]
    InvalidState {
        target_id: i32,
        status: String,
        kind: OperationKind,
    },
    #[error("{0} has no assignments to operate on")]
    NoWork(OperationScope),
    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

/// An inbound message referenced something this store does not know
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("operation {0} not found")]
    Operation(i32),
    #[error("no record for host {hostname} under operation {operation_id}")]
    Host { operation_id: i32, hostname: String },
    #[error("operation {0} has no assignment-less record")]
    AssignmentLessRecord(i32),
}

/// Failure to apply an inbound status message; nothing of it was committed
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error("database error: {0}")]
    Database(#[from] DbErr),
}
