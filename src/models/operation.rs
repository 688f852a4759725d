//! Operation kinds, run statuses and API views of operations
//!
//! Kinds and statuses are persisted as upper-case strings and round-trip
//! through `Display` / `FromStr`.

use serde::{Deserialize, Serialize};

use crate::entities::{operation_record_errors, operation_records, operations};

/// Fleet-wide actions a control node can execute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationKind {
    Deploy,
    Rollback,
    PreRestore,
    Restore,
    RollbackRestore,
    Failover,
    /// Database migration deploy; runs without assignments
    DmsDeploy,
}

impl OperationKind {
    pub const ALL: [OperationKind; 7] = [
        OperationKind::Deploy,
        OperationKind::Rollback,
        OperationKind::PreRestore,
        OperationKind::Restore,
        OperationKind::RollbackRestore,
        OperationKind::Failover,
        OperationKind::DmsDeploy,
    ];

    /// Kinds that produce a single record with no assignment
    pub fn is_assignment_less(self) -> bool {
        matches!(self, OperationKind::DmsDeploy)
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Deploy => write!(f, "DEPLOY"),
            OperationKind::Rollback => write!(f, "ROLLBACK"),
            OperationKind::PreRestore => write!(f, "PRE_RESTORE"),
            OperationKind::Restore => write!(f, "RESTORE"),
            OperationKind::RollbackRestore => write!(f, "ROLLBACK_RESTORE"),
            OperationKind::Failover => write!(f, "FAILOVER"),
            OperationKind::DmsDeploy => write!(f, "DMS_DEPLOY"),
        }
    }
}

impl std::str::FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "DEPLOY" => Ok(OperationKind::Deploy),
            "ROLLBACK" => Ok(OperationKind::Rollback),
            "PRE_RESTORE" => Ok(OperationKind::PreRestore),
            "RESTORE" => Ok(OperationKind::Restore),
            "ROLLBACK_RESTORE" => Ok(OperationKind::RollbackRestore),
            "FAILOVER" => Ok(OperationKind::Failover),
            "DMS_DEPLOY" => Ok(OperationKind::DmsDeploy),
            _ => Err(format!("Unknown operation kind: {}", s)),
        }
    }
}

/// Status shared by operations and operation records
///
/// Progresses: STARTING → IN_PROGRESS → COMPLETE
///                                    ↘ FAILED
///
/// Control nodes may report tokens this service does not know; those are
/// kept verbatim in `Other` and treated as non-terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Starting,
    InProgress,
    Complete,
    Failed,
    Other(String),
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Complete | RunStatus::Failed)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Starting => write!(f, "STARTING"),
            RunStatus::InProgress => write!(f, "IN_PROGRESS"),
            RunStatus::Complete => write!(f, "COMPLETE"),
            RunStatus::Failed => write!(f, "FAILED"),
            RunStatus::Other(token) => write!(f, "{}", token),
        }
    }
}

impl From<&str> for RunStatus {
    fn from(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "STARTING" => RunStatus::Starting,
            "IN_PROGRESS" => RunStatus::InProgress,
            "COMPLETE" => RunStatus::Complete,
            "FAILED" => RunStatus::Failed,
            _ => RunStatus::Other(s.to_string()),
        }
    }
}

/// The entity an operation is started against and whose row gets locked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationScope {
    Group(i32),
    Target(i32),
}

impl OperationScope {
    /// Scope recorded on an operation row
    pub fn of(operation: &operations::Model) -> Option<Self> {
        match (operation.group_id, operation.target_id) {
            (Some(group_id), _) => Some(OperationScope::Group(group_id)),
            (None, Some(target_id)) => Some(OperationScope::Target(target_id)),
            (None, None) => None,
        }
    }
}

impl std::fmt::Display for OperationScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationScope::Group(id) => write!(f, "group:{}", id),
            OperationScope::Target(id) => write!(f, "target:{}", id),
        }
    }
}

/// Request body for POST /api/operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartOperationRequest {
    #[serde(default)]
    pub group_id: Option<i32>,
    #[serde(default)]
    pub target_id: Option<i32>,
    pub kind: OperationKind,
}

impl StartOperationRequest {
    /// Exactly one of `group_id` / `target_id` must be given
    pub fn scope(&self) -> Result<OperationScope, String> {
        match (self.group_id, self.target_id) {
            (Some(group_id), None) => Ok(OperationScope::Group(group_id)),
            (None, Some(target_id)) => Ok(OperationScope::Target(target_id)),
            (Some(_), Some(_)) => Err("Specify either group_id or target_id, not both".to_string()),
            (None, None) => Err("One of group_id or target_id is required".to_string()),
        }
    }
}

/// Response for operation queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResponse {
    pub id: i32,
    pub kind: String,
    pub status: String,
    pub group_id: Option<i32>,
    pub target_id: Option<i32>,
    pub started_at: String,
    pub completed_at: Option<String>,
}

impl From<operations::Model> for OperationResponse {
    fn from(model: operations::Model) -> Self {
        Self {
            id: model.id,
            kind: model.kind,
            status: model.status,
            group_id: model.group_id,
            target_id: model.target_id,
            started_at: model.started_at.to_rfc3339(),
            completed_at: model.completed_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// One record with its attached errors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationRecordResponse {
    pub id: i32,
    pub assignment_id: Option<i32>,
    pub status: String,
    pub step: String,
    pub step_updated_at: Option<String>,
    pub completed_at: Option<String>,
    pub errors: Vec<String>,
}

impl OperationRecordResponse {
    pub fn new(model: operation_records::Model, errors: Vec<operation_record_errors::Model>) -> Self {
        Self {
            id: model.id,
            assignment_id: model.assignment_id,
            status: model.status,
            step: model.step,
            step_updated_at: model.step_updated_at.map(|t| t.to_rfc3339()),
            completed_at: model.completed_at.map(|t| t.to_rfc3339()),
            errors: errors.into_iter().map(|e| e.message).collect(),
        }
    }
}

/// Response for GET /api/operations/{id}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationDetailResponse {
    #[serde(flatten)]
    pub operation: OperationResponse,
    pub records: Vec<OperationRecordResponse>,
}
