//! Request/response bodies shared by the HTTP handlers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Error body returned by every endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: &str) -> Self {
        Self {
            error: error.into(),
            code: Some(code.to_string()),
        }
    }
}

/// Request body for POST /api/restores/schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRestoreRequest {
    #[serde(default)]
    pub group_id: Option<i32>,
    #[serde(default)]
    pub target_id: Option<i32>,
    /// RFC 3339 start time
    pub run_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRestoreResponse {
    pub schedule_id: String,
    pub run_at: String,
}
