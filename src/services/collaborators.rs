//! Interfaces to the external collaborators the orchestration core drives
//!
//! Artifact generation, compute launch, log validation and deferred
//! scheduling are consumed through these traits so the state machine can
//! be exercised with in-process fakes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

use crate::entities::operations;
use crate::models::operation::{OperationKind, OperationScope};

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("artifact I/O failed for {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("artifact not found: {0}")]
    NotFound(String),
    #[error("failed to serialize artifact: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("failed to spawn control node `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("compute launch rejected: {0}")]
    Rejected(String),
}

/// Failure messages found while validating a control node's log
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("log validation failed with {} message(s)", .messages.len())]
pub struct ValidationFailure {
    pub messages: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("schedule rejected: {0}")]
    Rejected(String),
}

/// One host the control node has to act on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentSpec {
    pub assignment_id: i32,
    pub target_id: i32,
    pub target_name: String,
    pub hostname: String,
    pub node: Option<i32>,
}

/// Extra information handed to a launched control node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchContext {
    pub scope: OperationScope,
    /// Where the control node posts its status messages
    pub callback_url: String,
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), ArtifactError>;
    async fn get(&self, key: &str) -> Result<Vec<u8>, ArtifactError>;
    async fn exists(&self, key: &str) -> Result<bool, ArtifactError>;
}

#[async_trait]
pub trait ConfigGenerator: Send + Sync {
    async fn generate(
        &self,
        operation_id: i32,
        assignments: &[AssignmentSpec],
        output_dir: &Path,
    ) -> Result<(), ArtifactError>;
}

#[async_trait]
pub trait ComputeLauncher: Send + Sync {
    async fn launch(
        &self,
        kind: OperationKind,
        operation: &operations::Model,
        output_dir: &Path,
        context: &LaunchContext,
    ) -> Result<(), LaunchError>;
}

#[async_trait]
pub trait LogValidator: Send + Sync {
    /// Whether a validation log was produced for the operation
    async fn exists(&self, operation_id: i32) -> bool;
    async fn validate(&self, operation_id: i32) -> Result<(), ValidationFailure>;
}

#[async_trait]
pub trait TaskScheduler: Send + Sync {
    /// Start a RESTORE for `scope` once `run_at` is reached
    async fn schedule_restore(
        &self,
        scope: OperationScope,
        run_at: DateTime<Utc>,
    ) -> Result<Uuid, SchedulerError>;
}
