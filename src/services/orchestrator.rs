//! Operation orchestrator
//!
//! Creates an operation and one record per assignment inside a single
//! transaction that holds an exclusive lock on the group or target row.
//! Only after that commits is the work handed to a control node, so the
//! row lock is never held across external I/O and the first status report
//! always finds its operation. A hand-off that fails terminates the
//! operation in a second transaction, so callers only ever see a fully
//! created operation or a rejection.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::entities::prelude::*;
use crate::entities::{assignments, operation_records, operations, target_groups, targets};
use crate::error::OrchestrationError;
use crate::models::operation::{OperationKind, OperationScope, RunStatus};
use crate::models::target::TargetStatus;
use crate::services::collaborators::{
    ArtifactError, AssignmentSpec, ComputeLauncher, ConfigGenerator, LaunchContext, LaunchError,
};
use crate::services::operation_lifecycle::OperationLifecycle;
use crate::services::policy::policy_for;
use crate::services::record_lifecycle::INITIAL_STEP;

/// Collaborator failure while handing an operation to a control node
#[derive(Debug, thiserror::Error)]
enum HandoffError {
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error(transparent)]
    Launch(#[from] LaunchError),
}

pub struct OperationOrchestrator {
    db: DatabaseConnection,
    generator: Arc<dyn ConfigGenerator>,
    launcher: Arc<dyn ComputeLauncher>,
    lifecycle: OperationLifecycle,
    work_dir: PathBuf,
    callback_url: String,
}

impl OperationOrchestrator {
    pub fn new(
        db: DatabaseConnection,
        generator: Arc<dyn ConfigGenerator>,
        launcher: Arc<dyn ComputeLauncher>,
        lifecycle: OperationLifecycle,
        work_dir: PathBuf,
        callback_url: String,
    ) -> Self {
        Self {
            db,
            generator,
            launcher,
            lifecycle,
            work_dir,
            callback_url,
        }
    }

    /// Start `kind` against every non-deleted assignment of `scope`
    ///
    /// # Errors
    ///
    /// - `NotFound` if the group or target does not exist
    /// - `Conflict` if the scope (or an overlapping scope) is running
    /// - `InvalidState` if a target's status does not allow `kind`
    /// - `NoWork` if there is nothing to operate on
    ///
    /// A failing config generation or launch is not an error: the returned
    /// operation is already FAILED.
    pub async fn start(
        &self,
        scope: OperationScope,
        kind: OperationKind,
    ) -> Result<operations::Model, OrchestrationError> {
        info!(scope = %scope, kind = %kind, "Starting operation");

        let txn = self.db.begin().await?;

        let scope_targets = lock_scope(&txn, scope).await?;

        if let Some(policy) = policy_for(kind) {
            for target in &scope_targets {
                let allowed = target
                    .status
                    .parse::<TargetStatus>()
                    .is_ok_and(|status| policy.allows_source(status));
                if !allowed {
                    return Err(OrchestrationError::InvalidState {
                        target_id: target.id,
                        status: target.status.clone(),
                        kind,
                    });
                }
            }
        }

        let specs = if kind.is_assignment_less() {
            Vec::new()
        } else {
            let specs = load_assignments(&txn, &scope_targets).await?;
            if specs.is_empty() {
                return Err(OrchestrationError::NoWork(scope));
            }
            specs
        };

        mark_running(&txn, scope).await?;

        let (group_id, target_id) = match scope {
            OperationScope::Group(id) => (Some(id), None),
            OperationScope::Target(id) => (None, Some(id)),
        };
        let operation = operations::ActiveModel {
            kind: Set(kind.to_string()),
            status: Set(RunStatus::Starting.to_string()),
            group_id: Set(group_id),
            target_id: Set(target_id),
            started_at: Set(Utc::now().into()),
            completed_at: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        if specs.is_empty() {
            insert_record(&txn, operation.id, None).await?;
        }
        for spec in &specs {
            insert_record(&txn, operation.id, Some(spec.assignment_id)).await?;
        }

        info!(
            operation_id = operation.id,
            kind = %kind,
            records = specs.len().max(1),
            "Operation created"
        );

        // The control node must find its operation committed when it reports
        txn.commit().await?;

        let output_dir = self.work_dir.join(format!("operation-{}", operation.id));
        match self.hand_off(kind, &operation, &specs, &output_dir, scope).await {
            Ok(()) => Ok(operation),
            Err(e) => {
                error!(
                    operation_id = operation.id,
                    error = %e,
                    "Control node hand-off failed, terminating operation"
                );
                Ok(self.terminate_after_failed_hand_off(operation.id).await?)
            }
        }
    }

    /// Terminate under the operation row lock, as a status report would
    async fn terminate_after_failed_hand_off(
        &self,
        operation_id: i32,
    ) -> Result<operations::Model, DbErr> {
        let txn = self.db.begin().await?;

        let operation = Operations::find_by_id(operation_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("operation {}", operation_id)))?;
        let operation = self.lifecycle.terminate(&txn, operation).await?;

        txn.commit().await?;
        Ok(operation)
    }

    async fn hand_off(
        &self,
        kind: OperationKind,
        operation: &operations::Model,
        specs: &[AssignmentSpec],
        output_dir: &Path,
        scope: OperationScope,
    ) -> Result<(), HandoffError> {
        self.generator
            .generate(operation.id, specs, output_dir)
            .await?;

        let context = LaunchContext {
            scope,
            callback_url: self.callback_url.clone(),
        };
        self.launcher
            .launch(kind, operation, output_dir, &context)
            .await?;

        info!(operation_id = operation.id, "Control node launched");
        Ok(())
    }
}

/// Lock the scope row and return the targets it covers
async fn lock_scope<C: ConnectionTrait>(
    conn: &C,
    scope: OperationScope,
) -> Result<Vec<targets::Model>, OrchestrationError> {
    match scope {
        OperationScope::Group(group_id) => {
            let group = TargetGroups::find_by_id(group_id)
                .lock_exclusive()
                .one(conn)
                .await?
                .ok_or(OrchestrationError::NotFound(scope))?;
            if group.running {
                return Err(OrchestrationError::Conflict { scope });
            }

            let members = Targets::find()
                .filter(targets::Column::GroupId.eq(group_id))
                .order_by_asc(targets::Column::Id)
                .all(conn)
                .await?;
            if let Some(busy) = members.iter().find(|t| t.running) {
                warn!(group_id, target_id = busy.id, "Group member is running its own operation");
                return Err(OrchestrationError::Conflict { scope });
            }
            Ok(members)
        }
        OperationScope::Target(target_id) => {
            let target = Targets::find_by_id(target_id)
                .lock_exclusive()
                .one(conn)
                .await?
                .ok_or(OrchestrationError::NotFound(scope))?;
            if target.running {
                return Err(OrchestrationError::Conflict { scope });
            }

            let group_running = TargetGroups::find_by_id(target.group_id)
                .one(conn)
                .await?
                .is_some_and(|g| g.running);
            if group_running {
                warn!(target_id, group_id = target.group_id, "Owning group is running an operation");
                return Err(OrchestrationError::Conflict { scope });
            }
            Ok(vec![target])
        }
    }
}

async fn load_assignments<C: ConnectionTrait>(
    conn: &C,
    scope_targets: &[targets::Model],
) -> Result<Vec<AssignmentSpec>, OrchestrationError> {
    let target_ids: Vec<i32> = scope_targets.iter().map(|t| t.id).collect();

    let rows = Assignments::find()
        .find_also_related(Workers)
        .filter(assignments::Column::TargetId.is_in(target_ids))
        .filter(assignments::Column::Deleted.eq(false))
        .order_by_asc(assignments::Column::TargetId)
        .order_by_asc(assignments::Column::Node)
        .order_by_asc(assignments::Column::Id)
        .all(conn)
        .await?;

    let mut specs = Vec::with_capacity(rows.len());
    for (assignment, worker) in rows {
        let Some(worker) = worker else {
            warn!(assignment_id = assignment.id, "Assignment has no worker, skipping");
            continue;
        };
        let target_name = scope_targets
            .iter()
            .find(|t| t.id == assignment.target_id)
            .map(|t| t.name.clone())
            .unwrap_or_default();
        specs.push(AssignmentSpec {
            assignment_id: assignment.id,
            target_id: assignment.target_id,
            target_name,
            hostname: worker.hostname,
            node: assignment.node,
        });
    }
    Ok(specs)
}

async fn mark_running<C: ConnectionTrait>(
    conn: &C,
    scope: OperationScope,
) -> Result<(), OrchestrationError> {
    match scope {
        OperationScope::Group(id) => {
            target_groups::ActiveModel {
                id: ActiveValue::Unchanged(id),
                running: Set(true),
                ..Default::default()
            }
            .update(conn)
            .await?;
        }
        OperationScope::Target(id) => {
            targets::ActiveModel {
                id: ActiveValue::Unchanged(id),
                running: Set(true),
                ..Default::default()
            }
            .update(conn)
            .await?;
        }
    }
    Ok(())
}

async fn insert_record<C: ConnectionTrait>(
    conn: &C,
    operation_id: i32,
    assignment_id: Option<i32>,
) -> Result<operation_records::Model, OrchestrationError> {
    let record = operation_records::ActiveModel {
        operation_id: Set(operation_id),
        assignment_id: Set(assignment_id),
        status: Set(RunStatus::Starting.to_string()),
        step: Set(INITIAL_STEP.to_string()),
        step_updated_at: Set(None),
        completed_at: Set(None),
        ..Default::default()
    }
    .insert(conn)
    .await?;
    Ok(record)
}
