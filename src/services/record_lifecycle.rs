//! Transitions of a single operation record
//!
//! STARTING → IN_PROGRESS → {COMPLETE, FAILED}. Terminal records are never
//! reopened: every transition below is a no-op once a record is COMPLETE or
//! FAILED, which keeps duplicated deliveries harmless.
//!
//! All functions take the caller's connection so they run inside the
//! transaction holding the operation row lock.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::entities::prelude::*;
use crate::entities::{assignments, operation_record_errors, operation_records, operations, targets};
use crate::models::operation::{OperationKind, RunStatus};
use crate::models::status_message::StepUpdate;
use crate::models::target::{TargetStatus, Topology};
use crate::services::aggregation::{aggregate, resolve, NodeOutcome};
use crate::services::collaborators::LogValidator;
use crate::services::policy::policy_for;

/// Step every record starts in
pub const INITIAL_STEP: &str = "queued";

pub fn kind_of(operation: &operations::Model) -> Result<OperationKind, DbErr> {
    operation
        .kind
        .parse()
        .map_err(|e: String| DbErr::Custom(format!("operation {}: {}", operation.id, e)))
}

pub fn status_of(record: &operation_records::Model) -> RunStatus {
    RunStatus::from(record.status.as_str())
}

#[derive(Clone)]
pub struct RecordLifecycle {
    log_validator: Arc<dyn LogValidator>,
}

impl RecordLifecycle {
    pub fn new(log_validator: Arc<dyn LogValidator>) -> Self {
        Self { log_validator }
    }

    /// Record the step a node is in; stale timestamps are ignored
    pub async fn set_step<C: ConnectionTrait>(
        &self,
        conn: &C,
        record: operation_records::Model,
        step: &StepUpdate,
    ) -> Result<operation_records::Model, DbErr> {
        if status_of(&record).is_terminal() {
            debug!(record_id = record.id, step = %step.name, "Ignoring step for terminal record");
            return Ok(record);
        }
        if let Some(previous) = record.step_updated_at {
            if step.at < previous {
                debug!(
                    record_id = record.id,
                    step = %step.name,
                    "Ignoring stale step (reported {}, stored {})",
                    step.at,
                    previous
                );
                return Ok(record);
            }
        }

        let mut active: operation_records::ActiveModel = record.into();
        active.step = Set(step.name.clone());
        active.step_updated_at = Set(Some(step.at.into()));
        active.update(conn).await
    }

    /// Apply a reported status token
    ///
    /// COMPLETE and FAILED go through `complete` / `fail`; anything else is
    /// stored verbatim as a non-terminal status.
    pub async fn set_status<C: ConnectionTrait>(
        &self,
        conn: &C,
        operation: &operations::Model,
        record: operation_records::Model,
        token: &str,
    ) -> Result<operation_records::Model, DbErr> {
        match RunStatus::from(token) {
            RunStatus::Complete => self.complete(conn, operation, record).await,
            RunStatus::Failed => self.fail(conn, operation, record, None).await,
            status => {
                if status_of(&record).is_terminal() {
                    debug!(record_id = record.id, status = %status, "Ignoring status for terminal record");
                    return Ok(record);
                }
                let mut active: operation_records::ActiveModel = record.into();
                active.status = Set(status.to_string());
                active.update(conn).await
            }
        }
    }

    /// Mark the record FAILED and re-aggregate its target
    ///
    /// `reason` is attached as a record error; it is set for locally
    /// detected failures only.
    pub async fn fail<C: ConnectionTrait>(
        &self,
        conn: &C,
        operation: &operations::Model,
        record: operation_records::Model,
        reason: Option<&str>,
    ) -> Result<operation_records::Model, DbErr> {
        if status_of(&record).is_terminal() {
            debug!(record_id = record.id, "Record already terminal, not failing");
            return Ok(record);
        }
        if let Some(reason) = reason {
            append_error(conn, record.id, reason).await?;
        }
        self.finalize(conn, operation, record, RunStatus::Failed).await
    }

    /// Mark the record COMPLETE and re-aggregate its target
    ///
    /// For PRE_RESTORE the control node's own report is not trusted: when a
    /// validation log exists and it contains failures, those are attached
    /// and the record fails instead.
    pub async fn complete<C: ConnectionTrait>(
        &self,
        conn: &C,
        operation: &operations::Model,
        record: operation_records::Model,
    ) -> Result<operation_records::Model, DbErr> {
        if status_of(&record).is_terminal() {
            debug!(record_id = record.id, "Record already terminal, not completing");
            return Ok(record);
        }

        if kind_of(operation)? == OperationKind::PreRestore {
            if self.log_validator.exists(operation.id).await {
                if let Err(failure) = self.log_validator.validate(operation.id).await {
                    warn!(
                        operation_id = operation.id,
                        record_id = record.id,
                        messages = failure.messages.len(),
                        "Pre-restore reported success but log validation failed"
                    );
                    if failure.messages.is_empty() {
                        append_error(conn, record.id, &failure.to_string()).await?;
                    }
                    for message in &failure.messages {
                        append_error(conn, record.id, message).await?;
                    }
                    return self.finalize(conn, operation, record, RunStatus::Failed).await;
                }
            } else {
                debug!(operation_id = operation.id, "No validation log, accepting reported success");
            }
        }

        self.finalize(conn, operation, record, RunStatus::Complete).await
    }

    async fn finalize<C: ConnectionTrait>(
        &self,
        conn: &C,
        operation: &operations::Model,
        record: operation_records::Model,
        status: RunStatus,
    ) -> Result<operation_records::Model, DbErr> {
        let mut active: operation_records::ActiveModel = record.into();
        active.status = Set(status.to_string());
        active.completed_at = Set(Some(Utc::now().into()));
        let record = active.update(conn).await?;

        info!(
            operation_id = operation.id,
            record_id = record.id,
            status = %status,
            "Operation record finished"
        );

        if let Some(assignment_id) = record.assignment_id {
            aggregate_target(conn, operation, assignment_id).await?;
        }
        Ok(record)
    }
}

pub async fn append_error<C: ConnectionTrait>(
    conn: &C,
    record_id: i32,
    message: &str,
) -> Result<(), DbErr> {
    operation_record_errors::ActiveModel {
        record_id: Set(record_id),
        message: Set(message.to_string()),
        created_at: Set(Utc::now().into()),
        ..Default::default()
    }
    .insert(conn)
    .await?;
    Ok(())
}

/// Recompute the status of the target behind `assignment_id`
///
/// Looks at every record of `operation` that belongs to the same target, so
/// a clustered target only changes once all of its nodes are terminal.
pub async fn aggregate_target<C: ConnectionTrait>(
    conn: &C,
    operation: &operations::Model,
    assignment_id: i32,
) -> Result<Option<TargetStatus>, DbErr> {
    let Some(policy) = policy_for(kind_of(operation)?) else {
        return Ok(None);
    };

    let Some(assignment) = Assignments::find_by_id(assignment_id).one(conn).await? else {
        warn!(assignment_id, "Assignment vanished, cannot aggregate target");
        return Ok(None);
    };
    let Some(target) = Targets::find_by_id(assignment.target_id).one(conn).await? else {
        warn!(target_id = assignment.target_id, "Target vanished, cannot aggregate");
        return Ok(None);
    };

    let rows = OperationRecords::find()
        .find_also_related(Assignments)
        .filter(operation_records::Column::OperationId.eq(operation.id))
        .filter(assignments::Column::TargetId.eq(target.id))
        .all(conn)
        .await?;

    let outcomes: Vec<NodeOutcome> = rows
        .iter()
        .map(|(record, assignment)| {
            NodeOutcome::new(assignment.as_ref().and_then(|a| a.node), status_of(record))
        })
        .collect();

    let topology = target.topology.parse::<Topology>().unwrap_or_else(|e| {
        warn!(target_id = target.id, "{}, treating as SINGLE", e);
        Topology::Single
    });

    let Some(new_status) = resolve(policy, aggregate(topology, policy.rule, &outcomes)) else {
        debug!(
            operation_id = operation.id,
            target_id = target.id,
            "Target still has pending nodes"
        );
        return Ok(None);
    };

    info!(
        operation_id = operation.id,
        target_id = target.id,
        from = %target.status,
        to = %new_status,
        "Target status updated"
    );

    let mut active: targets::ActiveModel = target.into();
    active.status = Set(new_status.to_string());
    active.update(conn).await?;

    Ok(Some(new_status))
}
