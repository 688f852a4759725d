//! Status reconciler for control-node reports
//!
//! Each inbound message is applied in one transaction that first locks the
//! operation row, which serializes all reports for an operation no matter
//! how the transport delivers them. Paths are applied in a fixed order:
//! assignment-less record, host-keyed records, then the operation itself.
//! Any lookup failure rolls the whole message back.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    JoinType, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set, TransactionTrait,
};
use tracing::{debug, info};

use crate::entities::prelude::*;
use crate::entities::{assignments, operation_records, operations, workers};
use crate::error::{LookupError, ReconcileError};
use crate::models::operation::RunStatus;
use crate::models::status_message::{StatusMessage, StepUpdate};
use crate::services::operation_lifecycle::{run_status, OperationLifecycle};

/// Operation-level token that forces termination
pub const TERMINATED: &str = "TERMINATED";
/// Operation-level token that closes a normally finished operation
pub const FINISHED: &str = "FINISHED";

pub struct StatusReconciler {
    db: DatabaseConnection,
    lifecycle: OperationLifecycle,
}

impl StatusReconciler {
    pub fn new(db: DatabaseConnection, lifecycle: OperationLifecycle) -> Self {
        Self { db, lifecycle }
    }

    /// Decode and apply a raw message body
    pub async fn handle(&self, body: &[u8]) -> Result<operations::Model, ReconcileError> {
        let message = StatusMessage::decode(body)?;
        self.apply(&message).await
    }

    /// Apply a decoded message; returns the operation as committed
    pub async fn apply(&self, message: &StatusMessage) -> Result<operations::Model, ReconcileError> {
        let txn = self.db.begin().await?;

        let mut operation = Operations::find_by_id(message.operation_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(LookupError::Operation(message.operation_id))?;

        debug!(
            operation_id = operation.id,
            dms = message.dms,
            hosts = message.hostnames.len(),
            status = ?message.status,
            "Applying status message"
        );

        let mut touched_records = false;

        if message.dms {
            let record = OperationRecords::find()
                .filter(operation_records::Column::OperationId.eq(operation.id))
                .filter(operation_records::Column::AssignmentId.is_null())
                .one(&txn)
                .await?
                .ok_or(LookupError::AssignmentLessRecord(operation.id))?;
            self.apply_record(
                &txn,
                &operation,
                record,
                message.step.as_ref(),
                message.host_status.as_deref(),
            )
            .await?;
            touched_records = true;
        }

        for hostname in &message.hostnames {
            // A worker assigned to several targets owns one record per target
            let records = find_host_records(&txn, operation.id, hostname).await?;
            if records.is_empty() {
                return Err(LookupError::Host {
                    operation_id: operation.id,
                    hostname: hostname.clone(),
                }
                .into());
            }
            for record in records {
                self.apply_record(
                    &txn,
                    &operation,
                    record,
                    message.step.as_ref(),
                    message.host_status.as_deref(),
                )
                .await?;
            }
            touched_records = true;
        }

        if touched_records && run_status(&operation) == RunStatus::Starting {
            let mut active: operations::ActiveModel = operation.into();
            active.status = Set(RunStatus::InProgress.to_string());
            operation = active.update(&txn).await?;
        }

        if let Some(token) = message.status.as_deref() {
            operation = match token.to_uppercase().as_str() {
                TERMINATED => self.lifecycle.terminate(&txn, operation).await?,
                FINISHED => self.lifecycle.finish(&txn, operation).await?,
                _ => self.lifecycle.set_status(&txn, operation, token).await?,
            };
        }

        txn.commit().await?;

        info!(
            operation_id = operation.id,
            status = %operation.status,
            "Status message applied"
        );
        Ok(operation)
    }

    async fn apply_record<C: ConnectionTrait>(
        &self,
        conn: &C,
        operation: &operations::Model,
        record: operation_records::Model,
        step: Option<&StepUpdate>,
        host_status: Option<&str>,
    ) -> Result<(), DbErr> {
        let records = self.lifecycle.records();

        let record = match step {
            Some(step) => records.set_step(conn, record, step).await?,
            None => record,
        };

        if let Some(token) = host_status {
            records.set_status(conn, operation, record, token).await?;
        }
        Ok(())
    }
}

/// Records of `operation_id` whose assignment's worker is `hostname`
async fn find_host_records<C: ConnectionTrait>(
    conn: &C,
    operation_id: i32,
    hostname: &str,
) -> Result<Vec<operation_records::Model>, DbErr> {
    OperationRecords::find()
        .join(JoinType::InnerJoin, operation_records::Relation::Assignments.def())
        .join(JoinType::InnerJoin, assignments::Relation::Workers.def())
        .filter(operation_records::Column::OperationId.eq(operation_id))
        .filter(workers::Column::Hostname.eq(hostname))
        .order_by_asc(operation_records::Column::Id)
        .all(conn)
        .await
}
