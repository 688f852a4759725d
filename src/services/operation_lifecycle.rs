//! Operation-level transitions: finish, terminate and status passthrough
//!
//! `completed_at` is stamped exactly once, by `finish`. Both `finish` and
//! `terminate` are no-ops for an operation that is already terminal.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use tracing::{debug, info, warn};

use crate::entities::prelude::*;
use crate::entities::{operation_records, operations, target_groups, targets};
use crate::models::operation::{OperationScope, RunStatus};
use crate::services::record_lifecycle::{status_of, RecordLifecycle};

/// Error attached to records failed by `terminate`
pub const TERMINATED_REASON: &str = "Operation terminated before this node reported a result";

pub fn run_status(operation: &operations::Model) -> RunStatus {
    RunStatus::from(operation.status.as_str())
}

#[derive(Clone)]
pub struct OperationLifecycle {
    records: RecordLifecycle,
}

impl OperationLifecycle {
    pub fn new(records: RecordLifecycle) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &RecordLifecycle {
        &self.records
    }

    /// Close the operation: COMPLETE iff every record is COMPLETE
    ///
    /// Also releases the `running` flag of the group or target it owns.
    pub async fn finish<C: ConnectionTrait>(
        &self,
        conn: &C,
        operation: operations::Model,
    ) -> Result<operations::Model, DbErr> {
        if run_status(&operation).is_terminal() {
            debug!(operation_id = operation.id, "Operation already terminal, not finishing");
            return Ok(operation);
        }

        let records = load_records(conn, operation.id).await?;
        let status = if records.iter().all(|r| status_of(r) == RunStatus::Complete) {
            RunStatus::Complete
        } else {
            RunStatus::Failed
        };

        let scope = OperationScope::of(&operation);
        let mut active: operations::ActiveModel = operation.into();
        active.status = Set(status.to_string());
        active.completed_at = Set(Some(Utc::now().into()));
        let operation = active.update(conn).await?;

        match scope {
            Some(scope) => release(conn, scope).await?,
            None => warn!(operation_id = operation.id, "Operation has no owning group or target"),
        }

        info!(
            operation_id = operation.id,
            kind = %operation.kind,
            status = %status,
            records = records.len(),
            "Operation finished"
        );
        Ok(operation)
    }

    /// Force the operation to a terminal state
    ///
    /// Every record still pending is failed (driving target aggregation),
    /// then the operation is finished.
    pub async fn terminate<C: ConnectionTrait>(
        &self,
        conn: &C,
        operation: operations::Model,
    ) -> Result<operations::Model, DbErr> {
        if run_status(&operation).is_terminal() {
            debug!(operation_id = operation.id, "Operation already terminal, not terminating");
            return Ok(operation);
        }

        let pending: Vec<_> = load_records(conn, operation.id)
            .await?
            .into_iter()
            .filter(|r| !status_of(r).is_terminal())
            .collect();

        warn!(
            operation_id = operation.id,
            pending = pending.len(),
            "Terminating operation"
        );

        for record in pending {
            self.records
                .fail(conn, &operation, record, Some(TERMINATED_REASON))
                .await?;
        }

        self.finish(conn, operation).await
    }

    /// Store a reported operation status
    ///
    /// Terminal tokens are routed through `finish` so `completed_at` and the
    /// `running` flag stay consistent with the status.
    pub async fn set_status<C: ConnectionTrait>(
        &self,
        conn: &C,
        operation: operations::Model,
        token: &str,
    ) -> Result<operations::Model, DbErr> {
        if run_status(&operation).is_terminal() {
            debug!(operation_id = operation.id, status = %token, "Ignoring status for terminal operation");
            return Ok(operation);
        }

        let status = RunStatus::from(token);
        if status.is_terminal() {
            return self.finish(conn, operation).await;
        }

        let mut active: operations::ActiveModel = operation.into();
        active.status = Set(status.to_string());
        active.update(conn).await
    }
}

async fn load_records<C: ConnectionTrait>(
    conn: &C,
    operation_id: i32,
) -> Result<Vec<operation_records::Model>, DbErr> {
    OperationRecords::find()
        .filter(operation_records::Column::OperationId.eq(operation_id))
        .order_by_asc(operation_records::Column::Id)
        .all(conn)
        .await
}

async fn release<C: ConnectionTrait>(conn: &C, scope: OperationScope) -> Result<(), DbErr> {
    match scope {
        OperationScope::Group(group_id) => {
            if let Some(group) = TargetGroups::find_by_id(group_id).one(conn).await? {
                let mut active: target_groups::ActiveModel = group.into();
                active.running = Set(false);
                active.update(conn).await?;
            }
        }
        OperationScope::Target(target_id) => {
            if let Some(target) = Targets::find_by_id(target_id).one(conn).await? {
                let mut active: targets::ActiveModel = target.into();
                active.running = Set(false);
                active.update(conn).await?;
            }
        }
    }
    Ok(())
}
