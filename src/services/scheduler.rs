//! Deferred restore trigger
//!
//! Each schedule is a single-shot tokio task that sleeps until its start
//! time and then asks the orchestrator for a RESTORE.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{error, info};
use uuid::Uuid;

use crate::models::operation::{OperationKind, OperationScope};
use crate::services::collaborators::{SchedulerError, TaskScheduler};
use crate::services::orchestrator::OperationOrchestrator;

pub struct TokioTaskScheduler {
    orchestrator: Arc<OperationOrchestrator>,
}

impl TokioTaskScheduler {
    pub fn new(orchestrator: Arc<OperationOrchestrator>) -> Self {
        Self { orchestrator }
    }
}

/// Time left until `run_at`; zero if it already passed
fn delay_until(run_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (run_at - now).to_std().unwrap_or(Duration::ZERO)
}

#[async_trait]
impl TaskScheduler for TokioTaskScheduler {
    async fn schedule_restore(
        &self,
        scope: OperationScope,
        run_at: DateTime<Utc>,
    ) -> Result<Uuid, SchedulerError> {
        let schedule_id = Uuid::new_v4();
        let delay = delay_until(run_at, Utc::now());
        let orchestrator = self.orchestrator.clone();

        info!(
            schedule_id = %schedule_id,
            scope = %scope,
            run_at = %run_at,
            delay_secs = delay.as_secs(),
            "Restore scheduled"
        );

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            match orchestrator.start(scope, OperationKind::Restore).await {
                Ok(operation) => info!(
                    schedule_id = %schedule_id,
                    operation_id = operation.id,
                    status = %operation.status,
                    "Scheduled restore started"
                ),
                Err(e) => error!(
                    schedule_id = %schedule_id,
                    scope = %scope,
                    error = %e,
                    "Scheduled restore could not start"
                ),
            }
        });

        Ok(schedule_id)
    }
}
