mod common;

use fleet_orchestrator::error::OrchestrationError;
use fleet_orchestrator::models::operation::{OperationKind, OperationScope};
use fleet_orchestrator::models::target::{TargetStatus, Topology};
use fleet_orchestrator::services::operation_lifecycle::TERMINATED_REASON;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::common::*;

#[tokio::test]
async fn test_start_creates_operation_and_records() {
    let ctx = setup().await;
    let group = create_group(&ctx.db).await;
    let (a, _) = single_target(&ctx.db, group.id, TargetStatus::NotDeployed).await;
    let (b, _) = clustered_target(&ctx.db, group.id, 2, TargetStatus::NotDeployed).await;

    let operation = ctx
        .state
        .orchestrator
        .start(OperationScope::Group(group.id), OperationKind::Deploy)
        .await
        .unwrap();

    assert_eq!(operation.status, "STARTING");
    assert_eq!(operation.kind, "DEPLOY");
    assert_eq!(operation.group_id, Some(group.id));
    assert!(operation.completed_at.is_none());

    let records = records_of(&ctx.db, operation.id).await;
    assert_eq!(records.len(), 3);
    for record in &records {
        assert_eq!(record.status, "STARTING");
        assert_eq!(record.step, "queued");
        assert!(record.assignment_id.is_some());
        assert!(record.completed_at.is_none());
    }

    assert!(reload_group(&ctx.db, group.id).await.running);
    assert_eq!(
        *ctx.launcher.launches.lock().unwrap(),
        vec![(OperationKind::Deploy, operation.id)]
    );

    let calls = ctx.generator.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let targets: Vec<i32> = calls[0].1.iter().map(|s| s.target_id).collect();
    assert_eq!(targets.iter().filter(|t| **t == a.id).count(), 1);
    assert_eq!(targets.iter().filter(|t| **t == b.id).count(), 2);
}

#[tokio::test]
async fn test_second_start_conflicts() {
    let ctx = setup().await;
    let group = create_group(&ctx.db).await;
    single_target(&ctx.db, group.id, TargetStatus::NotDeployed).await;

    let scope = OperationScope::Group(group.id);
    ctx.state
        .orchestrator
        .start(scope, OperationKind::Deploy)
        .await
        .unwrap();

    let second = ctx
        .state
        .orchestrator
        .start(scope, OperationKind::Rollback)
        .await;
    assert!(matches!(second, Err(OrchestrationError::Conflict { .. })));
    assert_eq!(operation_count(&ctx.db).await, 1);
}

#[tokio::test]
async fn test_target_conflicts_with_running_group() {
    let ctx = setup().await;
    let group = create_group(&ctx.db).await;
    let (target, _) = single_target(&ctx.db, group.id, TargetStatus::NotDeployed).await;

    ctx.state
        .orchestrator
        .start(OperationScope::Group(group.id), OperationKind::Deploy)
        .await
        .unwrap();

    let result = ctx
        .state
        .orchestrator
        .start(OperationScope::Target(target.id), OperationKind::Deploy)
        .await;
    assert!(matches!(result, Err(OrchestrationError::Conflict { .. })));
}

#[tokio::test]
async fn test_group_conflicts_with_running_member() {
    let ctx = setup().await;
    let group = create_group(&ctx.db).await;
    let (target, _) = single_target(&ctx.db, group.id, TargetStatus::NotDeployed).await;

    ctx.state
        .orchestrator
        .start(OperationScope::Target(target.id), OperationKind::Deploy)
        .await
        .unwrap();
    assert!(reload_target(&ctx.db, target.id).await.running);

    let result = ctx
        .state
        .orchestrator
        .start(OperationScope::Group(group.id), OperationKind::Deploy)
        .await;
    assert!(matches!(result, Err(OrchestrationError::Conflict { .. })));
}

#[tokio::test]
async fn test_invalid_source_status_rejected_atomically() {
    let ctx = setup().await;
    let group = create_group(&ctx.db).await;
    single_target(&ctx.db, group.id, TargetStatus::PreRestoreComplete).await;
    let (bad, _) = single_target(&ctx.db, group.id, TargetStatus::NotDeployed).await;

    let result = ctx
        .state
        .orchestrator
        .start(OperationScope::Group(group.id), OperationKind::Restore)
        .await;

    match result {
        Err(OrchestrationError::InvalidState {
            target_id, status, kind,
        }) => {
            assert_eq!(target_id, bad.id);
            assert_eq!(status, "NOT_DEPLOYED");
            assert_eq!(kind, OperationKind::Restore);
        }
        other => panic!("expected InvalidState, got {:?}", other),
    }

    assert_eq!(operation_count(&ctx.db).await, 0);
    assert!(!reload_group(&ctx.db, group.id).await.running);
    assert!(ctx.launcher.launches.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_scope_not_found() {
    let ctx = setup().await;

    let result = ctx
        .state
        .orchestrator
        .start(OperationScope::Target(9999), OperationKind::Deploy)
        .await;
    assert!(matches!(
        result,
        Err(OrchestrationError::NotFound(OperationScope::Target(9999)))
    ));
}

#[tokio::test]
async fn test_no_assignments_is_no_work() {
    let ctx = setup().await;
    let group = create_group(&ctx.db).await;
    create_target(&ctx.db, group.id, Topology::Single, 0, TargetStatus::NotDeployed).await;

    let result = ctx
        .state
        .orchestrator
        .start(OperationScope::Group(group.id), OperationKind::Deploy)
        .await;
    assert!(matches!(result, Err(OrchestrationError::NoWork(_))));
    assert!(!reload_group(&ctx.db, group.id).await.running);
}

#[tokio::test]
async fn test_deleted_assignments_are_skipped() {
    use fleet_orchestrator::entities::assignments;
    use sea_orm::{ActiveModelTrait, Set};

    let ctx = setup().await;
    let group = create_group(&ctx.db).await;
    let target = create_target(&ctx.db, group.id, Topology::Single, 0, TargetStatus::NotDeployed).await;
    let live = create_worker(&ctx.db).await;
    let gone = create_worker(&ctx.db).await;
    let live_assignment = assign(&ctx.db, target.id, live.id, None).await;
    let gone_assignment = assign(&ctx.db, target.id, gone.id, None).await;

    let mut active: assignments::ActiveModel = gone_assignment.into();
    active.deleted = Set(true);
    active.update(&ctx.db).await.unwrap();

    let operation = ctx
        .state
        .orchestrator
        .start(OperationScope::Target(target.id), OperationKind::Deploy)
        .await
        .unwrap();

    let records = records_of(&ctx.db, operation.id).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].assignment_id, Some(live_assignment.id));
}

#[tokio::test]
async fn test_launch_failure_terminates_operation() {
    let ctx = setup().await;
    ctx.launcher.fail.store(true, Ordering::SeqCst);
    let group = create_group(&ctx.db).await;
    let (target, _) = single_target(&ctx.db, group.id, TargetStatus::NotDeployed).await;
    let (cluster, _) = clustered_target(&ctx.db, group.id, 2, TargetStatus::NotDeployed).await;

    let operation = ctx
        .state
        .orchestrator
        .start(OperationScope::Group(group.id), OperationKind::Deploy)
        .await
        .unwrap();

    assert_eq!(operation.status, "FAILED");
    assert!(operation.completed_at.is_some());

    let stored = reload_operation(&ctx.db, operation.id).await;
    assert_eq!(stored.status, "FAILED");

    for record in records_of(&ctx.db, operation.id).await {
        assert_eq!(record.status, "FAILED");
        assert!(record.completed_at.is_some());
        assert_eq!(errors_of(&ctx.db, record.id).await, vec![TERMINATED_REASON.to_string()]);
    }

    assert_eq!(reload_target(&ctx.db, target.id).await.status, "FAILED");
    assert_eq!(reload_target(&ctx.db, cluster.id).await.status, "FAILED");
    assert!(!reload_group(&ctx.db, group.id).await.running);
}

#[tokio::test]
async fn test_config_generation_failure_terminates_operation() {
    let ctx = setup().await;
    ctx.generator.fail.store(true, Ordering::SeqCst);
    let group = create_group(&ctx.db).await;
    let (target, _) = single_target(&ctx.db, group.id, TargetStatus::Deployed).await;

    let operation = ctx
        .state
        .orchestrator
        .start(OperationScope::Target(target.id), OperationKind::Rollback)
        .await
        .unwrap();

    assert_eq!(operation.status, "FAILED");
    assert!(ctx.launcher.launches.lock().unwrap().is_empty());
    assert_eq!(reload_target(&ctx.db, target.id).await.status, "FAILED");
    assert!(!reload_target(&ctx.db, target.id).await.running);

    // The scope is free again
    ctx.generator.fail.store(false, Ordering::SeqCst);
    ctx.state
        .orchestrator
        .start(OperationScope::Target(target.id), OperationKind::Deploy)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_dms_deploy_has_single_assignment_less_record() {
    let ctx = setup().await;
    let group = create_group(&ctx.db).await;
    // No assignments and a status no other kind would accept
    create_target(&ctx.db, group.id, Topology::Single, 0, TargetStatus::RestorePartial).await;

    let operation = ctx
        .state
        .orchestrator
        .start(OperationScope::Group(group.id), OperationKind::DmsDeploy)
        .await
        .unwrap();

    assert_eq!(operation.status, "STARTING");
    let records = records_of(&ctx.db, operation.id).await;
    assert_eq!(records.len(), 1);
    assert!(records[0].assignment_id.is_none());
}

#[tokio::test]
async fn test_control_node_can_report_during_launch() {
    let db = setup_test_db().await.unwrap();
    let group = create_group(&db).await;
    let (target, host) = single_target(&db, group.id, TargetStatus::NotDeployed).await;

    let launcher = Arc::new(ReportingLauncher::new(&host, "IN_PROGRESS"));
    let state = build_state(&db, launcher.clone());
    assert!(launcher.reconciler.set(state.reconciler.clone()).is_ok());

    let operation = state
        .orchestrator
        .start(OperationScope::Target(target.id), OperationKind::Deploy)
        .await
        .unwrap();

    assert_eq!(
        *launcher.outcome.lock().unwrap(),
        Some(Ok("IN_PROGRESS".to_string()))
    );
    assert_eq!(reload_operation(&db, operation.id).await.status, "IN_PROGRESS");
    assert_eq!(records_of(&db, operation.id).await[0].status, "IN_PROGRESS");
    assert!(reload_target(&db, target.id).await.running);
}

#[tokio::test]
async fn test_result_reported_during_launch_is_kept() {
    let db = setup_test_db().await.unwrap();
    let group = create_group(&db).await;
    let (target, host) = single_target(&db, group.id, TargetStatus::NotDeployed).await;

    let launcher = Arc::new(ReportingLauncher::new(&host, "COMPLETE"));
    let state = build_state(&db, launcher.clone());
    assert!(launcher.reconciler.set(state.reconciler.clone()).is_ok());

    let operation = state
        .orchestrator
        .start(OperationScope::Target(target.id), OperationKind::Deploy)
        .await
        .unwrap();

    assert!(matches!(*launcher.outcome.lock().unwrap(), Some(Ok(_))));
    assert_eq!(records_of(&db, operation.id).await[0].status, "COMPLETE");
    assert_eq!(reload_target(&db, target.id).await.status, "DEPLOYED");
}
