#![allow(dead_code)]

use async_trait::async_trait;
use fleet_orchestrator::entities::{
    assignments, operation_record_errors, operation_records, operations, target_groups, targets,
    workers,
};
use fleet_orchestrator::entities::prelude::*;
use fleet_orchestrator::models::operation::OperationKind;
use fleet_orchestrator::models::target::{TargetStatus, Topology};
use fleet_orchestrator::services::collaborators::{
    ArtifactError, AssignmentSpec, ComputeLauncher, ConfigGenerator, LaunchContext, LaunchError,
    LogValidator, ValidationFailure,
};
use fleet_orchestrator::services::reconciler::StatusReconciler;
use fleet_orchestrator::AppState;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, Database, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, QueryOrder, Set,
};
use sea_orm_migration::MigratorTrait;
use std::env;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

/// Set up test database connection
/// Uses TEST_DATABASE_URL environment variable or falls back to in-memory SQLite
pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    let database_url = env::var("TEST_DATABASE_URL").unwrap_or_else(|_| "sqlite::memory:".to_string());

    let mut options = ConnectOptions::new(database_url.clone());
    if database_url.starts_with("sqlite") {
        // Every connection to :memory: is a separate database
        options.max_connections(1).min_connections(1);
    }
    options.sqlx_logging(false);

    let db = Database::connect(options).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

/// Generator that writes nothing, optionally failing
#[derive(Default)]
pub struct FakeGenerator {
    pub fail: AtomicBool,
    pub calls: Mutex<Vec<(i32, Vec<AssignmentSpec>)>>,
}

#[async_trait]
impl ConfigGenerator for FakeGenerator {
    async fn generate(
        &self,
        operation_id: i32,
        assignments: &[AssignmentSpec],
        _output_dir: &Path,
    ) -> Result<(), ArtifactError> {
        self.calls
            .lock()
            .unwrap()
            .push((operation_id, assignments.to_vec()));
        if self.fail.load(Ordering::SeqCst) {
            return Err(ArtifactError::NotFound("templates/inventory.j2".to_string()));
        }
        Ok(())
    }
}

/// Launcher that records launches, optionally failing
#[derive(Default)]
pub struct RecordingLauncher {
    pub fail: AtomicBool,
    pub launches: Mutex<Vec<(OperationKind, i32)>>,
}

#[async_trait]
impl ComputeLauncher for RecordingLauncher {
    async fn launch(
        &self,
        kind: OperationKind,
        operation: &operations::Model,
        _output_dir: &Path,
        _context: &LaunchContext,
    ) -> Result<(), LaunchError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(LaunchError::Rejected("no capacity in region".to_string()));
        }
        self.launches.lock().unwrap().push((kind, operation.id));
        Ok(())
    }
}

/// Launcher that behaves like a fast control node: it reports `host_status`
/// for `hostname` before `launch` returns
pub struct ReportingLauncher {
    pub reconciler: OnceLock<Arc<StatusReconciler>>,
    pub hostname: String,
    pub host_status: String,
    /// Operation status after the report, or the error it produced
    pub outcome: Mutex<Option<Result<String, String>>>,
}

impl ReportingLauncher {
    pub fn new(hostname: &str, host_status: &str) -> Self {
        Self {
            reconciler: OnceLock::new(),
            hostname: hostname.to_string(),
            host_status: host_status.to_string(),
            outcome: Mutex::new(None),
        }
    }
}

#[async_trait]
impl ComputeLauncher for ReportingLauncher {
    async fn launch(
        &self,
        _kind: OperationKind,
        operation: &operations::Model,
        _output_dir: &Path,
        _context: &LaunchContext,
    ) -> Result<(), LaunchError> {
        let reconciler = self
            .reconciler
            .get()
            .ok_or_else(|| LaunchError::Rejected("reconciler not wired".to_string()))?;
        let body = host_report(operation.id, &[self.hostname.as_str()], &self.host_status);

        let outcome = match tokio::time::timeout(Duration::from_secs(3), reconciler.handle(&body)).await {
            Ok(Ok(operation)) => Ok(operation.status),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err("report timed out".to_string()),
        };
        *self.outcome.lock().unwrap() = Some(outcome);
        Ok(())
    }
}

/// Log validator whose answers are set by the test
#[derive(Default)]
pub struct ScriptedLogValidator {
    pub log_exists: AtomicBool,
    pub failures: Mutex<Vec<String>>,
}

impl ScriptedLogValidator {
    pub fn fail_with(&self, messages: &[&str]) {
        self.log_exists.store(true, Ordering::SeqCst);
        *self.failures.lock().unwrap() = messages.iter().map(|m| m.to_string()).collect();
    }
}

#[async_trait]
impl LogValidator for ScriptedLogValidator {
    async fn exists(&self, _operation_id: i32) -> bool {
        self.log_exists.load(Ordering::SeqCst)
    }

    async fn validate(&self, _operation_id: i32) -> Result<(), ValidationFailure> {
        let messages = self.failures.lock().unwrap().clone();
        if messages.is_empty() {
            Ok(())
        } else {
            Err(ValidationFailure { messages })
        }
    }
}

pub struct TestContext {
    pub db: DatabaseConnection,
    pub state: AppState,
    pub generator: Arc<FakeGenerator>,
    pub launcher: Arc<RecordingLauncher>,
    pub validator: Arc<ScriptedLogValidator>,
}

pub async fn setup() -> TestContext {
    let db = setup_test_db().await.expect("Failed to set up test DB");
    let generator = Arc::new(FakeGenerator::default());
    let launcher = Arc::new(RecordingLauncher::default());
    let validator = Arc::new(ScriptedLogValidator::default());

    let state = AppState::with_collaborators(
        db.clone(),
        generator.clone(),
        launcher.clone(),
        validator.clone(),
        env::temp_dir().join("fleet-orchestrator-tests"),
        "http://localhost/api/operations/status".to_string(),
    );

    TestContext {
        db,
        state,
        generator,
        launcher,
        validator,
    }
}

/// State wired around a custom launcher, with default fakes for the rest
pub fn build_state(db: &DatabaseConnection, launcher: Arc<dyn ComputeLauncher>) -> AppState {
    AppState::with_collaborators(
        db.clone(),
        Arc::new(FakeGenerator::default()),
        launcher,
        Arc::new(ScriptedLogValidator::default()),
        env::temp_dir().join("fleet-orchestrator-tests"),
        "http://localhost/api/operations/status".to_string(),
    )
}

fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4().simple())
}

pub async fn create_group(db: &DatabaseConnection) -> target_groups::Model {
    target_groups::ActiveModel {
        name: Set(unique("wave")),
        running: Set(false),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn create_target(
    db: &DatabaseConnection,
    group_id: i32,
    topology: Topology,
    node_count: i32,
    status: TargetStatus,
) -> targets::Model {
    targets::ActiveModel {
        group_id: Set(group_id),
        name: Set(unique("target")),
        status: Set(status.to_string()),
        topology: Set(topology.to_string()),
        node_count: Set(node_count),
        running: Set(false),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn create_worker(db: &DatabaseConnection) -> workers::Model {
    workers::ActiveModel {
        hostname: Set(unique("host")),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn assign(
    db: &DatabaseConnection,
    target_id: i32,
    worker_id: i32,
    node: Option<i32>,
) -> assignments::Model {
    assignments::ActiveModel {
        target_id: Set(target_id),
        worker_id: Set(worker_id),
        node: Set(node),
        deleted: Set(false),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

/// A SINGLE target with one assigned host; returns the target and hostname
pub async fn single_target(
    db: &DatabaseConnection,
    group_id: i32,
    status: TargetStatus,
) -> (targets::Model, String) {
    let target = create_target(db, group_id, Topology::Single, 0, status).await;
    let worker = create_worker(db).await;
    assign(db, target.id, worker.id, None).await;
    (target, worker.hostname)
}

/// A CLUSTERED target with `nodes` hosts; hostnames are ordered by node ordinal
pub async fn clustered_target(
    db: &DatabaseConnection,
    group_id: i32,
    nodes: i32,
    status: TargetStatus,
) -> (targets::Model, Vec<String>) {
    let target = create_target(db, group_id, Topology::Clustered, nodes, status).await;
    let mut hostnames = Vec::new();
    for node in 0..nodes {
        let worker = create_worker(db).await;
        assign(db, target.id, worker.id, Some(node)).await;
        hostnames.push(worker.hostname);
    }
    (target, hostnames)
}

pub async fn reload_operation(db: &DatabaseConnection, id: i32) -> operations::Model {
    Operations::find_by_id(id).one(db).await.unwrap().unwrap()
}

pub async fn reload_target(db: &DatabaseConnection, id: i32) -> targets::Model {
    Targets::find_by_id(id).one(db).await.unwrap().unwrap()
}

pub async fn reload_group(db: &DatabaseConnection, id: i32) -> target_groups::Model {
    TargetGroups::find_by_id(id).one(db).await.unwrap().unwrap()
}

pub async fn records_of(db: &DatabaseConnection, operation_id: i32) -> Vec<operation_records::Model> {
    OperationRecords::find()
        .filter(operation_records::Column::OperationId.eq(operation_id))
        .order_by_asc(operation_records::Column::Id)
        .all(db)
        .await
        .unwrap()
}

pub async fn errors_of(db: &DatabaseConnection, record_id: i32) -> Vec<String> {
    OperationRecordErrors::find()
        .filter(operation_record_errors::Column::RecordId.eq(record_id))
        .order_by_asc(operation_record_errors::Column::Id)
        .all(db)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.message)
        .collect()
}

pub async fn operation_count(db: &DatabaseConnection) -> usize {
    Operations::find().all(db).await.unwrap().len()
}

/// Host-keyed report body
pub fn host_report(operation_id: i32, hostnames: &[&str], host_status: &str) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "operation_id": operation_id,
        "hostnames": hostnames,
        "host_status": host_status,
    }))
    .unwrap()
}

/// Operation-level report body
pub fn operation_report(operation_id: i32, status: &str) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "operation_id": operation_id,
        "status": status,
    }))
    .unwrap()
}
