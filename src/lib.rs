// src/lib.rs

use sea_orm::DatabaseConnection;
use std::path::PathBuf;
use std::sync::Arc;

use config::AppConfig;
use services::{
    artifact_store::LocalArtifactStore,
    collaborators::{ArtifactStore, ComputeLauncher, ConfigGenerator, LogValidator, TaskScheduler},
    config_generator::InventoryGenerator,
    launcher::ProcessLauncher,
    log_validator::ArtifactLogValidator,
    operation_lifecycle::OperationLifecycle,
    orchestrator::OperationOrchestrator,
    reconciler::StatusReconciler,
    record_lifecycle::RecordLifecycle,
    scheduler::TokioTaskScheduler,
};

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub orchestrator: Arc<OperationOrchestrator>,
    pub reconciler: Arc<StatusReconciler>,
    pub scheduler: Arc<dyn TaskScheduler>,
}

impl AppState {
    /// Wire the default collaborators from configuration
    pub fn from_config(db: DatabaseConnection, config: &AppConfig) -> Self {
        let store: Arc<dyn ArtifactStore> = Arc::new(LocalArtifactStore::new(&config.artifact_root));
        Self::with_collaborators(
            db,
            Arc::new(InventoryGenerator::new(store.clone())),
            Arc::new(ProcessLauncher::new(&config.control_node_command)),
            Arc::new(ArtifactLogValidator::new(store)),
            config.work_dir.clone(),
            config.callback_url.clone(),
        )
    }

    pub fn with_collaborators(
        db: DatabaseConnection,
        generator: Arc<dyn ConfigGenerator>,
        launcher: Arc<dyn ComputeLauncher>,
        log_validator: Arc<dyn LogValidator>,
        work_dir: PathBuf,
        callback_url: String,
    ) -> Self {
        let lifecycle = OperationLifecycle::new(RecordLifecycle::new(log_validator));
        let orchestrator = Arc::new(OperationOrchestrator::new(
            db.clone(),
            generator,
            launcher,
            lifecycle.clone(),
            work_dir,
            callback_url,
        ));
        let reconciler = Arc::new(StatusReconciler::new(db.clone(), lifecycle));
        let scheduler: Arc<dyn TaskScheduler> = Arc::new(TokioTaskScheduler::new(orchestrator.clone()));

        Self {
            db,
            orchestrator,
            reconciler,
            scheduler,
        }
    }
}

pub mod entities {
    pub mod prelude;
    pub mod assignments;
    pub mod operation_record_errors;
    pub mod operation_records;
    pub mod operations;
    pub mod target_groups;
    pub mod targets;
    pub mod workers;
}

pub mod services {
    pub mod aggregation;
    pub mod artifact_store;
    pub mod collaborators;
    pub mod config_generator;
    pub mod launcher;
    pub mod log_validator;
    pub mod operation_lifecycle;
    pub mod orchestrator;
    pub mod policy;
    pub mod reconciler;
    pub mod record_lifecycle;
    pub mod scheduler;
}

pub mod config;
pub mod error;
pub mod models;
pub mod handlers;
