//! Inventory generator
//!
//! Writes the host inventory a control node works from into the operation's
//! output directory and stages a copy in the artifact store.

use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::services::collaborators::{ArtifactError, ArtifactStore, AssignmentSpec, ConfigGenerator};

pub const INVENTORY_FILE: &str = "inventory.json";

#[derive(Debug, Serialize)]
struct Inventory<'a> {
    operation_id: i32,
    hosts: &'a [AssignmentSpec],
}

pub fn inventory_key(operation_id: i32) -> String {
    format!("operations/{}/{}", operation_id, INVENTORY_FILE)
}

pub struct InventoryGenerator {
    store: Arc<dyn ArtifactStore>,
}

impl InventoryGenerator {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ConfigGenerator for InventoryGenerator {
    async fn generate(
        &self,
        operation_id: i32,
        assignments: &[AssignmentSpec],
        output_dir: &Path,
    ) -> Result<(), ArtifactError> {
        let inventory = serde_json::to_vec_pretty(&Inventory {
            operation_id,
            hosts: assignments,
        })?;

        let io_error = |source| ArtifactError::Io {
            key: output_dir.join(INVENTORY_FILE).display().to_string(),
            source,
        };
        tokio::fs::create_dir_all(output_dir).await.map_err(io_error)?;
        tokio::fs::write(output_dir.join(INVENTORY_FILE), &inventory)
            .await
            .map_err(io_error)?;

        self.store.put(&inventory_key(operation_id), inventory).await?;

        info!(
            operation_id,
            hosts = assignments.len(),
            output_dir = %output_dir.display(),
            "Inventory generated"
        );
        Ok(())
    }
}
