//! Control-node launcher that spawns a local process
//!
//! The process is detached: it reports back through the status endpoint,
//! so the launcher only fails when the process cannot be started.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tracing::info;

use crate::entities::operations;
use crate::models::operation::OperationKind;
use crate::services::collaborators::{ComputeLauncher, LaunchContext, LaunchError};

#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    command: String,
}

impl ProcessLauncher {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    fn build(
        &self,
        kind: OperationKind,
        operation: &operations::Model,
        output_dir: &Path,
        context: &LaunchContext,
    ) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.command);
        cmd.arg("--kind")
            .arg(kind.to_string())
            .arg("--operation-id")
            .arg(operation.id.to_string())
            .arg("--config-dir")
            .arg(output_dir)
            .arg("--callback-url")
            .arg(&context.callback_url)
            .env("OPERATION_SCOPE", context.scope.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        cmd
    }
}

#[async_trait]
impl ComputeLauncher for ProcessLauncher {
    async fn launch(
        &self,
        kind: OperationKind,
        operation: &operations::Model,
        output_dir: &Path,
        context: &LaunchContext,
    ) -> Result<(), LaunchError> {
        let child = self
            .build(kind, operation, output_dir, context)
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        info!(
            operation_id = operation.id,
            kind = %kind,
            pid = ?child.id(),
            "Control node process spawned"
        );
        Ok(())
    }
}
