//! Validation of control-node logs stored in the artifact store
//!
//! A control node uploads `operations/<id>/validation.log`; any line that
//! starts with ERROR, FAILED or FATAL is a failure message.

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;
use tracing::warn;

use crate::services::collaborators::{ArtifactStore, LogValidator, ValidationFailure};

lazy_static! {
    static ref FAILURE_LINE: Regex = Regex::new(r"^\s*(ERROR|FAILED|FATAL)\b").unwrap();
}

pub fn validation_log_key(operation_id: i32) -> String {
    format!("operations/{}/validation.log", operation_id)
}

pub struct ArtifactLogValidator {
    store: Arc<dyn ArtifactStore>,
}

impl ArtifactLogValidator {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store }
    }
}

fn failures(log: &str) -> Vec<String> {
    log.lines()
        .filter(|line| FAILURE_LINE.is_match(line))
        .map(|line| line.trim().to_string())
        .collect()
}

#[async_trait]
impl LogValidator for ArtifactLogValidator {
    async fn exists(&self, operation_id: i32) -> bool {
        match self.store.exists(&validation_log_key(operation_id)).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(operation_id, error = %e, "Could not check for validation log");
                false
            }
        }
    }

    async fn validate(&self, operation_id: i32) -> Result<(), ValidationFailure> {
        let bytes = self
            .store
            .get(&validation_log_key(operation_id))
            .await
            .map_err(|e| ValidationFailure {
                messages: vec![format!("Could not read validation log: {}", e)],
            })?;

        let messages = failures(&String::from_utf8_lossy(&bytes));
        if messages.is_empty() {
            Ok(())
        } else {
            Err(ValidationFailure { messages })
        }
    }
}
