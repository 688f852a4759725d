//! Process configuration read from the environment (and `.env`)

use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} is invalid: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    /// Root of the filesystem artifact store
    pub artifact_root: PathBuf,
    /// Parent of per-operation output directories
    pub work_dir: PathBuf,
    /// Executable started for each operation
    pub control_node_command: String,
    /// URL control nodes post status messages to
    pub callback_url: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let bind_raw = lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_addr = bind_raw.parse().map_err(|_| ConfigError::Invalid {
            name: "BIND_ADDR",
            value: bind_raw.clone(),
        })?;

        Ok(Self {
            database_url,
            bind_addr,
            artifact_root: lookup("ARTIFACT_ROOT")
                .unwrap_or_else(|| "./artifacts".to_string())
                .into(),
            work_dir: lookup("WORK_DIR").unwrap_or_else(|| "./work".to_string()).into(),
            control_node_command: lookup("CONTROL_NODE_COMMAND")
                .unwrap_or_else(|| "control-node".to_string()),
            callback_url: lookup("CALLBACK_URL")
                .unwrap_or_else(|| "http://localhost:3000/api/operations/status".to_string()),
        })
    }
}
