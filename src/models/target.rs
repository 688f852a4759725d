//! Target status and topology

use serde::{Deserialize, Serialize};

/// Entity-level status derived from operation outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TargetStatus {
    NotDeployed,
    Deployed,
    Failed,
    RolledBack,
    PreRestoreComplete,
    PreRestoreFailed,
    RestoreComplete,
    RestoreFailed,
    RestorePartial,
    FailoverComplete,
    FailoverFailed,
}

impl std::fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TargetStatus::NotDeployed => "NOT_DEPLOYED",
            TargetStatus::Deployed => "DEPLOYED",
            TargetStatus::Failed => "FAILED",
            TargetStatus::RolledBack => "ROLLED_BACK",
            TargetStatus::PreRestoreComplete => "PRE_RESTORE_COMPLETE",
            TargetStatus::PreRestoreFailed => "PRE_RESTORE_FAILED",
            TargetStatus::RestoreComplete => "RESTORE_COMPLETE",
            TargetStatus::RestoreFailed => "RESTORE_FAILED",
            TargetStatus::RestorePartial => "RESTORE_PARTIAL",
            TargetStatus::FailoverComplete => "FAILOVER_COMPLETE",
            TargetStatus::FailoverFailed => "FAILOVER_FAILED",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for TargetStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "NOT_DEPLOYED" => Ok(TargetStatus::NotDeployed),
            "DEPLOYED" => Ok(TargetStatus::Deployed),
            "FAILED" => Ok(TargetStatus::Failed),
            "ROLLED_BACK" => Ok(TargetStatus::RolledBack),
            "PRE_RESTORE_COMPLETE" => Ok(TargetStatus::PreRestoreComplete),
            "PRE_RESTORE_FAILED" => Ok(TargetStatus::PreRestoreFailed),
            "RESTORE_COMPLETE" => Ok(TargetStatus::RestoreComplete),
            "RESTORE_FAILED" => Ok(TargetStatus::RestoreFailed),
            "RESTORE_PARTIAL" => Ok(TargetStatus::RestorePartial),
            "FAILOVER_COMPLETE" => Ok(TargetStatus::FailoverComplete),
            "FAILOVER_FAILED" => Ok(TargetStatus::FailoverFailed),
            _ => Err(format!("Unknown target status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Topology {
    Single,
    Clustered,
}

impl std::fmt::Display for Topology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Topology::Single => write!(f, "SINGLE"),
            Topology::Clustered => write!(f, "CLUSTERED"),
        }
    }
}

impl std::str::FromStr for Topology {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SINGLE" => Ok(Topology::Single),
            "CLUSTERED" => Ok(Topology::Clustered),
            _ => Err(format!("Unknown topology: {}", s)),
        }
    }
}
