//! Per-kind status policy
//!
//! Each operation kind that drives target status has one immutable
//! `StatusPolicy`: the statuses a target ends in, how node outcomes are
//! combined, and which target statuses the kind may start from.

use crate::models::operation::OperationKind;
use crate::models::target::TargetStatus;

/// How node outcomes of a clustered target are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationRule {
    /// Complete iff every node completed, otherwise failed
    AllComplete,
    /// Node 0 decides between failed and partial when not all nodes completed
    DistinguishedNode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusPolicy {
    pub failed: TargetStatus,
    pub complete: TargetStatus,
    pub partial: Option<TargetStatus>,
    pub rule: AggregationRule,
    pub allowed_sources: &'static [TargetStatus],
}

impl StatusPolicy {
    pub fn allows_source(&self, status: TargetStatus) -> bool {
        self.allowed_sources.contains(&status)
    }
}

const DEPLOY: StatusPolicy = StatusPolicy {
    failed: TargetStatus::Failed,
    complete: TargetStatus::Deployed,
    partial: None,
    rule: AggregationRule::AllComplete,
    allowed_sources: &[
        TargetStatus::NotDeployed,
        TargetStatus::Deployed,
        TargetStatus::Failed,
        TargetStatus::RolledBack,
    ],
};

const ROLLBACK: StatusPolicy = StatusPolicy {
    failed: TargetStatus::Failed,
    complete: TargetStatus::RolledBack,
    partial: None,
    rule: AggregationRule::AllComplete,
    allowed_sources: &[TargetStatus::Deployed, TargetStatus::Failed],
};

const PRE_RESTORE: StatusPolicy = StatusPolicy {
    failed: TargetStatus::PreRestoreFailed,
    complete: TargetStatus::PreRestoreComplete,
    partial: None,
    rule: AggregationRule::AllComplete,
    allowed_sources: &[
        TargetStatus::Deployed,
        TargetStatus::PreRestoreComplete,
        TargetStatus::PreRestoreFailed,
    ],
};

const RESTORE: StatusPolicy = StatusPolicy {
    failed: TargetStatus::RestoreFailed,
    complete: TargetStatus::RestoreComplete,
    partial: Some(TargetStatus::RestorePartial),
    rule: AggregationRule::DistinguishedNode,
    allowed_sources: &[
        TargetStatus::PreRestoreComplete,
        TargetStatus::RestoreFailed,
        TargetStatus::RestorePartial,
    ],
};

const ROLLBACK_RESTORE: StatusPolicy = StatusPolicy {
    failed: TargetStatus::RestoreFailed,
    complete: TargetStatus::Deployed,
    partial: None,
    rule: AggregationRule::AllComplete,
    allowed_sources: &[
        TargetStatus::PreRestoreComplete,
        TargetStatus::PreRestoreFailed,
        TargetStatus::RestoreComplete,
        TargetStatus::RestoreFailed,
        TargetStatus::RestorePartial,
    ],
};

const FAILOVER: StatusPolicy = StatusPolicy {
    failed: TargetStatus::FailoverFailed,
    complete: TargetStatus::FailoverComplete,
    partial: None,
    rule: AggregationRule::AllComplete,
    allowed_sources: &[TargetStatus::RestoreComplete, TargetStatus::FailoverFailed],
};

/// Policy for `kind`, or `None` for kinds that never touch target status
pub fn policy_for(kind: OperationKind) -> Option<&'static StatusPolicy> {
    match kind {
        OperationKind::Deploy => Some(&DEPLOY),
        OperationKind::Rollback => Some(&ROLLBACK),
        OperationKind::PreRestore => Some(&PRE_RESTORE),
        OperationKind::Restore => Some(&RESTORE),
        OperationKind::RollbackRestore => Some(&ROLLBACK_RESTORE),
        OperationKind::Failover => Some(&FAILOVER),
        OperationKind::DmsDeploy => None,
    }
}
