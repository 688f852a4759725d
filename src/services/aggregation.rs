//! Derive a target's status from the outcomes of its node records
//!
//! Pure functions; the record lifecycle feeds them the records of one
//! target under one operation and applies the result.

use crate::models::operation::RunStatus;
use crate::models::target::{TargetStatus, Topology};
use crate::services::policy::{AggregationRule, StatusPolicy};

/// Status of one node's record, with the node ordinal of its assignment
#[derive(Debug, Clone, PartialEq)]
pub struct NodeOutcome {
    pub node: Option<i32>,
    pub status: RunStatus,
}

impl NodeOutcome {
    pub fn new(node: Option<i32>, status: RunStatus) -> Self {
        Self { node, status }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    /// Some node has not reached a terminal status yet
    Unchanged,
    Complete,
    Failed,
    Partial,
}

/// Combine node outcomes under `rule`
///
/// Clustered targets are only aggregated once every node is terminal, so a
/// single failed node never flips the target while others are pending.
pub fn aggregate(topology: Topology, rule: AggregationRule, nodes: &[NodeOutcome]) -> Aggregate {
    if nodes.is_empty() {
        return Aggregate::Unchanged;
    }

    if topology == Topology::Single && nodes.len() == 1 {
        return match nodes[0].status {
            RunStatus::Complete => Aggregate::Complete,
            RunStatus::Failed => Aggregate::Failed,
            _ => Aggregate::Unchanged,
        };
    }

    if !nodes.iter().all(|n| n.status.is_terminal()) {
        return Aggregate::Unchanged;
    }

    if nodes.iter().all(|n| n.status == RunStatus::Complete) {
        return Aggregate::Complete;
    }

    match rule {
        AggregationRule::AllComplete => Aggregate::Failed,
        AggregationRule::DistinguishedNode => match distinguished(nodes) {
            Some(n0) if n0.status == RunStatus::Failed => Aggregate::Failed,
            _ => Aggregate::Partial,
        },
    }
}

/// Node 0, or the lowest ordinal present when node 0 has no record
fn distinguished(nodes: &[NodeOutcome]) -> Option<&NodeOutcome> {
    nodes
        .iter()
        .find(|n| n.node == Some(0))
        .or_else(|| nodes.iter().filter(|n| n.node.is_some()).min_by_key(|n| n.node))
        .or_else(|| nodes.first())
}

/// Target status for an aggregate, `None` when the target stays as it is
pub fn resolve(policy: &StatusPolicy, aggregate: Aggregate) -> Option<TargetStatus> {
    match aggregate {
        Aggregate::Unchanged => None,
        Aggregate::Complete => Some(policy.complete),
        Aggregate::Failed => Some(policy.failed),
        // Policies without a partial status fall back to failure
        Aggregate::Partial => Some(policy.partial.unwrap_or(policy.failed)),
    }
}
