//! Error types for coordination

use keel_store::StoreError;
use keel_types::{ClusterId, NodeId};
use std::time::Duration;
use thiserror::Error;

/// Errors raised by founder resolution and barriers
#[derive(Debug, Error)]
pub enum CoordinationError {
    #[error("Cluster {0} has no members")]
    EmptyCluster(ClusterId),

    #[error("Cluster not found: {0}")]
    ClusterNotFound(ClusterId),

    #[error("Timed out after {waited:?} waiting for {mark}; missing: {}", missing.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "))]
    BarrierTimeout {
        mark: String,
        waited: Duration,
        missing: Vec<NodeId>,
    },

    #[error("Node {node} is not a member of cluster {cluster}")]
    NotAMember { cluster: ClusterId, node: NodeId },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for coordination operations
pub type Result<T> = std::result::Result<T, CoordinationError>;
