//! Store error types

use keel_types::{ClusterId, NodeId};
use thiserror::Error;

/// Errors returned by store implementations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Cluster not found: {0}")]
    ClusterNotFound(ClusterId),

    #[error("Cluster {cluster} has no members to elect a founder from")]
    EmptyCluster { cluster: ClusterId },

    #[error("Node {node} is not a member of cluster {cluster}")]
    NotAMember { cluster: ClusterId, node: NodeId },

    #[error("Stale proposal {name}: expected revision {expected}, found {found}")]
    StaleRevision {
        name: String,
        expected: u64,
        found: u64,
    },

    #[error("Migration {name} failed: {reason}")]
    Migration { name: String, reason: String },
}

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;
