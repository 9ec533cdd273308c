//! Error types for remote delegation

use keel_coordination::CoordinationError;
use keel_store::StoreError;
use keel_types::NodeId;
use thiserror::Error;

/// Errors raised while delegating convergence to founders
#[derive(Debug, Error)]
pub enum DelegationError {
    /// Every founder whose triggered run did not succeed
    #[error("Failed to handle remote node delegation on: {}", founders.iter().map(ToString::to_string).collect::<Vec<_>>().join(" "))]
    Failed { founders: Vec<NodeId> },

    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Coordination(#[from] CoordinationError),
}

/// Result type for delegation operations
pub type Result<T> = std::result::Result<T, DelegationError>;
