//! Error types for topology resolution

use keel_types::{ClusterId, TypesError};
use thiserror::Error;

/// Errors raised while expanding or resolving topology
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("Unknown cluster: {0}")]
    UnknownCluster(ClusterId),

    #[error("Role {role} must have exactly one cluster element, found {found}")]
    NotExactlyOneCluster { role: String, found: String },

    #[error(transparent)]
    Types(#[from] TypesError),
}

/// Result type for topology operations
pub type Result<T> = std::result::Result<T, TopologyError>;
