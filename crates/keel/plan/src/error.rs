//! Error types for plan building

use keel_types::TypesError;
use thiserror::Error;

/// Errors raised while building a plan
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Unknown STONITH mode: {0}")]
    UnknownIsolationMode(String),

    #[error("Custom isolation mode needs a resource name")]
    MissingIsolationResource,

    #[error("No remote members to build {0} for")]
    NoRemoteMembers(String),

    #[error("Unsupported networking setup: {0}")]
    UnsupportedNetworking(String),

    #[error(transparent)]
    Types(#[from] TypesError),
}

/// Result type for plan building
pub type Result<T> = std::result::Result<T, PlanError>;
