//! Error types for transaction commit

use keel_coordination::CoordinationError;
use keel_types::TypesError;
use thiserror::Error;

/// Errors raised while committing or waiting for resources
#[derive(Debug, Error)]
pub enum CommitError {
    /// Bounded readiness wait expired; never retried automatically
    #[error("{message} (resource {resource}, manual intervention required)")]
    ManualInterventionRequired { resource: String, message: String },

    #[error("Transaction {transaction} rejected: {reason}")]
    Rejected { transaction: String, reason: String },

    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    #[error("Command `{command}` failed with status {status}: {stderr}")]
    Command {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Types(#[from] TypesError),

    #[error(transparent)]
    Coordination(#[from] CoordinationError),
}

/// Result type for commit operations
pub type Result<T> = std::result::Result<T, CommitError>;
