//! Error types for keel-types

use thiserror::Error;

/// Errors raised while parsing or constructing model values
#[derive(Debug, Error)]
pub enum TypesError {
    #[error("Invalid element reference: {0:?}")]
    InvalidElement(String),

    #[error("Invalid platform rule {rule:?}: {reason}")]
    InvalidPlatformRule { rule: String, reason: String },

    #[error("Invalid platform version {0:?}")]
    InvalidVersion(String),

    #[error("Empty transaction: {0}")]
    EmptyTransaction(String),

    #[error("Duplicate resource id {id} in transaction {transaction}")]
    DuplicateResource { transaction: String, id: String },
}

/// Result type for model operations
pub type Result<T> = std::result::Result<T, TypesError>;
