//! CLI error types

use std::path::PathBuf;

use keel_commit::CommitError;
use keel_orchestrator::ApplyError;
use keel_plan::PlanError;
use keel_topology::ValidationReport;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Unsupported document format: {0} (expected .yaml, .yml or .json)")]
    Format(PathBuf),

    #[error("Cannot render output: {0}")]
    Render(String),

    #[error("{0}")]
    Invalid(ValidationReport),

    #[error(transparent)]
    Apply(#[from] ApplyError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Commit(#[from] CommitError),
}

pub type CliResult<T> = Result<T, CliError>;
