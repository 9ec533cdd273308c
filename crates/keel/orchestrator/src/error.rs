//! Error types for the service lifecycle

use keel_commit::CommitError;
use keel_coordination::CoordinationError;
use keel_delegation::DelegationError;
use keel_plan::PlanError;
use keel_store::StoreError;
use keel_topology::{TopologyError, ValidationReport};
use keel_types::{NodeId, TypesError};
use thiserror::Error;

/// Errors that abort an apply or a convergence run
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("HA is enabled for role {role} but its elements are not exactly one cluster: {found}")]
    NotExactlyOneCluster { role: String, found: String },

    #[error("Proposal {name} is invalid: {report}")]
    Invalid {
        name: String,
        report: ValidationReport,
    },

    #[error("Proposal not found: {service}/{name}")]
    ProposalNotFound { service: String, name: String },

    #[error("Unknown service: {0}")]
    UnknownService(String),

    #[error("Missing attribute {0}")]
    MissingAttribute(String),

    #[error("Node {0} has no admin address")]
    NoAdminAddress(NodeId),

    #[error("Network allocation failed for {hostname} on {network}: {reason}")]
    Network {
        network: String,
        hostname: String,
        reason: String,
    },

    #[error("Replication setup step {step} failed: {reason}")]
    Replication { step: String, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Coordination(#[from] CoordinationError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Commit(#[from] CommitError),

    #[error(transparent)]
    Delegation(#[from] DelegationError),

    #[error(transparent)]
    Types(#[from] TypesError),

    #[error("Topology error: {0}")]
    Topology(TopologyError),
}

impl From<TopologyError> for ApplyError {
    fn from(e: TopologyError) -> Self {
        match e {
            TopologyError::NotExactlyOneCluster { role, found } => {
                ApplyError::NotExactlyOneCluster { role, found }
            }
            other => ApplyError::Topology(other),
        }
    }
}

/// Result type for lifecycle operations
pub type Result<T> = std::result::Result<T, ApplyError>;
