//! Keel Types - Core types for HA convergence
//!
//! Keel converges highly-available multi-node services onto a shared
//! cluster resource manager. This crate holds the data model every other
//! keel crate speaks.
//!
//! ## Key Concepts
//!
//! - **Proposal**: Draft deployment intent (attributes + `elements`)
//! - **Role**: Realized form of a proposal, with final attributes and run-lists
//! - **Node / Cluster**: Typed inventory with capability predicates
//! - **Element**: A node, a cluster, or the remote members of a cluster
//! - **SyncMark**: Named, optionally revisioned barrier
//! - **ResourceDefinition / Transaction**: HA resource objects committed as one unit

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod constraint;
pub mod element;
pub mod error;
pub mod ids;
pub mod node;
pub mod platform;
pub mod proposal;
pub mod resource;
pub mod run_list;
pub mod sync;

pub use constraint::{Cardinality, RoleConstraint, RoleConstraints};
pub use element::{Element, Elements};
pub use error::{Result, TypesError};
pub use ids::{ClusterId, NodeId, ProposalId, TransactionId};
pub use node::{Cluster, IntendedRole, Node};
pub use platform::{Platform, PlatformRule, PlatformRules};
pub use proposal::{Proposal, Role};
pub use resource::{
    OpSpec, Operations, ResourceDefinition, ResourceKind, ResourceSpec, Transaction,
};
pub use run_list::{RunList, RunListEntry};
pub use sync::{SyncMark, SyncPhase};
