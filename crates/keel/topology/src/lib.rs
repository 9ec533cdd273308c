//! Keel Topology - Role assignment under constraints
//!
//! The topology resolver turns a node inventory into an `elements` mapping
//! for a service, and the validator checks any `elements` mapping (resolved
//! or operator-authored) against the service's role constraint table.
//!
//! Both are pure: they read an [`Inventory`] snapshot and return values.
//! Validation never raises; it returns a [`ValidationReport`] listing every
//! failure found.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod constraints;
pub mod error;
pub mod expand;
pub mod inventory;
pub mod resolver;
pub mod validation;

pub use constraints::{compute_constraints, database_constraints, roles};
pub use error::{Result, TopologyError};
pub use expand::{expand, Expansion};
pub use inventory::Inventory;
pub use resolver::{AdminExclusion, Bucket, TopologyResolver};
pub use validation::{
    check_exclusive, validate, validate_one_for_role, ValidationFailure, ValidationReport,
};
