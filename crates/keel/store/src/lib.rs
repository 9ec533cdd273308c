//! Keel Store - Proposal, role and inventory storage
//!
//! The store is an external collaborator: keel only needs to read and
//! persist proposals, roles, nodes and clusters. This crate defines those
//! seams as async traits, ships an in-memory implementation for tests and
//! single-process use, and carries the proposal schema migrations.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod error;
pub mod memory;
pub mod migrate;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use migrate::{MigrationDoc, Migrator, PgTune, SchemaMigration, StreamingReplication};
pub use traits::{ClusterStore, NodeStore, ProposalStore, RoleStore, Store};
