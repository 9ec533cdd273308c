//! Keel Orchestrator - Service Lifecycle
//!
//! Ties the lower crates together for the two HA-capable services:
//!
//! - **Server side**: [`Lifecycle`] saves default proposals, validates them
//!   and promotes them to roles through each [`Service`]'s hooks. The
//!   database service allocates its virtual IP and generates passwords;
//!   the compute service allocates per-cluster VIPs and delegates remote
//!   node setup to cluster founders.
//! - **Node side**: [`DatabaseConvergence`] and [`ComputeHaConvergence`]
//!   run on every cluster member, synchronize through the barrier and let
//!   only the founder commit resource transactions.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod compute;
pub mod converge;
pub mod database;
pub mod error;
pub mod lifecycle;
pub mod member;
pub mod network;
pub mod replication;
pub mod secrets;
pub mod service;

pub use compute::{ComputeHaConvergence, ComputeHaInputs, ComputeService};
pub use converge::{ConvergeContext, ConvergeReport};
pub use database::{DatabaseConvergence, DatabaseService};
pub use error::{ApplyError, Result};
pub use lifecycle::Lifecycle;
pub use member::ClusterMember;
pub use network::{InMemoryNetworkAllocator, NetworkAllocator};
pub use replication::{
    setup_streaming_replication, RecordingReplicationAgent, ReplicaSource, ReplicationAgent,
    ReplicationStep,
};
pub use secrets::random_password;
pub use service::Service;
