//! Keel Plan - HA resource plan builder
//!
//! Builds the ordered resource definitions a cluster founder commits for a
//! service: virtual IPs, service primitives (or master/replica sets),
//! placement, colocation and ordering constraints, fencing topology for
//! remote members, and the dependency order on upstream resources.
//!
//! Building is pure. Every definition carries the founder-only guard, and
//! evaluating that guard is left to the committer, so a plan can always be
//! inspected and rendered regardless of where it is built.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod compute;
pub mod crm;
pub mod database;
pub mod error;
pub mod fencing;
pub mod hostname;
pub mod location;
pub mod marks;
pub mod order;
pub mod replication;

pub use compute::{ComputeHaPlan, ComputeHaSettings, KeystoneSettings, NeutronSettings};
pub use crm::{render_definition, render_transaction};
pub use database::{DatabaseHaPlan, DatabaseHaSettings, ReadinessCheck};
pub use error::{PlanError, Result};
pub use fencing::{fencing_topology, FencingTopology, IsolationMode};
pub use hostname::{virtual_fqdn, virtual_hostname, vip_primitive};
pub use location::{compute_only_location, controller_only_location};
pub use order::{order_only_existing, UPSTREAM_RESOURCES};
pub use replication::{listen_addresses, ReplicationTuning};
