//! Keel Commit - Transaction Committer
//!
//! Submits a plan's resource definitions to the cluster resource manager as
//! one transaction. A commit both defines and starts the resources, and no
//! reader ever sees part of a transaction. After a commit a bounded
//! readiness wait can follow; its expiry is fatal and asks the operator to
//! intervene.
//!
//! Two managers are provided: [`InMemoryResourceManager`] for tests and dry
//! runs, and [`CrmShellManager`] driving a real cluster through `crm`.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod committer;
pub mod crm;
pub mod error;
pub mod manager;
pub mod memory;
pub mod readiness;

pub use committer::{CommitOutcome, TransactionCommitter};
pub use crm::CrmShellManager;
pub use error::{CommitError, Result};
pub use manager::ResourceManager;
pub use memory::{Cib, InMemoryResourceManager};
pub use readiness::{wait_ready, CommandProbe, LivenessProbe, ReadinessConfig};
