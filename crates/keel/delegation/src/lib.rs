//! Keel Delegation - Remote Delegation Coordinator
//!
//! Clusters with remote members need their founder to run the compute HA
//! orchestration on the remotes' behalf. The coordinator works out which
//! founders gain or lose the delegate role, updates their run-lists,
//! triggers convergence on all of them concurrently and reports every
//! failing founder in one error.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod config;
pub mod coordinator;
pub mod error;
pub mod executor;

pub use config::DelegationConfig;
pub use coordinator::{DelegationCoordinator, DelegationPlan, DelegationReport};
pub use error::{DelegationError, Result};
pub use executor::{ExecutionResult, RemoteExecutor, ScriptedExecutor, SshExecutor};
