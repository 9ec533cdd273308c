//! Keel Coordination - Single-writer discipline without a lock manager
//!
//! Convergence runs independently on every node of a cluster. Two
//! primitives keep those runs from stepping on each other:
//!
//! - [`FounderResolver`]: every cluster has exactly one founder, read from
//!   the externally recorded election. Mutating work is guarded by
//!   [`FounderResolver::is_founder`] and is a no-op elsewhere.
//! - [`SyncBarrier`]: named rendezvous marks. A node posts a mark; another
//!   waits until every required peer has posted the same mark.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod barrier;
pub mod error;
pub mod founder;
pub mod store;

pub use barrier::{BarrierConfig, MarkOutcome, SyncBarrier};
pub use error::{CoordinationError, Result};
pub use founder::FounderResolver;
pub use store::{CoordinationStore, InMemoryCoordinationStore};
