//! Resource manager interface

use std::collections::BTreeSet;

use async_trait::async_trait;
use keel_plan::FencingTopology;
use keel_types::Transaction;

use crate::error::Result;

/// The external cluster resource manager
///
/// `commit` defines and starts every object of a transaction as one unit;
/// readers see either all of them or none.
#[async_trait]
pub trait ResourceManager: Send + Sync {
    /// Define and start every object of the transaction
    async fn commit(&self, transaction: &Transaction) -> Result<()>;

    /// Replace the fencing topology
    async fn load_fencing(&self, topology: &FencingTopology) -> Result<()>;

    /// Ids of every configured object
    async fn resources(&self) -> Result<BTreeSet<String>>;

    async fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.resources().await?.contains(id))
    }

    /// Block until the manager has settled the resource
    async fn wait_for(&self, resource: &str) -> Result<()>;
}
