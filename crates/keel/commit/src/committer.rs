//! Transaction Committer
//!
//! Applies plans on the founder only. Building a plan never looks at the
//! guard; the committer evaluates it right before touching the resource
//! manager, and elsewhere every call is a no-op.

use std::sync::Arc;

use keel_coordination::FounderResolver;
use keel_plan::{FencingTopology, ReadinessCheck};
use keel_types::{ClusterId, NodeId, ResourceDefinition, Transaction};
use tracing::{debug, info, instrument};

use crate::error::Result;
use crate::manager::ResourceManager;
use crate::readiness::{wait_ready, LivenessProbe};

/// What a guarded call did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed { transaction: String, objects: usize },
    /// This node is not the founder
    Skipped,
    /// Nothing to apply
    Empty,
}

impl CommitOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, CommitOutcome::Committed { .. })
    }
}

/// Commits plans for one node of one cluster
#[derive(Clone)]
pub struct TransactionCommitter {
    manager: Arc<dyn ResourceManager>,
    founders: FounderResolver,
    node: NodeId,
    cluster: ClusterId,
}

impl TransactionCommitter {
    pub fn new(
        manager: Arc<dyn ResourceManager>,
        founders: FounderResolver,
        node: NodeId,
        cluster: ClusterId,
    ) -> Self {
        Self {
            manager,
            founders,
            node,
            cluster,
        }
    }

    pub fn manager(&self) -> &Arc<dyn ResourceManager> {
        &self.manager
    }

    async fn guard(&self, founder_only: bool) -> Result<bool> {
        if !founder_only {
            return Ok(true);
        }
        let allowed = self.founders.is_founder(&self.node, &self.cluster).await?;
        if !allowed {
            debug!(node = %self.node, cluster = %self.cluster, "Not the founder, skipping");
        }
        Ok(allowed)
    }

    /// Commit the transaction as one unit
    #[instrument(skip(self, transaction), fields(node = %self.node, transaction = %transaction.name))]
    pub async fn commit(&self, transaction: &Transaction) -> Result<CommitOutcome> {
        let founder_only = transaction.objects.iter().any(|o| o.founder_only);
        if !self.guard(founder_only).await? {
            return Ok(CommitOutcome::Skipped);
        }

        self.manager.commit(transaction).await?;
        info!(objects = transaction.objects.len(), "Plan applied");
        Ok(CommitOutcome::Committed {
            transaction: transaction.name.clone(),
            objects: transaction.objects.len(),
        })
    }

    /// Commit a single definition unless it already exists
    ///
    /// Used for objects computed against the current resource set, such as
    /// dependency orders over upstream resources.
    pub async fn create(&self, definition: Option<ResourceDefinition>) -> Result<CommitOutcome> {
        let Some(definition) = definition else {
            return Ok(CommitOutcome::Empty);
        };
        if !self.guard(definition.founder_only).await? {
            return Ok(CommitOutcome::Skipped);
        }
        if self.manager.exists(definition.id()).await? {
            debug!(id = %definition.id(), "Already defined");
            return Ok(CommitOutcome::Empty);
        }

        let name = definition.reference();
        let transaction = Transaction::new(name, vec![definition])?;
        self.commit(&transaction).await
    }

    /// Load a fencing topology on the founder
    pub async fn load_fencing(&self, topology: Option<&FencingTopology>) -> Result<CommitOutcome> {
        let Some(topology) = topology else {
            return Ok(CommitOutcome::Empty);
        };
        if !self.guard(true).await? {
            return Ok(CommitOutcome::Skipped);
        }
        self.manager.load_fencing(topology).await?;
        Ok(CommitOutcome::Committed {
            transaction: "fencing_topology".to_string(),
            objects: topology.levels.len(),
        })
    }

    /// Bounded readiness wait; runs on every node
    pub async fn wait_ready(&self, check: &ReadinessCheck, probe: &dyn LivenessProbe) -> Result<()> {
        wait_ready(self.manager.as_ref(), probe, check).await
    }
}

impl std::fmt::Debug for TransactionCommitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionCommitter")
            .field("node", &self.node)
            .field("cluster", &self.cluster)
            .finish_non_exhaustive()
    }
}
