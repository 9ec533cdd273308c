//! Shared per-node convergence context

use std::sync::Arc;

use keel_commit::{CommitOutcome, ResourceManager, TransactionCommitter};
use keel_coordination::{FounderResolver, SyncBarrier};
use keel_store::ClusterStore;
use keel_types::{ClusterId, NodeId};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::member::ClusterMember;
use crate::network::NetworkAllocator;

/// Handles every convergence run needs
#[derive(Clone)]
pub struct ConvergeContext {
    pub clusters: Arc<dyn ClusterStore>,
    pub founders: FounderResolver,
    pub barrier: SyncBarrier,
    pub manager: Arc<dyn ResourceManager>,
    pub network: Arc<dyn NetworkAllocator>,

    /// Cloud domain virtual hostnames are qualified with
    pub domain: String,
}

impl ConvergeContext {
    pub async fn member(&self, node: &NodeId, cluster: &ClusterId) -> Result<ClusterMember> {
        ClusterMember::resolve(
            node.clone(),
            cluster.clone(),
            self.clusters.as_ref(),
            &self.founders,
        )
        .await
    }

    pub fn committer(&self, member: &ClusterMember) -> TransactionCommitter {
        TransactionCommitter::new(
            self.manager.clone(),
            self.founders.clone(),
            member.node.clone(),
            member.cluster.clone(),
        )
    }
}

impl std::fmt::Debug for ConvergeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConvergeContext")
            .field("barrier", &self.barrier)
            .field("domain", &self.domain)
            .finish_non_exhaustive()
    }
}

/// What one node did during a convergence run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvergeReport {
    pub node: NodeId,

    /// Whether the node acted as founder
    pub founder: bool,

    /// Names of the transactions this node committed
    pub committed: Vec<String>,
}

impl ConvergeReport {
    pub fn new(member: &ClusterMember) -> Self {
        Self {
            node: member.node.clone(),
            founder: member.is_founder(),
            committed: Vec::new(),
        }
    }

    pub fn record(&mut self, outcome: &CommitOutcome) {
        if let CommitOutcome::Committed { transaction, .. } = outcome {
            self.committed.push(transaction.clone());
        }
    }
}
