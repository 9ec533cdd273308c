//! Founder Resolver
//!
//! The founder is not elected per run: it is read from cluster state. Only
//! when nothing valid is recorded does the first core member get recorded,
//! through the store's compare-and-set, so concurrent first runs agree.

use std::sync::Arc;

use keel_store::{ClusterStore, StoreError};
use keel_types::{ClusterId, NodeId};
use tracing::{debug, info, instrument};

use crate::error::{CoordinationError, Result};

/// Resolves founders against the cluster store
#[derive(Clone)]
pub struct FounderResolver {
    clusters: Arc<dyn ClusterStore>,
}

impl FounderResolver {
    pub fn new(clusters: Arc<dyn ClusterStore>) -> Self {
        Self { clusters }
    }

    /// Founder of a cluster, recording one if none is in effect
    #[instrument(skip(self), fields(cluster = %cluster))]
    pub async fn founder(&self, cluster: &ClusterId) -> Result<NodeId> {
        let state = self
            .clusters
            .get_cluster(cluster)
            .await?
            .ok_or_else(|| CoordinationError::ClusterNotFound(cluster.clone()))?;

        if let Some(founder) = state.current_founder() {
            debug!(founder = %founder, "Founder already recorded");
            return Ok(founder.clone());
        }

        let candidate = state
            .members
            .first()
            .ok_or_else(|| CoordinationError::EmptyCluster(cluster.clone()))?;

        let founder = self
            .clusters
            .record_founder(cluster, candidate)
            .await
            .map_err(|e| match e {
                StoreError::ClusterNotFound(id) => CoordinationError::ClusterNotFound(id),
                StoreError::NotAMember { cluster, node } => {
                    CoordinationError::NotAMember { cluster, node }
                }
                other => CoordinationError::Store(other),
            })?;

        info!(founder = %founder, "Founder recorded");
        Ok(founder)
    }

    /// Guard for every mutating step: true on exactly one member
    pub async fn is_founder(&self, node: &NodeId, cluster: &ClusterId) -> Result<bool> {
        Ok(&self.founder(cluster).await? == node)
    }

    /// Founders of several clusters, deduplicated, in input order
    pub async fn founders<'a>(
        &self,
        clusters: impl IntoIterator<Item = &'a ClusterId>,
    ) -> Result<Vec<NodeId>> {
        let mut founders = Vec::new();
        for cluster in clusters {
            let founder = self.founder(cluster).await?;
            if !founders.contains(&founder) {
                founders.push(founder);
            }
        }
        Ok(founders)
    }
}

impl std::fmt::Debug for FounderResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FounderResolver").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_store::InMemoryStore;
    use keel_types::Cluster;

    fn store(clusters: Vec<Cluster>) -> Arc<InMemoryStore> {
        Arc::new(InMemoryStore::with_inventory(vec![], clusters))
    }

    #[tokio::test]
    async fn test_first_member_becomes_founder() {
        let store = store(vec![Cluster::new(
            "db",
            vec![NodeId::new("b"), NodeId::new("a")],
        )]);
        let resolver = FounderResolver::new(store.clone());
        let cluster = ClusterId::new("db");

        assert_eq!(resolver.founder(&cluster).await.unwrap(), NodeId::new("b"));
        assert!(resolver.is_founder(&NodeId::new("b"), &cluster).await.unwrap());
        assert!(!resolver.is_founder(&NodeId::new("a"), &cluster).await.unwrap());

        let recorded = store.get_cluster(&cluster).await.unwrap().unwrap();
        assert_eq!(recorded.founder, Some(NodeId::new("b")));
    }

    #[tokio::test]
    async fn test_recorded_founder_is_stable() {
        let store = store(vec![Cluster::new(
            "db",
            vec![NodeId::new("a"), NodeId::new("b")],
        )
        .with_founder(NodeId::new("b"))]);
        let resolver = FounderResolver::new(store);

        for _ in 0..3 {
            assert_eq!(
                resolver.founder(&ClusterId::new("db")).await.unwrap(),
                NodeId::new("b")
            );
        }
    }

    #[tokio::test]
    async fn test_departed_founder_is_replaced() {
        let store = store(vec![Cluster::new(
            "db",
            vec![NodeId::new("a"), NodeId::new("b")],
        )
        .with_founder(NodeId::new("gone"))]);
        let resolver = FounderResolver::new(store);

        assert_eq!(
            resolver.founder(&ClusterId::new("db")).await.unwrap(),
            NodeId::new("a")
        );
    }

    #[tokio::test]
    async fn test_errors() {
        let resolver = FounderResolver::new(store(vec![Cluster::new("empty", vec![])]));

        assert!(matches!(
            resolver.founder(&ClusterId::new("empty")).await,
            Err(CoordinationError::EmptyCluster(_))
        ));
        assert!(matches!(
            resolver.founder(&ClusterId::new("missing")).await,
            Err(CoordinationError::ClusterNotFound(_))
        ));
    }
}
