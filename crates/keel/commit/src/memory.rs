//! In-memory resource manager
//!
//! The configuration is an immutable snapshot behind a lock. A commit
//! builds the next snapshot off to the side and swaps it in, so a reader
//! holding a snapshot sees a transaction either entirely or not at all.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use keel_plan::FencingTopology;
use keel_types::{ResourceDefinition, ResourceSpec, Transaction};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{CommitError, Result};
use crate::manager::ResourceManager;

/// One version of the cluster configuration
#[derive(Debug, Clone, Default)]
pub struct Cib {
    /// Bumped by every commit
    pub epoch: u64,
    pub objects: BTreeMap<String, ResourceDefinition>,
    /// Resources started by a commit
    pub running: BTreeSet<String>,
    pub fencing: Option<FencingTopology>,
}

impl Cib {
    pub fn contains(&self, id: &str) -> bool {
        self.objects.contains_key(id)
    }

    pub fn ids(&self) -> BTreeSet<String> {
        self.objects.keys().cloned().collect()
    }
}

/// Resource manager for tests and dry runs
#[derive(Debug, Default)]
pub struct InMemoryResourceManager {
    cib: RwLock<Arc<Cib>>,
    stuck: RwLock<BTreeSet<String>>,
}

impl InMemoryResourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current configuration
    pub async fn snapshot(&self) -> Arc<Cib> {
        self.cib.read().await.clone()
    }

    /// Make `wait_for` on the resource never return
    pub async fn never_settle(&self, resource: impl Into<String>) {
        self.stuck.write().await.insert(resource.into());
    }

    fn check_references(cib: &Cib, transaction: &Transaction) -> Result<()> {
        let defined: BTreeSet<&str> = transaction.ids().collect();
        let known = |id: &str| defined.contains(id) || cib.contains(id);

        for object in &transaction.objects {
            let referenced: Vec<&str> = match &object.spec {
                ResourceSpec::Group { members, .. } => members.iter().map(String::as_str).collect(),
                ResourceSpec::Clone { target, .. } | ResourceSpec::MultiState { target, .. } => {
                    vec![target.as_str()]
                }
                _ => Vec::new(),
            };
            if let Some(missing) = referenced.into_iter().find(|r| !known(r)) {
                return Err(CommitError::Rejected {
                    transaction: transaction.name.clone(),
                    reason: format!("{} references undefined {}", object.reference(), missing),
                });
            }
        }
        Ok(())
    }
}

fn starts(spec: &ResourceSpec) -> bool {
    matches!(
        spec,
        ResourceSpec::Primitive { .. }
            | ResourceSpec::Group { .. }
            | ResourceSpec::Clone { .. }
            | ResourceSpec::MultiState { .. }
    )
}

#[async_trait]
impl ResourceManager for InMemoryResourceManager {
    async fn commit(&self, transaction: &Transaction) -> Result<()> {
        let mut guard = self.cib.write().await;
        Self::check_references(&guard, transaction)?;

        let mut next = Cib::clone(&guard);
        next.epoch += 1;
        for object in &transaction.objects {
            if starts(&object.spec) {
                next.running.insert(object.id().to_string());
            }
            next.objects.insert(object.id().to_string(), object.clone());
        }
        *guard = Arc::new(next);

        info!(
            transaction = %transaction.name,
            objects = transaction.objects.len(),
            epoch = guard.epoch,
            "Transaction committed"
        );
        Ok(())
    }

    async fn load_fencing(&self, topology: &FencingTopology) -> Result<()> {
        let mut guard = self.cib.write().await;
        let mut next = Cib::clone(&guard);
        next.epoch += 1;
        next.fencing = Some(topology.clone());
        *guard = Arc::new(next);
        debug!(levels = topology.levels.len(), "Fencing topology loaded");
        Ok(())
    }

    async fn resources(&self) -> Result<BTreeSet<String>> {
        Ok(self.snapshot().await.ids())
    }

    async fn wait_for(&self, resource: &str) -> Result<()> {
        if !self.snapshot().await.contains(resource) {
            return Err(CommitError::UnknownResource(resource.to_string()));
        }
        if self.stuck.read().await.contains(resource) {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_types::OpSpec;

    fn primitive(id: &str) -> ResourceDefinition {
        ResourceDefinition::new(ResourceSpec::Primitive {
            id: id.into(),
            agent: "systemd:libvirtd".into(),
            params: BTreeMap::new(),
            ops: [("monitor".to_string(), OpSpec::interval("10s"))].into(),
            meta: BTreeMap::new(),
        })
    }

    fn group(id: &str, members: &[&str]) -> ResourceDefinition {
        ResourceDefinition::new(ResourceSpec::Group {
            id: id.into(),
            members: members.iter().map(|m| m.to_string()).collect(),
        })
    }

    #[tokio::test]
    async fn test_commit_defines_and_starts() {
        let manager = InMemoryResourceManager::new();
        let tx = Transaction::new("compute", vec![primitive("a"), group("g-a", &["a"])]).unwrap();
        manager.commit(&tx).await.unwrap();

        let cib = manager.snapshot().await;
        assert_eq!(cib.epoch, 1);
        assert!(cib.running.contains("a"));
        assert!(cib.running.contains("g-a"));
        assert!(manager.exists("g-a").await.unwrap());
    }

    #[tokio::test]
    async fn test_rejected_commit_changes_nothing() {
        let manager = InMemoryResourceManager::new();
        let tx = Transaction::new("broken", vec![primitive("a"), group("g", &["a", "b"])]).unwrap();

        let err = manager.commit(&tx).await.unwrap_err();
        assert!(matches!(err, CommitError::Rejected { .. }));

        let cib = manager.snapshot().await;
        assert_eq!(cib.epoch, 0);
        assert!(cib.objects.is_empty());
    }

    #[tokio::test]
    async fn test_references_resolve_against_existing_state() {
        let manager = InMemoryResourceManager::new();
        let first = Transaction::new("first", vec![primitive("a")]).unwrap();
        manager.commit(&first).await.unwrap();

        let second = Transaction::new("second", vec![group("g", &["a"])]).unwrap();
        manager.commit(&second).await.unwrap();
        assert_eq!(manager.snapshot().await.epoch, 2);
    }

    #[tokio::test]
    async fn test_wait_for_unknown_resource() {
        let manager = InMemoryResourceManager::new();
        assert!(matches!(
            manager.wait_for("ms-postgresql").await,
            Err(CommitError::UnknownResource(_))
        ));
    }
}
