//! Remote Delegation Coordinator
//!
//! Remote members cannot run the cluster orchestration themselves, so the
//! founder of every cluster whose remotes are assigned gets a delegate role
//! and a triggered convergence run. Founders that no longer qualify get the
//! delegate role swapped for a removal marker, which is cleared only once
//! their run succeeds; a failed cleanup is retried by the next invocation.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::future::join_all;
use keel_coordination::FounderResolver;
use keel_store::NodeStore;
use keel_types::{Elements, Node, NodeId};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use crate::config::DelegationConfig;
use crate::error::{DelegationError, Result};
use crate::executor::RemoteExecutor;

/// Founders gaining and losing the delegate role
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationPlan {
    pub add: Vec<NodeId>,
    pub remove: Vec<NodeId>,
}

impl DelegationPlan {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }

    /// Every founder to trigger, kept first
    pub fn all(&self) -> impl Iterator<Item = &NodeId> {
        self.add.iter().chain(self.remove.iter())
    }
}

/// Summary of a successful delegation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationReport {
    pub plan: DelegationPlan,
    pub succeeded: Vec<NodeId>,
}

/// Triggers and aggregates convergence on founders
#[derive(Clone)]
pub struct DelegationCoordinator {
    nodes: Arc<dyn NodeStore>,
    founders: FounderResolver,
    executor: Arc<dyn RemoteExecutor>,
    config: DelegationConfig,
}

impl DelegationCoordinator {
    pub fn new(
        nodes: Arc<dyn NodeStore>,
        founders: FounderResolver,
        executor: Arc<dyn RemoteExecutor>,
        config: DelegationConfig,
    ) -> Self {
        Self {
            nodes,
            founders,
            executor,
            config,
        }
    }

    pub fn config(&self) -> &DelegationConfig {
        &self.config
    }

    /// Diff the founders of `remotes:` elements against current holders
    /// of the delegate role
    pub async fn plan<'a>(
        &self,
        elements: &Elements,
        roles_with_remotes: impl IntoIterator<Item = &'a str>,
    ) -> Result<DelegationPlan> {
        let clusters: Vec<_> = roles_with_remotes
            .into_iter()
            .flat_map(|role| elements.get(role))
            .filter(|e| e.is_remotes())
            .filter_map(|e| e.cluster_id())
            .collect();
        let add = self.founders.founders(clusters).await?;

        // Holders of a pending removal marker are retried as well
        let wanted: BTreeSet<&NodeId> = add.iter().collect();
        let mut holders = BTreeSet::new();
        for role in [self.config.role.clone(), self.config.remove_role()] {
            for node in self.nodes.find_nodes_with_role(&role).await? {
                holders.insert(node.id);
            }
        }
        let remove = holders
            .into_iter()
            .filter(|id| !wanted.contains(id))
            .collect();

        Ok(DelegationPlan { add, remove })
    }

    /// Plan, mutate run-lists, trigger every founder and aggregate failures
    #[instrument(skip(self, elements, roles_with_remotes))]
    pub async fn run<'a>(
        &self,
        elements: &Elements,
        roles_with_remotes: impl IntoIterator<Item = &'a str>,
    ) -> Result<DelegationReport> {
        let plan = self.plan(elements, roles_with_remotes).await?;
        if plan.is_empty() {
            debug!("No founders to delegate to");
            return Ok(DelegationReport::default());
        }

        self.assign_roles(&plan).await?;

        info!(
            add = plan.add.len(),
            remove = plan.remove.len(),
            "Triggering convergence on founders"
        );
        let runs = plan.all().map(|founder| async move {
            let log = self.config.log_file(founder.as_str());
            let outcome = self.executor.run(founder, &self.config.command, &log).await;
            (founder.clone(), outcome)
        });
        let outcomes = join_all(runs).await;

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        for (founder, outcome) in outcomes {
            match outcome {
                Ok(result) if result.success() => succeeded.push(founder),
                Ok(result) => {
                    warn!(founder = %founder, status = ?result.status, "Delegated run failed");
                    failed.push(founder);
                }
                Err(e) => {
                    warn!(founder = %founder, error = %e, "Delegated run could not start");
                    failed.push(founder);
                }
            }
        }

        // Removal markers stay on failed founders for the next run
        for founder in plan.remove.iter().filter(|f| succeeded.contains(f)) {
            self.clear_remove_marker(founder).await?;
        }

        if !failed.is_empty() {
            error!(failed = failed.len(), "Remote delegation failed");
            return Err(DelegationError::Failed { founders: failed });
        }

        Ok(DelegationReport { plan, succeeded })
    }

    async fn assign_roles(&self, plan: &DelegationPlan) -> Result<()> {
        let role = &self.config.role;
        let remove_role = self.config.remove_role();

        for id in &plan.add {
            let mut node = self.node(id).await?;
            let unmarked = node.run_list.remove(&remove_role);
            let added = node.run_list.add(role, self.config.priority, &self.config.state);
            if added || unmarked {
                self.nodes.save_node(node).await?;
                debug!(founder = %id, role = %role, "Delegate role added");
            }
        }

        for id in &plan.remove {
            let mut node = self.node(id).await?;
            let removed = node.run_list.remove(role);
            let marked = node
                .run_list
                .add(&remove_role, self.config.priority, &self.config.state);
            if removed || marked {
                self.nodes.save_node(node).await?;
                debug!(founder = %id, role = %remove_role, "Delegate role queued for removal");
            }
        }
        Ok(())
    }

    async fn clear_remove_marker(&self, id: &NodeId) -> Result<()> {
        let mut node = self.node(id).await?;
        if node.run_list.remove(&self.config.remove_role()) {
            self.nodes.save_node(node).await?;
            debug!(founder = %id, "Removal marker cleared");
        }
        Ok(())
    }

    async fn node(&self, id: &NodeId) -> Result<Node> {
        self.nodes
            .get_node(id)
            .await?
            .ok_or_else(|| DelegationError::NodeNotFound(id.clone()))
    }
}

impl std::fmt::Debug for DelegationCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegationCoordinator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
