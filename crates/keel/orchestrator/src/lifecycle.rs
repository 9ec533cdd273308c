//! Proposal lifecycle over a store
//!
//! `propose` saves a service's default proposal; `apply` validates it,
//! promotes it to a role, runs the service hooks and saves the result.
//! Nothing is written when validation fails.

use std::collections::BTreeMap;
use std::sync::Arc;

use keel_store::Store;
use keel_topology::{Inventory, ValidationReport};
use keel_types::{Proposal, Role};
use tracing::{info, instrument, warn};

use crate::error::{ApplyError, Result};
use crate::service::Service;

/// Drives registered services against one store
pub struct Lifecycle {
    store: Arc<dyn Store>,
    services: BTreeMap<String, Arc<dyn Service>>,
}

impl Lifecycle {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            services: BTreeMap::new(),
        }
    }

    pub fn with_service(mut self, service: Arc<dyn Service>) -> Self {
        self.services.insert(service.name().to_string(), service);
        self
    }

    fn service(&self, name: &str) -> Result<&Arc<dyn Service>> {
        self.services
            .get(name)
            .ok_or_else(|| ApplyError::UnknownService(name.to_string()))
    }

    /// Current inventory snapshot
    pub async fn inventory(&self) -> Result<Inventory> {
        let nodes = self.store.list_nodes().await?;
        let clusters = self.store.list_clusters().await?;
        Ok(Inventory::new(nodes, clusters))
    }

    /// Create and save the default proposal of a service
    #[instrument(skip(self))]
    pub async fn propose(&self, service: &str, name: &str) -> Result<Proposal> {
        let svc = self.service(service)?;
        let inventory = self.inventory().await?;

        let mut proposal = svc.create_proposal(&inventory);
        proposal.name = name.to_string();
        let saved = self.store.save_proposal(proposal).await?;
        info!(revision = saved.revision, "Proposal created");
        Ok(saved)
    }

    /// Validate a stored proposal
    pub async fn validate(&self, service: &str, name: &str) -> Result<ValidationReport> {
        let svc = self.service(service)?;
        let proposal = self.proposal(service, name).await?;
        let inventory = self.inventory().await?;
        Ok(svc.validate(&proposal, &inventory))
    }

    /// Validate, promote and save a stored proposal
    #[instrument(skip(self))]
    pub async fn apply(&self, service: &str, name: &str) -> Result<Role> {
        let svc = self.service(service)?;
        let proposal = self.proposal(service, name).await?;
        let inventory = self.inventory().await?;

        let report = svc.validate(&proposal, &inventory);
        if !report.is_ok() {
            warn!(failures = report.failures.len(), "Proposal rejected");
            return Err(ApplyError::Invalid {
                name: proposal.role_name(),
                report,
            });
        }

        let old = self.store.get_role(&proposal.role_name()).await?;
        let role = svc
            .apply_role_pre(old.as_ref(), Role::from_proposal(&proposal), &inventory)
            .await?;
        self.store.save_role(role.clone()).await?;
        info!(role = %role.name, revision = role.revision, "Role saved");

        svc.apply_role_post(old.as_ref(), &role, &inventory).await?;
        Ok(role)
    }

    async fn proposal(&self, service: &str, name: &str) -> Result<Proposal> {
        self.store
            .get_proposal(service, name)
            .await?
            .ok_or_else(|| ApplyError::ProposalNotFound {
                service: service.to_string(),
                name: name.to_string(),
            })
    }
}

impl std::fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifecycle")
            .field("services", &self.services.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
