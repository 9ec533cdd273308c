//! `keel propose` and `keel validate`

use std::path::Path;
use std::sync::Arc;

use keel_coordination::{FounderResolver, InMemoryCoordinationStore, SyncBarrier};
use keel_delegation::{DelegationCoordinator, SshExecutor};
use keel_orchestrator::{ComputeService, DatabaseService, InMemoryNetworkAllocator, Service};
use keel_store::InMemoryStore;
use keel_topology::Inventory;
use keel_types::Proposal;
use tracing::{debug, info, warn};

use super::ServiceKind;
use crate::config::KeelConfig;
use crate::document::{self, Format};
use crate::error::{CliError, CliResult};

/// Server-side service object over a snapshot of `inventory`
fn service(
    kind: ServiceKind,
    inventory: &Inventory,
    config: &KeelConfig,
) -> CliResult<Arc<dyn Service>> {
    let store = Arc::new(InMemoryStore::with_inventory(
        inventory.nodes().to_vec(),
        inventory.clusters().to_vec(),
    ));
    let founders = FounderResolver::new(store.clone());
    let barrier = SyncBarrier::new(
        Arc::new(InMemoryCoordinationStore::new()),
        config.barrier.clone(),
    );
    let network = Arc::new(InMemoryNetworkAllocator::with_default_networks());
    let domain = config.cluster.domain.clone();

    let service: Arc<dyn Service> = match kind {
        ServiceKind::Database => Arc::new(DatabaseService::new(founders, barrier, network, domain)?),
        ServiceKind::Compute => {
            let delegation = DelegationCoordinator::new(
                store,
                founders.clone(),
                Arc::new(SshExecutor::default()),
                config.delegation.clone(),
            );
            Arc::new(
                ComputeService::new(founders, barrier, network, delegation, domain)?
                    .with_hypervisor_support(config.cluster.hypervisor_support),
            )
        }
    };
    Ok(service)
}

fn inventory(path: &Path) -> CliResult<Inventory> {
    let inventory: Inventory = document::load(path)?;
    let inventory = inventory.normalized();
    debug!(
        nodes = inventory.nodes().len(),
        clusters = inventory.clusters().len(),
        "Inventory loaded"
    );
    Ok(inventory)
}

/// Default proposal of a service for the inventory
pub fn propose(
    kind: ServiceKind,
    inventory_path: &Path,
    output: Format,
    config: &KeelConfig,
) -> CliResult<String> {
    let inventory = inventory(inventory_path)?;
    let proposal = service(kind, &inventory, config)?.create_proposal(&inventory);
    info!(service = kind.name(), roles = proposal.elements.roles().count(), "Proposal created");
    document::render(&proposal, output)
}

/// Validate a proposal document; failures are returned as an error
pub fn validate(
    kind: ServiceKind,
    inventory_path: &Path,
    proposal_path: &Path,
    config: &KeelConfig,
) -> CliResult<String> {
    let inventory = inventory(inventory_path)?;
    let proposal: Proposal = document::load(proposal_path)?;

    let report = service(kind, &inventory, config)?.validate(&proposal, &inventory);
    if !report.is_ok() {
        warn!(failures = report.failures.len(), "Proposal rejected");
        return Err(CliError::Invalid(report));
    }
    Ok(format!("Proposal {} is valid", proposal.role_name()))
}
