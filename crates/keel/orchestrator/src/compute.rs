//! Compute service
//!
//! Server side: a clustered controller plus compute nodes bucketed by
//! hypervisor. Remote members of a cluster can be assigned to the
//! remote-accepting hypervisor roles; after the role is saved their
//! founders are delegated the compute HA setup.
//!
//! Node side (on each such founder): the "compute" and "compute (non-remote
//! bits)" transactions, the fencing topology and the evacuate ordering, all
//! between the `nova_compute_before_ha` and `nova_compute_ha_resources`
//! marks.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use keel_coordination::{FounderResolver, SyncBarrier};
use keel_delegation::DelegationCoordinator;
use keel_plan::{
    marks, virtual_fqdn, ComputeHaPlan, ComputeHaSettings, IsolationMode, KeystoneSettings,
    NeutronSettings,
};
use keel_topology::{
    check_exclusive, compute_constraints, expand, roles, validate, validate_one_for_role,
    Inventory, TopologyResolver, ValidationFailure, ValidationReport,
};
use keel_types::{ClusterId, Element, NodeId, Proposal, Role, RoleConstraints, SyncPhase};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, instrument};

use crate::converge::{ConvergeContext, ConvergeReport};
use crate::error::Result;
use crate::network::NetworkAllocator;
use crate::secrets::random_password;

pub const SERVICE: &str = "compute";

/// Networks the controller gets a virtual IP on
const VIP_NETWORKS: &[&str] = &["admin", "public"];

/// Attribute tree of a fresh compute proposal, secrets generated
pub fn default_attributes() -> Value {
    json!({
        "use_shared_instance_storage": false,
        "service_password": random_password(),
        "db": { "password": random_password() },
        "neutron_metadata_proxy_shared_secret": random_password(),
        "ha": { "enabled": false }
    })
}

/// The compute service
pub struct ComputeService {
    constraints: RoleConstraints,
    founders: FounderResolver,
    barrier: SyncBarrier,
    network: Arc<dyn NetworkAllocator>,
    delegation: DelegationCoordinator,
    domain: String,
    hypervisor_support: bool,
}

impl ComputeService {
    pub fn new(
        founders: FounderResolver,
        barrier: SyncBarrier,
        network: Arc<dyn NetworkAllocator>,
        delegation: DelegationCoordinator,
        domain: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            constraints: compute_constraints()?,
            founders,
            barrier,
            network,
            delegation,
            domain: domain.into(),
            hypervisor_support: false,
        })
    }

    /// Whether Hyper-V compute nodes can be deployed
    pub fn with_hypervisor_support(mut self, available: bool) -> Self {
        self.hypervisor_support = available;
        self
    }

    pub fn constraints(&self) -> &RoleConstraints {
        &self.constraints
    }

    fn validate_xen(&self, proposal: &Proposal, inventory: &Inventory) -> Vec<ValidationFailure> {
        proposal
            .elements
            .get(roles::COMPUTE_XEN)
            .iter()
            .filter_map(|e| match e {
                Element::Node(id) => inventory.node(id),
                _ => None,
            })
            .filter(|n| !n.supports_xen())
            .map(|n| ValidationFailure::XenUnsupported {
                node: n.id.clone(),
                platform: n.platform.to_string(),
                arch: n.platform.arch.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl crate::service::Service for ComputeService {
    fn name(&self) -> &str {
        SERVICE
    }

    fn create_proposal(&self, inventory: &Inventory) -> Proposal {
        let elements = TopologyResolver::compute().resolve(inventory);
        Proposal::new(SERVICE, "default")
            .with_attributes(default_attributes())
            .with_elements(elements)
    }

    fn validate(&self, proposal: &Proposal, inventory: &Inventory) -> ValidationReport {
        let mut report = validate(&proposal.elements, &self.constraints, inventory);
        let elements = &proposal.elements;

        let shared_storage = proposal
            .attr(&["use_shared_instance_storage"])
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if shared_storage
            && elements
                .get(roles::COMPUTE_CONTROLLER)
                .iter()
                .any(Element::is_cluster)
        {
            report.push(ValidationFailure::SharedStorageWithCluster);
        }

        if !elements.get(roles::COMPUTE_HYPERV).is_empty() && !self.hypervisor_support {
            report.push(ValidationFailure::HypervisorSupportMissing {
                role: roles::COMPUTE_HYPERV.to_string(),
            });
        }

        report.extend(validate_one_for_role(elements, roles::COMPUTE_CONTROLLER));
        report.extend(self.validate_xen(proposal, inventory));
        report.extend(check_exclusive(elements, roles::EXCLUSIVE_COMPUTE, inventory));
        report
    }

    #[instrument(skip(self, _old, role, inventory), fields(role = %role.name))]
    async fn apply_role_pre(
        &self,
        _old: Option<&Role>,
        mut role: Role,
        inventory: &Inventory,
    ) -> Result<Role> {
        if !self.hypervisor_support {
            role.elements.set(roles::COMPUTE_HYPERV, Vec::new());
        }

        let controller = expand(role.elements.get(roles::COMPUTE_CONTROLLER), inventory)?;
        let clusters: Vec<ClusterId> = controller.clusters().cloned().collect();
        for cluster in &clusters {
            let founder = self.founders.founder(cluster).await?;
            self.barrier.reset(&founder).await?;
        }

        role = role.with_default_attr(&["compute", "ha", "enabled"], json!(controller.ha_enabled));

        for cluster in &clusters {
            let fqdn = virtual_fqdn(&role.name, cluster.as_str(), &self.domain);
            for network in VIP_NETWORKS {
                self.network.allocate_virtual_ip(network, &fqdn).await?;
            }
        }

        info!(ha = controller.ha_enabled, clusters = clusters.len(), "Compute role prepared");
        Ok(role)
    }

    async fn apply_role_post(
        &self,
        _old: Option<&Role>,
        role: &Role,
        _inventory: &Inventory,
    ) -> Result<()> {
        let report = self
            .delegation
            .run(&role.elements, self.constraints.roles_with_remotes())
            .await?;
        if !report.plan.is_empty() {
            info!(
                founders = report.succeeded.len(),
                "Remote delegation completed"
            );
        }
        Ok(())
    }
}

impl std::fmt::Debug for ComputeService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputeService")
            .field("domain", &self.domain)
            .field("hypervisor_support", &self.hypervisor_support)
            .finish_non_exhaustive()
    }
}

/// Compute HA inputs not derived from the cluster itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeHaInputs {
    pub keystone: KeystoneSettings,
    pub neutron: NeutronSettings,
    pub isolation_mode: IsolationMode,
}

/// Node-side compute HA convergence, run on founders of clusters with
/// remote compute members
#[derive(Debug)]
pub struct ComputeHaConvergence {
    context: ConvergeContext,
}

impl ComputeHaConvergence {
    pub fn new(context: ConvergeContext) -> Self {
        Self { context }
    }

    #[instrument(skip(self, inputs), fields(node = %node, cluster = %cluster))]
    pub async fn converge(
        &self,
        node: &NodeId,
        cluster: &ClusterId,
        inputs: &ComputeHaInputs,
    ) -> Result<ConvergeReport> {
        let member = self.context.member(node, cluster).await?;
        let mut report = ConvergeReport::new(&member);

        let remote_members = self
            .context
            .clusters
            .get_cluster(cluster)
            .await?
            .map(|c| c.remote_members)
            .unwrap_or_default()
            .iter()
            .map(ToString::to_string)
            .collect();
        let settings = ComputeHaSettings {
            keystone: inputs.keystone.clone(),
            neutron: inputs.neutron.clone(),
            domain: self.context.domain.clone(),
            remote_members,
            isolation_mode: inputs.isolation_mode.clone(),
        };

        let barrier = &self.context.barrier;
        member
            .mark(barrier, SyncPhase::Sync, &marks::compute_before_ha())
            .await?;
        member
            .mark(barrier, SyncPhase::Wait, &marks::compute_ha_resources())
            .await?;

        let existing: BTreeSet<String> = self.context.manager.resources().await?;
        let plan = ComputeHaPlan::build(&settings, &existing)?;
        let committer = self.context.committer(&member);

        report.record(&committer.commit(&plan.compute).await?);
        report.record(&committer.commit(&plan.controller).await?);
        report.record(&committer.load_fencing(plan.fencing.as_ref()).await?);
        report.record(&committer.create(plan.evacuate_order.clone()).await?);

        member
            .mark(barrier, SyncPhase::Create, &marks::compute_ha_resources())
            .await?;

        debug!(committed = ?report.committed, "Compute HA converged");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::InMemoryNetworkAllocator;
    use crate::service::Service;
    use keel_coordination::{BarrierConfig, InMemoryCoordinationStore};
    use keel_delegation::{DelegationConfig, ScriptedExecutor};
    use keel_store::InMemoryStore;
    use keel_types::{Cluster, Elements, IntendedRole, Node, Platform};

    fn node(name: &str) -> Node {
        Node::new(name, Platform::new("suse", "12.2"))
    }

    fn inventory() -> Inventory {
        Inventory::new(
            vec![
                node("ctl1").with_intended_role(IntendedRole::Controller),
                node("ctl2"),
                node("kvm1").with_cpu_flags(&["vmx"]),
                node("xen1"),
            ],
            vec![Cluster::new(
                "services",
                vec![NodeId::new("ctl1"), NodeId::new("ctl2")],
            )],
        )
    }

    fn service(inventory: &Inventory) -> ComputeService {
        let store = Arc::new(InMemoryStore::with_inventory(
            inventory.nodes().to_vec(),
            inventory.clusters().to_vec(),
        ));
        let founders = FounderResolver::new(store.clone());
        let delegation = DelegationCoordinator::new(
            store,
            founders.clone(),
            Arc::new(ScriptedExecutor::new()),
            DelegationConfig {
                log_dir: std::env::temp_dir().join("keel-compute-tests"),
                ..DelegationConfig::default()
            },
        );
        ComputeService::new(
            founders,
            SyncBarrier::new(
                Arc::new(InMemoryCoordinationStore::new()),
                BarrierConfig::default(),
            ),
            Arc::new(InMemoryNetworkAllocator::with_default_networks()),
            delegation,
            "cloud.example.com",
        )
        .unwrap()
    }

    #[test]
    fn test_default_proposal() {
        let inventory = inventory();
        let service = service(&inventory);

        let proposal = service.create_proposal(&inventory);
        assert_eq!(
            proposal.elements.get(roles::COMPUTE_CONTROLLER),
            &[Element::cluster("services")]
        );
        assert_eq!(proposal.elements.get(roles::COMPUTE_KVM), &[Element::node("kvm1")]);
        assert_eq!(proposal.elements.get(roles::COMPUTE_XEN), &[Element::node("xen1")]);

        let secret = proposal.attr(&["service_password"]).and_then(Value::as_str);
        assert_eq!(secret.map(str::len), Some(12));
        assert_ne!(
            proposal.attr(&["service_password"]),
            proposal.attr(&["db", "password"])
        );
    }

    #[test]
    fn test_compute_specific_validation() {
        let inventory = inventory();
        let service = service(&inventory);

        let mut proposal = Proposal::new(SERVICE, "default").with_elements(
            Elements::new()
                .with(roles::COMPUTE_CONTROLLER, vec![Element::cluster("services")])
                .with(roles::COMPUTE_KVM, vec![Element::node("kvm1")])
                .with(roles::COMPUTE_QEMU, vec![Element::node("kvm1")])
                .with(roles::COMPUTE_HYPERV, vec![Element::node("xen1")]),
        );
        proposal.attributes = json!({ "use_shared_instance_storage": true });

        let report = service.validate(&proposal, &inventory);
        assert!(report.failures.contains(&ValidationFailure::SharedStorageWithCluster));
        assert!(report.failures.contains(&ValidationFailure::HypervisorSupportMissing {
            role: roles::COMPUTE_HYPERV.to_string()
        }));
        assert!(report.failures.iter().any(|f| matches!(
            f,
            ValidationFailure::AssignedToMultipleRoles { node, .. } if node.as_str() == "kvm1"
        )));
    }

    #[test]
    fn test_xen_on_virtio_guest_rejected() {
        let mut guest = Node::new("xen1", Platform::new("suse", "12.1"));
        guest.block_devices = vec!["vda".to_string()];
        let inventory = Inventory::new(
            vec![node("ctl1"), guest],
            vec![Cluster::new("services", vec![NodeId::new("ctl1")])],
        );
        let service = service(&inventory);
        let proposal = Proposal::new(SERVICE, "default").with_elements(
            Elements::new()
                .with(roles::COMPUTE_CONTROLLER, vec![Element::cluster("services")])
                .with(roles::COMPUTE_XEN, vec![Element::node("xen1")]),
        );

        let report = service.validate(&proposal, &inventory);
        assert_eq!(
            report.failures,
            vec![ValidationFailure::XenUnsupported {
                node: NodeId::new("xen1"),
                platform: "suse-12.1".to_string(),
                arch: "x86_64".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_apply_drops_hyperv_without_support() {
        let inventory = inventory();
        let service = service(&inventory);
        let proposal = Proposal::new(SERVICE, "default").with_elements(
            Elements::new()
                .with(roles::COMPUTE_CONTROLLER, vec![Element::cluster("services")])
                .with(roles::COMPUTE_HYPERV, vec![Element::node("xen1")]),
        );

        let role = service
            .apply_role_pre(None, Role::from_proposal(&proposal), &inventory)
            .await
            .unwrap();
        assert!(role.elements.get(roles::COMPUTE_HYPERV).is_empty());
        assert_eq!(role.default_attr(&["compute", "ha", "enabled"]), Some(&json!(true)));

        let fqdn = "compute-default-services.cloud.example.com";
        for network in VIP_NETWORKS {
            assert!(service.network.virtual_ip(network, fqdn).await.is_some());
        }
    }
}
