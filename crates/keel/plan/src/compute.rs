//! Compute HA plan
//!
//! Compute services run on the remote members of a cluster as one cloned
//! group; evacuation and the compute fence agent run on the core members.

use std::collections::{BTreeMap, BTreeSet};

use keel_types::{OpSpec, Operations, ResourceDefinition, ResourceSpec, Transaction};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{PlanError, Result};
use crate::fencing::{fencing_topology, FencingTopology, IsolationMode};
use crate::location::{compute_only_location, controller_only_location};
use crate::order::{order_only_existing, UPSTREAM_RESOURCES};

const LIBVIRTD: &str = "libvirtd-compute";
const NOVA_COMPUTE: &str = "nova-compute";
const NOVA_EVACUATE: &str = "nova-evacuate";
const FENCE_NOVA: &str = "fence-nova";

/// Identity service credentials the compute agents authenticate with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeystoneSettings {
    pub internal_auth_url: String,
    pub admin_user: String,
    pub admin_password: String,
    pub admin_tenant: String,
}

/// Networking service settings that decide the compute-side agents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeutronSettings {
    #[serde(default = "default_plugin")]
    pub networking_plugin: String,

    #[serde(default)]
    pub ml2_mechanism_drivers: Vec<String>,

    #[serde(default = "default_ovs_agent")]
    pub ovs_agent_name: String,

    #[serde(default = "default_lb_agent")]
    pub lb_agent_name: String,

    #[serde(default = "default_ovs_ra")]
    pub openvswitch_ra: String,

    #[serde(default = "default_lb_ra")]
    pub linuxbridge_ra: String,

    #[serde(default = "default_l3_ra")]
    pub l3_ra: String,

    #[serde(default = "default_metadata_ra")]
    pub metadata_ra: String,

    /// Distributed virtual routing: l3 and metadata agents on compute nodes
    #[serde(default)]
    pub use_dvr: bool,
}

fn default_plugin() -> String {
    "ml2".to_string()
}

fn default_ovs_agent() -> String {
    "openstack-neutron-openvswitch-agent".to_string()
}

fn default_lb_agent() -> String {
    "openstack-neutron-linuxbridge-agent".to_string()
}

fn default_ovs_ra() -> String {
    "ocf:neutron:NeutronOVSAgent".to_string()
}

fn default_lb_ra() -> String {
    "ocf:neutron:NeutronLBAgent".to_string()
}

fn default_l3_ra() -> String {
    "ocf:neutron:NeutronL3Agent".to_string()
}

fn default_metadata_ra() -> String {
    "ocf:neutron:NeutronMetadataAgent".to_string()
}

impl NeutronSettings {
    /// ml2 with the given mechanism drivers and stock agent names
    pub fn ml2<I, S>(drivers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            networking_plugin: default_plugin(),
            ml2_mechanism_drivers: drivers.into_iter().map(Into::into).collect(),
            ovs_agent_name: default_ovs_agent(),
            lb_agent_name: default_lb_agent(),
            openvswitch_ra: default_ovs_ra(),
            linuxbridge_ra: default_lb_ra(),
            l3_ra: default_l3_ra(),
            metadata_ra: default_metadata_ra(),
            use_dvr: false,
        }
    }

    pub fn with_dvr(mut self, enabled: bool) -> Self {
        self.use_dvr = enabled;
        self
    }

    /// `(agent name, resource agent)` of the compute-side L2 agent
    ///
    /// openvswitch wins over linuxbridge when both drivers are enabled.
    fn l2_agent(&self) -> Result<Option<(&str, &str)>> {
        if self.networking_plugin != "ml2" {
            return Ok(None);
        }
        let has = |driver: &str| self.ml2_mechanism_drivers.iter().any(|d| d == driver);
        if has("openvswitch") {
            Ok(Some((self.ovs_agent_name.as_str(), self.openvswitch_ra.as_str())))
        } else if has("linuxbridge") {
            Ok(Some((self.lb_agent_name.as_str(), self.linuxbridge_ra.as_str())))
        } else {
            Err(PlanError::UnsupportedNetworking(format!(
                "ml2 without openvswitch or linuxbridge ({})",
                self.ml2_mechanism_drivers.join(",")
            )))
        }
    }
}

/// Inputs of the compute HA plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeHaSettings {
    pub keystone: KeystoneSettings,
    pub neutron: NeutronSettings,

    /// Cloud domain handed to the compute agents
    pub domain: String,

    /// Hostnames of the cluster's remote members
    pub remote_members: Vec<String>,

    pub isolation_mode: IsolationMode,
}

/// Everything the founder commits for compute HA
#[derive(Debug, Clone)]
pub struct ComputeHaPlan {
    /// Resources running on the remote members
    pub compute: Transaction,

    /// Resources running on the core members
    pub controller: Transaction,

    /// `None` when fencing is unmanaged
    pub fencing: Option<FencingTopology>,

    /// `None` when no upstream resource exists yet
    pub evacuate_order: Option<ResourceDefinition>,
}

fn monitor() -> Operations {
    Operations::from([("monitor".to_string(), OpSpec::interval("10s"))])
}

fn primitive(id: &str, agent: &str, params: BTreeMap<String, String>) -> ResourceDefinition {
    ResourceDefinition::new(ResourceSpec::Primitive {
        id: id.to_string(),
        agent: agent.to_string(),
        params,
        ops: monitor(),
        meta: BTreeMap::new(),
    })
}

fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl ComputeHaPlan {
    /// Build the plan; `existing` lists resources already in the cluster
    pub fn build(settings: &ComputeHaSettings, existing: &BTreeSet<String>) -> Result<Self> {
        if settings.remote_members.is_empty() {
            return Err(PlanError::NoRemoteMembers("compute HA".to_string()));
        }

        let compute = Self::compute_transaction(settings)?;
        let controller = Self::controller_transaction(settings)?;
        let fencing = fencing_topology(
            &settings.isolation_mode,
            &settings.remote_members,
            Some(FENCE_NOVA),
        );
        let evacuate_order = order_only_existing(
            &format!("o-{}", NOVA_EVACUATE),
            UPSTREAM_RESOURCES,
            NOVA_EVACUATE,
            existing,
        );
        if evacuate_order.is_none() {
            warn!("No upstream resources found, nova-evacuate left unordered");
        }

        debug!(
            remotes = settings.remote_members.len(),
            mode = %settings.isolation_mode,
            "Compute HA plan built"
        );

        Ok(Self {
            compute,
            controller,
            fencing,
            evacuate_order,
        })
    }

    fn compute_transaction(settings: &ComputeHaSettings) -> Result<Transaction> {
        let neutron = &settings.neutron;
        let keystone = &settings.keystone;

        let mut primitives = vec![primitive(LIBVIRTD, "systemd:libvirtd", BTreeMap::new())];

        if let Some((agent, ra)) = neutron.l2_agent()? {
            let name = format!("{}-compute", agent.strip_prefix("openstack-").unwrap_or(agent));
            primitives.push(primitive(&name, ra, BTreeMap::new()));
        }

        if neutron.use_dvr {
            primitives.push(primitive("neutron-l3-agent-compute", &neutron.l3_ra, BTreeMap::new()));
            primitives.push(primitive(
                "neutron-metadata-agent-compute",
                &neutron.metadata_ra,
                BTreeMap::new(),
            ));
        }

        primitives.push(primitive(
            NOVA_COMPUTE,
            "ocf:openstack:NovaCompute",
            params(&[
                ("auth_url", keystone.internal_auth_url.as_str()),
                ("endpoint_type", "internalURL"),
                ("username", keystone.admin_user.as_str()),
                ("password", keystone.admin_password.as_str()),
                ("tenant_name", keystone.admin_tenant.as_str()),
                ("domain", settings.domain.as_str()),
            ]),
        ));

        let group = format!("g-{}", NOVA_COMPUTE);
        let clone = format!("cl-{}", group);
        let members = primitives.iter().map(|p| p.id().to_string()).collect();

        let mut objects = primitives;
        objects.push(ResourceDefinition::new(ResourceSpec::Group {
            id: group.clone(),
            members,
        }));
        let clone_max = settings.remote_members.len().to_string();
        objects.push(ResourceDefinition::new(ResourceSpec::Clone {
            id: clone.clone(),
            target: group,
            meta: params(&[("clone-max", clone_max.as_str())]),
        }));
        objects.push(compute_only_location(&clone));

        Ok(Transaction::new("compute", objects)?)
    }

    fn controller_transaction(settings: &ComputeHaSettings) -> Result<Transaction> {
        let keystone = &settings.keystone;
        let clone = format!("cl-g-{}", NOVA_COMPUTE);

        let objects = vec![
            primitive(
                NOVA_EVACUATE,
                "ocf:openstack:NovaEvacuate",
                params(&[
                    ("auth_url", keystone.internal_auth_url.as_str()),
                    ("endpoint_type", "internalURL"),
                    ("username", keystone.admin_user.as_str()),
                    ("password", keystone.admin_password.as_str()),
                    ("tenant_name", keystone.admin_tenant.as_str()),
                ]),
            ),
            controller_only_location(NOVA_EVACUATE),
            ResourceDefinition::new(ResourceSpec::Order {
                id: format!("o-{}", clone),
                score: "Mandatory".to_string(),
                ordering: format!("{} {}", clone, NOVA_EVACUATE),
            }),
            primitive(
                FENCE_NOVA,
                "stonith:fence_compute",
                params(&[
                    ("auth-url", keystone.internal_auth_url.as_str()),
                    ("endpoint-type", "internalURL"),
                    ("login", keystone.admin_user.as_str()),
                    ("passwd", keystone.admin_password.as_str()),
                    ("tenant-name", keystone.admin_tenant.as_str()),
                    ("domain", settings.domain.as_str()),
                    ("record-only", "1"),
                    ("verbose", "1"),
                    ("debug", "/var/log/nova/fence_compute.log"),
                ]),
            ),
        ];

        Ok(Transaction::new("compute (non-remote bits)", objects)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(drivers: &[&str], dvr: bool, mode: IsolationMode) -> ComputeHaSettings {
        ComputeHaSettings {
            keystone: KeystoneSettings {
                internal_auth_url: "http://keystone:5000/v3".into(),
                admin_user: "admin".into(),
                admin_password: "secret".into(),
                admin_tenant: "openstack".into(),
            },
            neutron: NeutronSettings::ml2(drivers.iter().copied()).with_dvr(dvr),
            domain: "cloud.example.com".into(),
            remote_members: vec!["c1".into(), "c2".into()],
            isolation_mode: mode,
        }
    }

    fn existing(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_compute_transaction_with_dvr() {
        let plan = ComputeHaPlan::build(
            &settings(&["linuxbridge", "openvswitch"], true, IsolationMode::Sbd),
            &existing(&["rabbitmq"]),
        )
        .unwrap();

        assert_eq!(plan.compute.name, "compute");
        assert_eq!(
            plan.compute.references(),
            vec![
                "primitive[libvirtd-compute]",
                "primitive[neutron-openvswitch-agent-compute]",
                "primitive[neutron-l3-agent-compute]",
                "primitive[neutron-metadata-agent-compute]",
                "primitive[nova-compute]",
                "group[g-nova-compute]",
                "clone[cl-g-nova-compute]",
                "location[l-cl-g-nova-compute-compute]",
            ]
        );

        let clone_max = plan.compute.objects.iter().find_map(|o| match &o.spec {
            ResourceSpec::Clone { meta, .. } => meta.get("clone-max").cloned(),
            _ => None,
        });
        assert_eq!(clone_max.as_deref(), Some("2"));
    }

    #[test]
    fn test_linuxbridge_without_dvr() {
        let plan = ComputeHaPlan::build(
            &settings(&["linuxbridge"], false, IsolationMode::Sbd),
            &existing(&[]),
        )
        .unwrap();
        let ids: Vec<_> = plan.compute.ids().collect();
        assert_eq!(
            &ids[..3],
            &["libvirtd-compute", "neutron-linuxbridge-agent-compute", "nova-compute"]
        );
        assert!(plan.evacuate_order.is_none());
    }

    #[test]
    fn test_controller_transaction() {
        let plan = ComputeHaPlan::build(
            &settings(&["openvswitch"], false, IsolationMode::Shared),
            &existing(&["postgresql", "rabbitmq"]),
        )
        .unwrap();

        assert_eq!(plan.controller.name, "compute (non-remote bits)");
        assert_eq!(
            plan.controller.references(),
            vec![
                "primitive[nova-evacuate]",
                "location[l-nova-evacuate-controller]",
                "order[o-cl-g-nova-compute]",
                "primitive[fence-nova]",
            ]
        );

        let fencing = plan.fencing.unwrap();
        assert_eq!(
            fencing.lines(),
            vec![
                "remote-c1: stonith-shared,fence-nova",
                "remote-c2: stonith-shared,fence-nova"
            ]
        );

        match plan.evacuate_order.unwrap().spec {
            ResourceSpec::Order { id, ordering, .. } => {
                assert_eq!(id, "o-nova-evacuate");
                assert_eq!(ordering, "( postgresql rabbitmq ) nova-evacuate");
            }
            other => panic!("unexpected spec {:?}", other),
        }
    }

    #[test]
    fn test_manual_mode_has_no_topology() {
        let plan = ComputeHaPlan::build(
            &settings(&["openvswitch"], false, IsolationMode::Manual),
            &existing(&[]),
        )
        .unwrap();
        assert!(plan.fencing.is_none());
    }

    #[test]
    fn test_rejects_missing_remotes_and_drivers() {
        let mut s = settings(&["openvswitch"], false, IsolationMode::Sbd);
        s.remote_members.clear();
        assert!(matches!(
            ComputeHaPlan::build(&s, &existing(&[])),
            Err(PlanError::NoRemoteMembers(_))
        ));

        let s = settings(&["macvtap"], false, IsolationMode::Sbd);
        assert!(matches!(
            ComputeHaPlan::build(&s, &existing(&[])),
            Err(PlanError::UnsupportedNetworking(_))
        ));
    }

    #[test]
    fn test_settings_from_yaml() {
        let yaml = r#"
keystone:
  internal_auth_url: http://keystone:5000/v3
  admin_user: admin
  admin_password: secret
  admin_tenant: openstack
neutron:
  ml2_mechanism_drivers: [openvswitch]
domain: cloud.example.com
remote_members: [c1]
isolation_mode: per_node
"#;
        let settings: ComputeHaSettings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.isolation_mode, IsolationMode::PerNode);
        assert_eq!(settings.neutron.networking_plugin, "ml2");
        assert!(!settings.neutron.use_dvr);
    }
}
