//! Node and cluster inventory types
//!
//! Nodes expose capability predicates instead of free-form attribute
//! probing; clusters carry their ordered core members, their remote
//! members and the externally recorded founder.

use crate::ids::{ClusterId, NodeId};
use crate::platform::Platform;
use crate::run_list::RunList;
use serde::{Deserialize, Serialize};

/// Purpose an operator tagged a node with at discovery time
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IntendedRole {
    Controller,
    Compute,
    Storage,
    Network,
    #[default]
    NoRole,
}

/// An inventory node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Fully-qualified name, used as the element id
    pub id: NodeId,

    /// Short hostname
    pub hostname: String,

    /// Operating system descriptor
    pub platform: Platform,

    /// Target platform chosen at allocation (`windows-6.3`, `hyperv-6.3`, `suse-12.2`)
    #[serde(default)]
    pub target_platform: String,

    /// Intended purpose
    #[serde(default)]
    pub intended_role: IntendedRole,

    /// Whether this is the administrative server
    #[serde(default)]
    pub admin: bool,

    /// CPU feature flags of the first CPU
    #[serde(default)]
    pub cpu_flags: Vec<String>,

    /// Block devices present on the node
    #[serde(default)]
    pub block_devices: Vec<String>,

    /// Cluster this node is a member of, if any
    #[serde(default)]
    pub cluster: Option<ClusterId>,

    /// Ordered run-list of roles applied to this node
    #[serde(default)]
    pub run_list: RunList,

    /// Admin network address, when allocated
    #[serde(default)]
    pub admin_address: Option<String>,
}

impl Node {
    pub fn new(id: impl Into<String>, platform: Platform) -> Self {
        let id = id.into();
        let hostname = id.split('.').next().unwrap_or(&id).to_string();
        Self {
            target_platform: platform.to_string(),
            id: NodeId::new(id),
            hostname,
            platform,
            intended_role: IntendedRole::NoRole,
            admin: false,
            cpu_flags: Vec::new(),
            block_devices: Vec::new(),
            cluster: None,
            run_list: RunList::default(),
            admin_address: None,
        }
    }

    pub fn with_intended_role(mut self, role: IntendedRole) -> Self {
        self.intended_role = role;
        self
    }

    pub fn with_cpu_flags(mut self, flags: &[&str]) -> Self {
        self.cpu_flags = flags.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn with_cluster(mut self, cluster: ClusterId) -> Self {
        self.cluster = Some(cluster);
        self
    }

    pub fn as_admin(mut self) -> Self {
        self.admin = true;
        self
    }

    pub fn is_admin(&self) -> bool {
        self.admin
    }

    pub fn is_storage_only(&self) -> bool {
        self.intended_role == IntendedRole::Storage
    }

    /// Hardware virtualization support (VT-x or AMD-V)
    pub fn supports_hardware_virtualization(&self) -> bool {
        self.cpu_flags.iter().any(|f| f == "vmx" || f == "svm")
    }

    /// Paravirtualized Xen host: suse family, not itself a virtio guest, x86_64
    pub fn supports_xen(&self) -> bool {
        self.platform.family == "suse"
            && !self.block_devices.iter().any(|d| d == "vda")
            && self.platform.arch.contains("x86_64")
    }

    /// Allocated for a Windows or Hyper-V target
    pub fn is_hyperv_target(&self) -> bool {
        self.target_platform.starts_with("windows-") || self.target_platform.starts_with("hyperv-")
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.run_list.contains(role)
    }
}

/// A cluster of nodes managed by one resource manager instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: ClusterId,

    /// Core members in registration order
    pub members: Vec<NodeId>,

    /// Remote (extended) members, disjoint from `members`
    #[serde(default)]
    pub remote_members: Vec<NodeId>,

    /// Externally recorded founder
    #[serde(default)]
    pub founder: Option<NodeId>,

    /// Whether DRBD replicated storage is enabled on this cluster
    #[serde(default)]
    pub drbd_enabled: bool,
}

impl Cluster {
    pub fn new(id: impl Into<String>, members: Vec<NodeId>) -> Self {
        Self {
            id: ClusterId::new(id),
            members,
            remote_members: Vec::new(),
            founder: None,
            drbd_enabled: false,
        }
    }

    pub fn with_remote_members(mut self, remotes: Vec<NodeId>) -> Self {
        self.remote_members = remotes;
        self
    }

    pub fn with_founder(mut self, founder: NodeId) -> Self {
        self.founder = Some(founder);
        self
    }

    pub fn is_member(&self, node: &NodeId) -> bool {
        self.members.contains(node)
    }

    pub fn is_remote_member(&self, node: &NodeId) -> bool {
        self.remote_members.contains(node)
    }

    pub fn has_remotes(&self) -> bool {
        !self.remote_members.is_empty()
    }

    /// Founder if recorded and still a core member
    pub fn current_founder(&self) -> Option<&NodeId> {
        self.founder.as_ref().filter(|f| self.is_member(f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_predicates() {
        let kvm = Node::new("kvm1.example.com", Platform::new("suse", "12.2"))
            .with_cpu_flags(&["fpu", "vmx"]);
        assert!(kvm.supports_hardware_virtualization());
        assert!(kvm.supports_xen());
        assert_eq!(kvm.hostname, "kvm1");

        let mut guest = Node::new("guest.example.com", Platform::new("ubuntu", "16.04"));
        guest.block_devices = vec!["vda".into()];
        assert!(!guest.supports_hardware_virtualization());
        assert!(!guest.supports_xen());

        let mut hv = Node::new("hv.example.com", Platform::new("windows", "6.3"));
        hv.target_platform = "hyperv-6.3".into();
        assert!(hv.is_hyperv_target());
    }

    #[test]
    fn test_current_founder_requires_membership() {
        let cluster = Cluster::new("db", vec![NodeId::new("a"), NodeId::new("b")])
            .with_founder(NodeId::new("c"));
        assert!(cluster.current_founder().is_none());

        let cluster = cluster.with_founder(NodeId::new("b"));
        assert_eq!(cluster.current_founder(), Some(&NodeId::new("b")));
    }
}
