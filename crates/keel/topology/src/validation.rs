//! Proposal validation
//!
//! A pure pass over an `elements` mapping. Every failure is collected into
//! a [`ValidationReport`]; nothing is raised, and a failing report blocks
//! the proposal from being promoted without touching the running system.

use std::collections::BTreeMap;
use std::fmt;

use keel_types::{Element, Elements, NodeId, RoleConstraints};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::expand::expand;
use crate::inventory::Inventory;

/// A single validation failure, with the offending role/node named
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationFailure {
    #[error("Role {role} is not known to this service")]
    UnknownRole { role: String },

    #[error("Role {role} needs {expected} element(s), found {found}")]
    Cardinality {
        role: String,
        expected: String,
        found: usize,
    },

    #[error("Role {role} does not accept clusters, got {element}")]
    ClusterNotAllowed { role: String, element: String },

    #[error("Role {role} does not accept remote nodes, got {element}")]
    RemotesNotAllowed { role: String, element: String },

    #[error("Role {role} references unknown element {element}")]
    UnknownElement { role: String, element: String },

    #[error("Node {node} is the admin server and cannot take role {role}")]
    AdminNotAllowed { role: String, node: NodeId },

    #[error("Node {node} runs {platform}, which role {role} does not support")]
    PlatformNotAllowed {
        role: String,
        node: NodeId,
        platform: String,
    },

    #[error("Element {element} of unique role {role} is also used by {other}")]
    NotUnique {
        role: String,
        element: String,
        other: String,
    },

    #[error("Node {node} is assigned to more than one of: {}", roles.join(", "))]
    AssignedToMultipleRoles { node: NodeId, roles: Vec<String> },

    #[error("Shared instance storage cannot be used with a clustered controller")]
    SharedStorageWithCluster,

    #[error("Role {role} is assigned but hypervisor support is not installed")]
    HypervisorSupportMissing { role: String },

    #[error("Node {node} ({platform}, {arch}) cannot run Xen")]
    XenUnsupported {
        node: NodeId,
        platform: String,
        arch: String,
    },

    #[error("Invalid database engine {engine:?}")]
    InvalidEngine { engine: String },

    #[error("HA with shared or DRBD storage is only supported with postgresql")]
    HaRequiresPostgresql,

    #[error("Unknown HA storage mode {mode:?}")]
    UnknownStorageMode { mode: String },

    #[error("No device specified for shared storage")]
    MissingSharedDevice,

    #[error("No filesystem type specified for shared storage")]
    MissingSharedFilesystem,

    #[error("DRBD is not enabled on cluster {cluster}")]
    DrbdNotEnabled { cluster: String },

    #[error("Invalid size for DRBD device")]
    InvalidDrbdSize,
}

/// Every failure found by a validation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub failures: Vec<ValidationFailure>,
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation failure(s)", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "\n  - {}", failure)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationReport {}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn push(&mut self, failure: ValidationFailure) {
        self.failures.push(failure);
    }

    pub fn extend(&mut self, failures: impl IntoIterator<Item = ValidationFailure>) {
        self.failures.extend(failures);
    }

    pub fn merge(mut self, other: ValidationReport) -> Self {
        self.failures.extend(other.failures);
        self
    }

    pub fn into_result(self) -> std::result::Result<(), ValidationReport> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

/// Check `elements` against a constraint table
pub fn validate(
    elements: &Elements,
    constraints: &RoleConstraints,
    inventory: &Inventory,
) -> ValidationReport {
    let mut report = ValidationReport::new();

    for role in elements.roles() {
        if constraints.get(role).is_none() {
            report.push(ValidationFailure::UnknownRole {
                role: role.to_string(),
            });
        }
    }

    for (role, constraint) in constraints.iter() {
        let assigned = elements.get(role);

        if !constraint.count.admits(assigned.len()) {
            report.push(ValidationFailure::Cardinality {
                role: role.to_string(),
                expected: constraint.count.to_string(),
                found: assigned.len(),
            });
        }

        for element in assigned {
            let shape = match element {
                Element::Cluster(_) if !constraint.cluster => {
                    Some(ValidationFailure::ClusterNotAllowed {
                        role: role.to_string(),
                        element: element.to_string(),
                    })
                }
                Element::Remotes(_) if !constraint.remotes => {
                    Some(ValidationFailure::RemotesNotAllowed {
                        role: role.to_string(),
                        element: element.to_string(),
                    })
                }
                _ => None,
            };
            report.extend(shape);

            if constraint.unique {
                for (other, other_elements) in elements.iter() {
                    if other != role && other_elements.contains(element) {
                        report.push(ValidationFailure::NotUnique {
                            role: role.to_string(),
                            element: element.to_string(),
                            other: other.to_string(),
                        });
                    }
                }
            }

            let expansion = match expand(std::slice::from_ref(element), inventory) {
                Ok(expansion) => expansion,
                Err(_) => {
                    report.push(ValidationFailure::UnknownElement {
                        role: role.to_string(),
                        element: element.to_string(),
                    });
                    continue;
                }
            };

            for id in &expansion.nodes {
                let Some(node) = inventory.node(id) else {
                    report.push(ValidationFailure::UnknownElement {
                        role: role.to_string(),
                        element: id.to_string(),
                    });
                    continue;
                };

                if !constraint.admin && node.is_admin() {
                    report.push(ValidationFailure::AdminNotAllowed {
                        role: role.to_string(),
                        node: id.clone(),
                    });
                }

                let included =
                    constraint.platform.is_empty() || constraint.platform.matches(&node.platform);
                let excluded = constraint.exclude_platform.matches(&node.platform);
                if !included || excluded {
                    report.push(ValidationFailure::PlatformNotAllowed {
                        role: role.to_string(),
                        node: id.clone(),
                        platform: node.platform.to_string(),
                    });
                }
            }
        }
    }

    report
}

/// Nodes holding more than one of the mutually exclusive `roles`
pub fn check_exclusive(
    elements: &Elements,
    roles: &[&str],
    inventory: &Inventory,
) -> Vec<ValidationFailure> {
    let mut holders: BTreeMap<NodeId, Vec<String>> = BTreeMap::new();

    for role in roles {
        for element in elements.get(role) {
            let nodes = match expand(std::slice::from_ref(element), inventory) {
                Ok(expansion) => expansion.nodes,
                // Unknown clusters are reported by `validate`
                Err(_) => continue,
            };
            for node in nodes {
                let held = holders.entry(node).or_default();
                if !held.iter().any(|r| r == role) {
                    held.push(role.to_string());
                }
            }
        }
    }

    holders
        .into_iter()
        .filter(|(_, held)| held.len() > 1)
        .map(|(node, roles)| ValidationFailure::AssignedToMultipleRoles { node, roles })
        .collect()
}

/// Cardinality failure unless the role has exactly one element
pub fn validate_one_for_role(elements: &Elements, role: &str) -> Option<ValidationFailure> {
    let found = elements.get(role).len();
    if found == 1 {
        return None;
    }
    Some(ValidationFailure::Cardinality {
        role: role.to_string(),
        expected: "exactly 1".into(),
        found,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::{compute_constraints, database_constraints, roles};
    use keel_types::{Cluster, Node, Platform};

    fn inventory() -> Inventory {
        let mut nodes: Vec<Node> = ["a", "b", "c", "r1"]
            .iter()
            .map(|n| Node::new(*n, Platform::new("suse", "12.2")))
            .collect();
        nodes.push(Node::new("admin", Platform::new("suse", "12.2")).as_admin());
        nodes.push(Node::new("old", Platform::new("suse", "11.4")));
        nodes.push(Node::new("win", Platform::new("windows", "2012r2")));

        Inventory::new(
            nodes,
            vec![
                Cluster::new("db", vec![NodeId::new("a"), NodeId::new("b")])
                    .with_remote_members(vec![NodeId::new("r1")]),
                Cluster::new("with-admin", vec![NodeId::new("admin")]),
            ],
        )
    }

    #[test]
    fn test_valid_database_proposal() {
        let elements = Elements::new().with(roles::DATABASE_SERVER, vec![Element::cluster("db")]);
        let report = validate(&elements, &database_constraints().unwrap(), &inventory());
        assert!(report.is_ok(), "{}", report);
    }

    #[test]
    fn test_bare_node_accepted_for_cluster_role() {
        let elements = Elements::new().with(roles::DATABASE_SERVER, vec![Element::node("a")]);
        let report = validate(&elements, &database_constraints().unwrap(), &inventory());
        assert!(report.is_ok(), "{}", report);
    }

    #[test]
    fn test_cluster_rejected_for_node_role() {
        let elements = Elements::new()
            .with(roles::COMPUTE_CONTROLLER, vec![Element::node("a")])
            .with(roles::COMPUTE_KVM, vec![Element::cluster("db")]);
        let report = validate(&elements, &compute_constraints().unwrap(), &inventory());
        assert!(report.failures.contains(&ValidationFailure::ClusterNotAllowed {
            role: roles::COMPUTE_KVM.into(),
            element: "cluster:db".into(),
        }));
    }

    #[test]
    fn test_one_for_role() {
        let empty = Elements::new().with(roles::DATABASE_SERVER, vec![]);
        assert_eq!(
            validate_one_for_role(&empty, roles::DATABASE_SERVER),
            Some(ValidationFailure::Cardinality {
                role: roles::DATABASE_SERVER.into(),
                expected: "exactly 1".into(),
                found: 0,
            })
        );

        let one = Elements::new().with(roles::DATABASE_SERVER, vec![Element::cluster("db")]);
        assert_eq!(validate_one_for_role(&one, roles::DATABASE_SERVER), None);
    }

    #[test]
    fn test_cardinality_admin_and_unknown() {
        let elements = Elements::new()
            .with(
                roles::DATABASE_SERVER,
                vec![Element::cluster("db"), Element::cluster("with-admin")],
            )
            .with("database-client", vec![]);
        let report = validate(&elements, &database_constraints().unwrap(), &inventory());

        assert!(report.failures.contains(&ValidationFailure::UnknownRole {
            role: "database-client".into()
        }));
        assert!(report.failures.contains(&ValidationFailure::Cardinality {
            role: roles::DATABASE_SERVER.into(),
            expected: "at most 1".into(),
            found: 2,
        }));
        assert!(report.failures.contains(&ValidationFailure::AdminNotAllowed {
            role: roles::DATABASE_SERVER.into(),
            node: NodeId::new("admin"),
        }));
    }

    #[test]
    fn test_platform_rules() {
        let elements = Elements::new()
            .with(roles::COMPUTE_CONTROLLER, vec![Element::cluster("db")])
            .with(
                roles::COMPUTE_KVM,
                vec![Element::node("old"), Element::node("win"), Element::node("c")],
            )
            .with(roles::COMPUTE_VMWARE, vec![Element::node("c")])
            .with(roles::COMPUTE_ZVM, vec![Element::node("c")]);
        let report = validate(&elements, &compute_constraints().unwrap(), &inventory());

        let platform_failures: Vec<_> = report
            .failures
            .iter()
            .filter_map(|f| match f {
                ValidationFailure::PlatformNotAllowed { node, .. } => Some(node.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(platform_failures, vec!["old", "win"]);
    }

    #[test]
    fn test_remotes_only_on_remote_roles() {
        let elements = Elements::new()
            .with(roles::COMPUTE_CONTROLLER, vec![Element::cluster("db")])
            .with(roles::COMPUTE_DOCKER, vec![Element::remotes("db")])
            .with(roles::COMPUTE_QEMU, vec![Element::remotes("db")])
            .with(roles::COMPUTE_VMWARE, vec![Element::node("c")])
            .with(roles::COMPUTE_ZVM, vec![Element::node("c")]);
        let report = validate(&elements, &compute_constraints().unwrap(), &inventory());

        assert_eq!(
            report.failures,
            vec![ValidationFailure::RemotesNotAllowed {
                role: roles::COMPUTE_DOCKER.into(),
                element: "remotes:db".into(),
            }]
        );
    }

    #[test]
    fn test_exclusive_roles_name_the_node() {
        let elements = Elements::new()
            .with(roles::COMPUTE_KVM, vec![Element::node("a"), Element::node("c")])
            .with(roles::COMPUTE_QEMU, vec![Element::cluster("db")])
            .with(roles::COMPUTE_XEN, vec![Element::node("c")]);

        let failures = check_exclusive(&elements, roles::EXCLUSIVE_COMPUTE, &inventory());
        assert_eq!(
            failures,
            vec![
                ValidationFailure::AssignedToMultipleRoles {
                    node: NodeId::new("a"),
                    roles: vec![roles::COMPUTE_KVM.into(), roles::COMPUTE_QEMU.into()],
                },
                ValidationFailure::AssignedToMultipleRoles {
                    node: NodeId::new("c"),
                    roles: vec![roles::COMPUTE_KVM.into(), roles::COMPUTE_XEN.into()],
                },
            ]
        );
        assert_eq!(
            failures[1].to_string(),
            "Node c is assigned to more than one of: compute-kvm, compute-xen"
        );
    }

    #[test]
    fn test_report_into_result() {
        assert!(ValidationReport::new().into_result().is_ok());
        let mut report = ValidationReport::new();
        report.push(ValidationFailure::InvalidDrbdSize);
        assert!(report.into_result().is_err());
    }
}
