//! Database service
//!
//! Server side: a single `database-server` element, clustered for HA. HA
//! without streaming replication runs one instance on shared or DRBD
//! storage; with streaming replication every member holds a replica and
//! the resource manager promotes one.
//!
//! Node side: replication setup, then the founder commits the "database
//! service" transaction between the `database_before_ha` and
//! `database_ha_resources` marks, and every member waits for the database
//! to answer.

use std::sync::Arc;

use async_trait::async_trait;
use keel_commit::{LivenessProbe, ReadinessConfig};
use keel_coordination::{FounderResolver, SyncBarrier};
use keel_plan::{
    listen_addresses, marks, virtual_fqdn, DatabaseHaPlan, DatabaseHaSettings, ReplicationTuning,
};
use keel_topology::{
    database_constraints, expand, roles, validate, validate_one_for_role, Inventory,
    TopologyResolver, ValidationFailure, ValidationReport,
};
use keel_types::proposal::lookup;
use keel_types::{Element, NodeId, Proposal, Role, RoleConstraints, SyncPhase};
use serde_json::{json, Value};
use tracing::{debug, info, instrument};

use crate::converge::{ConvergeContext, ConvergeReport};
use crate::error::{ApplyError, Result};
use crate::network::NetworkAllocator;
use crate::replication::{setup_streaming_replication, ReplicaSource, ReplicationAgent};
use crate::secrets::keep_or_generate;

pub const SERVICE: &str = "database";

const ENGINES: &[&str] = &["mysql", "postgresql"];
const MYSQL_PASSWORDS: &[&str] = &[
    "server_debian_password",
    "server_root_password",
    "server_repl_password",
];

/// Attribute tree of a fresh database proposal
pub fn default_attributes() -> Value {
    json!({
        "sql_engine": "postgresql",
        "db_maker_password": "",
        "mysql": {},
        "postgresql": {
            "streaming_replication": true,
            "config": {},
            "config_pgtune": { "max_connections": 1000 }
        },
        "ha": {
            "enabled": false,
            "storage": {
                "mode": "shared",
                "shared": { "device": "", "fstype": "", "options": "" },
                "drbd": { "size": 50 }
            }
        }
    })
}

fn str_at<'a>(root: &'a Value, path: &[&str]) -> Option<&'a str> {
    lookup(root, path).and_then(Value::as_str)
}

/// The database service
pub struct DatabaseService {
    constraints: RoleConstraints,
    founders: FounderResolver,
    barrier: SyncBarrier,
    network: Arc<dyn NetworkAllocator>,
    domain: String,
}

impl DatabaseService {
    pub fn new(
        founders: FounderResolver,
        barrier: SyncBarrier,
        network: Arc<dyn NetworkAllocator>,
        domain: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            constraints: database_constraints()?,
            founders,
            barrier,
            network,
            domain: domain.into(),
        })
    }

    pub fn constraints(&self) -> &RoleConstraints {
        &self.constraints
    }

    fn validate_ha_storage(
        &self,
        attributes: &Value,
        cluster: Option<&keel_types::Cluster>,
        report: &mut ValidationReport,
    ) {
        let engine = str_at(attributes, &["sql_engine"]).unwrap_or_default();
        if engine != "postgresql" {
            report.push(ValidationFailure::HaRequiresPostgresql);
        }

        let mode = str_at(attributes, &["ha", "storage", "mode"]).unwrap_or_default();
        match mode {
            "shared" => {
                let blank = |key: &str| {
                    str_at(attributes, &["ha", "storage", "shared", key])
                        .map_or(true, |v| v.trim().is_empty())
                };
                if blank("device") {
                    report.push(ValidationFailure::MissingSharedDevice);
                }
                if blank("fstype") {
                    report.push(ValidationFailure::MissingSharedFilesystem);
                }
            }
            "drbd" => {
                if let Some(cluster) = cluster {
                    if !cluster.drbd_enabled {
                        report.push(ValidationFailure::DrbdNotEnabled {
                            cluster: cluster.id.to_string(),
                        });
                    }
                }
                let size = lookup(attributes, &["ha", "storage", "drbd", "size"])
                    .and_then(Value::as_i64)
                    .unwrap_or(0);
                if size <= 0 {
                    report.push(ValidationFailure::InvalidDrbdSize);
                }
            }
            other => report.push(ValidationFailure::UnknownStorageMode {
                mode: other.to_string(),
            }),
        }
    }
}

#[async_trait]
impl crate::service::Service for DatabaseService {
    fn name(&self) -> &str {
        SERVICE
    }

    fn create_proposal(&self, inventory: &Inventory) -> Proposal {
        let elements = TopologyResolver::database().resolve(inventory);
        Proposal::new(SERVICE, "default")
            .with_attributes(default_attributes())
            .with_elements(elements)
    }

    fn validate(&self, proposal: &Proposal, inventory: &Inventory) -> ValidationReport {
        let mut report = validate(&proposal.elements, &self.constraints, inventory);
        report.extend(validate_one_for_role(&proposal.elements, roles::DATABASE_SERVER));
        let attributes = &proposal.attributes;

        let engine = str_at(attributes, &["sql_engine"]).unwrap_or_default();
        if !ENGINES.contains(&engine) {
            report.push(ValidationFailure::InvalidEngine {
                engine: engine.to_string(),
            });
        }

        let servers = proposal.elements.get(roles::DATABASE_SERVER);
        let cluster = match servers.first() {
            Some(Element::Cluster(id)) => Some(id),
            _ => None,
        };
        let streaming = lookup(attributes, &["postgresql", "streaming_replication"])
            .and_then(Value::as_bool)
            .unwrap_or(false);

        if let Some(id) = cluster {
            if !streaming {
                self.validate_ha_storage(attributes, inventory.cluster(id), &mut report);
            }
        }
        report
    }

    #[instrument(skip(self, old, role, inventory), fields(role = %role.name))]
    async fn apply_role_pre(
        &self,
        old: Option<&Role>,
        mut role: Role,
        inventory: &Inventory,
    ) -> Result<Role> {
        let expansion = expand(role.elements.get(roles::DATABASE_SERVER), inventory)?;
        if expansion.nodes.is_empty() {
            debug!("No database nodes, nothing to prepare");
            return Ok(role);
        }

        for cluster in expansion.clusters() {
            let founder = self.founders.founder(cluster).await?;
            self.barrier.reset(&founder).await?;
        }

        let ha = expansion.ha_enabled;
        role = role.with_default_attr(&["database", "ha", "enabled"], json!(ha));
        if ha {
            let cluster = expansion.single_cluster(roles::DATABASE_SERVER)?;
            let fqdn = virtual_fqdn(&role.name, cluster.as_str(), &self.domain);
            self.network.allocate_virtual_ip("admin", &fqdn).await?;
        } else {
            role = role.with_default_attr(
                &["database", "postgresql", "streaming_replication"],
                json!(false),
            );
        }

        let engine = role
            .default_attr(&["database", "sql_engine"])
            .and_then(Value::as_str)
            .unwrap_or("postgresql")
            .to_string();
        if role.default_attr(&["database", engine.as_str()]).map_or(true, Value::is_null) {
            role = role.with_default_attr(&["database", engine.as_str()], json!({}));
        }

        let previous = |path: &[&str]| old.and_then(|o| o.default_attr(path)).cloned();
        let maker = keep_or_generate(previous(&["database", "db_maker_password"]).as_ref());
        role = role.with_default_attr(&["database", "db_maker_password"], json!(maker));

        match engine.as_str() {
            "mysql" => {
                for key in MYSQL_PASSWORDS.iter().copied() {
                    let path = ["database", "mysql", key];
                    let password = keep_or_generate(previous(&path).as_ref());
                    role = role.with_default_attr(&path, json!(password));
                }
            }
            "postgresql" => {
                let path = ["postgresql", "password", "postgres"];
                let password = keep_or_generate(old.and_then(|o| o.override_attr(&path)));
                role = role.with_override_attr(&path, json!(password));
            }
            _ => {}
        }

        let streaming = role
            .default_attr(&["database", "postgresql", "streaming_replication"])
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if streaming {
            let tuning = ReplicationTuning::for_members(expansion.nodes.len());
            let password =
                keep_or_generate(previous(&["database", "postgresql", "replica_password"]).as_ref());
            role = role
                .with_default_attr(
                    &["database", "postgresql", "replica_user"],
                    json!(tuning.replica_user),
                )
                .with_default_attr(
                    &["database", "postgresql", "replica_password"],
                    json!(password),
                );
            if let Value::Object(entries) = tuning.config_entries() {
                for (key, value) in entries {
                    role = role.with_default_attr(
                        &["database", "postgresql", "config", key.as_str()],
                        value,
                    );
                }
            }
        }

        let engine_attributes = role
            .default_attr(&["database", engine.as_str()])
            .cloned()
            .unwrap_or_else(|| json!({}));
        role = role.with_default_attr(&[engine.as_str()], engine_attributes);

        info!(ha, streaming, engine = %engine, "Database role prepared");
        Ok(role)
    }
}

impl std::fmt::Debug for DatabaseService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseService")
            .field("domain", &self.domain)
            .finish_non_exhaustive()
    }
}

/// Node-side database convergence
pub struct DatabaseConvergence {
    context: ConvergeContext,
    agent: Arc<dyn ReplicationAgent>,
    probe: Arc<dyn LivenessProbe>,
    readiness: ReadinessConfig,
}

impl DatabaseConvergence {
    pub fn new(
        context: ConvergeContext,
        agent: Arc<dyn ReplicationAgent>,
        probe: Arc<dyn LivenessProbe>,
        readiness: ReadinessConfig,
    ) -> Self {
        Self {
            context,
            agent,
            probe,
            readiness,
        }
    }

    /// Converge one database node; `None` when the role is not clustered
    #[instrument(skip(self, role, inventory), fields(role = %role.name))]
    pub async fn converge(
        &self,
        node: &NodeId,
        role: &Role,
        inventory: &Inventory,
    ) -> Result<Option<ConvergeReport>> {
        let expansion = expand(role.elements.get(roles::DATABASE_SERVER), inventory)?;
        if !expansion.ha_enabled {
            debug!(node = %node, "Database is not clustered");
            return Ok(None);
        }
        let cluster = expansion.single_cluster(roles::DATABASE_SERVER)?;
        let member = self.context.member(node, cluster).await?;
        let mut report = ConvergeReport::new(&member);
        let revision = role.revision;

        let fqdn = virtual_fqdn(&role.name, cluster.as_str(), &self.context.domain);
        let vip = self
            .context
            .network
            .virtual_ip("admin", &fqdn)
            .await
            .ok_or_else(|| ApplyError::MissingAttribute(format!("admin VIP of {}", fqdn)))?;

        let postgresql = role
            .default_attr(&["database", "postgresql"])
            .cloned()
            .unwrap_or_else(|| json!({}));
        let streaming = postgresql["streaming_replication"].as_bool().unwrap_or(false);
        let mut settings = DatabaseHaSettings::new(role.name.as_str(), cluster.as_str(), vip)
            .with_streaming_replication(streaming);
        if let Some(port) = postgresql["config"]["port"].as_u64().and_then(|p| u16::try_from(p).ok()) {
            settings.port = port;
        }

        if streaming {
            let founder = inventory
                .node(&member.founder)
                .and_then(|n| n.admin_address.clone())
                .ok_or_else(|| ApplyError::NoAdminAddress(member.founder.clone()))?;
            let source = ReplicaSource {
                address: founder,
                port: settings.port,
                user: postgresql["replica_user"].as_str().unwrap_or("replica").to_string(),
                password: postgresql["replica_password"]
                    .as_str()
                    .ok_or_else(|| {
                        ApplyError::MissingAttribute("database.postgresql.replica_password".to_string())
                    })?
                    .to_string(),
            };
            setup_streaming_replication(
                &member,
                &self.context.barrier,
                self.agent.as_ref(),
                &source,
                revision,
            )
            .await?;
        }

        let barrier = &self.context.barrier;
        member
            .mark(barrier, SyncPhase::Sync, &marks::database_before_ha(revision))
            .await?;
        member
            .mark(barrier, SyncPhase::Wait, &marks::database_ha_resources(revision))
            .await?;

        let plan = DatabaseHaPlan::build(&settings)?;
        let committer = self.context.committer(&member);
        report.record(&committer.commit(&plan.transaction).await?);

        member
            .mark(barrier, SyncPhase::Create, &marks::database_ha_resources(revision))
            .await?;

        let check = self.readiness.apply(&plan.readiness);
        committer.wait_ready(&check, self.probe.as_ref()).await?;

        info!(node = %node, founder = report.founder, "Database converged");
        Ok(Some(report))
    }

    /// Addresses the node's database server listens on for this role
    pub async fn listen_addresses(
        &self,
        node: &NodeId,
        role: &Role,
        inventory: &Inventory,
    ) -> Result<Vec<String>> {
        let address = inventory
            .node(node)
            .and_then(|n| n.admin_address.clone())
            .ok_or_else(|| ApplyError::NoAdminAddress(node.clone()))?;
        let expansion = expand(role.elements.get(roles::DATABASE_SERVER), inventory)?;

        let vip = if expansion.ha_enabled {
            let cluster = expansion.single_cluster(roles::DATABASE_SERVER)?;
            let fqdn = virtual_fqdn(&role.name, cluster.as_str(), &self.context.domain);
            self.context.network.virtual_ip("admin", &fqdn).await
        } else {
            None
        };
        let streaming = role
            .default_attr(&["database", "postgresql", "streaming_replication"])
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Ok(listen_addresses(
            expansion.ha_enabled,
            streaming,
            vip.as_deref(),
            &address,
        ))
    }
}

impl std::fmt::Debug for DatabaseConvergence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConvergence")
            .field("context", &self.context)
            .field("readiness", &self.readiness)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::InMemoryNetworkAllocator;
    use crate::service::Service;
    use keel_coordination::{BarrierConfig, InMemoryCoordinationStore};
    use keel_store::InMemoryStore;
    use keel_types::{Cluster, Elements, Node, Platform};

    fn node(name: &str) -> Node {
        Node::new(name, Platform::new("suse", "12.3"))
    }

    fn inventory() -> Inventory {
        let members = vec![NodeId::new("db1"), NodeId::new("db2"), NodeId::new("db3")];
        Inventory::new(
            vec![node("db1"), node("db2"), node("db3"), node("admin").as_admin()],
            vec![Cluster::new("data", members)],
        )
    }

    fn service(inventory: &Inventory) -> (DatabaseService, Arc<InMemoryNetworkAllocator>) {
        let store = Arc::new(InMemoryStore::with_inventory(
            inventory.nodes().to_vec(),
            inventory.clusters().to_vec(),
        ));
        let network = Arc::new(InMemoryNetworkAllocator::with_default_networks());
        let service = DatabaseService::new(
            FounderResolver::new(store),
            SyncBarrier::new(
                Arc::new(InMemoryCoordinationStore::new()),
                BarrierConfig::default(),
            ),
            network.clone(),
            "cloud.example.com",
        )
        .unwrap();
        (service, network)
    }

    fn clustered(attributes: Value) -> Proposal {
        Proposal::new(SERVICE, "default")
            .with_attributes(attributes)
            .with_elements(
                Elements::new().with(roles::DATABASE_SERVER, vec![Element::cluster("data")]),
            )
    }

    #[test]
    fn test_default_proposal_targets_cluster() {
        let inventory = inventory();
        let (service, _) = service(&inventory);

        let proposal = service.create_proposal(&inventory);
        assert_eq!(
            proposal.elements.get(roles::DATABASE_SERVER),
            &[Element::cluster("data")]
        );
        assert!(service.validate(&proposal, &inventory).is_ok());
    }

    #[test]
    fn test_engine_and_storage_validation() {
        let inventory = inventory();
        let (service, _) = service(&inventory);

        let mut attributes = default_attributes();
        attributes["sql_engine"] = json!("oracle");
        attributes["postgresql"]["streaming_replication"] = json!(false);
        let report = service.validate(&clustered(attributes), &inventory);
        assert!(report.failures.contains(&ValidationFailure::InvalidEngine {
            engine: "oracle".to_string()
        }));
        assert!(report.failures.contains(&ValidationFailure::HaRequiresPostgresql));
        assert!(report.failures.contains(&ValidationFailure::MissingSharedDevice));
        assert!(report.failures.contains(&ValidationFailure::MissingSharedFilesystem));
    }

    #[test]
    fn test_drbd_validation() {
        let inventory = inventory();
        let (service, _) = service(&inventory);

        let mut attributes = default_attributes();
        attributes["postgresql"]["streaming_replication"] = json!(false);
        attributes["ha"]["storage"]["mode"] = json!("drbd");
        attributes["ha"]["storage"]["drbd"]["size"] = json!(0);
        let report = service.validate(&clustered(attributes), &inventory);
        assert_eq!(
            report.failures,
            vec![
                ValidationFailure::DrbdNotEnabled {
                    cluster: "data".to_string()
                },
                ValidationFailure::InvalidDrbdSize,
            ]
        );

        let mut attributes = default_attributes();
        attributes["postgresql"]["streaming_replication"] = json!(false);
        attributes["ha"]["storage"]["mode"] = json!("nfs");
        let report = service.validate(&clustered(attributes), &inventory);
        assert_eq!(
            report.failures,
            vec![ValidationFailure::UnknownStorageMode {
                mode: "nfs".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_apply_with_streaming_replication() {
        let inventory = inventory();
        let (service, network) = service(&inventory);
        let role = Role::from_proposal(&clustered(default_attributes()));

        let role = service.apply_role_pre(None, role, &inventory).await.unwrap();
        assert_eq!(role.default_attr(&["database", "ha", "enabled"]), Some(&json!(true)));
        assert_eq!(
            role.default_attr(&["database", "postgresql", "replica_user"]),
            Some(&json!("replica"))
        );
        assert_eq!(
            role.default_attr(&["postgresql", "config", "max_wal_senders"]),
            Some(&json!(4))
        );
        assert_eq!(
            role.default_attr(&["postgresql", "config", "max_replication_slots"]),
            Some(&json!(3))
        );
        assert!(role.override_attr(&["postgresql", "password", "postgres"]).is_some());
        assert!(network
            .virtual_ip("admin", "database-default-data.cloud.example.com")
            .await
            .is_some());

        // Re-applying keeps every generated password
        let again = service
            .apply_role_pre(
                Some(&role),
                Role::from_proposal(&clustered(default_attributes())),
                &inventory,
            )
            .await
            .unwrap();
        for path in [
            &["database", "db_maker_password"][..],
            &["database", "postgresql", "replica_password"][..],
        ] {
            assert_eq!(again.default_attr(path), role.default_attr(path));
        }
        assert_eq!(
            again.override_attr(&["postgresql", "password", "postgres"]),
            role.override_attr(&["postgresql", "password", "postgres"])
        );
    }

    #[tokio::test]
    async fn test_apply_without_ha_disables_streaming_replication() {
        let inventory = inventory();
        let (service, _) = service(&inventory);
        let mut attributes = default_attributes();
        attributes["sql_engine"] = json!("mysql");
        let proposal = Proposal::new(SERVICE, "default")
            .with_attributes(attributes)
            .with_elements(Elements::new().with(roles::DATABASE_SERVER, vec![Element::node("db1")]));

        let role = service
            .apply_role_pre(None, Role::from_proposal(&proposal), &inventory)
            .await
            .unwrap();
        assert_eq!(
            role.default_attr(&["database", "postgresql", "streaming_replication"]),
            Some(&json!(false))
        );
        assert!(role.default_attr(&["database", "postgresql", "replica_user"]).is_none());
        for key in MYSQL_PASSWORDS {
            assert!(role.default_attr(&["mysql", *key]).is_some());
        }
    }

    #[tokio::test]
    async fn test_apply_rejects_several_clusters() {
        let inventory = inventory().with_cluster(Cluster::new("other", vec![NodeId::new("admin")]));
        let (service, _) = service(&inventory);
        let proposal = Proposal::new(SERVICE, "default")
            .with_attributes(default_attributes())
            .with_elements(Elements::new().with(
                roles::DATABASE_SERVER,
                vec![Element::cluster("data"), Element::cluster("other")],
            ));

        let err = service
            .apply_role_pre(None, Role::from_proposal(&proposal), &inventory)
            .await
            .unwrap_err();
        assert!(matches!(err, ApplyError::NotExactlyOneCluster { .. }));
    }
}
