//! Database HA plan
//!
//! With streaming replication the database runs as a master/replica set;
//! the admin VIP follows the master, is started only after a promotion and
//! stopped only after a demotion. Without streaming replication a single
//! instance runs next to the VIP on shared or DRBD-backed storage.

use std::collections::BTreeMap;
use std::time::Duration;

use keel_types::{OpSpec, Operations, ResourceDefinition, ResourceSpec, Transaction};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::hostname::{vip_primitive, virtual_hostname};
use crate::location::controller_only_location;

const SERVICE: &str = "postgresql";

/// Inputs of the database plan, read from the applied role and the node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseHaSettings {
    /// Applied role name (`database-config-default`)
    pub role_name: String,

    /// Cluster the database role is assigned to
    pub cluster: String,

    /// Admin network address allocated to the virtual hostname
    pub vip_address: String,

    /// Data directory
    #[serde(default = "default_pgdata")]
    pub pgdata: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub streaming_replication: bool,

    /// Agent of the single-instance service
    #[serde(default = "default_service_agent")]
    pub service_agent: String,
}

fn default_pgdata() -> String {
    "/var/lib/pgsql/data".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_service_agent() -> String {
    "systemd:postgresql".to_string()
}

impl DatabaseHaSettings {
    pub fn new(role_name: impl Into<String>, cluster: impl Into<String>, vip: impl Into<String>) -> Self {
        Self {
            role_name: role_name.into(),
            cluster: cluster.into(),
            vip_address: vip.into(),
            pgdata: default_pgdata(),
            port: default_port(),
            streaming_replication: false,
            service_agent: default_service_agent(),
        }
    }

    pub fn with_streaming_replication(mut self, enabled: bool) -> Self {
        self.streaming_replication = enabled;
        self
    }
}

/// Post-commit readiness wait of a service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessCheck {
    /// Resource to wait for
    pub resource: String,

    /// Bound on the whole wait
    pub timeout: Duration,

    /// Interval between liveness probes
    pub probe_interval: Duration,

    /// Reported when the bound expires
    pub failure_message: String,
}

impl ReadinessCheck {
    pub fn database(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            timeout: Duration::from_secs(30),
            probe_interval: Duration::from_secs(2),
            failure_message: "PostgreSQL is not started. Please manually check for an error."
                .to_string(),
        }
    }
}

/// Everything the founder commits for the database service
#[derive(Debug, Clone)]
pub struct DatabaseHaPlan {
    pub vhostname: String,
    pub transaction: Transaction,
    pub readiness: ReadinessCheck,
}

fn op(name: &str, spec: OpSpec) -> (String, OpSpec) {
    (name.to_string(), spec)
}

fn meta(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl DatabaseHaPlan {
    pub fn build(settings: &DatabaseHaSettings) -> Result<Self> {
        let vhostname = virtual_hostname(&settings.role_name, &settings.cluster);
        let vip = vip_primitive("admin", vhostname.as_str());

        let mut objects = vec![
            ResourceDefinition::new(ResourceSpec::Primitive {
                id: vip.clone(),
                agent: "ocf:heartbeat:IPaddr2".to_string(),
                params: meta(&[("ip", settings.vip_address.as_str())]),
                ops: Operations::from([op("monitor", OpSpec::interval("10s"))]),
                meta: BTreeMap::new(),
            }),
            controller_only_location(&vip),
        ];

        let readiness = if settings.streaming_replication {
            let ms = format!("ms-{}", SERVICE);
            objects.extend(Self::replicated_service(settings, &vip, &ms));
            ReadinessCheck::database(ms)
        } else {
            objects.extend(Self::single_service(settings, &vip));
            ReadinessCheck::database(SERVICE)
        };

        let transaction = Transaction::new("database service", objects)?;
        debug!(
            vhostname = %vhostname,
            objects = transaction.objects.len(),
            "Database plan built"
        );

        Ok(Self {
            vhostname,
            transaction,
            readiness,
        })
    }

    fn replicated_service(
        settings: &DatabaseHaSettings,
        vip: &str,
        ms: &str,
    ) -> Vec<ResourceDefinition> {
        let port = settings.port.to_string();
        vec![
            ResourceDefinition::new(ResourceSpec::Primitive {
                id: SERVICE.to_string(),
                agent: "ocf:heartbeat:pgsqlms".to_string(),
                params: meta(&[
                    ("pgdata", settings.pgdata.as_str()),
                    ("pghost", settings.vip_address.as_str()),
                    ("pgport", port.as_str()),
                ]),
                ops: Operations::from([
                    op("start", OpSpec::timeout("60s")),
                    op("stop", OpSpec::timeout("60s")),
                    op("promote", OpSpec::timeout("30s")),
                    op("demote", OpSpec::timeout("120s")),
                    op("monitor", OpSpec::interval("15s").with_timeout("10s")),
                    op("notify", OpSpec::timeout("60s")),
                ]),
                meta: BTreeMap::new(),
            }),
            ResourceDefinition::new(ResourceSpec::MultiState {
                id: ms.to_string(),
                target: SERVICE.to_string(),
                meta: meta(&[
                    ("master-max", "1"),
                    ("master-node-max", "1"),
                    ("ordered", "false"),
                    ("interleave", "false"),
                    ("notify", "true"),
                ]),
            }),
            controller_only_location(ms),
            ResourceDefinition::new(ResourceSpec::Colocation {
                id: format!("col-{}", ms),
                score: "inf".to_string(),
                resources: vec![vip.to_string(), format!("{}:Master", ms)],
            }),
            // One-way: no implied reverse order
            ResourceDefinition::new(ResourceSpec::Order {
                id: format!("o-promote-{}", ms),
                score: "Mandatory".to_string(),
                ordering: format!("{}:promote {}:start symmetrical=false", ms, vip),
            }),
            ResourceDefinition::new(ResourceSpec::Order {
                id: format!("o-demote-{}", ms),
                score: "Mandatory".to_string(),
                ordering: format!("{}:demote {}:stop symmetrical=false", ms, vip),
            }),
        ]
    }

    fn single_service(settings: &DatabaseHaSettings, vip: &str) -> Vec<ResourceDefinition> {
        vec![
            ResourceDefinition::new(ResourceSpec::Primitive {
                id: SERVICE.to_string(),
                agent: settings.service_agent.clone(),
                params: BTreeMap::new(),
                ops: Operations::from([
                    op("start", OpSpec::timeout("60s")),
                    op("stop", OpSpec::timeout("60s")),
                    op("monitor", OpSpec::interval("10s").with_timeout("20s")),
                ]),
                meta: BTreeMap::new(),
            }),
            controller_only_location(SERVICE),
            ResourceDefinition::new(ResourceSpec::Colocation {
                id: format!("col-{}", SERVICE),
                score: "inf".to_string(),
                resources: vec![SERVICE.to_string(), vip.to_string()],
            }),
            ResourceDefinition::new(ResourceSpec::Order {
                id: format!("o-{}", SERVICE),
                score: "Mandatory".to_string(),
                ordering: format!("{} {}", vip, SERVICE),
            }),
        ]
    }
}
