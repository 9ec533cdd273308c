//! Proposal schema migrations
//!
//! Stored proposals outlive the code that wrote them. Each migration moves
//! an attribute tree one schema revision forward (`upgrade`) or back
//! (`downgrade`), given the current template for reference. Migrations are
//! applied in revision order and must be reversible.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};

/// Attribute and deployment trees of a proposal, as migrated together
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MigrationDoc {
    pub attributes: Value,

    #[serde(default)]
    pub deployment: Value,
}

impl MigrationDoc {
    pub fn new(attributes: Value, deployment: Value) -> Self {
        Self {
            attributes,
            deployment,
        }
    }
}

/// A reversible schema change
pub trait SchemaMigration: Send + Sync {
    /// Schema revision this migration brings the document to
    fn revision(&self) -> u32;

    fn name(&self) -> &str;

    fn upgrade(&self, template: &MigrationDoc, doc: MigrationDoc) -> StoreResult<MigrationDoc>;

    fn downgrade(&self, template: &MigrationDoc, doc: MigrationDoc) -> StoreResult<MigrationDoc>;
}

/// `010_pgtune`: connection limits moved under `postgresql.config_pgtune`
#[derive(Debug, Default)]
pub struct PgTune;

impl SchemaMigration for PgTune {
    fn revision(&self) -> u32 {
        10
    }

    fn name(&self) -> &str {
        "pgtune"
    }

    fn upgrade(&self, _template: &MigrationDoc, mut doc: MigrationDoc) -> StoreResult<MigrationDoc> {
        let postgresql = object_at(&mut doc.attributes, "postgresql", self.name())?;

        let moved = postgresql
            .get_mut("config")
            .and_then(Value::as_object_mut)
            .and_then(|config| config.remove("max_connections"));

        let tune = postgresql
            .entry("config_pgtune")
            .or_insert_with(|| Value::Object(Map::new()));
        if let (Some(tune), Some(value)) = (tune.as_object_mut(), moved) {
            tune.entry("max_connections").or_insert(value);
        }

        Ok(doc)
    }

    fn downgrade(&self, template: &MigrationDoc, mut doc: MigrationDoc) -> StoreResult<MigrationDoc> {
        let template_has_limit = template
            .attributes
            .pointer("/postgresql/config/max_connections")
            .is_some();
        if !template_has_limit {
            return Ok(doc);
        }

        let postgresql = object_at(&mut doc.attributes, "postgresql", self.name())?;
        let value = postgresql
            .get_mut("config_pgtune")
            .and_then(Value::as_object_mut)
            .and_then(|tune| tune.remove("max_connections"));

        if let Some(value) = value {
            if let Some(config) = postgresql
                .entry("config")
                .or_insert_with(|| Value::Object(Map::new()))
                .as_object_mut()
            {
                config.insert("max_connections".to_string(), value);
            }
        }

        let tune_empty = postgresql
            .get("config_pgtune")
            .and_then(Value::as_object)
            .map(Map::is_empty)
            .unwrap_or(false);
        if tune_empty {
            postgresql.remove("config_pgtune");
        }

        Ok(doc)
    }
}

/// `101_streaming_replication`: existing deployments keep shared storage
#[derive(Debug, Default)]
pub struct StreamingReplication;

impl SchemaMigration for StreamingReplication {
    fn revision(&self) -> u32 {
        101
    }

    fn name(&self) -> &str {
        "streaming_replication"
    }

    fn upgrade(&self, _template: &MigrationDoc, mut doc: MigrationDoc) -> StoreResult<MigrationDoc> {
        let postgresql = object_at(&mut doc.attributes, "postgresql", self.name())?;
        postgresql
            .entry("streaming_replication")
            .or_insert(Value::Bool(false));
        Ok(doc)
    }

    fn downgrade(&self, template: &MigrationDoc, mut doc: MigrationDoc) -> StoreResult<MigrationDoc> {
        let in_template = template
            .attributes
            .pointer("/postgresql/streaming_replication")
            .is_some();
        if !in_template {
            let postgresql = object_at(&mut doc.attributes, "postgresql", self.name())?;
            postgresql.remove("streaming_replication");
        }
        Ok(doc)
    }
}

fn object_at<'a>(
    root: &'a mut Value,
    key: &str,
    migration: &str,
) -> StoreResult<&'a mut Map<String, Value>> {
    root.get_mut(key)
        .and_then(Value::as_object_mut)
        .ok_or_else(|| StoreError::Migration {
            name: migration.to_string(),
            reason: format!("attribute tree has no {:?} object", key),
        })
}

/// Ordered set of migrations for one service
pub struct Migrator {
    migrations: Vec<Box<dyn SchemaMigration>>,
}

impl Migrator {
    pub fn new(mut migrations: Vec<Box<dyn SchemaMigration>>) -> Self {
        migrations.sort_by_key(|m| m.revision());
        Self { migrations }
    }

    /// Migrations of the database service
    pub fn database() -> Self {
        Self::new(vec![Box::new(PgTune), Box::new(StreamingReplication)])
    }

    /// Highest schema revision known
    pub fn latest(&self) -> u32 {
        self.migrations.last().map(|m| m.revision()).unwrap_or(0)
    }

    /// Apply every migration above `from` up to and including `to`
    pub fn upgrade(
        &self,
        template: &MigrationDoc,
        mut doc: MigrationDoc,
        from: u32,
        to: u32,
    ) -> StoreResult<MigrationDoc> {
        for migration in self
            .migrations
            .iter()
            .filter(|m| m.revision() > from && m.revision() <= to)
        {
            debug!(migration = migration.name(), revision = migration.revision(), "Upgrading");
            doc = migration.upgrade(template, doc)?;
        }
        info!(from, to, "Proposal schema upgraded");
        Ok(doc)
    }

    /// Revert every migration above `to` up to and including `from`, newest first
    pub fn downgrade(
        &self,
        template: &MigrationDoc,
        mut doc: MigrationDoc,
        from: u32,
        to: u32,
    ) -> StoreResult<MigrationDoc> {
        for migration in self
            .migrations
            .iter()
            .rev()
            .filter(|m| m.revision() > to && m.revision() <= from)
        {
            debug!(migration = migration.name(), revision = migration.revision(), "Downgrading");
            doc = migration.downgrade(template, doc)?;
        }
        info!(from, to, "Proposal schema downgraded");
        Ok(doc)
    }
}

impl std::fmt::Debug for Migrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.migrations.iter().map(|m| (m.revision(), m.name().to_string())))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(attributes: Value) -> MigrationDoc {
        MigrationDoc::new(attributes, json!({}))
    }

    #[test]
    fn test_pgtune_moves_max_connections() {
        let template = doc(json!({ "postgresql": { "config": { "max_connections": 1000 } } }));
        let old = doc(json!({ "postgresql": { "config": { "max_connections": 500, "port": 5432 } } }));

        let upgraded = PgTune.upgrade(&template, old.clone()).unwrap();
        assert_eq!(
            upgraded.attributes,
            json!({ "postgresql": {
                "config": { "port": 5432 },
                "config_pgtune": { "max_connections": 500 }
            } })
        );

        let reverted = PgTune.downgrade(&template, upgraded).unwrap();
        assert_eq!(reverted, old);
    }

    #[test]
    fn test_streaming_replication_defaults_off() {
        let template = doc(json!({ "postgresql": {} }));
        let upgraded = StreamingReplication
            .upgrade(&template, doc(json!({ "postgresql": {} })))
            .unwrap();
        assert_eq!(upgraded.attributes["postgresql"]["streaming_replication"], json!(false));

        // Existing values are never converted
        let kept = StreamingReplication
            .upgrade(&template, doc(json!({ "postgresql": { "streaming_replication": true } })))
            .unwrap();
        assert_eq!(kept.attributes["postgresql"]["streaming_replication"], json!(true));

        let reverted = StreamingReplication.downgrade(&template, upgraded).unwrap();
        assert!(reverted.attributes["postgresql"].get("streaming_replication").is_none());
    }

    #[test]
    fn test_migrator_orders_and_bounds() {
        let migrator = Migrator::database();
        assert_eq!(migrator.latest(), 101);

        let template = doc(json!({ "postgresql": { "config": { "max_connections": 1000 } } }));
        let old = doc(json!({ "postgresql": { "config": { "max_connections": 500 } } }));

        let only_pgtune = migrator.upgrade(&template, old.clone(), 0, 10).unwrap();
        assert!(only_pgtune.attributes["postgresql"].get("streaming_replication").is_none());

        let full = migrator.upgrade(&template, old.clone(), 0, 101).unwrap();
        assert_eq!(full.attributes["postgresql"]["streaming_replication"], json!(false));

        let back = migrator.downgrade(&template, full, 101, 0).unwrap();
        assert_eq!(back, old);
    }

    #[test]
    fn test_missing_namespace_is_an_error() {
        let result = StreamingReplication.upgrade(&doc(json!({})), doc(json!({ "mysql": {} })));
        assert!(matches!(result, Err(StoreError::Migration { .. })));
    }
}
