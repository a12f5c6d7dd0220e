//! YAML snapshot of one or two metastores.
//!
//! ```yaml
//! left:
//!   databases:
//!     sales:
//!       properties:
//!         LOCATION: hdfs://LEFT/warehouse/tablespace/external/hive/sales.db
//!       tables:
//!         orders:
//!           definition:
//!             - CREATE EXTERNAL TABLE `orders`(
//!             - ...
//!           partitions:
//!             dt=2024-01-01: hdfs://LEFT/warehouse/.../orders/dt=2024-01-01
//! right:
//!   databases: {}
//! ```

use super::MetastoreClient;
use crate::catalog::Environment;
use crate::error::{MirrorError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub left: ClusterSnapshot,
    #[serde(default)]
    pub right: ClusterSnapshot,

    /// Statements containing any of these fragments fail when executed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fail_on: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    #[serde(default)]
    pub databases: BTreeMap<String, DatabaseSnapshot>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseSnapshot {
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub tables: BTreeMap<String, TableSnapshot>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableSnapshot {
    pub definition: Vec<String>,
    #[serde(default)]
    pub partitions: BTreeMap<String, String>,
}

impl Snapshot {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    pub fn cluster(&self, environment: Environment) -> &ClusterSnapshot {
        match environment {
            Environment::Left => &self.left,
            Environment::Right => &self.right,
        }
    }

    pub fn cluster_mut(&mut self, environment: Environment) -> &mut ClusterSnapshot {
        match environment {
            Environment::Left => &mut self.left,
            Environment::Right => &mut self.right,
        }
    }
}

impl ClusterSnapshot {
    fn database(&self, name: &str) -> Option<&DatabaseSnapshot> {
        self.databases
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, db)| db)
    }
}

impl DatabaseSnapshot {
    fn table(&self, name: &str) -> Option<&TableSnapshot> {
        self.tables
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, t)| t)
    }
}

/// [`MetastoreClient`] over a [`Snapshot`]. Executed statements are recorded, never applied.
pub struct SnapshotClient {
    snapshot: Snapshot,
    executed: Mutex<Vec<(Environment, String)>>,
}

impl SnapshotClient {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot,
            executed: Mutex::new(Vec::new()),
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(Snapshot::load(path)?))
    }

    /// Statements passed to `execute_statement`, in call order.
    pub fn executed(&self) -> Vec<(Environment, String)> {
        self.executed
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl MetastoreClient for SnapshotClient {
    async fn database_exists(&self, environment: Environment, database: &str) -> Result<bool> {
        Ok(self.snapshot.cluster(environment).database(database).is_some())
    }

    async fn list_tables(&self, environment: Environment, database: &str) -> Result<Vec<String>> {
        Ok(self
            .snapshot
            .cluster(environment)
            .database(database)
            .map(|db| db.tables.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn fetch_table_definition(
        &self,
        environment: Environment,
        database: &str,
        table: &str,
    ) -> Result<Option<Vec<String>>> {
        Ok(self
            .snapshot
            .cluster(environment)
            .database(database)
            .and_then(|db| db.table(table))
            .map(|t| t.definition.clone()))
    }

    async fn fetch_partitions(
        &self,
        environment: Environment,
        database: &str,
        table: &str,
    ) -> Result<BTreeMap<String, String>> {
        Ok(self
            .snapshot
            .cluster(environment)
            .database(database)
            .and_then(|db| db.table(table))
            .map(|t| t.partitions.clone())
            .unwrap_or_default())
    }

    async fn fetch_database_properties(
        &self,
        environment: Environment,
        database: &str,
    ) -> Result<BTreeMap<String, String>> {
        Ok(self
            .snapshot
            .cluster(environment)
            .database(database)
            .map(|db| db.properties.clone())
            .unwrap_or_default())
    }

    async fn execute_statement(&self, environment: Environment, statement: &str) -> Result<()> {
        debug!("{} execute: {}", environment, statement);
        if let Some(fragment) = self
            .snapshot
            .fail_on
            .iter()
            .find(|f| statement.contains(f.as_str()))
        {
            return Err(MirrorError::client(
                environment,
                format!("statement rejected (matches '{}')", fragment),
            ));
        }
        let mut log = self
            .executed
            .lock()
            .map_err(|_| MirrorError::client(environment, "statement log poisoned"))?;
        log.push((environment, statement.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> Snapshot {
        serde_yaml::from_str(
            r#"
left:
  databases:
    Sales:
      properties:
        LOCATION: hdfs://LEFT/wh/sales.db
      tables:
        orders:
          definition:
            - "CREATE EXTERNAL TABLE `orders`("
            - "  `id` int)"
          partitions:
            dt=1: hdfs://LEFT/wh/sales.db/orders/dt=1
fail_on:
  - DROP TABLE
"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_lookups_are_case_insensitive() {
        let client = SnapshotClient::new(snapshot());
        assert!(client.database_exists(Environment::Left, "sales").await.unwrap());
        assert!(!client.database_exists(Environment::Right, "sales").await.unwrap());
        assert_eq!(
            client.list_tables(Environment::Left, "SALES").await.unwrap(),
            vec!["orders".to_string()]
        );
        let def = client
            .fetch_table_definition(Environment::Left, "sales", "ORDERS")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(def.len(), 2);
        assert_eq!(
            client
                .fetch_partitions(Environment::Left, "sales", "orders")
                .await
                .unwrap()
                .len(),
            1
        );
        assert!(client
            .fetch_table_definition(Environment::Left, "sales", "missing")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_execute_records_and_fails_on_pattern() {
        let client = SnapshotClient::new(snapshot());
        client
            .execute_statement(Environment::Right, "CREATE DATABASE IF NOT EXISTS sales")
            .await
            .unwrap();
        let err = client
            .execute_statement(Environment::Right, "DROP TABLE orders")
            .await
            .unwrap_err();
        assert!(matches!(err, MirrorError::Client { .. }));
        assert_eq!(client.executed().len(), 1);
    }
}
