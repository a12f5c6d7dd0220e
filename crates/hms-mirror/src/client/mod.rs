//! Metastore access used by the orchestrator.
//!
//! - [`MetastoreClient`]: everything the engine needs from a cluster
//! - [`SnapshotClient`]: a client backed by a recorded YAML snapshot

mod snapshot;

pub use snapshot::{ClusterSnapshot, DatabaseSnapshot, Snapshot, SnapshotClient, TableSnapshot};

use crate::catalog::Environment;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Read metadata from and apply statements to the LEFT and RIGHT clusters.
///
/// A database that does not exist is not an error: `database_exists` reports it and the
/// listing calls return empty results.
#[async_trait]
pub trait MetastoreClient: Send + Sync {
    async fn database_exists(&self, environment: Environment, database: &str) -> Result<bool>;

    /// Table names of a database, in any order.
    async fn list_tables(&self, environment: Environment, database: &str) -> Result<Vec<String>>;

    /// `SHOW CREATE TABLE` output, one entry per line. `None` when the table is absent.
    async fn fetch_table_definition(
        &self,
        environment: Environment,
        database: &str,
        table: &str,
    ) -> Result<Option<Vec<String>>>;

    /// Partition path (`k1=v1/k2=v2`) to location.
    async fn fetch_partitions(
        &self,
        environment: Environment,
        database: &str,
        table: &str,
    ) -> Result<BTreeMap<String, String>>;

    /// Database parameters such as `LOCATION` and `MANAGEDLOCATION`.
    async fn fetch_database_properties(
        &self,
        environment: Environment,
        database: &str,
    ) -> Result<BTreeMap<String, String>>;

    async fn execute_statement(&self, environment: Environment, statement: &str) -> Result<()>;
}
