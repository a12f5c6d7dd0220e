//! Configuration type definitions.

use crate::catalog::{DataStrategy, Warehouse, WarehousePlan};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Active migration mode.
    #[serde(default)]
    pub data_strategy: DataStrategy,

    /// Databases to process, in order.
    #[serde(default)]
    pub databases: Vec<String>,

    /// Apply the planned statements. When false the run is a dry run.
    #[serde(default)]
    pub execute: bool,

    /// Prefix added to every target database name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_prefix: Option<String>,

    /// Target database name. Only valid with a single database.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_rename: Option<String>,

    /// Review each partition's location against the warehouse plan.
    #[serde(default)]
    pub evaluate_partition_location: bool,

    /// Rewrite misaligned locations to their warehouse defaults instead of only warning.
    #[serde(default, alias = "reset_to_default_location")]
    pub align_locations: bool,

    /// Target tables never own (purge) their data and are never dropped.
    #[serde(default)]
    pub read_only: bool,

    /// Recreate target tables whose schema no longer matches.
    #[serde(default)]
    pub sync: bool,

    /// Never set `external.table.purge` on target tables.
    #[serde(default)]
    pub no_purge: bool,

    /// Table worker pool size. Defaults to available parallelism.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_threads: Option<usize>,

    /// Upper bound for a single metastore call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement_timeout_secs: Option<u64>,

    /// Where reports and bulk-copy job files are written. Nothing is written when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,

    /// Location prefix replacements, applied to namespace-relative paths.
    #[serde(default)]
    pub global_location_map: BTreeMap<String, String>,

    #[serde(default)]
    pub clusters: Clusters,

    #[serde(default)]
    pub transfer: TransferConfig,

    #[serde(default)]
    pub migrate_acid: MigrateAcidConfig,

    #[serde(default)]
    pub hybrid: HybridConfig,

    /// Per-database warehouse directories.
    #[serde(default)]
    pub warehouse_plans: BTreeMap<String, Warehouse>,
}

/// Source and target cluster descriptions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Clusters {
    #[serde(default)]
    pub left: ClusterConfig,

    /// Optional for LEFT-only strategies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<ClusterConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Storage namespace, e.g. `hdfs://HDP50`.
    #[serde(default)]
    pub hcfs_namespace: String,

    /// Pre Hive 3 cluster.
    #[serde(default)]
    pub legacy_hive: bool,

    /// HDP 3 Hive, which has no MANAGEDLOCATION for databases.
    #[serde(default)]
    pub hdp_hive3: bool,

    /// Partitions are discovered automatically (`discover.partitions`).
    #[serde(default = "default_true")]
    pub partition_discovery_auto: bool,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            hcfs_namespace: String::new(),
            legacy_hive: false,
            hdp_hive3: false,
            partition_discovery_auto: true,
        }
    }
}

/// Direction for bulk-copy jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataFlow {
    /// Jobs run on the RIGHT cluster.
    #[default]
    Pull,
    /// Jobs run on the LEFT cluster.
    Push,
}

/// Data movement settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Namespace data moves to. Defaults to the RIGHT cluster's namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_namespace: Option<String>,

    /// Storage reachable by both clusters used to stage data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intermediate_storage: Option<String>,

    /// Storage shared by both clusters; tables land here directly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common_storage: Option<String>,

    /// Global default warehouse for databases without a plan entry.
    #[serde(default)]
    pub warehouse: Warehouse,

    #[serde(default = "default_export_base_dir")]
    pub export_base_dir: String,

    #[serde(default = "default_shadow_prefix")]
    pub shadow_prefix: String,

    #[serde(default = "default_transfer_prefix")]
    pub transfer_prefix: String,

    #[serde(default = "default_archive_prefix")]
    pub archive_prefix: String,

    /// Produce bulk-copy job files.
    #[serde(default)]
    pub distcp: bool,

    #[serde(default)]
    pub data_flow: DataFlow,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            target_namespace: None,
            intermediate_storage: None,
            common_storage: None,
            warehouse: Warehouse::default(),
            export_base_dir: default_export_base_dir(),
            shadow_prefix: default_shadow_prefix(),
            transfer_prefix: default_transfer_prefix(),
            archive_prefix: default_archive_prefix(),
            distcp: false,
            data_flow: DataFlow::default(),
        }
    }
}

/// Handling of transactional tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrateAcidConfig {
    /// Include ACID tables.
    #[serde(default)]
    pub on: bool,

    /// Process ACID tables only.
    #[serde(default)]
    pub only: bool,

    /// Convert ACID tables to EXTERNAL, non-transactional tables.
    #[serde(default)]
    pub downgrade: bool,

    #[serde(default = "default_acid_partition_limit")]
    pub partition_limit: usize,

    /// Bucket definitions at or below this count are dropped on downgrade.
    #[serde(default = "default_artificial_bucket_threshold")]
    pub artificial_bucket_threshold: u32,
}

impl Default for MigrateAcidConfig {
    fn default() -> Self {
        Self {
            on: false,
            only: false,
            downgrade: false,
            partition_limit: default_acid_partition_limit(),
            artificial_bucket_threshold: default_artificial_bucket_threshold(),
        }
    }
}

/// Limits used to pick and bound SQL and EXPORT_IMPORT processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridConfig {
    #[serde(default = "default_export_import_partition_limit")]
    pub export_import_partition_limit: usize,

    #[serde(default = "default_sql_partition_limit")]
    pub sql_partition_limit: usize,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            export_import_partition_limit: default_export_import_partition_limit(),
            sql_partition_limit: default_sql_partition_limit(),
        }
    }
}

impl Config {
    /// Get worker pool size, falling back to the machine's parallelism.
    pub fn get_max_threads(&self) -> usize {
        self.max_threads
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(4)
            })
            .max(1)
    }

    /// LEFT namespace without a trailing slash.
    pub fn left_namespace(&self) -> &str {
        self.clusters.left.hcfs_namespace.trim_end_matches('/')
    }

    pub fn right_cluster(&self) -> Option<&ClusterConfig> {
        self.clusters.right.as_ref()
    }

    /// Namespace new locations are built on: common storage, then the configured target
    /// namespace, then the RIGHT cluster, then (for LEFT-only runs) the LEFT cluster.
    pub fn get_target_namespace(&self) -> String {
        self.transfer
            .common_storage
            .as_deref()
            .or(self.transfer.target_namespace.as_deref())
            .or(self
                .clusters
                .right
                .as_ref()
                .map(|c| c.hcfs_namespace.as_str())
                .filter(|ns| !ns.is_empty()))
            .unwrap_or(self.left_namespace())
            .trim_end_matches('/')
            .to_string()
    }

    /// Every namespace a location may legitimately start with.
    pub fn known_namespaces(&self) -> Vec<String> {
        let mut namespaces = vec![self.left_namespace().to_string()];
        if let Some(right) = &self.clusters.right {
            namespaces.push(right.hcfs_namespace.trim_end_matches('/').to_string());
        }
        namespaces.extend(
            [
                self.transfer.target_namespace.as_deref(),
                self.transfer.common_storage.as_deref(),
                self.transfer.intermediate_storage.as_deref(),
            ]
            .into_iter()
            .flatten()
            .map(|ns| ns.trim_end_matches('/').to_string()),
        );
        namespaces.retain(|ns| !ns.is_empty());
        namespaces.sort();
        namespaces.dedup();
        namespaces
    }

    /// Database name on the target side.
    pub fn get_resolved_database(&self, database: &str) -> String {
        if let Some(rename) = &self.db_rename {
            if self.databases.len() <= 1 {
                return rename.clone();
            }
        }
        match &self.db_prefix {
            Some(prefix) => format!("{}{}", prefix, database),
            None => database.to_string(),
        }
    }

    /// Read-only warehouse assignments for the run.
    pub fn warehouse_plan(&self) -> WarehousePlan {
        WarehousePlan::new(
            self.warehouse_plans.clone(),
            Some(self.transfer.warehouse.clone()),
        )
    }

    /// Target tables may own their data.
    pub fn allows_purge(&self) -> bool {
        !self.no_purge && !self.read_only
    }

    pub fn is_dry_run(&self) -> bool {
        !self.execute
    }
}

fn default_true() -> bool {
    true
}

fn default_export_base_dir() -> String {
    "/apps/hive/warehouse/export_".to_string()
}

fn default_shadow_prefix() -> String {
    "hms_mirror_shadow_".to_string()
}

fn default_transfer_prefix() -> String {
    "hms_mirror_transfer_".to_string()
}

fn default_archive_prefix() -> String {
    "archive_".to_string()
}

fn default_acid_partition_limit() -> usize {
    500
}

fn default_artificial_bucket_threshold() -> u32 {
    2
}

fn default_export_import_partition_limit() -> usize {
    100
}

fn default_sql_partition_limit() -> usize {
    500
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_minimal_yaml() {
        let config: Config = serde_yaml::from_str(
            "databases: [db1]\nclusters:\n  left:\n    hcfs_namespace: hdfs://LEFT/\n",
        )
        .unwrap();
        assert_eq!(config.data_strategy, DataStrategy::SchemaOnly);
        assert!(config.is_dry_run());
        assert_eq!(config.left_namespace(), "hdfs://LEFT");
        assert_eq!(config.transfer.shadow_prefix, "hms_mirror_shadow_");
        assert_eq!(config.migrate_acid.partition_limit, 500);
        assert_eq!(config.hybrid.export_import_partition_limit, 100);
        assert!(config.clusters.left.partition_discovery_auto);
        assert!(config.get_max_threads() >= 1);
    }

    #[test]
    fn test_reset_to_default_location_alias() {
        let config: Config = serde_yaml::from_str("reset_to_default_location: true").unwrap();
        assert!(config.align_locations);
    }

    #[test]
    fn test_target_namespace_resolution() {
        let mut config = Config::default();
        config.clusters.left.hcfs_namespace = "hdfs://LEFT".into();
        assert_eq!(config.get_target_namespace(), "hdfs://LEFT");

        config.clusters.right = Some(ClusterConfig {
            hcfs_namespace: "hdfs://RIGHT".into(),
            ..Default::default()
        });
        assert_eq!(config.get_target_namespace(), "hdfs://RIGHT");

        config.transfer.target_namespace = Some("ofs://OHOME90/".into());
        assert_eq!(config.get_target_namespace(), "ofs://OHOME90");

        config.transfer.common_storage = Some("s3a://shared".into());
        assert_eq!(config.get_target_namespace(), "s3a://shared");
        assert_eq!(config.known_namespaces().len(), 4);
    }

    #[test]
    fn test_resolved_database() {
        let mut config = Config {
            databases: vec!["sales".into()],
            ..Default::default()
        };
        assert_eq!(config.get_resolved_database("sales"), "sales");
        config.db_prefix = Some("archive_".into());
        assert_eq!(config.get_resolved_database("sales"), "archive_sales");
        config.db_rename = Some("sales_v2".into());
        assert_eq!(config.get_resolved_database("sales"), "sales_v2");
    }
}
