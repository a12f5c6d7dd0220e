//! Configuration validation.
//!
//! Contradictions fail the run before anything is scheduled. Questionable but workable
//! combinations become run warnings.

use super::Config;
use crate::catalog::DataStrategy;
use crate::error::{MirrorError, Result};
use crate::status::{MessageCode, Messages};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    use DataStrategy::*;
    let strategy = config.data_strategy;

    if config.clusters.left.hcfs_namespace.trim().is_empty() {
        return Err(MirrorError::Config(
            "clusters.left.hcfs_namespace is required".into(),
        ));
    }
    if let Some(0) = config.max_threads {
        return Err(MirrorError::Config("max_threads must be at least 1".into()));
    }
    if let Some(0) = config.statement_timeout_secs {
        return Err(MirrorError::Config(
            "statement_timeout_secs must be at least 1".into(),
        ));
    }

    match &config.clusters.right {
        None if !strategy.is_left_only() => {
            return Err(MirrorError::validation(MessageCode::RightClusterMissing));
        }
        Some(right) if right.legacy_hive && !strategy.is_left_only() => {
            return Err(MirrorError::validation(MessageCode::LegacyHiveRightCluster));
        }
        _ => {}
    }

    if strategy == Linked {
        if config.transfer.common_storage.is_some() {
            return Err(MirrorError::validation(MessageCode::CommonStorageWithLinked));
        }
        if config.transfer.intermediate_storage.is_some() {
            return Err(MirrorError::validation(
                MessageCode::IntermediateStorageWithLinked,
            ));
        }
    }

    if config.read_only && !matches!(strategy, SchemaOnly | Linked | Sql | Common) {
        return Err(MirrorError::validation(MessageCode::ReadOnlyValidStrategies));
    }
    if config.sync && config.read_only {
        return Err(MirrorError::validation(MessageCode::SyncWithReadOnly));
    }
    if config.align_locations && matches!(strategy, Linked | Common | Dump) {
        return Err(MirrorError::validation(MessageCode::ResetToDefaultLocation));
    }
    if config.transfer.distcp && matches!(strategy, Linked | Common | Dump) {
        return Err(MirrorError::validation(MessageCode::DistcpValidStrategy));
    }
    if config.evaluate_partition_location
        && !matches!(strategy, SchemaOnly | Dump | StorageMigration)
    {
        return Err(MirrorError::validation(
            MessageCode::EvaluatePartitionLocationUse,
        ));
    }

    let same_dir = std::iter::once(&config.transfer.warehouse)
        .chain(config.warehouse_plans.values())
        .filter(|w| w.is_defined())
        .any(|w| w.directory(true) == w.directory(false));
    if same_dir {
        return Err(MirrorError::validation(MessageCode::WarehouseDirsSameDir));
    }

    if strategy == StorageMigration {
        let plan = config.warehouse_plan();
        let covered = !config.databases.is_empty()
            && config.databases.iter().all(|db| plan.has_plan(db));
        if !config.transfer.warehouse.is_defined() && !covered {
            return Err(MirrorError::validation(
                MessageCode::StorageMigrationRequiredWarehouseOptions,
            ));
        }
    }

    Ok(())
}

/// Collect run warnings implied by the configuration.
pub fn warnings(config: &Config) -> Messages {
    let mut messages = Messages::default();

    if config.align_locations {
        let plan = config.warehouse_plan();
        for db in &config.databases {
            if !plan.has_plan(db) {
                messages.set_with(MessageCode::ResetToDefaultLocationWithoutWarehouseDirs, db);
            }
        }
        if config.transfer.distcp {
            messages.set(MessageCode::RdlDcWarningTableAlignment);
        }
    }

    if config.data_strategy == DataStrategy::StorageMigration
        && config.transfer.target_namespace.is_none()
        && config.transfer.common_storage.is_none()
        && config.clusters.right.is_none()
    {
        messages.set(MessageCode::StorageMigrationNamespaceLeft);
    }

    if config.migrate_acid.downgrade && !config.migrate_acid.on {
        messages.set(MessageCode::DowngradeOnlyForAcid);
    }

    messages
}
