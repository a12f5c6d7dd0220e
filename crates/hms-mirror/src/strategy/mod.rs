//! Translation strategies.
//!
//! Each [`DataStrategy`] has one [`TranslationStrategy`] implementation, selected once per
//! run with [`select`]. A strategy reads a [`TableMirror`] and produces a [`StrategyPlan`]:
//! the target definition, ordered actions per environment, cleanup actions, bulk-copy
//! requests and issues. Strategies never touch the table itself; the owning task applies
//! the plan.

mod common;
mod dump;
mod export_import;
mod hybrid;
mod linked;
mod schema_only;
mod sql;
mod storage_migration;

pub use common::CommonStrategy;
pub use dump::DumpStrategy;
pub use export_import::ExportImportStrategy;
pub use hybrid::HybridStrategy;
pub use linked::LinkedStrategy;
pub use schema_only::SchemaOnlyStrategy;
pub use sql::SqlStrategy;
pub use storage_migration::StorageMigrationStrategy;

use crate::catalog::{
    ActionPair, BulkCopyRequest, DataStrategy, Environment, EnvironmentTable, Issue, Severity,
    TableMirror, Warehouse,
};
use crate::config::{Config, DataFlow};
use crate::definition::{
    self, TableDefinition, BUCKETING_VERSION, DISCOVER_PARTITIONS, DOWNGRADED_FROM_ACID,
    EXTERNAL_TABLE_PURGE, LEGACY_MANAGED_FLAG, STAT_PROPERTIES, TRANSACTIONAL,
    TRANSACTIONAL_PROPERTIES,
};
use crate::location::{LocationTranslator, PartitionEvaluation, TablePath};
use crate::statements;
use crate::status::MessageCode;
use std::collections::BTreeMap;
use thiserror::Error;

/// A table could not be planned. The issue is recorded on the table, which ends in ERROR.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", issue.message)]
pub struct StrategyError {
    pub issue: Issue,
}

impl StrategyError {
    pub fn new(code: MessageCode, message: impl Into<String>) -> Self {
        Self {
            issue: Issue::error(message).with_code(code),
        }
    }

    pub fn unparseable(table: &str, detail: &str) -> Self {
        Self::new(
            MessageCode::DefinitionUnparseable,
            format!("{}: {}", table, detail),
        )
    }
}

/// Database-level inputs shared by every table of one database.
#[derive(Debug, Clone, Copy)]
pub struct StrategyContext<'a> {
    pub config: &'a Config,
    /// Source database name.
    pub database: &'a str,
    /// Database name on the target side.
    pub target_database: &'a str,
    pub warehouse: Option<&'a Warehouse>,
    pub translator: &'a LocationTranslator,
}

impl<'a> StrategyContext<'a> {
    pub fn table_path<'b>(&'b self, table: &'b str, external: bool) -> TablePath<'b> {
        TablePath {
            database: self.target_database,
            table,
            warehouse: self.warehouse,
            external,
        }
    }

    /// Environment whose job files list bulk-copy sources for RIGHT-bound data.
    pub fn bulk_copy_environment(&self) -> Environment {
        match self.config.transfer.data_flow {
            DataFlow::Pull => Environment::Right,
            DataFlow::Push => Environment::Left,
        }
    }

    /// Storage both clusters can read, if any.
    pub fn shared_storage(&self) -> Option<&'a str> {
        self.config
            .transfer
            .intermediate_storage
            .as_deref()
            .or(self.config.transfer.common_storage.as_deref())
            .map(|s| s.trim_end_matches('/'))
    }

    /// `<base><export_base_dir><db>/<name>`, on shared storage when configured.
    pub fn staging_directory(&self, name: &str) -> String {
        let base = self
            .shared_storage()
            .unwrap_or(self.config.left_namespace());
        format!(
            "{}{}{}/{}",
            base, self.config.transfer.export_base_dir, self.database, name
        )
    }

    fn target_cluster_discovers_partitions(&self, target: Environment) -> bool {
        match target {
            Environment::Left => self.config.clusters.left.partition_discovery_auto,
            Environment::Right => self
                .config
                .clusters
                .right
                .as_ref()
                .map(|c| c.partition_discovery_auto)
                .unwrap_or(true),
        }
    }

    fn is_legacy(&self, environment: Environment) -> bool {
        match environment {
            Environment::Left => self.config.clusters.left.legacy_hive,
            Environment::Right => self
                .config
                .clusters
                .right
                .as_ref()
                .map(|c| c.legacy_hive)
                .unwrap_or(false),
        }
    }
}

/// Everything a strategy decided for one table.
#[derive(Debug, Clone)]
pub struct StrategyPlan {
    /// Strategy actually applied (HYBRID resolves per table).
    pub strategy: DataStrategy,
    pub target_definition: Option<TableDefinition>,
    pub actions: BTreeMap<Environment, Vec<ActionPair>>,
    pub cleanup: BTreeMap<Environment, Vec<ActionPair>>,
    pub bulk_copy: Vec<BulkCopyRequest>,
    pub issues: Vec<(Environment, Issue)>,
    pub remapped: bool,
}

impl StrategyPlan {
    pub fn new(strategy: DataStrategy) -> Self {
        Self {
            strategy,
            target_definition: None,
            actions: BTreeMap::new(),
            cleanup: BTreeMap::new(),
            bulk_copy: Vec::new(),
            issues: Vec::new(),
            remapped: false,
        }
    }

    pub fn add_sql(
        &mut self,
        environment: Environment,
        description: impl Into<String>,
        statement: impl Into<String>,
    ) {
        self.actions
            .entry(environment)
            .or_default()
            .push(ActionPair::new(description, statement));
    }

    pub fn add_cleanup(
        &mut self,
        environment: Environment,
        description: impl Into<String>,
        statement: impl Into<String>,
    ) {
        self.cleanup
            .entry(environment)
            .or_default()
            .push(ActionPair::new(description, statement));
    }

    pub fn add_issue(&mut self, environment: Environment, issue: Issue) {
        self.issues.push((environment, issue));
    }

    pub fn add_bulk_copy(
        &mut self,
        environment: Environment,
        source: impl Into<String>,
        destination: impl Into<String>,
    ) {
        self.bulk_copy.push(BulkCopyRequest {
            environment,
            source: source.into(),
            destination: destination.into(),
        });
    }

    /// Append repair actions, skipping statements already planned for the environment.
    pub fn add_repairs(&mut self, environment: Environment, repairs: &[ActionPair]) {
        let actions = self.actions.entry(environment).or_default();
        for repair in repairs {
            if !actions.iter().any(|a| a.statement == repair.statement) {
                actions.push(repair.clone());
            }
        }
    }

    pub fn actions(&self, environment: Environment) -> &[ActionPair] {
        self.actions
            .get(&environment)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|(_, i)| i.severity == Severity::Error)
    }

    /// Record the plan on the table that owns it.
    pub fn apply(self, table: &mut TableMirror) {
        table.set_strategy(self.strategy);
        if self.remapped {
            table.set_remapped();
        }
        if let Some(definition) = self.target_definition {
            table.env_mut(Environment::Right).set_definition(definition);
        }
        for (environment, actions) in self.actions {
            let env = table.env_mut(environment);
            for action in actions {
                env.add_action(action);
            }
        }
        for (environment, cleanup) in self.cleanup {
            let env = table.env_mut(environment);
            for action in cleanup {
                env.add_cleanup(action.description, action.statement);
            }
        }
        for (environment, issue) in self.issues {
            table.add_issue(environment, issue);
        }
        for request in self.bulk_copy {
            table.add_bulk_copy(request);
        }
    }
}

/// Target definition together with the findings made while building it.
#[derive(Debug, Clone)]
pub struct BuiltDefinition {
    pub definition: TableDefinition,
    pub issues: Vec<Issue>,
}

/// How a source definition is copied to an environment.
#[derive(Debug, Clone)]
pub struct CopySpec {
    pub source: Environment,
    pub target: Environment,
    pub make_external: bool,
    /// Target owns the data (`external.table.purge`).
    pub take_ownership: bool,
    pub strip_location: bool,
    pub replace_location: Option<String>,
    pub table_name: Option<String>,
    pub make_non_transactional: bool,
    pub downgrade_acid: bool,
}

impl CopySpec {
    pub fn new(source: Environment, target: Environment) -> Self {
        Self {
            source,
            target,
            make_external: false,
            take_ownership: false,
            strip_location: false,
            replace_location: None,
            table_name: None,
            make_non_transactional: false,
            downgrade_acid: false,
        }
    }

    pub fn with_external(mut self) -> Self {
        self.make_external = true;
        self
    }

    pub fn with_ownership(mut self, take_ownership: bool) -> Self {
        self.take_ownership = take_ownership;
        self
    }

    pub fn with_strip_location(mut self) -> Self {
        self.strip_location = true;
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.replace_location = Some(location.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = Some(name.into());
        self
    }

    /// Transfer tables: plain EXTERNAL copies of transactional tables.
    pub fn with_non_transactional(mut self) -> Self {
        self.make_non_transactional = true;
        self
    }

    pub fn with_downgrade(mut self, downgrade: bool) -> Self {
        self.downgrade_acid = downgrade;
        self
    }

    /// Build the target definition from `source`. The source is never modified.
    pub fn build(
        &self,
        source: &TableDefinition,
        ctx: &StrategyContext<'_>,
    ) -> Result<BuiltDefinition, StrategyError> {
        let name = source
            .table_name()
            .ok_or_else(|| StrategyError::unparseable("definition", "no CREATE TABLE header"))?;
        let config = ctx.config;
        let mut issues = Vec::new();
        let purge_allowed = config.allows_purge();

        let mut def = source.strip_database().without_properties(STAT_PROPERTIES);
        let mut converted = false;

        if def.is_acid() {
            if self.downgrade_acid || self.make_non_transactional {
                converted = true;
                def = def
                    .without_properties(&[TRANSACTIONAL, TRANSACTIONAL_PROPERTIES, BUCKETING_VERSION]);
                def = def
                    .make_external()
                    .ok_or_else(|| StrategyError::unparseable(&name, "can not convert to EXTERNAL"))?;

                let (without_buckets, removed) =
                    def.without_buckets(config.migrate_acid.artificial_bucket_threshold);
                def = without_buckets;
                if let Some(buckets) = removed {
                    issues.push(
                        Issue::info(format!(
                            "{} ({} buckets)",
                            MessageCode::BucketsRemoved.description(),
                            buckets
                        ))
                        .with_code(MessageCode::BucketsRemoved),
                    );
                }

                if self.downgrade_acid {
                    def = def.with_property(DOWNGRADED_FROM_ACID, "true");
                    if !config.no_purge {
                        def = def.with_property(EXTERNAL_TABLE_PURGE, "true");
                    }
                    if self.replace_location.is_none() {
                        def = def.without_location();
                        issues.push(
                            Issue::info(MessageCode::LocationStripped.description())
                                .with_code(MessageCode::LocationStripped),
                        );
                    }
                }
            } else {
                // Managed transactional tables can not declare a location on Hive 3.
                def = def.without_location();
                return Ok(BuiltDefinition {
                    definition: self.finish(def),
                    issues,
                });
            }
        } else if def.is_legacy_managed(ctx.is_legacy(self.source)) && self.target != self.source {
            def = def
                .make_external()
                .ok_or_else(|| StrategyError::unparseable(&name, "can not convert to EXTERNAL"))?
                .with_property(LEGACY_MANAGED_FLAG, "true");
            if purge_allowed && self.take_ownership {
                def = def.with_property(EXTERNAL_TABLE_PURGE, "true");
            }
            issues.push(
                Issue::info(MessageCode::LegacyManagedConverted.description())
                    .with_code(MessageCode::LegacyManagedConverted),
            );
        } else if def.is_managed() && self.make_external {
            def = def
                .make_external()
                .ok_or_else(|| StrategyError::unparseable(&name, "can not convert to EXTERNAL"))?;
            if purge_allowed && self.take_ownership {
                def = def.with_property(EXTERNAL_TABLE_PURGE, "true");
            }
        }

        if def.is_external() && !self.make_non_transactional && !converted {
            def = if purge_allowed && self.take_ownership {
                def.with_property(EXTERNAL_TABLE_PURGE, "true")
            } else {
                def.without_property(EXTERNAL_TABLE_PURGE)
            };
        }
        if self.make_non_transactional {
            def = def.without_property(EXTERNAL_TABLE_PURGE);
        }

        if self.strip_location {
            def = def.without_location();
        }
        if let Some(location) = &self.replace_location {
            def = def.with_location(location);
        }

        if def.is_external() && def.is_partitioned() && ctx.target_cluster_discovers_partitions(self.target) {
            def = def.with_property(DISCOVER_PARTITIONS, "true");
        }

        Ok(BuiltDefinition {
            definition: self.finish(def),
            issues,
        })
    }

    fn finish(&self, def: TableDefinition) -> TableDefinition {
        match &self.table_name {
            Some(name) => def.with_name(name),
            None => def,
        }
    }
}

/// What to do with the target table given what already exists there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetAction {
    Create,
    /// Target matches; no CREATE.
    Keep,
    /// Drop and create again (`sync`).
    Recreate,
}

/// Compare the planned definition with an existing RIGHT table.
pub fn existing_target(
    table: &TableMirror,
    target: &TableDefinition,
    ctx: &StrategyContext<'_>,
    plan: &mut StrategyPlan,
) -> Result<TargetAction, StrategyError> {
    let existing = match table.env(Environment::Right) {
        Some(right) if right.exists() => right.definition(),
        _ => return Ok(TargetAction::Create),
    };

    if existing.fingerprint() == target.fingerprint()
        && existing.is_external() == target.is_external()
    {
        plan.add_issue(
            Environment::Right,
            Issue::info(MessageCode::SchemaExistsNoAction.description())
                .with_code(MessageCode::SchemaExistsNoAction),
        );
        return Ok(TargetAction::Keep);
    }

    if ctx.config.sync && !ctx.config.read_only {
        return Ok(TargetAction::Recreate);
    }

    Err(StrategyError::new(
        MessageCode::SchemaExistsNoActionData,
        MessageCode::SchemaExistsNoActionData.description(),
    ))
}

/// LEFT snapshot with a usable definition.
pub fn source_table(table: &TableMirror) -> Result<&EnvironmentTable, StrategyError> {
    match table.env(Environment::Left) {
        Some(left) if left.exists() && !left.definition().is_empty() => Ok(left),
        _ => Err(StrategyError::unparseable(
            table.name(),
            "no source definition",
        )),
    }
}

/// Source location, required for every strategy that places data.
pub fn source_location(table: &TableMirror) -> Result<String, StrategyError> {
    source_table(table)?
        .location()
        .map(str::to_string)
        .ok_or_else(|| StrategyError::unparseable(table.name(), "no LOCATION in definition"))
}

/// Source data belongs to the table (managed, or external with purge).
pub fn source_owns_data(definition: &TableDefinition) -> bool {
    definition.is_managed() || definition.is_external_purge()
}

/// Reason to skip a table entirely, if any.
pub fn eligibility(table: &TableMirror, config: &Config) -> Option<Issue> {
    let left = table.env(Environment::Left)?;
    let definition = left.definition();
    if definition.is_view() {
        return Some(Issue::info(MessageCode::ViewSkipped.description()).with_code(MessageCode::ViewSkipped));
    }
    let acid = definition.is_acid();
    if acid && !config.migrate_acid.on {
        return Some(
            Issue::info(MessageCode::AcidNotMigrated.description())
                .with_code(MessageCode::AcidNotMigrated),
        );
    }
    if !acid && config.migrate_acid.on && config.migrate_acid.only {
        return Some(
            Issue::info(MessageCode::NonAcidSkipped.description())
                .with_code(MessageCode::NonAcidSkipped),
        );
    }
    None
}

/// Partition counts above `limit` fail the table.
pub fn check_partition_limit(
    table: &TableMirror,
    limit: usize,
    strategy: DataStrategy,
) -> Result<(), StrategyError> {
    let count = table
        .env(Environment::Left)
        .map(|t| t.partitions().len())
        .unwrap_or(0);
    if count > limit {
        return Err(StrategyError::new(
            MessageCode::PartitionLimitExceeded,
            format!(
                "{} has {} partitions, above the {} limit of {}",
                table.name(),
                count,
                strategy,
                limit
            ),
        ));
    }
    Ok(())
}

/// Transactional tables additionally respect `migrate_acid.partition_limit`.
pub fn check_acid_limit(table: &TableMirror, ctx: &StrategyContext<'_>) -> Result<(), StrategyError> {
    let acid = table
        .env(Environment::Left)
        .map(|t| t.definition().is_acid())
        .unwrap_or(false);
    if acid {
        check_partition_limit(table, ctx.config.migrate_acid.partition_limit, ctx.config.data_strategy)?;
    }
    Ok(())
}

/// Partition registration for an EXTERNAL table on the target: explicit partitions when
/// partition locations are evaluated, otherwise MSCK discovery.
pub fn add_partition_actions(
    plan: &mut StrategyPlan,
    environment: Environment,
    table_name: &str,
    source: &EnvironmentTable,
    ctx: &StrategyContext<'_>,
    translate: bool,
) -> Result<(), StrategyError> {
    if ctx.config.evaluate_partition_location && !source.partitions().is_empty() {
        let path = ctx.table_path(source.name(), true);
        for (partition, location) in source.partitions() {
            let location = if translate {
                let translated = ctx.translator.translate(location, &path, Some(partition))?;
                plan.remapped |= translated.remapped;
                translated.location
            } else {
                location.clone()
            };
            plan.add_sql(
                environment,
                statements::ADD_PARTITION_DESC,
                statements::add_partition(
                    table_name,
                    &definition::to_partition_spec(partition),
                    &location,
                ),
            );
        }
    } else {
        plan.add_sql(
            environment,
            statements::MSCK_DESC,
            statements::msck_repair(table_name),
        );
    }
    Ok(())
}

/// One implementation per [`DataStrategy`].
pub trait TranslationStrategy: Send + Sync {
    fn data_strategy(&self) -> DataStrategy;

    /// Environments the strategy produces statements for.
    fn environments(&self) -> &'static [Environment];

    fn requires_bulk_copy(&self, table: &TableMirror, ctx: &StrategyContext<'_>) -> bool;

    fn produce_target_definition(
        &self,
        table: &TableMirror,
        ctx: &StrategyContext<'_>,
    ) -> Result<Option<TableDefinition>, StrategyError>;

    fn produce_actions(
        &self,
        table: &TableMirror,
        ctx: &StrategyContext<'_>,
        evaluation: &PartitionEvaluation,
    ) -> Result<StrategyPlan, StrategyError>;
}

/// Strategy implementation for the run's data strategy.
pub fn select(strategy: DataStrategy) -> Box<dyn TranslationStrategy> {
    match strategy {
        DataStrategy::SchemaOnly => Box::new(SchemaOnlyStrategy),
        DataStrategy::Sql => Box::new(SqlStrategy),
        DataStrategy::ExportImport => Box::new(ExportImportStrategy),
        DataStrategy::Hybrid => Box::new(HybridStrategy),
        DataStrategy::Common => Box::new(CommonStrategy),
        DataStrategy::Linked => Box::new(LinkedStrategy),
        DataStrategy::Dump => Box::new(DumpStrategy),
        DataStrategy::StorageMigration => Box::new(StorageMigrationStrategy),
    }
}

pub(crate) const RIGHT_ONLY: &[Environment] = &[Environment::Right];
pub(crate) const LEFT_ONLY: &[Environment] = &[Environment::Left];
pub(crate) const BOTH: &[Environment] = &[Environment::Left, Environment::Right];

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::config::ClusterConfig;

    pub fn config(strategy: DataStrategy) -> Config {
        let mut config = Config {
            data_strategy: strategy,
            databases: vec!["sales".to_string()],
            ..Default::default()
        };
        config.clusters.left.hcfs_namespace = "hdfs://LEFT".into();
        config.clusters.right = Some(ClusterConfig {
            hcfs_namespace: "hdfs://RIGHT".into(),
            ..Default::default()
        });
        config
    }

    pub fn lines(raw: &str) -> TableDefinition {
        TableDefinition::new(raw.lines().map(String::from).collect())
    }

    pub fn external(name: &str, location: &str, partitioned: bool) -> TableDefinition {
        let partition = if partitioned {
            "PARTITIONED BY (\n  `dt` string)\n"
        } else {
            ""
        };
        lines(&format!(
            "CREATE EXTERNAL TABLE `sales`.`{name}`(
  `id` int,
  `amount` decimal(7,2))
{partition}ROW FORMAT SERDE
  'org.apache.hadoop.hive.ql.io.orc.OrcSerde'
LOCATION
  '{location}'
TBLPROPERTIES (
  'external.table.purge'='true',
  'numFiles'='4',
  'transient_lastDdlTime'='1674052906')"
        ))
    }

    pub fn acid(name: &str) -> TableDefinition {
        lines(&format!(
            "CREATE TABLE `{name}`(
  `id` string)
CLUSTERED BY (
  id)
INTO 2 BUCKETS
ROW FORMAT SERDE
  'org.apache.hadoop.hive.ql.io.orc.OrcSerde'
LOCATION
  'hdfs://LEFT/warehouse/managed/sales.db/{name}'
TBLPROPERTIES (
  'bucketing_version'='2',
  'transactional'='true',
  'transactional_properties'='default')"
        ))
    }

    pub fn mirror(definition: TableDefinition, partitions: &[(&str, &str)]) -> TableMirror {
        let name = definition.table_name().unwrap_or_default();
        let mut table = TableMirror::new(name.clone());
        let mut left = EnvironmentTable::loaded(name, definition);
        left.set_partitions(
            partitions
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        table.set_env(Environment::Left, left);
        table
    }

    pub fn warehouse() -> Warehouse {
        Warehouse::new("/warehouse/external", "/warehouse/managed")
    }

    /// Run `f` with a context over `config`.
    pub fn with_ctx<R>(
        config: &Config,
        warehouse: Option<&Warehouse>,
        f: impl FnOnce(&StrategyContext<'_>) -> R,
    ) -> R {
        let translator = LocationTranslator::new(config);
        let target_database = config.get_resolved_database("sales");
        let ctx = StrategyContext {
            config,
            database: "sales",
            target_database: &target_database,
            warehouse,
            translator: &translator,
        };
        f(&ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_copy_spec_strips_stats_and_database() {
        let config = config(DataStrategy::SchemaOnly);
        let source = external("orders", "hdfs://LEFT/data/orders", false);
        let built = with_ctx(&config, None, |ctx| {
            CopySpec::new(Environment::Left, Environment::Right)
                .with_ownership(true)
                .with_location("hdfs://RIGHT/data/orders")
                .build(&source, ctx)
                .unwrap()
        });
        let def = built.definition;
        assert_eq!(def.lines()[0], "CREATE EXTERNAL TABLE `orders`(");
        assert!(def.property("numFiles").is_none());
        assert!(def.property("transient_lastDdlTime").is_none());
        assert_eq!(def.property(EXTERNAL_TABLE_PURGE).as_deref(), Some("true"));
        assert_eq!(def.location().as_deref(), Some("hdfs://RIGHT/data/orders"));
        assert!(built.issues.is_empty());
    }

    #[test]
    fn test_copy_spec_read_only_never_purges() {
        let mut config = config(DataStrategy::SchemaOnly);
        config.read_only = true;
        let source = external("orders", "hdfs://LEFT/data/orders", false);
        let def = with_ctx(&config, None, |ctx| {
            CopySpec::new(Environment::Left, Environment::Right)
                .with_ownership(true)
                .build(&source, ctx)
                .unwrap()
                .definition
        });
        assert!(def.property(EXTERNAL_TABLE_PURGE).is_none());
    }

    #[test]
    fn test_copy_spec_legacy_managed_conversion() {
        let mut config = config(DataStrategy::SchemaOnly);
        config.clusters.left.legacy_hive = true;
        let source = lines(
            "CREATE TABLE `legacy`(\n  `id` int)\nLOCATION\n  'hdfs://LEFT/wh/legacy'\nTBLPROPERTIES (\n  'numRows'='1')",
        );
        let built = with_ctx(&config, None, |ctx| {
            CopySpec::new(Environment::Left, Environment::Right)
                .with_ownership(true)
                .build(&source, ctx)
                .unwrap()
        });
        assert!(built.definition.is_external());
        assert_eq!(built.definition.property(LEGACY_MANAGED_FLAG).as_deref(), Some("true"));
        assert_eq!(built.definition.property(EXTERNAL_TABLE_PURGE).as_deref(), Some("true"));
        assert_eq!(built.issues[0].code, Some(MessageCode::LegacyManagedConverted));
    }

    #[test]
    fn test_copy_spec_downgrade_acid() {
        let mut config = config(DataStrategy::SchemaOnly);
        config.migrate_acid.on = true;
        config.migrate_acid.downgrade = true;
        let built = with_ctx(&config, None, |ctx| {
            CopySpec::new(Environment::Left, Environment::Right)
                .with_downgrade(true)
                .build(&acid("acid_01"), ctx)
                .unwrap()
        });
        let def = &built.definition;
        assert!(def.is_external());
        assert!(!def.is_acid());
        assert!(def.property(TRANSACTIONAL).is_none());
        assert!(def.property(BUCKETING_VERSION).is_none());
        assert_eq!(def.property(DOWNGRADED_FROM_ACID).as_deref(), Some("true"));
        assert_eq!(def.property(EXTERNAL_TABLE_PURGE).as_deref(), Some("true"));
        assert!(def.num_buckets().is_none());
        assert!(def.location().is_none());
        let codes: Vec<_> = built.issues.iter().filter_map(|i| i.code).collect();
        assert_eq!(codes, vec![MessageCode::BucketsRemoved, MessageCode::LocationStripped]);
    }

    #[test]
    fn test_copy_spec_kept_acid_strips_location() {
        let mut config = config(DataStrategy::SchemaOnly);
        config.migrate_acid.on = true;
        let def = with_ctx(&config, None, |ctx| {
            CopySpec::new(Environment::Left, Environment::Right)
                .build(&acid("acid_01"), ctx)
                .unwrap()
                .definition
        });
        assert!(def.is_acid());
        assert!(def.location().is_none());
    }

    #[test]
    fn test_copy_spec_discover_partitions() {
        let config = config(DataStrategy::SchemaOnly);
        let source = external("orders", "hdfs://LEFT/data/orders", true);
        let def = with_ctx(&config, None, |ctx| {
            CopySpec::new(Environment::Left, Environment::Right)
                .build(&source, ctx)
                .unwrap()
                .definition
        });
        assert_eq!(def.property(DISCOVER_PARTITIONS).as_deref(), Some("true"));
        assert!(def.property(EXTERNAL_TABLE_PURGE).is_none());
    }

    #[test]
    fn test_unparseable_definition() {
        let config = config(DataStrategy::SchemaOnly);
        let err = with_ctx(&config, None, |ctx| {
            CopySpec::new(Environment::Left, Environment::Right)
                .build(&lines("garbage"), ctx)
                .unwrap_err()
        });
        assert_eq!(err.issue.code, Some(MessageCode::DefinitionUnparseable));
        assert_eq!(err.issue.severity, Severity::Error);
    }

    #[test]
    fn test_eligibility() {
        let mut config = config(DataStrategy::Sql);
        let acid_table = mirror(acid("acid_01"), &[]);
        assert_eq!(
            eligibility(&acid_table, &config).unwrap().code,
            Some(MessageCode::AcidNotMigrated)
        );

        config.migrate_acid.on = true;
        assert!(eligibility(&acid_table, &config).is_none());

        config.migrate_acid.only = true;
        let plain = mirror(external("orders", "hdfs://LEFT/d", false), &[]);
        assert_eq!(
            eligibility(&plain, &config).unwrap().code,
            Some(MessageCode::NonAcidSkipped)
        );

        let view = mirror(lines("CREATE VIEW `v` AS SELECT 1"), &[]);
        assert_eq!(
            eligibility(&view, &config).unwrap().code,
            Some(MessageCode::ViewSkipped)
        );
    }

    #[test]
    fn test_existing_target_decisions() {
        let mut config = config(DataStrategy::SchemaOnly);
        let source = external("orders", "hdfs://LEFT/data/orders", false);
        let mut table = mirror(source.clone(), &[]);
        let target = source.strip_database().with_location("hdfs://RIGHT/data/orders");

        let mut plan = StrategyPlan::new(DataStrategy::SchemaOnly);
        let action = with_ctx(&config, None, |ctx| {
            existing_target(&table, &target, ctx, &mut plan).unwrap()
        });
        assert_eq!(action, TargetAction::Create);

        table.set_env(
            Environment::Right,
            EnvironmentTable::loaded("orders", source.clone()),
        );
        let action = with_ctx(&config, None, |ctx| {
            existing_target(&table, &target, ctx, &mut plan).unwrap()
        });
        assert_eq!(action, TargetAction::Keep);
        assert_eq!(plan.issues[0].1.code, Some(MessageCode::SchemaExistsNoAction));

        let changed = target.with_name("orders").with_property("x", "y");
        let different = lines(&changed.to_statement().replace("`amount` decimal(7,2))", "`amount` double)"));
        let err = with_ctx(&config, None, |ctx| {
            existing_target(&table, &different, ctx, &mut plan).unwrap_err()
        });
        assert_eq!(err.issue.code, Some(MessageCode::SchemaExistsNoActionData));

        config.sync = true;
        let action = with_ctx(&config, None, |ctx| {
            existing_target(&table, &different, ctx, &mut plan).unwrap()
        });
        assert_eq!(action, TargetAction::Recreate);
    }

    #[test]
    fn test_plan_apply_records_everything() {
        let mut table = mirror(external("orders", "hdfs://LEFT/d", false), &[]);
        let mut plan = StrategyPlan::new(DataStrategy::Sql);
        plan.add_sql(Environment::Right, "a", "USE sales");
        plan.add_cleanup(Environment::Right, "c", "DROP TABLE IF EXISTS s");
        plan.add_issue(Environment::Right, Issue::warning("w"));
        plan.add_bulk_copy(Environment::Right, "hdfs://LEFT/d", "hdfs://RIGHT/d");
        plan.add_repairs(
            Environment::Right,
            &[ActionPair::new("dup", "USE sales"), ActionPair::new("r", "ALTER")],
        );
        plan.remapped = true;
        plan.apply(&mut table);

        let right = table.env(Environment::Right).unwrap();
        assert_eq!(right.actions().len(), 2);
        assert_eq!(right.cleanup().len(), 1);
        assert_eq!(table.strategy(), Some(DataStrategy::Sql));
        assert!(table.is_remapped());
        assert_eq!(table.bulk_copy().len(), 1);
        assert_eq!(table.issue_count(Environment::Right), 1);
    }

    #[test]
    fn test_select_matches_strategy() {
        for strategy in [
            DataStrategy::SchemaOnly,
            DataStrategy::Sql,
            DataStrategy::ExportImport,
            DataStrategy::Hybrid,
            DataStrategy::Common,
            DataStrategy::Linked,
            DataStrategy::Dump,
            DataStrategy::StorageMigration,
        ] {
            let selected = select(strategy);
            assert_eq!(selected.data_strategy(), strategy);
            assert_eq!(
                selected.environments() == LEFT_ONLY,
                strategy.is_left_only()
            );
        }
    }
}
