use super::{
    ExportImportStrategy, SqlStrategy, StrategyContext, StrategyError, StrategyPlan,
    TranslationStrategy, BOTH,
};
use crate::catalog::{DataStrategy, Environment, TableMirror};
use crate::definition::TableDefinition;
use crate::location::PartitionEvaluation;

/// EXPORT_IMPORT for small tables, SQL for transactional or heavily partitioned ones.
pub struct HybridStrategy;

impl HybridStrategy {
    /// Strategy a table resolves to.
    pub fn resolve(&self, table: &TableMirror, ctx: &StrategyContext<'_>) -> DataStrategy {
        let Some(left) = table.env(Environment::Left) else {
            return DataStrategy::ExportImport;
        };
        if left.definition().is_acid() && ctx.config.migrate_acid.on {
            return DataStrategy::Sql;
        }
        if left.partitions().len() > ctx.config.hybrid.export_import_partition_limit {
            return DataStrategy::Sql;
        }
        DataStrategy::ExportImport
    }

    fn delegate(&self, table: &TableMirror, ctx: &StrategyContext<'_>) -> &'static dyn TranslationStrategy {
        match self.resolve(table, ctx) {
            DataStrategy::Sql => &SqlStrategy,
            _ => &ExportImportStrategy,
        }
    }
}

impl TranslationStrategy for HybridStrategy {
    fn data_strategy(&self) -> DataStrategy {
        DataStrategy::Hybrid
    }

    fn environments(&self) -> &'static [Environment] {
        BOTH
    }

    fn requires_bulk_copy(&self, table: &TableMirror, ctx: &StrategyContext<'_>) -> bool {
        self.delegate(table, ctx).requires_bulk_copy(table, ctx)
    }

    fn produce_target_definition(
        &self,
        table: &TableMirror,
        ctx: &StrategyContext<'_>,
    ) -> Result<Option<TableDefinition>, StrategyError> {
        self.delegate(table, ctx).produce_target_definition(table, ctx)
    }

    fn produce_actions(
        &self,
        table: &TableMirror,
        ctx: &StrategyContext<'_>,
        evaluation: &PartitionEvaluation,
    ) -> Result<StrategyPlan, StrategyError> {
        self.delegate(table, ctx)
            .produce_actions(table, ctx, evaluation)
    }
}
