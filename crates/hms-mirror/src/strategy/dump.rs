use super::{
    source_table, StrategyContext, StrategyError, StrategyPlan, TranslationStrategy, LEFT_ONLY,
};
use crate::catalog::{DataStrategy, Environment, TableMirror};
use crate::definition::TableDefinition;
use crate::location::PartitionEvaluation;
use crate::statements;

/// Script of the LEFT definitions. Nothing is written to any cluster.
pub struct DumpStrategy;

impl TranslationStrategy for DumpStrategy {
    fn data_strategy(&self) -> DataStrategy {
        DataStrategy::Dump
    }

    fn environments(&self) -> &'static [Environment] {
        LEFT_ONLY
    }

    fn requires_bulk_copy(&self, _table: &TableMirror, _ctx: &StrategyContext<'_>) -> bool {
        false
    }

    fn produce_target_definition(
        &self,
        _table: &TableMirror,
        _ctx: &StrategyContext<'_>,
    ) -> Result<Option<TableDefinition>, StrategyError> {
        Ok(None)
    }

    fn produce_actions(
        &self,
        table: &TableMirror,
        ctx: &StrategyContext<'_>,
        evaluation: &PartitionEvaluation,
    ) -> Result<StrategyPlan, StrategyError> {
        let left = source_table(table)?;
        let mut plan = StrategyPlan::new(DataStrategy::Dump);
        plan.add_sql(
            Environment::Left,
            statements::USE_DESC,
            statements::use_database(ctx.database),
        );
        plan.add_sql(
            Environment::Left,
            statements::SCRIPT_DESC,
            left.definition().strip_database().to_statement(),
        );
        plan.add_repairs(Environment::Left, &evaluation.repairs);
        Ok(plan)
    }
}
