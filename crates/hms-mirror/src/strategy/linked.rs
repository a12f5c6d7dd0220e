use super::{
    add_partition_actions, existing_target, source_location, source_table, CopySpec,
    StrategyContext, StrategyError, StrategyPlan, TargetAction, TranslationStrategy, RIGHT_ONLY,
};
use crate::catalog::{DataStrategy, Environment, TableMirror};
use crate::definition::TableDefinition;
use crate::location::PartitionEvaluation;
use crate::statements;
use crate::status::MessageCode;

/// RIGHT tables reading the LEFT data in place. The RIGHT side never owns the data.
pub struct LinkedStrategy;

impl LinkedStrategy {
    fn target(
        &self,
        table: &TableMirror,
        ctx: &StrategyContext<'_>,
    ) -> Result<TableDefinition, StrategyError> {
        let left = source_table(table)?;
        if left.definition().is_acid() {
            return Err(StrategyError::new(
                MessageCode::AcidNotSupported,
                format!("{}: {}", table.name(), MessageCode::AcidNotSupported.description()),
            ));
        }
        let location = source_location(table)?;
        Ok(CopySpec::new(Environment::Left, Environment::Right)
            .with_external()
            .with_ownership(false)
            .with_location(location)
            .build(left.definition(), ctx)?
            .definition)
    }
}

impl TranslationStrategy for LinkedStrategy {
    fn data_strategy(&self) -> DataStrategy {
        DataStrategy::Linked
    }

    fn environments(&self) -> &'static [Environment] {
        RIGHT_ONLY
    }

    fn requires_bulk_copy(&self, _table: &TableMirror, _ctx: &StrategyContext<'_>) -> bool {
        false
    }

    fn produce_target_definition(
        &self,
        table: &TableMirror,
        ctx: &StrategyContext<'_>,
    ) -> Result<Option<TableDefinition>, StrategyError> {
        self.target(table, ctx).map(Some)
    }

    fn produce_actions(
        &self,
        table: &TableMirror,
        ctx: &StrategyContext<'_>,
        _evaluation: &PartitionEvaluation,
    ) -> Result<StrategyPlan, StrategyError> {
        let mut plan = StrategyPlan::new(DataStrategy::Linked);
        let target = self.target(table, ctx)?;
        let name = table.name();

        let action = existing_target(table, &target, ctx, &mut plan)?;
        plan.target_definition = Some(target.clone());
        if action == TargetAction::Keep {
            return Ok(plan);
        }

        plan.add_sql(
            Environment::Right,
            statements::USE_DESC,
            statements::use_database(ctx.target_database),
        );
        if action == TargetAction::Recreate {
            plan.add_sql(Environment::Right, statements::DROP_DESC, statements::drop_table(name));
        }
        plan.add_sql(Environment::Right, statements::CREATE_DESC, target.to_statement());
        if target.is_partitioned() {
            add_partition_actions(
                &mut plan,
                Environment::Right,
                name,
                source_table(table)?,
                ctx,
                false,
            )?;
        }
        Ok(plan)
    }
}
