use super::{
    add_partition_actions, existing_target, source_location, source_owns_data, source_table,
    CopySpec, StrategyContext, StrategyError, StrategyPlan, TargetAction, TranslationStrategy,
    BOTH,
};
use crate::catalog::{DataStrategy, Environment, Issue, TableMirror};
use crate::definition::{TableDefinition, CONVERTED_FLAG, EXTERNAL_TABLE_PURGE};
use crate::location::PartitionEvaluation;
use crate::statements;
use crate::status::MessageCode;

/// Both clusters share storage: the RIGHT table uses the original location and LEFT
/// managed tables give up ownership of the data.
pub struct CommonStrategy;

impl CommonStrategy {
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
            .with_ownership(source_owns_data(left.definition()))
            .with_location(location)
            .build(left.definition(), ctx)?
            .definition)
    }
}

impl TranslationStrategy for CommonStrategy {
    fn data_strategy(&self) -> DataStrategy {
        DataStrategy::Common
    }

    fn environments(&self) -> &'static [Environment] {
        BOTH
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
        let mut plan = StrategyPlan::new(DataStrategy::Common);
        let target = self.target(table, ctx)?;
        let name = table.name();
        let source = source_table(table)?.definition();

        let action = existing_target(table, &target, ctx, &mut plan)?;
        plan.target_definition = Some(target.clone());
        if action == TargetAction::Keep {
            return Ok(plan);
        }

        if source.is_managed() || source.is_external_purge() {
            plan.add_sql(
                Environment::Left,
                statements::USE_DESC,
                statements::use_database(ctx.database),
            );
            if source.is_managed() {
                plan.add_sql(
                    Environment::Left,
                    statements::ALTER_PROPERTIES_DESC,
                    statements::set_table_property(name, "EXTERNAL", "TRUE"),
                );
                plan.add_sql(
                    Environment::Left,
                    statements::ALTER_PROPERTIES_DESC,
                    statements::set_table_property(name, CONVERTED_FLAG, "true"),
                );
                plan.add_issue(
                    Environment::Left,
                    Issue::info("Managed table converted to EXTERNAL without purge"),
                );
            }
            plan.add_sql(
                Environment::Left,
                statements::ALTER_PROPERTIES_DESC,
                statements::set_table_property(name, EXTERNAL_TABLE_PURGE, "false"),
            );
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

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;

    #[test]
    fn test_common_hands_ownership_to_right() {
        let mut config = config(DataStrategy::Common);
        config.transfer.common_storage = Some("s3a://shared".into());
        let table = mirror(external("orders", "s3a://shared/data/orders", false), &[]);
        let plan = with_ctx(&config, None, |ctx| {
            CommonStrategy
                .produce_actions(&table, ctx, &PartitionEvaluation::default())
                .unwrap()
        });

        let left = plan.actions(Environment::Left);
        assert_eq!(
            left.last().unwrap().statement,
            "ALTER TABLE orders SET TBLPROPERTIES ('external.table.purge'='false')"
        );
        let target = plan.target_definition.as_ref().unwrap();
        assert_eq!(target.location().as_deref(), Some("s3a://shared/data/orders"));
        assert_eq!(target.property(EXTERNAL_TABLE_PURGE).as_deref(), Some("true"));
    }

    #[test]
    fn test_common_converts_left_managed() {
        let config = config(DataStrategy::Common);
        let table = mirror(
            lines("CREATE TABLE `plain`(\n  `id` int)\nLOCATION\n  'hdfs://LEFT/wh/plain'"),
            &[],
        );
        let plan = with_ctx(&config, None, |ctx| {
            CommonStrategy
                .produce_actions(&table, ctx, &PartitionEvaluation::default())
                .unwrap()
        });
        let left = plan.actions(Environment::Left);
        assert_eq!(left.len(), 4);
        assert_eq!(
            left[1].statement,
            "ALTER TABLE plain SET TBLPROPERTIES ('EXTERNAL'='TRUE')"
        );
        assert!(plan.target_definition.unwrap().is_external());
    }
}
