use super::{
    add_partition_actions, existing_target, source_location, source_owns_data, source_table,
    BuiltDefinition, CopySpec, StrategyContext, StrategyError, StrategyPlan, TargetAction,
    TranslationStrategy, RIGHT_ONLY,
};
use crate::catalog::{DataStrategy, Environment, Issue, TableMirror};
use crate::definition::TableDefinition;
use crate::location::PartitionEvaluation;
use crate::statements;
use crate::status::MessageCode;

/// Schema on the RIGHT cluster over translated locations. No data moves.
pub struct SchemaOnlyStrategy;

impl SchemaOnlyStrategy {
    pub(crate) fn build(
        &self,
        table: &TableMirror,
        ctx: &StrategyContext<'_>,
        plan: &mut StrategyPlan,
    ) -> Result<BuiltDefinition, StrategyError> {
        let left = source_table(table)?;
        let source = left.definition();
        let downgrade = ctx.config.migrate_acid.downgrade;

        let mut spec = CopySpec::new(Environment::Left, Environment::Right)
            .with_external()
            .with_ownership(source_owns_data(source))
            .with_downgrade(downgrade);

        // Kept transactional tables take the database default location.
        if !source.is_acid() || downgrade {
            let location = source_location(table)?;
            let translated = ctx.translator.translate(
                &location,
                &ctx.table_path(table.name(), true),
                None,
            )?;
            if translated.remapped {
                plan.remapped = true;
                plan.add_issue(
                    Environment::Right,
                    Issue::info(format!(
                        "{} {} -> {}",
                        MessageCode::TableLocationRemapped.description(),
                        location,
                        translated.location
                    ))
                    .with_code(MessageCode::TableLocationRemapped),
                );
            }
            spec = spec.with_location(translated.location);
        }

        let built = spec.build(source, ctx)?;
        for issue in &built.issues {
            plan.add_issue(Environment::Right, issue.clone());
        }
        Ok(built)
    }
}

impl TranslationStrategy for SchemaOnlyStrategy {
    fn data_strategy(&self) -> DataStrategy {
        DataStrategy::SchemaOnly
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
        let mut scratch = StrategyPlan::new(DataStrategy::SchemaOnly);
        Ok(Some(self.build(table, ctx, &mut scratch)?.definition))
    }

    fn produce_actions(
        &self,
        table: &TableMirror,
        ctx: &StrategyContext<'_>,
        evaluation: &PartitionEvaluation,
    ) -> Result<StrategyPlan, StrategyError> {
        let mut plan = StrategyPlan::new(DataStrategy::SchemaOnly);
        let target = self.build(table, ctx, &mut plan)?.definition;
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

        if target.is_partitioned() && target.is_external() {
            let left = source_table(table)?;
            add_partition_actions(&mut plan, Environment::Right, name, left, ctx, true)?;
        }
        plan.add_repairs(Environment::Right, &evaluation.repairs);

        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use crate::catalog::EnvironmentTable;
    use crate::definition::EXTERNAL_TABLE_PURGE;

    #[test]
    fn test_schema_only_creates_translated_table() {
        let config = config(DataStrategy::SchemaOnly);
        let table = mirror(external("orders", "hdfs://LEFT/data/sales/orders", false), &[]);
        let plan = with_ctx(&config, None, |ctx| {
            SchemaOnlyStrategy
                .produce_actions(&table, ctx, &PartitionEvaluation::default())
                .unwrap()
        });

        let right = plan.actions(Environment::Right);
        assert_eq!(right.len(), 2);
        assert_eq!(right[0].statement, "USE sales");
        assert!(right[1].statement.starts_with("CREATE EXTERNAL TABLE `orders`("));
        assert!(right[1].statement.contains("'hdfs://RIGHT/data/sales/orders'"));
        let target = plan.target_definition.as_ref().unwrap();
        assert_eq!(target.property(EXTERNAL_TABLE_PURGE).as_deref(), Some("true"));
        assert!(plan.bulk_copy.is_empty());
        assert!(plan.actions(Environment::Left).is_empty());
    }

    #[test]
    fn test_schema_only_partitions_msck_or_explicit() {
        let mut config = config(DataStrategy::SchemaOnly);
        let table = mirror(
            external("orders", "hdfs://LEFT/data/orders", true),
            &[
                ("dt=2024-01-01", "hdfs://LEFT/data/orders/dt=2024-01-01"),
                ("dt=2024-01-02", "hdfs://LEFT/data/orders/dt=2024-01-02"),
            ],
        );
        let plan = with_ctx(&config, None, |ctx| {
            SchemaOnlyStrategy
                .produce_actions(&table, ctx, &PartitionEvaluation::default())
                .unwrap()
        });
        assert_eq!(
            plan.actions(Environment::Right).last().unwrap().statement,
            "MSCK REPAIR TABLE orders"
        );

        config.evaluate_partition_location = true;
        let plan = with_ctx(&config, None, |ctx| {
            SchemaOnlyStrategy
                .produce_actions(&table, ctx, &PartitionEvaluation::default())
                .unwrap()
        });
        let right = plan.actions(Environment::Right);
        assert_eq!(right.len(), 4);
        assert_eq!(
            right[2].statement,
            "ALTER TABLE orders ADD IF NOT EXISTS PARTITION (dt=\"2024-01-01\") LOCATION 'hdfs://RIGHT/data/orders/dt=2024-01-01'"
        );
    }

    #[test]
    fn test_schema_only_existing_target_matches() {
        let config = config(DataStrategy::SchemaOnly);
        let source = external("orders", "hdfs://LEFT/data/orders", false);
        let mut table = mirror(source.clone(), &[]);
        table.set_env(Environment::Right, EnvironmentTable::loaded("orders", source));
        let plan = with_ctx(&config, None, |ctx| {
            SchemaOnlyStrategy
                .produce_actions(&table, ctx, &PartitionEvaluation::default())
                .unwrap()
        });
        assert!(plan.actions(Environment::Right).is_empty());
        assert_eq!(plan.issues[0].1.code, Some(MessageCode::SchemaExistsNoAction));
    }

    #[test]
    fn test_schema_only_foreign_namespace_fails() {
        let config = config(DataStrategy::SchemaOnly);
        let table = mirror(external("orders", "s3a://bucket/orders", false), &[]);
        let err = with_ctx(&config, None, |ctx| {
            SchemaOnlyStrategy
                .produce_actions(&table, ctx, &PartitionEvaluation::default())
                .unwrap_err()
        });
        assert_eq!(err.issue.code, Some(MessageCode::LocationTranslation));
    }
}
