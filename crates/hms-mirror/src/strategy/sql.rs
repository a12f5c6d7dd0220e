use super::{
    check_acid_limit, check_partition_limit, existing_target, source_location, source_owns_data,
    source_table, CopySpec, StrategyContext, StrategyError, StrategyPlan, TargetAction,
    TranslationStrategy, BOTH,
};
use crate::catalog::{DataStrategy, Environment, TableMirror};
use crate::definition::TableDefinition;
use crate::location::{relative_path, PartitionEvaluation};
use crate::statements;

/// Data moved with `INSERT OVERWRITE` from a RIGHT shadow table over the source data.
///
/// Transactional sources, and runs staging through shared storage, first copy the data into a
/// LEFT transfer table that the RIGHT cluster can read.
pub struct SqlStrategy;

impl SqlStrategy {
    fn uses_transfer(&self, table: &TableMirror, ctx: &StrategyContext<'_>) -> bool {
        let acid = table
            .env(Environment::Left)
            .map(|t| t.definition().is_acid())
            .unwrap_or(false);
        acid || ctx.shared_storage().is_some()
    }

    fn copies_transfer(&self, ctx: &StrategyContext<'_>) -> bool {
        ctx.config.transfer.intermediate_storage.is_some() && ctx.config.transfer.distcp
    }

    fn target(
        &self,
        table: &TableMirror,
        ctx: &StrategyContext<'_>,
        plan: &mut StrategyPlan,
    ) -> Result<TableDefinition, StrategyError> {
        let source = source_table(table)?.definition();
        let downgrade = ctx.config.migrate_acid.downgrade;

        if source.is_acid() && !downgrade {
            let built = CopySpec::new(Environment::Left, Environment::Right).build(source, ctx)?;
            return Ok(built.definition);
        }

        let location = source_location(table)?;
        let translated = ctx
            .translator
            .translate(&location, &ctx.table_path(table.name(), true), None)?;
        plan.remapped |= translated.remapped;
        let built = CopySpec::new(Environment::Left, Environment::Right)
            .with_external()
            .with_ownership(source_owns_data(source))
            .with_downgrade(downgrade)
            .with_location(translated.location)
            .build(source, ctx)?;
        for issue in built.issues {
            plan.add_issue(Environment::Right, issue);
        }
        Ok(built.definition)
    }
}

impl TranslationStrategy for SqlStrategy {
    fn data_strategy(&self) -> DataStrategy {
        DataStrategy::Sql
    }

    fn environments(&self) -> &'static [Environment] {
        BOTH
    }

    fn requires_bulk_copy(&self, table: &TableMirror, ctx: &StrategyContext<'_>) -> bool {
        self.uses_transfer(table, ctx) && self.copies_transfer(ctx)
    }

    fn produce_target_definition(
        &self,
        table: &TableMirror,
        ctx: &StrategyContext<'_>,
    ) -> Result<Option<TableDefinition>, StrategyError> {
        let mut scratch = StrategyPlan::new(DataStrategy::Sql);
        self.target(table, ctx, &mut scratch).map(Some)
    }

    fn produce_actions(
        &self,
        table: &TableMirror,
        ctx: &StrategyContext<'_>,
        _evaluation: &PartitionEvaluation,
    ) -> Result<StrategyPlan, StrategyError> {
        check_partition_limit(
            table,
            ctx.config.hybrid.sql_partition_limit,
            DataStrategy::Sql,
        )?;
        check_acid_limit(table, ctx)?;

        let mut plan = StrategyPlan::new(DataStrategy::Sql);
        let name = table.name();
        let source = source_table(table)?.definition();
        let partition_columns = source.partition_columns();

        let target = self.target(table, ctx, &mut plan)?;
        let action = existing_target(table, &target, ctx, &mut plan)?;
        plan.target_definition = Some(target.clone());

        let transfer = &ctx.config.transfer;
        let mut shadow_location = source_location(table)?;
        if self.uses_transfer(table, ctx) {
            let transfer_name = format!("{}{}", transfer.transfer_prefix, name);
            let transfer_location = ctx.staging_directory(&transfer_name);
            let transfer_table = CopySpec::new(Environment::Left, Environment::Left)
                .with_external()
                .with_non_transactional()
                .with_location(transfer_location.clone())
                .with_name(transfer_name.clone())
                .build(source, ctx)?
                .definition;

            plan.add_sql(
                Environment::Left,
                statements::USE_DESC,
                statements::use_database(ctx.database),
            );
            plan.add_sql(
                Environment::Left,
                statements::CREATE_TRANSFER_DESC,
                transfer_table.to_statement(),
            );
            plan.add_sql(
                Environment::Left,
                statements::TRANSFER_DESC,
                statements::insert_overwrite(name, &transfer_name, &partition_columns),
            );
            plan.add_cleanup(
                Environment::Left,
                statements::DROP_TRANSFER_DESC,
                statements::drop_table(&transfer_name),
            );

            shadow_location = transfer_location;
            if self.copies_transfer(ctx) {
                let shared: Vec<String> =
                    ctx.shared_storage().map(String::from).into_iter().collect();
                let relative = relative_path(&shadow_location, &shared)
                    .unwrap_or(&shadow_location)
                    .to_string();
                let copied = format!("{}{}", ctx.translator.target_namespace(), relative);
                plan.add_bulk_copy(ctx.bulk_copy_environment(), &shadow_location, &copied);
                shadow_location = copied;
            }
        }

        let shadow_name = format!("{}{}", transfer.shadow_prefix, name);
        let shadow = CopySpec::new(Environment::Left, Environment::Right)
            .with_external()
            .with_non_transactional()
            .with_location(shadow_location)
            .with_name(shadow_name.clone())
            .build(source, ctx)?
            .definition;

        plan.add_sql(
            Environment::Right,
            statements::USE_DESC,
            statements::use_database(ctx.target_database),
        );
        if action == TargetAction::Recreate {
            plan.add_sql(Environment::Right, statements::DROP_DESC, statements::drop_table(name));
        }
        if action != TargetAction::Keep {
            plan.add_sql(Environment::Right, statements::CREATE_DESC, target.to_statement());
        }
        plan.add_sql(
            Environment::Right,
            statements::CREATE_SHADOW_DESC,
            shadow.to_statement(),
        );
        if shadow.is_partitioned() {
            plan.add_sql(
                Environment::Right,
                statements::MSCK_DESC,
                statements::msck_repair(&shadow_name),
            );
        }
        plan.add_sql(
            Environment::Right,
            statements::TRANSFER_DESC,
            statements::insert_overwrite(&shadow_name, name, &partition_columns),
        );
        plan.add_cleanup(
            Environment::Right,
            statements::DROP_SHADOW_DESC,
            statements::drop_table(&shadow_name),
        );
        Ok(plan)
    }
}
