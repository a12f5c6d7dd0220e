use super::{
    check_acid_limit, check_partition_limit, existing_target, source_location, source_owns_data,
    source_table, CopySpec, StrategyContext, StrategyError, StrategyPlan, TargetAction,
    TranslationStrategy, BOTH,
};
use crate::catalog::{DataStrategy, Environment, TableMirror};
use crate::definition::TableDefinition;
use crate::location::{relative_path, PartitionEvaluation};
use crate::statements;

/// LEFT `EXPORT`, RIGHT `IMPORT`.
pub struct ExportImportStrategy;

impl ExportImportStrategy {
    /// Directory the RIGHT cluster imports from and, when a copy is needed, the copy source.
    fn import_directory(&self, ctx: &StrategyContext<'_>, export_dir: &str) -> (String, bool) {
        let copy = ctx.config.transfer.intermediate_storage.is_some() && ctx.config.transfer.distcp;
        if !copy {
            return (export_dir.to_string(), false);
        }
        let shared: Vec<String> = ctx.shared_storage().map(String::from).into_iter().collect();
        let relative = relative_path(export_dir, &shared).unwrap_or(export_dir);
        (
            format!("{}{}", ctx.translator.target_namespace(), relative),
            true,
        )
    }

    /// Translated location for a non-transactional import.
    fn target(
        &self,
        table: &TableMirror,
        ctx: &StrategyContext<'_>,
    ) -> Result<(TableDefinition, Option<String>), StrategyError> {
        let left = source_table(table)?;
        let source = left.definition();
        if source.is_acid() {
            let built = CopySpec::new(Environment::Left, Environment::Right).build(source, ctx)?;
            return Ok((built.definition, None));
        }
        let location = source_location(table)?;
        let translated = ctx
            .translator
            .translate(&location, &ctx.table_path(table.name(), true), None)?;
        let built = CopySpec::new(Environment::Left, Environment::Right)
            .with_external()
            .with_ownership(source_owns_data(source))
            .with_location(translated.location.clone())
            .build(source, ctx)?;
        Ok((built.definition, Some(translated.location)))
    }
}

impl TranslationStrategy for ExportImportStrategy {
    fn data_strategy(&self) -> DataStrategy {
        DataStrategy::ExportImport
    }

    fn environments(&self) -> &'static [Environment] {
        BOTH
    }

    fn requires_bulk_copy(&self, _table: &TableMirror, ctx: &StrategyContext<'_>) -> bool {
        ctx.config.transfer.intermediate_storage.is_some() && ctx.config.transfer.distcp
    }

    fn produce_target_definition(
        &self,
        table: &TableMirror,
        ctx: &StrategyContext<'_>,
    ) -> Result<Option<TableDefinition>, StrategyError> {
        self.target(table, ctx).map(|(def, _)| Some(def))
    }

    fn produce_actions(
        &self,
        table: &TableMirror,
        ctx: &StrategyContext<'_>,
        _evaluation: &PartitionEvaluation,
    ) -> Result<StrategyPlan, StrategyError> {
        check_partition_limit(
            table,
            ctx.config.hybrid.export_import_partition_limit,
            DataStrategy::ExportImport,
        )?;
        check_acid_limit(table, ctx)?;

        let mut plan = StrategyPlan::new(DataStrategy::ExportImport);
        let name = table.name();
        let (target, location) = self.target(table, ctx)?;
        let action = existing_target(table, &target, ctx, &mut plan)?;
        plan.target_definition = Some(target.clone());
        if action == TargetAction::Keep {
            return Ok(plan);
        }

        let export_dir = ctx.staging_directory(name);
        plan.add_sql(
            Environment::Left,
            statements::USE_DESC,
            statements::use_database(ctx.database),
        );
        plan.add_sql(
            Environment::Left,
            statements::EXPORT_DESC,
            statements::export_table(name, &export_dir),
        );

        let (import_dir, copy) = self.import_directory(ctx, &export_dir);
        if copy {
            plan.add_bulk_copy(ctx.bulk_copy_environment(), &export_dir, &import_dir);
        }

        plan.add_sql(
            Environment::Right,
            statements::USE_DESC,
            statements::use_database(ctx.target_database),
        );
        if action == TargetAction::Recreate {
            plan.add_sql(Environment::Right, statements::DROP_DESC, statements::drop_table(name));
        }
        plan.add_sql(
            Environment::Right,
            statements::IMPORT_DESC,
            statements::import_table(name, &import_dir, location.is_some(), location.as_deref()),
        );
        Ok(plan)
    }
}
