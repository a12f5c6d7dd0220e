use super::{
    source_location, source_owns_data, source_table, CopySpec, StrategyContext, StrategyError,
    StrategyPlan, TranslationStrategy, LEFT_ONLY,
};
use crate::catalog::{DataStrategy, Environment, Issue, TableMirror};
use crate::definition::{to_partition_spec, TableDefinition};
use crate::location::{warehouse_path, PartitionEvaluation};
use crate::statements;
use crate::status::MessageCode;
use tracing::debug;

/// Moves LEFT tables to new storage inside the LEFT metastore.
///
/// With distcp the metadata is re-pointed and the directories are copied out of band. Without
/// it, or for transactional tables that stay transactional, the table is renamed to an archive,
/// recreated at the new location and refilled with `INSERT OVERWRITE`.
pub struct StorageMigrationStrategy;

struct NewLocation {
    location: String,
    /// Outside the warehouse directory of the database.
    outside_warehouse: bool,
    remapped: bool,
}

impl StorageMigrationStrategy {
    fn external_target(&self, source: &TableDefinition, ctx: &StrategyContext<'_>) -> bool {
        !source.is_acid() || ctx.config.migrate_acid.downgrade
    }

    fn uses_distcp(&self, source: &TableDefinition, ctx: &StrategyContext<'_>) -> bool {
        ctx.config.transfer.distcp && !source.is_acid()
    }

    fn new_location(
        &self,
        table: &TableMirror,
        ctx: &StrategyContext<'_>,
    ) -> Result<NewLocation, StrategyError> {
        let source = source_table(table)?.definition();
        let path = ctx.table_path(table.name(), self.external_target(source, ctx));
        let directory = path.warehouse_directory().map(|d| d.trim_end_matches('/'));
        let relative = ctx.translator.relative(&source_location(table)?)?;
        let target_namespace = ctx.translator.target_namespace();

        if let Some(mapped) = ctx.translator.remap(&relative) {
            let outside_warehouse = match directory {
                Some(dir) => !mapped.starts_with(&format!("{}/", dir)),
                None => false,
            };
            return Ok(NewLocation {
                location: format!("{}{}", target_namespace, mapped),
                outside_warehouse,
                remapped: true,
            });
        }

        let directory = directory.ok_or_else(|| {
            StrategyError::new(
                MessageCode::StorageMigrationRequiredWarehouseOptions,
                format!(
                    "{}: {}",
                    table.name(),
                    MessageCode::StorageMigrationRequiredWarehouseOptions.description()
                ),
            )
        })?;
        Ok(NewLocation {
            location: warehouse_path(target_namespace, directory, ctx.target_database, table.name()),
            outside_warehouse: false,
            remapped: false,
        })
    }

    fn target(
        &self,
        table: &TableMirror,
        ctx: &StrategyContext<'_>,
        location: &str,
    ) -> Result<(TableDefinition, Vec<Issue>), StrategyError> {
        let source = source_table(table)?.definition();
        if source.is_acid() && !ctx.config.migrate_acid.downgrade {
            return Ok((source.strip_database().with_location(location), Vec::new()));
        }
        let built = CopySpec::new(Environment::Left, Environment::Left)
            .with_ownership(source_owns_data(source))
            .with_downgrade(source.is_acid())
            .with_location(location)
            .build(source, ctx)?;
        Ok((built.definition, built.issues))
    }

    /// Metadata moves plus one copy per directory.
    fn plan_distcp(
        &self,
        table: &TableMirror,
        ctx: &StrategyContext<'_>,
        evaluation: &PartitionEvaluation,
        new_location: &str,
        plan: &mut StrategyPlan,
    ) -> Result<(), StrategyError> {
        let name = table.name();
        let left = source_table(table)?;
        let old_location = source_location(table)?;
        let old_relative = ctx.translator.relative(&old_location)?;
        let new_location = new_location.trim_end_matches('/');

        plan.add_sql(
            Environment::Left,
            statements::ALTER_TABLE_LOCATION_DESC,
            statements::alter_table_location(name, new_location),
        );
        plan.add_bulk_copy(Environment::Left, &old_location, new_location);

        let epl = ctx.config.evaluate_partition_location;
        let align = ctx.config.align_locations;
        let path = ctx.table_path(name, true);
        for (partition, location) in left.partitions() {
            let spec = to_partition_spec(partition);
            let aligned = if epl {
                evaluation.is_aligned(partition)
            } else {
                ctx.translator
                    .relative(location)
                    .map(|r| r.trim_end_matches('/') == format!("{}/{}", old_relative.trim_end_matches('/'), partition))
                    .unwrap_or(false)
            };

            // Evaluated without repair: the evaluator already warned, the partition stays put.
            if epl && !align && !aligned {
                continue;
            }

            let destination = if aligned || align {
                format!("{}/{}", new_location, partition)
            } else {
                match ctx.translator.translate(location, &path, Some(partition)) {
                    Ok(translated) => {
                        plan.remapped |= translated.remapped;
                        translated.location
                    }
                    Err(e) => {
                        debug!("{}: partition {} not moved: {}", name, partition, e);
                        continue;
                    }
                }
            };

            plan.add_sql(
                Environment::Left,
                statements::alter_partition_location_desc(&spec),
                statements::alter_partition_location(name, &spec, &destination),
            );
            if !aligned {
                plan.add_bulk_copy(Environment::Left, location, &destination);
            }
        }
        Ok(())
    }

    /// Rename, recreate at the new location, refill from the archive.
    fn plan_rewrite(
        &self,
        table: &TableMirror,
        ctx: &StrategyContext<'_>,
        target: &TableDefinition,
        plan: &mut StrategyPlan,
    ) -> Result<(), StrategyError> {
        let name = table.name();
        let source = source_table(table)?.definition();
        let archive = format!("{}{}", ctx.config.transfer.archive_prefix, name);

        plan.add_sql(
            Environment::Left,
            statements::RENAME_DESC,
            statements::rename_table(name, &archive),
        );
        plan.add_sql(Environment::Left, statements::CREATE_DESC, target.to_statement());
        plan.add_sql(
            Environment::Left,
            statements::TRANSFER_DESC,
            statements::insert_overwrite(&archive, name, &source.partition_columns()),
        );
        plan.add_cleanup(
            Environment::Left,
            statements::DROP_ARCHIVE_DESC,
            statements::drop_table(&archive),
        );
        Ok(())
    }
}

impl TranslationStrategy for StorageMigrationStrategy {
    fn data_strategy(&self) -> DataStrategy {
        DataStrategy::StorageMigration
    }

    fn environments(&self) -> &'static [Environment] {
        LEFT_ONLY
    }

    fn requires_bulk_copy(&self, table: &TableMirror, ctx: &StrategyContext<'_>) -> bool {
        table
            .env(Environment::Left)
            .map(|left| self.uses_distcp(left.definition(), ctx))
            .unwrap_or(false)
    }

    fn produce_target_definition(
        &self,
        table: &TableMirror,
        ctx: &StrategyContext<'_>,
    ) -> Result<Option<TableDefinition>, StrategyError> {
        let new = self.new_location(table, ctx)?;
        self.target(table, ctx, &new.location).map(|(def, _)| Some(def))
    }

    fn produce_actions(
        &self,
        table: &TableMirror,
        ctx: &StrategyContext<'_>,
        evaluation: &PartitionEvaluation,
    ) -> Result<StrategyPlan, StrategyError> {
        let mut plan = StrategyPlan::new(DataStrategy::StorageMigration);
        let source = source_table(table)?.definition();

        let new = self.new_location(table, ctx)?;
        plan.remapped = new.remapped;
        if new.outside_warehouse {
            plan.add_issue(
                Environment::Left,
                Issue::warning(format!(
                    "{} table location {} is outside the database warehouse",
                    MessageCode::LocationNotMatchWarehouse.description(),
                    new.location
                ))
                .with_code(MessageCode::LocationNotMatchWarehouse),
            );
        }

        let (target, issues) = self.target(table, ctx, &new.location)?;
        for issue in issues {
            plan.add_issue(Environment::Left, issue);
        }

        plan.add_sql(
            Environment::Left,
            statements::USE_DESC,
            statements::use_database(ctx.database),
        );
        if self.uses_distcp(source, ctx) {
            self.plan_distcp(table, ctx, evaluation, &new.location, &mut plan)?;
        } else {
            self.plan_rewrite(table, ctx, &target, &mut plan)?;
        }
        plan.add_repairs(Environment::Left, &evaluation.repairs);
        plan.target_definition = Some(target);
        Ok(plan)
    }
}
