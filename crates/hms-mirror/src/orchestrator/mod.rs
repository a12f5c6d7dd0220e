//! Run orchestration.
//!
//! A run walks the configured databases in order. For each one it checks both sides,
//! plans the database DDL, loads the table metadata and then fans the tables out over the
//! table pool. Every table follows its phase lifecycle inside its own task; failures stay on
//! the table as issues. Reports are written on a separate pool as databases finish.

mod handle;
mod pools;

pub use handle::RunHandle;
pub use pools::{Pools, WorkerPool};

use crate::catalog::{
    ActionPair, DataStrategy, DbMirror, Environment, EnvironmentTable, Issue, TableMirror,
    Warehouse, WarehousePlan,
};
use crate::client::MetastoreClient;
use crate::config::Config;
use crate::definition::TableDefinition;
use crate::distcp::DistcpPlanBuilder;
use crate::error::{MirrorError, Result};
use crate::location::{evaluate, warehouse_path, LocationTranslator, PartitionEvaluation};
use crate::phase::{executes_statements, PhaseState};
use crate::report::ReportWriter;
use crate::statements;
use crate::status::{
    DatabaseSummary, MessageCode, RunProgress, RunState, RunStatus, Stage, StageStatus,
};
use crate::strategy::{self, StrategyContext, TranslationStrategy};
use chrono::Utc;
use futures::future::join_all;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Starts runs over one configuration and one pair of clusters.
///
/// At most one run is active at a time.
pub struct Orchestrator {
    config: Arc<Config>,
    client: Arc<dyn MetastoreClient>,
    cancel: CancellationToken,
    coordination: WorkerPool,
}

impl Orchestrator {
    pub fn new(config: Config, client: Arc<dyn MetastoreClient>) -> Self {
        Self {
            config: Arc::new(config),
            client,
            cancel: CancellationToken::new(),
            coordination: WorkerPool::new("coordination", 1),
        }
    }

    /// Tie runs to an outer token, e.g. the CLI's signal handler. Cancelling it cancels the
    /// active run.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Validate the configuration and start a run in the background.
    ///
    /// `concurrency` overrides `max_threads`. Must be called within a Tokio runtime.
    pub fn start(&self, dry_run: bool, concurrency: Option<usize>) -> Result<RunHandle> {
        self.config.validate()?;
        if self.config.databases.is_empty() {
            return Err(MirrorError::NoDatabases);
        }

        let run_id = Uuid::new_v4().to_string();
        let concurrency = concurrency
            .unwrap_or_else(|| self.config.get_max_threads())
            .max(1);
        let cancel = self.cancel.child_token();
        let (progress_tx, progress_rx) = watch::channel(RunProgress::default());
        let done = Arc::new(AtomicBool::new(false));

        let ctx = Arc::new(RunContext::new(
            run_id.clone(),
            self.config.clone(),
            self.client.clone(),
            cancel.clone(),
            dry_run,
        ));
        let run_done = done.clone();
        let task = self
            .coordination
            .try_spawn(async move {
                let result = run(ctx, concurrency, progress_tx).await;
                run_done.store(true, Ordering::SeqCst);
                result
            })
            .ok_or(MirrorError::SessionBusy)?;

        Ok(RunHandle::new(run_id, cancel, done, progress_rx, task))
    }

    /// Start a run and wait for it.
    pub async fn run(&self, dry_run: bool, concurrency: Option<usize>) -> Result<RunStatus> {
        self.start(dry_run, concurrency)?.join().await
    }
}

/// Read-only inputs shared by every task of one run.
struct RunContext {
    run_id: String,
    config: Arc<Config>,
    client: Arc<dyn MetastoreClient>,
    cancel: CancellationToken,
    dry_run: bool,
    strategy: Box<dyn TranslationStrategy>,
    translator: LocationTranslator,
    warehouse_plan: WarehousePlan,
    known_namespaces: Vec<String>,
}

impl RunContext {
    fn new(
        run_id: String,
        config: Arc<Config>,
        client: Arc<dyn MetastoreClient>,
        cancel: CancellationToken,
        dry_run: bool,
    ) -> Self {
        Self {
            run_id,
            strategy: strategy::select(config.data_strategy),
            translator: LocationTranslator::new(&config),
            warehouse_plan: config.warehouse_plan(),
            known_namespaces: config.known_namespaces(),
            config,
            client,
            cancel,
            dry_run,
        }
    }

    fn data_strategy(&self) -> DataStrategy {
        self.config.data_strategy
    }

    /// Whether statements are sent to the clusters at all.
    fn applies_statements(&self) -> bool {
        !self.dry_run && executes_statements(self.data_strategy())
    }

    /// Await a client call under the configured statement timeout.
    async fn bounded<T, F>(&self, operation: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match self.config.statement_timeout_secs {
            Some(seconds) => tokio::time::timeout(Duration::from_secs(seconds), call)
                .await
                .map_err(|_| MirrorError::Timeout {
                    operation: operation.to_string(),
                    seconds,
                })?,
            None => call.await,
        }
    }
}

/// Per-database inputs of the table tasks.
struct DatabaseContext {
    name: String,
    target: String,
    warehouse: Option<Warehouse>,
}

async fn run(
    ctx: Arc<RunContext>,
    concurrency: usize,
    progress: watch::Sender<RunProgress>,
) -> Result<RunStatus> {
    let config = ctx.config.clone();
    let mut status = RunStatus::new(ctx.run_id.clone(), config.hash(), config.data_strategy);
    status.dry_run = ctx.dry_run;
    status.concurrency = concurrency;
    status.warnings.merge(&config.warnings());
    status.set_stage(Stage::ValidatingConfig, StageStatus::Completed);

    info!(
        "Starting run {} ({}, {}, {} workers)",
        ctx.run_id,
        config.data_strategy,
        if ctx.dry_run { "dry run" } else { "execute" },
        concurrency
    );

    let writer = match &config.output_dir {
        Some(dir) => Some(ReportWriter::new(dir)?),
        None => None,
    };
    let pools = Pools::new(concurrency);
    // Scheduling blocked on a table permit ends as soon as the run is cancelled.
    let close_on_cancel = {
        let tables = pools.tables.clone();
        let cancel = ctx.cancel.clone();
        tokio::spawn(async move {
            cancel.cancelled().await;
            tables.close();
        })
    };
    let mut distcp = DistcpPlanBuilder::new();
    let mut report_handles = Vec::new();

    info!("Phase 1: Loading metadata and processing tables");
    status.set_stage(Stage::LoadingMetadata, StageStatus::InProgress);
    status.set_stage(Stage::BuildingDatabases, StageStatus::InProgress);
    status.set_stage(Stage::ProcessingTables, StageStatus::InProgress);

    for (index, database) in config.databases.iter().enumerate() {
        progress.send_modify(|p| {
            p.stage = Some(Stage::ProcessingTables);
            p.current_database = Some(database.clone());
        });

        let db = if ctx.cancel.is_cancelled() {
            info!("Run cancelled, skipping database {}", database);
            skip_database(&ctx, database).await
        } else {
            process_database(&ctx, database, &pools.tables, &mut status, &progress).await
        };

        for table in db.tables() {
            for request in table.bulk_copy() {
                distcp.add(db.name(), request.clone());
            }
        }

        let mut summary = DatabaseSummary::collect(&db, &mut status.issue_codes);
        if let Some(writer) = &writer {
            summary.report = Some(
                writer
                    .database_report_path(db.name())
                    .display()
                    .to_string(),
            );
            let writer = writer.clone();
            let run_id = ctx.run_id.clone();
            let data_strategy = config.data_strategy;
            let dry_run = ctx.dry_run;
            let name = db.name().to_string();
            match pools
                .reports
                .spawn(async move { writer.write_database(&run_id, data_strategy, dry_run, &db) })
                .await
            {
                Ok(handle) => report_handles.push((name, handle)),
                Err(e) => warn!("Report for {} not written: {}", name, e),
            }
        }
        status.add_database(summary);
        progress.send_modify(|p| p.databases_completed = index + 1);
    }

    close_on_cancel.abort();

    let cancelled = ctx.cancel.is_cancelled();
    status.set_stage(Stage::LoadingMetadata, StageStatus::Completed);
    status.set_stage(Stage::BuildingDatabases, StageStatus::Completed);
    status.set_stage(
        Stage::ProcessingTables,
        if cancelled {
            StageStatus::Skipped
        } else {
            StageStatus::Completed
        },
    );

    info!("Phase 2: Writing reports");
    progress.send_modify(|p| p.stage = Some(Stage::WritingReports));
    status.set_stage(Stage::WritingReports, StageStatus::InProgress);
    let mut reports_ok = true;
    let (names, handles): (Vec<String>, Vec<_>) = report_handles.into_iter().unzip();
    for (name, result) in names.into_iter().zip(join_all(handles).await) {
        match result {
            Ok(Ok(path)) => debug!("{}: report at {:?}", name, path),
            Ok(Err(e)) => {
                error!("{}: report failed: {}", name, e);
                reports_ok = false;
            }
            Err(e) => {
                error!("{}: report task panicked: {}", name, e);
                reports_ok = false;
            }
        }
    }

    if let Some(writer) = &writer {
        if !distcp.is_empty() {
            match distcp.write(writer.output_dir()) {
                Ok(files) => {
                    status.distcp_files = files.iter().map(|p| p.display().to_string()).collect()
                }
                Err(e) => {
                    error!("distcp plan not written: {}", e);
                    reports_ok = false;
                }
            }
        }
    } else if !distcp.is_empty() {
        warn!(
            "{} bulk-copy requests planned but no output directory is configured",
            distcp.len()
        );
    }

    status.set_stage(
        Stage::WritingReports,
        if reports_ok {
            StageStatus::Completed
        } else {
            StageStatus::Errored
        },
    );
    status.state = if cancelled {
        RunState::Cancelled
    } else if status.tables_failed > 0 {
        RunState::Failed
    } else {
        RunState::Completed
    };
    status.completed_at = Some(Utc::now());

    if let Some(writer) = &writer {
        writer.write_status(&status)?;
    }

    info!(
        "Run {} {:?}: {} tables ({} success, {} failed, {} skipped) in {:.1}s, return code {}",
        status.run_id,
        status.state,
        status.tables_total,
        status.tables_success,
        status.tables_failed,
        status.tables_skipped,
        status.duration_seconds(),
        status.return_code()
    );
    Ok(status)
}

/// A database reached after cancellation: its tables are listed as skipped.
async fn skip_database(ctx: &RunContext, database: &str) -> DbMirror {
    let mut db = DbMirror::new(database);
    let names = ctx
        .bounded("list tables", ctx.client.list_tables(Environment::Left, database))
        .await
        .unwrap_or_default();
    for name in names {
        let mut table = TableMirror::new(name);
        table.fail(PhaseState::Skipped);
        db.add_table(table);
    }
    db
}

async fn process_database(
    ctx: &Arc<RunContext>,
    database: &str,
    pool: &WorkerPool,
    status: &mut RunStatus,
    progress: &watch::Sender<RunProgress>,
) -> DbMirror {
    let config = &ctx.config;
    let data_strategy = ctx.data_strategy();
    let mut db = DbMirror::new(database);
    let target = config.get_resolved_database(database);
    let warehouse = ctx.warehouse_plan.for_database(database).cloned();

    info!("Processing database {} -> {}", database, target);

    match ctx
        .bounded("database exists", ctx.client.database_exists(Environment::Left, database))
        .await
    {
        Ok(true) => {}
        Ok(false) => {
            warn!("Source database {} not found", database);
            db.add_issue(
                Environment::Left,
                Issue::warning(format!("{}: {}", MessageCode::SourceDbMissing.description(), database))
                    .with_code(MessageCode::SourceDbMissing),
            );
            status.warnings.set_with(MessageCode::SourceDbMissing, database);
            return db;
        }
        Err(e) => {
            error!("{}: {}", database, e);
            db.add_issue(
                Environment::Left,
                Issue::error(e.to_string()).with_code(MessageCode::CollectingTables),
            );
            status.errors.set_with(MessageCode::CollectingTables, database);
            return db;
        }
    }

    match ctx
        .bounded(
            "database properties",
            ctx.client.fetch_database_properties(Environment::Left, database),
        )
        .await
    {
        Ok(properties) => {
            for (key, value) in properties {
                db.set_property(Environment::Left, key, value);
            }
        }
        Err(e) => warn!("{}: database properties unavailable: {}", database, e),
    }

    let mut target_exists = false;
    if data_strategy.is_left_only() {
        if data_strategy == DataStrategy::StorageMigration {
            if let Some(warehouse) = &warehouse {
                for action in relocate_database(config, &ctx.translator, database, warehouse) {
                    db.add_action(Environment::Left, action);
                }
            }
        }
    } else {
        match ctx
            .bounded("database exists", ctx.client.database_exists(Environment::Right, &target))
            .await
        {
            Ok(true) => {
                target_exists = true;
                if let Ok(properties) = ctx
                    .bounded(
                        "database properties",
                        ctx.client.fetch_database_properties(Environment::Right, &target),
                    )
                    .await
                {
                    for (key, value) in properties {
                        db.set_property(Environment::Right, key, value);
                    }
                }
            }
            Ok(false) => {
                info!("Target database {} will be created", target);
                db.add_issue(
                    Environment::Right,
                    Issue::warning(format!("{}: {}", MessageCode::TargetDbMissing.description(), target))
                        .with_code(MessageCode::TargetDbMissing),
                );
                status.warnings.set_with(MessageCode::TargetDbMissing, &target);
                db.add_action(
                    Environment::Right,
                    ActionPair::new(statements::CREATE_DB_DESC, statements::create_database(&target)),
                );
                if let Some(warehouse) = &warehouse {
                    for action in relocate_database(config, &ctx.translator, &target, warehouse) {
                        db.add_action(Environment::Right, action);
                    }
                }
            }
            Err(e) => {
                error!("{}: {}", target, e);
                db.add_issue(
                    Environment::Right,
                    Issue::error(e.to_string()).with_code(MessageCode::CollectingTables),
                );
                status.errors.set_with(MessageCode::CollectingTables, &target);
                return db;
            }
        }
    }

    if ctx.applies_statements() {
        if let Err((environment, e)) = apply_database_actions(ctx, &db).await {
            error!("{}: database DDL failed: {}", database, e);
            db.add_issue(
                environment,
                Issue::error(format!("{}: {}", MessageCode::DatabaseCreation.description(), e))
                    .with_code(MessageCode::DatabaseCreation),
            );
            status.errors.set_with(MessageCode::DatabaseCreation, database);
            return db;
        }
    }

    let mut names = match ctx
        .bounded("list tables", ctx.client.list_tables(Environment::Left, database))
        .await
    {
        Ok(names) => names,
        Err(e) => {
            error!("{}: {}", database, e);
            db.add_issue(
                Environment::Left,
                Issue::error(e.to_string()).with_code(MessageCode::CollectingTables),
            );
            status.errors.set_with(MessageCode::CollectingTables, database);
            return db;
        }
    };
    names.sort();

    for name in &names {
        match load_table(ctx, database, &target, name, target_exists).await {
            Ok(Some(table)) => db.add_table(table),
            Ok(None) => debug!("{}.{} disappeared before it was read", database, name),
            Err(e) => {
                warn!("{}.{}: {}", database, name, e);
                let mut table = TableMirror::new(name.as_str());
                table.add_issue(
                    Environment::Left,
                    Issue::error(e.to_string()).with_code(MessageCode::CollectingTableDefinitions),
                );
                table.fail(PhaseState::Error);
                db.add_table(table);
            }
        }
    }
    debug!("{}: loaded {} tables", database, db.table_names().len());

    let names = db.table_names();
    progress.send_modify(|p| p.tables_total += names.len());

    let db_ctx = Arc::new(DatabaseContext {
        name: database.to_string(),
        target,
        warehouse,
    });
    let mut handles = Vec::new();
    for name in names {
        let Some(table) = db.take_table(&name) else {
            continue;
        };
        if table.phase().is_terminal() {
            db.add_table(table);
            progress.send_modify(|p| p.tables_completed += 1);
            continue;
        }
        let mut fallback = table.clone();
        if ctx.cancel.is_cancelled() {
            fallback.fail(PhaseState::Skipped);
            db.add_table(fallback);
            progress.send_modify(|p| p.tables_completed += 1);
            continue;
        }
        match pool
            .spawn(run_table(ctx.clone(), db_ctx.clone(), table))
            .await
        {
            Ok(handle) => handles.push((fallback, handle)),
            Err(e) => {
                warn!("{}.{} not scheduled: {}", database, name, e);
                fallback.fail(PhaseState::Skipped);
                db.add_table(fallback);
                progress.send_modify(|p| p.tables_completed += 1);
            }
        }
    }

    for (fallback, handle) in handles {
        match handle.await {
            Ok(table) => {
                debug!("{}.{}: {}", database, table.name(), table.phase());
                db.add_table(table);
            }
            Err(e) => {
                error!("{}.{}: task panicked: {}", database, fallback.name(), e);
                let mut table = fallback;
                table.add_issue(
                    Environment::Left,
                    Issue::error(format!("{}: {}", MessageCode::TaskFailed.description(), e))
                        .with_code(MessageCode::TaskFailed),
                );
                table.fail(PhaseState::Fatal);
                db.add_table(table);
            }
        }
        progress.send_modify(|p| p.tables_completed += 1);
    }

    db
}

/// `ALTER DATABASE` statements placing `database` in its warehouse on the target namespace.
fn relocate_database(
    config: &Config,
    translator: &LocationTranslator,
    database: &str,
    warehouse: &Warehouse,
) -> Vec<ActionPair> {
    let namespace = translator.target_namespace();
    let mut actions = Vec::new();
    if let Some(directory) = warehouse.directory(true) {
        actions.push(ActionPair::new(
            statements::CREATE_DB_DESC,
            statements::alter_database_location(
                database,
                &format!("{}{}/{}.db", namespace, directory, database),
            ),
        ));
    }
    let hdp_hive3 = match config.data_strategy {
        DataStrategy::StorageMigration | DataStrategy::Dump => config.clusters.left.hdp_hive3,
        _ => config.right_cluster().map(|c| c.hdp_hive3).unwrap_or(false),
    };
    if !hdp_hive3 {
        if let Some(directory) = warehouse.directory(false) {
            actions.push(ActionPair::new(
                statements::CREATE_DB_DESC,
                statements::alter_database_managed_location(
                    database,
                    &format!("{}{}/{}.db", namespace, directory, database),
                ),
            ));
        }
    }
    actions
}

async fn apply_database_actions(
    ctx: &RunContext,
    db: &DbMirror,
) -> std::result::Result<(), (Environment, MirrorError)> {
    for environment in Environment::ALL {
        for action in db.actions(environment) {
            debug!("{} {}: {}", environment, action.description, action.statement);
            ctx.bounded(
                &action.description,
                ctx.client.execute_statement(environment, &action.statement),
            )
            .await
            .map_err(|e| (environment, e))?;
        }
    }
    Ok(())
}

/// Read both sides of one table. `None` when the LEFT table vanished after listing.
async fn load_table(
    ctx: &RunContext,
    database: &str,
    target: &str,
    name: &str,
    target_exists: bool,
) -> Result<Option<TableMirror>> {
    let Some(lines) = ctx
        .bounded(
            "table definition",
            ctx.client.fetch_table_definition(Environment::Left, database, name),
        )
        .await?
    else {
        return Ok(None);
    };

    let mut table = TableMirror::new(name);
    let mut left = EnvironmentTable::loaded(name, TableDefinition::new(lines));
    if left.definition().is_partitioned() {
        let partitions = ctx
            .bounded(
                "partitions",
                ctx.client.fetch_partitions(Environment::Left, database, name),
            )
            .await?;
        left.set_partitions(partitions);
    }
    table.set_env(Environment::Left, left);

    if target_exists && !ctx.data_strategy().is_left_only() {
        if let Some(lines) = ctx
            .bounded(
                "table definition",
                ctx.client.fetch_table_definition(Environment::Right, target, name),
            )
            .await?
        {
            table.set_env(
                Environment::Right,
                EnvironmentTable::loaded(name, TableDefinition::new(lines)),
            );
        }
    }
    Ok(Some(table))
}

/// Move `table` to `to`, failing it on an illegal transition.
fn transition(table: &mut TableMirror, to: PhaseState, strategy: DataStrategy) -> bool {
    match table.advance(to, strategy) {
        Ok(_) => true,
        Err(e) => {
            error!("{}: {}", table.name(), e);
            table.add_issue(Environment::Left, Issue::error(e.to_string()));
            table.fail(PhaseState::Error);
            false
        }
    }
}

/// Drive one table through its lifecycle. Never fails: problems end up as issues.
async fn run_table(
    ctx: Arc<RunContext>,
    db: Arc<DatabaseContext>,
    mut table: TableMirror,
) -> TableMirror {
    let config = ctx.config.as_ref();
    let data_strategy = ctx.data_strategy();

    if ctx.cancel.is_cancelled() {
        table.fail(PhaseState::Skipped);
        return table;
    }
    if let Some(issue) = strategy::eligibility(&table, config) {
        debug!("{}.{}: {}", db.name, table.name(), issue.message);
        table.add_issue(Environment::Left, issue);
        table.fail(PhaseState::Skipped);
        return table;
    }
    if !transition(&mut table, PhaseState::CalculatingSql, data_strategy) {
        return table;
    }

    let sctx = StrategyContext {
        config,
        database: &db.name,
        target_database: &db.target,
        warehouse: db.warehouse.as_ref(),
        translator: &ctx.translator,
    };
    let evaluation = evaluate_partitions(&ctx, &sctx, &mut table);

    if ctx.cancel.is_cancelled() {
        table.fail(PhaseState::Skipped);
        return table;
    }

    let plan = match ctx.strategy.produce_actions(&table, &sctx, &evaluation) {
        Ok(plan) => plan,
        Err(e) => {
            warn!("{}.{}: {}", db.name, table.name(), e.issue.message);
            let environment = if data_strategy.is_left_only() {
                Environment::Left
            } else {
                Environment::Right
            };
            table.add_issue(environment, e.issue);
            table.fail(PhaseState::Error);
            return table;
        }
    };
    let resolved = plan.strategy;
    plan.apply(&mut table);
    if !transition(&mut table, PhaseState::CalculatedSql, resolved) {
        return table;
    }

    let has_statements = table
        .environments()
        .any(|(_, t)| !t.actions().is_empty() || !t.cleanup().is_empty());
    if !ctx.dry_run && executes_statements(resolved) && has_statements && !table.has_errors() {
        if ctx.cancel.is_cancelled() {
            table.fail(PhaseState::Skipped);
            return table;
        }
        if !transition(&mut table, PhaseState::ApplyingSql, resolved) {
            return table;
        }
        apply_table_actions(&ctx, &db.name, &mut table).await;
        if !table.has_errors() && !transition(&mut table, PhaseState::SqlExecuted, resolved) {
            return table;
        }
    }

    let outcome = if table.has_errors() {
        PhaseState::Error
    } else {
        PhaseState::Success
    };
    transition(&mut table, outcome, resolved);
    debug!("{}.{}: {}", db.name, table.name(), table.phase());
    table
}

/// Compare the LEFT partitions with the table's warehouse location on the target namespace.
fn evaluate_partitions(
    ctx: &RunContext,
    sctx: &StrategyContext<'_>,
    table: &mut TableMirror,
) -> PartitionEvaluation {
    if !ctx.config.evaluate_partition_location {
        return PartitionEvaluation::default();
    }
    let Some(left) = table.env(Environment::Left) else {
        return PartitionEvaluation::default();
    };
    let external = !left.definition().is_acid() || ctx.config.migrate_acid.downgrade;
    let name = table.name().to_string();
    let path = sctx.table_path(&name, external);
    let Some(directory) = path.warehouse_directory() else {
        return PartitionEvaluation::default();
    };
    let expected = warehouse_path(
        sctx.translator.target_namespace(),
        directory,
        sctx.target_database,
        &name,
    );
    evaluate(
        &name,
        table.env_mut(Environment::Left),
        &expected,
        &ctx.known_namespaces,
        ctx.config.align_locations,
    )
}

/// Execute LEFT then RIGHT actions, then cleanup, stopping at the first failure.
async fn apply_table_actions(ctx: &RunContext, database: &str, table: &mut TableMirror) {
    let mut steps: Vec<(Environment, ActionPair)> = Vec::new();
    for environment in Environment::ALL {
        if let Some(env) = table.env(environment) {
            steps.extend(env.actions().iter().cloned().map(|a| (environment, a)));
        }
    }
    for environment in Environment::ALL {
        if let Some(env) = table.env(environment) {
            steps.extend(env.cleanup().iter().cloned().map(|a| (environment, a)));
        }
    }

    for (environment, action) in steps {
        debug!(
            "{}.{} {} {}: {}",
            database,
            table.name(),
            environment,
            action.description,
            action.statement
        );
        let result = ctx
            .bounded(
                &action.description,
                ctx.client.execute_statement(environment, &action.statement),
            )
            .await;
        if let Err(e) = result {
            error!(
                "{}.{}: {} failed: {}",
                database,
                table.name(),
                action.description,
                e
            );
            table.add_issue(
                environment,
                Issue::error(format!("{}: {} [{}]", action.description, e, action.statement))
                    .with_code(MessageCode::StatementFailed),
            );
            return;
        }
    }
}
