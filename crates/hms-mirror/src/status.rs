//! Run status, message codes and the aggregate return code.

use crate::catalog::{DataStrategy, DbMirror, Environment, Severity};
use crate::phase::PhaseState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Distinct conditions reported by a run. Each code owns one bit of the return code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageCode {
    CommonStorageWithLinked,
    IntermediateStorageWithLinked,
    LegacyHiveRightCluster,
    DowngradeOnlyForAcid,
    ReadOnlyValidStrategies,
    ResetToDefaultLocation,
    ResetToDefaultLocationWithoutWarehouseDirs,
    DistcpValidStrategy,
    EvaluatePartitionLocationUse,
    WarehouseDirsSameDir,
    StorageMigrationRequiredWarehouseOptions,
    StorageMigrationNamespaceLeft,
    RdlDcWarningTableAlignment,
    SyncWithReadOnly,
    SourceDbMissing,
    TargetDbMissing,
    DatabaseCreation,
    CollectingTables,
    CollectingTableDefinitions,
    LocationNotMatchWarehouse,
    LocationOutsideNamespace,
    TableLocationRemapped,
    DefinitionUnparseable,
    AcidNotSupported,
    PartitionLimitExceeded,
    StatementFailed,
    SchemaExistsNoAction,
    SchemaExistsNoActionData,
    LegacyManagedConverted,
    LocationTranslation,
    TaskFailed,
    AcidNotMigrated,
    NonAcidSkipped,
    BucketsRemoved,
    LocationStripped,
    ViewSkipped,
    RightClusterMissing,
}

impl MessageCode {
    /// Bit position in the return code.
    pub fn bit(&self) -> u32 {
        *self as u32
    }

    pub fn mask(&self) -> u64 {
        1u64 << self.bit()
    }

    pub fn description(&self) -> &'static str {
        use MessageCode::*;
        match self {
            CommonStorageWithLinked => "Common storage is not a valid option for the LINKED data strategy.",
            IntermediateStorageWithLinked => "Intermediate storage is not a valid option for the LINKED data strategy.",
            LegacyHiveRightCluster => "Legacy Hive is not supported as a target (RIGHT) cluster.",
            DowngradeOnlyForAcid => "The downgrade option only applies when ACID tables are migrated.",
            ReadOnlyValidStrategies => "Read-only is only valid with SCHEMA_ONLY, LINKED, SQL and COMMON data strategies.",
            ResetToDefaultLocation => "'align-locations' is not available for this data strategy.",
            ResetToDefaultLocationWithoutWarehouseDirs => "Warehouse directories are not defined. Without them locations can not be aligned or reset to their defaults.",
            DistcpValidStrategy => "'distcp' is not valid for this data strategy.",
            EvaluatePartitionLocationUse => "'evaluate-partition-location' is only valid for SCHEMA_ONLY, DUMP and STORAGE_MIGRATION.",
            WarehouseDirsSameDir => "The EXTERNAL and MANAGED warehouse directories can not be the same location.",
            StorageMigrationRequiredWarehouseOptions => "STORAGE_MIGRATION requires external and managed warehouse directories.",
            StorageMigrationNamespaceLeft => "No target namespace for STORAGE_MIGRATION. Assuming the LEFT namespace.",
            RdlDcWarningTableAlignment => "Aligning locations together with 'distcp' may leave tables whose names do not match their directories.",
            SyncWithReadOnly => "'sync' can not be combined with read-only.",
            SourceDbMissing => "Source database does not exist.",
            TargetDbMissing => "Target database does not exist. It will be created.",
            DatabaseCreation => "There was an issue creating or modifying databases.",
            CollectingTables => "There was an issue collecting tables.",
            CollectingTableDefinitions => "There was an issue collecting table definitions.",
            LocationNotMatchWarehouse => "Location does not match the warehouse directory.",
            LocationOutsideNamespace => "Location is outside every known namespace and was left untouched.",
            TableLocationRemapped => "The table location matched a global location map entry.",
            DefinitionUnparseable => "The table definition could not be parsed.",
            AcidNotSupported => "ACID tables are not supported by this data strategy.",
            PartitionLimitExceeded => "The partition count exceeds the configured limit for this data strategy.",
            StatementFailed => "A statement failed to execute.",
            SchemaExistsNoAction => "Schema exists already and matches. No action necessary.",
            SchemaExistsNoActionData => "Schema exists already and does not match. Drop it and try again, or use 'sync'.",
            LegacyManagedConverted => "Schema 'converted' from LEGACY managed to EXTERNAL.",
            LocationTranslation => "Location prefix does not match the LEFT namespace. The translation can not be made.",
            TaskFailed => "The table task failed unexpectedly.",
            AcidNotMigrated => "ACID table skipped. Enable migrate_acid to process it.",
            NonAcidSkipped => "Non-ACID table skipped because only ACID tables are migrated.",
            BucketsRemoved => "Artificial bucket definition removed.",
            LocationStripped => "Location stripped from the definition. The database default applies.",
            ViewSkipped => "Views are not migrated.",
            RightClusterMissing => "The RIGHT cluster is required for this data strategy.",
        }
    }
}

/// A set of message codes with optional details per code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Messages {
    codes: BTreeSet<MessageCode>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    details: BTreeMap<MessageCode, Vec<String>>,
}

impl Messages {
    pub fn set(&mut self, code: MessageCode) {
        self.codes.insert(code);
    }

    pub fn set_with(&mut self, code: MessageCode, detail: impl Into<String>) {
        self.codes.insert(code);
        self.details.entry(code).or_default().push(detail.into());
    }

    pub fn contains(&self, code: MessageCode) -> bool {
        self.codes.contains(&code)
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn codes(&self) -> impl Iterator<Item = &MessageCode> {
        self.codes.iter()
    }

    pub fn merge(&mut self, other: &Messages) {
        self.codes.extend(other.codes.iter().copied());
        for (code, details) in &other.details {
            self.details
                .entry(*code)
                .or_default()
                .extend(details.iter().cloned());
        }
    }

    /// OR of every code's bit.
    pub fn return_code(&self) -> u64 {
        self.codes.iter().fold(0, |acc, c| acc | c.mask())
    }

    /// Human readable lines, `CODE --> description [details]`.
    pub fn messages(&self) -> Vec<String> {
        self.codes
            .iter()
            .map(|code| match self.details.get(code) {
                Some(details) => format!("{:?} --> {} {}", code, code.description(), details.join("; ")),
                None => format!("{:?} --> {}", code, code.description()),
            })
            .collect()
    }
}

/// Overall state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Coarse progress markers for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ValidatingConfig,
    LoadingMetadata,
    BuildingDatabases,
    ProcessingTables,
    WritingReports,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Waiting,
    InProgress,
    Completed,
    Errored,
    Skipped,
}

/// Snapshot published while a run is active.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunProgress {
    pub stage: Option<Stage>,
    pub current_database: Option<String>,
    pub databases_completed: usize,
    pub tables_total: usize,
    pub tables_completed: usize,
}

/// Final outcome of one table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSummary {
    pub name: String,
    pub phase: PhaseState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<DataStrategy>,
    pub issues: usize,
    pub errors: usize,
}

/// Final outcome of one database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSummary {
    pub name: String,
    pub tables: Vec<TableSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<String>,
}

impl DatabaseSummary {
    /// Summarize a finished database and collect the codes of its table issues.
    pub fn collect(db: &DbMirror, codes: &mut Messages) -> Self {
        let mut tables = Vec::new();
        for table in db.tables() {
            let mut issues = 0;
            let mut errors = 0;
            for (_, issue) in table.issues() {
                issues += 1;
                if issue.severity == Severity::Error {
                    errors += 1;
                }
                if let Some(code) = issue.code {
                    if issue.severity >= Severity::Warning {
                        codes.set(code);
                    }
                }
            }
            tables.push(TableSummary {
                name: table.name().to_string(),
                phase: table.phase(),
                strategy: table.strategy(),
                issues,
                errors,
            });
        }
        for env in Environment::ALL {
            for issue in db.issues(env) {
                if let Some(code) = issue.code {
                    if issue.severity >= Severity::Warning {
                        codes.set(code);
                    }
                }
            }
        }
        Self {
            name: db.name().to_string(),
            tables,
            report: None,
        }
    }
}

/// Status of a whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStatus {
    pub run_id: String,
    pub config_hash: String,
    pub data_strategy: DataStrategy,
    pub dry_run: bool,
    pub concurrency: usize,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub stages: BTreeMap<Stage, StageStatus>,
    pub errors: Messages,
    pub warnings: Messages,
    /// Codes carried by table and database issues, reduced from each finished database.
    pub issue_codes: Messages,
    pub databases: Vec<DatabaseSummary>,
    pub tables_total: usize,
    pub tables_success: usize,
    pub tables_failed: usize,
    pub tables_skipped: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub distcp_files: Vec<String>,
}

impl RunStatus {
    pub fn new(run_id: String, config_hash: String, data_strategy: DataStrategy) -> Self {
        let stages = [
            Stage::ValidatingConfig,
            Stage::LoadingMetadata,
            Stage::BuildingDatabases,
            Stage::ProcessingTables,
            Stage::WritingReports,
        ]
        .into_iter()
        .map(|s| (s, StageStatus::Waiting))
        .collect();

        Self {
            run_id,
            config_hash,
            data_strategy,
            dry_run: true,
            concurrency: 1,
            state: RunState::Running,
            started_at: Utc::now(),
            completed_at: None,
            stages,
            errors: Messages::default(),
            warnings: Messages::default(),
            issue_codes: Messages::default(),
            databases: Vec::new(),
            tables_total: 0,
            tables_success: 0,
            tables_failed: 0,
            tables_skipped: 0,
            distcp_files: Vec::new(),
        }
    }

    pub fn set_stage(&mut self, stage: Stage, status: StageStatus) {
        self.stages.insert(stage, status);
    }

    /// Fold a finished database into the run counters.
    pub fn add_database(&mut self, summary: DatabaseSummary) {
        for table in &summary.tables {
            self.tables_total += 1;
            match table.phase {
                PhaseState::Success => self.tables_success += 1,
                PhaseState::Skipped => self.tables_skipped += 1,
                PhaseState::Error | PhaseState::Fatal => self.tables_failed += 1,
                _ => {}
            }
        }
        self.databases.push(summary);
    }

    /// Bitmask of every distinct code from run-level errors and warnings and from table
    /// issues. When no code was recorded but tables failed, the failed table count.
    pub fn return_code(&self) -> u64 {
        let mask = self.errors.return_code()
            | self.warnings.return_code()
            | self.issue_codes.return_code();
        if mask == 0 {
            self.tables_failed as u64
        } else {
            mask
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state == RunState::Cancelled
    }

    pub fn table(&self, database: &str, table: &str) -> Option<&TableSummary> {
        self.databases
            .iter()
            .find(|d| d.name == database)
            .and_then(|d| d.tables.iter().find(|t| t.name.eq_ignore_ascii_case(table)))
    }

    pub fn duration_seconds(&self) -> f64 {
        self.completed_at
            .map(|end| (end - self.started_at).num_milliseconds() as f64 / 1000.0)
            .unwrap_or(0.0)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Issue, TableMirror};

    #[test]
    fn test_codes_fit_in_mask() {
        assert!(MessageCode::RightClusterMissing.bit() < 64);
        assert_eq!(MessageCode::CommonStorageWithLinked.mask(), 1);
        assert_eq!(MessageCode::IntermediateStorageWithLinked.mask(), 2);
    }

    #[test]
    fn test_messages_return_code_is_distinct_bits() {
        let mut m = Messages::default();
        m.set(MessageCode::TargetDbMissing);
        m.set(MessageCode::TargetDbMissing);
        m.set_with(MessageCode::ResetToDefaultLocationWithoutWarehouseDirs, "db1");
        assert_eq!(
            m.return_code(),
            MessageCode::TargetDbMissing.mask()
                | MessageCode::ResetToDefaultLocationWithoutWarehouseDirs.mask()
        );
        let lines = m.messages();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().any(|l| l.contains("db1")));
    }

    #[test]
    fn test_summary_collects_warning_and_error_codes_only() {
        let mut db = DbMirror::new("db");
        let mut t = TableMirror::new("t1");
        t.add_issue(
            Environment::Left,
            Issue::info("remapped").with_code(MessageCode::TableLocationRemapped),
        );
        t.add_issue(
            Environment::Left,
            Issue::warning("off").with_code(MessageCode::LocationNotMatchWarehouse),
        );
        t.fail(PhaseState::Error);
        db.add_table(t);

        let mut codes = Messages::default();
        let summary = DatabaseSummary::collect(&db, &mut codes);
        assert_eq!(summary.tables[0].issues, 2);
        assert!(codes.contains(MessageCode::LocationNotMatchWarehouse));
        assert!(!codes.contains(MessageCode::TableLocationRemapped));

        let mut status = RunStatus::new("r".into(), "h".into(), DataStrategy::SchemaOnly);
        status.add_database(summary);
        status.issue_codes.merge(&codes);
        assert_eq!(status.tables_failed, 1);
        assert_eq!(
            status.return_code(),
            MessageCode::LocationNotMatchWarehouse.mask()
        );
    }

    #[test]
    fn test_return_code_falls_back_to_failed_tables() {
        let mut status = RunStatus::new("r".into(), "h".into(), DataStrategy::Sql);
        assert_eq!(status.return_code(), 0);
        status.tables_failed = 3;
        assert_eq!(status.return_code(), 3);
    }
}
