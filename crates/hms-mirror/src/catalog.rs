//! In-memory catalog: databases, tables, per-environment snapshots, issues and planned actions.
//!
//! A [`TableMirror`] has exactly one writer at a time. The orchestrator moves a table out of
//! its [`DbMirror`], hands it to the task that owns it, and puts it back once the task is done.

use crate::definition::TableDefinition;
use crate::phase::{self, InvalidTransitionError, PhaseState};
use crate::status::MessageCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Database property holding the external warehouse location.
pub const DB_LOCATION: &str = "LOCATION";
/// Database property holding the managed warehouse location.
pub const DB_MANAGED_LOCATION: &str = "MANAGEDLOCATION";

/// Cluster role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Environment {
    Left,
    Right,
}

impl Environment {
    pub const ALL: [Environment; 2] = [Environment::Left, Environment::Right];

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Left => "LEFT",
            Environment::Right => "RIGHT",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Migration mode. Exactly one is active per run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataStrategy {
    #[default]
    SchemaOnly,
    Sql,
    ExportImport,
    Hybrid,
    Common,
    Linked,
    Dump,
    StorageMigration,
}

impl DataStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataStrategy::SchemaOnly => "SCHEMA_ONLY",
            DataStrategy::Sql => "SQL",
            DataStrategy::ExportImport => "EXPORT_IMPORT",
            DataStrategy::Hybrid => "HYBRID",
            DataStrategy::Common => "COMMON",
            DataStrategy::Linked => "LINKED",
            DataStrategy::Dump => "DUMP",
            DataStrategy::StorageMigration => "STORAGE_MIGRATION",
        }
    }

    /// Strategies that only touch the LEFT cluster.
    pub fn is_left_only(&self) -> bool {
        matches!(self, DataStrategy::Dump | DataStrategy::StorageMigration)
    }
}

impl fmt::Display for DataStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "SCHEMA_ONLY" => Ok(DataStrategy::SchemaOnly),
            "SQL" => Ok(DataStrategy::Sql),
            "EXPORT_IMPORT" => Ok(DataStrategy::ExportImport),
            "HYBRID" => Ok(DataStrategy::Hybrid),
            "COMMON" => Ok(DataStrategy::Common),
            "LINKED" => Ok(DataStrategy::Linked),
            "DUMP" => Ok(DataStrategy::Dump),
            "STORAGE_MIGRATION" => Ok(DataStrategy::StorageMigration),
            other => Err(format!("unknown data strategy '{}'", other)),
        }
    }
}

/// Issue severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A finding recorded against a table in one environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<MessageCode>,
    pub message: String,
}

impl Issue {
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            code: None,
            message: message.into(),
        }
    }

    /// Attach a message code so the issue contributes to the run's return code.
    pub fn with_code(mut self, code: MessageCode) -> Self {
        self.code = Some(code);
        self
    }
}

/// One (description, statement) unit of a table's plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPair {
    pub description: String,
    pub statement: String,
}

impl ActionPair {
    pub fn new(description: impl Into<String>, statement: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            statement: statement.into(),
        }
    }
}

/// Request to move one directory with the bulk-copy tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkCopyRequest {
    /// Environment whose job file lists this source.
    pub environment: Environment,
    pub source: String,
    pub destination: String,
}

/// Per-environment snapshot of a table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentTable {
    name: String,
    exists: bool,
    definition: TableDefinition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    owner: Option<String>,
    #[serde(default)]
    partitions: BTreeMap<String, String>,
    #[serde(default)]
    actions: Vec<ActionPair>,
    #[serde(default)]
    cleanup: Vec<ActionPair>,
    #[serde(default)]
    issues: Vec<Issue>,
}

impl EnvironmentTable {
    /// Empty skeleton for a table that does not exist (yet) in an environment.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Snapshot loaded from a cluster.
    pub fn loaded(name: impl Into<String>, definition: TableDefinition) -> Self {
        let location = definition.location();
        Self {
            name: name.into(),
            exists: true,
            definition,
            location,
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    pub fn definition(&self) -> &TableDefinition {
        &self.definition
    }

    /// Install a newly produced definition (target side). The previous lines are replaced
    /// wholesale, never edited.
    pub fn set_definition(&mut self, definition: TableDefinition) {
        self.location = definition.location();
        self.definition = definition;
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn set_owner(&mut self, owner: impl Into<String>) {
        self.owner = Some(owner.into());
    }

    pub fn partitions(&self) -> &BTreeMap<String, String> {
        &self.partitions
    }

    pub fn set_partitions(&mut self, partitions: BTreeMap<String, String>) {
        self.partitions = partitions;
    }

    pub fn is_partitioned(&self) -> bool {
        !self.partitions.is_empty() || self.definition.is_partitioned()
    }

    pub fn actions(&self) -> &[ActionPair] {
        &self.actions
    }

    pub fn add_action(&mut self, action: ActionPair) {
        self.actions.push(action);
    }

    pub fn add_sql(&mut self, description: impl Into<String>, statement: impl Into<String>) {
        self.actions.push(ActionPair::new(description, statement));
    }

    pub fn cleanup(&self) -> &[ActionPair] {
        &self.cleanup
    }

    pub fn add_cleanup(&mut self, description: impl Into<String>, statement: impl Into<String>) {
        self.cleanup.push(ActionPair::new(description, statement));
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn add_issue(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count()
    }
}

/// One table across both environments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableMirror {
    name: String,
    phase: PhaseState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    strategy: Option<DataStrategy>,
    #[serde(default)]
    remapped: bool,
    environments: BTreeMap<Environment, EnvironmentTable>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    bulk_copy: Vec<BulkCopyRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    completed_at: Option<DateTime<Utc>>,
}

impl TableMirror {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phase: PhaseState::Init,
            strategy: None,
            remapped: false,
            environments: BTreeMap::new(),
            bulk_copy: Vec::new(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phase(&self) -> PhaseState {
        self.phase
    }

    /// Move to `target`, validated against the strategy's lifecycle.
    pub fn advance(
        &mut self,
        target: PhaseState,
        strategy: DataStrategy,
    ) -> Result<PhaseState, InvalidTransitionError> {
        self.phase = phase::advance(self.phase, target, strategy)?;
        match self.phase {
            PhaseState::CalculatingSql => self.started_at = Some(Utc::now()),
            s if s.is_terminal() => self.completed_at = Some(Utc::now()),
            _ => {}
        }
        Ok(self.phase)
    }

    /// Force a failure state from wherever the table is. No-op once terminal.
    pub fn fail(&mut self, state: PhaseState) {
        if !self.phase.is_terminal() && state.is_terminal() {
            self.phase = state;
            self.completed_at = Some(Utc::now());
        }
    }

    pub fn strategy(&self) -> Option<DataStrategy> {
        self.strategy
    }

    pub fn set_strategy(&mut self, strategy: DataStrategy) {
        self.strategy = Some(strategy);
    }

    pub fn is_remapped(&self) -> bool {
        self.remapped
    }

    pub fn set_remapped(&mut self) {
        self.remapped = true;
    }

    pub fn env(&self, environment: Environment) -> Option<&EnvironmentTable> {
        self.environments.get(&environment)
    }

    /// Environment snapshot, created as an empty skeleton on first access.
    pub fn env_mut(&mut self, environment: Environment) -> &mut EnvironmentTable {
        let name = self.name.clone();
        self.environments
            .entry(environment)
            .or_insert_with(|| EnvironmentTable::new(name))
    }

    pub fn set_env(&mut self, environment: Environment, table: EnvironmentTable) {
        self.environments.insert(environment, table);
    }

    pub fn environments(&self) -> impl Iterator<Item = (&Environment, &EnvironmentTable)> {
        self.environments.iter()
    }

    pub fn add_issue(&mut self, environment: Environment, issue: Issue) {
        self.env_mut(environment).add_issue(issue);
    }

    pub fn issue_count(&self, environment: Environment) -> usize {
        self.env(environment).map(|t| t.issues().len()).unwrap_or(0)
    }

    pub fn error_count(&self, environment: Environment) -> usize {
        self.env(environment).map(|t| t.error_count()).unwrap_or(0)
    }

    /// Aggregated view over both environments.
    pub fn issues(&self) -> impl Iterator<Item = (Environment, &Issue)> {
        self.environments
            .iter()
            .flat_map(|(env, t)| t.issues().iter().map(move |i| (*env, i)))
    }

    pub fn has_errors(&self) -> bool {
        self.environments.values().any(|t| t.error_count() > 0)
    }

    pub fn bulk_copy(&self) -> &[BulkCopyRequest] {
        &self.bulk_copy
    }

    pub fn add_bulk_copy(&mut self, request: BulkCopyRequest) {
        self.bulk_copy.push(request);
    }
}

/// One source database and its tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbMirror {
    name: String,
    #[serde(default)]
    properties: BTreeMap<Environment, BTreeMap<String, String>>,
    #[serde(default)]
    actions: BTreeMap<Environment, Vec<ActionPair>>,
    #[serde(default)]
    issues: BTreeMap<Environment, Vec<Issue>>,
    tables: BTreeMap<String, TableMirror>,
}

impl DbMirror {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: BTreeMap::new(),
            actions: BTreeMap::new(),
            issues: BTreeMap::new(),
            tables: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn key(name: &str) -> String {
        name.to_lowercase()
    }

    /// Insert a table, replacing any table with the same case-insensitive name.
    pub fn add_table(&mut self, table: TableMirror) {
        self.tables.insert(Self::key(table.name()), table);
    }

    pub fn table(&self, name: &str) -> Option<&TableMirror> {
        self.tables.get(&Self::key(name))
    }

    pub fn table_mut(&mut self, name: &str) -> Option<&mut TableMirror> {
        self.tables.get_mut(&Self::key(name))
    }

    /// Remove a table so a task can own it exclusively.
    pub fn take_table(&mut self, name: &str) -> Option<TableMirror> {
        self.tables.remove(&Self::key(name))
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableMirror> {
        self.tables.values()
    }

    pub fn tables_mut(&mut self) -> impl Iterator<Item = &mut TableMirror> {
        self.tables.values_mut()
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.values().map(|t| t.name().to_string()).collect()
    }

    pub fn property(&self, environment: Environment, key: &str) -> Option<&str> {
        self.properties
            .get(&environment)
            .and_then(|p| p.get(key))
            .map(String::as_str)
    }

    pub fn properties(&self, environment: Environment) -> Option<&BTreeMap<String, String>> {
        self.properties.get(&environment)
    }

    pub fn set_property(
        &mut self,
        environment: Environment,
        key: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.properties
            .entry(environment)
            .or_default()
            .insert(key.into(), value.into());
    }

    pub fn actions(&self, environment: Environment) -> &[ActionPair] {
        self.actions
            .get(&environment)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn add_action(&mut self, environment: Environment, action: ActionPair) {
        self.actions.entry(environment).or_default().push(action);
    }

    pub fn issues(&self, environment: Environment) -> &[Issue] {
        self.issues
            .get(&environment)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn add_issue(&mut self, environment: Environment, issue: Issue) {
        self.issues.entry(environment).or_default().push(issue);
    }
}

/// The whole catalog for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Conversion {
    databases: BTreeMap<String, DbMirror>,
}

impl Conversion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_database(&mut self, db: DbMirror) {
        self.databases.insert(db.name().to_string(), db);
    }

    pub fn database(&self, name: &str) -> Option<&DbMirror> {
        self.databases.get(name)
    }

    pub fn database_mut(&mut self, name: &str) -> Option<&mut DbMirror> {
        self.databases.get_mut(name)
    }

    pub fn databases(&self) -> impl Iterator<Item = &DbMirror> {
        self.databases.values()
    }

    /// Tables that ended in ERROR or FATAL.
    pub fn unsuccessful_table_count(&self) -> usize {
        self.databases
            .values()
            .flat_map(|db| db.tables())
            .filter(|t| matches!(t.phase(), PhaseState::Error | PhaseState::Fatal))
            .count()
    }
}

/// Base directories for one database's tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_directory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_directory: Option<String>,
}

impl Warehouse {
    pub fn new(external: impl Into<String>, managed: impl Into<String>) -> Self {
        Self {
            external_directory: Some(external.into()),
            managed_directory: Some(managed.into()),
        }
    }

    /// Both directories are set.
    pub fn is_defined(&self) -> bool {
        self.external_directory.is_some() && self.managed_directory.is_some()
    }

    /// Directory for a table of the given kind, trailing slashes removed.
    pub fn directory(&self, external: bool) -> Option<&str> {
        let dir = if external {
            self.external_directory.as_deref()
        } else {
            self.managed_directory.as_deref()
        };
        dir.map(|d| d.trim_end_matches('/'))
    }
}

/// Read-only per-database warehouse assignments for a run.
#[derive(Debug, Clone, Default)]
pub struct WarehousePlan {
    plans: BTreeMap<String, Warehouse>,
    default: Option<Warehouse>,
}

impl WarehousePlan {
    pub fn new(plans: BTreeMap<String, Warehouse>, default: Option<Warehouse>) -> Self {
        Self {
            plans: plans
                .into_iter()
                .map(|(db, w)| (db.to_lowercase(), w))
                .collect(),
            default: default.filter(Warehouse::is_defined),
        }
    }

    /// Plan entry for the database, else the global default.
    pub fn for_database(&self, database: &str) -> Option<&Warehouse> {
        self.plans
            .get(&database.to_lowercase())
            .filter(|w| w.is_defined())
            .or(self.default.as_ref())
    }

    pub fn has_plan(&self, database: &str) -> bool {
        self.for_database(database).is_some()
    }
}
