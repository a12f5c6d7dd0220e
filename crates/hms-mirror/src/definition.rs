//! Immutable view over `SHOW CREATE TABLE` output.
//!
//! Every transformation returns a new [`TableDefinition`]; the lines loaded from a cluster are
//! never edited in place.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const CREATE_TABLE: &str = "CREATE TABLE";
pub const CREATE_EXTERNAL_TABLE: &str = "CREATE EXTERNAL TABLE";
pub const PARTITIONED_BY: &str = "PARTITIONED BY";
pub const CLUSTERED_BY: &str = "CLUSTERED BY";
pub const LOCATION: &str = "LOCATION";
pub const TBL_PROPERTIES: &str = "TBLPROPERTIES (";
pub const STORED_BY: &str = "STORED BY";

pub const TRANSACTIONAL: &str = "transactional";
pub const TRANSACTIONAL_PROPERTIES: &str = "transactional_properties";
pub const BUCKETING_VERSION: &str = "bucketing_version";
pub const EXTERNAL_TABLE_PURGE: &str = "external.table.purge";
pub const DISCOVER_PARTITIONS: &str = "discover.partitions";
pub const DOWNGRADED_FROM_ACID: &str = "downgraded_from_acid";
pub const LEGACY_MANAGED_FLAG: &str = "hms-mirror_LegacyManaged";
pub const CONVERTED_FLAG: &str = "hms-mirror_Converted";

/// Statistic and bookkeeping properties that never carry over to a new table.
pub const STAT_PROPERTIES: &[&str] = &[
    "COLUMN_STATS_ACCURATE",
    "numFiles",
    "numRows",
    "rawDataSize",
    "totalSize",
    "transient_lastDdlTime",
    "last_modified_by",
    "last_modified_time",
    "external",
    "discover.partitions",
];

/// Raw table definition lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableDefinition {
    lines: Vec<String>,
}

impl TableDefinition {
    pub fn new(lines: Vec<String>) -> Self {
        Self { lines }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Single statement text, one definition line per line.
    pub fn to_statement(&self) -> String {
        self.lines.join("\n")
    }

    fn create_index(&self) -> Option<usize> {
        self.lines
            .iter()
            .position(|l| l.trim_start().to_ascii_uppercase().starts_with("CREATE"))
    }

    fn create_line(&self) -> Option<&str> {
        self.create_index().map(|i| self.lines[i].trim_start())
    }

    fn index_of(&self, marker: &str) -> Option<usize> {
        self.lines.iter().position(|l| l.trim() == marker)
    }

    /// Table name from the CREATE header, without any database qualifier.
    pub fn table_name(&self) -> Option<String> {
        self.create_line()
            .and_then(split_create_line)
            .map(|(_, name, _)| name)
    }

    pub fn is_view(&self) -> bool {
        self.create_line()
            .map(|l| l.to_ascii_uppercase().contains(" VIEW "))
            .unwrap_or(false)
    }

    pub fn is_external(&self) -> bool {
        self.create_line()
            .map(|l| l.to_ascii_uppercase().starts_with(CREATE_EXTERNAL_TABLE))
            .unwrap_or(false)
    }

    pub fn is_managed(&self) -> bool {
        self.create_line()
            .map(|l| l.to_ascii_uppercase().starts_with(CREATE_TABLE))
            .unwrap_or(false)
    }

    /// Transactional table. Only a managed table whose `transactional` property parses as
    /// `true` (any case) qualifies.
    pub fn is_acid(&self) -> bool {
        self.is_managed()
            && self
                .property(TRANSACTIONAL)
                .map(|v| parse_bool(&v))
                .unwrap_or(false)
    }

    /// Managed, non-transactional table on a legacy (pre Hive 3) cluster.
    pub fn is_legacy_managed(&self, legacy_hive: bool) -> bool {
        legacy_hive && self.is_managed() && !self.is_acid()
    }

    pub fn is_external_purge(&self) -> bool {
        self.is_external()
            && self
                .property(EXTERNAL_TABLE_PURGE)
                .map(|v| parse_bool(&v))
                .unwrap_or(false)
    }

    /// Table is handled by Hive itself rather than a storage handler.
    pub fn is_hive_native(&self) -> bool {
        !self
            .lines
            .iter()
            .any(|l| l.trim_start().to_ascii_uppercase().starts_with(STORED_BY))
    }

    pub fn is_partitioned(&self) -> bool {
        self.lines
            .iter()
            .any(|l| l.trim_start().to_ascii_uppercase().starts_with(PARTITIONED_BY))
    }

    /// Partition column names, in declaration order.
    pub fn partition_columns(&self) -> Vec<String> {
        let start = match self
            .lines
            .iter()
            .position(|l| l.trim_start().to_ascii_uppercase().starts_with(PARTITIONED_BY))
        {
            Some(i) => i,
            None => return Vec::new(),
        };

        // Column names are always backtick-quoted in SHOW CREATE TABLE output.
        let mut columns = Vec::new();
        for line in &self.lines[start..] {
            let quoted = first_quoted(line);
            let has_column = quoted.is_some();
            columns.extend(quoted);
            if has_column && line.trim_end().ends_with(')') {
                break;
            }
        }
        columns
    }

    pub fn location(&self) -> Option<String> {
        let idx = self.index_of(LOCATION)?;
        self.lines
            .get(idx + 1)
            .map(|l| l.trim().trim_matches('\'').trim_matches('"').to_string())
            .filter(|l| !l.is_empty())
    }

    fn properties_range(&self) -> Option<(usize, usize)> {
        let start = self.index_of(TBL_PROPERTIES)?;
        let mut end = start;
        for (i, line) in self.lines.iter().enumerate().skip(start + 1) {
            end = i;
            if line.trim_end().ends_with(')') {
                break;
            }
        }
        Some((start, end))
    }

    /// Parsed TBLPROPERTIES block, in definition order.
    pub fn properties(&self) -> Vec<(String, Option<String>)> {
        let (start, end) = match self.properties_range() {
            Some(r) => r,
            None => return Vec::new(),
        };
        if end == start {
            return Vec::new();
        }
        self.lines[start + 1..=end]
            .iter()
            .filter_map(|l| parse_property(l))
            .collect()
    }

    pub fn property(&self, key: &str) -> Option<String> {
        self.properties()
            .into_iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .and_then(|(_, v)| v)
    }

    /// Bucket count from `INTO n BUCKETS`.
    pub fn num_buckets(&self) -> Option<u32> {
        self.lines.iter().find_map(|l| {
            let upper = l.trim().to_ascii_uppercase();
            let rest = upper.strip_prefix("INTO ")?;
            rest.strip_suffix(" BUCKETS")?.trim().parse().ok()
        })
    }

    /// SHA-256 over the structural lines (columns, partitioning, storage format), used to decide
    /// whether an existing target table matches the source.
    pub fn fingerprint(&self) -> String {
        let start = self.create_index().map(|i| i + 1).unwrap_or(0);
        let mut hasher = Sha256::new();
        for line in &self.lines[start.min(self.lines.len())..] {
            if line.trim() == LOCATION || line.trim() == TBL_PROPERTIES {
                break;
            }
            hasher.update(line.trim().as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    fn with_lines(&self, lines: Vec<String>) -> Self {
        Self { lines }
    }

    fn replace_create_line(&self, f: impl FnOnce(&str) -> String) -> Self {
        let mut lines = self.lines.clone();
        if let Some(idx) = self.create_index() {
            lines[idx] = f(lines[idx].trim_start());
        }
        self.with_lines(lines)
    }

    /// Drop the database qualifier from the CREATE header.
    pub fn strip_database(&self) -> Self {
        self.replace_create_line(|line| match split_create_line(line) {
            Some((prefix, name, suffix)) => format!("{}`{}`{}", prefix, name, suffix),
            None => line.to_string(),
        })
    }

    /// Rename the table in the CREATE header.
    pub fn with_name(&self, name: &str) -> Self {
        self.replace_create_line(|line| match split_create_line(line) {
            Some((prefix, _, suffix)) => format!("{}`{}`{}", prefix, name, suffix),
            None => line.to_string(),
        })
    }

    /// Convert a managed, non-transactional table to EXTERNAL. Returns `None` when the
    /// definition does not qualify.
    pub fn make_external(&self) -> Option<Self> {
        if !self.is_managed() || self.is_acid() {
            return None;
        }
        Some(self.replace_create_line(|line| {
            format!("{}{}", CREATE_EXTERNAL_TABLE, &line[CREATE_TABLE.len()..])
        }))
    }

    /// Set the LOCATION clause, adding one before TBLPROPERTIES when absent.
    pub fn with_location(&self, location: &str) -> Self {
        let mut lines = self.lines.clone();
        let quoted = format!("  '{}'", location);
        match self.index_of(LOCATION) {
            Some(idx) if idx + 1 < lines.len() => lines[idx + 1] = quoted,
            Some(_) => lines.push(quoted),
            None => {
                let at = self.index_of(TBL_PROPERTIES).unwrap_or(lines.len());
                lines.insert(at, quoted);
                lines.insert(at, LOCATION.to_string());
            }
        }
        self.with_lines(lines)
    }

    pub fn without_location(&self) -> Self {
        match self.index_of(LOCATION) {
            Some(idx) => {
                let mut lines = self.lines.clone();
                let end = (idx + 2).min(lines.len());
                lines.drain(idx..end);
                self.with_lines(lines)
            }
            None => self.clone(),
        }
    }

    fn with_properties(&self, properties: &[(String, Option<String>)]) -> Self {
        let mut lines = self.lines.clone();
        let (start, end) = match self.properties_range() {
            Some((s, e)) => (s, e + 1),
            None => (lines.len(), lines.len()),
        };
        let mut block = Vec::new();
        if !properties.is_empty() {
            block.push(TBL_PROPERTIES.to_string());
            let last = properties.len() - 1;
            for (i, (k, v)) in properties.iter().enumerate() {
                let mut entry = match v {
                    Some(v) => format!("  '{}'='{}'", k, v),
                    None => format!("  '{}'", k),
                };
                entry.push(if i == last { ')' } else { ',' });
                block.push(entry);
            }
        }
        lines.splice(start..end, block);
        self.with_lines(lines)
    }

    /// Insert or replace a table property.
    pub fn with_property(&self, key: &str, value: &str) -> Self {
        let mut properties = self.properties();
        match properties.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(key)) {
            Some(entry) => entry.1 = Some(value.to_string()),
            None => properties.push((key.to_string(), Some(value.to_string()))),
        }
        self.with_properties(&properties)
    }

    pub fn without_property(&self, key: &str) -> Self {
        let properties = self.properties();
        if !properties.iter().any(|(k, _)| k.eq_ignore_ascii_case(key)) {
            return self.clone();
        }
        let kept: Vec<_> = properties
            .into_iter()
            .filter(|(k, _)| !k.eq_ignore_ascii_case(key))
            .collect();
        self.with_properties(&kept)
    }

    pub fn without_properties(&self, keys: &[&str]) -> Self {
        keys.iter().fold(self.clone(), |def, key| def.without_property(key))
    }

    /// Remove a `CLUSTERED BY ... INTO n BUCKETS` clause when `n <= threshold`.
    /// Returns the new definition and the removed bucket count.
    pub fn without_buckets(&self, threshold: u32) -> (Self, Option<u32>) {
        let buckets = match self.num_buckets() {
            Some(n) if n <= threshold => n,
            _ => return (self.clone(), None),
        };
        let start = self
            .lines
            .iter()
            .position(|l| l.trim_start().to_ascii_uppercase().starts_with(CLUSTERED_BY));
        let end = self
            .lines
            .iter()
            .position(|l| l.trim().to_ascii_uppercase().ends_with(" BUCKETS"));
        match (start, end) {
            (Some(s), Some(e)) if s <= e => {
                let mut lines = self.lines.clone();
                lines.drain(s..=e);
                (self.with_lines(lines), Some(buckets))
            }
            _ => (self.clone(), None),
        }
    }
}

/// Split a CREATE header into (prefix, unqualified name, suffix).
/// Handles `` `db`.`t` ``, `` `db.t` `` and `` `t` ``.
fn split_create_line(line: &str) -> Option<(String, String, String)> {
    let open = line.find('`')?;
    let mut close = line[open + 1..].find('`')? + open + 1;
    let mut name = line[open + 1..close].to_string();

    if line[close + 1..].starts_with(".`") {
        let second_open = close + 2;
        let second_close = line[second_open + 1..].find('`')? + second_open + 1;
        name = line[second_open + 1..second_close].to_string();
        close = second_close;
    } else if let Some((_, table)) = name.rsplit_once('.') {
        name = table.to_string();
    }

    Some((
        line[..open].to_string(),
        name,
        line[close + 1..].to_string(),
    ))
}

fn first_quoted(line: &str) -> Option<String> {
    let open = line.find('`')?;
    let close = line[open + 1..].find('`')?;
    Some(line[open + 1..open + 1 + close].to_string())
}

fn parse_property(line: &str) -> Option<(String, Option<String>)> {
    let trimmed = line
        .trim()
        .trim_end_matches(')')
        .trim_end_matches(',')
        .trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.split_once("'='") {
        Some((k, v)) => Some((
            k.trim_start_matches('\'').to_string(),
            Some(v.trim_end_matches('\'').to_string()),
        )),
        None => Some((trimmed.trim_matches('\'').to_string(), None)),
    }
}

/// `"true"` in any case is true; everything else is false.
pub fn parse_bool(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

/// `a=1/b=x` to `a="1",b="x"`.
pub fn to_partition_spec(path: &str) -> String {
    path.split('/')
        .filter(|p| !p.is_empty())
        .map(|part| match part.split_once('=') {
            Some((k, v)) => format!("{}=\"{}\"", k, v),
            None => part.to_string(),
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Number of directory levels in a partition path (`a=1/b=2` is 2).
pub fn partition_depth(path: &str) -> usize {
    path.split('/').filter(|p| !p.is_empty()).count()
}
