//! YAML reports written to the output directory.

use crate::catalog::{DataStrategy, DbMirror};
use crate::error::Result;
use crate::status::RunStatus;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const RUN_STATUS_FILE: &str = "run-status.yaml";

/// Write `content` to `path` through a temporary file and a rename, so readers never see a
/// partial file.
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let temp_path = path.with_extension("tmp");
    std::fs::write(&temp_path, content)?;
    std::fs::rename(&temp_path, path)?;
    Ok(())
}

#[derive(Serialize)]
struct DatabaseReport<'a> {
    run_id: &'a str,
    data_strategy: DataStrategy,
    dry_run: bool,
    generated_at: DateTime<Utc>,
    database: &'a DbMirror,
}

/// Writes per-database reports and the final run status.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir)?;
        Ok(Self { output_dir })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// `<output_dir>/<database>_hms-mirror.yaml`
    pub fn database_report_path(&self, database: &str) -> PathBuf {
        self.output_dir.join(format!("{}_hms-mirror.yaml", database))
    }

    pub fn write_database(
        &self,
        run_id: &str,
        data_strategy: DataStrategy,
        dry_run: bool,
        db: &DbMirror,
    ) -> Result<PathBuf> {
        let report = DatabaseReport {
            run_id,
            data_strategy,
            dry_run,
            generated_at: Utc::now(),
            database: db,
        };
        let path = self.database_report_path(db.name());
        write_atomic(&path, &serde_yaml::to_string(&report)?)?;
        debug!("Wrote database report {:?}", path);
        Ok(path)
    }

    pub fn write_status(&self, status: &RunStatus) -> Result<PathBuf> {
        let path = self.output_dir.join(RUN_STATUS_FILE);
        write_atomic(&path, &serde_yaml::to_string(status)?)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Environment, EnvironmentTable, TableMirror};
    use crate::definition::TableDefinition;
    use tempfile::tempdir;

    #[test]
    fn test_write_database_report() {
        let dir = tempdir().unwrap();
        let writer = ReportWriter::new(dir.path().join("out")).unwrap();

        let mut db = DbMirror::new("sales");
        let mut table = TableMirror::new("orders");
        table.set_env(
            Environment::Left,
            EnvironmentTable::loaded(
                "orders",
                TableDefinition::new(vec!["CREATE EXTERNAL TABLE `orders`(".into()]),
            ),
        );
        db.add_table(table);

        let path = writer
            .write_database("run-1", DataStrategy::SchemaOnly, true, &db).unwrap();
        assert_eq!(path, dir.path().join("out").join("sales_hms-mirror.yaml"));
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("run_id: run-1"));
        assert!(content.contains("orders"));
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_write_status_overwrites() {
        let dir = tempdir().unwrap();
        let writer = ReportWriter::new(dir.path()).unwrap();
        let mut status = RunStatus::new("run-1".into(), "abc".into(), DataStrategy::Dump);
        writer.write_status(&status).unwrap();
        status.tables_total = 7;
        let path = writer.write_status(&status).unwrap();

        let reloaded: RunStatus =
            serde_yaml::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(reloaded.tables_total, 7);
        assert_eq!(reloaded.run_id, "run-1");
    }
}
