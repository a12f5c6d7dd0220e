//! Bulk-copy job files.
//!
//! Requests are collected per database in the order tables finish and grouped into jobs by
//! (database, environment, source namespace, destination directory). `distcp -f` copies every
//! listed source into one target directory under its last path element, so each job has
//! exactly one target. Each (database, environment) gets one script running its jobs.

use crate::catalog::{BulkCopyRequest, Environment};
use crate::error::Result;
use crate::location::namespace_of;
use crate::report::write_atomic;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// One `distcp -f` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistcpJob {
    pub database: String,
    pub environment: Environment,
    /// Position among the jobs of the same (database, environment).
    pub sequence: usize,
    /// `scheme://authority` shared by every source.
    pub namespace: String,
    /// Parent directory shared by every destination.
    pub target: String,
    pub sources: Vec<String>,
    pub destinations: Vec<String>,
}

impl DistcpJob {
    /// `<database>_<ENVIRONMENT>_<sequence>_distcp_source.txt`
    pub fn source_file_name(&self) -> String {
        format!(
            "{}_{}_{}_distcp_source.txt",
            self.database, self.environment, self.sequence
        )
    }

    /// Newline-delimited sources.
    pub fn source_file_content(&self) -> String {
        let mut content = self.sources.join("\n");
        content.push('\n');
        content
    }
}

/// `<database>_<ENVIRONMENT>_distcp_script.sh`
pub fn script_file_name(database: &str, environment: Environment) -> String {
    format!("{}_{}_distcp_script.sh", database, environment)
}

/// Directory a destination is copied into.
fn parent_directory(destination: &str) -> &str {
    let trimmed = destination.trim_end_matches('/');
    trimmed.rsplit_once('/').map(|(p, _)| p).unwrap_or(trimmed)
}

/// Collects bulk-copy requests and turns them into jobs.
#[derive(Debug, Clone, Default)]
pub struct DistcpPlanBuilder {
    requests: Vec<(String, BulkCopyRequest)>,
}

impl DistcpPlanBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, database: &str, request: BulkCopyRequest) {
        self.requests.push((database.to_string(), request));
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Jobs ordered by database, environment and sequence. Sequences restart at 0 for every
    /// (database, environment) and follow the sorted (source namespace, target directory) pairs.
    pub fn build(&self) -> Vec<DistcpJob> {
        type Targets<'a> = BTreeMap<(&'a str, &'a str), Vec<&'a BulkCopyRequest>>;
        let mut groups: BTreeMap<(&str, Environment), Targets<'_>> = BTreeMap::new();
        for (database, request) in &self.requests {
            groups
                .entry((database.as_str(), request.environment))
                .or_default()
                .entry((namespace_of(&request.source), parent_directory(&request.destination)))
                .or_default()
                .push(request);
        }

        let mut jobs = Vec::new();
        for ((database, environment), targets) in groups {
            for (sequence, ((namespace, target), requests)) in targets.into_iter().enumerate() {
                jobs.push(DistcpJob {
                    database: database.to_string(),
                    environment,
                    sequence,
                    namespace: namespace.to_string(),
                    target: target.to_string(),
                    sources: requests.iter().map(|r| r.source.clone()).collect(),
                    destinations: requests.iter().map(|r| r.destination.clone()).collect(),
                });
            }
        }
        jobs
    }

    /// Write every source list and script into `output_dir`. Returns the written files.
    pub fn write(&self, output_dir: &Path) -> Result<Vec<PathBuf>> {
        let jobs = self.build();
        let mut written = Vec::new();
        let mut scripts: BTreeMap<(String, Environment), String> = BTreeMap::new();

        for job in &jobs {
            let path = output_dir.join(job.source_file_name());
            write_atomic(&path, &job.source_file_content())?;
            written.push(path);

            let script = scripts
                .entry((job.database.clone(), job.environment))
                .or_insert_with(|| {
                    format!(
                        "#!/usr/bin/env bash\n\
                         # distcp jobs for {} ({})\n\
                         # Copy the source files to an HCFS directory and pass it as the first argument.\n\
                         set -e\n\
                         HCFS_BASE_DIR=${{1:?usage: $0 <hcfs directory with the source files>}}\n",
                        job.database, job.environment
                    )
                });
            script.push_str(&format!(
                "hadoop distcp ${{DISTCP_OPTS}} -f $HCFS_BASE_DIR/{} {}\n",
                job.source_file_name(),
                job.target
            ));
        }

        for ((database, environment), script) in scripts {
            let path = output_dir.join(script_file_name(&database, environment));
            write_atomic(&path, &script)?;
            written.push(path);
        }

        info!("Wrote {} distcp plan files to {:?}", written.len(), output_dir);
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn request(environment: Environment, source: &str, destination: &str) -> BulkCopyRequest {
        BulkCopyRequest {
            environment,
            source: source.into(),
            destination: destination.into(),
        }
    }

    #[test]
    fn test_groups_by_namespace_with_sequences() {
        let mut builder = DistcpPlanBuilder::new();
        builder.add("sales", request(Environment::Left, "s3a://b/x/t2", "ofs://N/wh/sales.db/t2"));
        builder.add("sales", request(Environment::Left, "hdfs://A/x/t1", "ofs://N/wh/sales.db/t1"));
        builder.add("sales", request(Environment::Left, "hdfs://A/x/t3", "ofs://N/wh/sales.db/t3"));
        builder.add("sales", request(Environment::Right, "hdfs://A/x/t4", "ofs://N/wh/sales.db/t4"));
        builder.add("hr", request(Environment::Left, "hdfs://A/y/t5", "ofs://N/wh/hr.db/t5"));

        let jobs = builder.build();
        assert_eq!(jobs.len(), 4);
        assert_eq!(jobs[0].database, "hr");
        assert_eq!(jobs[0].source_file_name(), "hr_LEFT_0_distcp_source.txt");

        let sales_left: Vec<_> = jobs
            .iter()
            .filter(|j| j.database == "sales" && j.environment == Environment::Left)
            .collect();
        assert_eq!(sales_left[0].namespace, "hdfs://A");
        assert_eq!(sales_left[0].sequence, 0);
        assert_eq!(sales_left[0].sources, vec!["hdfs://A/x/t1", "hdfs://A/x/t3"]);
        assert_eq!(sales_left[1].namespace, "s3a://b");
        assert_eq!(sales_left[1].sequence, 1);
        assert_eq!(jobs[3].source_file_name(), "sales_RIGHT_0_distcp_source.txt");
    }

    #[test]
    fn test_splits_jobs_by_target_directory() {
        let mut builder = DistcpPlanBuilder::new();
        let table = "ofs://N/wh/sales.db/web_sales";
        builder.add("sales", request(Environment::Left, "hdfs://A/wh/sales.db/web_sales", table));
        builder.add(
            "sales",
            request(Environment::Left, "hdfs://A/alt/web_sales/dt=1", &format!("{}/dt=1", table)),
        );
        builder.add(
            "sales",
            request(Environment::Left, "hdfs://A/alt/web_sales/dt=2/", &format!("{}/dt=2", table)),
        );
        builder.add("sales", request(Environment::Left, "hdfs://A/wh/sales.db/items", "ofs://N/wh/sales.db/items"));

        let jobs = builder.build();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].target, "ofs://N/wh/sales.db");
        assert_eq!(jobs[0].sequence, 0);
        assert_eq!(
            jobs[0].sources,
            vec!["hdfs://A/wh/sales.db/web_sales", "hdfs://A/wh/sales.db/items"]
        );
        assert_eq!(jobs[1].target, table);
        assert_eq!(jobs[1].sequence, 1);
        assert_eq!(jobs[1].source_file_name(), "sales_LEFT_1_distcp_source.txt");
        assert_eq!(jobs[1].destinations.len(), 2);
        assert!(jobs
            .iter()
            .all(|j| j.destinations.iter().all(|d| parent_directory(d) == j.target)));
    }

    #[test]
    fn test_write_files() {
        let dir = tempdir().unwrap();
        let mut builder = DistcpPlanBuilder::new();
        builder.add("sales", request(Environment::Left, "hdfs://A/x/t1", "ofs://N/wh/sales.db/t1"));
        builder.add("sales", request(Environment::Left, "hdfs://A/x/t2", "ofs://N/wh/sales.db/t2"));

        let written = builder.write(dir.path()).unwrap();
        assert_eq!(written.len(), 2);

        let sources =
            std::fs::read_to_string(dir.path().join("sales_LEFT_0_distcp_source.txt")).unwrap();
        assert_eq!(sources, "hdfs://A/x/t1\nhdfs://A/x/t2\n");

        let script =
            std::fs::read_to_string(dir.path().join("sales_LEFT_distcp_script.sh")).unwrap();
        assert!(script.starts_with("#!/usr/bin/env bash\n"));
        assert!(script.contains(
            "hadoop distcp ${DISTCP_OPTS} -f $HCFS_BASE_DIR/sales_LEFT_0_distcp_source.txt ofs://N/wh/sales.db\n"
        ));
    }
}
