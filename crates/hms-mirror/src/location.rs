//! Location policy: warehouse alignment checks for tables and partitions, and translation of
//! source locations to their target namespace.
//!
//! Paths are always compared namespace-relative, so `hdfs://A/wh/t` and `ofs://B/wh/t` are the
//! same directory as far as alignment is concerned.

use crate::catalog::{ActionPair, DataStrategy, EnvironmentTable, Issue, Warehouse};
use crate::config::Config;
use crate::definition::to_partition_spec;
use crate::statements;
use crate::status::MessageCode;
use crate::strategy::StrategyError;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// `scheme://authority` of a location, or `""` for a bare path.
pub fn namespace_of(location: &str) -> &str {
    match location.find("://") {
        Some(idx) => {
            let rest = &location[idx + 3..];
            let end = rest.find('/').map(|i| idx + 3 + i).unwrap_or(location.len());
            &location[..end]
        }
        None => "",
    }
}

/// Location with a known namespace removed. `None` when no namespace matches.
pub fn relative_path<'a>(location: &'a str, namespaces: &[String]) -> Option<&'a str> {
    namespaces
        .iter()
        .filter(|ns| !ns.is_empty())
        .find_map(|ns| strip_namespace(location, ns))
}

fn strip_namespace<'a>(location: &'a str, namespace: &str) -> Option<&'a str> {
    let rest = location.strip_prefix(namespace.trim_end_matches('/'))?;
    if rest.is_empty() || rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

/// Default location of a table: `namespace + directory + /<db>.db/<table>`.
pub fn warehouse_path(namespace: &str, directory: &str, database: &str, table: &str) -> String {
    format!(
        "{}{}/{}.db/{}",
        namespace.trim_end_matches('/'),
        directory.trim_end_matches('/'),
        database,
        table
    )
}

/// Outcome of checking one table's partitions against their expected locations.
#[derive(Debug, Clone, Default)]
pub struct PartitionEvaluation {
    /// Repair statements, to be placed after the strategy's own DDL.
    pub repairs: Vec<ActionPair>,
    /// Partition paths (`k=v/...`) whose location does not match.
    pub misaligned: BTreeSet<String>,
    /// Partitions or table location outside every known namespace.
    pub outside: BTreeSet<String>,
    /// Only set for tables without partitions.
    pub table_misaligned: bool,
}

impl PartitionEvaluation {
    pub fn is_aligned(&self, partition: &str) -> bool {
        !self.misaligned.contains(partition) && !self.outside.contains(partition)
    }
}

/// Compare each partition of `env_table` with `expected_table_location + "/" + <partition path>`.
///
/// Issues are appended to `env_table`. With `align` off every mismatch yields one WARNING;
/// with `align` on it yields one repair action instead. A table without partitions gets a
/// single table-level check.
pub fn evaluate(
    table_name: &str,
    env_table: &mut EnvironmentTable,
    expected_table_location: &str,
    known_namespaces: &[String],
    align: bool,
) -> PartitionEvaluation {
    let mut evaluation = PartitionEvaluation::default();
    let expected_relative = relative_path(expected_table_location, known_namespaces)
        .unwrap_or(expected_table_location)
        .trim_end_matches('/')
        .to_string();

    let partitions: Vec<(String, String)> = env_table
        .partitions()
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    if partitions.is_empty() {
        let Some(location) = env_table.location().map(str::to_string) else {
            return evaluation;
        };
        match relative_path(&location, known_namespaces) {
            None => {
                env_table.add_issue(
                    Issue::warning(format!(
                        "table location {} is outside every known namespace",
                        location
                    ))
                    .with_code(MessageCode::LocationOutsideNamespace),
                );
                evaluation.outside.insert(String::new());
            }
            Some(actual) if actual.trim_end_matches('/') != expected_relative => {
                evaluation.table_misaligned = true;
                if align {
                    evaluation.repairs.push(ActionPair::new(
                        statements::ALTER_TABLE_LOCATION_DESC,
                        statements::alter_table_location(table_name, expected_table_location),
                    ));
                } else {
                    env_table.add_issue(
                        Issue::warning(format!(
                            "{} table location {} does not match {}",
                            MessageCode::LocationNotMatchWarehouse.description(),
                            location,
                            expected_table_location
                        ))
                        .with_code(MessageCode::LocationNotMatchWarehouse),
                    );
                }
            }
            Some(_) => {}
        }
        return evaluation;
    }

    for (path, location) in partitions {
        let expected = format!("{}/{}", expected_table_location.trim_end_matches('/'), path);
        let actual = match relative_path(&location, known_namespaces) {
            Some(actual) => actual.trim_end_matches('/'),
            None => {
                env_table.add_issue(
                    Issue::warning(format!(
                        "partition {} location {} is outside every known namespace",
                        path, location
                    ))
                    .with_code(MessageCode::LocationOutsideNamespace),
                );
                evaluation.outside.insert(path);
                continue;
            }
        };
        if actual == format!("{}/{}", expected_relative, path) {
            continue;
        }

        debug!("{}: partition {} misaligned ({})", table_name, path, location);
        let spec = to_partition_spec(&path);
        if align {
            evaluation.repairs.push(ActionPair::new(
                statements::alter_partition_location_desc(&spec),
                statements::alter_partition_location(table_name, &spec, &expected),
            ));
        } else {
            env_table.add_issue(
                Issue::warning(format!(
                    "{} partition ({}) {} does not match {}",
                    MessageCode::LocationNotMatchWarehouse.description(),
                    spec,
                    location,
                    expected
                ))
                .with_code(MessageCode::LocationNotMatchWarehouse),
            );
        }
        evaluation.misaligned.insert(path);
    }

    evaluation
}

/// Where a translated location belongs.
#[derive(Debug, Clone, Copy)]
pub struct TablePath<'a> {
    /// Resolved target database name.
    pub database: &'a str,
    pub table: &'a str,
    pub warehouse: Option<&'a Warehouse>,
    pub external: bool,
}

impl TablePath<'_> {
    /// Warehouse directory for this table's kind, falling back to the external directory.
    pub fn warehouse_directory(&self) -> Option<&str> {
        let warehouse = self.warehouse?;
        warehouse
            .directory(self.external)
            .or_else(|| warehouse.directory(true))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub location: String,
    /// A global location map entry matched.
    pub remapped: bool,
}

/// Maps LEFT locations onto the target namespace.
#[derive(Debug, Clone)]
pub struct LocationTranslator {
    left_namespace: String,
    target_namespace: String,
    global_location_map: BTreeMap<String, String>,
    strategy: DataStrategy,
    align: bool,
}

impl LocationTranslator {
    pub fn new(config: &Config) -> Self {
        Self {
            left_namespace: config.left_namespace().to_string(),
            target_namespace: config.get_target_namespace(),
            global_location_map: config.global_location_map.clone(),
            strategy: config.data_strategy,
            align: config.align_locations,
        }
    }

    pub fn target_namespace(&self) -> &str {
        &self.target_namespace
    }

    pub fn left_namespace(&self) -> &str {
        &self.left_namespace
    }

    /// Location without the LEFT namespace.
    pub fn relative(&self, location: &str) -> Result<String, StrategyError> {
        strip_namespace(location, &self.left_namespace)
            .map(str::to_string)
            .ok_or_else(|| {
                StrategyError::new(
                    MessageCode::LocationTranslation,
                    format!(
                        "Location prefix `{}` doesn't match the LEFT namespace `{}`. The translation can not be made.",
                        location, self.left_namespace
                    ),
                )
            })
    }

    /// Longest matching global location map prefix applied to a relative path.
    pub fn remap(&self, relative: &str) -> Option<String> {
        self.global_location_map
            .iter()
            .filter(|(prefix, _)| relative.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(prefix, replacement)| format!("{}{}", replacement, &relative[prefix.len()..]))
    }

    /// Target location for a table (or one of its partitions).
    pub fn translate(
        &self,
        location: &str,
        path: &TablePath<'_>,
        partition: Option<&str>,
    ) -> Result<Translation, StrategyError> {
        let relative = self.relative(location)?;

        if let Some(mapped) = self.remap(&relative) {
            return Ok(Translation {
                location: format!("{}{}", self.target_namespace, mapped),
                remapped: true,
            });
        }

        if self.strategy == DataStrategy::StorageMigration
            && self.target_namespace == self.left_namespace
            && !self.align
        {
            return Err(StrategyError::new(
                MessageCode::LocationTranslation,
                format!(
                    "Location mapping can't be determined. No matching global location map entry for {}",
                    location
                ),
            ));
        }

        if self.align {
            if let Some(directory) = path.warehouse_directory() {
                let mut location =
                    warehouse_path(&self.target_namespace, directory, path.database, path.table);
                if let Some(partition) = partition {
                    location.push('/');
                    location.push_str(partition);
                }
                return Ok(Translation {
                    location,
                    remapped: false,
                });
            }
        }

        let location = match self.strategy {
            DataStrategy::Linked | DataStrategy::Common => location.to_string(),
            _ => format!("{}{}", self.target_namespace, relative),
        };
        Ok(Translation {
            location,
            remapped: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Severity;
    use crate::config::ClusterConfig;
    use crate::definition::TableDefinition;

    fn namespaces() -> Vec<String> {
        vec!["hdfs://HDP50".to_string(), "ofs://OHOME90".to_string()]
    }

    fn table(location: &str, partitions: &[(&str, &str)]) -> EnvironmentTable {
        let mut t = EnvironmentTable::loaded(
            "web_sales",
            TableDefinition::new(vec![
                "CREATE EXTERNAL TABLE `web_sales`(".to_string(),
                "  `ws_item_sk` int)".to_string(),
                "LOCATION".to_string(),
                format!("  '{}'", location),
            ]),
        );
        t.set_partitions(
            partitions
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        t
    }

    const BASE: &str = "hdfs://HDP50/warehouse/external/db.db/web_sales";

    #[test]
    fn test_namespace_helpers() {
        assert_eq!(namespace_of("hdfs://HDP50/a/b"), "hdfs://HDP50");
        assert_eq!(namespace_of("s3a://bucket"), "s3a://bucket");
        assert_eq!(namespace_of("/a/b"), "");
        assert_eq!(relative_path("ofs://OHOME90/x", &namespaces()), Some("/x"));
        assert_eq!(relative_path("hdfs://HDP500/x", &namespaces()), None);
        assert_eq!(
            warehouse_path("ofs://OHOME90/", "/wh/ext/", "db", "t"),
            "ofs://OHOME90/wh/ext/db.db/t"
        );
    }

    #[test]
    fn test_misaligned_partitions_warn_without_align() {
        let mut t = table(
            BASE,
            &[
                ("dt=1", "hdfs://HDP50/warehouse/external/db.db/web_sales/dt=1"),
                ("dt=2", "hdfs://HDP50/odd/dt=2"),
                ("dt=3", "hdfs://HDP50/odd/dt=3"),
            ],
        );
        let expected = "ofs://OHOME90/warehouse/external/db.db/web_sales";
        let eval = evaluate("web_sales", &mut t, expected, &namespaces(), false);

        assert!(eval.repairs.is_empty());
        assert_eq!(eval.misaligned.len(), 2);
        assert!(eval.is_aligned("dt=1"));
        assert_eq!(t.issues().len(), 2);
        assert!(t
            .issues()
            .iter()
            .all(|i| i.severity == Severity::Warning
                && i.code == Some(MessageCode::LocationNotMatchWarehouse)));
    }

    #[test]
    fn test_misaligned_partitions_repair_with_align() {
        let mut t = table(BASE, &[("dt=2/hr=5", "hdfs://HDP50/odd/dt=2/hr=5")]);
        let eval = evaluate("web_sales", &mut t, BASE, &namespaces(), true);

        assert!(t.issues().is_empty());
        assert_eq!(eval.repairs.len(), 1);
        assert_eq!(
            eval.repairs[0].description,
            "Alter Table Partition Spec dt=\"2\",hr=\"5\" Location"
        );
        assert_eq!(
            eval.repairs[0].statement,
            format!(
                "ALTER TABLE web_sales PARTITION (dt=\"2\",hr=\"5\") SET LOCATION \"{}/dt=2/hr=5\"",
                BASE
            )
        );
    }

    #[test]
    fn test_unpartitioned_table_level_check() {
        let mut t = table("hdfs://HDP50/odd/web_sales", &[]);
        let eval = evaluate("web_sales", &mut t, BASE, &namespaces(), true);
        assert!(eval.table_misaligned);
        assert_eq!(eval.repairs.len(), 1);
        assert_eq!(eval.repairs[0].description, "Alter Table Location");

        let mut t = table(BASE, &[]);
        let eval = evaluate("web_sales", &mut t, BASE, &namespaces(), false);
        assert!(!eval.table_misaligned);
        assert!(t.issues().is_empty());
    }

    #[test]
    fn test_outside_namespace_never_rewritten() {
        let mut t = table(BASE, &[("dt=1", "s3a://elsewhere/dt=1")]);
        let eval = evaluate("web_sales", &mut t, BASE, &namespaces(), true);
        assert!(eval.repairs.is_empty());
        assert!(!eval.is_aligned("dt=1"));
        assert_eq!(t.issues()[0].code, Some(MessageCode::LocationOutsideNamespace));
    }

    fn config(strategy: DataStrategy) -> Config {
        let mut config = Config {
            data_strategy: strategy,
            ..Default::default()
        };
        config.clusters.left.hcfs_namespace = "hdfs://LEFT".into();
        config.clusters.right = Some(ClusterConfig {
            hcfs_namespace: "hdfs://RIGHT".into(),
            ..Default::default()
        });
        config
    }

    fn path<'a>(warehouse: Option<&'a Warehouse>) -> TablePath<'a> {
        TablePath {
            database: "db",
            table: "t",
            warehouse,
            external: true,
        }
    }

    #[test]
    fn test_translate_namespace_swap() {
        let translator = LocationTranslator::new(&config(DataStrategy::SchemaOnly));
        let t = translator
            .translate("hdfs://LEFT/data/db/t", &path(None), None)
            .unwrap();
        assert_eq!(t.location, "hdfs://RIGHT/data/db/t");
        assert!(!t.remapped);

        let err = translator
            .translate("hdfs://OTHER/data/t", &path(None), None)
            .unwrap_err();
        assert_eq!(err.issue.code, Some(MessageCode::LocationTranslation));
    }

    #[test]
    fn test_translate_global_location_map_longest_prefix() {
        let mut config = config(DataStrategy::Sql);
        config
            .global_location_map
            .insert("/data".into(), "/landing".into());
        config
            .global_location_map
            .insert("/data/db".into(), "/finance/db".into());
        let translator = LocationTranslator::new(&config);
        let t = translator
            .translate("hdfs://LEFT/data/db/t", &path(None), None)
            .unwrap();
        assert_eq!(t.location, "hdfs://RIGHT/finance/db/t");
        assert!(t.remapped);
    }

    #[test]
    fn test_translate_aligned_to_warehouse() {
        let mut config = config(DataStrategy::SchemaOnly);
        config.align_locations = true;
        let translator = LocationTranslator::new(&config);
        let warehouse = Warehouse::new("/wh/ext", "/wh/mngd");
        let t = translator
            .translate("hdfs://LEFT/odd/t/dt=1", &path(Some(&warehouse)), Some("dt=1"))
            .unwrap();
        assert_eq!(t.location, "hdfs://RIGHT/wh/ext/db.db/t/dt=1");
    }

    #[test]
    fn test_linked_keeps_original_location() {
        let translator = LocationTranslator::new(&config(DataStrategy::Linked));
        let t = translator
            .translate("hdfs://LEFT/data/t", &path(None), None)
            .unwrap();
        assert_eq!(t.location, "hdfs://LEFT/data/t");
    }

    #[test]
    fn test_storage_migration_same_namespace_needs_mapping() {
        let mut config = config(DataStrategy::StorageMigration);
        config.clusters.right = None;
        let translator = LocationTranslator::new(&config);
        assert!(translator
            .translate("hdfs://LEFT/data/t", &path(None), None)
            .is_err());
    }
}
