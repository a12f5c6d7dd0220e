//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use crate::status::Messages;
use sha2::{Digest, Sha256};
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Run-fatal checks. The database list is checked when a run starts, so it can still be
    /// supplied after loading.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Non-fatal findings recorded as run warnings.
    pub fn warnings(&self) -> Messages {
        validation::warnings(self)
    }

    /// Compute a SHA256 hash of the configuration, recorded with every run.
    pub fn hash(&self) -> String {
        let yaml = serde_yaml::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(yaml.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DataStrategy;
    use crate::error::MirrorError;
    use crate::status::MessageCode;

    #[test]
    fn test_from_yaml_validates() {
        let yaml = r#"
data_strategy: LINKED
databases: [db1]
clusters:
  left:
    hcfs_namespace: hdfs://LEFT
  right:
    hcfs_namespace: hdfs://RIGHT
transfer:
  common_storage: s3a://shared
"#;
        match Config::from_yaml(yaml) {
            Err(MirrorError::Validation { code, .. }) => {
                assert_eq!(code, MessageCode::CommonStorageWithLinked)
            }
            other => panic!("expected validation error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "data_strategy: DUMP\ndatabases: [db1]\nclusters:\n  left:\n    hcfs_namespace: hdfs://LEFT\n",
        )
        .unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.data_strategy, DataStrategy::Dump);
    }

    #[test]
    fn test_hash_is_stable_and_sensitive() {
        let a = Config::from_yaml("databases: [db1]\nclusters:\n  left:\n    hcfs_namespace: hdfs://L\n  right:\n    hcfs_namespace: hdfs://R\n").unwrap();
        let mut b = a.clone();
        assert_eq!(a.hash(), b.hash());
        assert_eq!(a.hash().len(), 64);
        b.sync = true;
        assert_ne!(a.hash(), b.hash());
    }
}
