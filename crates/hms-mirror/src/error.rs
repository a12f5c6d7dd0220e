//! Error types for the mirror library.

use crate::catalog::Environment;
use crate::phase::InvalidTransitionError;
use crate::status::MessageCode;
use crate::strategy::StrategyError;
use thiserror::Error;

/// Main error type for mirror operations.
///
/// Only run-fatal conditions travel through this type to the caller. Table-level
/// failures are converted into issues on the owning table and never escape its task.
#[derive(Error, Debug)]
pub enum MirrorError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration contradiction detected before any work is scheduled
    #[error("Configuration invalid [{code:?}]: {message}")]
    Validation { code: MessageCode, message: String },

    /// The run was started without any database to process
    #[error("No databases specified for the run")]
    NoDatabases,

    /// A run is already active on this orchestrator
    #[error("A run is already in progress for this session")]
    SessionBusy,

    /// Illegal phase transition
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransitionError),

    /// Strategy could not plan a table
    #[error(transparent)]
    Strategy(#[from] StrategyError),

    /// Metastore client call failed
    #[error("Client error on {environment}: {message}")]
    Client {
        environment: Environment,
        message: String,
    },

    /// Client call exceeded the configured timeout
    #[error("Timed out after {seconds}s: {operation}")]
    Timeout { operation: String, seconds: u64 },

    /// IO error (report and plan files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Run was cancelled (SIGINT, etc.)
    #[error("Run cancelled")]
    Cancelled,

    /// The task driving a run panicked or was aborted
    #[error("Run task failed: {0}")]
    RunFailed(String),
}

impl MirrorError {
    /// Create a Client error for an environment.
    pub fn client(environment: Environment, message: impl Into<String>) -> Self {
        MirrorError::Client {
            environment,
            message: message.into(),
        }
    }

    /// Create a Validation error from a message code.
    pub fn validation(code: MessageCode) -> Self {
        MirrorError::Validation {
            code,
            message: code.description().to_string(),
        }
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            MirrorError::Config(_) | MirrorError::Validation { .. } | MirrorError::NoDatabases => 2,
            MirrorError::SessionBusy => 3,
            MirrorError::Cancelled => 130,
            _ => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for mirror operations.
pub type Result<T> = std::result::Result<T, MirrorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(MirrorError::NoDatabases.exit_code(), 2);
        assert_eq!(MirrorError::SessionBusy.exit_code(), 3);
        assert_eq!(
            MirrorError::client(Environment::Left, "boom").exit_code(),
            1
        );
    }

    #[test]
    fn test_validation_uses_code_description() {
        let err = MirrorError::validation(MessageCode::CommonStorageWithLinked);
        let text = err.to_string();
        assert!(text.contains("CommonStorageWithLinked"));
        assert!(text.contains("LINKED"));
    }
}
