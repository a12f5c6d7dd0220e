//! # hms-mirror
//!
//! Hive metastore migration planning and orchestration.
//!
//! Given a LEFT (source) cluster, an optional RIGHT (target) cluster and a data strategy,
//! the engine reads table definitions, translates them for the target, and produces the
//! statements, bulk-copy plans and reports needed to move them:
//!
//! - **Eight data strategies**: schema-only, SQL, export/import, hybrid, common storage,
//!   linked, dump and in-place storage migration
//! - **Location translation** with global location maps and warehouse plans
//! - **Partition evaluation** against the expected warehouse layout
//! - **Bounded parallelism** over tables, with cancellation
//! - **Dry runs** that plan everything and execute nothing
//!
//! ## Example
//!
//! ```rust,no_run
//! use hms_mirror::{Config, MetastoreClient, Orchestrator, SnapshotClient};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> hms_mirror::Result<()> {
//!     let config = Config::load("default.yaml")?;
//!     let client: Arc<dyn MetastoreClient> = Arc::new(SnapshotClient::load("snapshot.yaml")?);
//!     let status = Orchestrator::new(config, client).run(true, None).await?;
//!     println!("{} tables, return code {}", status.tables_total, status.return_code());
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod client;
pub mod config;
pub mod definition;
pub mod distcp;
pub mod error;
pub mod location;
pub mod orchestrator;
pub mod phase;
pub mod report;
pub mod statements;
pub mod status;
pub mod strategy;

// Re-exports for convenient access
pub use catalog::{DataStrategy, DbMirror, Environment, Issue, Severity, TableMirror};
pub use client::{MetastoreClient, Snapshot, SnapshotClient};
pub use config::Config;
pub use error::{MirrorError, Result};
pub use orchestrator::{Orchestrator, RunHandle};
pub use phase::PhaseState;
pub use status::{MessageCode, RunProgress, RunState, RunStatus};
