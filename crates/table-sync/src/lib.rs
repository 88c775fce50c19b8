//! # table-sync
//!
//! Copies the full contents of one table from a source database into a
//! target database over ODBC, row by row, with parameterized inserts.
//!
//! - **Any engine pair** reachable through ODBC, no bulk-load features needed
//! - **Positional copy**: columns bound in the order the source reports them
//! - **Connection cycling**: both connections are rebuilt every `batch_size`
//!   rows and the source cursor resumes after the last copied row
//! - **Progress events** and a final report, or an error carrying the rows copied
//!
//! ## Example
//!
//! ```rust,no_run
//! use table_sync::{CopyEngine, OdbcConnector, SyncConfig};
//!
//! fn main() -> table_sync::Result<()> {
//!     let config = SyncConfig::load("sync.properties")?;
//!     let source = OdbcConnector::new("source", &config.source)?;
//!     let target = OdbcConnector::new("target", &config.target)?;
//!     let mut engine = CopyEngine::new(source, target, config.batch_size);
//!     let report = engine.synchronize(&config.source.table, &config.target.table)?;
//!     println!("Copied {} rows", report.rows_copied);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod sync;

// Re-exports for convenient access
pub use config::{EndpointConfig, SyncConfig, DEFAULT_BATCH_SIZE};
pub use crate::core::{ColumnDescriptor, Row, SqlType, SqlValue};
pub use drivers::OdbcConnector;
pub use error::{Result, SyncError};
pub use sync::{CopyEngine, Progress, ProgressEvent, SyncReport, SyncState};
