//! Core abstractions for database-agnostic table copying.
//!
//! - [`schema`]: column metadata and SQL type codes
//! - [`value`]: SQL value representation
//! - [`traits`]: the connector/cursor/insert seam implemented by drivers

pub mod schema;
pub mod traits;
pub mod value;

pub use schema::{ColumnDescriptor, SqlType};
pub use traits::{Connector, RowCursor, SourceConnection, TargetConnection};
pub use value::{Row, SqlValue};
