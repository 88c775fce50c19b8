//! Error types for the table synchronization library.

use thiserror::Error;

/// Exit status for a successful run.
pub const EXIT_SUCCESS: u8 = 0;
/// Exit status for configuration errors (missing file, invalid settings).
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Exit status for connectivity errors (driver, connect, reconnect).
pub const EXIT_CONNECTION_ERROR: u8 = 2;
/// Exit status for query errors (count, select, metadata, insert execution).
pub const EXIT_QUERY_ERROR: u8 = 3;
/// Exit status for data integrity errors (zero rows affected).
pub const EXIT_DATA_ERROR: u8 = 4;
/// Exit status for I/O errors outside configuration loading.
pub const EXIT_IO_ERROR: u8 = 7;
/// Exit status for a run interrupted by SIGINT/SIGTERM.
pub const EXIT_CANCELLED: u8 = 130;

/// Main error type for synchronization operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Configuration error (missing settings file, invalid values, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection could not be opened, reopened or registered
    #[error("Connection error: {message}\n  Context: {context}")]
    Connection { message: String, context: String },

    /// Query execution or result metadata failed
    #[error("Query failed: {message}\n  SQL: {sql}")]
    Query { message: String, sql: String },

    /// An insert did not affect the target as expected
    #[error("Data integrity error on {table} at row {row}: {message}")]
    DataIntegrity {
        table: String,
        row: u64,
        message: String,
    },

    /// A fatal error raised after streaming started, with the rows copied before it
    #[error("Synchronization of {table} aborted after {rows_copied} rows")]
    Aborted {
        table: String,
        rows_copied: u64,
        #[source]
        source: Box<SyncError>,
    },

    /// Synchronization was cancelled (SIGINT, etc.)
    #[error("Synchronization cancelled")]
    Cancelled,

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    /// Create a Connection error with context about where it occurred
    pub fn connection(message: impl Into<String>, context: impl Into<String>) -> Self {
        SyncError::Connection {
            message: message.into(),
            context: context.into(),
        }
    }

    /// Create a Query error for the given SQL text
    pub fn query(message: impl Into<String>, sql: impl Into<String>) -> Self {
        SyncError::Query {
            message: message.into(),
            sql: sql.into(),
        }
    }

    /// Create a DataIntegrity error
    pub fn data_integrity(table: impl Into<String>, row: u64, message: impl Into<String>) -> Self {
        SyncError::DataIntegrity {
            table: table.into(),
            row,
            message: message.into(),
        }
    }

    /// Wrap a failure with the number of rows already copied.
    pub fn aborted(table: impl Into<String>, rows_copied: u64, source: SyncError) -> Self {
        SyncError::Aborted {
            table: table.into(),
            rows_copied,
            source: Box::new(source),
        }
    }

    /// Rows copied before the failure, if the run got as far as streaming.
    pub fn rows_copied(&self) -> Option<u64> {
        match self {
            SyncError::Aborted { rows_copied, .. } => Some(*rows_copied),
            _ => None,
        }
    }

    /// The underlying failure, looking through `Aborted`.
    pub fn root_cause(&self) -> &SyncError {
        match self {
            SyncError::Aborted { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Process exit status for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            SyncError::Config(_) | SyncError::Yaml(_) => EXIT_CONFIG_ERROR,
            SyncError::Connection { .. } => EXIT_CONNECTION_ERROR,
            SyncError::Query { .. } | SyncError::Json(_) => EXIT_QUERY_ERROR,
            SyncError::DataIntegrity { .. } => EXIT_DATA_ERROR,
            SyncError::Aborted { source, .. } => source.exit_code(),
            SyncError::Cancelled => EXIT_CANCELLED,
            SyncError::Io(_) => EXIT_IO_ERROR,
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

/// Result type alias for synchronization operations.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_follow_taxonomy() {
        assert_eq!(SyncError::Config("x".into()).exit_code(), EXIT_CONFIG_ERROR);
        assert_eq!(
            SyncError::connection("refused", "opening source").exit_code(),
            EXIT_CONNECTION_ERROR
        );
        assert_eq!(
            SyncError::query("syntax", "SELECT").exit_code(),
            EXIT_QUERY_ERROR
        );
        assert_eq!(
            SyncError::data_integrity("t", 3, "0 rows").exit_code(),
            EXIT_DATA_ERROR
        );
        assert_eq!(SyncError::Cancelled.exit_code(), EXIT_CANCELLED);
    }

    #[test]
    fn test_aborted_reports_cause_exit_code_and_rows() {
        let err = SyncError::aborted("orders", 42, SyncError::data_integrity("orders", 43, "0"));
        assert_eq!(err.exit_code(), EXIT_DATA_ERROR);
        assert_eq!(err.rows_copied(), Some(42));
        assert!(matches!(err.root_cause(), SyncError::DataIntegrity { row: 43, .. }));
    }

    #[test]
    fn test_format_detailed_includes_cause_chain() {
        let err = SyncError::aborted(
            "orders",
            7,
            SyncError::connection("login timeout", "reopening target"),
        );
        let text = err.format_detailed();
        assert!(text.contains("aborted after 7 rows"));
        assert!(text.contains("Caused by:"));
        assert!(text.contains("login timeout"));
    }
}
