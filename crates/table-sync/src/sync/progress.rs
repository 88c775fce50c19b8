//! Progress values published while a copy runs, and the final report.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// Rows inserted so far against the advisory total from the count query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Successfully inserted rows; also the resume offset after a reconnect.
    pub row_count: u64,

    /// Result of the count query. May be lower or higher than what is streamed.
    pub total_estimate: u64,
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.row_count, self.total_estimate)
    }
}

/// Event emitted by the copy engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// The count query finished.
    Counted { table: String, total: u64 },

    /// One row was inserted into the target.
    Inserted { table: String, progress: Progress },

    /// Connections were recycled and the cursor repositioned at `offset`.
    Reconnected { offset: u64 },

    /// The source cursor was exhausted.
    Completed { table: String, rows: u64 },
}

impl ProgressEvent {
    /// Human-readable progress line, `"<operation> (<rowCount>/<total>)"` for inserts.
    pub fn to_line(&self) -> String {
        match self {
            ProgressEvent::Counted { table, total } => {
                format!("Counted {} ({} rows)", table, total)
            }
            ProgressEvent::Inserted { table, progress } => {
                format!("Inserting {} ({})", table, progress)
            }
            ProgressEvent::Reconnected { offset } => {
                format!("Reconnected, resuming at row {}", offset + 1)
            }
            ProgressEvent::Completed { table, rows } => {
                format!("Completed {} ({} rows)", table, rows)
            }
        }
    }
}

/// Summary of a completed synchronization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub source_table: String,
    pub target_table: String,

    /// Rows inserted into the target.
    pub rows_copied: u64,

    /// Advisory total from the count query.
    pub total_estimate: u64,

    /// Number of connection cycles performed.
    pub cycles: u64,

    /// Wall-clock duration in seconds.
    pub duration_seconds: f64,

    /// Average throughput (rows/second).
    pub rows_per_second: u64,
}

impl SyncReport {
    /// Serialize the report as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
