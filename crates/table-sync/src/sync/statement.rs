//! SQL text used by the copy engine.
//!
//! Table and column names are interpolated verbatim. They come from the
//! settings file and from the source's own result metadata, and are trusted.

use crate::core::ColumnDescriptor;
use crate::error::{Result, SyncError};

/// `SELECT COUNT(*) FROM <table>`
pub fn count_query(table: &str) -> String {
    format!("SELECT COUNT(*) FROM {}", table)
}

/// `SELECT * FROM <table>`
pub fn select_query(table: &str) -> String {
    format!("SELECT * FROM {}", table)
}

/// `INSERT INTO <table> (<c1>,<c2>,...) VALUES (?,?,...)`, one placeholder
/// per column, columns in source order and spelling.
pub fn insert_statement(table: &str, columns: &[ColumnDescriptor]) -> Result<String> {
    if columns.is_empty() {
        return Err(SyncError::query(
            format!("cannot build insert for {}: source reported no columns", table),
            select_query(table),
        ));
    }

    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    let placeholders = vec!["?"; columns.len()];

    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        names.join(","),
        placeholders.join(",")
    ))
}
