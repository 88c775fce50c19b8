//! The live connection set used while streaming.
//!
//! A [`Session`] owns the source cursor (which owns the source connection)
//! and the target connection. It is never patched in place: each cycle
//! consumes the current session and returns a new one.

use tracing::{debug, info, warn};

use crate::core::{
    ColumnDescriptor, Connector, Row, RowCursor, SourceConnection, SqlValue, TargetConnection,
};
use crate::error::{Result, SyncError};

/// Source cursor plus target connection for one stretch of rows.
pub struct Session<C, T> {
    cursor: C,
    target: T,
}

/// Open a target connection with auto-commit enabled.
pub fn open_target<TC>(connector: &TC) -> Result<TC::Connection>
where
    TC: Connector,
    TC::Connection: TargetConnection,
{
    let mut conn = connector.connect()?;
    conn.set_autocommit(true)?;
    Ok(conn)
}

impl<C, T> Session<C, T>
where
    C: RowCursor,
    T: TargetConnection,
{
    /// Start streaming on already-open connections.
    pub fn start<S>(source: S, target: T, select_sql: &str, fetch_size: usize) -> Result<Self>
    where
        S: SourceConnection<Cursor = C>,
    {
        let cursor = source.open_cursor(select_sql, fetch_size)?;
        debug!("Opened cursor with {} columns", cursor.columns().len());
        Ok(Self { cursor, target })
    }

    /// Columns of the current cursor.
    pub fn columns(&self) -> &[ColumnDescriptor] {
        self.cursor.columns()
    }

    /// Next source row, if any.
    pub fn next_row(&mut self) -> Result<Option<Row>> {
        self.cursor.next_row()
    }

    /// Insert one row into the target.
    pub fn insert(
        &mut self,
        sql: &str,
        columns: &[ColumnDescriptor],
        row: &[SqlValue],
    ) -> Result<Option<u64>> {
        self.target.insert_row(sql, columns, row)
    }

    /// Tear down every connection and rebuild the session at `offset`.
    ///
    /// Order: close cursor and source connection, reopen source, close and
    /// reopen target (auto-commit on), re-run the select, re-read and check
    /// columns, skip `offset` rows.
    pub fn cycle<SC, TC>(
        self,
        source: &SC,
        target: &TC,
        select_sql: &str,
        fetch_size: usize,
        offset: u64,
        expected: &[ColumnDescriptor],
    ) -> Result<Self>
    where
        SC: Connector,
        SC::Connection: SourceConnection<Cursor = C>,
        TC: Connector<Connection = T>,
    {
        let Session {
            cursor,
            target: target_conn,
        } = self;

        drop(cursor);
        let source_conn = source.connect()?;
        info!("{} reconnected", source.name());

        drop(target_conn);
        let target_conn = open_target(target)?;
        info!("{} reconnected", target.name());

        let mut cursor = source_conn.open_cursor(select_sql, fetch_size)?;
        check_columns(expected, cursor.columns(), select_sql)?;

        let skipped = cursor.skip_rows(offset)?;
        if skipped < offset {
            warn!(
                "Source returned only {} of {} already copied rows after reconnect; \
                 the table changed during the copy",
                skipped, offset
            );
        } else {
            debug!("Repositioned cursor after row {}", offset);
        }

        Ok(Self {
            cursor,
            target: target_conn,
        })
    }
}

/// Positional binding is only valid if the reopened result has the same shape.
fn check_columns(
    expected: &[ColumnDescriptor],
    actual: &[ColumnDescriptor],
    select_sql: &str,
) -> Result<()> {
    if expected.len() != actual.len() {
        return Err(SyncError::query(
            format!(
                "column count changed across reconnect: {} before, {} after",
                expected.len(),
                actual.len()
            ),
            select_sql,
        ));
    }
    if expected != actual {
        warn!("Column names or types changed across reconnect; binding stays positional");
    }
    Ok(())
}
