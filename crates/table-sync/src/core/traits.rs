//! Driver seam between the copy engine and a concrete connectivity layer.
//!
//! - [`Connector`]: opens a fresh connection from fixed parameters (used for
//!   the initial open and for every reopen)
//! - [`SourceConnection`]: runs the count query and opens the forward-only cursor
//! - [`RowCursor`]: streams rows and reports the columns of its result set
//! - [`TargetConnection`]: executes one parameterized single-row insert
//!
//! All calls block until the database answers. Connections, cursors and
//! statements are released by dropping them.

use crate::error::Result;

use super::schema::ColumnDescriptor;
use super::value::{Row, SqlValue};

/// Opens connections using the same parameters every time.
pub trait Connector {
    /// Connection type produced by this connector.
    type Connection;

    /// Open a new connection.
    fn connect(&self) -> Result<Self::Connection>;

    /// Short label for logs ("source", "target").
    fn name(&self) -> &str;
}

/// Read side of a copy.
pub trait SourceConnection {
    /// Cursor type; it owns the connection it was opened on.
    type Cursor: RowCursor;

    /// Run a query returning a single integer, such as `SELECT COUNT(*)`.
    fn count_rows(&mut self, sql: &str) -> Result<u64>;

    /// Execute `sql` and return a forward-only cursor over its result.
    ///
    /// `fetch_size` is a prefetch hint: rows buffered per round trip. The
    /// connection moves into the cursor, so dropping the cursor closes both.
    fn open_cursor(self, sql: &str, fetch_size: usize) -> Result<Self::Cursor>
    where
        Self: Sized;
}

/// Forward-only cursor over a live result set.
pub trait RowCursor {
    /// Columns of the result set, read once when the cursor was opened.
    fn columns(&self) -> &[ColumnDescriptor];

    /// Advance and materialize the next row, or `None` at end of data.
    fn next_row(&mut self) -> Result<Option<Row>>;

    /// Position the cursor so the next row returned is row `offset + 1`.
    ///
    /// Must be called on a freshly opened cursor. Returns how many rows were
    /// actually skipped, which is less than `offset` if the result is shorter.
    fn skip_rows(&mut self, offset: u64) -> Result<u64> {
        let mut skipped = 0;
        while skipped < offset {
            if self.next_row()?.is_none() {
                break;
            }
            skipped += 1;
        }
        Ok(skipped)
    }
}

/// Write side of a copy.
pub trait TargetConnection {
    /// Set the connection's auto-commit mode.
    fn set_autocommit(&mut self, enabled: bool) -> Result<()>;

    /// Prepare `sql`, bind `row` positionally using each column's type,
    /// execute it and release the statement.
    ///
    /// Returns the affected row count, or `None` when the driver cannot tell.
    fn insert_row(
        &mut self,
        sql: &str,
        columns: &[ColumnDescriptor],
        row: &[SqlValue],
    ) -> Result<Option<u64>>;
}
