//! Streaming copy engine.
//!
//! Copies every row of a source table into a target table, one
//! parameterized insert per row, on a single thread:
//!
//! 1. Count the source rows (advisory total for progress).
//! 2. Open a forward-only cursor over `SELECT * FROM <source>` with the batch
//!    size as prefetch hint, and read its columns.
//! 3. For each row, bind the values positionally into
//!    `INSERT INTO <target> (...) VALUES (?,...)` and execute it. An insert
//!    that reports zero affected rows aborts the run.
//! 4. Every `batch_size` rows, drop and reopen both connections, re-run the
//!    select and skip the rows already copied.
//!
//! Every insert auto-commits. A failure leaves the rows inserted so far in
//! the target; the error reports how many there were.
//!
//! Repositioning after a reconnect assumes the source returns the same rows
//! in the same order each time the select runs, which only holds if the
//! table is not modified during the copy.

mod progress;
mod session;
mod statement;


pub use progress::{Progress, ProgressEvent, SyncReport};
pub use session::Session;
pub use statement::{count_query, insert_statement, select_query};

use std::fmt;
use std::time::Instant;

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::core::{Connector, SourceConnection, TargetConnection};
use crate::error::{Result, SyncError};
use session::open_target;

/// Where the engine is in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Counting,
    Streaming,
    Cycling,
    Done,
    Failed,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncState::Idle => "idle",
            SyncState::Counting => "counting",
            SyncState::Streaming => "streaming",
            SyncState::Cycling => "cycling",
            SyncState::Done => "done",
            SyncState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Copy engine over a source and a target connector.
pub struct CopyEngine<S, T> {
    source: S,
    target: T,
    batch_size: usize,
    cancel: Option<CancellationToken>,
    progress_tx: Option<UnboundedSender<ProgressEvent>>,
    state: SyncState,
}

impl<S, T> CopyEngine<S, T>
where
    S: Connector,
    S::Connection: SourceConnection,
    T: Connector,
    T::Connection: TargetConnection,
{
    /// Create a new engine. A `batch_size` of 0 is treated as 1.
    pub fn new(source: S, target: T, batch_size: usize) -> Self {
        Self {
            source,
            target,
            batch_size: batch_size.max(1),
            cancel: None,
            progress_tx: None,
            state: SyncState::Idle,
        }
    }

    /// Stop at the next row boundary once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Publish progress events on `tx`.
    pub fn with_progress(mut self, tx: UnboundedSender<ProgressEvent>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    /// Current state of the engine.
    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Copy all rows of `source_table` into `target_table`.
    ///
    /// Runs to completion or returns the first fatal error. Errors raised
    /// once streaming has begun are wrapped in [`SyncError::Aborted`] with
    /// the number of rows already inserted.
    pub fn synchronize(&mut self, source_table: &str, target_table: &str) -> Result<SyncReport> {
        let started = Instant::now();
        let mut progress = Progress::default();
        let mut cycles = 0;

        match self.run(source_table, target_table, &mut progress, &mut cycles) {
            Ok(()) => {
                self.transition(SyncState::Done);
                let duration = started.elapsed().as_secs_f64();
                let rows_per_second = if duration > 0.0 {
                    (progress.row_count as f64 / duration) as u64
                } else {
                    0
                };
                info!(
                    "Copied {} rows from {} to {} in {:.2}s ({} reconnects)",
                    progress.row_count, source_table, target_table, duration, cycles
                );
                self.emit(ProgressEvent::Completed {
                    table: target_table.to_string(),
                    rows: progress.row_count,
                });
                Ok(SyncReport {
                    source_table: source_table.to_string(),
                    target_table: target_table.to_string(),
                    rows_copied: progress.row_count,
                    total_estimate: progress.total_estimate,
                    cycles,
                    duration_seconds: duration,
                    rows_per_second,
                })
            }
            Err(e) => {
                let streaming = matches!(self.state, SyncState::Streaming | SyncState::Cycling);
                self.transition(SyncState::Failed);
                if streaming {
                    Err(SyncError::aborted(target_table, progress.row_count, e))
                } else {
                    Err(e)
                }
            }
        }
    }

    fn run(
        &mut self,
        source_table: &str,
        target_table: &str,
        progress: &mut Progress,
        cycles: &mut u64,
    ) -> Result<()> {
        self.transition(SyncState::Counting);

        info!("Opening {} connection", self.source.name());
        let mut source_conn = self.source.connect()?;
        info!("Opening {} connection", self.target.name());
        let target_conn = open_target(&self.target)?;

        let count_sql = count_query(source_table);
        debug!("Execute {}", count_sql);
        progress.total_estimate = source_conn.count_rows(&count_sql)?;
        info!("{} has about {} rows", source_table, progress.total_estimate);
        self.emit(ProgressEvent::Counted {
            table: source_table.to_string(),
            total: progress.total_estimate,
        });

        let select_sql = select_query(source_table);
        info!("Execute {}", select_sql);
        debug!("Resuming after a reconnect assumes {} keeps a stable row order", source_table);
        self.transition(SyncState::Streaming);
        let mut session = Session::start(source_conn, target_conn, &select_sql, self.batch_size)?;

        let columns = session.columns().to_vec();
        let insert_sql = insert_statement(target_table, &columns)?;
        debug!("Insert statement: {}", insert_sql);

        loop {
            self.check_cancelled()?;

            let Some(row) = session.next_row()? else {
                break;
            };
            if row.len() != columns.len() {
                return Err(SyncError::query(
                    format!(
                        "row {} has {} values for {} columns",
                        progress.row_count + 1,
                        row.len(),
                        columns.len()
                    ),
                    &select_sql,
                ));
            }

            let affected = session.insert(&insert_sql, &columns, &row)?;
            if affected == Some(0) {
                return Err(SyncError::data_integrity(
                    target_table,
                    progress.row_count + 1,
                    "insert affected 0 rows",
                ));
            }

            progress.row_count += 1;
            self.emit(ProgressEvent::Inserted {
                table: target_table.to_string(),
                progress: *progress,
            });

            if progress.row_count % self.batch_size as u64 == 0 {
                self.check_cancelled()?;
                self.transition(SyncState::Cycling);
                info!(
                    "Reached {} rows (batch size {}), reconnecting",
                    progress.row_count, self.batch_size
                );
                session = session.cycle(
                    &self.source,
                    &self.target,
                    &select_sql,
                    self.batch_size,
                    progress.row_count,
                    &columns,
                )?;
                *cycles += 1;
                self.emit(ProgressEvent::Reconnected {
                    offset: progress.row_count,
                });
                self.transition(SyncState::Streaming);
            }
        }

        drop(session);
        Ok(())
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(SyncError::Cancelled),
            _ => Ok(()),
        }
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(tx) = &self.progress_tx {
            // A dropped receiver only means nobody is rendering progress
            let _ = tx.send(event);
        }
    }

    fn transition(&mut self, next: SyncState) {
        debug!("Sync state {} -> {}", self.state, next);
        self.state = next;
    }
}
