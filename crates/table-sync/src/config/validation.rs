//! Configuration validation.

use super::SyncConfig;
use crate::error::{Result, SyncError};

/// Validate the configuration.
pub fn validate(config: &SyncConfig) -> Result<()> {
    // Source validation
    if config.source.url.is_empty() {
        return Err(SyncError::Config("source.url is required".into()));
    }
    if config.source.table.is_empty() {
        return Err(SyncError::Config("source.table is required".into()));
    }

    // Target validation
    if config.target.url.is_empty() {
        return Err(SyncError::Config("target.url is required".into()));
    }
    if config.target.table.is_empty() {
        return Err(SyncError::Config("target.table is required".into()));
    }

    // Copying a table onto itself would read back its own inserts
    if config.source.url == config.target.url && config.source.table == config.target.table {
        return Err(SyncError::Config(
            "source and target cannot be the same table".into(),
        ));
    }

    // Loaders already map 0 to the default; only a `--batch-size 0` override lands here
    if config.batch_size == 0 {
        return Err(SyncError::Config("batch.size must be at least 1".into()));
    }

    Ok(())
}
