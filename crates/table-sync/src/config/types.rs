//! Configuration type definitions.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use tracing::warn;

/// Batch size used when `batch.size` is missing or not a positive integer.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Source database endpoint.
    pub source: EndpointConfig,

    /// Target database endpoint.
    pub target: EndpointConfig,

    /// Rows per cursor prefetch and per connection cycle (default: 1000).
    #[serde(default = "default_batch_size", deserialize_with = "lenient_batch_size")]
    pub batch_size: usize,
}

/// One side of the copy: how to connect and which table to use.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// ODBC driver name, e.g. "PostgreSQL Unicode" (optional when the URL names one).
    #[serde(default)]
    pub driver: String,

    /// ODBC connection string or DSN attributes.
    #[serde(default)]
    pub url: String,

    /// Username (sent as UID).
    #[serde(default)]
    pub username: String,

    /// Password (sent as PWD).
    #[serde(default)]
    pub password: String,

    /// Table name, inserted verbatim into SQL text.
    #[serde(default)]
    pub table: String,
}

impl fmt::Debug for EndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointConfig")
            .field("driver", &self.driver)
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("table", &self.table)
            .finish()
    }
}

/// Parse a raw batch size setting, falling back to [`DEFAULT_BATCH_SIZE`].
pub fn parse_batch_size(raw: Option<&str>) -> usize {
    match raw.map(str::trim).and_then(|s| s.parse::<usize>().ok()) {
        Some(n) if n > 0 => n,
        _ => {
            warn!(
                "batch.size is not valid ({:?}), using default batch size = {}",
                raw, DEFAULT_BATCH_SIZE
            );
            DEFAULT_BATCH_SIZE
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawBatchSize {
    Int(i64),
    Text(String),
    Other(serde::de::IgnoredAny),
}

fn lenient_batch_size<'de, D>(deserializer: D) -> std::result::Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawBatchSize>::deserialize(deserializer)?;
    Ok(match raw {
        Some(RawBatchSize::Int(n)) => parse_batch_size(Some(&n.to_string())),
        Some(RawBatchSize::Text(s)) => parse_batch_size(Some(&s)),
        Some(RawBatchSize::Other(_)) | None => parse_batch_size(None),
    })
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}
