//! Database drivers implementing the [`crate::core::traits`] seam.

pub mod odbc;

pub use odbc::{OdbcConnection, OdbcConnector, OdbcCursor};
