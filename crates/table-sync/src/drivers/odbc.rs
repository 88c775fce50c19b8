//! ODBC connectivity for both sides of a copy.
//!
//! Any engine with an installed ODBC driver can be a source or a target:
//! the connection string comes from configuration and the driver name is
//! prepended when the string does not already name one.
//!
//! **Requirements:**
//! - unixODBC (Linux/macOS) or the Windows driver manager
//! - the ODBC driver for each engine, e.g. `msodbcsql18`, `odbc-postgresql`
//!
//! Source rows are fetched through a text row set sized to the batch size,
//! then converted to [`SqlValue`] by the column type the driver reported.
//! Target rows are inserted one prepared statement at a time with typed
//! parameters.

use std::collections::VecDeque;
use std::sync::OnceLock;
use std::time::Instant;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use odbc_api::buffers::TextRowSet;
use odbc_api::parameter::{InputParameter, VarBinaryBox, VarCharBox};
use odbc_api::{
    sys, Bit, BlockCursor, ConnectionOptions, Cursor, CursorImpl, DataType, Environment,
    Nullable, ResultSetMetadata, StatementConnection,
};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::config::EndpointConfig;
use crate::core::{
    ColumnDescriptor, Connector, Row, RowCursor, SourceConnection, SqlType, SqlValue,
    TargetConnection,
};
use crate::error::{Result, SyncError};

/// Longest text value fetched per cell. A longer value fails the fetch.
const MAX_TEXT_LEN: usize = 65536;

static ENVIRONMENT: OnceLock<Environment> = OnceLock::new();

/// Process-wide ODBC environment, created on first use.
///
/// Creating the environment loads the driver manager; failure here means
/// ODBC itself is not installed.
pub fn environment() -> Result<&'static Environment> {
    if let Some(env) = ENVIRONMENT.get() {
        return Ok(env);
    }
    let env = Environment::new().map_err(|e| {
        SyncError::connection(
            format!(
                "Failed to create ODBC environment: {}. \
                 Install unixODBC (Linux/macOS) and the ODBC driver for your database.",
                e
            ),
            "registering ODBC driver manager",
        )
    })?;
    Ok(ENVIRONMENT.get_or_init(|| env))
}

/// Quote an ODBC attribute value when it contains separator characters.
fn quote_attribute(value: &str) -> String {
    if value.contains(';') || value.contains('{') || value.contains('}') || value.starts_with(' ')
    {
        format!("{{{}}}", value.replace('}', "}}"))
    } else {
        value.to_string()
    }
}

/// Build the full connection string for an endpoint.
pub fn connection_string(config: &EndpointConfig) -> String {
    let mut conn_str = String::new();

    let lower = config.url.to_lowercase();
    let names_driver = lower.contains("driver=") || lower.contains("dsn=");
    if !config.driver.is_empty() && !names_driver {
        conn_str.push_str(&format!("Driver={{{}}};", config.driver));
    }

    conn_str.push_str(config.url.trim_end_matches(';'));
    conn_str.push(';');

    if !config.username.is_empty() {
        conn_str.push_str(&format!("UID={};", quote_attribute(&config.username)));
    }
    if !config.password.is_empty() {
        conn_str.push_str(&format!("PWD={};", quote_attribute(&config.password)));
    }

    conn_str
}

/// Opens ODBC connections for one endpoint, always with the same parameters.
pub struct OdbcConnector {
    name: String,
    connection_string: String,
    /// Connection string with the password masked, for logs.
    display: String,
}

impl OdbcConnector {
    /// Create a connector. Fails only if the ODBC environment is unavailable.
    pub fn new(name: impl Into<String>, config: &EndpointConfig) -> Result<Self> {
        environment()?;

        let masked = EndpointConfig {
            password: if config.password.is_empty() {
                String::new()
            } else {
                "***".to_string()
            },
            ..config.clone()
        };

        Ok(Self {
            name: name.into(),
            connection_string: connection_string(config),
            display: connection_string(&masked),
        })
    }

    fn open(&self) -> Result<odbc_api::Connection<'static>> {
        debug!("ODBC connection string ({}): {}", self.name, self.display);
        environment()?
            .connect_with_connection_string(&self.connection_string, ConnectionOptions::default())
            .map_err(|e| {
                SyncError::connection(
                    format!("Failed to connect via ODBC: {}", e),
                    format!("opening {} connection", self.name),
                )
            })
    }

    /// Connect and run `SELECT 1`, returning the round-trip latency in milliseconds.
    pub fn health_check(&self) -> Result<u64> {
        let start = Instant::now();
        let conn = self.open()?;
        conn.execute("SELECT 1", ())
            .map_err(|e| SyncError::query(e.to_string(), "SELECT 1"))?;
        Ok(start.elapsed().as_millis() as u64)
    }
}

impl Connector for OdbcConnector {
    type Connection = OdbcConnection;

    fn connect(&self) -> Result<OdbcConnection> {
        let conn = self.open()?;
        info!("{} connected", self.name);
        Ok(OdbcConnection { conn })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A live ODBC connection, used as either source or target.
pub struct OdbcConnection {
    conn: odbc_api::Connection<'static>,
}

impl SourceConnection for OdbcConnection {
    type Cursor = OdbcCursor;

    fn count_rows(&mut self, sql: &str) -> Result<u64> {
        let mut cursor = self
            .conn
            .execute(sql, ())
            .map_err(|e| SyncError::query(e.to_string(), sql))?
            .ok_or_else(|| SyncError::query("count query returned no result set", sql))?;

        let mut buffers = TextRowSet::for_cursor(1, &mut cursor, Some(256))
            .map_err(|e| SyncError::query(format!("create buffer failed: {}", e), sql))?;
        let mut row_cursor = cursor
            .bind_buffer(&mut buffers)
            .map_err(|e| SyncError::query(format!("bind buffer failed: {}", e), sql))?;

        let batch = row_cursor
            .fetch()
            .map_err(|e| SyncError::query(format!("fetch failed: {}", e), sql))?
            .ok_or_else(|| SyncError::query("count query returned no rows", sql))?;

        let text = batch
            .at(0, 0)
            .map(|bytes| String::from_utf8_lossy(bytes).trim().to_string())
            .ok_or_else(|| SyncError::query("count query returned NULL", sql))?;

        text.parse::<u64>()
            .map_err(|e| SyncError::query(format!("parse count failed: {} - value: {}", e, text), sql))
    }

    fn open_cursor(self, sql: &str, fetch_size: usize) -> Result<OdbcCursor> {
        let mut cursor = self
            .conn
            .into_cursor(sql, ())
            .map_err(|e| SyncError::query(e.error.to_string(), sql))?
            .ok_or_else(|| SyncError::query("select returned no result set", sql))?;

        let columns = read_columns(&mut cursor, sql)?;

        let buffers = TextRowSet::for_cursor(fetch_size.max(1), &mut cursor, Some(MAX_TEXT_LEN))
            .map_err(|e| SyncError::query(format!("Failed to create row buffer: {}", e), sql))?;
        let block = cursor
            .bind_buffer(buffers)
            .map_err(|e| SyncError::query(format!("Failed to bind buffer: {}", e), sql))?;

        Ok(OdbcCursor {
            block,
            columns,
            pending: VecDeque::new(),
            exhausted: false,
            sql: sql.to_string(),
        })
    }
}

impl TargetConnection for OdbcConnection {
    fn set_autocommit(&mut self, enabled: bool) -> Result<()> {
        self.conn.set_autocommit(enabled).map_err(|e| {
            SyncError::connection(e.to_string(), "setting auto-commit on target connection")
        })
    }

    fn insert_row(
        &mut self,
        sql: &str,
        columns: &[ColumnDescriptor],
        row: &[SqlValue],
    ) -> Result<Option<u64>> {
        let params: Vec<Box<dyn InputParameter>> = columns
            .iter()
            .zip(row)
            .map(|(col, value)| to_parameter(value, col.sql_type))
            .collect();

        // Statement lives only for this row and is released on every path
        let mut prepared = self
            .conn
            .prepare(sql)
            .map_err(|e| SyncError::query(format!("prepare failed: {}", e), sql))?;

        prepared
            .execute(params.as_slice())
            .map_err(|e| SyncError::query(format!("insert failed: {}", e), sql))?;

        let affected = prepared
            .row_count()
            .map_err(|e| SyncError::query(format!("row count failed: {}", e), sql))?;

        Ok(affected.map(|n| n as u64))
    }
}

type OdbcBlockCursor = BlockCursor<CursorImpl<StatementConnection<'static>>, TextRowSet>;

/// Forward-only cursor that owns its connection.
pub struct OdbcCursor {
    block: OdbcBlockCursor,
    columns: Vec<ColumnDescriptor>,
    pending: VecDeque<Row>,
    exhausted: bool,
    sql: String,
}

impl OdbcCursor {
    /// Fetch the next block of rows into `pending`.
    fn fill(&mut self) -> Result<()> {
        let batch = self
            .block
            .fetch_with_truncation_check(true)
            .map_err(|e| SyncError::query(format!("Failed to fetch rows: {}", e), &self.sql))?;

        let Some(batch) = batch else {
            self.exhausted = true;
            return Ok(());
        };

        for row_idx in 0..batch.num_rows() {
            let row = self
                .columns
                .iter()
                .enumerate()
                .map(|(col_idx, col)| {
                    let text = batch
                        .at(col_idx, row_idx)
                        .map(|bytes| String::from_utf8_lossy(bytes).to_string());
                    convert_text(text, col).map_err(|e| SyncError::query(e, &self.sql))
                })
                .collect::<Result<Row>>()?;
            self.pending.push_back(row);
        }
        Ok(())
    }
}

impl RowCursor for OdbcCursor {
    fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Row>> {
        while self.pending.is_empty() && !self.exhausted {
            self.fill()?;
        }
        Ok(self.pending.pop_front())
    }
}

fn read_columns<C: ResultSetMetadata>(cursor: &mut C, sql: &str) -> Result<Vec<ColumnDescriptor>> {
    let num_cols = cursor
        .num_result_cols()
        .map_err(|e| SyncError::query(format!("Failed to get column count: {}", e), sql))?;

    let mut columns = Vec::with_capacity(num_cols.max(0) as usize);
    for i in 1..=num_cols as u16 {
        let name = cursor
            .col_name(i)
            .map_err(|e| SyncError::query(format!("Failed to read column {} name: {}", i, e), sql))?;
        let data_type = cursor
            .col_data_type(i)
            .map_err(|e| SyncError::query(format!("Failed to read column {} type: {}", i, e), sql))?;
        columns.push(ColumnDescriptor::new(name, sql_type_of(data_type)));
    }
    Ok(columns)
}

/// Map the driver-reported data type onto a type code.
fn sql_type_of(data_type: DataType) -> SqlType {
    match data_type {
        DataType::Bit => SqlType::Bit,
        DataType::TinyInt => SqlType::TinyInt,
        DataType::SmallInt => SqlType::SmallInt,
        DataType::Integer => SqlType::Integer,
        DataType::BigInt => SqlType::BigInt,
        DataType::Real => SqlType::Real,
        DataType::Float { .. } => SqlType::Float,
        DataType::Double => SqlType::Double,
        DataType::Decimal { .. } => SqlType::Decimal,
        DataType::Numeric { .. } => SqlType::Numeric,
        DataType::Char { .. } => SqlType::Char,
        DataType::Varchar { .. } => SqlType::VarChar,
        DataType::LongVarchar { .. } => SqlType::LongVarChar,
        DataType::WChar { .. } => SqlType::WChar,
        DataType::WVarchar { .. } => SqlType::WVarChar,
        DataType::Binary { .. } => SqlType::Binary,
        DataType::Varbinary { .. } => SqlType::VarBinary,
        DataType::LongVarbinary { .. } => SqlType::LongVarBinary,
        DataType::Date => SqlType::Date,
        DataType::Time { .. } => SqlType::Time,
        DataType::Timestamp { .. } => SqlType::Timestamp,
        DataType::Other { data_type, .. } => SqlType::from_code(data_type.0),
        _ => SqlType::Other(0),
    }
}

/// Convert a text cell to a value of the column's type.
///
/// Text that does not parse as the column's type is kept as text and left
/// for the target driver to convert or reject. Binary cells must be valid
/// hex; anything else is an error naming the column.
fn convert_text(
    text: Option<String>,
    column: &ColumnDescriptor,
) -> std::result::Result<SqlValue, String> {
    let Some(s) = text else {
        return Ok(SqlValue::Null(column.sql_type));
    };

    let value = match column.sql_type {
        SqlType::Bit => match s.trim() {
            "1" | "true" | "True" | "TRUE" | "t" => SqlValue::Bool(true),
            "0" | "false" | "False" | "FALSE" | "f" => SqlValue::Bool(false),
            _ => SqlValue::Text(s),
        },
        t if t.is_integer() => s
            .trim()
            .parse::<i64>()
            .map(SqlValue::Int)
            .unwrap_or(SqlValue::Text(s)),
        t if t.is_floating() => s
            .trim()
            .parse::<f64>()
            .map(SqlValue::Float)
            .unwrap_or(SqlValue::Text(s)),
        SqlType::Decimal | SqlType::Numeric => {
            let trimmed = s.trim();
            match trimmed
                .parse::<Decimal>()
                .or_else(|_| Decimal::from_scientific(trimmed))
            {
                Ok(d) => SqlValue::Decimal(d),
                Err(_) => SqlValue::Text(s),
            }
        }
        SqlType::Guid => uuid::Uuid::parse_str(s.trim())
            .map(SqlValue::Uuid)
            .unwrap_or(SqlValue::Text(s)),
        SqlType::Timestamp => NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S"))
            .or_else(|_| NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S%.f"))
            .or_else(|_| NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S"))
            .map(SqlValue::Timestamp)
            .unwrap_or(SqlValue::Text(s)),
        SqlType::Date => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .map(SqlValue::Date)
            .unwrap_or(SqlValue::Text(s)),
        SqlType::Time => NaiveTime::parse_from_str(&s, "%H:%M:%S%.f")
            .or_else(|_| NaiveTime::parse_from_str(&s, "%H:%M:%S"))
            .map(SqlValue::Time)
            .unwrap_or(SqlValue::Text(s)),
        t if t.is_binary() => {
            // Drivers render binary as hex, with or without a 0x prefix
            let hex_str = s
                .strip_prefix("0x")
                .or_else(|| s.strip_prefix("0X"))
                .unwrap_or(&s);
            let bytes = hex::decode(hex_str).map_err(|e| {
                format!(
                    "column {} holds {} characters that are not valid hex: {}",
                    column.name,
                    s.len(),
                    e
                )
            })?;
            SqlValue::Bytes(bytes)
        }
        _ => SqlValue::Text(s),
    };
    Ok(value)
}

/// Typed NULL parameter for a column type.
fn null_parameter(sql_type: SqlType) -> Box<dyn InputParameter> {
    match sql_type {
        SqlType::Bit => Box::new(Nullable::<Bit>::null()),
        SqlType::TinyInt | SqlType::SmallInt => Box::new(Nullable::<i16>::null()),
        SqlType::Integer => Box::new(Nullable::<i32>::null()),
        SqlType::BigInt => Box::new(Nullable::<i64>::null()),
        SqlType::Real => Box::new(Nullable::<f32>::null()),
        SqlType::Float | SqlType::Double => Box::new(Nullable::<f64>::null()),
        SqlType::Date => Box::new(Nullable::<sys::Date>::null()),
        t if t.is_binary() => Box::new(VarBinaryBox::null()),
        _ => Box::new(VarCharBox::null()),
    }
}

/// Bind a value as the parameter type matching its column's type code.
fn to_parameter(value: &SqlValue, sql_type: SqlType) -> Box<dyn InputParameter> {
    match value {
        SqlValue::Null(_) => null_parameter(sql_type),
        SqlValue::Bool(b) => Box::new(Nullable::new(Bit::from_bool(*b))),
        SqlValue::Int(n) => match sql_type {
            SqlType::TinyInt | SqlType::SmallInt => match i16::try_from(*n) {
                Ok(v) => Box::new(Nullable::new(v)),
                Err(_) => Box::new(Nullable::new(*n)),
            },
            SqlType::Integer => match i32::try_from(*n) {
                Ok(v) => Box::new(Nullable::new(v)),
                Err(_) => Box::new(Nullable::new(*n)),
            },
            _ => Box::new(Nullable::new(*n)),
        },
        SqlValue::Float(f) => match sql_type {
            SqlType::Real => Box::new(Nullable::new(*f as f32)),
            _ => Box::new(Nullable::new(*f)),
        },
        SqlValue::Decimal(d) => Box::new(VarCharBox::from_string(d.to_string())),
        SqlValue::Text(s) => Box::new(VarCharBox::from_string(s.clone())),
        SqlValue::Bytes(b) => Box::new(VarBinaryBox::from_vec(b.clone())),
        SqlValue::Uuid(u) => Box::new(VarCharBox::from_string(u.to_string())),
        SqlValue::Date(d) => Box::new(Nullable::new(odbc_date(d))),
        SqlValue::Time(t) => Box::new(VarCharBox::from_string(time_text(t))),
        SqlValue::Timestamp(ts) => Box::new(VarCharBox::from_string(timestamp_text(ts))),
    }
}

fn odbc_date(d: &NaiveDate) -> sys::Date {
    sys::Date {
        year: d.year() as i16,
        month: d.month() as u16,
        day: d.day() as u16,
    }
}

/// Time as text with microseconds, which the driver converts to the column type.
fn time_text(t: &NaiveTime) -> String {
    t.format("%H:%M:%S%.6f").to_string()
}

fn timestamp_text(ts: &NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(driver: &str, url: &str, user: &str, password: &str) -> EndpointConfig {
        EndpointConfig {
            driver: driver.to_string(),
            url: url.to_string(),
            username: user.to_string(),
            password: password.to_string(),
            table: "t".to_string(),
        }
    }

    #[test]
    fn test_connection_string_prepends_driver() {
        let config = endpoint("PostgreSQL Unicode", "Server=db;Database=sales", "app", "pw");
        assert_eq!(
            connection_string(&config),
            "Driver={PostgreSQL Unicode};Server=db;Database=sales;UID=app;PWD=pw;"
        );
    }

    #[test]
    fn test_connection_string_keeps_named_driver_or_dsn() {
        let config = endpoint("Ignored", "DSN=warehouse;", "", "");
        assert_eq!(connection_string(&config), "DSN=warehouse;");

        let config = endpoint("Ignored", "Driver={SQLite3};Database=a.db", "", "");
        assert_eq!(connection_string(&config), "Driver={SQLite3};Database=a.db;");
    }

    #[test]
    fn test_connection_string_quotes_special_password() {
        let config = endpoint("", "DSN=x", "app", "p;w}d");
        assert_eq!(connection_string(&config), "DSN=x;UID=app;PWD={p;w}}d};");
    }

    fn col(sql_type: SqlType) -> ColumnDescriptor {
        ColumnDescriptor::new("c", sql_type)
    }

    fn convert(text: &str, sql_type: SqlType) -> SqlValue {
        convert_text(Some(text.to_string()), &col(sql_type)).unwrap()
    }

    #[test]
    fn test_convert_null_keeps_type() {
        assert_eq!(
            convert_text(None, &col(SqlType::Integer)).unwrap(),
            SqlValue::Null(SqlType::Integer)
        );
    }

    #[test]
    fn test_convert_scalars() {
        assert_eq!(convert("42", SqlType::Integer), SqlValue::Int(42));
        assert_eq!(convert("1", SqlType::Bit), SqlValue::Bool(true));
        assert_eq!(convert("2.5", SqlType::Double), SqlValue::Float(2.5));
        assert_eq!(convert("abc", SqlType::VarChar), SqlValue::Text("abc".into()));
    }

    #[test]
    fn test_convert_datetime_values() {
        use chrono::Timelike;

        match convert("2023-01-15 10:30:45.123", SqlType::Timestamp) {
            SqlValue::Timestamp(dt) => {
                assert_eq!(dt.year(), 2023);
                assert_eq!(dt.hour(), 10);
                assert_eq!(dt.nanosecond(), 123_000_000);
            }
            other => panic!("Expected Timestamp, got {:?}", other),
        }
        assert!(matches!(convert("2023-01-15", SqlType::Date), SqlValue::Date(_)));
        assert!(matches!(convert("14:30:45", SqlType::Time), SqlValue::Time(_)));
    }

    #[test]
    fn test_convert_binary_values() {
        assert_eq!(
            convert("0xDEADBEEF", SqlType::VarBinary),
            SqlValue::Bytes(vec![0xDE, 0xAD, 0xBE, 0xEF])
        );
        assert_eq!(
            convert("CAFEBABE", SqlType::Binary),
            SqlValue::Bytes(vec![0xCA, 0xFE, 0xBA, 0xBE])
        );
    }

    #[test]
    fn test_cut_off_binary_is_an_error_not_text_bytes() {
        // 40000 bytes of 0xAB rendered as hex, then cut to an odd length
        let mut text = "AB".repeat(40_000);
        text.truncate(MAX_TEXT_LEN - 1);

        let err = convert_text(Some(text), &ColumnDescriptor::new("payload", SqlType::VarBinary))
            .unwrap_err();
        assert!(err.contains("payload"), "{}", err);
        assert!(err.contains("not valid hex"), "{}", err);

        assert!(convert_text(Some("0xZZ".into()), &col(SqlType::LongVarBinary)).is_err());
    }

    #[test]
    fn test_convert_decimal_values() {
        match convert("123.456", SqlType::Decimal) {
            SqlValue::Decimal(d) => assert_eq!(d.to_string(), "123.456"),
            other => panic!("Expected Decimal, got {:?}", other),
        }
        match convert(" -0.50 ", SqlType::Numeric) {
            SqlValue::Decimal(d) => assert_eq!(d, Decimal::new(-50, 2)),
            other => panic!("Expected Decimal, got {:?}", other),
        }
    }

    #[test]
    fn test_scientific_decimal_keeps_its_value() {
        assert_eq!(convert("1.5E+3", SqlType::Decimal), SqlValue::Decimal(Decimal::from(1500)));
        assert_eq!(convert("25E-2", SqlType::Numeric), SqlValue::Decimal(Decimal::new(25, 2)));
        // Characters are never stripped to force a parse
        assert_eq!(
            convert("12 345", SqlType::Decimal),
            SqlValue::Text("12 345".into())
        );
    }

    #[test]
    fn test_unparseable_values_stay_text() {
        assert_eq!(
            convert("not_a_number", SqlType::Integer),
            SqlValue::Text("not_a_number".into())
        );
        assert_eq!(convert("not-a-date", SqlType::Date), SqlValue::Text("not-a-date".into()));
    }

    #[test]
    fn test_wide_long_text_code_maps_through_other() {
        assert_eq!(SqlType::from_code(-10), SqlType::WLongVarChar);
    }

    #[test]
    fn test_temporal_text_keeps_fractional_seconds() {
        let ts = NaiveDate::from_ymd_opt(2024, 2, 29)
            .unwrap()
            .and_hms_micro_opt(23, 59, 58, 250_000)
            .unwrap();
        assert_eq!(timestamp_text(&ts), "2024-02-29 23:59:58.250000");

        let t = NaiveTime::from_hms_milli_opt(14, 30, 45, 123).unwrap();
        assert_eq!(time_text(&t), "14:30:45.123000");

        // Parsed values round-trip to the same instant
        match convert("14:30:45.123", SqlType::Time) {
            SqlValue::Time(parsed) => assert_eq!(time_text(&parsed), "14:30:45.123000"),
            other => panic!("Expected Time, got {:?}", other),
        }
    }
}
