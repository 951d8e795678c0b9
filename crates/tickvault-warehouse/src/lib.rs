//! # Tickvault Warehouse
//!
//! DuckDB-based analytical store for tickvault.
//!
//! ## Overview
//!
//! This crate provides append-only storage for canonical market data and
//! the point-in-time analytics that run over it.
//!
//! ### Features
//!
//! - 🔒 **Secure SQL**: Parameterized queries prevent SQL injection
//! - 🧾 **Schema Contract**: Fixed column name/type/order enforced before every write
//! - 📊 **Point-in-Time Analytics**: Ranked window pairs, deltas, and guarded ratios
//! - 🔄 **Connection Pooling**: Efficient connection management
//! - ⚡ **Query Guardrails**: Timeout and row limits for the SQL passthrough
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tickvault_warehouse::{BarRecord, QueryGuardrails, Warehouse};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Open the warehouse
//!     let warehouse = Warehouse::open_default()?;
//!
//!     // Append one canonical bar
//!     let written = warehouse.append_bars(&[BarRecord {
//!         date: "2024-01-02".to_string(),
//!         open: Some(187.15),
//!         high: Some(188.44),
//!         low: Some(183.89),
//!         close: Some(185.64),
//!         volume: Some(82_488_700),
//!         ticker: "AAPL".to_string(),
//!     }])?;
//!     println!("wrote {written} rows");
//!
//!     // Inspect through the read-only SQL surface
//!     let result = warehouse.execute_query(
//!         "SELECT DISTINCT \"Ticker\" FROM bars",
//!         QueryGuardrails::default(),
//!     )?;
//!     println!("{} tickers", result.row_count);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Tables
//!
//! | Table | Description |
//! |-------|-------------|
//! | `bars` | Daily OHLCV rows, append-only, duplicates allowed across runs |
//! | `holdings_<etf>` | One ETF's holdings disclosures, created on first load |
//! | `schema_migrations` | Migration bookkeeping |
//!
//! ## Security
//!
//! All user input is handled through parameterized queries:
//!
//! ```rust,no_run
//! # use tickvault_warehouse::{Warehouse, BarRecord};
//! # let warehouse = Warehouse::open_default()?;
//! // User input is passed as parameters, never interpolated
//! let bars = vec![BarRecord {
//!     ticker: "AAPL'; DROP TABLE bars; --".to_string(), // Malicious input
//!     date: "2024-01-02".to_string(),
//!     open: None, high: None, low: None, close: Some(185.64), volume: None,
//! }];
//!
//! // Safe: parameterized query prevents SQL injection
//! warehouse.append_bars(&bars)?;
//! # Ok::<(), tickvault_warehouse::WarehouseError>(())
//! ```

pub mod analytics;
pub mod duckdb;
pub mod migrations;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use ::duckdb::types::Value as DuckValue;
use ::duckdb::Connection;
use ::duckdb::ToSql;
use serde::Serialize;
use serde_json::{Number, Value};
use thiserror::Error;
use time::Date;

pub use analytics::{
    quantity_delta, BarBoundary, BarWindowPair, DeltaAction, DeltaListingRow, DeltaResult,
    HoldingBoundary, HoldingWindowPair, RatioResult,
};
pub use duckdb::{AccessMode, DuckDbConnectionManager, PooledConnection};

/// Errors that can occur during warehouse operations.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// `DuckDB` database error.
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    /// I/O error (file system operations).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Query was rejected due to policy violation.
    #[error("query rejected: {0}")]
    QueryRejected(String),

    /// Query execution timed out.
    #[error("query timed out after {timeout_ms}ms")]
    QueryTimeout { timeout_ms: u64 },

    /// A live table does not match its fixed schema contract.
    #[error(
        "table '{table}' violates the schema contract at column '{column}': \
         expected {expected}, found {found}"
    )]
    SchemaMismatch {
        table: String,
        column: String,
        expected: String,
        found: String,
    },

    /// A requested window held fewer than two distinct dates.
    #[error("fewer than 2 distinct dates for '{ticker}' between {start} and {end}")]
    InsufficientData {
        ticker: String,
        start: String,
        end: String,
    },

    /// A ratio denominator was exactly zero or undefined.
    #[error("ratio denominator is zero or undefined for '{ticker}' between {start} and {end}")]
    ZeroDenominator {
        ticker: String,
        start: String,
        end: String,
    },
}

/// Configuration for the warehouse database.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Root directory for tickvault data.
    pub tickvault_home: PathBuf,
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Maximum number of connections in the pool.
    pub max_pool_size: usize,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        let tickvault_home = resolve_tickvault_home();
        let db_path = tickvault_home.join("warehouse.duckdb");
        Self {
            tickvault_home,
            db_path,
            max_pool_size: 4,
        }
    }
}

impl WarehouseConfig {
    /// Configuration pointing at an explicit database file.
    #[must_use]
    pub fn at_path(db_path: impl Into<PathBuf>) -> Self {
        let db_path = db_path.into();
        let tickvault_home = db_path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        Self {
            tickvault_home,
            db_path,
            max_pool_size: 4,
        }
    }
}

/// Guardrails for query execution to prevent resource exhaustion.
#[derive(Debug, Clone, Copy)]
pub struct QueryGuardrails {
    /// Maximum number of rows to return.
    pub max_rows: usize,
    /// Query timeout in milliseconds.
    pub query_timeout_ms: u64,
}

impl Default for QueryGuardrails {
    fn default() -> Self {
        Self {
            max_rows: 10_000,
            query_timeout_ms: 5_000,
        }
    }
}

impl QueryGuardrails {
    fn timeout(self) -> Duration {
        Duration::from_millis(self.query_timeout_ms.max(1))
    }

    fn validate(self) -> Result<(), WarehouseError> {
        if self.max_rows == 0 {
            return Err(WarehouseError::QueryRejected(String::from(
                "--max-rows must be greater than zero",
            )));
        }
        if self.query_timeout_ms == 0 {
            return Err(WarehouseError::QueryRejected(String::from(
                "query timeout must be greater than zero",
            )));
        }
        Ok(())
    }
}

/// Column metadata for query results.
#[derive(Debug, Clone, Serialize)]
pub struct SqlColumn {
    /// Column name.
    pub name: String,
    /// Column data type.
    #[serde(rename = "type")]
    pub r#type: String,
}

/// Result of a SQL query execution.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    /// Column definitions.
    pub columns: Vec<SqlColumn>,
    /// Row data as JSON values.
    pub rows: Vec<Vec<Value>>,
    /// Number of rows returned.
    pub row_count: usize,
    /// Whether results were truncated due to the row limit.
    pub truncated: bool,
}

/// One canonical daily bar ready for append.
#[derive(Debug, Clone)]
pub struct BarRecord {
    /// Calendar date as ISO `YYYY-MM-DD`.
    pub date: String,
    /// Opening price.
    pub open: Option<f64>,
    /// High price.
    pub high: Option<f64>,
    /// Low price.
    pub low: Option<f64>,
    /// Closing price.
    pub close: Option<f64>,
    /// Share volume.
    pub volume: Option<i64>,
    /// Stock ticker.
    pub ticker: String,
}

/// One canonical holdings row ready for append.
///
/// `date` is kept verbatim as disclosed; `accrual_date` is its parsed
/// ISO form and is null when the disclosure text did not parse.
#[derive(Debug, Clone, Default)]
pub struct HoldingRecord {
    pub date: Option<String>,
    pub ticker: Option<String>,
    pub name: Option<String>,
    pub sector: Option<String>,
    pub asset_class: Option<String>,
    pub market_value: Option<f64>,
    pub weight: Option<f64>,
    pub notional_value: Option<f64>,
    pub quantity: Option<f64>,
    pub cusip: Option<String>,
    pub isin: Option<String>,
    pub sedol: Option<String>,
    pub accrual_date: Option<String>,
}

/// Fixed bar schema contract: column name and declared type, in order.
pub const BAR_CONTRACT: [(&str, &str); 7] = [
    ("Date", "DATE"),
    ("Open", "DOUBLE"),
    ("High", "DOUBLE"),
    ("Low", "DOUBLE"),
    ("Close", "DOUBLE"),
    ("Volume", "BIGINT"),
    ("Ticker", "VARCHAR"),
];

/// Fixed holdings schema contract, applied to every `holdings_<etf>`
/// table.
pub const HOLDING_CONTRACT: [(&str, &str); 13] = [
    ("Date", "VARCHAR"),
    ("Ticker", "VARCHAR"),
    ("Name", "VARCHAR"),
    ("Sector", "VARCHAR"),
    ("Asset_Class", "VARCHAR"),
    ("Market_Value", "DOUBLE"),
    ("Weight", "DOUBLE"),
    ("Notional_Value", "DOUBLE"),
    ("Quantity", "DOUBLE"),
    ("CUSIP", "VARCHAR"),
    ("ISIN", "VARCHAR"),
    ("SEDOL", "VARCHAR"),
    ("Accrual_Date", "DATE"),
];

/// The main warehouse interface for canonical market data.
#[derive(Clone)]
pub struct Warehouse {
    config: WarehouseConfig,
    manager: DuckDbConnectionManager,
}

impl Warehouse {
    /// Open a warehouse with default configuration.
    pub fn open_default() -> Result<Self, WarehouseError> {
        Self::open(WarehouseConfig::default())
    }

    /// Open a warehouse with the specified configuration.
    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let manager = DuckDbConnectionManager::new(config.db_path.clone(), config.max_pool_size);
        let warehouse = Self { config, manager };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    /// Apply pending schema migrations.
    pub fn initialize(&self) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire(AccessMode::ReadWrite)?;
        migrations::apply_migrations(&connection)?;
        Ok(())
    }

    /// Get the path to the database file.
    pub fn db_path(&self) -> &Path {
        self.manager.db_path()
    }

    /// Get the configuration this warehouse was opened with.
    pub fn config(&self) -> &WarehouseConfig {
        &self.config
    }

    /// Append canonical bars; returns the number of rows written.
    ///
    /// The live `bars` table must match [`BAR_CONTRACT`] exactly before
    /// any row is written. Writes are strictly additive: overlapping
    /// ingestion runs stack duplicate rows rather than upserting.
    ///
    /// # Security
    /// Uses parameterized queries to prevent SQL injection.
    pub fn append_bars(&self, rows: &[BarRecord]) -> Result<usize, WarehouseError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let connection = self.manager.acquire(AccessMode::ReadWrite)?;
        verify_table_contract(&connection, "bars", &BAR_CONTRACT)?;

        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<usize, WarehouseError> {
            for row in rows {
                // SECURITY: all row values are passed as parameters
                let params: [&dyn ToSql; 7] = [
                    &row.date,
                    &row.open,
                    &row.high,
                    &row.low,
                    &row.close,
                    &row.volume,
                    &row.ticker,
                ];
                connection.execute(
                    "INSERT INTO bars (\"Date\", \"Open\", \"High\", \"Low\", \"Close\", \
                     \"Volume\", \"Ticker\") \
                     VALUES (TRY_CAST(? AS DATE), ?, ?, ?, ?, ?, ?)",
                    params.as_slice(),
                )?;
            }
            Ok(rows.len())
        })();

        finalize_transaction(&connection, result)
    }

    /// Append one ETF's holdings rows, creating its table on first use;
    /// returns the number of rows written.
    ///
    /// The table is created and verified against [`HOLDING_CONTRACT`]
    /// even when `rows` is empty, so an empty disclosure still
    /// materializes the table.
    ///
    /// # Security
    /// The ETF identifier is validated before it participates in the
    /// table name; all row values are passed as parameters.
    pub fn append_holdings(
        &self,
        etf: &str,
        rows: &[HoldingRecord],
    ) -> Result<usize, WarehouseError> {
        let table = holdings_table_name(etf)?;
        let connection = self.manager.acquire(AccessMode::ReadWrite)?;
        ensure_holdings_table(&connection, table.as_str())?;
        verify_table_contract(&connection, table.as_str(), &HOLDING_CONTRACT)?;

        if rows.is_empty() {
            return Ok(0);
        }

        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<usize, WarehouseError> {
            // Table name is validated above; row values stay parameterized
            let insert_sql = format!(
                "INSERT INTO \"{table}\" (\"Date\", \"Ticker\", \"Name\", \"Sector\", \
                 \"Asset_Class\", \"Market_Value\", \"Weight\", \"Notional_Value\", \
                 \"Quantity\", \"CUSIP\", \"ISIN\", \"SEDOL\", \"Accrual_Date\") \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, TRY_CAST(? AS DATE))"
            );
            for row in rows {
                let params: [&dyn ToSql; 13] = [
                    &row.date,
                    &row.ticker,
                    &row.name,
                    &row.sector,
                    &row.asset_class,
                    &row.market_value,
                    &row.weight,
                    &row.notional_value,
                    &row.quantity,
                    &row.cusip,
                    &row.isin,
                    &row.sedol,
                    &row.accrual_date,
                ];
                connection.execute(insert_sql.as_str(), params.as_slice())?;
            }
            Ok(rows.len())
        })();

        finalize_transaction(&connection, result)
    }

    /// Execute a read-only SQL query with guardrails.
    ///
    /// Only a single SELECT-like statement is accepted; writes go
    /// through the typed append methods.
    pub fn execute_query(
        &self,
        sql: &str,
        guardrails: QueryGuardrails,
    ) -> Result<QueryResult, WarehouseError> {
        guardrails.validate()?;
        let sql = normalize_sql(sql)?;
        enforce_read_only_query(sql)?;

        let connection = self.manager.acquire(AccessMode::ReadOnly)?;
        execute_select_query(&connection, sql, guardrails, Instant::now())
    }
}

/// Validate an ETF identifier and derive its holdings table name.
///
/// Identifier rules follow the ticker alphabet: 1..=15 chars, starts
/// alphabetic, alphanumeric or `.`/`-` throughout. `.` and `-` map to
/// `_` in the table name.
pub fn holdings_table_name(etf: &str) -> Result<String, WarehouseError> {
    let trimmed = etf.trim();
    let valid = !trimmed.is_empty()
        && trimmed.len() <= 15
        && trimmed
            .chars()
            .next()
            .is_some_and(|ch| ch.is_ascii_alphabetic())
        && trimmed
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '.' || ch == '-');
    if !valid {
        return Err(WarehouseError::QueryRejected(format!(
            "invalid ETF identifier '{etf}'"
        )));
    }

    let sanitized: String = trimmed
        .to_ascii_uppercase()
        .chars()
        .map(|ch| if ch == '.' || ch == '-' { '_' } else { ch })
        .collect();
    Ok(format!("holdings_{sanitized}"))
}

fn ensure_holdings_table(connection: &Connection, table: &str) -> Result<(), WarehouseError> {
    let ddl = format!(
        r#"CREATE TABLE IF NOT EXISTS "{table}" (
    "Date" VARCHAR,
    "Ticker" VARCHAR,
    "Name" VARCHAR,
    "Sector" VARCHAR,
    "Asset_Class" VARCHAR,
    "Market_Value" DOUBLE,
    "Weight" DOUBLE,
    "Notional_Value" DOUBLE,
    "Quantity" DOUBLE,
    "CUSIP" VARCHAR,
    "ISIN" VARCHAR,
    "SEDOL" VARCHAR,
    "Accrual_Date" DATE
)"#
    );
    connection.execute_batch(ddl.as_str())?;
    Ok(())
}

/// Compare a live table's columns (name, declared type, ordinal) against
/// its fixed contract.
fn verify_table_contract(
    connection: &Connection,
    table: &str,
    contract: &[(&str, &str)],
) -> Result<(), WarehouseError> {
    let mut statement = connection.prepare(
        "SELECT column_name, data_type FROM information_schema.columns \
         WHERE table_name = ? ORDER BY ordinal_position",
    )?;
    let mut live: Vec<(String, String)> = Vec::new();
    let mut rows = statement.query([table])?;
    while let Some(row) = rows.next()? {
        live.push((row.get(0)?, row.get(1)?));
    }

    for (position, (name, declared_type)) in contract.iter().enumerate() {
        let Some((live_name, live_type)) = live.get(position) else {
            return Err(WarehouseError::SchemaMismatch {
                table: table.to_string(),
                column: (*name).to_string(),
                expected: format!("'{name}' {declared_type}"),
                found: String::from("no column at this position"),
            });
        };
        if live_name != name || !live_type.eq_ignore_ascii_case(declared_type) {
            return Err(WarehouseError::SchemaMismatch {
                table: table.to_string(),
                column: (*name).to_string(),
                expected: format!("'{name}' {declared_type}"),
                found: format!("'{live_name}' {live_type}"),
            });
        }
    }

    if let Some((live_name, live_type)) = live.get(contract.len()) {
        return Err(WarehouseError::SchemaMismatch {
            table: table.to_string(),
            column: live_name.clone(),
            expected: String::from("end of columns"),
            found: format!("'{live_name}' {live_type}"),
        });
    }

    Ok(())
}

/// Finalize a transaction, committing on success or rolling back on
/// failure.
fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, WarehouseError>,
) -> Result<T, WarehouseError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            let _ = connection.execute_batch("ROLLBACK");
            Err(error)
        }
    }
}

/// Execute a SELECT query and collect results under the guardrails.
fn execute_select_query(
    connection: &Connection,
    sql: &str,
    guardrails: QueryGuardrails,
    started: Instant,
) -> Result<QueryResult, WarehouseError> {
    // Prepare and execute the statement
    let mut statement = connection.prepare(sql)?;
    let _ = statement.query([] as [&dyn ToSql; 0])?;

    // Column metadata is only populated after execution
    let column_count = statement.column_count();
    let mut columns = Vec::with_capacity(column_count);
    for index in 0..column_count {
        let name = statement.column_name(index).unwrap().to_string();
        let dtype = statement.column_type(index);
        columns.push(SqlColumn {
            name,
            r#type: dtype.to_string(),
        });
    }

    let mut rows_cursor = statement.query([] as [&dyn ToSql; 0])?;
    let mut rows = Vec::new();
    let mut truncated = false;

    while let Some(row) = rows_cursor.next()? {
        ensure_timeout(started, guardrails.timeout())?;

        if rows.len() >= guardrails.max_rows {
            truncated = true;
            break;
        }

        rows.push(read_row(row, column_count)?);
    }

    ensure_timeout(started, guardrails.timeout())?;

    Ok(QueryResult {
        columns,
        row_count: rows.len(),
        rows,
        truncated,
    })
}

fn read_row(row: &::duckdb::Row<'_>, column_count: usize) -> Result<Vec<Value>, ::duckdb::Error> {
    let mut output = Vec::with_capacity(column_count);
    for index in 0..column_count {
        let value: DuckValue = row.get(index)?;
        output.push(to_json_value(value));
    }
    Ok(output)
}

/// Convert a `DuckDB` value to a JSON value.
fn to_json_value(value: DuckValue) -> Value {
    match value {
        DuckValue::Null => Value::Null,
        DuckValue::Boolean(value) => Value::Bool(value),
        DuckValue::TinyInt(value) => Value::Number(Number::from(value)),
        DuckValue::SmallInt(value) => Value::Number(Number::from(value)),
        DuckValue::Int(value) => Value::Number(Number::from(value)),
        DuckValue::BigInt(value) => Value::Number(Number::from(value)),
        DuckValue::UTinyInt(value) => Value::Number(Number::from(value)),
        DuckValue::USmallInt(value) => Value::Number(Number::from(value)),
        DuckValue::UInt(value) => Value::Number(Number::from(value)),
        DuckValue::UBigInt(value) => Value::Number(Number::from(value)),
        DuckValue::Float(value) => number_from_f64(f64::from(value)),
        DuckValue::Double(value) => number_from_f64(value),
        DuckValue::Text(value) => Value::String(value),
        DuckValue::Date32(days) => date32_to_json(days),
        DuckValue::Blob(value) => Value::String(hex::encode(value)),
        other => Value::String(format!("{other:?}")),
    }
}

/// Convert an f64 to a JSON number, returning Null for NaN/Inf.
fn number_from_f64(value: f64) -> Value {
    Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Days-since-epoch to ISO date text; out-of-range values render null.
fn date32_to_json(days: i32) -> Value {
    const UNIX_EPOCH_JULIAN_DAY: i32 = 2_440_588;
    days.checked_add(UNIX_EPOCH_JULIAN_DAY)
        .and_then(|julian| Date::from_julian_day(julian).ok())
        .map_or(Value::Null, |date| Value::String(date.to_string()))
}

/// Normalize a SQL query string.
fn normalize_sql(sql: &str) -> Result<&str, WarehouseError> {
    let normalized = sql.trim();
    if normalized.is_empty() {
        return Err(WarehouseError::QueryRejected(String::from(
            "query must not be empty",
        )));
    }
    Ok(normalized.trim_end_matches(';').trim())
}

/// Enforce that a query is a single SELECT-like statement.
fn enforce_read_only_query(sql: &str) -> Result<(), WarehouseError> {
    if !is_select_like(sql) {
        return Err(WarehouseError::QueryRejected(String::from(
            "only SELECT/CTE queries are allowed; writes go through ingestion",
        )));
    }
    if has_multiple_statements(sql) {
        return Err(WarehouseError::QueryRejected(String::from(
            "multiple SQL statements are not allowed",
        )));
    }
    Ok(())
}

fn is_select_like(sql: &str) -> bool {
    let first_keyword = sql
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    matches!(
        first_keyword.as_str(),
        "SELECT" | "WITH" | "EXPLAIN" | "SHOW" | "DESCRIBE"
    )
}

fn has_multiple_statements(sql: &str) -> bool {
    sql.split(';')
        .filter(|part| !part.trim().is_empty())
        .count()
        > 1
}

/// Ensure that the query has not exceeded the timeout.
fn ensure_timeout(started: Instant, timeout: Duration) -> Result<(), WarehouseError> {
    if started.elapsed() > timeout {
        return Err(WarehouseError::QueryTimeout {
            timeout_ms: timeout.as_millis().min(u128::from(u64::MAX)) as u64,
        });
    }
    Ok(())
}

/// Resolve the tickvault home directory from environment or default.
fn resolve_tickvault_home() -> PathBuf {
    if let Some(path) = env::var_os("TICKVAULT_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".tickvault");
    }

    PathBuf::from(".tickvault")
}
