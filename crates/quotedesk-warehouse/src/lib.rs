//! # Quotedesk Warehouse
//!
//! DuckDB-backed storage for daily equity bars.
//!
//! One table, `stock_daily`, holds one row per `(symbol, date)`. Writes are
//! `INSERT OR REPLACE`, so re-ingesting a day overwrites the earlier values
//! instead of appending a duplicate.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quotedesk_warehouse::{DailyBarRecord, Warehouse};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let warehouse = Warehouse::open_default()?;
//!
//!     warehouse.upsert_daily_bars(&[DailyBarRecord {
//!         symbol: "INFY.NS".to_string(),
//!         date: "2024-01-02".to_string(),
//!         open: 100.0,
//!         high: 110.0,
//!         low: 95.0,
//!         close: 105.0,
//!         adj_close: 105.0,
//!         volume: 1000.0,
//!         daily_return: Some(0.05),
//!         ma_7: None,
//!     }])?;
//!
//!     let latest = warehouse.latest_daily_bars("INFY.NS", 30)?;
//!     println!("{} rows", latest.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Tables
//!
//! | Table | Description |
//! |-------|-------------|
//! | `stock_daily` | Daily bars keyed by `(symbol, date)` |
//! | `ingest_log` | One row per symbol per refresh |
//! | `schema_migrations` | Applied migration versions |

pub mod duckdb;
pub mod migrations;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use ::duckdb::{params, Connection, Row, ToSql};
use serde::Serialize;
use thiserror::Error;

pub use duckdb::{DatabaseLocation, DuckDbConnectionManager, PooledConnection};

/// Errors that can occur during warehouse operations.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// `DuckDB` database error.
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    /// I/O error (file system operations).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A row was rejected before reaching the database.
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

/// Configuration for the warehouse database.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Root directory for quotedesk data.
    pub home: PathBuf,
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Maximum number of idle connections in the pool.
    pub max_pool_size: usize,
}

impl WarehouseConfig {
    /// Configuration rooted at an explicit home directory.
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        let db_path = home.join("warehouse.duckdb");
        Self {
            home,
            db_path,
            max_pool_size: 4,
        }
    }
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self::with_home(resolve_quotedesk_home())
    }
}

/// A persisted daily bar.
///
/// Dates travel as `YYYY-MM-DD` strings; typed conversion happens in
/// `quotedesk-core`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyBarRecord {
    pub symbol: String,
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adj_close: f64,
    pub volume: f64,
    pub daily_return: Option<f64>,
    pub ma_7: Option<f64>,
}

/// Audit entry written once per symbol per refresh.
#[derive(Debug, Clone)]
pub struct IngestLogEntry<'a> {
    pub request_id: &'a str,
    pub symbol: &'a str,
    pub source: &'a str,
    pub status: &'a str,
    pub row_count: Option<i64>,
    pub detail: Option<&'a str>,
}

const DAILY_BAR_COLUMNS: &str = "symbol, CAST(date AS VARCHAR) AS date, open, high, low, close, \
     adj_close, volume, daily_return, ma_7";

/// The main warehouse interface for daily bar storage.
#[derive(Clone)]
pub struct Warehouse {
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

        let manager = DuckDbConnectionManager::open(
            DatabaseLocation::File(config.db_path.clone()),
            config.max_pool_size,
        )?;
        let warehouse = Self { manager };
        warehouse.initialize()?;
        tracing::info!(path = %config.db_path.display(), "warehouse opened");
        Ok(warehouse)
    }

    /// Open a throwaway in-memory warehouse.
    pub fn open_in_memory() -> Result<Self, WarehouseError> {
        let manager = DuckDbConnectionManager::open(DatabaseLocation::InMemory, 2)?;
        let warehouse = Self { manager };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    /// Initialize database schema.
    pub fn initialize(&self) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire()?;
        migrations::apply_migrations(&connection)?;
        Ok(())
    }

    /// Get the path to the database file, if file-backed.
    pub fn db_path(&self) -> Option<&Path> {
        self.manager.db_path()
    }

    /// Insert or replace daily bars keyed by `(symbol, date)`.
    ///
    /// All rows are written in one transaction; on error nothing from this
    /// call is kept.
    ///
    /// # Security
    /// All values are passed as query parameters, never interpolated.
    pub fn upsert_daily_bars(&self, rows: &[DailyBarRecord]) -> Result<usize, WarehouseError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let connection = self.manager.acquire()?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<usize, WarehouseError> {
            for row in rows {
                if row.symbol.trim().is_empty() {
                    return Err(WarehouseError::InvalidRecord(String::from(
                        "symbol must not be empty",
                    )));
                }

                let params: [&dyn ToSql; 10] = [
                    &row.symbol,
                    &row.date,
                    &row.open,
                    &row.high,
                    &row.low,
                    &row.close,
                    &row.adj_close,
                    &row.volume,
                    &row.daily_return,
                    &row.ma_7,
                ];
                connection.execute(
                    "INSERT OR REPLACE INTO stock_daily \
                     (symbol, date, open, high, low, close, adj_close, volume, \
                     daily_return, ma_7, updated_at) \
                     VALUES (?, CAST(? AS DATE), ?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)",
                    params.as_slice(),
                )?;
            }

            Ok(rows.len())
        })();

        finalize_transaction(&connection, result)
    }

    /// Distinct symbols in ascending order.
    pub fn list_symbols(&self) -> Result<Vec<String>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let mut statement =
            connection.prepare("SELECT DISTINCT symbol FROM stock_daily ORDER BY symbol ASC")?;
        let symbols = statement
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(symbols)
    }

    /// Up to `limit` most recent bars for `symbol`, newest first.
    pub fn latest_daily_bars(
        &self,
        symbol: &str,
        limit: usize,
    ) -> Result<Vec<DailyBarRecord>, WarehouseError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let connection = self.manager.acquire()?;
        let sql = format!(
            "SELECT {DAILY_BAR_COLUMNS} FROM stock_daily WHERE symbol = ? ORDER BY date DESC LIMIT ?"
        );
        query_daily_bars(&connection, &sql, params![symbol, limit])
    }

    /// Every bar for `symbol`, oldest first.
    pub fn daily_bars_ascending(
        &self,
        symbol: &str,
    ) -> Result<Vec<DailyBarRecord>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let sql = format!(
            "SELECT {DAILY_BAR_COLUMNS} FROM stock_daily WHERE symbol = ? ORDER BY date ASC"
        );
        query_daily_bars(&connection, &sql, params![symbol])
    }

    /// Every bar on `date` (`YYYY-MM-DD`) across all symbols.
    pub fn daily_bars_on(&self, date: &str) -> Result<Vec<DailyBarRecord>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let sql = format!(
            "SELECT {DAILY_BAR_COLUMNS} FROM stock_daily \
             WHERE date = CAST(? AS DATE) ORDER BY symbol ASC"
        );
        query_daily_bars(&connection, &sql, params![date])
    }

    /// Latest stored date across all symbols.
    pub fn max_date(&self) -> Result<Option<String>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let date = connection.query_row(
            "SELECT CAST(MAX(date) AS VARCHAR) FROM stock_daily",
            [],
            |row| row.get::<_, Option<String>>(0),
        )?;
        Ok(date)
    }

    /// Number of stored bars, optionally for one symbol.
    pub fn count_daily_bars(&self, symbol: Option<&str>) -> Result<i64, WarehouseError> {
        let connection = self.manager.acquire()?;
        let count = match symbol {
            Some(symbol) => connection.query_row(
                "SELECT COUNT(*) FROM stock_daily WHERE symbol = ?",
                params![symbol],
                |row| row.get(0),
            )?,
            None => connection.query_row("SELECT COUNT(*) FROM stock_daily", [], |row| row.get(0))?,
        };
        Ok(count)
    }

    /// Number of `ingest_log` rows, optionally with one status.
    pub fn count_ingest_log(&self, status: Option<&str>) -> Result<i64, WarehouseError> {
        let connection = self.manager.acquire()?;
        let count = match status {
            Some(status) => connection.query_row(
                "SELECT COUNT(*) FROM ingest_log WHERE status = ?",
                params![status],
                |row| row.get(0),
            )?,
            None => connection.query_row("SELECT COUNT(*) FROM ingest_log", [], |row| row.get(0))?,
        };
        Ok(count)
    }

    /// Append a refresh outcome to `ingest_log`.
    pub fn record_ingest(&self, entry: &IngestLogEntry<'_>) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire()?;
        let params: [&dyn ToSql; 6] = [
            &entry.request_id,
            &entry.symbol,
            &entry.source,
            &entry.status,
            &entry.row_count,
            &entry.detail,
        ];
        connection.execute(
            "INSERT INTO ingest_log \
             (request_id, symbol, source, status, row_count, detail, timestamp) \
             VALUES (?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)",
            params.as_slice(),
        )?;
        Ok(())
    }
}

fn query_daily_bars(
    connection: &Connection,
    sql: &str,
    params: impl ::duckdb::Params,
) -> Result<Vec<DailyBarRecord>, WarehouseError> {
    let mut statement = connection.prepare(sql)?;
    let rows = statement
        .query_map(params, read_daily_bar)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn read_daily_bar(row: &Row<'_>) -> Result<DailyBarRecord, ::duckdb::Error> {
    Ok(DailyBarRecord {
        symbol: row.get(0)?,
        date: row.get(1)?,
        open: row.get(2)?,
        high: row.get(3)?,
        low: row.get(4)?,
        close: row.get(5)?,
        adj_close: row.get(6)?,
        volume: row.get(7)?,
        daily_return: row.get(8)?,
        ma_7: row.get(9)?,
    })
}

/// Finalize a transaction, committing on success or rolling back on failure.
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

/// Resolve the quotedesk home directory from environment or default.
fn resolve_quotedesk_home() -> PathBuf {
    if let Some(path) = env::var_os("QUOTEDESK_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".quotedesk");
    }

    PathBuf::from(".quotedesk")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(symbol: &str, date: &str, open: f64, close: f64) -> DailyBarRecord {
        DailyBarRecord {
            symbol: symbol.to_string(),
            date: date.to_string(),
            open,
            high: open.max(close) + 1.0,
            low: open.min(close) - 1.0,
            close,
            adj_close: close,
            volume: 1_000.0,
            daily_return: Some((close - open) / open),
            ma_7: None,
        }
    }

    #[test]
    fn initializes_tables_on_disk() {
        let temp = tempdir().expect("tempdir");
        let warehouse =
            Warehouse::open(WarehouseConfig::with_home(temp.path().join("home"))).expect("open");

        assert!(warehouse.db_path().is_some_and(Path::exists));
        assert_eq!(warehouse.count_daily_bars(None).expect("count"), 0);
        assert_eq!(warehouse.max_date().expect("max date"), None);
    }

    #[test]
    fn upsert_replaces_rows_with_the_same_key() {
        let warehouse = Warehouse::open_in_memory().expect("open");

        warehouse
            .upsert_daily_bars(&[record("TCS.NS", "2024-01-02", 100.0, 101.0)])
            .expect("first write");
        warehouse
            .upsert_daily_bars(&[record("TCS.NS", "2024-01-02", 100.0, 140.0)])
            .expect("second write");

        let rows = warehouse.daily_bars_ascending("TCS.NS").expect("read");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].close, 140.0);
        assert_eq!(rows[0].date, "2024-01-02");
    }

    #[test]
    fn read_paths_order_rows_as_documented() {
        let warehouse = Warehouse::open_in_memory().expect("open");
        warehouse
            .upsert_daily_bars(&[
                record("TCS.NS", "2024-01-03", 10.0, 11.0),
                record("INFY.NS", "2024-01-03", 20.0, 19.0),
                record("TCS.NS", "2024-01-02", 10.0, 10.5),
                record("TCS.NS", "2024-01-04", 11.0, 12.0),
            ])
            .expect("write");

        assert_eq!(
            warehouse.list_symbols().expect("symbols"),
            vec!["INFY.NS".to_string(), "TCS.NS".to_string()]
        );

        let latest = warehouse.latest_daily_bars("TCS.NS", 2).expect("latest");
        let latest_dates: Vec<_> = latest.iter().map(|row| row.date.as_str()).collect();
        assert_eq!(latest_dates, vec!["2024-01-04", "2024-01-03"]);

        let ascending = warehouse.daily_bars_ascending("TCS.NS").expect("ascending");
        let ascending_dates: Vec<_> = ascending.iter().map(|row| row.date.as_str()).collect();
        assert_eq!(ascending_dates, vec!["2024-01-02", "2024-01-03", "2024-01-04"]);

        let on_date = warehouse.daily_bars_on("2024-01-03").expect("on date");
        assert_eq!(on_date.len(), 2);

        assert_eq!(
            warehouse.max_date().expect("max"),
            Some("2024-01-04".to_string())
        );
    }

    #[test]
    fn optional_metrics_round_trip_as_null() {
        let warehouse = Warehouse::open_in_memory().expect("open");
        let mut row = record("HDFCBANK.NS", "2024-02-01", 0.0, 5.0);
        row.daily_return = None;
        warehouse.upsert_daily_bars(&[row]).expect("write");

        let stored = warehouse
            .latest_daily_bars("HDFCBANK.NS", 1)
            .expect("read");
        assert_eq!(stored[0].daily_return, None);
        assert_eq!(stored[0].ma_7, None);
    }

    #[test]
    fn failed_batch_is_rolled_back() {
        let warehouse = Warehouse::open_in_memory().expect("open");
        let error = warehouse
            .upsert_daily_bars(&[
                record("TCS.NS", "2024-01-02", 10.0, 11.0),
                record(" ", "2024-01-02", 10.0, 11.0),
            ])
            .expect_err("blank symbol must fail");

        assert!(matches!(error, WarehouseError::InvalidRecord(_)));
        assert_eq!(warehouse.count_daily_bars(None).expect("count"), 0);
    }

    #[test]
    fn symbols_are_stored_as_parameters() {
        let warehouse = Warehouse::open_in_memory().expect("open");
        let dangerous = r#"RELIANCE.NS'; DROP TABLE stock_daily; --"#;
        warehouse
            .upsert_daily_bars(&[record(dangerous, "2024-01-02", 10.0, 11.0)])
            .expect("write");

        assert_eq!(warehouse.count_daily_bars(Some(dangerous)).expect("count"), 1);
    }

    #[test]
    fn ingest_log_accepts_entries() {
        let warehouse = Warehouse::open_in_memory().expect("open");
        warehouse
            .record_ingest(&IngestLogEntry {
                request_id: "refresh-0001",
                symbol: "INFY.NS",
                source: "yahoo",
                status: "stored",
                row_count: Some(250),
                detail: None,
            })
            .expect("log");

        let connection = warehouse.manager.acquire().expect("connection");
        let count: i64 = connection
            .query_row("SELECT COUNT(*) FROM ingest_log", [], |row| row.get(0))
            .expect("count");
        assert_eq!(count, 1);
    }
}
