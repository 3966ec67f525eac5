//! # Tickwell Warehouse
//!
//! DuckDB-based persistence layer for tickwell.
//!
//! ## Overview
//!
//! The warehouse is the system of record for scraped price history and for
//! scrape bookkeeping, and it hosts the persisted tier of the quote cache.
//! It speaks in primitive types: prices are decimal text,
//! instants are epoch milliseconds. Interpretation lives in `tickwell-core`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tickwell_warehouse::{Warehouse, WarehouseConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let warehouse = Warehouse::open(WarehouseConfig::default())?;
//!     let symbol = warehouse.create_symbol("NOVO-B", Some("Novo Nordisk B"))?;
//!     warehouse.upsert_symbol_source(symbol.id, "NASDAQ", Some("https://api.nasdaq.com/..."))?;
//!     Ok(())
//! }
//! ```
//!
//! ## Tables
//!
//! | Table | Description |
//! |-------|-------------|
//! | `symbols` | Tradable instruments keyed by upper-case ticker |
//! | `scraping_sources` | Source identifiers with an optional base URL |
//! | `symbol_sources` | Per (symbol, source) scrape URL and last-scraped instant |
//! | `prices` | Append-only price history |
//! | `cache` | Persisted cache tier (`k`, `v`, `expires_at`) |

pub mod duckdb;
pub mod migrations;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use ::duckdb::{Connection, OptionalExt, Row, ToSql};
use serde::Serialize;
use thiserror::Error;

pub use duckdb::{DuckDbConnectionManager, PooledConnection};

/// Errors that can occur during warehouse operations.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// `DuckDB` database error.
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    /// I/O error (file system operations).
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Configuration for the warehouse database.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Root directory for tickwell data.
    pub tickwell_home: PathBuf,
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Maximum number of idle connections kept in the pool.
    pub max_pool_size: usize,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        let tickwell_home = resolve_tickwell_home();
        let db_path = tickwell_home.join("warehouse.duckdb");
        Self {
            tickwell_home,
            db_path,
            max_pool_size: 4,
        }
    }
}

/// A tradable instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolRow {
    pub id: i64,
    pub ticker: String,
    pub name: Option<String>,
}

/// A scraping source and its optional base URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrapingSourceRow {
    pub id: String,
    pub base_url: Option<String>,
}

/// Scrape descriptor for one (symbol, source) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolSourceRow {
    pub symbol_id: i64,
    pub source_id: String,
    pub scrape_url: Option<String>,
    /// Epoch milliseconds of the last successful scrape.
    pub last_scraped_ms: Option<i64>,
}

/// One stored price point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceRow {
    pub symbol_id: i64,
    /// Decimal rendered as text to keep full precision.
    pub price: String,
    pub currency: String,
    /// Epoch milliseconds.
    pub ts_ms: i64,
}

/// The main warehouse interface.
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

        let manager = DuckDbConnectionManager::open(config.db_path, config.max_pool_size)?;
        let warehouse = Self { manager };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    /// Open a throwaway in-memory warehouse.
    pub fn open_in_memory() -> Result<Self, WarehouseError> {
        let manager = DuckDbConnectionManager::open_in_memory(2)?;
        let warehouse = Self { manager };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    /// Initialize the database schema.
    pub fn initialize(&self) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire()?;
        migrations::apply_migrations(&connection)?;
        Ok(())
    }

    /// Path to the database file, `None` for in-memory warehouses.
    pub fn db_path(&self) -> Option<&Path> {
        self.manager.db_path()
    }

    // ------------------------------------------------------------------
    // Symbols and sources
    // ------------------------------------------------------------------

    /// Insert a new symbol. The ticker is stored as given; callers normalize.
    pub fn create_symbol(
        &self,
        ticker: &str,
        name: Option<&str>,
    ) -> Result<SymbolRow, WarehouseError> {
        let connection = self.manager.acquire()?;
        let params: [&dyn ToSql; 2] = [&ticker, &name];
        let id: i64 = connection.query_row(
            "INSERT INTO symbols (ticker, name) VALUES (?, ?) RETURNING id",
            params.as_slice(),
            |row| row.get(0),
        )?;
        Ok(SymbolRow {
            id,
            ticker: ticker.to_owned(),
            name: name.map(str::to_owned),
        })
    }

    pub fn symbol_by_id(&self, id: i64) -> Result<Option<SymbolRow>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let row = connection
            .query_row(
                "SELECT id, ticker, name FROM symbols WHERE id = ?",
                [id],
                read_symbol,
            )
            .optional()?;
        Ok(row)
    }

    pub fn symbol_by_ticker(&self, ticker: &str) -> Result<Option<SymbolRow>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let row = connection
            .query_row(
                "SELECT id, ticker, name FROM symbols WHERE ticker = ?",
                [ticker],
                read_symbol,
            )
            .optional()?;
        Ok(row)
    }

    pub fn upsert_scraping_source(
        &self,
        id: &str,
        base_url: Option<&str>,
    ) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire()?;
        let params: [&dyn ToSql; 2] = [&id, &base_url];
        connection.execute(
            "INSERT INTO scraping_sources (id, base_url) VALUES (?, ?) \
             ON CONFLICT (id) DO UPDATE SET base_url = excluded.base_url",
            params.as_slice(),
        )?;
        Ok(())
    }

    pub fn scraping_source(&self, id: &str) -> Result<Option<ScrapingSourceRow>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let row = connection
            .query_row(
                "SELECT id, base_url FROM scraping_sources WHERE id = ?",
                [id],
                |row| {
                    Ok(ScrapingSourceRow {
                        id: row.get(0)?,
                        base_url: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Register (or re-point) the scrape descriptor for a (symbol, source) pair.
    /// The last-scraped instant of an existing pair is preserved.
    pub fn upsert_symbol_source(
        &self,
        symbol_id: i64,
        source_id: &str,
        scrape_url: Option<&str>,
    ) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire()?;
        let params: [&dyn ToSql; 3] = [&symbol_id, &source_id, &scrape_url];
        connection.execute(
            "INSERT INTO symbol_sources (symbol_id, source_id, scrape_url) VALUES (?, ?, ?) \
             ON CONFLICT (symbol_id, source_id) DO UPDATE SET scrape_url = excluded.scrape_url",
            params.as_slice(),
        )?;
        Ok(())
    }

    pub fn symbol_source(
        &self,
        symbol_id: i64,
        source_id: &str,
    ) -> Result<Option<SymbolSourceRow>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let params: [&dyn ToSql; 2] = [&symbol_id, &source_id];
        let row = connection
            .query_row(
                "SELECT symbol_id, source_id, scrape_url, last_scraped FROM symbol_sources \
                 WHERE symbol_id = ? AND source_id = ?",
                params.as_slice(),
                read_symbol_source,
            )
            .optional()?;
        Ok(row)
    }

    /// Pairs never scraped, or last scraped strictly before `threshold_ms`.
    ///
    /// Rows are ordered by source then symbol so callers can group them
    /// without re-sorting.
    pub fn symbol_sources_scraped_before(
        &self,
        threshold_ms: i64,
    ) -> Result<Vec<SymbolSourceRow>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let mut statement = connection.prepare(
            "SELECT symbol_id, source_id, scrape_url, last_scraped FROM symbol_sources \
             WHERE last_scraped IS NULL OR last_scraped < ? \
             ORDER BY source_id, symbol_id",
        )?;
        let rows = statement
            .query_map([threshold_ms], read_symbol_source)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Returns `true` when a descriptor row was updated.
    pub fn update_last_scraped(
        &self,
        symbol_id: i64,
        source_id: &str,
        at_ms: i64,
    ) -> Result<bool, WarehouseError> {
        let connection = self.manager.acquire()?;
        let params: [&dyn ToSql; 3] = [&at_ms, &symbol_id, &source_id];
        let updated = connection.execute(
            "UPDATE symbol_sources SET last_scraped = ? WHERE symbol_id = ? AND source_id = ?",
            params.as_slice(),
        )?;
        Ok(updated > 0)
    }

    // ------------------------------------------------------------------
    // Prices
    // ------------------------------------------------------------------

    pub fn insert_price(&self, row: &PriceRow) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire()?;
        let params: [&dyn ToSql; 4] = [&row.symbol_id, &row.price, &row.currency, &row.ts_ms];
        connection.execute(
            "INSERT INTO prices (symbol_id, price, currency, ts) VALUES (?, ?, ?, ?)",
            params.as_slice(),
        )?;
        Ok(())
    }

    pub fn latest_price(&self, symbol_id: i64) -> Result<Option<PriceRow>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let row = connection
            .query_row(
                "SELECT symbol_id, price, currency, ts FROM prices WHERE symbol_id = ? \
                 ORDER BY ts DESC, rowid DESC LIMIT 1",
                [symbol_id],
                read_price,
            )
            .optional()?;
        Ok(row)
    }

    pub fn first_price_at_or_after(
        &self,
        symbol_id: i64,
        from_ms: i64,
    ) -> Result<Option<PriceRow>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let params: [&dyn ToSql; 2] = [&symbol_id, &from_ms];
        let row = connection
            .query_row(
                "SELECT symbol_id, price, currency, ts FROM prices WHERE symbol_id = ? AND ts >= ? \
                 ORDER BY ts ASC, rowid ASC LIMIT 1",
                params.as_slice(),
                read_price,
            )
            .optional()?;
        Ok(row)
    }

    pub fn last_price_before(
        &self,
        symbol_id: i64,
        before_ms: i64,
    ) -> Result<Option<PriceRow>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let params: [&dyn ToSql; 2] = [&symbol_id, &before_ms];
        let row = connection
            .query_row(
                "SELECT symbol_id, price, currency, ts FROM prices WHERE symbol_id = ? AND ts < ? \
                 ORDER BY ts DESC, rowid DESC LIMIT 1",
                params.as_slice(),
                read_price,
            )
            .optional()?;
        Ok(row)
    }

    /// Price history in `[start_ms, end_ms]`, oldest first.
    pub fn prices_between(
        &self,
        symbol_id: i64,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<PriceRow>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let params: [&dyn ToSql; 3] = [&symbol_id, &start_ms, &end_ms];
        let mut statement = connection.prepare(
            "SELECT symbol_id, price, currency, ts FROM prices \
             WHERE symbol_id = ? AND ts >= ? AND ts <= ? \
             ORDER BY ts ASC, rowid ASC",
        )?;
        let rows = statement
            .query_map(params.as_slice(), read_price)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ------------------------------------------------------------------
    // Persisted cache tier
    // ------------------------------------------------------------------

    /// Insert or replace a cache entry.
    pub fn cache_upsert(
        &self,
        key: &str,
        value: &str,
        expires_at_ms: i64,
    ) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire()?;
        let params: [&dyn ToSql; 3] = [&key, &value, &expires_at_ms];
        connection.execute(
            "INSERT INTO cache (k, v, expires_at) VALUES (?, ?, ?) \
             ON CONFLICT (k) DO UPDATE SET v = excluded.v, expires_at = excluded.expires_at",
            params.as_slice(),
        )?;
        Ok(())
    }

    /// Value for `key` if it expires strictly after `now_ms`.
    pub fn cache_get(&self, key: &str, now_ms: i64) -> Result<Option<String>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let params: [&dyn ToSql; 2] = [&key, &now_ms];
        let value = connection
            .query_row(
                "SELECT v FROM cache WHERE k = ? AND expires_at > ? LIMIT 1",
                params.as_slice(),
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Remove entries whose expiry is at or before `now_ms`. Returns the count removed.
    pub fn cache_delete_expired(&self, now_ms: i64) -> Result<usize, WarehouseError> {
        let connection = self.manager.acquire()?;
        let removed = connection.execute("DELETE FROM cache WHERE expires_at <= ?", [now_ms])?;
        Ok(removed)
    }

    /// Remove every entry whose key starts with `prefix`. `_` and `%` match literally.
    pub fn cache_delete_prefix(&self, prefix: &str) -> Result<usize, WarehouseError> {
        let connection = self.manager.acquire()?;
        let removed = connection.execute("DELETE FROM cache WHERE starts_with(k, ?)", [prefix])?;
        Ok(removed)
    }

    /// Number of physical cache rows, expired ones included.
    pub fn cache_len(&self) -> Result<usize, WarehouseError> {
        let connection = self.manager.acquire()?;
        count_rows(&connection, "SELECT COUNT(*) FROM cache")
    }
}

fn count_rows(connection: &Connection, sql: &str) -> Result<usize, WarehouseError> {
    let count: i64 = connection.query_row(sql, [], |row| row.get(0))?;
    Ok(usize::try_from(count).unwrap_or_default())
}

fn read_symbol(row: &Row<'_>) -> Result<SymbolRow, ::duckdb::Error> {
    Ok(SymbolRow {
        id: row.get(0)?,
        ticker: row.get(1)?,
        name: row.get(2)?,
    })
}

fn read_symbol_source(row: &Row<'_>) -> Result<SymbolSourceRow, ::duckdb::Error> {
    Ok(SymbolSourceRow {
        symbol_id: row.get(0)?,
        source_id: row.get(1)?,
        scrape_url: row.get(2)?,
        last_scraped_ms: row.get(3)?,
    })
}

fn read_price(row: &Row<'_>) -> Result<PriceRow, ::duckdb::Error> {
    Ok(PriceRow {
        symbol_id: row.get(0)?,
        price: row.get(1)?,
        currency: row.get(2)?,
        ts_ms: row.get(3)?,
    })
}

/// Resolve the tickwell home directory from environment or default.
fn resolve_tickwell_home() -> PathBuf {
    if let Some(path) = env::var_os("TICKWELL_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".tickwell");
    }

    PathBuf::from(".tickwell")
}
