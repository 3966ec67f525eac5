//! Store contract consumed by the scrapers and services, plus its
//! warehouse-backed implementation.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use rust_decimal::Decimal;
use tickwell_warehouse::{PriceRow, SymbolRow, SymbolSourceRow, Warehouse};

use crate::domain::{
    Price, ScrapingSource, SimplePrice, SourceDescriptor, SourceId, StaleSource, SymbolRecord,
    Ticker,
};
use crate::StoreError;

/// Run a store call on the blocking thread pool.
pub async fn blocking<T, F>(store: &Arc<dyn Store>, call: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce(&dyn Store) -> Result<T, StoreError> + Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || call(store.as_ref())).await?
}

/// Persisted system of record for symbols, scrape descriptors and price history.
pub trait Store: Send + Sync {
    fn symbol_by_id(&self, id: i64) -> Result<SymbolRecord, StoreError>;

    fn symbol_by_ticker(&self, ticker: &Ticker) -> Result<SymbolRecord, StoreError>;

    fn symbol_source(&self, symbol_id: i64, source: SourceId)
        -> Result<SourceDescriptor, StoreError>;

    fn scraping_source(&self, source: SourceId) -> Result<ScrapingSource, StoreError>;

    /// Pairs never scraped or last scraped before the freshness window.
    fn sources_not_scraped_recently(&self) -> Result<Vec<StaleSource>, StoreError>;

    fn insert_price(
        &self,
        symbol_id: i64,
        price: Decimal,
        currency: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    fn update_last_scraped(
        &self,
        symbol_id: i64,
        source: SourceId,
        when: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Latest price with opening and previous-close figures.
    fn latest_price(&self, symbol_id: i64) -> Result<Price, StoreError>;

    /// Prices in `[start, end]`, oldest first.
    fn historical_prices(
        &self,
        symbol_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SimplePrice>, StoreError>;

    fn create_symbol(&self, ticker: &Ticker, name: Option<&str>)
        -> Result<SymbolRecord, StoreError>;

    fn upsert_scraping_source(
        &self,
        source: SourceId,
        base_url: Option<&str>,
    ) -> Result<(), StoreError>;

    fn upsert_symbol_source(
        &self,
        symbol_id: i64,
        source: SourceId,
        scrape_url: Option<&str>,
    ) -> Result<(), StoreError>;
}

/// [`Store`] over the DuckDB warehouse.
#[derive(Clone)]
pub struct WarehouseStore {
    warehouse: Warehouse,
    freshness: Duration,
}

impl WarehouseStore {
    pub fn new(warehouse: Warehouse, freshness: Duration) -> Self {
        Self {
            warehouse,
            freshness,
        }
    }

    pub fn warehouse(&self) -> &Warehouse {
        &self.warehouse
    }
}

impl Store for WarehouseStore {
    fn symbol_by_id(&self, id: i64) -> Result<SymbolRecord, StoreError> {
        self.warehouse
            .symbol_by_id(id)?
            .ok_or_else(|| StoreError::NotFound(format!("symbol with id {id} not found")))
            .and_then(symbol_record)
    }

    fn symbol_by_ticker(&self, ticker: &Ticker) -> Result<SymbolRecord, StoreError> {
        self.warehouse
            .symbol_by_ticker(ticker.as_str())?
            .ok_or_else(|| StoreError::NotFound(format!("symbol '{ticker}' not found")))
            .and_then(symbol_record)
    }

    fn symbol_source(
        &self,
        symbol_id: i64,
        source: SourceId,
    ) -> Result<SourceDescriptor, StoreError> {
        self.warehouse
            .symbol_source(symbol_id, source.as_str())?
            .ok_or_else(|| {
                StoreError::NotFound(format!(
                    "no {source} scrape descriptor for symbol {symbol_id}"
                ))
            })
            .and_then(source_descriptor)
    }

    fn scraping_source(&self, source: SourceId) -> Result<ScrapingSource, StoreError> {
        let row = self
            .warehouse
            .scraping_source(source.as_str())?
            .ok_or_else(|| StoreError::NotFound(format!("scraping source {source} not found")))?;
        Ok(ScrapingSource {
            id: row.id,
            base_url: row.base_url,
        })
    }

    fn sources_not_scraped_recently(&self) -> Result<Vec<StaleSource>, StoreError> {
        let threshold = Utc::now() - self.freshness;
        let rows = self
            .warehouse
            .symbol_sources_scraped_before(threshold.timestamp_millis())?;
        Ok(rows
            .into_iter()
            .map(|row| StaleSource {
                symbol_id: row.symbol_id,
                source_id: row.source_id,
            })
            .collect())
    }

    fn insert_price(
        &self,
        symbol_id: i64,
        price: Decimal,
        currency: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.warehouse.insert_price(&PriceRow {
            symbol_id,
            price: price.to_string(),
            currency: currency.to_string(),
            ts_ms: timestamp.timestamp_millis(),
        })?;
        Ok(())
    }

    fn update_last_scraped(
        &self,
        symbol_id: i64,
        source: SourceId,
        when: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let updated = self.warehouse.update_last_scraped(
            symbol_id,
            source.as_str(),
            when.timestamp_millis(),
        )?;
        if !updated {
            return Err(StoreError::NotFound(format!(
                "no {source} scrape descriptor for symbol {symbol_id}"
            )));
        }
        Ok(())
    }

    fn latest_price(&self, symbol_id: i64) -> Result<Price, StoreError> {
        let latest = self
            .warehouse
            .latest_price(symbol_id)?
            .ok_or_else(|| StoreError::NotFound(format!("no prices for symbol {symbol_id}")))?;
        let latest = simple_price(latest)?;

        let day_start = latest
            .timestamp
            .date_naive()
            .and_time(NaiveTime::MIN)
            .and_utc()
            .timestamp_millis();

        let opening_price = match self.warehouse.first_price_at_or_after(symbol_id, day_start)? {
            Some(row) => parse_decimal(&row.price)?,
            None => latest.price,
        };
        let previous_closing_price = match self.warehouse.last_price_before(symbol_id, day_start)? {
            Some(row) => parse_decimal(&row.price)?,
            None => Decimal::ZERO,
        };

        Ok(Price {
            price: latest.price,
            currency: latest.currency,
            timestamp: latest.timestamp,
            opening_price,
            previous_closing_price,
        })
    }

    fn historical_prices(
        &self,
        symbol_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SimplePrice>, StoreError> {
        self.warehouse
            .prices_between(symbol_id, start.timestamp_millis(), end.timestamp_millis())?
            .into_iter()
            .map(simple_price)
            .collect()
    }

    fn create_symbol(
        &self,
        ticker: &Ticker,
        name: Option<&str>,
    ) -> Result<SymbolRecord, StoreError> {
        let row = self.warehouse.create_symbol(ticker.as_str(), name)?;
        symbol_record(row)
    }

    fn upsert_scraping_source(
        &self,
        source: SourceId,
        base_url: Option<&str>,
    ) -> Result<(), StoreError> {
        self.warehouse
            .upsert_scraping_source(source.as_str(), base_url)?;
        Ok(())
    }

    fn upsert_symbol_source(
        &self,
        symbol_id: i64,
        source: SourceId,
        scrape_url: Option<&str>,
    ) -> Result<(), StoreError> {
        self.warehouse
            .upsert_symbol_source(symbol_id, source.as_str(), scrape_url)?;
        Ok(())
    }
}

fn symbol_record(row: SymbolRow) -> Result<SymbolRecord, StoreError> {
    let ticker = Ticker::parse(&row.ticker)
        .map_err(|e| StoreError::InvalidRow(format!("symbol {}: {e}", row.id)))?;
    Ok(SymbolRecord {
        id: row.id,
        ticker,
        name: row.name,
    })
}

fn source_descriptor(row: SymbolSourceRow) -> Result<SourceDescriptor, StoreError> {
    let last_scraped = row.last_scraped_ms.map(instant).transpose()?;
    Ok(SourceDescriptor {
        symbol_id: row.symbol_id,
        source_id: row.source_id,
        scrape_url: row.scrape_url,
        last_scraped,
    })
}

fn simple_price(row: PriceRow) -> Result<SimplePrice, StoreError> {
    Ok(SimplePrice {
        price: parse_decimal(&row.price)?,
        currency: row.currency,
        timestamp: instant(row.ts_ms)?,
    })
}

fn parse_decimal(text: &str) -> Result<Decimal, StoreError> {
    Decimal::from_str(text).map_err(|e| StoreError::InvalidRow(format!("price '{text}': {e}")))
}

fn instant(ms: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .ok_or_else(|| StoreError::InvalidRow(format!("timestamp {ms} out of range")))
}
