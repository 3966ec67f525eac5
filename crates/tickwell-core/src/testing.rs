//! In-memory [`Store`] with call counters for service and adapter tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::{
    Price, ScrapingSource, SimplePrice, SourceDescriptor, SourceId, StaleSource, SymbolRecord,
    Ticker,
};
use crate::store::Store;
use crate::StoreError;

#[derive(Default)]
struct State {
    symbols: Vec<SymbolRecord>,
    descriptors: Vec<SourceDescriptor>,
    sources: Vec<ScrapingSource>,
    prices: Vec<(i64, SimplePrice)>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    pub latest_price_reads: AtomicUsize,
    pub history_reads: AtomicUsize,
    pub fail_last_scraped: AtomicBool,
}

impl MemoryStore {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("store state should not be poisoned")
    }

    pub fn add_symbol(&self, ticker: &str) -> SymbolRecord {
        let ticker = Ticker::parse(ticker).expect("valid ticker");
        self.create_symbol(&ticker, Some("Test instrument"))
            .expect("memory insert")
    }

    pub fn add_descriptor(&self, symbol_id: i64, source_id: &str, scrape_url: Option<&str>) {
        self.state().descriptors.push(SourceDescriptor {
            symbol_id,
            source_id: source_id.to_string(),
            scrape_url: scrape_url.map(str::to_string),
            last_scraped: None,
        });
    }

    pub fn prices_for(&self, symbol_id: i64) -> Vec<SimplePrice> {
        self.state()
            .prices
            .iter()
            .filter(|(id, _)| *id == symbol_id)
            .map(|(_, price)| price.clone())
            .collect()
    }

    pub fn last_scraped(&self, symbol_id: i64, source_id: &str) -> Option<DateTime<Utc>> {
        self.state()
            .descriptors
            .iter()
            .find(|d| d.symbol_id == symbol_id && d.source_id == source_id)
            .and_then(|d| d.last_scraped)
    }
}

impl Store for MemoryStore {
    fn symbol_by_id(&self, id: i64) -> Result<SymbolRecord, StoreError> {
        self.state()
            .symbols
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("symbol with id {id} not found")))
    }

    fn symbol_by_ticker(&self, ticker: &Ticker) -> Result<SymbolRecord, StoreError> {
        self.state()
            .symbols
            .iter()
            .find(|s| &s.ticker == ticker)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("symbol '{ticker}' not found")))
    }

    fn symbol_source(
        &self,
        symbol_id: i64,
        source: SourceId,
    ) -> Result<SourceDescriptor, StoreError> {
        self.state()
            .descriptors
            .iter()
            .find(|d| d.symbol_id == symbol_id && d.source_id == source.as_str())
            .cloned()
            .ok_or_else(|| {
                StoreError::NotFound(format!(
                    "no {source} scrape descriptor for symbol {symbol_id}"
                ))
            })
    }

    fn scraping_source(&self, source: SourceId) -> Result<ScrapingSource, StoreError> {
        self.state()
            .sources
            .iter()
            .find(|s| s.id == source.as_str())
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("scraping source {source} not found")))
    }

    fn sources_not_scraped_recently(&self) -> Result<Vec<StaleSource>, StoreError> {
        Ok(self
            .state()
            .descriptors
            .iter()
            .filter(|d| d.last_scraped.is_none())
            .map(|d| StaleSource {
                symbol_id: d.symbol_id,
                source_id: d.source_id.clone(),
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
        self.state().prices.push((
            symbol_id,
            SimplePrice {
                price,
                currency: currency.to_string(),
                timestamp,
            },
        ));
        Ok(())
    }

    fn update_last_scraped(
        &self,
        symbol_id: i64,
        source: SourceId,
        when: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if self.fail_last_scraped.load(Ordering::SeqCst) {
            return Err(StoreError::InvalidRow(String::from("bookkeeping unavailable")));
        }
        let mut state = self.state();
        let descriptor = state
            .descriptors
            .iter_mut()
            .find(|d| d.symbol_id == symbol_id && d.source_id == source.as_str())
            .ok_or_else(|| StoreError::NotFound(String::from("no descriptor")))?;
        descriptor.last_scraped = Some(when);
        Ok(())
    }

    fn latest_price(&self, symbol_id: i64) -> Result<Price, StoreError> {
        self.latest_price_reads.fetch_add(1, Ordering::SeqCst);
        let latest = self
            .prices_for(symbol_id)
            .into_iter()
            .max_by_key(|p| p.timestamp)
            .ok_or_else(|| StoreError::NotFound(format!("no prices for symbol {symbol_id}")))?;
        Ok(Price {
            price: latest.price,
            currency: latest.currency,
            timestamp: latest.timestamp,
            opening_price: latest.price,
            previous_closing_price: Decimal::ZERO,
        })
    }

    fn historical_prices(
        &self,
        symbol_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SimplePrice>, StoreError> {
        self.history_reads.fetch_add(1, Ordering::SeqCst);
        let mut prices: Vec<SimplePrice> = self
            .prices_for(symbol_id)
            .into_iter()
            .filter(|p| p.timestamp >= start && p.timestamp <= end)
            .collect();
        prices.sort_by_key(|p| p.timestamp);
        Ok(prices)
    }

    fn create_symbol(
        &self,
        ticker: &Ticker,
        name: Option<&str>,
    ) -> Result<SymbolRecord, StoreError> {
        let mut state = self.state();
        let record = SymbolRecord {
            id: i64::try_from(state.symbols.len()).unwrap_or(i64::MAX) + 1,
            ticker: ticker.clone(),
            name: name.map(str::to_string),
        };
        state.symbols.push(record.clone());
        Ok(record)
    }

    fn upsert_scraping_source(
        &self,
        source: SourceId,
        base_url: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut state = self.state();
        state.sources.retain(|s| s.id != source.as_str());
        state.sources.push(ScrapingSource {
            id: source.as_str().to_string(),
            base_url: base_url.map(str::to_string),
        });
        Ok(())
    }

    fn upsert_symbol_source(
        &self,
        symbol_id: i64,
        source: SourceId,
        scrape_url: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut state = self.state();
        match state
            .descriptors
            .iter_mut()
            .find(|d| d.symbol_id == symbol_id && d.source_id == source.as_str())
        {
            Some(descriptor) => descriptor.scrape_url = scrape_url.map(str::to_string),
            None => state.descriptors.push(SourceDescriptor {
                symbol_id,
                source_id: source.as_str().to_string(),
                scrape_url: scrape_url.map(str::to_string),
                last_scraped: None,
            }),
        }
        Ok(())
    }
}
