//! Quote assembly with a read-through cache.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, warn};

use crate::cache::TieredCache;
use crate::domain::{Quote, Ticker};
use crate::store::{self, Store};
use crate::{CacheError, ServiceError, ValidationError};

/// Lifetime of an assembled quote in the cache.
pub const QUOTE_CACHE_TTL: Duration = Duration::from_secs(30 * 60);

/// Lookback used when a quote request names no duration or an invalid one.
pub const DEFAULT_LOOKBACK: &str = "24h";

#[derive(Clone)]
pub struct QuoteService {
    store: Arc<dyn Store>,
    cache: Arc<TieredCache>,
}

impl QuoteService {
    pub fn new(store: Arc<dyn Store>, cache: Arc<TieredCache>) -> Self {
        Self { store, cache }
    }

    pub fn cache(&self) -> &Arc<TieredCache> {
        &self.cache
    }

    /// Latest price plus the history within `[start, end]` for `ticker`.
    ///
    /// A cache failure is logged and treated as a miss.
    pub async fn get_quote(
        &self,
        ticker: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Quote, ServiceError> {
        let ticker = Ticker::parse(ticker)?;
        let key = quote_cache_key(&ticker, start, end);

        match self.cache.get_obj::<Quote>(&key).await {
            Ok(Some(quote)) => {
                debug!(%key, "quote cache hit");
                return Ok(quote);
            }
            Ok(None) => debug!(%key, "quote cache miss"),
            Err(error) => warn!(%key, %error, "quote cache unavailable, assembling from store"),
        }

        let lookup = ticker.clone();
        let quote = store::blocking(&self.store, move |store| {
            let symbol = store.symbol_by_ticker(&lookup)?;
            let price = store.latest_price(symbol.id)?;
            let historical_prices = store.historical_prices(symbol.id, start, end)?;
            Ok(Quote {
                symbol: symbol.to_symbol(),
                price,
                historical_prices,
            })
        })
        .await?;

        if let Err(error) = self.cache.put_obj(&key, &quote, QUOTE_CACHE_TTL).await {
            warn!(%key, %error, "error caching quote");
        }

        Ok(quote)
    }

    /// Drop every cached quote of `ticker`, whatever its date range.
    pub async fn clear_cache(&self, ticker: &Ticker) -> Result<usize, CacheError> {
        self.cache.delete_by_prefix(&quote_cache_prefix(ticker)).await
    }
}

pub fn quote_cache_key(ticker: &Ticker, start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    format!(
        "{}{}:{}",
        quote_cache_prefix(ticker),
        start.timestamp(),
        end.timestamp()
    )
}

/// The trailing separator keeps `NOVO` from matching `NOVO-B` entries.
pub fn quote_cache_prefix(ticker: &Ticker) -> String {
    format!("QUOTE:{ticker}:")
}

/// Parse a lookback such as `90m`, `24h` or `7d`.
pub fn parse_lookback(input: &str) -> Result<TimeDelta, ValidationError> {
    let invalid = || ValidationError::InvalidSetting {
        name: "duration",
        value: input.to_string(),
    };

    let trimmed = input.trim();
    let unit = trimmed.chars().last().ok_or_else(invalid)?;
    let amount: i64 = trimmed[..trimmed.len() - unit.len_utf8()]
        .parse()
        .map_err(|_| invalid())?;
    if amount <= 0 {
        return Err(invalid());
    }

    match unit {
        'm' => TimeDelta::try_minutes(amount),
        'h' => TimeDelta::try_hours(amount),
        'd' => TimeDelta::try_days(amount),
        _ => None,
    }
    .ok_or_else(invalid)
}

/// Last second of the UTC day containing `now`.
pub fn end_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(23, 59, 59)
        .map_or(now, |naive| naive.and_utc())
}

/// Quote range ending at the end of today, reaching back by `duration`.
pub fn quote_range(duration: Option<&str>, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let input = duration
        .filter(|value| !value.trim().is_empty())
        .unwrap_or(DEFAULT_LOOKBACK);
    let lookback = parse_lookback(input).unwrap_or_else(|error| {
        warn!(%error, "invalid quote duration, using {DEFAULT_LOOKBACK}");
        TimeDelta::hours(24)
    });

    let end = end_of_day(now);
    let start = end.checked_sub_signed(lookback).unwrap_or_else(|| {
        warn!(input, "quote duration reaches past the earliest instant, using {DEFAULT_LOOKBACK}");
        end - TimeDelta::hours(24)
    });
    (start, end)
}
