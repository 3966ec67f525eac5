//! Source adapters.
//!
//! Every adapter implements [`Scraper`]: it resolves its fetch target, issues
//! the network call, parses the source's native payload and resolves the
//! source's timestamp encoding into a [`ScrapeResult`].
//!
//! | Source | Adapter | Payload |
//! |--------|---------|---------|
//! | `BORSFRA` | [`BorseFrankfurtScraper`] | JSON API |
//! | `MARKETSCREENER` | [`MarketscreenerScraper`] | HTML with JSON-LD |
//! | `NASDAQ` | [`NasdaqScraper`] | JSON API |
//! | `NASDAQ_EU` | [`NasdaqEuScraper`] | redirect, then JSON API |
//! | `YAHOO` | [`YahooScraper`] | regex over raw HTML |
//! | `YFINANCEAPI` | [`YFinanceApiScraper`] | JSON API |

mod borse_frankfurt;
mod marketscreener;
mod nasdaq;
mod nasdaq_eu;
mod yahoo;
mod yfinance_api;

use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;

use crate::domain::{ScrapeResult, SourceId, SymbolRecord};
use crate::http_client::{HttpClient, HttpRequest, HttpResponse};
use crate::store::{self, Store};
use crate::{SourceError, StoreError};

pub use borse_frankfurt::BorseFrankfurtScraper;
pub use marketscreener::MarketscreenerScraper;
pub use nasdaq::NasdaqScraper;
pub use nasdaq_eu::NasdaqEuScraper;
pub use yahoo::YahooScraper;
pub use yfinance_api::YFinanceApiScraper;

/// Zone assumed by sources that publish local exchange time.
pub const EXCHANGE_TZ: Tz = chrono_tz::Europe::Copenhagen;

/// Capability contract shared by every source adapter.
pub trait Scraper: Send + Sync {
    fn id(&self) -> SourceId;

    fn scrape<'a>(
        &'a self,
        symbol: &'a SymbolRecord,
    ) -> Pin<Box<dyn Future<Output = Result<ScrapeResult, SourceError>> + Send + 'a>>;
}

/// Collaborators shared by all adapters.
#[derive(Clone)]
pub struct ScrapeContext {
    pub http: Arc<dyn HttpClient>,
    pub store: Arc<dyn Store>,
    pub timeout_ms: u64,
}

impl ScrapeContext {
    pub fn new(http: Arc<dyn HttpClient>, store: Arc<dyn Store>, timeout_ms: u64) -> Self {
        Self {
            http,
            store,
            timeout_ms,
        }
    }

    /// Scrape URL registered for (symbol, source).
    pub(crate) async fn descriptor_url(
        &self,
        source: SourceId,
        symbol: &SymbolRecord,
    ) -> Result<String, SourceError> {
        let symbol_id = symbol.id;
        let descriptor = store::blocking(&self.store, move |store| {
            store.symbol_source(symbol_id, source)
        })
        .await
        .map_err(|e| store_error(source, symbol, "symbol source", e))?;
        descriptor
            .scrape_url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                SourceError::not_found(format!(
                    "{source} {}: scrape descriptor has no url",
                    symbol.ticker
                ))
            })
    }

    /// Execute `request` with the configured timeout. Any status is returned.
    pub(crate) async fn send(
        &self,
        source: SourceId,
        symbol: &SymbolRecord,
        request: HttpRequest,
    ) -> Result<HttpResponse, SourceError> {
        let url = request.url.clone();
        self.http
            .execute(request.with_timeout_ms(self.timeout_ms))
            .await
            .map_err(|e| {
                SourceError::network(format!(
                    "{source} {}: error fetching {url}: {}",
                    symbol.ticker,
                    e.message()
                ))
            })
    }

    /// Execute `request` and return the body of a 2xx response.
    pub(crate) async fn fetch_body(
        &self,
        source: SourceId,
        symbol: &SymbolRecord,
        request: HttpRequest,
    ) -> Result<String, SourceError> {
        let url = request.url.clone();
        let response = self.send(source, symbol, request).await?;
        if !response.is_success() {
            return Err(SourceError::network(format!(
                "{source} {}: {url} responded with status {}",
                symbol.ticker, response.status
            )));
        }
        Ok(response.body)
    }
}

pub(crate) fn store_error(
    source: SourceId,
    symbol: &SymbolRecord,
    what: &str,
    error: StoreError,
) -> SourceError {
    match error {
        StoreError::NotFound(message) => {
            SourceError::not_found(format!("{source} {}: {message}", symbol.ticker))
        }
        other => SourceError::store(format!(
            "{source} {}: error getting {what}: {other}",
            symbol.ticker
        )),
    }
}

/// Parse a price string after removing an attached currency code and
/// thousands separators.
pub(crate) fn clean_price(raw: &str, currency: &str) -> Result<Decimal, String> {
    let without_code = if currency.is_empty() {
        raw.to_string()
    } else {
        raw.replace(currency, "")
    };
    let cleaned: String = without_code
        .trim()
        .chars()
        .filter(|ch| *ch != ',' && !ch.is_whitespace())
        .collect();
    Decimal::from_str(&cleaned)
        .map_err(|e| format!("error parsing decimal from '{cleaned}' (original value: '{raw}'): {e}"))
}

/// Decimal from a JSON number or numeric string, without going through `f64`.
pub(crate) fn json_decimal(value: &serde_json::Value) -> Option<Decimal> {
    match value {
        serde_json::Value::Number(number) => {
            let text = number.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .ok()
        }
        serde_json::Value::String(text) => Decimal::from_str(text.trim()).ok(),
        _ => None,
    }
}

/// Interpret a wall-clock time in `tz`. Ambiguous times resolve to the
/// earlier instant; non-existent times fail.
pub(crate) fn in_zone<Z: TimeZone>(naive: NaiveDateTime, tz: &Z) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Canned-response transport shared by the adapter tests.
#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::http_client::HttpError;
    use crate::testing::MemoryStore;

    #[derive(Default)]
    pub struct CannedHttpClient {
        responses: HashMap<String, Result<HttpResponse, HttpError>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl CannedHttpClient {
        pub fn with(mut self, url: &str, response: HttpResponse) -> Self {
            self.responses.insert(url.to_string(), Ok(response));
            self
        }

        pub fn failing(mut self, url: &str, message: &str) -> Self {
            self.responses
                .insert(url.to_string(), Err(HttpError::new(message)));
            self
        }

        pub fn recorded_requests(&self) -> Vec<HttpRequest> {
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .clone()
        }
    }

    impl HttpClient for CannedHttpClient {
        fn execute<'a>(
            &'a self,
            request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
            let response = self
                .responses
                .get(&request.url)
                .cloned()
                .unwrap_or_else(|| Ok(HttpResponse::new(404, "not found")));
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .push(request);
            Box::pin(async move { response })
        }
    }

    pub fn context(http: Arc<CannedHttpClient>, store: Arc<MemoryStore>) -> ScrapeContext {
        ScrapeContext::new(http, store, 1_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn clean_price_strips_attached_currency_and_separators() {
        assert_eq!(clean_price("DKK1,234.50", "DKK"), Ok(dec!(1234.50)));
        assert_eq!(clean_price("$190.12", "$"), Ok(dec!(190.12)));
        assert_eq!(clean_price(" 98.7 EUR", "EUR"), Ok(dec!(98.7)));
        assert!(clean_price("n/a", "USD").is_err());
    }

    #[test]
    fn json_decimal_accepts_numbers_and_strings() {
        let value: serde_json::Value =
            serde_json::from_str(r#"[123.45, "67.8", 12, null]"#).expect("json");
        assert_eq!(json_decimal(&value[0]), Some(dec!(123.45)));
        assert_eq!(json_decimal(&value[1]), Some(dec!(67.8)));
        assert_eq!(json_decimal(&value[2]), Some(dec!(12)));
        assert_eq!(json_decimal(&value[3]), None);
    }
}
