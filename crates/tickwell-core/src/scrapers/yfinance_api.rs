use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{json_decimal, store_error, ScrapeContext, Scraper};
use crate::domain::{ScrapeResult, SourceId, SymbolRecord};
use crate::http_client::HttpRequest;
use crate::store;
use crate::SourceError;

const SOURCE: SourceId = SourceId::YFinanceApi;

/// Self-hosted yfinance wrapper API at `{base_url}/ticker/{ticker}`.
pub struct YFinanceApiScraper {
    context: ScrapeContext,
    auth_key: Option<String>,
}

impl YFinanceApiScraper {
    /// `auth_key` is sent verbatim as the `Authorization` header when present.
    pub fn new(context: ScrapeContext, auth_key: Option<String>) -> Self {
        Self {
            context,
            auth_key: auth_key.filter(|key| !key.is_empty()),
        }
    }

    async fn fetch(&self, symbol: &SymbolRecord) -> Result<ScrapeResult, SourceError> {
        let source = store::blocking(&self.context.store, |store| store.scraping_source(SOURCE))
            .await
            .map_err(|e| store_error(SOURCE, symbol, "scraping source", e))?;
        let base_url = source
            .base_url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                SourceError::not_found(format!(
                    "{SOURCE} {}: scraping source has no base url",
                    symbol.ticker
                ))
            })?;

        let url = format!(
            "{}/ticker/{}",
            base_url.trim_end_matches('/'),
            urlencoding::encode(symbol.ticker.as_str())
        );
        let mut request = HttpRequest::get(&url);
        if let Some(key) = &self.auth_key {
            request = request.with_header("authorization", key.as_str());
        }

        let body = self.context.fetch_body(SOURCE, symbol, request).await?;
        parse_response(&body)
            .map_err(|e| SourceError::parse(format!("{SOURCE} {}: {url}: {e}", symbol.ticker)))
    }
}

impl Scraper for YFinanceApiScraper {
    fn id(&self) -> SourceId {
        SOURCE
    }

    fn scrape<'a>(
        &'a self,
        symbol: &'a SymbolRecord,
    ) -> Pin<Box<dyn Future<Output = Result<ScrapeResult, SourceError>> + Send + 'a>> {
        Box::pin(self.fetch(symbol))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YFinanceResponse {
    latest_price: serde_json::Value,
    currency: String,
    timestamp: DateTime<Utc>,
}

fn parse_response(body: &str) -> Result<ScrapeResult, String> {
    let response: YFinanceResponse =
        serde_json::from_str(body).map_err(|e| format!("error parsing response body: {e}"))?;
    let price = json_decimal(&response.latest_price)
        .ok_or_else(|| format!("latestPrice is not a decimal: {}", response.latest_price))?;

    Ok(ScrapeResult {
        price,
        currency: response.currency,
        timestamp: response.timestamp,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rust_decimal_macros::dec;

    use super::*;
    use crate::http_client::HttpResponse;
    use crate::scrapers::test_support::{context, CannedHttpClient};
    use crate::store::Store;
    use crate::testing::MemoryStore;
    use crate::SourceErrorKind;

    const BODY: &str = r#"{"symbol":"MSFT","latestPrice":431.27,"currency":"USD","timestamp":"2025-12-23T21:00:00Z"}"#;

    #[tokio::test]
    async fn builds_url_from_base_and_sends_key() {
        let store = Arc::new(MemoryStore::default());
        let symbol = store.add_symbol("msft");
        store
            .upsert_scraping_source(SourceId::YFinanceApi, Some("https://yf.example.test/"))
            .expect("source");
        let http = Arc::new(
            CannedHttpClient::default().with(
                "https://yf.example.test/ticker/MSFT",
                HttpResponse::ok(BODY),
            ),
        );

        let result = YFinanceApiScraper::new(context(http.clone(), store), Some("secret".into()))
            .scrape(&symbol)
            .await
            .expect("scrape");

        assert_eq!(result.price, dec!(431.27));
        assert_eq!(result.currency, "USD");
        let requests = http.recorded_requests();
        assert_eq!(
            requests[0].headers.get("authorization").map(String::as_str),
            Some("secret")
        );
    }

    #[tokio::test]
    async fn empty_key_sends_no_authorization() {
        let store = Arc::new(MemoryStore::default());
        let symbol = store.add_symbol("MSFT");
        store
            .upsert_scraping_source(SourceId::YFinanceApi, Some("https://yf.example.test"))
            .expect("source");
        let http = Arc::new(
            CannedHttpClient::default().with(
                "https://yf.example.test/ticker/MSFT",
                HttpResponse::ok(BODY),
            ),
        );

        YFinanceApiScraper::new(context(http.clone(), store), Some(String::new()))
            .scrape(&symbol)
            .await
            .expect("scrape");
        assert!(!http.recorded_requests()[0]
            .headers
            .contains_key("authorization"));
    }

    #[tokio::test]
    async fn missing_scraping_source_is_not_found() {
        let store = Arc::new(MemoryStore::default());
        let symbol = store.add_symbol("MSFT");
        let http = Arc::new(CannedHttpClient::default());

        let error = YFinanceApiScraper::new(context(http, store), None)
            .scrape(&symbol)
            .await
            .expect_err("must fail");
        assert_eq!(error.kind(), SourceErrorKind::NotFound);
    }

    #[tokio::test]
    async fn transport_failure_names_the_url() {
        let store = Arc::new(MemoryStore::default());
        let symbol = store.add_symbol("MSFT");
        store
            .upsert_scraping_source(SourceId::YFinanceApi, Some("https://yf.example.test"))
            .expect("source");
        let http = Arc::new(
            CannedHttpClient::default()
                .failing("https://yf.example.test/ticker/MSFT", "connection refused"),
        );

        let error = YFinanceApiScraper::new(context(http, store), None)
            .scrape(&symbol)
            .await
            .expect_err("must fail");
        assert_eq!(error.kind(), SourceErrorKind::Network);
        assert!(error.message().contains("https://yf.example.test/ticker/MSFT"));
        assert!(error.message().contains("connection refused"));
    }
}
