use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

use super::{clean_price, in_zone, ScrapeContext, Scraper, EXCHANGE_TZ};
use crate::domain::{ScrapeResult, SourceId, SymbolRecord};
use crate::http_client::HttpRequest;
use crate::SourceError;

const SOURCE: SourceId = SourceId::Nasdaq;

/// Nasdaq Nordic quote API addressed by a per-symbol URL.
pub struct NasdaqScraper {
    context: ScrapeContext,
}

impl NasdaqScraper {
    pub fn new(context: ScrapeContext) -> Self {
        Self { context }
    }

    async fn fetch(&self, symbol: &SymbolRecord) -> Result<ScrapeResult, SourceError> {
        let url = self.context.descriptor_url(SOURCE, symbol).await?;
        let body = self
            .context
            .fetch_body(
                SOURCE,
                symbol,
                HttpRequest::get(&url).with_browser_headers(),
            )
            .await?;
        parse_response(&body)
            .map_err(|e| SourceError::parse(format!("{SOURCE} {}: {url}: {e}", symbol.ticker)))
    }
}

impl Scraper for NasdaqScraper {
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
struct NasdaqResponse {
    data: NasdaqData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NasdaqData {
    qd_header: QdHeader,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QdHeader {
    currency: String,
    primary_data: PrimaryData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PrimaryData {
    last_sale_price: String,
    last_trade_timestamp: String,
}

fn parse_response(body: &str) -> Result<ScrapeResult, String> {
    let response: NasdaqResponse =
        serde_json::from_str(body).map_err(|e| format!("error parsing response: {e}"))?;
    let header = response.data.qd_header;

    let timestamp = parse_timestamp(&header.primary_data.last_trade_timestamp)?;
    let price = clean_price(&header.primary_data.last_sale_price, &header.currency)?;

    Ok(ScrapeResult {
        price,
        currency: header.currency,
        timestamp,
    })
}

/// Leading `YYYY-MM-DD HH:MM:SS` of the trade timestamp, in exchange time.
fn parse_timestamp(input: &str) -> Result<DateTime<Utc>, String> {
    let formatted = input
        .get(..19)
        .ok_or_else(|| format!("timestamp '{input}' is too short"))?;
    let naive = NaiveDateTime::parse_from_str(formatted, "%Y-%m-%d %H:%M:%S").map_err(|e| {
        format!("error parsing timestamp. original={input}, formatted={formatted}: {e}")
    })?;
    in_zone(naive, &EXCHANGE_TZ)
        .ok_or_else(|| format!("{formatted} does not exist in {EXCHANGE_TZ}"))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::http_client::HttpResponse;
    use crate::scrapers::test_support::{context, CannedHttpClient};
    use crate::testing::MemoryStore;

    const URL: &str = "https://api.nasdaq.com/api/nordic/instruments/SSE101/summary";

    #[test]
    fn timestamp_uses_first_nineteen_chars_in_exchange_time() {
        let parsed = parse_timestamp("2025-12-23 17:29:59.123 +0100").expect("timestamp");
        assert_eq!(
            parsed,
            Utc.with_ymd_and_hms(2025, 12, 23, 16, 29, 59).single().expect("instant")
        );
    }

    #[test]
    fn short_timestamp_is_rejected() {
        assert!(parse_timestamp("2025-12-23").is_err());
    }

    #[tokio::test]
    async fn scrape_strips_currency_from_price() {
        let store = Arc::new(MemoryStore::default());
        let symbol = store.add_symbol("NOVO-B");
        store.add_descriptor(symbol.id, "NASDAQ", Some(URL));
        let body = r#"{"data":{"qdHeader":{"symbol":"NOVO B","currency":"DKK",
            "primaryData":{"lastSalePrice":"DKK 1,234.50","lastTradeTimestamp":"2025-07-01 10:00:00"}}}}"#;
        let http = Arc::new(CannedHttpClient::default().with(URL, HttpResponse::ok(body)));

        let result = NasdaqScraper::new(context(http, store))
            .scrape(&symbol)
            .await
            .expect("scrape");

        assert_eq!(result.price, dec!(1234.50));
        assert_eq!(result.currency, "DKK");
        assert_eq!(
            result.timestamp,
            Utc.with_ymd_and_hms(2025, 7, 1, 8, 0, 0).single().expect("instant")
        );
    }
}
