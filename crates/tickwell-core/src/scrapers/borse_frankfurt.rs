use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{json_decimal, ScrapeContext, Scraper};
use crate::domain::{ScrapeResult, SourceId, SymbolRecord};
use crate::http_client::HttpRequest;
use crate::SourceError;

const SOURCE: SourceId = SourceId::BorseFrankfurt;

/// Börse Frankfurt price-information JSON endpoint.
pub struct BorseFrankfurtScraper {
    context: ScrapeContext,
}

impl BorseFrankfurtScraper {
    pub fn new(context: ScrapeContext) -> Self {
        Self { context }
    }

    async fn fetch(&self, symbol: &SymbolRecord) -> Result<ScrapeResult, SourceError> {
        let url = self.context.descriptor_url(SOURCE, symbol).await?;
        let body = self
            .context
            .fetch_body(SOURCE, symbol, HttpRequest::get(&url))
            .await?;
        parse_response(&body)
            .map_err(|e| SourceError::parse(format!("{SOURCE} {}: {url}: {e}", symbol.ticker)))
    }
}

impl Scraper for BorseFrankfurtScraper {
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
struct BorseFrankfurtResponse {
    last_price: serde_json::Value,
    timestamp_last_price: DateTime<Utc>,
    currency: BorseFrankfurtCurrency,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BorseFrankfurtCurrency {
    original_value: String,
}

fn parse_response(body: &str) -> Result<ScrapeResult, String> {
    let response: BorseFrankfurtResponse =
        serde_json::from_str(body).map_err(|e| format!("error parsing response body: {e}"))?;
    let price = json_decimal(&response.last_price)
        .ok_or_else(|| format!("lastPrice is not a decimal: {}", response.last_price))?;

    Ok(ScrapeResult {
        price,
        currency: response.currency.original_value,
        timestamp: response.timestamp_last_price,
    })
}
