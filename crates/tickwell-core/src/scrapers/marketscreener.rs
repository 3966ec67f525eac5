use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::warn;

use super::{in_zone, json_decimal, ScrapeContext, Scraper, EXCHANGE_TZ};
use crate::domain::{ScrapeResult, SourceId, SymbolRecord};
use crate::http_client::HttpRequest;
use crate::SourceError;

const SOURCE: SourceId = SourceId::Marketscreener;

/// Marketscreener instrument pages, read through their JSON-LD block.
pub struct MarketscreenerScraper {
    context: ScrapeContext,
}

impl MarketscreenerScraper {
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
        let offer = parse_financial_product(&body)
            .map_err(|e| SourceError::parse(format!("{SOURCE} {}: {url}: {e}", symbol.ticker)))?;

        let timestamp = parse_timestamp(&offer.valid_from).unwrap_or_else(|e| {
            warn!(
                ticker = %symbol.ticker,
                valid_from = %offer.valid_from,
                error = %e,
                "failed to parse marketscreener timestamp, using now"
            );
            Utc::now()
        });

        Ok(ScrapeResult {
            price: offer.price,
            currency: offer.currency,
            timestamp,
        })
    }
}

impl Scraper for MarketscreenerScraper {
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

#[derive(Debug, PartialEq)]
struct Offer {
    price: Decimal,
    currency: String,
    valid_from: String,
}

/// Locate the first JSON-LD block typed `FinancialProduct` and read its offer.
fn parse_financial_product(html: &str) -> Result<Offer, String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(r#"script[type="application/ld+json"]"#)
        .map_err(|e| format!("invalid selector: {e:?}"))?;

    let product = document
        .select(&selector)
        .find_map(|element| {
            let content: String = element.text().collect();
            let value: Value = serde_json::from_str(content.trim()).ok()?;
            (value.get("@type").and_then(Value::as_str) == Some("FinancialProduct"))
                .then_some(value)
        })
        .ok_or_else(|| String::from("no FinancialProduct schema found"))?;

    let offers = product
        .get("offers")
        .ok_or_else(|| String::from("FinancialProduct has no offers"))?;
    let price = offers
        .get("price")
        .and_then(json_decimal)
        .ok_or_else(|| format!("invalid price format: {}", offers["price"]))?;
    let currency = offers
        .get("priceCurrency")
        .and_then(Value::as_str)
        .ok_or_else(|| String::from("offers.priceCurrency missing"))?;
    let valid_from = offers
        .get("validFrom")
        .and_then(Value::as_str)
        .unwrap_or_default();

    Ok(Offer {
        price,
        currency: currency.to_string(),
        valid_from: valid_from.to_string(),
    })
}

/// `2025-12-23CET16:35:02` style: the zone abbreviation separates date and time.
fn parse_timestamp(input: &str) -> Result<DateTime<Utc>, String> {
    let separator = if input.contains("CEST") { "CEST" } else { "CET" };
    let formatted = input.split(separator).collect::<Vec<_>>().join("T");

    let naive = NaiveDateTime::parse_from_str(&formatted, "%Y-%m-%dT%H:%M:%S").map_err(|e| {
        format!("error parsing timestamp. original={input}, formatted={formatted}: {e}")
    })?;
    in_zone(naive, &EXCHANGE_TZ)
        .ok_or_else(|| format!("{formatted} does not exist in {EXCHANGE_TZ}"))
}
