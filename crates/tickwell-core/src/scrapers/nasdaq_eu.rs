use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use reqwest::Url;
use serde::Deserialize;

use super::{clean_price, in_zone, ScrapeContext, Scraper, EXCHANGE_TZ};
use crate::domain::{ScrapeResult, SourceId, SymbolRecord};
use crate::http_client::HttpRequest;
use crate::SourceError;

const SOURCE: SourceId = SourceId::NasdaqEu;
const FUNDS_PAGE_BASE: &str = "https://www.nasdaq.com/european-market-activity/funds";
const SITE_ROOT: &str = "https://www.nasdaq.com";
const LISTING_API: &str = "https://api.nasdaq.com/api/nordic/listing";

/// Nasdaq European funds: the fund page redirects to a URL carrying the
/// instrument id, which then addresses the listing API.
pub struct NasdaqEuScraper {
    context: ScrapeContext,
}

impl NasdaqEuScraper {
    pub fn new(context: ScrapeContext) -> Self {
        Self { context }
    }

    async fn fetch(&self, symbol: &SymbolRecord) -> Result<ScrapeResult, SourceError> {
        let page_url = funds_page_url(symbol);
        let response = self
            .context
            .send(
                SOURCE,
                symbol,
                HttpRequest::get(&page_url)
                    .with_browser_headers()
                    .without_redirects(),
            )
            .await?;

        let location = response.header("location").ok_or_else(|| {
            SourceError::network(format!(
                "{SOURCE} {}: no Location header in response from {page_url} (status {})",
                symbol.ticker, response.status
            ))
        })?;
        let instrument_id = instrument_id(location)
            .map_err(|e| SourceError::parse(format!("{SOURCE} {}: {e}", symbol.ticker)))?;

        let api_url = listing_url(&instrument_id);
        let body = self
            .context
            .fetch_body(
                SOURCE,
                symbol,
                HttpRequest::get(&api_url)
                    .with_browser_headers()
                    .with_header("accept", "application/json, text/plain, */*"),
            )
            .await?;
        parse_listing(&body).map_err(|e| {
            SourceError::parse(format!("{SOURCE} {}: {api_url}: {e}", symbol.ticker))
        })
    }
}

impl Scraper for NasdaqEuScraper {
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

fn funds_page_url(symbol: &SymbolRecord) -> String {
    format!(
        "{FUNDS_PAGE_BASE}/{}",
        urlencoding::encode(symbol.ticker.as_str())
    )
}

fn listing_url(instrument_id: &str) -> String {
    format!(
        "{LISTING_API}?instrumentIds={}&type=CARD_VIEW",
        urlencoding::encode(instrument_id)
    )
}

/// `id` query parameter of a possibly relative redirect target.
fn instrument_id(location: &str) -> Result<String, String> {
    let url = match Url::parse(location) {
        Ok(url) => url,
        Err(_) => Url::parse(SITE_ROOT)
            .and_then(|root| root.join(location))
            .map_err(|e| format!("error parsing Location header {location}: {e}"))?,
    };
    url.query_pairs()
        .find(|(key, _)| key == "id")
        .map(|(_, value)| value.into_owned())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| format!("no id query param in Location header {url}"))
}

#[derive(Debug, Deserialize)]
struct ListingResponse {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListingData {
    data_as_of: String,
    #[serde(default)]
    card_view: Vec<CardView>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CardView {
    currency: String,
    last_sale_price: String,
}

fn parse_listing(body: &str) -> Result<ScrapeResult, String> {
    let response: ListingResponse =
        serde_json::from_str(body).map_err(|e| format!("error parsing response: {e}"))?;
    let card = response
        .data
        .card_view
        .into_iter()
        .next()
        .ok_or_else(|| String::from("no card view items in api response"))?;

    let price = clean_price(&card.last_sale_price, &card.currency)?;
    let timestamp = parse_timestamp(&response.data.data_as_of)?;

    Ok(ScrapeResult {
        price,
        currency: card.currency,
        timestamp,
    })
}

/// `Dec 24, 2025 10:09 CET`. Known abbreviations map to fixed offsets; any
/// other trailing token is dropped and the rest read in exchange time.
fn parse_timestamp(input: &str) -> Result<DateTime<Utc>, String> {
    const LAYOUT: &str = "%b %d, %Y %H:%M";

    let trimmed = input.trim();
    let (rest, zone) = trimmed
        .rsplit_once(' ')
        .ok_or_else(|| format!("error parsing dataAsOf timestamp {input}"))?;

    let offset_hours = match zone {
        "CET" => Some(1),
        "CEST" => Some(2),
        "UTC" | "GMT" => Some(0),
        _ => None,
    };

    let naive = NaiveDateTime::parse_from_str(rest, LAYOUT)
        .map_err(|e| format!("error parsing dataAsOf timestamp {input}: {e}"))?;
    let parsed = match offset_hours.and_then(|hours| FixedOffset::east_opt(hours * 3600)) {
        Some(offset) => in_zone(naive, &offset),
        None => in_zone(naive, &EXCHANGE_TZ),
    };
    parsed.ok_or_else(|| format!("dataAsOf timestamp {input} does not exist"))
}
