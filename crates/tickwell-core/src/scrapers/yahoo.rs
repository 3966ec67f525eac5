use std::future::Future;
use std::pin::Pin;
use std::sync::LazyLock;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDateTime, Utc};
use regex::Regex;

use super::{clean_price, in_zone, ScrapeContext, Scraper, EXCHANGE_TZ};
use crate::domain::{ScrapeResult, SourceId, SymbolRecord};
use crate::http_client::HttpRequest;
use crate::SourceError;

const SOURCE: SourceId = SourceId::Yahoo;

static PRICE_SPAN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<span[^>]*data-testid="qsp-price"[^>]*>([^<]+)</span>"#).expect("valid regex")
});

static CURRENCY_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""currency"\s*:\s*"([^"]+)""#).expect("valid regex"));

/// Yahoo Finance quote pages, scraped from raw markup.
pub struct YahooScraper {
    context: ScrapeContext,
}

impl YahooScraper {
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
        parse_page(&body, Utc::now().year())
            .map_err(|e| SourceError::parse(format!("{SOURCE} {}: {url}: {e}", symbol.ticker)))
    }
}

impl Scraper for YahooScraper {
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

fn parse_page(body: &str, year: i32) -> Result<ScrapeResult, String> {
    let raw_price = PRICE_SPAN
        .captures(body)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().trim())
        .ok_or_else(|| String::from("couldn't find price span in page"))?;
    let currency = find_currency(body).ok_or_else(|| String::from("couldn't find currency in page"))?;
    let price = clean_price(raw_price, &currency)?;

    let close = body
        .find("At close:")
        .map(|index| &body[index + "At close:".len()..])
        .ok_or_else(|| String::from("couldn't find 'At close:' in page"))?;
    let close = close
        .find(['<', '"', '\n'])
        .map_or(close, |end| &close[..end]);
    let timestamp = parse_timestamp(close.trim(), year)?;

    Ok(ScrapeResult {
        price,
        currency,
        timestamp,
    })
}

/// The page embeds its quote metadata as JSON with varying levels of escaping.
fn find_currency(body: &str) -> Option<String> {
    let between = |start_marker: &str, end_marker: &str| -> Option<String> {
        let start = body.find(start_marker)? + start_marker.len();
        let end = body[start..].find(end_marker)?;
        Some(body[start..start + end].to_string()).filter(|currency| !currency.is_empty())
    };

    between(r#"\\"currency\\":""#, r#"""#)
        .or_else(|| between(r#"\"currency\":\""#, r#"\""#))
        .or_else(|| between(r#""currency":""#, r#"""#))
        .or_else(|| {
            CURRENCY_FIELD
                .captures(body)
                .and_then(|captures| captures.get(1))
                .map(|m| m.as_str().to_string())
        })
}

/// `December 19 at 5:00:00 PM GMT+1`; the year is not published.
fn parse_timestamp(input: &str, year: i32) -> Result<DateTime<Utc>, String> {
    const LAYOUT: &str = "%B %d at %I:%M:%S %p %Y";

    let (text, offset) = match input.rsplit_once(' ') {
        Some((rest, token)) if token.starts_with("GMT") => (rest.trim(), Some(gmt_offset(token)?)),
        _ => (input, None),
    };

    let with_year = format!("{text} {year}");
    let naive = NaiveDateTime::parse_from_str(&with_year, LAYOUT)
        .map_err(|e| format!("error parsing timestamp {with_year}: {e}"))?;
    let parsed = match offset {
        Some(offset) => in_zone(naive, &offset),
        None => in_zone(naive, &EXCHANGE_TZ),
    };
    parsed.ok_or_else(|| format!("timestamp {with_year} does not exist"))
}

/// `GMT`, `GMT+1`, `GMT-5`, `GMT+05:30`.
fn gmt_offset(token: &str) -> Result<FixedOffset, String> {
    let invalid = || format!("invalid timezone token {token}");
    let rest = token.strip_prefix("GMT").ok_or_else(invalid)?;
    if rest.is_empty() {
        return FixedOffset::east_opt(0).ok_or_else(invalid);
    }

    let (sign, value) = if let Some(value) = rest.strip_prefix('+') {
        (1, value)
    } else if let Some(value) = rest.strip_prefix('-') {
        (-1, value)
    } else {
        return Err(invalid());
    };
    let (hours, minutes) = value.split_once(':').unwrap_or((value, "0"));
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}
