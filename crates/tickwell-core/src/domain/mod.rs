//! # Domain Models
//!
//! Value types shared by the scrapers, the store contract and the services.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Ticker`] | Validated upper-case ticker |
//! | [`Symbol`] | Ticker plus display name, as shown in a quote |
//! | [`SymbolRecord`] | Stored symbol row with its id |
//! | [`SourceId`] | Identifier of an external price source |
//! | [`ScrapeResult`] | Canonical adapter output |
//! | [`Price`] | Latest price with opening and previous-close reference points |
//! | [`SimplePrice`] | One historical price point |
//! | [`Quote`] | Symbol, latest price and ordered history |
//! | [`SourceDescriptor`] | Per (symbol, source) scrape target and freshness |

mod price;
mod quote;
mod source;
mod symbol;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub use price::{Price, ScrapeResult, SimplePrice};
pub use quote::Quote;
pub use source::SourceId;
pub use symbol::{Symbol, SymbolRecord, Ticker};

/// Scrape target of one (symbol, source) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceDescriptor {
    pub symbol_id: i64,
    pub source_id: String,
    pub scrape_url: Option<String>,
    pub last_scraped: Option<DateTime<Utc>>,
}

/// Source-wide settings, such as the base URL of an API source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrapingSource {
    pub id: String,
    pub base_url: Option<String>,
}

/// A (symbol, source) pair due for scraping. The source id is kept raw so
/// unknown identifiers can be reported instead of silently dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleSource {
    pub symbol_id: i64,
    pub source_id: String,
}
