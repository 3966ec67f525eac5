//! # Tickwell Core
//!
//! Price scraping, tiered caching and quote assembly for tickwell.
//!
//! ## Overview
//!
//! - **Source adapters** fetch one market-data provider each and normalize
//!   its payload into a [`ScrapeResult`]
//! - **Source registry** maps stable source identifiers to adapters
//! - **Scraper service** runs scrape passes over every stale (symbol, source) pair
//! - **Tiered cache** keeps assembled quotes in memory and in the warehouse
//! - **Quote service** assembles quotes through the cache
//! - **Currency service** converts quotes between currencies
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`app`] | Startup wiring of every service |
//! | [`cache`] | Two-tier cache with expiry sweeps |
//! | [`config`] | Environment configuration |
//! | [`currency`] | Exchange rates and quote conversion |
//! | [`domain`] | Tickers, prices and quotes |
//! | [`error`] | Error taxonomy |
//! | [`http_client`] | HTTP transport seam |
//! | [`quote_service`] | Cached quote assembly |
//! | [`registry`] | Source identifier to adapter mapping |
//! | [`scraper_service`] | Scrape pass orchestration and triggers |
//! | [`scrapers`] | The six source adapters |
//! | [`store`] | Store contract and its warehouse implementation |
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Scraper Service │────▶│ Source Registry  │
//! └────────┬────────┘     └────────┬─────────┘
//!          │                       ▼
//!          │              ┌──────────────────┐     ┌─────────────┐
//!          │              │ Source Adapters  │────▶│ HTTP Client │
//!          │              └──────────────────┘     └─────────────┘
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Store           │◀────│ Quote Service    │
//! │ (warehouse)     │     └────────┬─────────┘
//! └─────────────────┘              ▼
//!                         ┌──────────────────┐
//!                         │ Tiered Cache     │
//!                         └──────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Adapters fail with a structured [`SourceError`]:
//!
//! ```rust
//! use tickwell_core::{SourceError, SourceErrorKind};
//!
//! fn describe(error: &SourceError) -> &'static str {
//!     match error.kind() {
//!         SourceErrorKind::Network => "source unreachable",
//!         SourceErrorKind::Parse => "payload changed shape",
//!         SourceErrorKind::UnknownSource => "no adapter registered",
//!         SourceErrorKind::NotFound => "symbol or descriptor missing",
//!         SourceErrorKind::Store => "store unavailable",
//!     }
//! }
//! ```

pub mod app;
pub mod cache;
pub mod config;
pub mod currency;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod quote_service;
pub mod registry;
pub mod scraper_service;
pub mod scrapers;
pub mod store;

#[cfg(test)]
mod testing;

pub use app::AppContext;
pub use cache::{spawn_sweeper, CacheBackend, TieredCache, SWEEP_INTERVAL};
pub use config::AppConfig;
pub use currency::{
    parse_currency_code, CurrencyService, ExchangeRateProvider, StaticExchangeRates,
};
pub use domain::{
    Price, Quote, ScrapeResult, ScrapingSource, SimplePrice, SourceDescriptor, SourceId,
    StaleSource, Symbol, SymbolRecord, Ticker,
};
pub use error::{
    CacheError, CoreError, ServiceError, SourceError, SourceErrorKind, StoreError,
    ValidationError,
};
pub use http_client::{HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient};
pub use quote_service::{
    end_of_day, parse_lookback, quote_cache_key, quote_cache_prefix, quote_range, QuoteService,
    QUOTE_CACHE_TTL,
};
pub use registry::ScraperRegistry;
pub use scraper_service::{
    FailurePolicy, ScrapeFailure, ScrapeReport, ScraperService, TriggerMode,
    FIRE_AND_FORGET_TIMEOUT,
};
pub use scrapers::{ScrapeContext, Scraper};
pub use store::{Store, WarehouseStore};
