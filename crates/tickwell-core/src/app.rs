//! Startup wiring: one explicitly constructed warehouse handle shared by
//! every component that needs it.

use std::sync::Arc;

use tickwell_warehouse::Warehouse;
use tracing::info;

use crate::cache::TieredCache;
use crate::config::AppConfig;
use crate::currency::CurrencyService;
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::quote_service::QuoteService;
use crate::registry::ScraperRegistry;
use crate::scraper_service::ScraperService;
use crate::scrapers::ScrapeContext;
use crate::store::{Store, WarehouseStore};
use crate::CoreError;

#[derive(Clone)]
pub struct AppContext {
    pub config: AppConfig,
    pub warehouse: Warehouse,
    pub store: Arc<dyn Store>,
    pub cache: Arc<TieredCache>,
    pub quotes: QuoteService,
    pub currency: CurrencyService,
    pub scraper: Arc<ScraperService>,
}

impl AppContext {
    /// Open the configured warehouse and build every service over it.
    pub fn open(config: AppConfig) -> Result<Self, CoreError> {
        let warehouse = Warehouse::open(config.warehouse.clone())?;
        info!(db_path = %config.warehouse.db_path.display(), "warehouse opened");
        let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new()?);
        Ok(Self::with_parts(config, warehouse, http))
    }

    /// Build every service over an existing warehouse and transport.
    pub fn with_parts(config: AppConfig, warehouse: Warehouse, http: Arc<dyn HttpClient>) -> Self {
        let store: Arc<dyn Store> =
            Arc::new(WarehouseStore::new(warehouse.clone(), config.freshness));
        let cache = Arc::new(TieredCache::new(
            Arc::new(warehouse.clone()),
            config.memory_cache,
        ));
        let quotes = QuoteService::new(store.clone(), cache.clone());

        let context = ScrapeContext::new(http, store.clone(), config.http_timeout_ms);
        let registry = Arc::new(ScraperRegistry::with_default_sources(
            context,
            config.yfinance_auth_key.clone(),
        ));
        let scraper = Arc::new(ScraperService::new(
            store.clone(),
            registry,
            quotes.clone(),
            config.failure_policy,
        ));

        Self {
            config,
            warehouse,
            store,
            cache,
            quotes,
            currency: CurrencyService::default(),
            scraper,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    use super::*;
    use crate::domain::{SourceId, Ticker};
    use crate::http_client::HttpResponse;
    use crate::scrapers::test_support::CannedHttpClient;

    const BORSE_URL: &str =
        "https://api.boerse-frankfurt.de/v1/data/price_information/single?isin=DE0005557508";

    #[tokio::test]
    async fn scrape_then_quote_through_the_warehouse() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = AppConfig::from_lookup(|name| match name {
            "TICKWELL_HOME" => Some(dir.path().display().to_string()),
            _ => None,
        })
        .expect("config");
        let warehouse = Warehouse::open(config.warehouse.clone()).expect("warehouse");
        let http = Arc::new(CannedHttpClient::default().with(
            BORSE_URL,
            HttpResponse::ok(
                r#"{"lastPrice":21.37,"timestampLastPrice":"2025-12-23T16:35:00+01:00",
                    "currency":{"originalValue":"EUR"}}"#,
            ),
        ));
        let app = AppContext::with_parts(config, warehouse, http);

        let ticker = Ticker::parse("dte").expect("ticker");
        let symbol = app.store.create_symbol(&ticker, Some("Deutsche Telekom")).expect("symbol");
        app.store
            .upsert_symbol_source(symbol.id, SourceId::BorseFrankfurt, Some(BORSE_URL))
            .expect("descriptor");

        let report = app.scraper.scrape_symbols().await.expect("report");
        assert_eq!(report.scraped, 1);
        assert!(report.failures.is_empty());

        let start = Utc.with_ymd_and_hms(2025, 12, 23, 0, 0, 0).single().expect("instant");
        let end = Utc.with_ymd_and_hms(2025, 12, 23, 23, 59, 59).single().expect("instant");
        let quote = app.quotes.get_quote("DTE", start, end).await.expect("quote");
        assert_eq!(quote.price.price, dec!(21.37));
        assert_eq!(quote.price.currency, "EUR");
        assert_eq!(quote.historical_prices.len(), 1);
        assert_eq!(quote.symbol.name, "Deutsche Telekom");

        let converted = app
            .currency
            .convert_quote_currency(quote, "DKK")
            .expect("converted");
        assert_eq!(converted.price.price, dec!(159.4202));

        let second = app.scraper.scrape_symbols().await.expect("report");
        assert_eq!(second.scraped, 0);
    }
}
