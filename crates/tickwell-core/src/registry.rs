use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::SourceId;
use crate::scrapers::{
    BorseFrankfurtScraper, MarketscreenerScraper, NasdaqEuScraper, NasdaqScraper, ScrapeContext,
    Scraper, YFinanceApiScraper, YahooScraper,
};
use crate::SourceError;

/// Static mapping from source identifier to its adapter.
///
/// Adding a source means registering one more adapter. Identifiers without a
/// registered adapter resolve to [`SourceErrorKind::UnknownSource`](crate::SourceErrorKind).
#[derive(Default)]
pub struct ScraperRegistry {
    scrapers: HashMap<SourceId, Arc<dyn Scraper>>,
}

impl ScraperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All six production adapters sharing one context.
    pub fn with_default_sources(context: ScrapeContext, yfinance_auth_key: Option<String>) -> Self {
        Self::new()
            .register(Arc::new(BorseFrankfurtScraper::new(context.clone())))
            .register(Arc::new(MarketscreenerScraper::new(context.clone())))
            .register(Arc::new(NasdaqScraper::new(context.clone())))
            .register(Arc::new(NasdaqEuScraper::new(context.clone())))
            .register(Arc::new(YahooScraper::new(context.clone())))
            .register(Arc::new(YFinanceApiScraper::new(context, yfinance_auth_key)))
    }

    /// Register `scraper` under its own identifier, replacing any previous one.
    pub fn register(mut self, scraper: Arc<dyn Scraper>) -> Self {
        self.scrapers.insert(scraper.id(), scraper);
        self
    }

    pub fn resolve(&self, source_id: &str) -> Result<Arc<dyn Scraper>, SourceError> {
        source_id
            .parse::<SourceId>()
            .ok()
            .and_then(|id| self.scrapers.get(&id).cloned())
            .ok_or_else(|| SourceError::unknown_source(source_id))
    }

    pub fn ids(&self) -> Vec<SourceId> {
        SourceId::ALL
            .into_iter()
            .filter(|id| self.scrapers.contains_key(id))
            .collect()
    }
}
