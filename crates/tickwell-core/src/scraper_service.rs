//! Scrape pass orchestration.
//!
//! A pass reads every (symbol, source) pair outside the freshness window,
//! groups the pairs by source in order of first appearance and scrapes each
//! group sequentially through the adapter resolved from the registry.

use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::domain::{StaleSource, Ticker};
use crate::quote_service::QuoteService;
use crate::registry::ScraperRegistry;
use crate::scrapers::Scraper;
use crate::store::{self, Store};
use crate::{ServiceError, SourceError, ValidationError};

/// Ceiling for a pass started in fire-and-forget mode.
pub const FIRE_AND_FORGET_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// What a failing (symbol, source) pair does to the rest of the pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Abort the remaining symbols of the group and every later group.
    FailFast,
    /// Record the failure and continue with the next pair.
    #[default]
    Isolate,
}

impl FailurePolicy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FailFast => "fail-fast",
            Self::Isolate => "isolate",
        }
    }
}

impl Display for FailurePolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailurePolicy {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fail-fast" | "fail_fast" | "failfast" => Ok(Self::FailFast),
            "isolate" => Ok(Self::Isolate),
            _ => Err(ValidationError::InvalidSetting {
                name: "TICKWELL_FAILURE_POLICY",
                value: value.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerMode {
    /// Await the pass under the caller's cancellation.
    Synchronous,
    /// Detach the pass from the caller; it runs under its own timeout.
    FireAndForget,
}

/// One (symbol, source) pair, or a whole source group, that failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrapeFailure {
    pub source_id: String,
    /// `None` when the whole group failed before any symbol was attempted.
    pub symbol_id: Option<i64>,
    pub ticker: Option<String>,
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrapeReport {
    pub run_id: Uuid,
    pub scraped: usize,
    pub failures: Vec<ScrapeFailure>,
}

impl ScrapeReport {
    fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            scraped: 0,
            failures: Vec::new(),
        }
    }
}

struct PairError {
    ticker: Option<Ticker>,
    error: SourceError,
}

impl PairError {
    fn new(ticker: Option<&Ticker>, error: SourceError) -> Self {
        Self {
            ticker: ticker.cloned(),
            error,
        }
    }
}

pub struct ScraperService {
    store: Arc<dyn Store>,
    registry: Arc<ScraperRegistry>,
    quotes: QuoteService,
    policy: FailurePolicy,
    background_timeout: Duration,
}

impl ScraperService {
    pub fn new(
        store: Arc<dyn Store>,
        registry: Arc<ScraperRegistry>,
        quotes: QuoteService,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            store,
            registry,
            quotes,
            policy,
            background_timeout: FIRE_AND_FORGET_TIMEOUT,
        }
    }

    pub fn with_background_timeout(mut self, timeout: Duration) -> Self {
        self.background_timeout = timeout;
        self
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Run one scrape pass over every stale (symbol, source) pair.
    ///
    /// Under [`FailurePolicy::FailFast`] the first failure is returned as
    /// [`ServiceError::ScrapeAborted`]; prices persisted before it are kept.
    pub async fn scrape_symbols(&self) -> Result<ScrapeReport, ServiceError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("scrape_pass", %run_id, policy = %self.policy);
        self.run_pass(run_id).instrument(span).await
    }

    async fn run_pass(&self, run_id: Uuid) -> Result<ScrapeReport, ServiceError> {
        let stale =
            store::blocking(&self.store, |store| store.sources_not_scraped_recently()).await?;
        info!(pairs = stale.len(), "starting scrape pass");

        let mut report = ScrapeReport::new(run_id);
        for (source_id, symbol_ids) in group_by_source(stale) {
            let scraper = match self.registry.resolve(&source_id) {
                Ok(scraper) => scraper,
                Err(error) => {
                    let first_symbol = symbol_ids.first().copied().unwrap_or_default();
                    self.record(&mut report, &source_id, first_symbol, None, error, true)?;
                    continue;
                }
            };

            for symbol_id in symbol_ids {
                match self.scrape_pair(scraper.as_ref(), symbol_id).await {
                    Ok(()) => report.scraped += 1,
                    Err(failure) => self.record(
                        &mut report,
                        &source_id,
                        symbol_id,
                        failure.ticker,
                        failure.error,
                        false,
                    )?,
                }
            }
        }

        info!(
            scraped = report.scraped,
            failed = report.failures.len(),
            "scrape pass finished"
        );
        Ok(report)
    }

    async fn scrape_pair(&self, scraper: &dyn Scraper, symbol_id: i64) -> Result<(), PairError> {
        let symbol = store::blocking(&self.store, move |store| store.symbol_by_id(symbol_id))
            .await
            .map_err(|e| PairError::new(None, SourceError::from(e)))?;
        let ticker = &symbol.ticker;

        let result = scraper
            .scrape(&symbol)
            .await
            .map_err(|e| PairError::new(Some(ticker), e))?;

        let (symbol_id, source_id) = (symbol.id, scraper.id());
        let row = result.clone();
        store::blocking(&self.store, move |store| {
            store.insert_price(symbol_id, row.price, &row.currency, row.timestamp)
        })
        .await
        .map_err(|e| {
            PairError::new(
                Some(ticker),
                SourceError::store(format!("{source_id} {ticker}: error inserting price: {e}")),
            )
        })?;
        info!(
            %ticker,
            source = %scraper.id(),
            price = %result.price,
            currency = %result.currency,
            timestamp = %result.timestamp,
            "scraped price"
        );

        let scraped_at = Utc::now();
        if let Err(error) = store::blocking(&self.store, move |store| {
            store.update_last_scraped(symbol_id, source_id, scraped_at)
        })
        .await
        {
            warn!(%ticker, source = %scraper.id(), %error, "error updating last scraped");
        }
        if let Err(error) = self.quotes.clear_cache(ticker).await {
            warn!(%ticker, %error, "error clearing cached quotes");
        }
        Ok(())
    }

    fn record(
        &self,
        report: &mut ScrapeReport,
        source_id: &str,
        symbol_id: i64,
        ticker: Option<Ticker>,
        error: SourceError,
        whole_group: bool,
    ) -> Result<(), ServiceError> {
        error!(
            source = source_id,
            symbol_id,
            ticker = ticker.as_ref().map(Ticker::as_str),
            code = error.code(),
            error = %error.message(),
            "scrape failed"
        );

        if self.policy == FailurePolicy::FailFast {
            return Err(ServiceError::ScrapeAborted {
                source_id: source_id.to_string(),
                symbol_id,
                error,
            });
        }

        report.failures.push(ScrapeFailure {
            source_id: source_id.to_string(),
            symbol_id: (!whole_group).then_some(symbol_id),
            ticker: ticker.map(|t| t.as_str().to_string()),
            code: error.code(),
            message: error.message().to_string(),
        });
        Ok(())
    }

    /// Start a pass in `mode`.
    ///
    /// Outcomes are logged, never returned. Fire-and-forget hands back the
    /// detached task so callers that care can await it.
    pub async fn trigger(self: &Arc<Self>, mode: TriggerMode) -> Option<JoinHandle<()>> {
        match mode {
            TriggerMode::Synchronous => {
                log_outcome(&self.scrape_symbols().await);
                None
            }
            TriggerMode::FireAndForget => {
                let service = Arc::clone(self);
                Some(tokio::spawn(async move {
                    let limit = service.background_timeout;
                    match tokio::time::timeout(limit, service.scrape_symbols()).await {
                        Ok(outcome) => log_outcome(&outcome),
                        Err(_) => error!(
                            timeout_secs = limit.as_secs_f64(),
                            "background scrape pass timed out"
                        ),
                    }
                }))
            }
        }
    }
}

fn log_outcome(outcome: &Result<ScrapeReport, ServiceError>) {
    match outcome {
        Ok(report) if report.failures.is_empty() => {
            info!(run_id = %report.run_id, scraped = report.scraped, "scrape pass succeeded");
        }
        Ok(report) => warn!(
            run_id = %report.run_id,
            scraped = report.scraped,
            failed = report.failures.len(),
            "scrape pass finished with failures"
        ),
        Err(error) => error!(%error, "scrape pass failed"),
    }
}

/// Group pairs by source id, keeping the order in which sources first appear.
fn group_by_source(stale: Vec<StaleSource>) -> Vec<(String, Vec<i64>)> {
    let mut groups: Vec<(String, Vec<i64>)> = Vec::new();
    for pair in stale {
        match groups.iter_mut().find(|(source, _)| *source == pair.source_id) {
            Some((_, symbols)) => symbols.push(pair.symbol_id),
            None => groups.push((pair.source_id, vec![pair.symbol_id])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use tickwell_warehouse::Warehouse;

    use super::*;
    use crate::cache::TieredCache;
    use crate::domain::{ScrapeResult, SourceId, SymbolRecord};
    use crate::testing::MemoryStore;

    struct StubScraper {
        id: SourceId,
        failing: Vec<&'static str>,
        delay: Option<Duration>,
        calls: Mutex<Vec<String>>,
    }

    impl StubScraper {
        fn new(id: SourceId) -> Self {
            Self {
                id,
                failing: Vec::new(),
                delay: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing_on(mut self, ticker: &'static str) -> Self {
            self.failing.push(ticker);
            self
        }

        fn slow(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("calls").clone()
        }
    }

    impl Scraper for StubScraper {
        fn id(&self) -> SourceId {
            self.id
        }

        fn scrape<'a>(
            &'a self,
            symbol: &'a SymbolRecord,
        ) -> Pin<Box<dyn Future<Output = Result<ScrapeResult, SourceError>> + Send + 'a>> {
            Box::pin(async move {
                if let Some(delay) = self.delay {
                    tokio::time::sleep(delay).await;
                }
                let ticker = symbol.ticker.as_str();
                self.calls.lock().expect("calls").push(ticker.to_string());
                if self.failing.contains(&ticker) {
                    return Err(SourceError::network(format!(
                        "{} {ticker}: responded with status 503",
                        self.id
                    )));
                }
                Ok(ScrapeResult {
                    price: dec!(101.5),
                    currency: String::from("DKK"),
                    timestamp: Utc
                        .with_ymd_and_hms(2025, 12, 23, 16, 0, 0)
                        .single()
                        .expect("instant"),
                })
            })
        }
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        quotes: QuoteService,
        yahoo: Arc<StubScraper>,
        nasdaq: Arc<StubScraper>,
    }

    impl Fixture {
        fn new(yahoo: StubScraper) -> Self {
            let warehouse = Warehouse::open_in_memory().expect("warehouse");
            let store = Arc::new(MemoryStore::default());
            let cache = Arc::new(TieredCache::new(Arc::new(warehouse), true));
            Self {
                quotes: QuoteService::new(store.clone(), cache),
                store,
                yahoo: Arc::new(yahoo),
                nasdaq: Arc::new(StubScraper::new(SourceId::Nasdaq)),
            }
        }

        fn service(&self, policy: FailurePolicy) -> ScraperService {
            let registry = ScraperRegistry::new()
                .register(self.yahoo.clone())
                .register(self.nasdaq.clone());
            ScraperService::new(
                self.store.clone(),
                Arc::new(registry),
                self.quotes.clone(),
                policy,
            )
        }

        /// AAA and BBB on Yahoo, CCC on Nasdaq, in that order.
        fn seed_two_groups(&self) -> [SymbolRecord; 3] {
            let a = self.store.add_symbol("AAA");
            let b = self.store.add_symbol("BBB");
            let c = self.store.add_symbol("CCC");
            self.store.add_descriptor(a.id, "YAHOO", Some("https://a"));
            self.store.add_descriptor(b.id, "YAHOO", Some("https://b"));
            self.store.add_descriptor(c.id, "NASDAQ", Some("https://c"));
            [a, b, c]
        }
    }

    #[tokio::test]
    async fn fail_fast_keeps_earlier_success_and_skips_later_groups() {
        let fixture = Fixture::new(StubScraper::new(SourceId::Yahoo).failing_on("BBB"));
        let [a, b, c] = fixture.seed_two_groups();

        let error = fixture
            .service(FailurePolicy::FailFast)
            .scrape_symbols()
            .await
            .expect_err("must abort");

        match error {
            ServiceError::ScrapeAborted {
                source_id,
                symbol_id,
                error,
            } => {
                assert_eq!(source_id, "YAHOO");
                assert_eq!(symbol_id, b.id);
                assert_eq!(error.code(), "source.network");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(fixture.store.prices_for(a.id).len(), 1);
        assert!(fixture.store.last_scraped(a.id, "YAHOO").is_some());
        assert!(fixture.store.prices_for(b.id).is_empty());
        assert!(fixture.store.prices_for(c.id).is_empty());
        assert!(fixture.nasdaq.calls().is_empty());
    }

    #[tokio::test]
    async fn isolate_records_failure_and_continues() {
        let fixture = Fixture::new(StubScraper::new(SourceId::Yahoo).failing_on("BBB"));
        let [a, b, c] = fixture.seed_two_groups();

        let report = fixture
            .service(FailurePolicy::Isolate)
            .scrape_symbols()
            .await
            .expect("report");

        assert_eq!(report.scraped, 2);
        assert_eq!(report.failures.len(), 1);
        let failure = &report.failures[0];
        assert_eq!(failure.source_id, "YAHOO");
        assert_eq!(failure.symbol_id, Some(b.id));
        assert_eq!(failure.ticker.as_deref(), Some("BBB"));
        assert_eq!(failure.code, "source.network");

        assert_eq!(fixture.store.prices_for(a.id).len(), 1);
        assert_eq!(fixture.store.prices_for(c.id).len(), 1);
        assert!(fixture.store.last_scraped(b.id, "YAHOO").is_none());
        assert_eq!(fixture.yahoo.calls(), vec!["AAA", "BBB"]);
        assert_eq!(fixture.nasdaq.calls(), vec!["CCC"]);
    }

    #[tokio::test]
    async fn unknown_source_fails_its_group_only() {
        let fixture = Fixture::new(StubScraper::new(SourceId::Yahoo));
        let a = fixture.store.add_symbol("AAA");
        let b = fixture.store.add_symbol("BBB");
        fixture.store.add_descriptor(a.id, "BLOOMBERG", Some("https://x"));
        fixture.store.add_descriptor(b.id, "YAHOO", Some("https://b"));

        let report = fixture
            .service(FailurePolicy::Isolate)
            .scrape_symbols()
            .await
            .expect("report");

        assert_eq!(report.scraped, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].source_id, "BLOOMBERG");
        assert_eq!(report.failures[0].symbol_id, None);
        assert_eq!(report.failures[0].code, "source.unknown_source");
        assert_eq!(fixture.store.prices_for(b.id).len(), 1);
    }

    #[tokio::test]
    async fn unknown_source_aborts_under_fail_fast() {
        let fixture = Fixture::new(StubScraper::new(SourceId::Yahoo));
        let a = fixture.store.add_symbol("AAA");
        let b = fixture.store.add_symbol("BBB");
        fixture.store.add_descriptor(a.id, "BLOOMBERG", None);
        fixture.store.add_descriptor(b.id, "YAHOO", Some("https://b"));

        let error = fixture
            .service(FailurePolicy::FailFast)
            .scrape_symbols()
            .await
            .expect_err("must abort");

        assert!(matches!(error, ServiceError::ScrapeAborted { ref source_id, .. } if source_id == "BLOOMBERG"));
        assert!(fixture.yahoo.calls().is_empty());
    }

    #[tokio::test]
    async fn bookkeeping_failure_is_not_fatal() {
        let fixture = Fixture::new(StubScraper::new(SourceId::Yahoo));
        let a = fixture.store.add_symbol("AAA");
        fixture.store.add_descriptor(a.id, "YAHOO", Some("https://a"));
        fixture
            .store
            .fail_last_scraped
            .store(true, std::sync::atomic::Ordering::SeqCst);

        let report = fixture
            .service(FailurePolicy::FailFast)
            .scrape_symbols()
            .await
            .expect("report");

        assert_eq!(report.scraped, 1);
        assert!(report.failures.is_empty());
        assert_eq!(fixture.store.prices_for(a.id)[0].price, dec!(101.5));
    }

    #[tokio::test]
    async fn successful_scrape_invalidates_cached_quotes_of_that_ticker() {
        let fixture = Fixture::new(StubScraper::new(SourceId::Yahoo));
        let a = fixture.store.add_symbol("AAA");
        fixture.store.add_descriptor(a.id, "YAHOO", Some("https://a"));
        let cache = fixture.quotes.cache().clone();
        let ttl = Duration::from_secs(60);
        cache.put("QUOTE:AAA:1:2", String::from("{}"), ttl).await.expect("put");
        cache.put("QUOTE:AAAB:1:2", String::from("{}"), ttl).await.expect("put");

        fixture
            .service(FailurePolicy::Isolate)
            .scrape_symbols()
            .await
            .expect("report");

        assert_eq!(cache.get("QUOTE:AAA:1:2").await.expect("get"), None);
        assert!(cache.get("QUOTE:AAAB:1:2").await.expect("get").is_some());
    }

    #[tokio::test]
    async fn empty_pass_reports_nothing() {
        let fixture = Fixture::new(StubScraper::new(SourceId::Yahoo));
        let report = fixture
            .service(FailurePolicy::Isolate)
            .scrape_symbols()
            .await
            .expect("report");
        assert_eq!(report.scraped, 0);
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn synchronous_trigger_completes_before_returning() {
        let fixture = Fixture::new(StubScraper::new(SourceId::Yahoo));
        let a = fixture.store.add_symbol("AAA");
        fixture.store.add_descriptor(a.id, "YAHOO", Some("https://a"));

        let service = Arc::new(fixture.service(FailurePolicy::Isolate));
        assert!(service.trigger(TriggerMode::Synchronous).await.is_none());
        assert_eq!(fixture.store.prices_for(a.id).len(), 1);
    }

    #[tokio::test]
    async fn fire_and_forget_runs_detached() {
        let fixture = Fixture::new(StubScraper::new(SourceId::Yahoo));
        let a = fixture.store.add_symbol("AAA");
        fixture.store.add_descriptor(a.id, "YAHOO", Some("https://a"));

        let service = Arc::new(fixture.service(FailurePolicy::Isolate));
        let handle = service
            .trigger(TriggerMode::FireAndForget)
            .await
            .expect("background task");
        drop(service);
        handle.await.expect("task");

        assert_eq!(fixture.store.prices_for(a.id).len(), 1);
    }

    #[tokio::test]
    async fn fire_and_forget_gives_up_at_its_ceiling() {
        let fixture = Fixture::new(
            StubScraper::new(SourceId::Yahoo).slow(Duration::from_secs(30)),
        );
        let a = fixture.store.add_symbol("AAA");
        fixture.store.add_descriptor(a.id, "YAHOO", Some("https://a"));

        let service = Arc::new(
            fixture
                .service(FailurePolicy::Isolate)
                .with_background_timeout(Duration::from_millis(20)),
        );
        let handle = service
            .trigger(TriggerMode::FireAndForget)
            .await
            .expect("background task");
        handle.await.expect("task");

        assert!(fixture.store.prices_for(a.id).is_empty());
    }

    #[test]
    fn groups_keep_first_appearance_order() {
        let pair = |symbol_id, source: &str| StaleSource {
            symbol_id,
            source_id: source.to_string(),
        };
        let groups = group_by_source(vec![
            pair(3, "NASDAQ"),
            pair(1, "YAHOO"),
            pair(2, "NASDAQ"),
            pair(4, "BORSFRA"),
        ]);
        assert_eq!(
            groups,
            vec![
                (String::from("NASDAQ"), vec![3, 2]),
                (String::from("YAHOO"), vec![1]),
                (String::from("BORSFRA"), vec![4]),
            ]
        );
    }

    #[test]
    fn failure_policy_parses_and_defaults_to_isolate() {
        assert_eq!(FailurePolicy::default(), FailurePolicy::Isolate);
        assert_eq!("fail-fast".parse::<FailurePolicy>(), Ok(FailurePolicy::FailFast));
        assert_eq!(" Isolate ".parse::<FailurePolicy>(), Ok(FailurePolicy::Isolate));
        assert!("retry".parse::<FailurePolicy>().is_err());
        assert_eq!(FailurePolicy::FailFast.to_string(), "fail-fast");
    }

    #[test]
    fn report_serializes_for_the_cli() {
        let report = ScrapeReport {
            run_id: Uuid::nil(),
            scraped: 1,
            failures: vec![ScrapeFailure {
                source_id: String::from("YAHOO"),
                symbol_id: Some(2),
                ticker: Some(String::from("BBB")),
                code: "source.parse",
                message: String::from("couldn't find price span"),
            }],
        };
        let json = serde_json::to_value(&report).expect("json");
        assert_eq!(json["run_id"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(json["failures"][0]["code"], "source.parse");
    }
}
