use std::fmt::{Display, Formatter};

use thiserror::Error;
use tickwell_warehouse::WarehouseError;

use crate::http_client::HttpError;

/// Validation failures for user- or config-supplied values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("ticker must not be empty")]
    EmptyTicker,

    #[error("ticker length {len} exceeds max {max}")]
    TickerTooLong { len: usize, max: usize },

    #[error("invalid character '{ch}' at index {index} in ticker")]
    TickerInvalidChar { ch: char, index: usize },

    #[error("currency code '{value}' must be three ASCII letters")]
    InvalidCurrency { value: String },

    #[error("unknown scraping source identifier '{value}'")]
    UnknownSourceId { value: String },

    #[error("invalid value '{value}' for {name}")]
    InvalidSetting { name: &'static str, value: String },
}

/// Classification of a scrape failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    /// Transport failure or unexpected HTTP status.
    Network,
    /// Malformed payload, missing field or unparsable token.
    Parse,
    /// No scraper registered for the identifier.
    UnknownSource,
    /// Missing symbol or scrape descriptor.
    NotFound,
    /// Store collaborator failure while resolving the fetch target.
    Store,
}

/// Structured scrape error carrying the source, ticker and URL context in its message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
}

impl SourceError {
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Network,
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Parse,
            message: message.into(),
        }
    }

    pub fn unknown_source(source_id: &str) -> Self {
        Self {
            kind: SourceErrorKind::UnknownSource,
            message: format!("no scraper registered for source '{source_id}'"),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::NotFound,
            message: message.into(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Store,
            message: message.into(),
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::Network => "source.network",
            SourceErrorKind::Parse => "source.parse",
            SourceErrorKind::UnknownSource => "source.unknown_source",
            SourceErrorKind::NotFound => "source.not_found",
            SourceErrorKind::Store => "source.store",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

impl From<StoreError> for SourceError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(message) => Self::not_found(message),
            other => Self::store(other.to_string()),
        }
    }
}

/// Failures of the persisted store collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    NotFound(String),

    #[error("stored row is invalid: {0}")]
    InvalidRow(String),

    #[error(transparent)]
    Backend(#[from] WarehouseError),

    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Failures of the tiered cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend failure: {0}")]
    Backend(#[from] WarehouseError),

    #[error("cache task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("cache payload could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures surfaced by the scraper, quote and currency services.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("scrape pass aborted at source '{source_id}' symbol {symbol_id}: {error}")]
    ScrapeAborted {
        source_id: String,
        symbol_id: i64,
        error: SourceError,
    },

    #[error("exchange rate not found for {from} to {to}")]
    RateNotFound { from: String, to: String },

    #[error("price in {found} does not match quote currency {expected}")]
    CurrencyMismatch { expected: String, found: String },
}

/// Startup failures while wiring the application together.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error("http client could not be built: {0}")]
    Http(#[from] HttpError),
}
