use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tickwell_core::{parse_currency_code, quote_range, Quote, TriggerMode};
use tracing::{info, warn};

use crate::{ApiError, AppState};

#[derive(Debug, Serialize)]
pub struct StatusBody {
    pub status: &'static str,
}

/// GET /health
pub async fn health() -> Json<StatusBody> {
    Json(StatusBody { status: "ok" })
}

#[derive(Debug, Deserialize)]
pub struct JobQuery {
    #[serde(rename = "fireAndForget")]
    fire_and_forget: Option<String>,
}

/// POST /api/job
///
/// A failing pass is logged, not reported: only authorization failures
/// produce a non-success status.
pub async fn trigger_job(
    State(state): State<AppState>,
    Query(query): Query<JobQuery>,
    headers: HeaderMap,
) -> Result<Json<StatusBody>, ApiError> {
    let provided = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    if !job_key_matches(&state.job_key, provided) {
        warn!("rejected scrape trigger with invalid job key");
        return Err(ApiError::unauthorized());
    }

    let fire_and_forget = query.fire_and_forget.as_deref() == Some("true");
    if fire_and_forget {
        info!("scrape pass triggered in background");
        let _ = state.scraper.trigger(TriggerMode::FireAndForget).await;
        return Ok(Json(StatusBody { status: "accepted" }));
    }

    info!("scrape pass triggered");
    state.scraper.trigger(TriggerMode::Synchronous).await;
    Ok(Json(StatusBody { status: "completed" }))
}

/// An empty configured key rejects every caller.
fn job_key_matches(expected: &str, provided: &str) -> bool {
    if expected.is_empty() {
        return false;
    }
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}

#[derive(Debug, Deserialize)]
pub struct QuoteQuery {
    duration: Option<String>,
    currency: Option<String>,
}

/// GET /api/quote/:symbol
pub async fn quote(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<QuoteQuery>,
) -> Result<Json<Quote>, ApiError> {
    let target = query
        .currency
        .as_deref()
        .filter(|value| !value.trim().is_empty())
        .map(parse_currency_code)
        .transpose()?;

    let (start, end) = quote_range(query.duration.as_deref(), Utc::now());
    let quote = state.quotes.get_quote(&symbol, start, end).await?;

    let quote = match target {
        Some(currency) => state.currency.convert_quote_currency(quote, &currency)?,
        None => quote,
    };
    Ok(Json(quote))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_job_key_never_matches() {
        assert!(!job_key_matches("", ""));
        assert!(!job_key_matches("", "anything"));
    }

    #[test]
    fn job_key_must_match_exactly() {
        assert!(job_key_matches("s3cret", "s3cret"));
        assert!(!job_key_matches("s3cret", "s3cre"));
        assert!(!job_key_matches("s3cret", "Bearer s3cret"));
    }
}
