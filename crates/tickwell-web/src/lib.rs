//! # Tickwell Web
//!
//! HTTP surface of tickwell.
//!
//! | Route | Description |
//! |-------|-------------|
//! | `GET /health` | Liveness probe |
//! | `POST /api/job?fireAndForget=true` | Run a scrape pass; requires `Authorization: <JOB_KEY>` |
//! | `GET /api/quote/:symbol?duration=24h&currency=DKK` | Assembled quote as JSON |

mod error;
mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tickwell_core::{AppContext, CurrencyService, QuoteService, ScraperService};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use error::ApiError;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub quotes: QuoteService,
    pub currency: CurrencyService,
    pub scraper: Arc<ScraperService>,
    pub job_key: Arc<str>,
}

impl AppState {
    pub fn from_context(context: &AppContext) -> Self {
        Self {
            quotes: context.quotes.clone(),
            currency: context.currency.clone(),
            scraper: Arc::clone(&context.scraper),
            job_key: Arc::from(context.config.job_key.as_str()),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/job", post(handlers::trigger_job))
        .route("/api/quote/:symbol", get(handlers::quote))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the router on `addr` until Ctrl-C.
pub async fn serve(state: AppState, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await
}
