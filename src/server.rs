//! HTTP query server over the enriched corpus.
//!
//! Read-only JSON API. Handlers never mutate the corpus; they load it once
//! on first access and answer every subsequent request from memory, so a
//! corpus written after startup is not picked up until restart.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/sentiment-analysis` | Time-bucketed sentiment counts |
//! | `GET`  | `/keywords` | Keyword frequencies for one sentiment |
//! | `GET`  | `/top-posts` | Posts ranked by score |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "invalid time bound '01/02/2024'" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `parse_error` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! dashboards.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tower_http::cors::{Any, CorsLayer};

use crate::aggregate::{self, KeywordResponse, TimelineResponse, TopPostsResponse};
use crate::config::Config;
use crate::models::TextUnit;
use crate::store::{self, StoreError};

/// Shared application state passed to all route handlers via Axum's `State`
/// extractor. The corpus cell starts empty; the first handler that needs
/// units fills it, and a load failure is reported to that request rather
/// than crashing startup.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    corpus: Arc<OnceCell<Vec<TextUnit>>>,
}

impl AppState {
    async fn corpus(&self) -> Result<&Vec<TextUnit>, AppError> {
        let path = &self.config.corpus.enriched_path;
        self.corpus
            .get_or_try_init(|| async move { store::load_units(path) })
            .await
            .map_err(AppError::from)
    }
}

/// Starts the query server.
///
/// Binds to the address configured in `[server].bind` and runs until the
/// process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let state = AppState {
        config: Arc::new(config.clone()),
        corpus: Arc::new(OnceCell::new()),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/sentiment-analysis", get(handle_sentiment_analysis))
        .route("/keywords", get(handle_keywords))
        .route("/top-posts", get(handle_top_posts))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    println!("query server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn parse_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "parse_error".to_string(),
        message: message.into(),
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => {
                not_found(format!("enriched corpus not available: {}", err))
            }
            StoreError::Malformed { .. } => {
                parse_error(format!("enriched corpus is malformed: {}", err))
            }
            StoreError::Io { .. } => {
                parse_error(format!("failed to read enriched corpus: {}", err))
            }
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /sentiment-analysis ============

/// Query parameters for `GET /sentiment-analysis`.
///
/// `start`/`end` are the canonical names; the `*_timestamp` and `*_date`
/// aliases are kept for older dashboard clients. Each bound accepts either
/// a unix timestamp or a `YYYY-MM-DD` date.
#[derive(Deserialize)]
struct TimelineParams {
    start: Option<String>,
    end: Option<String>,
    start_timestamp: Option<String>,
    end_timestamp: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
}

impl TimelineParams {
    fn start(&self) -> Option<&String> {
        self.start
            .as_ref()
            .or(self.start_timestamp.as_ref())
            .or(self.start_date.as_ref())
    }

    fn end(&self) -> Option<&String> {
        self.end
            .as_ref()
            .or(self.end_timestamp.as_ref())
            .or(self.end_date.as_ref())
    }
}

/// Handler for `GET /sentiment-analysis`.
///
/// Both bounds are optional and inclusive. A date-form end bound covers the
/// whole named day.
async fn handle_sentiment_analysis(
    State(state): State<AppState>,
    Query(params): Query<TimelineParams>,
) -> Result<Json<TimelineResponse>, AppError> {
    let start = params
        .start()
        .map(|raw| aggregate::parse_time_bound(raw, false))
        .transpose()
        .map_err(|e| bad_request(e.to_string()))?;
    let end = params
        .end()
        .map(|raw| aggregate::parse_time_bound(raw, true))
        .transpose()
        .map_err(|e| bad_request(e.to_string()))?;

    let units = state.corpus().await?;
    Ok(Json(aggregate::sentiment_timeline(units, start, end)))
}

// ============ GET /keywords ============

#[derive(Deserialize)]
struct KeywordParams {
    sentiment: Option<String>,
}

/// Handler for `GET /keywords`.
///
/// The `sentiment` parameter is required and matched exactly against the
/// stored sentiment labels.
async fn handle_keywords(
    State(state): State<AppState>,
    Query(params): Query<KeywordParams>,
) -> Result<Json<KeywordResponse>, AppError> {
    let sentiment = params
        .sentiment
        .as_deref()
        .ok_or_else(|| bad_request("sentiment query parameter is required"))?;

    let units = state.corpus().await?;
    Ok(Json(aggregate::keyword_frequencies(units, sentiment)))
}

// ============ GET /top-posts ============

/// Handler for `GET /top-posts`. Comments are excluded; posts come back in
/// descending score order.
async fn handle_top_posts(
    State(state): State<AppState>,
) -> Result<Json<TopPostsResponse>, AppError> {
    let units = state.corpus().await?;
    Ok(Json(aggregate::top_posts(units)))
}
