use crate::error::Error;
use crate::normalize::NormalizedWord;
use crate::service::WordService;
use crate::store::{DailyWord, YearWord};
use crate::upstream::Upstream;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, warn};

const MAX_WORDS_PER_REQUEST: usize = 50;
const DEFAULT_WORD_COUNT: usize = 5;

type SharedService<U> = Arc<WordService<U>>;

#[derive(Clone)]
pub struct WebConfig {
    pub addr: SocketAddr,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
        }
    }
}

#[derive(Debug)]
pub enum WebError {
    Io(std::io::Error),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for WebError {}

impl From<std::io::Error> for WebError {
    fn from(value: std::io::Error) -> Self {
        WebError::Io(value)
    }
}

pub async fn serve<U: Upstream + 'static>(
    config: WebConfig,
    service: WordService<U>,
) -> Result<(), WebError> {
    let router = build_router(Arc::new(service));
    info!(%config.addr, "Binding HTTP listener");
    let listener = TcpListener::bind(config.addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server exited");
    Ok(())
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::Config(_) => StatusCode::BAD_REQUEST,
            Error::UpstreamUnavailable(_) | Error::LexiconNotFound(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            err if err.is_upstream() => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        warn!(%status, error = %err, "request failed");
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = json!({ "error": self.message });
        (self.status, Json(payload)).into_response()
    }
}

fn build_router<U: Upstream + 'static>(service: SharedService<U>) -> Router {
    Router::new()
        .route("/daily-word", get(daily_word::<U>))
        .route("/words", get(words::<U>))
        .route("/year-words/:index", get(year_word::<U>))
        .route("/healthz", get(health))
        .with_state(service)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CompressionLayer::new())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut stream) = signal(SignalKind::terminate()) {
            let _ = stream.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "kalima-web" }))
}

#[derive(Debug, Deserialize)]
struct DailyParams {
    refresh: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct WordsParams {
    count: Option<usize>,
    min_len: Option<usize>,
    max_len: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WordsPayload {
    count: usize,
    min_len: usize,
    max_len: usize,
    words: Vec<NormalizedWord>,
}

async fn daily_word<U: Upstream + 'static>(
    State(service): State<SharedService<U>>,
    Query(params): Query<DailyParams>,
) -> Result<Json<DailyWord>, ApiError> {
    let word = service.today(params.refresh.unwrap_or(false)).await?;
    Ok(Json(word))
}

async fn words<U: Upstream + 'static>(
    State(service): State<SharedService<U>>,
    Query(params): Query<WordsParams>,
) -> Result<Json<WordsPayload>, ApiError> {
    let count = params.count.unwrap_or(DEFAULT_WORD_COUNT);
    if !(1..=MAX_WORDS_PER_REQUEST).contains(&count) {
        return Err(ApiError::bad_request(format!(
            "`count` must be between 1 and {MAX_WORDS_PER_REQUEST}"
        )));
    }
    let (default_min, default_max) = service.length_bounds();
    let min_len = params.min_len.unwrap_or(default_min);
    let max_len = params.max_len.unwrap_or(default_max);
    let words = service.words(count, min_len, max_len).await?;
    Ok(Json(WordsPayload {
        count: words.len(),
        min_len,
        max_len,
        words,
    }))
}

async fn year_word<U: Upstream + 'static>(
    State(service): State<SharedService<U>>,
    Path(index): Path<u32>,
) -> Result<Json<YearWord>, ApiError> {
    service
        .year_word(index)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("No planned word for day {index}")))
}
