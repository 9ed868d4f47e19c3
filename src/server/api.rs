//! HTTP surface.
//!
//! - POST /stream
//! - GET /health

use std::sync::Arc;
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::Value;
use tower::ServiceBuilder;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::broadcast::Broadcaster;
use crate::config::PublishFailurePolicy;
use crate::error::RelayError;
use crate::server::streaming::relay_stream;
use crate::upstream::CompletionSource;

pub const MISSING_MESSAGE: &str = "Missing 'message' in request body";
pub const INVALID_BODY: &str = "Invalid JSON body";

/// Application state shared across handlers.
pub struct AppState {
    pub source: Arc<dyn CompletionSource>,
    pub broadcaster: Arc<dyn Broadcaster>,
    pub on_publish_error: PublishFailurePolicy,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        source: Arc<dyn CompletionSource>,
        broadcaster: Arc<dyn Broadcaster>,
        on_publish_error: PublishFailurePolicy,
    ) -> Self {
        Self {
            source,
            broadcaster,
            on_publish_error,
            start_time: Instant::now(),
        }
    }
}

/// Build the axum router with all API routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/stream", post(stream))
        .route("/health", get(health))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer()),
        )
        .with_state(state)
}

/// Any origin, method and header, with credentials. The wildcard is not
/// allowed together with credentials, so the request values are mirrored.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
}

/// Pull a non-empty `message` string out of a JSON object body.
pub fn extract_message(body: &[u8]) -> Result<String, RelayError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|_| RelayError::BadRequest(INVALID_BODY.into()))?;
    let object = value
        .as_object()
        .ok_or_else(|| RelayError::BadRequest(INVALID_BODY.into()))?;

    match object.get("message") {
        Some(Value::String(message)) if !message.is_empty() => Ok(message.clone()),
        _ => Err(RelayError::BadRequest(MISSING_MESSAGE.into())),
    }
}

// ─── Route Handlers ────────────────────────────────────────────────────────

async fn stream(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Response, RelayError> {
    let message = extract_message(&body)?;
    let request_id = Uuid::new_v4().to_string();
    let span = info_span!("stream", request_id = %request_id);

    info!(
        parent: &span,
        source = state.source.name(),
        sink = state.broadcaster.name(),
        chars = message.chars().count(),
        "Stream request"
    );

    let events = state
        .source
        .open(&message)
        .instrument(span.clone())
        .await
        .inspect_err(|e| error!(parent: &span, error = %e, "Failed to open upstream stream"))?;

    let frames = relay_stream(
        events,
        state.broadcaster.clone(),
        state.on_publish_error,
        span,
    );

    Ok((
        [(CONTENT_TYPE, "text/event-stream"), (CACHE_CONTROL, "no-cache")],
        Body::from_stream(frames),
    )
        .into_response())
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}
