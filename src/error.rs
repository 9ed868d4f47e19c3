//! Error types for the relay.
//!
//! Each external concern gets its own enum; [`RelayError`] is what the HTTP
//! layer sees and knows how to turn into a response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Result type alias for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Startup configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Please set the {0} environment variable.")]
    MissingEnv(&'static str),

    #[error("Invalid connection string: {0}")]
    ConnectionString(String),

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Failed to read environment file: {0}")]
    EnvFile(#[from] dotenvy::Error),
}

/// Errors from the completion-stream source.
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Failed to decode event: {0}")]
    Decode(String),

    #[error("Upstream reported an error: {0}")]
    Remote(String),
}

/// Errors from the broadcast sink.
#[derive(Error, Debug)]
pub enum BroadcastError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Publish rejected: {status} - {message}")]
    Rejected { status: u16, message: String },

    #[error("Failed to sign access token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

/// Top-level error surfaced by the HTTP layer.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Broadcast error: {0}")]
    Broadcast(#[from] BroadcastError),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RelayError::Upstream(_) | RelayError::Broadcast(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "detail": self.to_string() }));
        (self.status(), body).into_response()
    }
}
