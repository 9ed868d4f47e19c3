//! Anthropic Messages API streaming client.
//!
//! Sends one user turn with `stream: true` and decodes the SSE response into
//! [`StreamEvent`]s. The returned stream owns the HTTP response, so dropping
//! it closes the upstream connection.

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use super::{CompletionSource, EventStream, StreamEvent};
use crate::config::UpstreamConfig;
use crate::error::UpstreamError;

/// Anthropic streaming client. Cheap to share; holds a pooled `reqwest::Client`.
pub struct AnthropicClient {
    client: Client,
    api_key: String,
    config: UpstreamConfig,
}

impl AnthropicClient {
    pub fn new(api_key: String, config: UpstreamConfig) -> Result<Self, UpstreamError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.connect_timeout() {
            builder = builder.connect_timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            api_key,
            config,
        })
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl CompletionSource for AnthropicClient {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn open(&self, message: &str) -> Result<EventStream, UpstreamError> {
        let body = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            messages: vec![RequestMessage {
                role: "user",
                content: message,
            }],
            stream: true,
        };

        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.config.anthropic_version)
            .header("accept", "text/event-stream")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Api {
                status: status.as_u16(),
                message,
            });
        }

        debug!(model = %self.config.model, "Upstream stream opened");

        let events = response
            .bytes_stream()
            .eventsource()
            .filter_map(|item| async move {
                match item {
                    Ok(event) => decode_event(&event.data),
                    Err(e) => Some(Err(UpstreamError::Stream(e.to_string()))),
                }
            });

        Ok(Box::pin(events))
    }
}

/// Decode one SSE `data` payload. Blank payloads are skipped; an upstream
/// `error` event becomes an error item.
fn decode_event(data: &str) -> Option<Result<StreamEvent, UpstreamError>> {
    if data.trim().is_empty() {
        return None;
    }

    let event = match serde_json::from_str::<StreamEvent>(data) {
        Ok(event) => event,
        Err(e) => return Some(Err(UpstreamError::Decode(format!("{e}: {data}")))),
    };

    match event {
        StreamEvent::Error { error } => Some(Err(UpstreamError::Remote(error.to_string()))),
        event => Some(Ok(event)),
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<RequestMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    role: &'a str,
    content: &'a str,
}
