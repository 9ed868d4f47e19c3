//! Completion-stream source.
//!
//! - [`event`]: Tagged stream events and delta text extraction
//! - [`anthropic`]: Anthropic Messages API streaming client

pub mod anthropic;
pub mod event;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::UpstreamError;

pub use anthropic::AnthropicClient;
pub use event::{Delta, StreamEvent};

/// Events of one open completion stream, in upstream order.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, UpstreamError>> + Send>>;

/// A remote model API that streams a completion for a single user turn.
#[async_trait]
pub trait CompletionSource: Send + Sync {
    /// Name for logging.
    fn name(&self) -> &'static str;

    /// Open a streaming completion for `message`. Errors here mean the stream
    /// never opened; errors inside the stream mean it broke mid-way.
    async fn open(&self, message: &str) -> Result<EventStream, UpstreamError>;
}
