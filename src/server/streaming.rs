//! The forwarding loop: one completion stream in, two sinks out.
//!
//! For every delta event the text is published to the broadcast sink and
//! then yielded to the caller as a raw SSE frame. Frames are written as
//! `data: <text>\n\n` verbatim (no line splitting), and the stream always
//! ends with the `[END]` sentinel unless it is aborted by an error.

use std::sync::Arc;

use bytes::Bytes;
use futures::stream::Stream;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn, Span};

use crate::broadcast::{Broadcaster, TEXT_PLAIN};
use crate::config::PublishFailurePolicy;
use crate::error::RelayError;
use crate::upstream::EventStream;

/// Terminal sentinel frame.
pub const END_FRAME: &str = "data: [END]\n\n";

/// Format a text fragment as an SSE data frame.
pub fn format_frame(text: &str) -> Bytes {
    format!("data: {text}\n\n").into()
}

/// Build the caller-facing byte stream for one request.
///
/// The returned stream owns `events`; dropping it (client gone, or loop
/// finished) drops the upstream response along with it. Logs are emitted
/// under `span`, the request's span.
pub fn relay_stream(
    events: EventStream,
    broadcaster: Arc<dyn Broadcaster>,
    policy: PublishFailurePolicy,
    span: Span,
) -> impl Stream<Item = Result<Bytes, RelayError>> + Send + 'static {
    async_stream::try_stream! {
        let mut events = events;
        let mut guard = CompletionGuard::new(span.clone());

        while let Some(event) = events.next().await {
            let event = event.inspect_err(|e| {
                error!(parent: &span, frames = guard.frames, error = %e, "Upstream stream failed");
            })?;

            let Some(text) = event.text() else {
                continue;
            };

            let published = broadcaster.send_to_all(&text, TEXT_PLAIN).await;
            match policy {
                PublishFailurePolicy::Abort => published.inspect_err(|e| {
                    error!(parent: &span, sink = broadcaster.name(), error = %e, "Publish failed, aborting stream");
                })?,
                PublishFailurePolicy::LogAndContinue => {
                    if let Err(e) = published {
                        warn!(parent: &span, sink = broadcaster.name(), error = %e, "Publish failed");
                    }
                }
            }

            guard.frames += 1;
            yield format_frame(&text);
        }

        guard.completed = true;
        info!(parent: &span, frames = guard.frames, "Stream complete");
        yield Bytes::from_static(END_FRAME.as_bytes());
    }
}

/// Notes in the log when a stream is dropped before reaching the sentinel.
struct CompletionGuard {
    span: Span,
    frames: usize,
    completed: bool,
}

impl CompletionGuard {
    fn new(span: Span) -> Self {
        Self {
            span,
            frames: 0,
            completed: false,
        }
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if !self.completed {
            debug!(
                parent: &self.span,
                frames = self.frames,
                "Stream closed before completion, upstream released"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_frame() {
        assert_eq!(format_frame("def").as_ref(), b"data: def\n\n");
    }

    #[test]
    fn test_format_frame_keeps_leading_space() {
        assert_eq!(format_frame(" quicksort").as_ref(), b"data:  quicksort\n\n");
    }

    #[test]
    fn test_end_frame() {
        assert_eq!(END_FRAME, "data: [END]\n\n");
    }
}
