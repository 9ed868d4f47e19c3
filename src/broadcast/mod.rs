//! Broadcast sink.
//!
//! - [`webpubsub`]: Azure Web PubSub REST client (`send_to_all`)

pub mod webpubsub;

use async_trait::async_trait;

use crate::error::BroadcastError;

pub use webpubsub::{ConnectionString, WebPubSubClient};

/// Content type used for relayed text fragments.
pub const TEXT_PLAIN: &str = "text/plain";

/// A pub/sub service that fans a message out to every subscriber of a hub.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Name for logging.
    fn name(&self) -> &'static str;

    /// Publish `message` to all current subscribers.
    async fn send_to_all(&self, message: &str, content_type: &str) -> Result<(), BroadcastError>;
}
