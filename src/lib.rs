//! llm-broadcast-relay: streaming LLM relay.
//!
//! Forwards a caller's message to a streaming completion API and fans every
//! text delta out to two places at once:
//!   upstream delta → Web PubSub hub (broadcast) → SSE frame (caller)

pub mod broadcast;
pub mod config;
pub mod error;
pub mod server;
pub mod upstream;

pub use config::Config;
pub use error::{RelayError, Result};
