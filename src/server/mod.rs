//! HTTP server relaying completion streams.
//!
//! - [`api`]: Routes, shared state and request validation
//! - [`streaming`]: The forwarding loop and SSE frame formatting

pub mod api;
pub mod streaming;
