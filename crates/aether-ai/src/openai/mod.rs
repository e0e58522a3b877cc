//! OpenAI-compatible chat completions client.
//!
//! Implements `CompletionClient` against any `/chat/completions` endpoint
//! that streams `chat.completion.chunk` objects over SSE.

mod api;
mod chunk;
mod client;
mod config;

pub use chunk::parse_chunk;
pub use client::OpenAiClient;
pub use config::OpenAiConfig;
