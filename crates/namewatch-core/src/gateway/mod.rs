//! Transport-facing adapters for agent output.

pub mod chat;
pub mod sse;

pub use chat::{ChatBody, ChatHandler, ChatResponse};
