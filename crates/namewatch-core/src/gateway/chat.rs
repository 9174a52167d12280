//! Chat endpoint logic, independent of any HTTP server.
//!
//! A server binding passes the request method and raw body to
//! [`ChatHandler::handle`] and writes the returned status, content type and
//! body. The body is either a small JSON document or an event stream.

use std::sync::Arc;

use futures::stream::{BoxStream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error};

use super::sse;
use crate::agent::Responder;

const JSON: &str = "application/json";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest {
    prompt: String,
    #[serde(default)]
    thread_id: Option<String>,
}

pub enum ChatBody {
    Json(String),
    Events(BoxStream<'static, String>),
}

impl ChatBody {
    /// Drain the body into one string.
    pub async fn into_text(self) -> String {
        match self {
            ChatBody::Json(text) => text,
            ChatBody::Events(events) => events.collect::<Vec<_>>().await.concat(),
        }
    }
}

pub struct ChatResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: ChatBody,
}

impl ChatResponse {
    fn error(status: u16, message: impl std::fmt::Display) -> Self {
        Self {
            status,
            content_type: JSON,
            body: ChatBody::Json(json!({ "error": message.to_string() }).to_string()),
        }
    }
}

pub struct ChatHandler {
    agent: Arc<dyn Responder>,
    default_thread: String,
}

impl ChatHandler {
    pub fn new(agent: Arc<dyn Responder>, default_thread: impl Into<String>) -> Self {
        Self {
            agent,
            default_thread: default_thread.into(),
        }
    }

    /// Handle one request. Expects `POST` with `{"prompt": "..."}` and an
    /// optional `threadId`.
    pub async fn handle(&self, method: &str, body: &[u8]) -> ChatResponse {
        if !method.eq_ignore_ascii_case("POST") {
            return ChatResponse::error(405, "Method not allowed");
        }

        let request: ChatRequest = match serde_json::from_slice(body) {
            Ok(r) => r,
            Err(e) => {
                error!(error = %e, "Invalid chat request body");
                return ChatResponse::error(500, format!("invalid request body: {}", e));
            }
        };

        let thread_id = request.thread_id.as_deref().unwrap_or(&self.default_thread);
        debug!(thread = thread_id, "Chat request");

        match self.agent.open(&request.prompt, thread_id).await {
            Ok(fragments) => ChatResponse {
                status: 200,
                content_type: sse::CONTENT_TYPE,
                body: ChatBody::Events(sse::encode(fragments)),
            },
            Err(e) => {
                error!(error = %format!("{:#}", e), "Failed to start chat");
                ChatResponse::error(500, format!("{:#}", e))
            }
        }
    }
}
