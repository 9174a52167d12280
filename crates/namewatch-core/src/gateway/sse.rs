//! Server-sent-event framing for agent output.
//!
//! Each fragment becomes one `data: {"content": ...}\n\n` event. A failure
//! becomes a single `data: {"error": ...}\n\n` event and ends the stream.

use futures::stream::{self, BoxStream, StreamExt};
use serde_json::json;
use tracing::warn;

use crate::agent::{AgentFragment, FragmentStream};

pub const CONTENT_TYPE: &str = "text/event-stream";

fn event(payload: serde_json::Value) -> String {
    format!("data: {}\n\n", payload)
}

pub fn content_event(fragment: &AgentFragment) -> String {
    event(json!({ "content": fragment.content() }))
}

pub fn error_event(error: &anyhow::Error) -> String {
    event(json!({ "error": format!("{:#}", error) }))
}

/// Streaming encoding: one event per fragment, stop after the first error.
pub fn encode(fragments: FragmentStream) -> BoxStream<'static, String> {
    stream::unfold(Some(fragments), |state| async move {
        let mut fragments = state?;
        match fragments.next().await? {
            Ok(fragment) => Some((content_event(&fragment), Some(fragments))),
            Err(e) => {
                warn!(error = %format!("{:#}", e), "Agent stream failed");
                Some((error_event(&e), None))
            }
        }
    })
    .boxed()
}

/// Request/response encoding: all fragment contents joined by newlines.
pub async fn collect(mut fragments: FragmentStream) -> anyhow::Result<String> {
    let mut parts = Vec::new();
    while let Some(fragment) = fragments.next().await {
        parts.push(fragment?.content().to_string());
    }
    Ok(parts.join("\n"))
}
