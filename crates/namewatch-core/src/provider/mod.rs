//! LLM provider trait.
//!
//! The agent only needs "messages + tool definitions in, text and/or tool
//! calls out". [`openai::OpenAiProvider`] speaks the OpenAI-compatible chat
//! completions API; tests plug in scripted providers.

pub mod openai;
pub mod types;

use async_trait::async_trait;
use types::{ChatMessage, LlmResponse, ToolDefinition};

/// Sampling settings for one completion.
#[derive(Debug, Clone, Copy)]
pub struct CompletionSettings {
    pub max_tokens: u32,
    pub temperature: f32,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a chat completion request. `tools` may be empty.
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        settings: CompletionSettings,
    ) -> anyhow::Result<LlmResponse>;

    /// Model identifier used for requests.
    fn model(&self) -> &str;
}
