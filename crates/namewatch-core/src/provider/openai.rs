//! OpenAI-compatible chat completions client.
//!
//! Works with any endpoint exposing `/chat/completions` (OpenAI itself,
//! OpenRouter, vLLM, ...). One request per call; failures surface
//! immediately.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::types::{ChatMessage, LlmResponse, ToolCallRequest, ToolDefinition, Usage};
use super::{CompletionSettings, LlmProvider};

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiProvider {
    /// `api_base` overrides [`DEFAULT_API_BASE`].
    pub fn new(client: Client, api_key: &str, api_base: Option<&str>, model: &str) -> Self {
        let base_url = api_base
            .unwrap_or(DEFAULT_API_BASE)
            .trim_end_matches('/')
            .to_string();

        debug!(base_url = %base_url, model, "Initialized LLM provider");

        Self {
            client,
            api_key: api_key.to_string(),
            base_url,
            model: model.to_string(),
        }
    }
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolDefinition]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'a str>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<UsageResponse>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageResponse,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct MessageResponse {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCallResponse>,
}

#[derive(Deserialize)]
struct ToolCallResponse {
    id: String,
    function: FunctionCallResponse,
}

#[derive(Deserialize)]
struct FunctionCallResponse {
    name: String,
    arguments: String,
}

#[derive(Deserialize)]
struct UsageResponse {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    total_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

fn parse_tool_calls(raw: Vec<ToolCallResponse>) -> Vec<ToolCallRequest> {
    raw.into_iter()
        .filter_map(|tc| {
            let args = if tc.function.arguments.trim().is_empty() {
                Ok(serde_json::Map::new())
            } else {
                serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(
                    &tc.function.arguments,
                )
            };
            match args {
                Ok(arguments) => Some(ToolCallRequest {
                    id: tc.id,
                    name: tc.function.name,
                    arguments,
                }),
                Err(e) => {
                    warn!(
                        tool = tc.function.name,
                        error = %e,
                        raw = tc.function.arguments,
                        "Failed to parse tool arguments, skipping"
                    );
                    None
                }
            }
        })
        .collect()
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        settings: CompletionSettings,
    ) -> Result<LlmResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let tools = (!tools.is_empty()).then_some(tools);

        let body = CompletionRequest {
            model: &self.model,
            messages,
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            tools,
            tool_choice: tools.map(|_| "auto"),
        };

        debug!(model = %self.model, msg_count = messages.len(), "Sending chat completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Network error calling LLM API")?;

        let status = response.status();
        let text = response
            .text()
            .await
            .context("Failed to read LLM API response body")?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            anyhow::bail!("LLM API error ({}): {}", status, message);
        }

        let completion: CompletionResponse =
            serde_json::from_str(&text).context("Failed to parse LLM API response")?;
        let choice = completion
            .choices
            .into_iter()
            .next()
            .context("LLM API returned no choices")?;

        let tool_calls = parse_tool_calls(choice.message.tool_calls);
        let usage = completion.usage.map_or_else(Usage::default, |u| Usage {
            prompt_tokens: u.prompt_tokens.unwrap_or(0),
            completion_tokens: u.completion_tokens.unwrap_or(0),
            total_tokens: u.total_tokens.unwrap_or(0),
        });

        debug!(
            finish_reason = choice.finish_reason.as_deref().unwrap_or("unknown"),
            tool_calls = tool_calls.len(),
            tokens = usage.total_tokens,
            "Received LLM response"
        );

        Ok(LlmResponse {
            content: choice.message.content,
            tool_calls,
            finish_reason: choice.finish_reason.unwrap_or_else(|| "stop".into()),
            usage,
        })
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    const SETTINGS: CompletionSettings = CompletionSettings {
        max_tokens: 256,
        temperature: 0.0,
    };

    #[test]
    fn test_base_url_defaults_and_trims() {
        let p = OpenAiProvider::new(Client::new(), "k", None, "gpt-4o-mini");
        assert_eq!(p.base_url, DEFAULT_API_BASE);

        let p = OpenAiProvider::new(Client::new(), "k", Some("http://localhost:8000/v1/"), "llama");
        assert_eq!(p.base_url, "http://localhost:8000/v1");
    }

    #[test]
    fn test_unparseable_tool_arguments_are_dropped() {
        let calls = parse_tool_calls(vec![
            ToolCallResponse {
                id: "a".into(),
                function: FunctionCallResponse {
                    name: "count_registrations".into(),
                    arguments: r#"{"hours":"6"}"#.into(),
                },
            },
            ToolCallResponse {
                id: "b".into(),
                function: FunctionCallResponse {
                    name: "broken".into(),
                    arguments: "{not json".into(),
                },
            },
            ToolCallResponse {
                id: "c".into(),
                function: FunctionCallResponse {
                    name: "wallet_details".into(),
                    arguments: String::new(),
                },
            },
        ]);
        let names: Vec<&str> = calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["count_registrations", "wallet_details"]);
        assert_eq!(calls[0].arguments["hours"], "6");
    }

    #[tokio::test]
    async fn test_chat_parses_tool_calls() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/chat/completions")
                    .header("authorization", "Bearer sk-test");
                then.status(200).json_body(json!({
                    "choices": [{
                        "finish_reason": "tool_calls",
                        "message": {
                            "content": null,
                            "tool_calls": [{
                                "id": "call_1",
                                "type": "function",
                                "function": { "name": "count_registrations", "arguments": "{\"hours\":\"24\"}" }
                            }]
                        }
                    }],
                    "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
                }));
            })
            .await;

        let provider = OpenAiProvider::new(Client::new(), "sk-test", Some(&server.url("/v1")), "m");
        let response = provider
            .chat(&[ChatMessage::user("how many?")], &[], SETTINGS)
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(response.content.is_none());
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].name, "count_registrations");
        assert_eq!(response.usage.total_tokens, 15);
        assert_eq!(response.finish_reason, "tool_calls");
    }

    #[tokio::test]
    async fn test_chat_surfaces_api_error_message() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(401)
                    .json_body(json!({ "error": { "message": "Incorrect API key provided" } }));
            })
            .await;

        let provider = OpenAiProvider::new(Client::new(), "bad", Some(&server.url("/v1")), "m");
        let err = provider
            .chat(&[ChatMessage::user("hi")], &[], SETTINGS)
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("401"));
        assert!(msg.contains("Incorrect API key"));
    }
}
