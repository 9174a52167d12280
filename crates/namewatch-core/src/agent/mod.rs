//! Agent: the tool-calling loop behind chat, autonomous runs and the
//! chat endpoint.
//!
//! One turn:
//! 1. Build context (system prompt + thread history + the new message)
//! 2. Call the LLM
//! 3. If it asks for tools, execute them, emit their output, feed results back, repeat
//! 4. When it answers in plain text, emit the answer and record the turn
//!
//! Output is a stream of [`AgentFragment`]s so transports can forward
//! progress as it happens.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::provider::types::{ChatMessage, ToolCallMessage};
use crate::provider::{CompletionSettings, LlmProvider};
use crate::singleflight::ResourceCache;
use crate::tools::ToolRegistry;

/// Turns of history (user + assistant messages) kept per thread.
const HISTORY_LIMIT: usize = 50;

const ITERATION_LIMIT_REPLY: &str =
    "I've reached the maximum number of tool iterations. Please review the results above.";

/// One piece of agent output, decoded once where it is produced.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentFragment {
    /// Text written by the model.
    Agent(String),
    /// Output of a tool the model invoked.
    Tool { name: String, content: String },
}

impl AgentFragment {
    pub fn content(&self) -> &str {
        match self {
            AgentFragment::Agent(text) => text,
            AgentFragment::Tool { content, .. } => content,
        }
    }
}

pub type FragmentStream = BoxStream<'static, anyhow::Result<AgentFragment>>;

/// Anything that can answer a prompt with a fragment stream.
///
/// Failing to produce the stream at all (e.g. the agent could not be
/// built) is reported separately from failures inside the stream.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn open(&self, prompt: &str, thread_id: &str) -> anyhow::Result<FragmentStream>;
}

#[async_trait]
impl Responder for ResourceCache<Agent> {
    async fn open(&self, prompt: &str, thread_id: &str) -> anyhow::Result<FragmentStream> {
        let agent = self.acquire().await?;
        Ok(agent.stream(prompt, thread_id))
    }
}

pub struct AgentConfig {
    pub completion: CompletionSettings,
    pub max_iterations: u32,
    /// Threads kept before the least recently used one is forgotten.
    pub max_threads: usize,
    pub system_prompt: String,
}

struct Thread {
    messages: Vec<ChatMessage>,
    last_used: u64,
}

/// Per-thread history, bounded by thread count.
struct Threads {
    entries: HashMap<String, Thread>,
    capacity: usize,
    clock: u64,
}

impl Threads {
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            clock: 0,
        }
    }

    fn history(&self, thread_id: &str) -> Vec<ChatMessage> {
        self.entries
            .get(thread_id)
            .map(|t| t.messages.clone())
            .unwrap_or_default()
    }

    fn record(&mut self, thread_id: &str, prompt: &str, reply: &str) {
        self.clock += 1;
        if !self.entries.contains_key(thread_id) && self.entries.len() >= self.capacity {
            self.evict_oldest();
        }

        let thread = self.entries.entry(thread_id.to_string()).or_insert(Thread {
            messages: Vec::new(),
            last_used: 0,
        });
        thread.last_used = self.clock;
        thread.messages.push(ChatMessage::user(prompt));
        thread.messages.push(ChatMessage::assistant(reply));
        if thread.messages.len() > HISTORY_LIMIT {
            let excess = thread.messages.len() - HISTORY_LIMIT;
            thread.messages.drain(..excess);
        }
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, t)| t.last_used)
            .map(|(id, _)| id.clone());
        if let Some(id) = oldest {
            debug!(thread = %id, "Evicting least recently used thread");
            self.entries.remove(&id);
        }
    }

    fn remove(&mut self, thread_id: &str) -> bool {
        self.entries.remove(thread_id).is_some()
    }
}

pub struct Agent {
    provider: Box<dyn LlmProvider>,
    tools: ToolRegistry,
    config: AgentConfig,
    threads: Mutex<Threads>,
}

impl Agent {
    pub fn new(provider: Box<dyn LlmProvider>, tools: ToolRegistry, config: AgentConfig) -> Self {
        Self {
            provider,
            tools,
            threads: Mutex::new(Threads::new(config.max_threads)),
            config,
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    /// Run one turn on `thread_id`, yielding fragments as they are produced.
    ///
    /// The turn runs on its own task; dropping the stream stops it at the
    /// next fragment boundary. An error is the last item of the stream.
    pub fn stream(
        self: &Arc<Self>,
        prompt: &str,
        thread_id: &str,
    ) -> FragmentStream {
        let (tx, rx) = mpsc::channel(16);
        let agent = Arc::clone(self);
        let prompt = prompt.to_string();
        let thread_id = thread_id.to_string();

        tokio::spawn(async move {
            if let Err(e) = agent.run_turn(&prompt, &thread_id, &tx).await {
                let _ = tx.send(Err(e)).await;
            }
        });

        stream::unfold(rx, |mut rx| async move {
            let item = rx.recv().await?;
            Some((item, rx))
        })
        .boxed()
    }

    /// Run one turn and return only the model's text, joined by newlines.
    pub async fn respond(self: &Arc<Self>, prompt: &str, thread_id: &str) -> anyhow::Result<String> {
        let mut fragments = self.stream(prompt, thread_id);
        let mut parts = Vec::new();
        while let Some(fragment) = fragments.next().await {
            if let AgentFragment::Agent(text) = fragment? {
                parts.push(text);
            }
        }
        Ok(parts.join("\n"))
    }

    /// Forget the history of one thread.
    pub async fn clear_thread(&self, thread_id: &str) -> bool {
        self.threads.lock().await.remove(thread_id)
    }

    async fn history(&self, thread_id: &str) -> Vec<ChatMessage> {
        self.threads.lock().await.history(thread_id)
    }

    async fn record_turn(&self, thread_id: &str, prompt: &str, reply: &str) {
        self.threads.lock().await.record(thread_id, prompt, reply);
    }

    async fn run_turn(
        &self,
        prompt: &str,
        thread_id: &str,
        tx: &mpsc::Sender<anyhow::Result<AgentFragment>>,
    ) -> anyhow::Result<()> {
        info!(thread = thread_id, "Processing message");

        let mut messages = Vec::with_capacity(HISTORY_LIMIT + 2);
        messages.push(ChatMessage::system(&self.config.system_prompt));
        messages.extend(self.history(thread_id).await);
        messages.push(ChatMessage::user(prompt));

        let tool_defs = self.tools.definitions();
        let emit = |fragment: AgentFragment| async move {
            tx.send(Ok(fragment))
                .await
                .map_err(|_| anyhow::anyhow!("response stream closed"))
        };

        for iteration in 1..=self.config.max_iterations {
            debug!(iteration, msg_count = messages.len(), "Calling LLM");

            let response = self
                .provider
                .chat(&messages, &tool_defs, self.config.completion)
                .await?;

            if response.tool_calls.is_empty() {
                let reply = response.content.unwrap_or_default();
                self.record_turn(thread_id, prompt, &reply).await;
                info!(tokens = response.usage.total_tokens, iteration, "Response complete");
                emit(AgentFragment::Agent(reply)).await?;
                return Ok(());
            }

            if let Some(text) = response.content.as_deref().filter(|t| !t.trim().is_empty()) {
                emit(AgentFragment::Agent(text.to_string())).await?;
            }

            let calls: Vec<ToolCallMessage> =
                response.tool_calls.iter().map(|tc| tc.to_message()).collect();
            messages.push(ChatMessage::assistant_with_tool_calls(
                response.content.as_deref(),
                calls,
            ));

            for tc in response.tool_calls {
                debug!(tool = tc.name, id = tc.id, "Executing tool call");
                let result = self.tools.execute(&tc.name, tc.arguments).await;
                messages.push(ChatMessage::tool_result(&tc.id, &tc.name, &result));
                emit(AgentFragment::Tool {
                    name: tc.name,
                    content: result,
                })
                .await?;
            }
        }

        warn!(iterations = self.config.max_iterations, "Hit max tool iterations, forcing stop");
        self.record_turn(thread_id, prompt, ITERATION_LIMIT_REPLY).await;
        emit(AgentFragment::Agent(ITERATION_LIMIT_REPLY.into())).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::types::{LlmResponse, ToolCallRequest, ToolDefinition, Usage};
    use crate::tools::{single_string_schema, string_arg, Tool, ToolArgs, ToolError};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::collections::VecDeque;

    /// Replays canned responses and records what it was sent.
    struct ScriptedProvider {
        replies: std::sync::Mutex<VecDeque<anyhow::Result<LlmResponse>>>,
        seen: Arc<std::sync::Mutex<Vec<Vec<ChatMessage>>>>,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<anyhow::Result<LlmResponse>>) -> Self {
            Self {
                replies: std::sync::Mutex::new(replies.into()),
                seen: Arc::default(),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn chat(
            &self,
            messages: &[ChatMessage],
            _tools: &[ToolDefinition],
            _settings: CompletionSettings,
        ) -> anyhow::Result<LlmResponse> {
            self.seen.lock().unwrap().push(messages.to_vec());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(text("(script exhausted)")))
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }

    fn text(content: &str) -> LlmResponse {
        LlmResponse {
            content: Some(content.into()),
            tool_calls: vec![],
            finish_reason: "stop".into(),
            usage: Usage::default(),
        }
    }

    fn call(name: &str, arg: &str) -> LlmResponse {
        let mut arguments = serde_json::Map::new();
        arguments.insert("text".into(), Value::String(arg.into()));
        LlmResponse {
            content: None,
            tool_calls: vec![ToolCallRequest {
                id: format!("call_{name}"),
                name: name.into(),
                arguments,
            }],
            finish_reason: "tool_calls".into(),
            usage: Usage::default(),
        }
    }

    struct Shout;

    #[async_trait]
    impl Tool for Shout {
        fn name(&self) -> &str {
            "shout"
        }
        fn description(&self) -> &str {
            "Uppercase the input"
        }
        fn parameters(&self) -> Value {
            single_string_schema("text", "Text")
        }
        async fn execute(&self, args: ToolArgs) -> Result<String, ToolError> {
            Ok(string_arg(&args, "text")?.to_uppercase())
        }
    }

    fn build(provider: ScriptedProvider, max_iterations: u32) -> Agent {
        build_with_threads(provider, max_iterations, 8)
    }

    fn build_with_threads(provider: ScriptedProvider, max_iterations: u32, max_threads: usize) -> Agent {
        let mut tools = ToolRegistry::new();
        tools.register(Box::new(Shout));
        Agent::new(
            Box::new(provider),
            tools,
            AgentConfig {
                completion: CompletionSettings {
                    max_tokens: 128,
                    temperature: 0.0,
                },
                max_iterations,
                max_threads,
                system_prompt: "You watch name registrations.".into(),
            },
        )
    }

    fn agent(provider: ScriptedProvider, max_iterations: u32) -> Arc<Agent> {
        Arc::new(build(provider, max_iterations))
    }

    async fn drain(agent: &Arc<Agent>, prompt: &str) -> Vec<anyhow::Result<AgentFragment>> {
        agent.stream(prompt, "t1").collect().await
    }

    #[tokio::test]
    async fn test_tool_then_answer_fragments() {
        let agent = agent(ScriptedProvider::new(vec![Ok(call("shout", "gm")), Ok(text("done"))]), 5);
        let fragments: Vec<AgentFragment> = drain(&agent, "go")
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect();

        assert_eq!(
            fragments,
            vec![
                AgentFragment::Tool {
                    name: "shout".into(),
                    content: "GM".into()
                },
                AgentFragment::Agent("done".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_provider_error_ends_stream() {
        let agent = agent(
            ScriptedProvider::new(vec![Ok(call("shout", "a")), Err(anyhow::anyhow!("LLM down"))]),
            5,
        );
        let items = drain(&agent, "go").await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert_eq!(items[1].as_ref().unwrap_err().to_string(), "LLM down");
    }

    #[tokio::test]
    async fn test_iteration_limit() {
        let agent = agent(
            ScriptedProvider::new(vec![Ok(call("shout", "a")), Ok(call("shout", "b"))]),
            2,
        );
        let reply = agent.respond("loop", "t1").await.unwrap();
        assert_eq!(reply, ITERATION_LIMIT_REPLY);
    }

    #[tokio::test]
    async fn test_thread_history_is_replayed() {
        let provider = ScriptedProvider::new(vec![Ok(text("first")), Ok(text("second"))]);
        let seen = provider.seen.clone();
        let agent = agent(provider, 3);

        assert_eq!(agent.respond("one", "t1").await.unwrap(), "first");
        assert_eq!(agent.respond("two", "t1").await.unwrap(), "second");

        let seen = seen.lock().unwrap();
        let roles: Vec<&str> = seen[1].iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
        assert_eq!(seen[1][2].content.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn test_threads_are_isolated() {
        let provider = ScriptedProvider::new(vec![Ok(text("a")), Ok(text("b"))]);
        let seen = provider.seen.clone();
        let agent = agent(provider, 3);

        agent.respond("one", "alice").await.unwrap();
        agent.respond("two", "bob").await.unwrap();
        assert_eq!(seen.lock().unwrap()[1].len(), 2);
        assert!(agent.clear_thread("alice").await);
        assert!(!agent.clear_thread("carol").await);
    }

    #[tokio::test]
    async fn test_least_recently_used_thread_is_evicted() {
        let provider = ScriptedProvider::new(vec![
            Ok(text("a")),
            Ok(text("b")),
            Ok(text("a2")),
            Ok(text("c")),
            Ok(text("b2")),
        ]);
        let seen = provider.seen.clone();
        let agent = Arc::new(build_with_threads(provider, 3, 2));

        agent.respond("one", "alice").await.unwrap();
        agent.respond("two", "bob").await.unwrap();
        // Touch alice so bob becomes the oldest.
        agent.respond("three", "alice").await.unwrap();
        agent.respond("four", "carol").await.unwrap();
        agent.respond("five", "bob").await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen[2].len(), 4, "alice still has its first turn");
        assert_eq!(seen[4].len(), 2, "bob starts over after eviction");
        drop(seen);

        assert_eq!(agent.threads.lock().await.entries.len(), 2);
        assert!(!agent.clear_thread("alice").await);
        assert!(agent.clear_thread("carol").await);
        assert!(agent.clear_thread("bob").await);
    }

    #[tokio::test]
    async fn test_cache_responder_builds_once() {
        let cache = ResourceCache::new("agent", || async {
            Ok(build(ScriptedProvider::new(vec![Ok(text("hi")), Ok(text("again"))]), 3))
        });

        let first: Vec<_> = cache.open("a", "t").await.unwrap().collect().await;
        let second: Vec<_> = cache.open("b", "t").await.unwrap().collect().await;
        assert_eq!(first[0].as_ref().unwrap().content(), "hi");
        assert_eq!(second[0].as_ref().unwrap().content(), "again");
    }

    #[test]
    fn test_fragment_content() {
        let tool = AgentFragment::Tool {
            name: "shout".into(),
            content: "X".into(),
        };
        assert_eq!(tool.content(), "X");
        assert_eq!(AgentFragment::Agent("hi".into()).content(), "hi");
    }
}
