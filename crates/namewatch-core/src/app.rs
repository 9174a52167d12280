//! Composition root: wires config into the agent and its tools.

use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Client;
use tracing::info;

use crate::agent::{Agent, AgentConfig};
use crate::config::Config;
use crate::lookup::RecordLookup;
use crate::provider::openai::OpenAiProvider;
use crate::provider::CompletionSettings;
use crate::registrations::{RegistrationFetcher, SubgraphSource};
use crate::singleflight::ResourceCache;
use crate::tools::lookup::NameRecordsTool;
use crate::tools::registrations::{CountRegistrationsTool, RecentRegistrationsTool};
use crate::tools::wallet::{WalletBalanceTool, WalletDetailsTool};
use crate::tools::ToolRegistry;
use crate::wallet::WalletProvider;

pub const DEFAULT_THREAD_ID: &str = "namewatch";

/// Shared HTTP client; every outbound request carries the configured deadline.
pub fn http_client(config: &Config) -> Result<Client> {
    Client::builder()
        .timeout(config.data.request_timeout())
        .user_agent(concat!("namewatch/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}

pub fn registration_fetcher(config: &Config, client: Client) -> RegistrationFetcher {
    let source = SubgraphSource::new(client, &config.data.registrations_url);
    RegistrationFetcher::new(Arc::new(source))
}

fn system_prompt(wallet: &WalletProvider) -> String {
    format!(
        "You are namewatch, an assistant that answers questions about name registrations \
         on the Base naming protocol. Use the tools to fetch registration activity and \
         name records instead of guessing; prefer count_registrations when only a number \
         is needed. Summarize tool results concisely. If a tool returns an error, say so \
         and suggest what the user can try.\n\n\
         Your wallet address is {} on network {}.",
        wallet.address(),
        wallet.network_id()
    )
}

/// Build a ready agent. The wallet state is persisted only once every
/// piece has been constructed.
pub async fn build_agent(config: Config) -> Result<Agent> {
    let client = http_client(&config)?;

    let wallet = Arc::new(
        WalletProvider::load_or_create(&config.wallet, client.clone())
            .context("Failed to initialize wallet")?,
    );

    let mut tools = ToolRegistry::new();
    let fetcher = registration_fetcher(&config, client.clone());
    tools.register(Box::new(RecentRegistrationsTool::new(fetcher.clone())));
    tools.register(Box::new(CountRegistrationsTool::new(fetcher)));
    tools.register(Box::new(NameRecordsTool::new(RecordLookup::new(
        client.clone(),
        &config.data.records_url,
    ))));
    tools.register(Box::new(WalletDetailsTool::new(wallet.clone())));
    tools.register(Box::new(WalletBalanceTool::new(wallet.clone())));

    let provider = OpenAiProvider::new(
        client,
        &config.llm.api_key,
        config.llm.api_base.as_deref(),
        &config.llm.model,
    );

    let agent = Agent::new(
        Box::new(provider),
        tools,
        AgentConfig {
            completion: CompletionSettings {
                max_tokens: config.agent.max_tokens,
                temperature: config.agent.temperature,
            },
            max_iterations: config.agent.max_tool_iterations,
            max_threads: config.agent.max_threads,
            system_prompt: system_prompt(&wallet),
        },
    );

    wallet.persist().context("Failed to persist wallet state")?;

    info!(
        model = agent.model(),
        tools = agent.tools().len(),
        address = %wallet.address(),
        "Agent ready"
    );
    Ok(agent)
}

/// Process-wide agent accessor: built on first use, at most one build in flight.
pub fn agent_cache(config: Config) -> ResourceCache<Agent> {
    ResourceCache::new("agent", move || build_agent(config.clone()))
}
