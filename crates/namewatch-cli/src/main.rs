//! namewatch CLI: chat, autonomous mode, one-shot questions and direct fetches.
//!
//! Usage:
//!   namewatch               — Choose chat or autonomous mode interactively
//!   namewatch chat          — Start an interactive chat session
//!   namewatch auto          — Run the agent autonomously on an interval
//!   namewatch ask <prompt>  — Ask one question and print the answer
//!   namewatch recent -H 24  — Fetch recent registrations without the LLM
//!   namewatch status        — Show configuration status
//!   namewatch onboard       — Create a default configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use namewatch_core::agent::{Agent, AgentFragment, Responder};
use namewatch_core::app::{self, DEFAULT_THREAD_ID};
use namewatch_core::autonomous::Autonomous;
use namewatch_core::config::Config;
use namewatch_core::registrations::{FetchMode, FetchResult, Hours};
use namewatch_core::singleflight::ResourceCache;
use namewatch_core::wallet::{self, vault};

#[derive(Parser)]
#[command(
    name = "namewatch",
    version,
    about = "Ask questions about recent name registrations",
    long_about = "namewatch: a conversational assistant for name-registration activity.\n\n\
                  An LLM agent answers questions by calling registration, record-lookup and wallet tools."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session
    Chat {
        /// Conversation thread id
        #[arg(short, long, default_value = DEFAULT_THREAD_ID)]
        thread: String,
    },

    /// Prompt the agent on a fixed interval until Ctrl+C
    Auto {
        /// Seconds between runs (overrides config)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Prompt for every run
        #[arg(short, long)]
        prompt: Option<String>,
    },

    /// Ask a single question and print the buffered answer
    Ask {
        /// The question
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,
    },

    /// Fetch registrations from the last N hours directly (no LLM)
    Recent {
        /// Look-back window in hours (fractions allowed)
        #[arg(short = 'H', long)]
        hours: Hours,

        /// Print only the number of registrations
        #[arg(short, long)]
        count: bool,
    },

    /// Show configuration status
    Status,

    /// Create or reset the default configuration
    Onboard,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Chat { thread }) => cmd_chat(&thread).await?,
        Some(Commands::Auto { interval, prompt }) => cmd_auto(interval, prompt).await?,
        Some(Commands::Ask { prompt }) => cmd_ask(&prompt.join(" ")).await?,
        Some(Commands::Recent { hours, count }) => cmd_recent(hours, count).await?,
        Some(Commands::Status) => cmd_status()?,
        Some(Commands::Onboard) => cmd_onboard()?,
        None => match choose_mode()? {
            Mode::Chat => cmd_chat(DEFAULT_THREAD_ID).await?,
            Mode::Auto => cmd_auto(None, None).await?,
        },
    }

    Ok(())
}

// ── Shared Setup ────────────────────────────────────────────────────

fn validate_config(config: &Config) -> Result<()> {
    if let Err(errors) = config.validate() {
        eprintln!("\n  \x1b[31mConfiguration errors:\x1b[0m");
        for e in &errors {
            eprintln!("     • {}", e);
        }
        eprintln!();
        anyhow::bail!(
            "Fix the above {} error(s) in the environment or {}",
            errors.len(),
            Config::default_path().display()
        );
    }
    Ok(())
}

/// Load and validate config, then build the agent once up front so
/// construction failures end the process before any prompt is read.
async fn load_agent() -> Result<(Config, Arc<ResourceCache<Agent>>)> {
    let config = Config::load()?;
    validate_config(&config)?;

    let agents = Arc::new(app::agent_cache(config.clone()));
    agents
        .acquire()
        .await
        .context("Failed to initialize agent")?;
    Ok((config, agents))
}

fn print_fragment(fragment: &AgentFragment) {
    match fragment {
        AgentFragment::Agent(text) => println!("  \x1b[32m{}\x1b[0m", text),
        AgentFragment::Tool { name, content } => {
            println!("  \x1b[2m[{}] {}\x1b[0m", name, content)
        }
    }
    println!("  -------------------");
}

// ── Mode Selection ──────────────────────────────────────────────────

enum Mode {
    Chat,
    Auto,
}

fn parse_mode(input: &str) -> Option<Mode> {
    match input.trim().to_lowercase().as_str() {
        "1" | "chat" => Some(Mode::Chat),
        "2" | "auto" => Some(Mode::Auto),
        _ => None,
    }
}

fn choose_mode() -> Result<Mode> {
    let stdin = io::stdin();
    loop {
        println!();
        println!("  Available modes:");
        println!("  1. chat    - Interactive chat mode");
        println!("  2. auto    - Autonomous action mode");
        print!("\n  Choose a mode (enter number or name): ");
        io::stdout().flush()?;

        let mut input = String::new();
        if stdin.read_line(&mut input)? == 0 {
            anyhow::bail!("No mode selected");
        }
        match parse_mode(&input) {
            Some(mode) => return Ok(mode),
            None => println!("  Invalid choice. Please try again."),
        }
    }
}

// ── Chat Command ────────────────────────────────────────────────────

async fn cmd_chat(thread: &str) -> Result<()> {
    let (config, agents) = load_agent().await?;

    println!();
    println!("  namewatch v{}", env!("CARGO_PKG_VERSION"));
    println!(
        "  Model: {} | Network: {} | Thread: {}",
        config.llm.model, config.wallet.network_id, thread
    );
    println!();
    println!("  Type your message, or 'exit' to quit.");
    println!("  ─────────────────────────────────────");
    println!();

    let stdin = io::stdin();
    loop {
        print!("  \x1b[36mPrompt:\x1b[0m ");
        io::stdout().flush()?;

        let mut input = String::new();
        if stdin.read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        match input {
            "" => continue,
            "exit" | "/quit" | "/exit" => {
                println!("  Goodbye!");
                break;
            }
            "/clear" => {
                if let Ok(agent) = agents.acquire().await {
                    agent.clear_thread(thread).await;
                }
                println!("  Thread cleared.");
                continue;
            }
            _ => {}
        }

        println!();
        match agents.open(input, thread).await {
            Ok(mut fragments) => {
                while let Some(fragment) = fragments.next().await {
                    match fragment {
                        Ok(f) => print_fragment(&f),
                        Err(e) => {
                            tracing::error!(error = %format!("{:#}", e), "Chat turn failed");
                            eprintln!("  \x1b[31mError: {:#}\x1b[0m", e);
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                tracing::error!(error = %format!("{:#}", e), "Agent unavailable");
                eprintln!("  \x1b[31mError: {:#}\x1b[0m", e);
            }
        }
        println!();
    }

    Ok(())
}

// ── Auto Command ────────────────────────────────────────────────────

async fn cmd_auto(interval: Option<u64>, prompt: Option<String>) -> Result<()> {
    let (config, agents) = load_agent().await?;

    let secs = interval.unwrap_or(config.agent.autonomous_interval_secs);
    let mut builder = Autonomous::builder().interval(Duration::from_secs(secs));
    if let Some(prompt) = prompt {
        builder = builder.prompt(prompt);
    }
    let auto = builder.build();

    println!();
    println!("  namewatch autonomous mode (every {}s)", secs);
    println!("  Press Ctrl+C to stop.");
    println!("  ─────────────────────────────────────");

    let cancel = CancellationToken::new();
    let runner = tokio::spawn(auto.run(agents, cancel.clone(), print_fragment));

    tokio::signal::ctrl_c().await?;
    println!("\n  Stopping...");
    cancel.cancel();
    runner.await?;

    println!("  Goodbye!");
    Ok(())
}

// ── Ask Command ─────────────────────────────────────────────────────

async fn cmd_ask(prompt: &str) -> Result<()> {
    let (_config, agents) = load_agent().await?;
    let agent = agents.acquire().await?;
    let reply = agent.respond(prompt, DEFAULT_THREAD_ID).await?;
    println!("{}", reply);
    Ok(())
}

// ── Recent Command ──────────────────────────────────────────────────

async fn cmd_recent(hours: Hours, count: bool) -> Result<()> {
    let config = Config::load()?;
    if config.data.registrations_url.trim().is_empty() {
        anyhow::bail!("REGISTRATIONS_API_URL is not set (data.registrationsUrl in config)");
    }

    let fetcher = app::registration_fetcher(&config, app::http_client(&config)?);
    let mode = if count { FetchMode::Count } else { FetchMode::Collect };

    match fetcher.fetch(hours, mode).await? {
        FetchResult::Count { count } => println!("{}", count),
        FetchResult::Records(records) => {
            println!("{}", serde_json::to_string_pretty(&records)?);
            eprintln!("  {} registration(s) in the last {} hour(s)", records.len(), hours);
        }
    }
    Ok(())
}

// ── Onboard Command ─────────────────────────────────────────────────

fn cmd_onboard() -> Result<()> {
    let path = Config::write_default_template()?;
    println!();
    println!("  Configuration created at:");
    println!("     {}", path.display());
    println!();
    println!("  Next steps:");
    println!("  1. Add your LLM and wallet-provider keys (or set them in .env)");
    println!("  2. Set data.registrationsUrl to your subgraph endpoint");
    println!("  3. Run `namewatch chat` to start chatting");
    println!();
    Ok(())
}

// ── Status Command ──────────────────────────────────────────────────

fn mark(ok: bool) -> &'static str {
    if ok {
        "✅"
    } else {
        "❌"
    }
}

fn cmd_status() -> Result<()> {
    let config_path = Config::default_path();
    let config = Config::load()?;

    println!();
    println!("  namewatch status");
    println!("  ─────────────────────────────────────");

    if config_path.exists() {
        println!("  Config:    {}", config_path.display());
    } else {
        println!("  Config:    (none, environment only; `namewatch onboard` creates one)");
    }

    println!("  LLM key:   {}", mark(!config.llm.api_key.trim().is_empty()));
    println!("  Model:     {}", config.llm.model);
    println!(
        "  Wallet:    {} credentials | network {}",
        mark(!config.wallet.api_key_private_key.trim().is_empty()),
        config.wallet.network_id
    );

    let rpc = config
        .wallet
        .rpc_url
        .as_deref()
        .or_else(|| wallet::default_rpc_url(&config.wallet.network_id));
    match rpc {
        Some(url) => println!("  RPC:       {}", url),
        None => println!("  RPC:       ❌ unknown network, set wallet.rpcUrl"),
    }

    let data_path = config.wallet.data_path();
    match std::fs::read_to_string(&data_path) {
        Ok(raw) if vault::is_sealed(&raw) => {
            println!("  State:     {} (sealed)", data_path.display())
        }
        Ok(_) => println!("  State:     {} (plaintext, sealed on next start)", data_path.display()),
        Err(_) => println!("  State:     {} (created on first start)", data_path.display()),
    }

    if config.data.registrations_url.trim().is_empty() {
        println!("  Subgraph:  ❌ not configured");
    } else {
        println!("  Subgraph:  {}", config.data.registrations_url);
    }
    println!("  Records:   {}", config.data.records_url);

    match config.validate() {
        Ok(()) => println!("  Ready:     ✅"),
        Err(errors) => println!("  Ready:     ❌ {} problem(s)", errors.len()),
    }

    println!();
    Ok(())
}
