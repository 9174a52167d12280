//! namewatch-core: building blocks for the namewatch registration assistant.
//!
//! - [`registrations`] — paginated fetch of recent name registrations
//! - [`lookup`] — text-record lookup for a name or address
//! - [`singleflight`] — single-flight lazy cache for the shared agent
//! - [`tools`] — Tool trait, registry, and the registration/lookup/wallet tools
//! - [`wallet`] — local EVM wallet with sealed on-disk state
//! - [`provider`] — LLM provider trait and OpenAI-compatible implementation
//! - [`agent`] — tool-calling loop producing a stream of fragments
//! - [`gateway`] — server-sent-event framing and the chat endpoint handler
//! - [`autonomous`] — interval-driven autonomous runs
//! - [`app`] — composition root
//! - [`config`] — typed configuration from JSON and environment
//!
//! # Quick Start
//!
//! ```no_run
//! use namewatch_core::app;
//! use namewatch_core::config::Config;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::load()?;
//! let agents = std::sync::Arc::new(app::agent_cache(config));
//!
//! let agent = agents.acquire().await?;
//! let reply = agent.respond("How many names were registered today?", "demo").await?;
//! println!("{reply}");
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod app;
pub mod autonomous;
pub mod config;
pub mod gateway;
pub mod lookup;
pub mod provider;
pub mod registrations;
pub mod singleflight;
pub mod tools;
pub mod wallet;
