//! Autonomous mode: prompt the agent on a fixed interval without a user.
//!
//! The first run starts immediately; later runs start `interval` after the
//! previous one began, or right after it finished if it overran. A failed
//! run is logged and the loop carries on.
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use namewatch_core::agent::Responder;
//! use namewatch_core::autonomous::Autonomous;
//!
//! # async fn example(agent: Arc<dyn Responder>) {
//! let cancel = CancellationToken::new();
//! let auto = Autonomous::builder()
//!     .interval(Duration::from_secs(10))
//!     .build();
//!
//! auto.run(agent, cancel, |f| println!("{}", f.content())).await;
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::agent::{AgentFragment, Responder};

pub const DEFAULT_PROMPT: &str = "Check how many names were registered in the last hour and \
     look at the most interesting ones. Report anything notable: unusual volume, recognizable \
     names, or owners registering many names at once.";

pub const DEFAULT_THREAD_ID: &str = "autonomous";

pub struct Autonomous {
    interval: Duration,
    prompt: String,
    thread_id: String,
}

impl Autonomous {
    pub fn builder() -> AutonomousBuilder {
        AutonomousBuilder::default()
    }

    /// Run until `cancel` fires. Cancellation also interrupts a run in
    /// progress.
    pub async fn run<F>(self, agent: Arc<dyn Responder>, cancel: CancellationToken, mut on_fragment: F)
    where
        F: FnMut(&AgentFragment) + Send,
    {
        info!(interval_secs = self.interval.as_secs_f64(), "Autonomous mode started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut runs: u64 = 0;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(runs, "Autonomous mode cancelled");
                    return;
                }
                _ = ticker.tick() => {}
            }

            runs += 1;
            info!(run = runs, "Autonomous run starting");

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(runs, "Autonomous mode cancelled mid-run");
                    return;
                }
                result = self.run_once(agent.as_ref(), &mut on_fragment) => {
                    if let Err(e) = result {
                        error!(run = runs, error = %format!("{:#}", e), "Autonomous run failed");
                    }
                }
            }
        }
    }

    async fn run_once<F>(&self, agent: &dyn Responder, on_fragment: &mut F) -> anyhow::Result<()>
    where
        F: FnMut(&AgentFragment) + Send,
    {
        let mut fragments = agent.open(&self.prompt, &self.thread_id).await?;
        while let Some(fragment) = fragments.next().await {
            on_fragment(&fragment?);
        }
        Ok(())
    }
}

// ── Builder ─────────────────────────────────────────────────────────

#[derive(Default)]
pub struct AutonomousBuilder {
    interval: Option<Duration>,
    prompt: Option<String>,
    thread_id: Option<String>,
}

impl AutonomousBuilder {
    /// Time between run starts (defaults to 10 seconds).
    pub fn interval(mut self, d: Duration) -> Self {
        self.interval = Some(d);
        self
    }

    /// Prompt sent on every run (defaults to [`DEFAULT_PROMPT`]).
    pub fn prompt(mut self, p: impl Into<String>) -> Self {
        self.prompt = Some(p.into());
        self
    }

    pub fn thread_id(mut self, id: impl Into<String>) -> Self {
        self.thread_id = Some(id.into());
        self
    }

    pub fn build(self) -> Autonomous {
        Autonomous {
            interval: self
                .interval
                .filter(|d| !d.is_zero())
                .unwrap_or(Duration::from_secs(10)),
            prompt: self.prompt.unwrap_or_else(|| DEFAULT_PROMPT.into()),
            thread_id: self.thread_id.unwrap_or_else(|| DEFAULT_THREAD_ID.into()),
        }
    }
}
