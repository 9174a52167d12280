//! Memoized, deduplicated, retryable asynchronous factory.
//!
//! A [`ResourceCache`] builds an expensive shared value on first use. Callers
//! that arrive while a build is in flight join that same attempt instead of
//! starting another, so construction side effects happen once per successful
//! build. A failed attempt is reported to every caller that waited on it and
//! leaves the cache empty, so the next `acquire` starts over.
//!
//! ```text
//!   Empty ──acquire──▶ Pending ──ok──▶ Ready (cached for good)
//!     ▲                   │
//!     └──────err──────────┘
//! ```

use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// Failure of one construction attempt, shared by all of its waiters.
#[derive(Debug, Clone, Error)]
#[error("{0:#}")]
pub struct InitError(Arc<anyhow::Error>);

impl InitError {
    pub fn inner(&self) -> &anyhow::Error {
        &self.0
    }
}

type Attempt<T> = Shared<BoxFuture<'static, Result<Arc<T>, InitError>>>;
type Factory<T> = Box<dyn Fn() -> BoxFuture<'static, anyhow::Result<T>> + Send + Sync>;

enum Slot<T> {
    Empty,
    Pending { generation: u64, attempt: Attempt<T> },
    Ready(Arc<T>),
}

struct State<T> {
    slot: Slot<T>,
    generation: u64,
}

impl<T> State<T> {
    /// Move a pending slot of `generation` to its final state. A slot that
    /// has since moved on is left untouched.
    fn settle(&mut self, name: &'static str, generation: u64, outcome: &Result<Arc<T>, InitError>) {
        let current = matches!(
            &self.slot,
            Slot::Pending { generation: g, .. } if *g == generation
        );
        if !current {
            return;
        }
        self.slot = match outcome {
            Ok(value) => {
                info!(resource = name, generation, "Initialized");
                Slot::Ready(Arc::clone(value))
            }
            Err(e) => {
                error!(resource = name, generation, error = %e, "Initialization failed");
                Slot::Empty
            }
        };
    }
}

/// Single-flight lazy holder for one shared value.
pub struct ResourceCache<T> {
    name: &'static str,
    factory: Factory<T>,
    state: Arc<Mutex<State<T>>>,
}

impl<T> ResourceCache<T>
where
    T: Send + Sync + 'static,
{
    /// `name` only labels log lines.
    pub fn new<F, Fut>(name: &'static str, factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Self {
            name,
            factory: Box::new(move || factory().boxed()),
            state: Arc::new(Mutex::new(State {
                slot: Slot::Empty,
                generation: 0,
            })),
        }
    }

    /// Return the cached value, join the in-flight build, or start one.
    ///
    /// The build runs on its own task and settles the slot itself, so
    /// dropping every waiter neither cancels it nor strands the cache.
    pub async fn acquire(&self) -> Result<Arc<T>, InitError> {
        let attempt = {
            let mut state = self.state.lock().await;
            let joined = match &state.slot {
                Slot::Ready(value) => return Ok(Arc::clone(value)),
                Slot::Pending {
                    generation,
                    attempt,
                } => Some((*generation, attempt.clone())),
                Slot::Empty => None,
            };

            match joined {
                Some((generation, attempt)) => match attempt.peek().cloned() {
                    // Finished but never settled: its task panicked.
                    Some(outcome) => {
                        state.settle(self.name, generation, &outcome);
                        match outcome {
                            Ok(value) => return Ok(value),
                            Err(_) => self.start(&mut state),
                        }
                    }
                    None => {
                        debug!(resource = self.name, generation, "Joining in-flight initialization");
                        attempt
                    }
                },
                None => self.start(&mut state),
            }
        };

        attempt.await
    }

    fn start(&self, state: &mut State<T>) -> Attempt<T> {
        state.generation += 1;
        let generation = state.generation;
        info!(resource = self.name, generation, "Initializing");

        let build = (self.factory)();
        let shared_state = Arc::clone(&self.state);
        let name = self.name;
        let task = tokio::spawn(async move {
            let outcome = build.await.map(Arc::new).map_err(|e| InitError(Arc::new(e)));
            shared_state.lock().await.settle(name, generation, &outcome);
            outcome
        });

        let attempt = task
            .map(|joined| {
                joined.unwrap_or_else(|e| {
                    Err(InitError(Arc::new(anyhow::anyhow!(
                        "initialization task failed: {e}"
                    ))))
                })
            })
            .boxed()
            .shared();
        state.slot = Slot::Pending {
            generation,
            attempt: attempt.clone(),
        };
        attempt
    }

    /// Drop a cached value so the next `acquire` rebuilds it. An in-flight
    /// attempt is left alone. Returns whether a value was dropped.
    pub async fn reset(&self) -> bool {
        let mut state = self.state.lock().await;
        if matches!(state.slot, Slot::Ready(_)) {
            info!(resource = self.name, "Resetting cached resource");
            state.slot = Slot::Empty;
            true
        } else {
            false
        }
    }

    pub async fn is_ready(&self) -> bool {
        matches!(self.state.lock().await.slot, Slot::Ready(_))
    }
}
