//! Lazy, exactly-once lifecycle of the network client.
//!
//! The first [`ClientHandle::acquire`] starts construction; concurrent callers
//! await the same shared future. Construction runs in a spawned task raced
//! against a timeout, so a timeout abandons it without cancelling it. Any
//! failure resets the handle so the next call starts over.

use crate::client::{ClientFactory, NetworkClient};
use crate::error::{ClientError, ClientResult};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

type BuildFuture = Shared<BoxFuture<'static, ClientResult<Arc<dyn NetworkClient>>>>;

enum HandleState {
    Empty,
    Building { attempt: u64, future: BuildFuture },
    Ready(Arc<dyn NetworkClient>),
}

impl HandleState {
    fn name(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Building { .. } => "building",
            Self::Ready(_) => "ready",
        }
    }
}

/// Owner of the single network client instance.
pub struct ClientHandle {
    factory: Arc<dyn ClientFactory>,
    timeout: Duration,
    state: Mutex<HandleState>,
    attempts: AtomicU64,
}

impl ClientHandle {
    pub fn new(factory: Arc<dyn ClientFactory>, timeout: Duration) -> Self {
        Self {
            factory,
            timeout,
            state: Mutex::new(HandleState::Empty),
            attempts: AtomicU64::new(0),
        }
    }

    /// Return the client, constructing it if needed.
    pub async fn acquire(&self) -> ClientResult<Arc<dyn NetworkClient>> {
        let (attempt, future) = {
            let mut state = self.state.lock().await;
            match &*state {
                HandleState::Ready(client) => return Ok(client.clone()),
                HandleState::Building { attempt, future } => (*attempt, future.clone()),
                HandleState::Empty => {
                    let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    let future = self.start_construction(attempt);
                    *state = HandleState::Building {
                        attempt,
                        future: future.clone(),
                    };
                    (attempt, future)
                }
            }
        };

        let result = future.await;

        // Only the attempt that is still current may move the state on
        let mut state = self.state.lock().await;
        if let HandleState::Building { attempt: current, .. } = &*state
            && *current == attempt
        {
            *state = match &result {
                Ok(client) => {
                    tracing::info!(
                        attempt,
                        backend = client.backend_name(),
                        "Network client ready"
                    );
                    HandleState::Ready(client.clone())
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Network client construction failed");
                    HandleState::Empty
                }
            };
        }

        result
    }

    /// The client if already constructed. Never starts construction.
    pub async fn peek(&self) -> Option<Arc<dyn NetworkClient>> {
        match &*self.state.lock().await {
            HandleState::Ready(client) => Some(client.clone()),
            _ => None,
        }
    }

    /// `empty`, `building` or `ready`.
    pub async fn state_name(&self) -> &'static str {
        self.state.lock().await.name()
    }

    /// Number of construction attempts started so far.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    fn start_construction(&self, attempt: u64) -> BuildFuture {
        let factory = self.factory.clone();
        let timeout = self.timeout;
        tracing::info!(attempt, timeout_secs = timeout.as_secs(), "Constructing network client");

        async move {
            let task = tokio::spawn(async move { factory.build().await });
            match tokio::time::timeout(timeout, task).await {
                Ok(Ok(result)) => result,
                Ok(Err(join_error)) => Err(ClientError::Construction(format!(
                    "construction task failed: {join_error}"
                ))),
                Err(_) => Err(ClientError::ConstructionTimeout(timeout)),
            }
        }
        .boxed()
        .shared()
    }
}
