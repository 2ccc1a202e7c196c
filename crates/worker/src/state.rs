//! Worker state.

use crate::bus::ProgressBus;
use crate::client::ClientFactory;
use crate::content::ContentGateway;
use crate::handle::ClientHandle;
use cairn_core::config::AppConfig;
use std::sync::Arc;

/// Shared worker state, cloned into every handler and page loop.
#[derive(Clone)]
pub struct WorkerState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Lifecycle owner of the network client.
    pub handle: Arc<ClientHandle>,
    /// Membership table for progress broadcasts.
    pub bus: Arc<ProgressBus>,
    /// Content interception.
    pub content: Arc<ContentGateway>,
}

impl WorkerState {
    /// Create worker state. The network client is built on first use.
    pub fn new(config: AppConfig, factory: Arc<dyn ClientFactory>) -> Self {
        let handle = Arc::new(ClientHandle::new(
            factory,
            config.network.construction_timeout(),
        ));
        Self {
            content: Arc::new(ContentGateway::new(handle.clone())),
            config: Arc::new(config),
            handle,
            bus: Arc::new(ProgressBus::new()),
        }
    }
}
