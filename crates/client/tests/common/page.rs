//! Orchestrators wired to a real worker over a scripted network, or to a
//! hand-driven fake worker.

use async_trait::async_trait;
use axum::Router;
use axum::http::{HeaderMap, Method, StatusCode};
use bytes::Bytes;
use cairn_cache::{DirectoryCache, MemoryRecordStore};
use cairn_client::Orchestrator;
use cairn_core::config::{AppConfig, CacheConfig, ClientConfig};
use cairn_core::{Cid, DirectoryEntry, Envelope, WorkerMessage};
use cairn_worker::{
    ClientError, ClientFactory, ClientResult, EntryStream, FetchResponse, NetworkClient,
    PageChannel, ServiceWorker, WorkerState,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// Network client answering from fixed listings and content.
#[allow(dead_code)]
#[derive(Default)]
pub struct ScriptedNetwork {
    listings: HashMap<Cid, Result<Vec<DirectoryEntry>, String>>,
    content: HashMap<String, Bytes>,
    ls_calls: AtomicUsize,
}

#[allow(dead_code)]
impl ScriptedNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listing(mut self, cid: Cid, entries: Vec<DirectoryEntry>) -> Self {
        self.listings.insert(cid, Ok(entries));
        self
    }

    pub fn with_failing_listing(mut self, cid: Cid, message: &str) -> Self {
        self.listings.insert(cid, Err(message.to_string()));
        self
    }

    pub fn with_content(mut self, url: &str, body: &'static [u8]) -> Self {
        self.content.insert(url.to_string(), Bytes::from_static(body));
        self
    }

    pub fn ls_count(&self) -> usize {
        self.ls_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NetworkClient for ScriptedNetwork {
    async fn ls(&self, cid: &Cid) -> ClientResult<EntryStream> {
        self.ls_calls.fetch_add(1, Ordering::SeqCst);
        match self.listings.get(cid) {
            Some(Ok(entries)) => {
                let items: Vec<ClientResult<DirectoryEntry>> =
                    entries.iter().cloned().map(Ok).collect();
                Ok(Box::pin(futures::stream::iter(items)))
            }
            Some(Err(message)) => Err(ClientError::Listing(message.clone())),
            None => Err(ClientError::Listing(format!("no such directory: {cid}"))),
        }
    }

    async fn fetch(
        &self,
        url: &str,
        _method: &Method,
        _headers: &HeaderMap,
    ) -> ClientResult<FetchResponse> {
        let body = self
            .content
            .get(url)
            .cloned()
            .ok_or_else(|| ClientError::Fetch(format!("not found: {url}")))?;
        Ok(FetchResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Box::pin(futures::stream::iter(vec![Ok(body)])),
        })
    }

    fn backend_name(&self) -> &'static str {
        "scripted"
    }
}

struct ScriptedFactory(Arc<ScriptedNetwork>);

#[async_trait]
impl ClientFactory for ScriptedFactory {
    async fn build(&self) -> ClientResult<Arc<dyn NetworkClient>> {
        let client: Arc<dyn NetworkClient> = self.0.clone();
        Ok(client)
    }
}

#[allow(dead_code)]
pub fn memory_cache(quota_bytes: Option<u64>) -> DirectoryCache {
    DirectoryCache::new(
        Arc::new(MemoryRecordStore::new(quota_bytes)),
        &CacheConfig::default(),
    )
}

/// An orchestrator connected to a live worker.
#[allow(dead_code)]
pub struct TestPage {
    pub orchestrator: Orchestrator,
    pub worker: ServiceWorker,
    pub network: Arc<ScriptedNetwork>,
}

#[allow(dead_code)]
impl TestPage {
    pub fn new(network: ScriptedNetwork) -> Self {
        Self::with_cache(network, memory_cache(None))
    }

    pub fn with_cache(network: ScriptedNetwork, cache: DirectoryCache) -> Self {
        let network = Arc::new(network);
        let factory = Arc::new(ScriptedFactory(network.clone()));
        let worker = ServiceWorker::new(WorkerState::new(AppConfig::for_testing(), factory));
        let orchestrator = Orchestrator::new(worker.connect(), cache, &ClientConfig::default());
        Self {
            orchestrator,
            worker,
            network,
        }
    }

    pub fn cache(&self) -> &DirectoryCache {
        self.orchestrator.cache()
    }
}

/// The worker end of a [`fake_channel`], driven by the test.
#[allow(dead_code)]
pub struct FakeWorker {
    pub requests: mpsc::UnboundedReceiver<Envelope>,
    pub messages: mpsc::UnboundedSender<WorkerMessage>,
}

#[allow(dead_code)]
impl FakeWorker {
    /// Next request the page sent.
    pub async fn next_request(&mut self) -> Envelope {
        tokio::time::timeout(Duration::from_secs(5), self.requests.recv())
            .await
            .expect("timed out waiting for a request")
            .expect("page dropped its request sender")
    }

    pub fn send(&self, message: WorkerMessage) {
        self.messages.send(message).expect("orchestrator dispatcher stopped");
    }
}

/// A page channel with no worker behind it.
#[allow(dead_code)]
pub fn fake_channel() -> (PageChannel, FakeWorker) {
    let (request_tx, request_rx) = mpsc::unbounded_channel();
    let (message_tx, message_rx) = mpsc::unbounded_channel();
    let channel = PageChannel {
        page: 0,
        requests: request_tx,
        messages: message_rx,
        interceptor: Router::new(),
    };
    let worker = FakeWorker {
        requests: request_rx,
        messages: message_tx,
    };
    (channel, worker)
}

/// Poll `check` until it holds or five seconds pass.
#[allow(dead_code)]
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
