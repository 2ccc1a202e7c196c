//! In-memory network client and worker setup.

use async_trait::async_trait;
use axum::http::{HeaderMap, Method, StatusCode};
use bytes::Bytes;
use cairn_core::config::AppConfig;
use cairn_core::{Cid, DirectoryEntry};
use cairn_worker::{
    ClientError, ClientFactory, ClientResult, EntryStream, FetchResponse, NetworkClient,
    ServiceWorker, WorkerState,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[allow(dead_code)]
enum Listing {
    Entries(Vec<DirectoryEntry>),
    /// Yields the entries, then fails.
    FailAfter(Vec<DirectoryEntry>, String),
    Fail(String),
}

struct Content {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

/// Scripted network client.
#[allow(dead_code)]
#[derive(Default)]
pub struct MockNetwork {
    listings: HashMap<Cid, Listing>,
    content: HashMap<String, Content>,
    pub ls_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
    pub last_fetch: Mutex<Option<(String, Method, HeaderMap)>>,
}

#[allow(dead_code)]
impl MockNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listing(mut self, cid: Cid, entries: Vec<DirectoryEntry>) -> Self {
        self.listings.insert(cid, Listing::Entries(entries));
        self
    }

    pub fn with_failing_listing(mut self, cid: Cid, message: &str) -> Self {
        self.listings.insert(cid, Listing::Fail(message.to_string()));
        self
    }

    pub fn with_partial_listing(
        mut self,
        cid: Cid,
        entries: Vec<DirectoryEntry>,
        message: &str,
    ) -> Self {
        self.listings
            .insert(cid, Listing::FailAfter(entries, message.to_string()));
        self
    }

    pub fn with_content(mut self, url: &str, body: &'static [u8]) -> Self {
        self.content.insert(
            url.to_string(),
            Content {
                status: StatusCode::OK,
                headers: HeaderMap::new(),
                body: Bytes::from_static(body),
            },
        );
        self
    }

    pub fn with_content_response(
        mut self,
        url: &str,
        status: StatusCode,
        headers: HeaderMap,
        body: &'static [u8],
    ) -> Self {
        self.content.insert(
            url.to_string(),
            Content {
                status,
                headers,
                body: Bytes::from_static(body),
            },
        );
        self
    }

    pub fn ls_count(&self) -> usize {
        self.ls_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NetworkClient for MockNetwork {
    async fn ls(&self, cid: &Cid) -> ClientResult<EntryStream> {
        self.ls_calls.fetch_add(1, Ordering::SeqCst);
        let items: Vec<ClientResult<DirectoryEntry>> = match self.listings.get(cid) {
            Some(Listing::Entries(entries)) => entries.iter().cloned().map(Ok).collect(),
            Some(Listing::FailAfter(entries, message)) => entries
                .iter()
                .cloned()
                .map(Ok)
                .chain(std::iter::once(Err(ClientError::Listing(message.clone()))))
                .collect(),
            Some(Listing::Fail(message)) => return Err(ClientError::Listing(message.clone())),
            None => return Err(ClientError::Listing(format!("no such directory: {cid}"))),
        };
        Ok(Box::pin(futures::stream::iter(items)))
    }

    async fn fetch(
        &self,
        url: &str,
        method: &Method,
        headers: &HeaderMap,
    ) -> ClientResult<FetchResponse> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_fetch.lock().unwrap() = Some((url.to_string(), method.clone(), headers.clone()));

        let content = self
            .content
            .get(url)
            .ok_or_else(|| ClientError::Fetch(format!("not found: {url}")))?;
        // Split the body so streaming is exercised
        let mid = content.body.len() / 2;
        let chunks = vec![
            Ok(content.body.slice(..mid)),
            Ok(content.body.slice(mid..)),
        ];
        Ok(FetchResponse {
            status: content.status,
            headers: content.headers.clone(),
            body: Box::pin(futures::stream::iter(chunks)),
        })
    }

    fn backend_name(&self) -> &'static str {
        "mock"
    }
}

/// Factory handing out a shared [`MockNetwork`].
#[allow(dead_code)]
pub struct MockFactory {
    network: Arc<MockNetwork>,
    delay: Duration,
    fail: bool,
    pub builds: AtomicUsize,
}

#[allow(dead_code)]
impl MockFactory {
    pub fn new(network: Arc<MockNetwork>) -> Self {
        Self {
            network,
            delay: Duration::ZERO,
            fail: false,
            builds: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Arc::new(MockNetwork::new()))
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClientFactory for MockFactory {
    async fn build(&self) -> ClientResult<Arc<dyn NetworkClient>> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if self.fail {
            return Err(ClientError::Construction("gateway unreachable".to_string()));
        }
        let client: Arc<dyn NetworkClient> = self.network.clone();
        Ok(client)
    }
}

/// A worker over a mock network.
#[allow(dead_code)]
pub struct TestWorker {
    pub worker: ServiceWorker,
    pub network: Arc<MockNetwork>,
    pub factory: Arc<MockFactory>,
}

#[allow(dead_code)]
impl TestWorker {
    pub fn new(network: MockNetwork) -> Self {
        let network = Arc::new(network);
        Self::with_factory(network.clone(), MockFactory::new(network))
    }

    pub fn with_factory(network: Arc<MockNetwork>, factory: MockFactory) -> Self {
        let factory = Arc::new(factory);
        let state = WorkerState::new(AppConfig::for_testing(), factory.clone());
        Self {
            worker: ServiceWorker::new(state),
            network,
            factory,
        }
    }

    pub fn router(&self) -> axum::Router {
        self.worker.router()
    }

    pub fn state(&self) -> &WorkerState {
        self.worker.state()
    }
}
