//! Page-side orchestration over a worker channel.
//!
//! The [`Orchestrator`] owns one [`PageChannel`]. Outbound requests carry a
//! fresh id and wait on a pending table; a single dispatcher task reads every
//! worker message, resolves responses by id, keeps the directory cache in
//! step with background discoveries, and fans progress out to listeners.

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::listeners::{ListenerId, ListenerRegistry, ProgressCallback, call_isolated};
use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Method};
use axum::response::Response as HttpResponse;
use cairn_cache::DirectoryCache;
use cairn_core::config::ClientConfig;
use cairn_core::{
    Cid, DirectoryEntry, Envelope, FilePair, INTERCEPT_PREFIX, MessageId, ProgressEvent, Request,
    Response, SubdirectoryProgress, WorkerMessage, extract_pairs,
};
use cairn_worker::PageChannel;
use cairn_worker::content::PATH_SEGMENT;
use percent_encoding::utf8_percent_encode;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tower::ServiceExt;

/// A directory listing with its content/metadata pairs.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Listing {
    pub entries: Vec<DirectoryEntry>,
    pub pairs: Vec<FilePair>,
}

struct PendingRequest {
    request_type: &'static str,
    /// Root CID whose listing is cached when the response succeeds.
    persist: Option<Cid>,
    reply: oneshot::Sender<Response>,
}

#[derive(Default)]
struct PendingTable {
    closed: bool,
    requests: HashMap<MessageId, PendingRequest>,
}

/// State shared between the orchestrator and its dispatcher.
struct Shared {
    pending: Mutex<PendingTable>,
    watchers: Mutex<HashMap<u64, (Cid, ProgressCallback)>>,
    next_watch: AtomicU64,
    listeners: ListenerRegistry,
    cache: DirectoryCache,
}

impl Shared {
    fn pending(&self) -> MutexGuard<'_, PendingTable> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn watchers(&self) -> MutexGuard<'_, HashMap<u64, (Cid, ProgressCallback)>> {
        self.watchers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn watch(self: &Arc<Self>, cid: Cid, callback: ProgressCallback) -> WatchGuard {
        let id = self.next_watch.fetch_add(1, Ordering::SeqCst);
        self.watchers().insert(id, (cid, callback));
        WatchGuard {
            shared: self.clone(),
            id,
        }
    }
}

/// Removes a per-call progress watcher when the call finishes.
struct WatchGuard {
    shared: Arc<Shared>,
    id: u64,
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        self.shared.watchers().remove(&self.id);
    }
}

/// Cache-first access to directory listings and content.
pub struct Orchestrator {
    shared: Arc<Shared>,
    requests: mpsc::UnboundedSender<Envelope>,
    interceptor: Router,
    request_timeout: Duration,
}

impl Orchestrator {
    /// Take over `channel` and start dispatching its messages.
    ///
    /// Sends `CLAIM_CLIENTS` so this page receives progress broadcasts.
    pub fn new(channel: PageChannel, cache: DirectoryCache, config: &ClientConfig) -> Self {
        let PageChannel {
            page,
            requests,
            messages,
            interceptor,
        } = channel;

        let shared = Arc::new(Shared {
            pending: Mutex::new(PendingTable::default()),
            watchers: Mutex::new(HashMap::new()),
            next_watch: AtomicU64::new(0),
            listeners: ListenerRegistry::new(),
            cache,
        });

        tokio::spawn(dispatch(shared.clone(), messages));

        if requests.send(Envelope::new(Request::ClaimClients)).is_err() {
            tracing::warn!(page, "Worker went away before the claim was sent");
        }

        Self {
            shared,
            requests,
            interceptor,
            request_timeout: config.request_timeout(),
        }
    }

    pub fn cache(&self) -> &DirectoryCache {
        &self.shared.cache
    }

    /// Number of requests still waiting for a response.
    pub fn pending_count(&self) -> usize {
        self.shared.pending().requests.len()
    }

    /// Register a listener for every progress event this page receives.
    pub fn subscribe(&self, callback: ProgressCallback) -> ListenerId {
        self.shared.listeners.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.shared.listeners.unsubscribe(id)
    }

    /// Get the listing for `cid`, from the cache when possible.
    ///
    /// On a miss the worker lists the directory and `on_progress` receives
    /// the listing events for `cid` until the response arrives. Entries found
    /// later by background traversal are merged into the cache record but are
    /// not part of the returned listing. Pairs are grouped locally, so a cache
    /// hit never waits on the worker.
    pub async fn get_listing(
        &self,
        cid: &Cid,
        on_progress: Option<ProgressCallback>,
    ) -> OrchestratorResult<Listing> {
        let entries = match self.cached(cid).await {
            Some(entries) => entries,
            None => {
                let _watch = on_progress.map(|callback| self.shared.watch(cid.clone(), callback));
                let data = self
                    .request(Request::ShallowRetrieval { cid: cid.clone() }, Some(cid.clone()))
                    .await?;
                serde_json::from_value(data)?
            }
        };

        let pairs = extract_pairs(&entries);
        Ok(Listing { entries, pairs })
    }

    /// Group `files` into content/metadata pairs on the worker.
    pub async fn extract_pairs(&self, files: &[DirectoryEntry]) -> OrchestratorResult<Vec<FilePair>> {
        let data = self
            .request(
                Request::ExtractPairs {
                    files: files.to_vec(),
                },
                None,
            )
            .await?;
        Ok(serde_json::from_value(data)?)
    }

    /// Fetch `path` under `cid` through the worker's interception router.
    ///
    /// `path` is split on `/` and each segment is percent-encoded.
    pub async fn fetch_content(
        &self,
        cid: &Cid,
        path: &str,
        headers: HeaderMap,
    ) -> OrchestratorResult<HttpResponse> {
        let mut uri = format!("{INTERCEPT_PREFIX}{cid}");
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            uri.push('/');
            uri.extend(utf8_percent_encode(segment, PATH_SEGMENT));
        }

        let mut request = axum::http::Request::builder()
            .method(Method::GET)
            .uri(&uri)
            .body(Body::empty())
            .map_err(|e| OrchestratorError::InvalidRequest(format!("{uri}: {e}")))?;
        *request.headers_mut() = headers;

        let response = match self.interceptor.clone().oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        };
        Ok(response)
    }

    async fn cached(&self, cid: &Cid) -> Option<Vec<DirectoryEntry>> {
        match self.shared.cache.get(cid).await {
            Ok(Some(entries)) => {
                tracing::debug!(cid = %cid, entries = entries.len(), "Listing cache hit");
                Some(entries)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(cid = %cid, error = %e, "Cache read failed, listing from network");
                None
            }
        }
    }

    /// Send `request` and wait for its response data.
    async fn request(&self, request: Request, persist: Option<Cid>) -> OrchestratorResult<Value> {
        let request_type = request.kind();
        let envelope = Envelope::new(request);
        let id = envelope.id;
        let (reply, response) = oneshot::channel();

        {
            let mut pending = self.shared.pending();
            if pending.closed {
                return Err(OrchestratorError::ChannelClosed);
            }
            pending.requests.insert(
                id,
                PendingRequest {
                    request_type,
                    persist,
                    reply,
                },
            );
        }

        if self.requests.send(envelope).is_err() {
            self.shared.pending().requests.remove(&id);
            return Err(OrchestratorError::ChannelClosed);
        }

        match tokio::time::timeout(self.request_timeout, response).await {
            Ok(Ok(response)) => {
                response
                    .into_result()
                    .map_err(|message| OrchestratorError::Remote {
                        request_type: request_type.to_string(),
                        message,
                    })
            }
            Ok(Err(_)) => Err(OrchestratorError::ChannelClosed),
            Err(_) => {
                self.shared.pending().requests.remove(&id);
                tracing::warn!(
                    id = %id,
                    request_type,
                    timeout_secs = self.request_timeout.as_secs(),
                    "Request timed out"
                );
                Err(OrchestratorError::Timeout {
                    request_type: request_type.to_string(),
                })
            }
        }
    }
}

async fn dispatch(shared: Arc<Shared>, mut messages: mpsc::UnboundedReceiver<WorkerMessage>) {
    while let Some(message) = messages.recv().await {
        match message {
            WorkerMessage::Response(response) => resolve(&shared, response).await,
            WorkerMessage::Progress(update) => relay(&shared, update.data).await,
        }
    }

    // Dropping the reply senders fails every waiter with ChannelClosed
    let abandoned = {
        let mut pending = shared.pending();
        pending.closed = true;
        std::mem::take(&mut pending.requests)
    };
    tracing::debug!(abandoned = abandoned.len(), "Worker channel closed");
}

async fn resolve(shared: &Shared, response: Response) {
    let Some(pending) = shared.pending().requests.remove(&response.id) else {
        tracing::warn!(
            id = %response.id,
            kind = %response.kind,
            "Dropping response with no pending request"
        );
        return;
    };

    // Cache before waking the caller so later discoveries find the record
    if response.success
        && let Some(cid) = &pending.persist
    {
        persist_listing(shared, cid, response.data.as_ref()).await;
    }

    if pending.reply.send(response).is_err() {
        tracing::debug!(
            request_type = pending.request_type,
            "Caller stopped waiting before the response arrived"
        );
    }
}

async fn persist_listing(shared: &Shared, cid: &Cid, data: Option<&Value>) {
    let Some(data) = data else {
        return;
    };
    let entries: Vec<DirectoryEntry> = match serde_json::from_value(data.clone()) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(cid = %cid, error = %e, "Listing response is not a list of entries");
            return;
        }
    };
    if let Err(e) = shared.cache.put(cid, &entries).await {
        tracing::warn!(cid = %cid, error = %e, "Failed to cache listing");
    }
}

async fn relay(shared: &Shared, event: ProgressEvent) {
    if let ProgressEvent::Subdirectory(SubdirectoryProgress::SubdirectoryFound {
        cid,
        path,
        entries,
    }) = &event
    {
        match shared.cache.append_discovered(cid, entries).await {
            Ok(true) => {}
            Ok(false) => tracing::debug!(cid = %cid, path = %path, "No cached record took the discoveries"),
            Err(e) => tracing::warn!(cid = %cid, path = %path, error = %e, "Failed to append discoveries"),
        }
    }

    if event.is_listing() {
        let watchers: Vec<(u64, ProgressCallback)> = shared
            .watchers()
            .iter()
            .filter(|(_, (cid, _))| cid == event.root_cid())
            .map(|(id, (_, callback))| (*id, callback.clone()))
            .collect();
        for (id, callback) in &watchers {
            call_isolated(*id, callback, &event);
        }
    }

    shared.listeners.notify(&event);
}
