//! Request handling for connected pages.
//!
//! Each page talks to the worker through a pair of unbounded channels:
//! envelopes in, [`WorkerMessage`]s out. Responses and progress broadcasts
//! share the outbound channel, so a page sees them in send order.

use crate::bus::{PageId, PageSender};
use crate::routes::create_router;
use crate::state::WorkerState;
use crate::walker::DirectoryWalker;
use axum::Router;
use cairn_core::{
    Envelope, MessageId, RawEnvelope, Request, Response, WorkerMessage, extract_pairs,
};
use serde::Serialize;
use tokio::sync::mpsc;

/// A page's connection to the worker.
pub struct PageChannel {
    pub page: PageId,
    /// Requests to the worker.
    pub requests: mpsc::UnboundedSender<Envelope>,
    /// Responses and progress broadcasts from the worker.
    pub messages: mpsc::UnboundedReceiver<WorkerMessage>,
    /// The worker's interception router, for content requests.
    pub interceptor: Router,
}

/// The worker process: owns the state every page connection shares.
#[derive(Clone)]
pub struct ServiceWorker {
    state: WorkerState,
}

impl ServiceWorker {
    pub fn new(state: WorkerState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &WorkerState {
        &self.state
    }

    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    /// Connect a new page.
    ///
    /// The page is registered with the progress bus and served until its
    /// request sender is dropped.
    pub fn connect(&self) -> PageChannel {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (message_tx, message_rx) = mpsc::unbounded_channel();
        let page = self.state.bus.register(message_tx.clone());

        tokio::spawn(serve_page(self.state.clone(), page, request_rx, message_tx));

        PageChannel {
            page,
            requests: request_tx,
            messages: message_rx,
            interceptor: self.router(),
        }
    }
}

async fn serve_page(
    state: WorkerState,
    page: PageId,
    mut requests: mpsc::UnboundedReceiver<Envelope>,
    replies: PageSender,
) {
    tracing::debug!(page, "Page connected");
    while let Some(envelope) = requests.recv().await {
        submit(&state, envelope, &replies);
    }
    state.bus.unregister(page);
    tracing::debug!(page, "Page disconnected");
}

/// Route one request from a page.
///
/// Claims take effect before this returns; other requests run on their own
/// task and reply to `replies`.
pub fn submit(state: &WorkerState, envelope: Envelope, replies: &PageSender) {
    if envelope.request == Request::ClaimClients {
        state.bus.claim();
        return;
    }

    let state = state.clone();
    let replies = replies.clone();
    tokio::spawn(async move { dispatch(&state, envelope, &replies).await });
}

/// Route a wire envelope, answering unknown or malformed requests with a
/// failure response.
pub fn submit_raw(state: &WorkerState, raw: RawEnvelope, replies: &PageSender) {
    let kind = raw.kind.clone();
    let id = raw.id;
    match Envelope::try_from(raw) {
        Ok(envelope) => submit(state, envelope, replies),
        Err(e) => {
            tracing::warn!(kind = %kind, id = %id, error = %e, "Rejecting request");
            reply(replies, Response::failure(&kind, id, e.to_string()));
        }
    }
}

/// Handle one request to completion.
pub async fn dispatch(state: &WorkerState, envelope: Envelope, replies: &PageSender) {
    let Envelope { id, request } = envelope;
    let kind = request.kind();

    match request {
        Request::ShallowRetrieval { cid } => {
            let mut walker = DirectoryWalker::new(state.handle.clone());
            match walker.shallow_list(&cid, state.bus.as_ref()).await {
                Ok(entries) => {
                    reply(replies, success(kind, id, &entries));

                    // Background work starts after the response is queued
                    let tasks = walker.take_tasks();
                    if !tasks.is_empty() {
                        tracing::debug!(cid = %cid, tasks = tasks.len(), "Spawning subdirectory processing");
                        let bus = state.bus.clone();
                        tokio::spawn(async move {
                            walker
                                .process_subdirectories(&cid, tasks, bus.as_ref())
                                .await;
                        });
                    }
                }
                Err(e) => reply(replies, Response::failure(kind, id, e.to_string())),
            }
        }
        Request::ExtractPairs { files } => {
            let pairs = extract_pairs(&files);
            tracing::debug!(files = files.len(), pairs = pairs.len(), "Extracted pairs");
            reply(replies, success(kind, id, &pairs));
        }
        Request::ClaimClients => {
            state.bus.claim();
        }
    }
}

fn success<T: Serialize>(kind: &str, id: MessageId, data: &T) -> Response {
    match serde_json::to_value(data) {
        Ok(data) => Response::success(kind, id, data),
        Err(e) => Response::failure(kind, id, format!("failed to encode response: {e}")),
    }
}

fn reply(replies: &PageSender, response: Response) {
    if replies.send(WorkerMessage::Response(response)).is_err() {
        tracing::debug!("Page went away before its response was sent");
    }
}
