//! Network client capability consumed by the worker.

use crate::error::ClientResult;
use async_trait::async_trait;
use axum::http::{HeaderMap, Method, StatusCode};
use bytes::Bytes;
use cairn_core::{Cid, DirectoryEntry};
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;

/// Stream of directory entries in iteration order.
pub type EntryStream = Pin<Box<dyn Stream<Item = ClientResult<DirectoryEntry>> + Send>>;

/// Stream of response body chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = ClientResult<Bytes>> + Send>>;

/// A verified fetch result. The body has not been read yet.
pub struct FetchResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ByteStream,
}

/// Content-addressed network client.
///
/// Verification of fetched bytes against their CID is the client's concern;
/// the worker only orchestrates calls.
#[async_trait]
pub trait NetworkClient: Send + Sync + 'static {
    /// Enumerate the immediate children of the directory node `cid`.
    async fn ls(&self, cid: &Cid) -> ClientResult<EntryStream>;

    /// Fetch `ipfs://<cid>[/<path>]`, forwarding `headers` upstream.
    async fn fetch(
        &self,
        url: &str,
        method: &Method,
        headers: &HeaderMap,
    ) -> ClientResult<FetchResponse>;

    /// Static identifier of the client implementation, used in logs.
    fn backend_name(&self) -> &'static str;
}

/// Builds the network client. Called by [`crate::handle::ClientHandle`].
#[async_trait]
pub trait ClientFactory: Send + Sync + 'static {
    async fn build(&self) -> ClientResult<Arc<dyn NetworkClient>>;
}
