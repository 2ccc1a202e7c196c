//! Retrieval worker for cairn.
//!
//! This crate provides the long-lived worker process:
//! - Lazy, coalesced construction of the network client
//! - Shallow and background directory listing with progress broadcasts
//! - Interception of `/ipfs-sw/` content requests
//! - Page connections over in-process channels or WebSocket

pub mod blockstore;
pub mod bus;
pub mod channel;
pub mod client;
pub mod content;
pub mod error;
pub mod gateway;
pub mod handle;
pub mod routes;
pub mod state;
pub mod walker;
pub mod worker;

pub use bus::{PageId, PageSender, ProgressBus};
pub use client::{ByteStream, ClientFactory, EntryStream, FetchResponse, NetworkClient};
pub use content::{ContentGateway, ContentRequest};
pub use error::{ClientError, ClientResult, WorkerError, WorkerResult};
pub use gateway::{GatewayClient, GatewayClientFactory};
pub use handle::ClientHandle;
pub use routes::create_router;
pub use state::WorkerState;
pub use walker::{DirectoryWalker, ProgressSink, WalkSummary};
pub use worker::{PageChannel, ServiceWorker};
