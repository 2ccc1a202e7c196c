//! Core domain types and shared logic for cairn.
//!
//! This crate defines the data model used across all other crates:
//! - Content identifiers and directory entries
//! - The page/worker message protocol
//! - Progress events for shallow and background listings
//! - Content-type inference and content/metadata pairing
//! - Configuration

pub mod cid;
pub mod config;
pub mod entry;
pub mod error;
pub mod message;
pub mod mime;
pub mod pairs;
pub mod progress;

pub use cid::Cid;
pub use entry::{DirectoryEntry, EntryKind, SubdirectoryTask};
pub use error::{Error, Result};
pub use message::{Envelope, MessageId, RawEnvelope, Request, Response, WorkerMessage};
pub use pairs::{FilePair, extract_pairs};
pub use progress::{ListingProgress, ProgressEvent, SubdirectoryProgress};

/// Path prefix of intercepted content requests.
pub const INTERCEPT_PREFIX: &str = "/ipfs-sw/";
