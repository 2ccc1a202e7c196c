//! Progress events emitted while walking a directory tree.

use crate::cid::Cid;
use crate::entry::DirectoryEntry;
use serde::{Deserialize, Serialize};

/// A progress event, either from a shallow listing or from background
/// subdirectory processing.
///
/// Shallow events are discriminated by `stage`, background events by `type`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProgressEvent {
    Listing(ListingProgress),
    Subdirectory(SubdirectoryProgress),
}

/// Stages of a shallow listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum ListingProgress {
    Starting {
        cid: Cid,
    },
    Listing {
        cid: Cid,
        /// Entries seen so far.
        count: usize,
        /// Name of the most recent entry.
        last_entry: String,
    },
    Complete {
        cid: Cid,
        total: usize,
        elapsed_ms: u64,
    },
    Error {
        cid: Cid,
        message: String,
    },
}

/// Outcomes of background subdirectory processing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SubdirectoryProgress {
    SubdirectoryFound {
        /// Root CID of the traversal.
        cid: Cid,
        path: String,
        entries: Vec<DirectoryEntry>,
    },
    SubdirectoryError {
        cid: Cid,
        path: String,
        message: String,
    },
}

impl ProgressEvent {
    /// Root CID of the traversal this event belongs to.
    pub fn root_cid(&self) -> &Cid {
        match self {
            Self::Listing(
                ListingProgress::Starting { cid }
                | ListingProgress::Listing { cid, .. }
                | ListingProgress::Complete { cid, .. }
                | ListingProgress::Error { cid, .. },
            ) => cid,
            Self::Subdirectory(
                SubdirectoryProgress::SubdirectoryFound { cid, .. }
                | SubdirectoryProgress::SubdirectoryError { cid, .. },
            ) => cid,
        }
    }

    /// Whether this event belongs to a shallow listing.
    pub fn is_listing(&self) -> bool {
        matches!(self, Self::Listing(_))
    }
}

impl From<ListingProgress> for ProgressEvent {
    fn from(progress: ListingProgress) -> Self {
        Self::Listing(progress)
    }
}

impl From<SubdirectoryProgress> for ProgressEvent {
    fn from(progress: SubdirectoryProgress) -> Self {
        Self::Subdirectory(progress)
    }
}
