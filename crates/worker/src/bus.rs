//! Delivery of progress broadcasts to connected pages.

use crate::walker::ProgressSink;
use cairn_core::{ProgressEvent, WorkerMessage};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::mpsc;

/// Identifier of a registered page.
pub type PageId = u64;

/// Outbound queue of one page.
pub type PageSender = mpsc::UnboundedSender<WorkerMessage>;

struct PageSlot {
    sender: PageSender,
    controlled: bool,
}

/// Membership table of connected pages.
///
/// Only controlled pages receive broadcasts. A page becomes controlled when
/// any page sends `CLAIM_CLIENTS`, or on registration once a claim happened.
#[derive(Default)]
pub struct ProgressBus {
    pages: DashMap<PageId, PageSlot>,
    next_id: AtomicU64,
    claimed: AtomicBool,
}

impl ProgressBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, sender: PageSender) -> PageId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let controlled = self.claimed.load(Ordering::SeqCst);
        self.pages.insert(id, PageSlot { sender, controlled });
        tracing::debug!(page = id, controlled, "Page registered");
        id
    }

    pub fn unregister(&self, id: PageId) {
        if self.pages.remove(&id).is_some() {
            tracing::debug!(page = id, "Page unregistered");
        }
    }

    /// Take control of every registered page and all future ones.
    ///
    /// Returns the number of pages now controlled.
    pub fn claim(&self) -> usize {
        self.claimed.store(true, Ordering::SeqCst);
        let mut count = 0;
        for mut page in self.pages.iter_mut() {
            page.controlled = true;
            count += 1;
        }
        tracing::info!(pages = count, "Claimed pages");
        count
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::SeqCst)
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Deliver `event` to every controlled page. Returns the delivery count.
    ///
    /// Pages whose channel is closed are removed.
    pub fn broadcast(&self, event: ProgressEvent) -> usize {
        let message = WorkerMessage::progress(event);
        let mut delivered = 0;
        let mut closed = Vec::new();

        for page in self.pages.iter() {
            if !page.controlled {
                continue;
            }
            if page.sender.send(message.clone()).is_ok() {
                delivered += 1;
            } else {
                closed.push(*page.key());
            }
        }

        // Removal happens after iteration to avoid holding shard locks
        for id in closed {
            tracing::debug!(page = id, "Pruning disconnected page");
            self.pages.remove(&id);
        }

        delivered
    }
}

impl ProgressSink for ProgressBus {
    fn emit(&self, event: ProgressEvent) {
        self.broadcast(event);
    }
}
