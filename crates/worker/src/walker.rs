//! Two-phase directory traversal.
//!
//! A shallow pass lists the root's immediate children and queues every
//! subdirectory. The queued tasks are then listed one level deep in the
//! background, each outcome reported as a progress event.

use crate::client::NetworkClient;
use crate::error::{WorkerError, WorkerResult};
use crate::handle::ClientHandle;
use cairn_core::{
    Cid, DirectoryEntry, ListingProgress, ProgressEvent, SubdirectoryProgress, SubdirectoryTask,
};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

/// Entries reported individually before switching to sampled reporting.
const EAGER_PROGRESS_ENTRIES: usize = 10;

/// Sampling interval for `listing` events after the eager phase.
const PROGRESS_INTERVAL: usize = 50;

/// Receiver of progress events.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn emit(&self, event: ProgressEvent) {
        self(event)
    }
}

/// Outcome counts of one background pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WalkSummary {
    pub found: usize,
    pub empty: usize,
    pub failed: usize,
}

fn should_report(count: usize) -> bool {
    count <= EAGER_PROGRESS_ENTRIES || count % PROGRESS_INTERVAL == 0
}

pub struct DirectoryWalker {
    handle: Arc<ClientHandle>,
    queue: Vec<SubdirectoryTask>,
}

impl DirectoryWalker {
    pub fn new(handle: Arc<ClientHandle>) -> Self {
        Self {
            handle,
            queue: Vec::new(),
        }
    }

    /// List the immediate children of `cid`, queueing its subdirectories.
    ///
    /// Emits `starting`, sampled `listing` events and then `complete`, or
    /// `error` when listing fails.
    pub async fn shallow_list(
        &mut self,
        cid: &Cid,
        sink: &dyn ProgressSink,
    ) -> WorkerResult<Vec<DirectoryEntry>> {
        sink.emit(ListingProgress::Starting { cid: cid.clone() }.into());
        let started = Instant::now();

        let result = match self.handle.acquire().await {
            Ok(client) => list_children(client.as_ref(), cid, Some(sink)).await,
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(entries) => {
                self.queue.extend(
                    entries
                        .iter()
                        .filter(|e| e.is_directory())
                        .map(SubdirectoryTask::from_entry),
                );
                let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                tracing::info!(
                    cid = %cid,
                    total = entries.len(),
                    subdirectories = self.queue.len(),
                    elapsed_ms,
                    "Shallow listing complete"
                );
                sink.emit(
                    ListingProgress::Complete {
                        cid: cid.clone(),
                        total: entries.len(),
                        elapsed_ms,
                    }
                    .into(),
                );
                Ok(entries)
            }
            Err(e) => {
                tracing::warn!(cid = %cid, error = %e, "Shallow listing failed");
                sink.emit(
                    ListingProgress::Error {
                        cid: cid.clone(),
                        message: e.to_string(),
                    }
                    .into(),
                );
                Err(e)
            }
        }
    }

    /// Tasks queued so far.
    pub fn queued(&self) -> &[SubdirectoryTask] {
        &self.queue
    }

    /// Drain the task queue.
    pub fn take_tasks(&mut self) -> Vec<SubdirectoryTask> {
        std::mem::take(&mut self.queue)
    }

    /// List each task's children, reporting one outcome per task.
    ///
    /// Entry names are prefixed with the task path. Empty subdirectories emit
    /// nothing. Failures are reported and do not stop the remaining tasks.
    /// Nested subdirectories found here are not descended into.
    pub async fn process_subdirectories(
        &self,
        root: &Cid,
        tasks: Vec<SubdirectoryTask>,
        sink: &dyn ProgressSink,
    ) -> WalkSummary {
        let mut summary = WalkSummary::default();

        for task in tasks {
            let span = tracing::debug_span!("subdirectory", root = %root, path = %task.path);
            let outcome: WorkerResult<Vec<DirectoryEntry>> = async {
                let client = self.handle.acquire().await?;
                list_children(client.as_ref(), &task.cid, None).await
            }
            .instrument(span)
            .await;

            match outcome {
                Ok(entries) if entries.is_empty() => summary.empty += 1,
                Ok(entries) => {
                    summary.found += 1;
                    let entries = entries.iter().map(|e| e.nested_under(&task.path)).collect();
                    sink.emit(
                        SubdirectoryProgress::SubdirectoryFound {
                            cid: root.clone(),
                            path: task.path,
                            entries,
                        }
                        .into(),
                    );
                }
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!(root = %root, path = %task.path, error = %e, "Subdirectory listing failed");
                    sink.emit(
                        SubdirectoryProgress::SubdirectoryError {
                            cid: root.clone(),
                            path: task.path,
                            message: e.to_string(),
                        }
                        .into(),
                    );
                }
            }
        }

        tracing::info!(
            root = %root,
            found = summary.found,
            empty = summary.empty,
            failed = summary.failed,
            "Background subdirectory processing finished"
        );
        summary
    }
}

/// Collect the children of `cid`, emitting sampled `listing` events to `sink`.
async fn list_children(
    client: &dyn NetworkClient,
    cid: &Cid,
    sink: Option<&dyn ProgressSink>,
) -> WorkerResult<Vec<DirectoryEntry>> {
    let mut stream = client.ls(cid).await?;
    let mut entries = Vec::new();

    while let Some(entry) = stream.next().await {
        let entry = entry.map_err(WorkerError::from)?;
        entries.push(entry);

        let count = entries.len();
        if let Some(sink) = sink
            && should_report(count)
        {
            sink.emit(
                ListingProgress::Listing {
                    cid: cid.clone(),
                    count,
                    last_entry: entries[count - 1].name.clone(),
                }
                .into(),
            );
        }
    }

    Ok(entries)
}
