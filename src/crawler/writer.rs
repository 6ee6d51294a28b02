//! Single owner of the store during the detail phase
//!
//! Parser workers hand their results to one writer task over a channel, so
//! writes for the same property never interleave. The writer also folds every
//! outcome into the run summary.

use crate::crawler::detail::persist_detail;
use crate::extract::DetailPage;
use crate::state::{RunSummary, ScrapeOutcome, SkipReason};
use crate::storage::{StorageError, Store};
use crate::TrawlError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Log progress after this many processed URLs
const PROGRESS_EVERY: u64 = 50;

/// The result of processing one detail-page URL, on its way to the store
#[derive(Debug)]
pub struct WriteRequest {
    pub url: String,
    pub result: Result<DetailPage, SkipReason>,
}

/// Cloneable sender side of a [`StoreWriter`]
#[derive(Debug, Clone)]
pub struct WriterHandle {
    tx: mpsc::UnboundedSender<WriteRequest>,
}

impl WriterHandle {
    /// Queues one URL's result for the writer
    ///
    /// Fails with [`TrawlError::WriterGone`] once the writer has stopped.
    pub fn submit(
        &self,
        url: String,
        result: Result<DetailPage, SkipReason>,
    ) -> Result<(), TrawlError> {
        self.tx
            .send(WriteRequest { url, result })
            .map_err(|_| TrawlError::WriterGone)
    }
}

/// What the writer hands back when it stops
pub struct WriterOutput<S> {
    pub store: S,
    pub summary: RunSummary,

    /// The store error that stopped the writer early, if any
    pub error: Option<StorageError>,
}

/// Background task that owns the store and applies every write
pub struct StoreWriter<S> {
    handle: WriterHandle,
    task: JoinHandle<WriterOutput<S>>,
}

impl<S: Store + Send + 'static> StoreWriter<S> {
    /// Starts the writer on the blocking pool
    ///
    /// # Arguments
    ///
    /// * `store` - The job's store, owned by the writer until [`StoreWriter::finish`]
    /// * `summary` - Totals to extend, usually holding the discovery report
    /// * `on_failure` - Cancelled when a store error stops the writer
    pub fn spawn(store: S, summary: RunSummary, on_failure: CancellationToken) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::task::spawn_blocking(move || run_writer(store, summary, rx, on_failure));

        Self {
            handle: WriterHandle { tx },
            task,
        }
    }

    pub fn handle(&self) -> WriterHandle {
        self.handle.clone()
    }

    /// Waits for every queued write, then returns the store and totals
    ///
    /// Outstanding [`WriterHandle`] clones must be dropped first.
    pub async fn finish(self) -> Result<WriterOutput<S>, TrawlError> {
        drop(self.handle);
        self.task
            .await
            .map_err(|e| TrawlError::Task(format!("store writer: {}", e)))
    }
}

fn run_writer<S: Store>(
    mut store: S,
    mut summary: RunSummary,
    mut rx: mpsc::UnboundedReceiver<WriteRequest>,
    on_failure: CancellationToken,
) -> WriterOutput<S> {
    let mut error = None;

    while let Some(WriteRequest { url, result }) = rx.blocking_recv() {
        let outcome = match result {
            Ok(page) => match persist_detail(&mut store, &page) {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!("Store write failed for {}: {}", url, e);
                    error = Some(e);
                    on_failure.cancel();
                    break;
                }
            },
            Err(reason) => ScrapeOutcome::Skipped(reason),
        };

        match &outcome {
            ScrapeOutcome::Skipped(reason) => tracing::warn!("Skipped {}: {}", url, reason),
            ScrapeOutcome::Persisted {
                property,
                units_inserted,
                ..
            } => tracing::debug!("{:?} {} with {} units", property, url, units_inserted),
        }

        summary.record(&outcome);

        if summary.urls_processed % PROGRESS_EVERY == 0 {
            tracing::info!(
                "Progress: {} URLs processed, {} properties stored, {} skipped",
                summary.urls_processed,
                summary.properties_persisted(),
                summary.skipped
            );
        }
    }

    WriterOutput {
        store,
        summary,
        error,
    }
}
