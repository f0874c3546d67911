//! Batch driver: relays many URLs concurrently and records the results.
//!
//! Every input URL gets exactly one [`BatchEntry`], in input order, whatever
//! happens to the others. A failing URL never fails the batch; only input
//! validation and infrastructure problems surface as [`BatchError`].

mod validation;

pub use validation::validate_source_urls;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::relay::{
    RelayCoordinator, RelayError, TransferFailure, TransferRequest, TransferResult, UploadSink,
};
use crate::store::{FileRecord, FileRepository, NewFileRecord, StoreError};

/// Minimum allowed concurrency.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency.
const MAX_CONCURRENCY: usize = 100;

/// Default number of URLs relayed at once.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Errors that stop a batch operation as a whole.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    /// No URLs were given.
    #[error("no URLs to upload")]
    EmptyInput,

    /// An entry is not an absolute URL.
    #[error("invalid URL at position {position}: {url}")]
    InvalidUrl {
        /// 1-based position in the input.
        position: usize,
        /// The rejected entry.
        url: String,
    },

    /// Concurrency outside the allowed range.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The rejected value.
        value: usize,
    },

    /// No stored record for the URL.
    #[error("no uploaded file recorded for {source_url}")]
    NotFound {
        /// The URL that was looked up.
        source_url: String,
    },

    /// Metadata store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Sink failure outside a transfer (delete).
    #[error("sink error: {0}")]
    Sink(#[from] RelayError),

    /// The concurrency semaphore was closed.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,
}

/// Counters for one batch run, updated from concurrent tasks.
#[derive(Debug, Default)]
pub struct BatchStats {
    completed: AtomicUsize,
    failed: AtomicUsize,
    restarted: AtomicUsize,
}

impl BatchStats {
    /// Zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// URLs uploaded and recorded.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// URLs that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Transfer restarts across all URLs.
    #[must_use]
    pub fn restarted(&self) -> usize {
        self.restarted.load(Ordering::SeqCst)
    }

    /// Completed plus failed.
    #[must_use]
    pub fn total(&self) -> usize {
        self.completed() + self.failed()
    }

    fn snapshot(&self) -> Self {
        Self {
            completed: AtomicUsize::new(self.completed()),
            failed: AtomicUsize::new(self.failed()),
            restarted: AtomicUsize::new(self.restarted()),
        }
    }
}

/// Outcome for one input URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchEntry {
    /// The input URL.
    pub source_url: String,
    /// Uploaded artifact or failure reason.
    pub result: TransferResult,
    /// Store id of the recorded artifact.
    pub record_id: Option<i64>,
    /// Transfer attempts used; 0 when the relay never produced a receipt.
    pub attempts: u32,
}

impl BatchEntry {
    fn failed(source_url: &str, reason: impl Into<String>, attempts: u32) -> Self {
        Self {
            source_url: source_url.to_string(),
            result: TransferResult::Failed(TransferFailure {
                source_url: source_url.to_string(),
                reason: reason.into(),
            }),
            record_id: None,
            attempts,
        }
    }
}

/// Result of [`BatchDriver::upload_all`].
#[derive(Debug)]
pub struct BatchReport {
    /// One entry per input URL, in input order.
    pub entries: Vec<BatchEntry>,
    /// Aggregate counters.
    pub stats: BatchStats,
}

impl BatchReport {
    /// Entries that uploaded.
    pub fn uploaded(&self) -> impl Iterator<Item = &BatchEntry> {
        self.entries.iter().filter(|e| e.result.is_uploaded())
    }

    /// Entries that failed.
    pub fn failures(&self) -> impl Iterator<Item = &BatchEntry> {
        self.entries.iter().filter(|e| !e.result.is_uploaded())
    }
}

/// Runs relays for many URLs and keeps the metadata store in sync.
pub struct BatchDriver {
    coordinator: Arc<RelayCoordinator>,
    sink: Arc<dyn UploadSink>,
    repository: Arc<dyn FileRepository>,
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    cancel: CancellationToken,
}

impl std::fmt::Debug for BatchDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchDriver")
            .field("concurrency", &self.concurrency)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl BatchDriver {
    /// Creates a driver relaying at most `concurrency` URLs at once.
    ///
    /// `sink` must be the sink the coordinator uploads to; it is used for deletes.
    ///
    /// # Errors
    ///
    /// [`BatchError::InvalidConcurrency`] outside `1..=100`.
    #[instrument(level = "debug", skip(coordinator, sink, repository))]
    pub fn new(
        coordinator: Arc<RelayCoordinator>,
        sink: Arc<dyn UploadSink>,
        repository: Arc<dyn FileRepository>,
        concurrency: usize,
    ) -> Result<Self, BatchError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(BatchError::InvalidConcurrency { value: concurrency });
        }
        Ok(Self {
            coordinator,
            sink,
            repository,
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            cancel: CancellationToken::new(),
        })
    }

    /// Uses `cancel` to abort in-flight relays.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that aborts the running batch when cancelled.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Relays every URL and records each uploaded artifact.
    ///
    /// # Errors
    ///
    /// Only input validation and [`BatchError::SemaphoreClosed`]; per-URL
    /// failures are reported in the returned entries.
    #[instrument(skip(self, urls), fields(count = urls.len()))]
    pub async fn upload_all(&self, urls: &[String]) -> Result<BatchReport, BatchError> {
        validate_source_urls(urls)?;

        info!(concurrency = self.concurrency, "starting batch upload");
        let stats = Arc::new(BatchStats::new());
        let mut handles = Vec::with_capacity(urls.len());

        for url in urls {
            let request = TransferRequest::new(url.as_str());
            let permit = self
                .semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| BatchError::SemaphoreClosed)?;

            let coordinator = Arc::clone(&self.coordinator);
            let repository = Arc::clone(&self.repository);
            let stats = Arc::clone(&stats);
            let cancel = self.cancel.clone();

            handles.push((
                request.source_url.clone(),
                tokio::spawn(async move {
                    let _permit = permit;
                    relay_and_record(&coordinator, repository.as_ref(), &request, &cancel, &stats)
                        .await
                }),
            ));
        }

        let mut entries = Vec::with_capacity(handles.len());
        for (source_url, handle) in handles {
            match handle.await {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    warn!(url = %source_url, error = %e, "relay task panicked");
                    stats.failed.fetch_add(1, Ordering::SeqCst);
                    entries.push(BatchEntry::failed(
                        &source_url,
                        format!("relay task failed: {e}"),
                        0,
                    ));
                }
            }
        }

        info!(
            completed = stats.completed(),
            failed = stats.failed(),
            restarted = stats.restarted(),
            "batch upload complete"
        );

        let stats = Arc::try_unwrap(stats).unwrap_or_else(|shared| shared.snapshot());
        Ok(BatchReport { entries, stats })
    }

    /// Every stored record.
    ///
    /// # Errors
    ///
    /// [`BatchError::Store`] if the query fails.
    pub async fn list_all(&self) -> Result<Vec<FileRecord>, BatchError> {
        Ok(self.repository.find_all().await?)
    }

    /// Deletes the newest record for `source_url` together with its remote artifact.
    ///
    /// An artifact the sink no longer knows is treated as already deleted.
    ///
    /// # Errors
    ///
    /// [`BatchError::NotFound`] without a record, [`BatchError::Sink`] if the
    /// sink refuses, [`BatchError::Store`] if the record cannot be removed.
    #[instrument(skip(self))]
    pub async fn delete_by_source_url(&self, source_url: &str) -> Result<FileRecord, BatchError> {
        let record = self
            .repository
            .find_by_source_url(source_url)
            .await?
            .ok_or_else(|| BatchError::NotFound {
                source_url: source_url.to_string(),
            })?;

        match self.sink.delete(&record.remote_id).await {
            Ok(()) => {}
            Err(RelayError::NotFound { .. }) => {
                warn!(remote_id = %record.remote_id, "remote artifact already gone");
            }
            Err(e) => return Err(BatchError::Sink(e)),
        }

        self.repository.delete_by_id(record.id).await?;
        info!(remote_id = %record.remote_id, record_id = record.id, "deleted uploaded file");
        Ok(record)
    }
}

async fn relay_and_record(
    coordinator: &RelayCoordinator,
    repository: &dyn FileRepository,
    request: &TransferRequest,
    cancel: &CancellationToken,
    stats: &BatchStats,
) -> BatchEntry {
    let url = request.source_url.as_str();
    let receipt = match coordinator.relay_cancellable(url, cancel).await {
        Ok(receipt) => receipt,
        Err(e) => {
            warn!(url = %url, error = %e, "relay failed");
            stats.failed.fetch_add(1, Ordering::SeqCst);
            if let RelayError::RetriesExhausted { attempts, .. } = &e {
                stats
                    .restarted
                    .fetch_add(attempts.saturating_sub(1) as usize, Ordering::SeqCst);
            }
            return BatchEntry {
                source_url: url.to_string(),
                result: TransferResult::Failed(TransferFailure::from_error(url, &e)),
                record_id: None,
                attempts: 0,
            };
        }
    };

    stats
        .restarted
        .fetch_add(receipt.attempts.saturating_sub(1) as usize, Ordering::SeqCst);

    let record = NewFileRecord::from_artifact(url, &receipt.artifact);
    match repository.create(&record).await {
        Ok(stored) => {
            debug!(url = %url, record_id = stored.id, "recorded upload");
            stats.completed.fetch_add(1, Ordering::SeqCst);
            BatchEntry {
                source_url: url.to_string(),
                result: TransferResult::Uploaded(receipt.artifact),
                record_id: Some(stored.id),
                attempts: receipt.attempts,
            }
        }
        Err(e) => {
            warn!(url = %url, remote_id = %receipt.artifact.remote_id, error = %e, "failed to record upload");
            stats.failed.fetch_add(1, Ordering::SeqCst);
            BatchEntry::failed(
                url,
                format!(
                    "artifact {} was uploaded but recording it failed: {e}",
                    receipt.artifact.remote_id
                ),
                receipt.attempts,
            )
        }
    }
}
