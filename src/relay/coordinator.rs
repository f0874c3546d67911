//! Relay coordinator: one URL from source to finalized artifact.
//!
//! The pipeline is strictly sequential. A piece is read from the source, fed
//! to the accumulator, and when a chunk is ready it is pushed and the outcome
//! awaited before the source is read again. At most one chunk is resident and
//! at most one push is in flight per transfer.

use std::sync::Arc;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::accumulator::ChunkAccumulator;
use super::constants::{DEFAULT_CHUNK_RETRY_LIMIT, DEFAULT_CHUNK_SIZE, MAX_STALLED_PUSHES};
use super::retry::{FailureType, RetryDecision, RetryPolicy, run_with_retries};
use super::session::{PushProgress, UploadSession};
use super::sink::{RemoteMetadata, UploadSink};
use super::source::{SourceProvider, file_name_from_url};
use super::types::{ArtifactDescriptor, RelayReceipt};
use super::RelayError;

/// Tunables for a [`RelayCoordinator`].
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Chunk release threshold in bytes.
    pub chunk_size: usize,
    /// Whole-transfer restarts after session-level failures.
    pub transfer_retry: RetryPolicy,
    /// In-place retries of one chunk push after sink-side transient failures.
    pub chunk_retry: RetryPolicy,
    /// Grant anyone-with-link read access after finalizing.
    pub publish: bool,
    /// Consecutive pushes without progress tolerated before giving up.
    pub max_stalled_pushes: u32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            transfer_retry: RetryPolicy::default(),
            chunk_retry: RetryPolicy::with_max_attempts(DEFAULT_CHUNK_RETRY_LIMIT),
            publish: true,
            max_stalled_pushes: MAX_STALLED_PUSHES,
        }
    }
}

impl RelayConfig {
    /// Sets the chunk release threshold.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Sets the transfer-level retry policy.
    #[must_use]
    pub fn with_transfer_retry(mut self, policy: RetryPolicy) -> Self {
        self.transfer_retry = policy;
        self
    }

    /// Sets the chunk-level retry policy.
    #[must_use]
    pub fn with_chunk_retry(mut self, policy: RetryPolicy) -> Self {
        self.chunk_retry = policy;
        self
    }

    /// Enables or disables publishing.
    #[must_use]
    pub fn with_publish(mut self, publish: bool) -> Self {
        self.publish = publish;
        self
    }
}

/// Relays single URLs into the sink.
///
/// Cheap to share behind an `Arc`; the source provider and sink client carry
/// the connection pools.
pub struct RelayCoordinator {
    source: Arc<dyn SourceProvider>,
    sink: Arc<dyn UploadSink>,
    config: RelayConfig,
}

impl std::fmt::Debug for RelayCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayCoordinator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RelayCoordinator {
    /// Creates a coordinator.
    pub fn new(
        source: Arc<dyn SourceProvider>,
        sink: Arc<dyn UploadSink>,
        config: RelayConfig,
    ) -> Self {
        Self {
            source,
            sink,
            config,
        }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Relays `url`, restarting from byte 0 after session-level failures.
    ///
    /// # Errors
    ///
    /// The first terminal failure, or [`RelayError::RetriesExhausted`] once
    /// every attempt ended in a restartable failure.
    pub async fn relay(&self, url: &str) -> Result<RelayReceipt, RelayError> {
        self.relay_cancellable(url, &CancellationToken::new()).await
    }

    /// Like [`relay`](Self::relay), but stops uploading once `cancel` fires.
    ///
    /// Cancellation is honoured until the sink finalizes: the source stream is
    /// dropped and the session abandoned. The push that covers the last byte
    /// is never interrupted, and once the artifact exists the follow-up calls
    /// run to completion so the receipt can be recorded.
    ///
    /// # Errors
    ///
    /// [`RelayError::Cancelled`] when cancelled before finalizing, otherwise
    /// as [`relay`](Self::relay).
    #[instrument(skip(self, url, cancel), fields(url = %url))]
    pub async fn relay_cancellable(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<RelayReceipt, RelayError> {
        info!("starting relay");
        let (artifact, attempts) =
            run_with_retries(&self.config.transfer_retry, url, |attempt| {
                self.relay_once(url, attempt, cancel)
            })
            .await
            .inspect_err(|e| {
                if matches!(e, RelayError::Cancelled) {
                    warn!("relay cancelled");
                }
            })?;
        info!(
            remote_id = %artifact.remote_id,
            size = artifact.size,
            attempts,
            "relay complete"
        );
        Ok(RelayReceipt { artifact, attempts })
    }

    #[instrument(level = "debug", skip(self, url, cancel))]
    async fn relay_once(
        &self,
        url: &str,
        attempt: u32,
        cancel: &CancellationToken,
    ) -> Result<ArtifactDescriptor, RelayError> {
        let mut source = until_cancelled(cancel, self.source.open(url)).await?;
        let total_size = source.declared_size();
        let mime_type = source.mime_type().to_string();

        let mut session = UploadSession::new(
            self.sink.as_ref(),
            &self.config.chunk_retry,
            total_size,
            mime_type.clone(),
        );
        let name = file_name_from_url(url);
        until_cancelled(cancel, session.initiate(name.as_deref())).await?;

        let mut accumulator = ChunkAccumulator::new(self.config.chunk_size);
        let mut stalled = 0u32;
        let mut finalized = None;

        while let Some(piece) = until_cancelled(cancel, source.next_chunk()).await? {
            if let Some(chunk) = accumulator.feed(&piece) {
                finalized = self
                    .push(&mut session, &mut accumulator, chunk, &mut stalled, cancel)
                    .await?;
                if finalized.is_some() {
                    break;
                }
            }
        }

        let remote_id = match finalized {
            Some(remote_id) => remote_id,
            None => {
                self.drain(&mut session, &mut accumulator, &mut stalled, cancel)
                    .await?
            }
        };
        drop(source);

        self.finish(remote_id, &mime_type, total_size).await
    }

    /// Pushes everything left after the source ended until the sink finalizes.
    async fn drain(
        &self,
        session: &mut UploadSession<'_>,
        accumulator: &mut ChunkAccumulator,
        stalled: &mut u32,
        cancel: &CancellationToken,
    ) -> Result<String, RelayError> {
        loop {
            let Some(chunk) = accumulator.flush() else {
                return Err(RelayError::sink_protocol(format!(
                    "source exhausted with {} of {} bytes confirmed and no finalization",
                    session.bytes_confirmed(),
                    session.total_size()
                )));
            };
            if let Some(remote_id) = self
                .push(session, accumulator, chunk, stalled, cancel)
                .await?
            {
                return Ok(remote_id);
            }
        }
    }

    /// Pushes one chunk, returns the unconfirmed tail to the accumulator and
    /// tracks pushes that confirmed nothing.
    async fn push(
        &self,
        session: &mut UploadSession<'_>,
        accumulator: &mut ChunkAccumulator,
        chunk: Bytes,
        stalled: &mut u32,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, RelayError> {
        let before = session.bytes_confirmed();
        if cancel.is_cancelled() {
            session.abort();
            return Err(RelayError::Cancelled);
        }
        let covers_last_byte = before + chunk.len() as u64 >= session.total_size();
        let progress = if covers_last_byte {
            session.push_chunk(chunk).await
        } else {
            until_cancelled(cancel, session.push_chunk(chunk)).await
        };
        match progress? {
            PushProgress::Finalized { remote_id } => Ok(Some(remote_id)),
            PushProgress::Accepted {
                confirmed,
                retained,
            } => {
                accumulator.restore_tail(&retained);
                if confirmed > before {
                    *stalled = 0;
                    return Ok(None);
                }
                *stalled += 1;
                if *stalled >= self.config.max_stalled_pushes {
                    session.abort();
                    return Err(RelayError::sink_protocol(format!(
                        "sink confirmed nothing past {confirmed} in {} consecutive pushes",
                        *stalled
                    )));
                }
                Ok(None)
            }
        }
    }

    /// Post-finalize side effects. Failures here never re-run the upload.
    async fn finish(
        &self,
        remote_id: String,
        mime_type: &str,
        total_size: u64,
    ) -> Result<ArtifactDescriptor, RelayError> {
        if self.config.publish {
            self.sink
                .publish(&remote_id)
                .await
                .map_err(|e| RelayError::post_finalize(&remote_id, "publish", e))?;
        }

        let metadata = self
            .fetch_metadata(&remote_id)
            .await
            .map_err(|e| RelayError::post_finalize(&remote_id, "metadata", e))?;

        Ok(ArtifactDescriptor {
            mime_type: metadata
                .mime_type
                .clone()
                .unwrap_or_else(|| mime_type.to_string()),
            size: metadata.size_bytes().unwrap_or(total_size),
            view_url: metadata.web_view_link,
            download_url: metadata.web_content_link,
            remote_id,
        })
    }

    async fn fetch_metadata(&self, remote_id: &str) -> Result<RemoteMetadata, RelayError> {
        let mut failures = 0u32;
        loop {
            match self.sink.fetch_metadata(remote_id).await {
                Ok(metadata) => return Ok(metadata),
                Err(RelayError::SinkTransient { status, .. }) => {
                    failures += 1;
                    match self
                        .config
                        .chunk_retry
                        .should_retry(FailureType::Transient, failures)
                    {
                        RetryDecision::Retry { delay, .. } => {
                            debug!(remote_id, attempt = failures, "retrying metadata read");
                            tokio::time::sleep(delay).await;
                        }
                        RetryDecision::DoNotRetry { .. } => {
                            return Err(RelayError::SinkTransient {
                                status,
                                attempts: failures,
                            });
                        }
                    }
                }
                Err(error) => return Err(error),
            }
        }
    }
}

/// Runs `work` unless `cancel` fires first.
async fn until_cancelled<T>(
    cancel: &CancellationToken,
    work: impl Future<Output = Result<T, RelayError>>,
) -> Result<T, RelayError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(RelayError::Cancelled),
        result = work => result,
    }
}
