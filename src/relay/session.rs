//! Resumable upload session state machine.
//!
//! ```text
//! Uninitialized -> Open -> Uploading <-> AwaitingRange -> Finalized
//!                     \________________________________-> Aborted
//! ```
//!
//! The session owns the confirmed offset. Every push starts exactly at
//! `bytes_confirmed`; bytes the sink did not confirm are handed back to the
//! caller as `retained` and must be the first bytes of the next push.
//!
//! Sink-side transient failures are retried here, in place, under the chunk
//! retry policy. They never reach the transfer-level orchestrator unless the
//! cap is hit.

use std::fmt;

use bytes::Bytes;
use tracing::{debug, warn};

use super::retry::{FailureType, RetryDecision, RetryPolicy};
use super::sink::{ChunkOutcome, ChunkPush, InitiateUpload, UploadSink};
use super::RelayError;

/// Lifecycle state of an [`UploadSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, no session URI yet.
    Uninitialized,
    /// Session URI obtained, nothing pushed.
    Open,
    /// Last push was accepted; ready for the next chunk.
    Uploading,
    /// A push is in flight and the sink's confirmed range is pending.
    AwaitingRange,
    /// The artifact exists.
    Finalized,
    /// The session can no longer be used.
    Aborted,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Open => "open",
            Self::Uploading => "uploading",
            Self::AwaitingRange => "awaiting range",
            Self::Finalized => "finalized",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// What a successful push achieved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushProgress {
    /// The sink confirmed a prefix.
    Accepted {
        /// New confirmed offset.
        confirmed: u64,
        /// Unconfirmed suffix of the pushed chunk, possibly empty.
        retained: Bytes,
    },
    /// The upload is complete.
    Finalized {
        /// Artifact id.
        remote_id: String,
    },
}

/// One resumable upload of `total_size` bytes.
pub struct UploadSession<'s> {
    sink: &'s dyn UploadSink,
    chunk_retry: &'s RetryPolicy,
    session_uri: Option<String>,
    bytes_confirmed: u64,
    total_size: u64,
    mime_type: String,
    state: SessionState,
}

impl fmt::Debug for UploadSession<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadSession")
            .field("session_uri", &self.session_uri)
            .field("bytes_confirmed", &self.bytes_confirmed)
            .field("total_size", &self.total_size)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<'s> UploadSession<'s> {
    /// Creates an uninitialized session.
    pub fn new(
        sink: &'s dyn UploadSink,
        chunk_retry: &'s RetryPolicy,
        total_size: u64,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            sink,
            chunk_retry,
            session_uri: None,
            bytes_confirmed: 0,
            total_size,
            mime_type: mime_type.into(),
            state: SessionState::Uninitialized,
        }
    }

    /// Asks the sink for a session URI.
    ///
    /// # Errors
    ///
    /// [`RelayError::InvalidState`] unless uninitialized; otherwise whatever
    /// the sink reports. A failed initiate aborts the session.
    pub async fn initiate(&mut self, name: Option<&str>) -> Result<&str, RelayError> {
        if self.state != SessionState::Uninitialized {
            return Err(RelayError::InvalidState {
                operation: "initiate",
                state: self.state,
            });
        }

        let request = InitiateUpload {
            name,
            mime_type: &self.mime_type,
            total_size: self.total_size,
        };
        match self.sink.initiate(request).await {
            Ok(uri) => {
                self.state = SessionState::Open;
                Ok(self.session_uri.insert(uri).as_str())
            }
            Err(error) => {
                self.state = SessionState::Aborted;
                Err(error)
            }
        }
    }

    /// Pushes `chunk` at the confirmed offset.
    ///
    /// # Errors
    ///
    /// - [`RelayError::InvalidState`] unless open or awaiting the next range
    /// - [`RelayError::SessionExpired`] when the sink forgot the session
    /// - [`RelayError::SinkTransient`] after the chunk retry cap
    /// - [`RelayError::SinkFatal`] on any other rejection
    /// - [`RelayError::SinkProtocol`] when the sink's answer is inconsistent
    ///
    /// Every error leaves the session aborted.
    pub async fn push_chunk(&mut self, chunk: Bytes) -> Result<PushProgress, RelayError> {
        let session_uri = match (&self.session_uri, self.state) {
            (Some(uri), SessionState::Open | SessionState::Uploading) => uri.clone(),
            (_, state) => {
                return Err(RelayError::InvalidState {
                    operation: "push chunk",
                    state,
                });
            }
        };

        let offset = self.bytes_confirmed;
        let len = chunk.len() as u64;
        let end = offset + len;
        if chunk.is_empty() {
            return Err(self.abort_with(RelayError::sink_protocol(format!(
                "refusing to push an empty chunk at offset {offset}"
            ))));
        }
        if end > self.total_size {
            return Err(self.abort_with(RelayError::sink_protocol(format!(
                "chunk {offset}..{end} runs past the declared total of {}",
                self.total_size
            ))));
        }

        self.state = SessionState::AwaitingRange;
        let mut transient_failures = 0u32;

        loop {
            let push = ChunkPush {
                session_uri: &session_uri,
                offset,
                chunk: &chunk,
                total_size: self.total_size,
                mime_type: &self.mime_type,
            };
            let outcome = match self.sink.push_chunk(push).await {
                Ok(outcome) => outcome,
                Err(error) => return Err(self.abort_with(error)),
            };

            match outcome {
                ChunkOutcome::Accepted { next_offset } => {
                    if next_offset < offset || next_offset > end {
                        return Err(self.abort_with(RelayError::sink_protocol(format!(
                            "sink confirmed up to {next_offset} after a push of {offset}..{end}"
                        ))));
                    }
                    if next_offset == self.total_size {
                        return Err(self.abort_with(RelayError::sink_protocol(
                            "sink confirmed every byte without finalizing",
                        )));
                    }
                    self.bytes_confirmed = next_offset;
                    self.state = SessionState::Uploading;
                    #[allow(clippy::cast_possible_truncation)]
                    let retained = chunk.slice((next_offset - offset) as usize..);
                    debug!(
                        offset,
                        len,
                        confirmed = next_offset,
                        retained = retained.len(),
                        "chunk accepted"
                    );
                    return Ok(PushProgress::Accepted {
                        confirmed: next_offset,
                        retained,
                    });
                }
                ChunkOutcome::Finalized { remote_id } => {
                    if end != self.total_size {
                        return Err(self.abort_with(RelayError::sink_protocol(format!(
                            "sink finalized {remote_id} after only {end} of {} bytes",
                            self.total_size
                        ))));
                    }
                    self.bytes_confirmed = end;
                    self.state = SessionState::Finalized;
                    debug!(remote_id = %remote_id, total_size = self.total_size, "upload finalized");
                    return Ok(PushProgress::Finalized { remote_id });
                }
                ChunkOutcome::SessionExpired => {
                    return Err(self.abort_with(RelayError::SessionExpired { session_uri }));
                }
                ChunkOutcome::TransientFailure { status } => {
                    transient_failures += 1;
                    match self
                        .chunk_retry
                        .should_retry(FailureType::Transient, transient_failures)
                    {
                        RetryDecision::Retry { delay, attempt } => {
                            warn!(
                                offset,
                                status = ?status,
                                attempt,
                                delay_ms = delay.as_millis(),
                                "retrying chunk push"
                            );
                            tokio::time::sleep(delay).await;
                        }
                        RetryDecision::DoNotRetry { .. } => {
                            return Err(self.abort_with(RelayError::SinkTransient {
                                status,
                                attempts: transient_failures,
                            }));
                        }
                    }
                }
                ChunkOutcome::FatalFailure { status, reason } => {
                    return Err(self.abort_with(RelayError::sink_fatal(
                        "push chunk",
                        Some(status),
                        reason,
                    )));
                }
            }
        }
    }

    /// Gives up on the session. It is never finalized afterwards.
    pub fn abort(&mut self) {
        if self.state != SessionState::Finalized {
            self.state = SessionState::Aborted;
        }
    }

    fn abort_with(&mut self, error: RelayError) -> RelayError {
        self.state = SessionState::Aborted;
        error
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Bytes the sink has confirmed.
    #[must_use]
    pub fn bytes_confirmed(&self) -> u64 {
        self.bytes_confirmed
    }

    /// Declared upload size.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Session URI, once initiated.
    #[must_use]
    pub fn session_uri(&self) -> Option<&str> {
        self.session_uri.as_deref()
    }
}

impl Drop for UploadSession<'_> {
    fn drop(&mut self) {
        if !matches!(self.state, SessionState::Finalized | SessionState::Aborted) {
            debug!(
                session_uri = ?self.session_uri,
                bytes_confirmed = self.bytes_confirmed,
                "abandoning upload session"
            );
        }
    }
}
