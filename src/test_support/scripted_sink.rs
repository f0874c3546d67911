//! In-memory [`UploadSink`] that answers pushes from a script and records calls.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::relay::{ChunkOutcome, ChunkPush, InitiateUpload, RelayError, RemoteMetadata, UploadSink};

/// One recorded push: offset and payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RecordedPush {
    pub session_uri: String,
    pub offset: u64,
    pub bytes: Vec<u8>,
    pub total_size: u64,
}

/// Scripted sink. When the script runs dry, pushes are answered like a
/// well-behaved sink: full confirmation, finalizing on the last byte.
#[derive(Debug, Default)]
pub(crate) struct ScriptedSink {
    script: Mutex<VecDeque<ChunkOutcome>>,
    pushes: Mutex<Vec<RecordedPush>>,
    initiates: AtomicU32,
    publishes: AtomicU32,
    metadata_failures: AtomicU32,
    publish_delay: Option<Duration>,
}

#[allow(clippy::unwrap_used)]
impl ScriptedSink {
    pub(crate) fn new(script: impl IntoIterator<Item = ChunkOutcome>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Makes the next `count` metadata reads fail with a 503.
    pub(crate) fn fail_metadata(self, count: u32) -> Self {
        self.metadata_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Makes every publish call take `delay`.
    pub(crate) fn delay_publish(mut self, delay: Duration) -> Self {
        self.publish_delay = Some(delay);
        self
    }

    pub(crate) fn pushes(&self) -> Vec<RecordedPush> {
        self.pushes.lock().unwrap().clone()
    }

    pub(crate) fn initiate_count(&self) -> u32 {
        self.initiates.load(Ordering::SeqCst)
    }

    pub(crate) fn publish_count(&self) -> u32 {
        self.publishes.load(Ordering::SeqCst)
    }
}

#[async_trait]
#[allow(clippy::unwrap_used)]
impl UploadSink for ScriptedSink {
    async fn initiate(&self, _request: InitiateUpload<'_>) -> Result<String, RelayError> {
        let n = self.initiates.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("https://sink.test/session/{n}"))
    }

    async fn push_chunk(&self, push: ChunkPush<'_>) -> Result<ChunkOutcome, RelayError> {
        self.pushes.lock().unwrap().push(RecordedPush {
            session_uri: push.session_uri.to_string(),
            offset: push.offset,
            bytes: push.chunk.to_vec(),
            total_size: push.total_size,
        });
        if let Some(outcome) = self.script.lock().unwrap().pop_front() {
            return Ok(outcome);
        }
        let end = push.offset + push.chunk.len() as u64;
        if end == push.total_size {
            Ok(ChunkOutcome::Finalized {
                remote_id: "remote-1".to_string(),
            })
        } else {
            Ok(ChunkOutcome::Accepted { next_offset: end })
        }
    }

    async fn publish(&self, _remote_id: &str) -> Result<(), RelayError> {
        if let Some(delay) = self.publish_delay {
            tokio::time::sleep(delay).await;
        }
        self.publishes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn fetch_metadata(&self, remote_id: &str) -> Result<RemoteMetadata, RelayError> {
        let pending = self.metadata_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.metadata_failures.store(pending - 1, Ordering::SeqCst);
            return Err(RelayError::SinkTransient {
                status: Some(503),
                attempts: 1,
            });
        }
        let pushed: u64 = self
            .pushes
            .lock()
            .unwrap()
            .last()
            .map_or(0, |p| p.total_size);
        Ok(RemoteMetadata {
            id: remote_id.to_string(),
            mime_type: Some("application/pdf".to_string()),
            size: Some(pushed.to_string()),
            web_content_link: Some(format!("https://sink.test/dl/{remote_id}")),
            web_view_link: Some(format!("https://sink.test/view/{remote_id}")),
        })
    }

    async fn delete(&self, _remote_id: &str) -> Result<(), RelayError> {
        Ok(())
    }
}
