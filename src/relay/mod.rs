//! Streaming download-to-upload relay.
//!
//! A source URL is opened as a live byte stream, regrouped into upload-sized
//! chunks and pushed through a resumable upload session. Only one chunk is
//! ever held in memory per transfer, so file size does not affect memory use.
//!
//! # Components
//!
//! - [`SourceProvider`] / [`HttpSource`] - opens the source and validates headers
//! - [`ChunkAccumulator`] - releases chunks of at least the configured size
//! - [`UploadSession`] - resumable upload state machine over an [`UploadSink`]
//! - [`run_with_retries`] - restarts a transfer after session-level failures
//! - [`RelayCoordinator`] - runs the pipeline for one URL
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use relay_core::relay::{
//!     HttpSource, RelayConfig, RelayCoordinator, SinkClient, SinkCredentials, SinkEndpoints,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let sink = SinkClient::new(SinkEndpoints::default(), SinkCredentials::new("token"));
//! let relay = RelayCoordinator::new(
//!     Arc::new(HttpSource::new()),
//!     Arc::new(sink),
//!     RelayConfig::default(),
//! );
//! let receipt = relay.relay("https://example.com/paper.pdf").await?;
//! println!("Stored as {}", receipt.artifact.remote_id);
//! # Ok(())
//! # }
//! ```

mod accumulator;
mod constants;
mod coordinator;
mod error;
mod retry;
mod session;
mod sink;
mod source;
mod types;

pub use accumulator::ChunkAccumulator;
pub use constants::{
    DEFAULT_CHUNK_RETRY_LIMIT, DEFAULT_CHUNK_SIZE, DEFAULT_MIME_TYPE, SINK_CONNECT_TIMEOUT_SECS,
    SINK_REQUEST_TIMEOUT_SECS, SOURCE_CONNECT_TIMEOUT_SECS, SOURCE_READ_TIMEOUT_SECS,
};
pub use coordinator::{RelayConfig, RelayCoordinator};
pub use error::RelayError;
pub use retry::{
    DEFAULT_MAX_ATTEMPTS, FailureType, RetryDecision, RetryPolicy, classify_error,
    run_with_retries,
};
pub use session::{PushProgress, SessionState, UploadSession};
pub use sink::{
    ChunkOutcome, ChunkPush, InitiateUpload, RemoteMetadata, SinkClient, SinkCredentials,
    SinkEndpoints, UploadSink, content_range, parse_range_header,
};
pub use source::{HttpSource, SourceProvider, SourceStream, file_name_from_url, parse_source_url};
pub use types::{ArtifactDescriptor, RelayReceipt, TransferFailure, TransferRequest, TransferResult};
