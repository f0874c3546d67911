//! Constants for the relay module (chunking, timeouts, sink endpoints).

/// Default chunk release threshold (256 KiB), the sink's upload granularity.
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// Source HTTP connect timeout (30 seconds).
pub const SOURCE_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Source idle read timeout (5 minutes between body reads).
pub const SOURCE_READ_TIMEOUT_SECS: u64 = 300;

/// Sink HTTP connect timeout (30 seconds).
pub const SINK_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Sink per-request timeout (2 minutes, one chunk per request).
pub const SINK_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Cap on in-place retries of a single chunk push after sink-side transient errors.
pub const DEFAULT_CHUNK_RETRY_LIMIT: u32 = 20;

/// Consecutive zero-progress pushes tolerated while draining the final bytes.
pub const MAX_STALLED_PUSHES: u32 = 8;

/// Content type assumed when the source omits one.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Resumable upload initiation endpoint.
pub const DEFAULT_UPLOAD_URL: &str =
    "https://www.googleapis.com/upload/drive/v3/files?uploadType=resumable";

/// Base URL for artifact metadata, permission and delete calls.
pub const DEFAULT_API_BASE_URL: &str = "https://www.googleapis.com/drive/v3";

/// Fields requested when reading artifact metadata after finalization.
pub const METADATA_FIELDS: &str = "id,mimeType,size,webContentLink,webViewLink";
