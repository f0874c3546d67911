//! Upload sink: the resumable upload wire protocol plus artifact follow-ups.
//!
//! Wire contract:
//! - initiate: `POST {upload_url}` with JSON metadata, session URI in `Location`
//! - push: `PUT {session}` with `Content-Range: bytes {start}-{end}/{total}`
//! - `308` + `Range: bytes=0-{n}` confirms `n + 1` bytes (no `Range`: nothing yet)
//! - `200`/`201` with `{"id": ...}` finalizes, `404`/`410` means the session is gone,
//!   `5xx` is transient, anything else is fatal
//!
//! The sink client never follows redirects, otherwise `308` would be swallowed.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, LOCATION, RANGE};
use reqwest::{Client, Response, StatusCode, redirect};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};
use url::Url;

use super::RelayError;
use super::constants::{
    DEFAULT_API_BASE_URL, DEFAULT_UPLOAD_URL, METADATA_FIELDS, SINK_CONNECT_TIMEOUT_SECS,
    SINK_REQUEST_TIMEOUT_SECS,
};
use crate::user_agent;

/// Longest error body excerpt kept in a failure reason.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Result of a single chunk push as reported by the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// The sink holds bytes `[0, next_offset)`.
    Accepted {
        /// First byte the sink has not confirmed.
        next_offset: u64,
    },
    /// The final range was accepted and the artifact exists.
    Finalized {
        /// Sink-assigned artifact id.
        remote_id: String,
    },
    /// The session is unknown to the sink.
    SessionExpired,
    /// Server-side trouble; the same push may be retried.
    TransientFailure {
        /// Status, `None` when the request never got an answer.
        status: Option<u16>,
    },
    /// Any other rejection.
    FatalFailure {
        /// Status returned by the sink.
        status: u16,
        /// Error detail.
        reason: String,
    },
}

/// Parameters for starting an upload session.
#[derive(Debug, Clone, Copy)]
pub struct InitiateUpload<'a> {
    /// Artifact name, usually derived from the source URL.
    pub name: Option<&'a str>,
    /// Content type of the whole upload.
    pub mime_type: &'a str,
    /// Total size in bytes.
    pub total_size: u64,
}

/// Parameters for one chunk push.
#[derive(Debug, Clone, Copy)]
pub struct ChunkPush<'a> {
    /// Session URI returned by initiate.
    pub session_uri: &'a str,
    /// Absolute offset of the first byte of `chunk`.
    pub offset: u64,
    /// Chunk payload.
    pub chunk: &'a Bytes,
    /// Total size of the upload.
    pub total_size: u64,
    /// Content type of the upload.
    pub mime_type: &'a str,
}

/// Artifact metadata read back after finalization.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMetadata {
    /// Artifact id.
    pub id: String,
    /// Content type as stored by the sink.
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Size in bytes, encoded as a decimal string.
    #[serde(default)]
    pub size: Option<String>,
    /// Direct download link.
    #[serde(default)]
    pub web_content_link: Option<String>,
    /// Browser view link.
    #[serde(default)]
    pub web_view_link: Option<String>,
}

impl RemoteMetadata {
    /// Size parsed as a number, if present and valid.
    #[must_use]
    pub fn size_bytes(&self) -> Option<u64> {
        self.size.as_deref().and_then(|s| s.parse().ok())
    }
}

/// Object storage that accepts resumable uploads.
#[async_trait]
pub trait UploadSink: Send + Sync {
    /// Starts a session and returns its URI.
    async fn initiate(&self, request: InitiateUpload<'_>) -> Result<String, RelayError>;

    /// Sends one chunk. Sink answers are reported as [`ChunkOutcome`]s;
    /// `Err` is reserved for answers that break the protocol.
    async fn push_chunk(&self, push: ChunkPush<'_>) -> Result<ChunkOutcome, RelayError>;

    /// Makes the artifact readable by anyone with the link.
    async fn publish(&self, remote_id: &str) -> Result<(), RelayError>;

    /// Reads artifact metadata. Safe to retry.
    async fn fetch_metadata(&self, remote_id: &str) -> Result<RemoteMetadata, RelayError>;

    /// Removes the artifact.
    async fn delete(&self, remote_id: &str) -> Result<(), RelayError>;
}

/// Sink endpoint URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkEndpoints {
    /// Resumable upload initiation URL.
    pub upload_url: String,
    /// Base URL for `files/{id}` calls.
    pub api_base_url: String,
}

impl Default for SinkEndpoints {
    fn default() -> Self {
        Self {
            upload_url: DEFAULT_UPLOAD_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }
}

impl SinkEndpoints {
    /// Endpoints rooted at custom URLs.
    pub fn new(upload_url: impl Into<String>, api_base_url: impl Into<String>) -> Self {
        Self {
            upload_url: upload_url.into(),
            api_base_url: api_base_url.into(),
        }
    }

    fn file_url(&self, remote_id: &str) -> String {
        format!(
            "{}/files/{}",
            self.api_base_url.trim_end_matches('/'),
            urlencoding::encode(remote_id)
        )
    }
}

/// Bearer token for the sink.
#[derive(Clone)]
pub struct SinkCredentials {
    access_token: String,
}

impl SinkCredentials {
    /// Wraps an OAuth access token.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }
}

impl fmt::Debug for SinkCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkCredentials")
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

/// HTTP implementation of [`UploadSink`].
///
/// Build once per process and share; the connection pool is reused by every
/// concurrent transfer.
#[derive(Debug, Clone)]
pub struct SinkClient {
    client: Client,
    endpoints: SinkEndpoints,
    credentials: SinkCredentials,
}

impl SinkClient {
    /// Creates a sink client with default timeouts.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static configuration.
    #[must_use]
    pub fn new(endpoints: SinkEndpoints, credentials: SinkCredentials) -> Self {
        Self::new_with_timeouts(
            endpoints,
            credentials,
            SINK_CONNECT_TIMEOUT_SECS,
            SINK_REQUEST_TIMEOUT_SECS,
        )
    }

    /// Creates a sink client with explicit timeout values.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the supplied configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new_with_timeouts(
        endpoints: SinkEndpoints,
        credentials: SinkCredentials,
        connect_timeout_secs: u64,
        request_timeout_secs: u64,
    ) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(request_timeout_secs))
            .redirect(redirect::Policy::none())
            .user_agent(user_agent::default_relay_user_agent())
            .build()
            .expect("failed to build sink HTTP client with static configuration");
        Self {
            client,
            endpoints,
            credentials,
        }
    }

    /// The configured endpoints.
    #[must_use]
    pub fn endpoints(&self) -> &SinkEndpoints {
        &self.endpoints
    }

    fn resolve_location(&self, location: &str) -> Result<String, RelayError> {
        let base = Url::parse(&self.endpoints.upload_url)
            .map_err(|_| RelayError::invalid_url(self.endpoints.upload_url.clone()))?;
        base.join(location)
            .map(String::from)
            .map_err(|_| RelayError::sink_protocol(format!("invalid session location '{location}'")))
    }
}

#[async_trait]
impl UploadSink for SinkClient {
    #[instrument(skip(self, request), fields(total_size = request.total_size))]
    async fn initiate(&self, request: InitiateUpload<'_>) -> Result<String, RelayError> {
        let metadata = match request.name {
            Some(name) => json!({ "name": name }),
            None => json!({}),
        };

        let response = self
            .client
            .post(&self.endpoints.upload_url)
            .bearer_auth(&self.credentials.access_token)
            .header("X-Upload-Content-Type", request.mime_type)
            .header("X-Upload-Content-Length", request.total_size.to_string())
            .json(&metadata)
            .send()
            .await
            .map_err(|_| RelayError::SinkTransient {
                status: None,
                attempts: 1,
            })?;

        let status = response.status();
        if status.is_server_error() {
            return Err(RelayError::SinkTransient {
                status: Some(status.as_u16()),
                attempts: 1,
            });
        }
        if !status.is_success() {
            return Err(fatal_from_response("initiate", response).await);
        }

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| RelayError::sink_protocol("initiate response has no Location header"))?;

        let session_uri = self.resolve_location(location.trim())?;
        debug!(session_uri = %session_uri, "upload session initiated");
        Ok(session_uri)
    }

    #[instrument(skip(self, push), fields(offset = push.offset, len = push.chunk.len()))]
    async fn push_chunk(&self, push: ChunkPush<'_>) -> Result<ChunkOutcome, RelayError> {
        let len = push.chunk.len() as u64;
        let sent = self
            .client
            .put(push.session_uri)
            .bearer_auth(&self.credentials.access_token)
            .header(CONTENT_LENGTH, len)
            .header(CONTENT_TYPE, push.mime_type)
            .header(CONTENT_RANGE, content_range(push.offset, len, push.total_size))
            .body(push.chunk.clone())
            .send()
            .await;

        let response = match sent {
            Ok(response) => response,
            Err(error) => {
                debug!(error = %error, "chunk push transport failure");
                return Ok(ChunkOutcome::TransientFailure { status: None });
            }
        };

        let status = response.status();
        match status {
            StatusCode::OK | StatusCode::CREATED => {
                let body: serde_json::Value = response.json().await.map_err(|e| {
                    RelayError::sink_protocol(format!("unreadable finalize response: {e}"))
                })?;
                let remote_id = body
                    .get("id")
                    .and_then(serde_json::Value::as_str)
                    .filter(|id| !id.is_empty())
                    .ok_or_else(|| RelayError::sink_protocol("finalize response has no id"))?;
                Ok(ChunkOutcome::Finalized {
                    remote_id: remote_id.to_string(),
                })
            }
            StatusCode::PERMANENT_REDIRECT => {
                let range = response
                    .headers()
                    .get(RANGE)
                    .map(|v| {
                        v.to_str()
                            .map_err(|_| RelayError::sink_protocol("non-ASCII Range header"))
                    })
                    .transpose()?;
                let next_offset = match range {
                    Some(value) => parse_range_header(value)?,
                    None => 0,
                };
                Ok(ChunkOutcome::Accepted { next_offset })
            }
            StatusCode::NOT_FOUND | StatusCode::GONE => Ok(ChunkOutcome::SessionExpired),
            s if s.is_server_error() => Ok(ChunkOutcome::TransientFailure {
                status: Some(s.as_u16()),
            }),
            s => Ok(ChunkOutcome::FatalFailure {
                status: s.as_u16(),
                reason: error_excerpt(response).await,
            }),
        }
    }

    #[instrument(skip(self))]
    async fn publish(&self, remote_id: &str) -> Result<(), RelayError> {
        let url = format!("{}/permissions", self.endpoints.file_url(remote_id));
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.credentials.access_token)
            .json(&json!({ "role": "reader", "type": "anyone" }))
            .send()
            .await;
        check_status("publish", remote_id, response).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn fetch_metadata(&self, remote_id: &str) -> Result<RemoteMetadata, RelayError> {
        let response = self
            .client
            .get(format!(
                "{}?fields={}",
                self.endpoints.file_url(remote_id),
                urlencoding::encode(METADATA_FIELDS)
            ))
            .bearer_auth(&self.credentials.access_token)
            .send()
            .await;
        let response = check_status("metadata", remote_id, response).await?;
        response
            .json::<RemoteMetadata>()
            .await
            .map_err(|e| RelayError::sink_protocol(format!("unreadable metadata response: {e}")))
    }

    #[instrument(skip(self))]
    async fn delete(&self, remote_id: &str) -> Result<(), RelayError> {
        let response = self
            .client
            .delete(self.endpoints.file_url(remote_id))
            .bearer_auth(&self.credentials.access_token)
            .send()
            .await;
        check_status("delete", remote_id, response).await?;
        Ok(())
    }
}

/// Maps a follow-up call's response to the error taxonomy.
async fn check_status(
    operation: &'static str,
    remote_id: &str,
    sent: Result<Response, reqwest::Error>,
) -> Result<Response, RelayError> {
    let response = sent.map_err(|_| RelayError::SinkTransient {
        status: None,
        attempts: 1,
    })?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(RelayError::not_found(format!("artifact {remote_id}")));
    }
    if status.is_server_error() {
        return Err(RelayError::SinkTransient {
            status: Some(status.as_u16()),
            attempts: 1,
        });
    }
    Err(fatal_from_response(operation, response).await)
}

async fn fatal_from_response(operation: &'static str, response: Response) -> RelayError {
    let status = response.status().as_u16();
    RelayError::sink_fatal(operation, Some(status), error_excerpt(response).await)
}

async fn error_excerpt(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let body = body.trim();
    if body.is_empty() {
        status.to_string()
    } else {
        body.chars().take(MAX_ERROR_BODY_CHARS).collect()
    }
}

/// Formats `bytes {start}-{end}/{total}` for a push of `len` bytes at `offset`.
#[must_use]
pub fn content_range(offset: u64, len: u64, total: u64) -> String {
    let end = (offset + len).saturating_sub(1);
    format!("bytes {offset}-{end}/{total}")
}

/// Parses a `Range: bytes=0-{n}` continuation header into the next offset `n + 1`.
///
/// # Errors
///
/// Returns [`RelayError::SinkProtocol`] for anything that is not a range starting at 0.
pub fn parse_range_header(value: &str) -> Result<u64, RelayError> {
    let malformed = || RelayError::sink_protocol(format!("malformed Range header '{value}'"));
    let range = value.trim().strip_prefix("bytes=").ok_or_else(malformed)?;
    let (start, end) = range.split_once('-').ok_or_else(malformed)?;
    if start.trim() != "0" {
        return Err(malformed());
    }
    let end: u64 = end.trim().parse().map_err(|_| malformed())?;
    Ok(end + 1)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> SinkClient {
        SinkClient::new(
            SinkEndpoints::new(format!("{}/upload", server.uri()), format!("{}/api", server.uri())),
            SinkCredentials::new("test-token"),
        )
    }

    fn push<'a>(session_uri: &'a str, offset: u64, chunk: &'a Bytes, total: u64) -> ChunkPush<'a> {
        ChunkPush {
            session_uri,
            offset,
            chunk,
            total_size: total,
            mime_type: "application/pdf",
        }
    }

    #[test]
    fn test_content_range_format() {
        assert_eq!(content_range(0, 256_000, 600_000), "bytes 0-255999/600000");
        assert_eq!(content_range(512_000, 88_000, 600_000), "bytes 512000-599999/600000");
    }

    #[test]
    fn test_parse_range_header() {
        assert_eq!(parse_range_header("bytes=0-99999").unwrap(), 100_000);
        assert_eq!(parse_range_header(" bytes=0-0 ").unwrap(), 1);
        assert!(matches!(
            parse_range_header("bytes=5-10"),
            Err(RelayError::SinkProtocol { .. })
        ));
        assert!(parse_range_header("items=0-4").is_err());
        assert!(parse_range_header("bytes=0-").is_err());
    }

    #[test]
    fn test_credentials_debug_is_redacted() {
        let debug = format!("{:?}", SinkCredentials::new("secret-token"));
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_remote_metadata_size_bytes() {
        let meta: RemoteMetadata =
            serde_json::from_str(r#"{"id":"abc","mimeType":"text/plain","size":"42"}"#).unwrap();
        assert_eq!(meta.size_bytes(), Some(42));
        assert_eq!(meta.mime_type.as_deref(), Some("text/plain"));
        assert!(meta.web_view_link.is_none());
    }

    #[tokio::test]
    async fn test_initiate_returns_location() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        let session = format!("{}/session/1", server.uri());
        Mock::given(method("POST"))
            .and(path("/upload"))
            .and(header("Authorization", "Bearer test-token"))
            .and(header("X-Upload-Content-Length", "1234"))
            .and(body_json(json!({ "name": "paper.pdf" })))
            .respond_with(ResponseTemplate::new(200).insert_header("Location", session.as_str()))
            .expect(1)
            .mount(&server)
            .await;

        let uri = client_for(&server)
            .initiate(InitiateUpload {
                name: Some("paper.pdf"),
                mime_type: "application/pdf",
                total_size: 1234,
            })
            .await
            .unwrap();
        assert_eq!(uri, session);
    }

    #[tokio::test]
    async fn test_initiate_without_location_is_protocol_error() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("POST"))
            .and(path("/upload"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let result = client_for(&server)
            .initiate(InitiateUpload {
                name: None,
                mime_type: "text/plain",
                total_size: 1,
            })
            .await;
        assert!(matches!(result, Err(RelayError::SinkProtocol { .. })));
    }

    #[tokio::test]
    async fn test_initiate_forbidden_is_fatal() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("insufficient scope"))
            .mount(&server)
            .await;

        let result = client_for(&server)
            .initiate(InitiateUpload {
                name: None,
                mime_type: "text/plain",
                total_size: 1,
            })
            .await;
        match result {
            Err(RelayError::SinkFatal { status, reason, .. }) => {
                assert_eq!(status, Some(403));
                assert!(reason.contains("insufficient scope"));
            }
            other => panic!("Expected SinkFatal, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_push_chunk_308_with_range_is_accepted() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("PUT"))
            .and(path("/session/1"))
            .and(header("Content-Range", "bytes 0-9/20"))
            .respond_with(ResponseTemplate::new(308).insert_header("Range", "bytes=0-5"))
            .mount(&server)
            .await;

        let session = format!("{}/session/1", server.uri());
        let chunk = Bytes::from_static(b"0123456789");
        let outcome = client_for(&server)
            .push_chunk(push(&session, 0, &chunk, 20))
            .await
            .unwrap();
        assert_eq!(outcome, ChunkOutcome::Accepted { next_offset: 6 });
    }

    #[tokio::test]
    async fn test_push_chunk_308_without_range_confirms_nothing() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(308))
            .mount(&server)
            .await;

        let session = format!("{}/session/1", server.uri());
        let chunk = Bytes::from_static(b"abc");
        let outcome = client_for(&server)
            .push_chunk(push(&session, 0, &chunk, 10))
            .await
            .unwrap();
        assert_eq!(outcome, ChunkOutcome::Accepted { next_offset: 0 });
    }

    #[tokio::test]
    async fn test_push_chunk_status_mapping() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("PUT"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/busy"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/bad"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad range"))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/done"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "file-1" })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let chunk = Bytes::from_static(b"abc");
        let at = |p: &str| format!("{}{p}", server.uri());

        let gone = at("/gone");
        assert_eq!(
            client.push_chunk(push(&gone, 0, &chunk, 3)).await.unwrap(),
            ChunkOutcome::SessionExpired
        );
        let busy = at("/busy");
        assert_eq!(
            client.push_chunk(push(&busy, 0, &chunk, 3)).await.unwrap(),
            ChunkOutcome::TransientFailure { status: Some(503) }
        );
        let bad = at("/bad");
        assert_eq!(
            client.push_chunk(push(&bad, 0, &chunk, 3)).await.unwrap(),
            ChunkOutcome::FatalFailure {
                status: 400,
                reason: "bad range".to_string()
            }
        );
        let done = at("/done");
        assert_eq!(
            client.push_chunk(push(&done, 0, &chunk, 3)).await.unwrap(),
            ChunkOutcome::Finalized {
                remote_id: "file-1".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_push_chunk_finalize_without_id_is_protocol_error() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "name": "x" })))
            .mount(&server)
            .await;

        let session = format!("{}/s", server.uri());
        let chunk = Bytes::from_static(b"abc");
        let result = client_for(&server).push_chunk(push(&session, 0, &chunk, 3)).await;
        assert!(matches!(result, Err(RelayError::SinkProtocol { .. })));
    }

    #[tokio::test]
    async fn test_fetch_metadata_requests_fields() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/api/files/file-1"))
            .and(query_param("fields", METADATA_FIELDS))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "file-1",
                "mimeType": "application/pdf",
                "size": "600000",
                "webViewLink": "https://view/file-1",
                "webContentLink": "https://dl/file-1"
            })))
            .mount(&server)
            .await;

        let meta = client_for(&server).fetch_metadata("file-1").await.unwrap();
        assert_eq!(meta.size_bytes(), Some(600_000));
        assert_eq!(meta.web_view_link.as_deref(), Some("https://view/file-1"));
    }

    #[tokio::test]
    async fn test_publish_grants_anyone_reader() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("POST"))
            .and(path("/api/files/file-1/permissions"))
            .and(body_json(json!({ "role": "reader", "type": "anyone" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "perm" })))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server).publish("file-1").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_missing_artifact_is_not_found() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("DELETE"))
            .and(path("/api/files/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/files/present"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(matches!(
            client.delete("missing").await,
            Err(RelayError::NotFound { .. })
        ));
        client.delete("present").await.unwrap();
    }
}
