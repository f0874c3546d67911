//! Source stream provider: opens a remote byte source for relaying.
//!
//! The provider validates the URL, issues the request and checks the response
//! headers, then hands back a live [`SourceStream`] without touching the body.
//! The stream is consumed with an explicit pull loop ([`SourceStream::next_chunk`]),
//! so nothing is read from the network while the caller is busy pushing.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use reqwest::Client;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use tracing::{debug, instrument};
use url::Url;

use super::RelayError;
use super::constants::{DEFAULT_MIME_TYPE, SOURCE_CONNECT_TIMEOUT_SECS, SOURCE_READ_TIMEOUT_SECS};
use crate::user_agent;

/// Schemes the HTTP provider can read from.
const SUPPORTED_SCHEMES: &[&str] = &["http", "https"];

/// Opens remote byte sources.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Opens `url` and returns its live byte stream.
    ///
    /// # Errors
    ///
    /// - [`RelayError::InvalidUrl`] / [`RelayError::UnsupportedScheme`] before any I/O
    /// - [`RelayError::SourceUnreachable`] on network failure during the handshake
    /// - [`RelayError::InvalidResponse`] on status >= 400 or a missing/invalid length
    async fn open(&self, url: &str) -> Result<SourceStream, RelayError>;
}

/// A live byte stream with its declared content type and total length.
///
/// Dropping the stream closes the underlying connection.
pub struct SourceStream {
    url: String,
    body: BoxStream<'static, Result<Bytes, RelayError>>,
    mime_type: String,
    declared_size: u64,
    bytes_read: u64,
}

impl fmt::Debug for SourceStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceStream")
            .field("url", &self.url)
            .field("mime_type", &self.mime_type)
            .field("declared_size", &self.declared_size)
            .field("bytes_read", &self.bytes_read)
            .finish_non_exhaustive()
    }
}

impl SourceStream {
    /// Wraps a body stream.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidResponse`] when `declared_size` is zero;
    /// the upload protocol needs a positive total up front.
    pub fn new(
        url: impl Into<String>,
        body: BoxStream<'static, Result<Bytes, RelayError>>,
        mime_type: impl Into<String>,
        declared_size: u64,
    ) -> Result<Self, RelayError> {
        let url = url.into();
        if declared_size == 0 {
            return Err(RelayError::invalid_response(
                url,
                "Content-Length header is missing or invalid",
            ));
        }
        Ok(Self {
            url,
            body,
            mime_type: mime_type.into(),
            declared_size,
            bytes_read: 0,
        })
    }

    /// Builds a stream over in-memory pieces for [`SourceProvider`]s that do
    /// not read over HTTP. The declared size is the total of the pieces.
    ///
    /// # Errors
    ///
    /// Same as [`SourceStream::new`].
    pub fn from_pieces(
        url: impl Into<String>,
        pieces: Vec<Bytes>,
        mime_type: impl Into<String>,
    ) -> Result<Self, RelayError> {
        let total: usize = pieces.iter().map(Bytes::len).sum();
        let body = futures_util::stream::iter(pieces.into_iter().map(Ok)).boxed();
        Self::new(url, body, mime_type, total as u64)
    }

    /// Pulls the next piece of the body.
    ///
    /// Returns `Ok(None)` at end of stream. Bytes beyond the declared size, or
    /// an end of stream before it, are reported as [`RelayError::InvalidResponse`].
    ///
    /// # Errors
    ///
    /// Propagates body read errors and length mismatches.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, RelayError> {
        loop {
            match self.body.next().await {
                Some(Ok(piece)) if piece.is_empty() => {}
                Some(Ok(piece)) => {
                    self.bytes_read += piece.len() as u64;
                    if self.bytes_read > self.declared_size {
                        return Err(RelayError::invalid_response(
                            self.url.clone(),
                            format!(
                                "source sent more than the declared {} bytes",
                                self.declared_size
                            ),
                        ));
                    }
                    return Ok(Some(piece));
                }
                Some(Err(error)) => return Err(error),
                None if self.bytes_read < self.declared_size => {
                    return Err(RelayError::invalid_response(
                        self.url.clone(),
                        format!(
                            "source ended after {} of {} declared bytes",
                            self.bytes_read, self.declared_size
                        ),
                    ));
                }
                None => return Ok(None),
            }
        }
    }

    /// The source URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Declared content type.
    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Declared total length in bytes (always positive).
    #[must_use]
    pub fn declared_size(&self) -> u64 {
        self.declared_size
    }

    /// Bytes pulled from the body so far.
    #[must_use]
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}

/// HTTP/HTTPS source provider.
///
/// Designed to be created once and shared between concurrent relays so they
/// share one connection pool.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
}

impl Default for HttpSource {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpSource {
    /// Creates a provider with default timeouts (30s connect, 5min idle read).
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::new_with_timeouts(SOURCE_CONNECT_TIMEOUT_SECS, SOURCE_READ_TIMEOUT_SECS)
    }

    /// Creates a provider with explicit timeout values.
    ///
    /// The read timeout applies between body reads rather than to the whole
    /// transfer, since the body is deliberately left idle while chunks upload.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the supplied configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new_with_timeouts(connect_timeout_secs: u64, read_timeout_secs: u64) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .read_timeout(Duration::from_secs(read_timeout_secs))
            .user_agent(user_agent::default_relay_user_agent())
            .build()
            .expect("failed to build source HTTP client with static configuration");
        Self { client }
    }
}

#[async_trait]
impl SourceProvider for HttpSource {
    #[instrument(skip(self), fields(url = %url))]
    async fn open(&self, url: &str) -> Result<SourceStream, RelayError> {
        let parsed = parse_source_url(url)?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| RelayError::source_unreachable(url, e))?;

        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(RelayError::invalid_status(url, status.as_u16()));
        }

        let mime_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_MIME_TYPE)
            .to_string();

        let declared_size = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_declared_length)
            .ok_or_else(|| {
                RelayError::invalid_response(url, "Content-Length header is missing or invalid")
            })?;

        debug!(mime_type = %mime_type, declared_size, "source opened");

        let stream_url = url.to_string();
        let body = response
            .bytes_stream()
            .map(move |piece| piece.map_err(|e| RelayError::source_unreachable(stream_url.clone(), e)))
            .boxed();

        SourceStream::new(url, body, mime_type, declared_size)
    }
}

/// Parses a source URL and rejects schemes the HTTP provider cannot read.
///
/// # Errors
///
/// Returns [`RelayError::InvalidUrl`] or [`RelayError::UnsupportedScheme`].
pub fn parse_source_url(url: &str) -> Result<Url, RelayError> {
    let parsed = Url::parse(url).map_err(|_| RelayError::invalid_url(url))?;
    if !SUPPORTED_SCHEMES.contains(&parsed.scheme()) {
        return Err(RelayError::unsupported_scheme(url, parsed.scheme()));
    }
    Ok(parsed)
}

/// Parses a `Content-Length` value; zero, negative and non-numeric values are rejected.
fn parse_declared_length(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok().filter(|len| *len > 0)
}

/// Derives an upload name from the last non-empty URL path segment.
#[must_use]
pub fn file_name_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let last = parsed.path_segments()?.rev().find(|s| !s.is_empty())?;
    let decoded = urlencoding::decode(last).map_or_else(|_| last.to_string(), |d| d.into_owned());
    let name = decoded.trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
