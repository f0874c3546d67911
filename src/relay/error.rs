//! Error types for the relay module.
//!
//! Every variant carries enough context (URL, session, status) to be reported
//! as a per-URL failure reason without further decoration.

use thiserror::Error;

use super::session::SessionState;

/// Errors that can occur while relaying a source into the sink.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The provided URL is malformed.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The URL uses a transport the relay cannot read from.
    #[error("unsupported URL scheme '{scheme}' for {url}: only http and https are supported")]
    UnsupportedScheme {
        /// The rejected URL.
        url: String,
        /// The scheme that was found.
        scheme: String,
    },

    /// Network-level failure talking to the source (DNS, connect, reset, timeout).
    #[error("source unreachable {url}: {source}")]
    SourceUnreachable {
        /// The source URL.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// The source answered, but not with something that can be relayed.
    #[error("invalid response from {url}: {reason}")]
    InvalidResponse {
        /// The source URL.
        url: String,
        /// HTTP status, when the failure is a status code.
        status: Option<u16>,
        /// What was wrong with the response.
        reason: String,
    },

    /// The sink no longer knows the upload session; the transfer must restart.
    #[error("upload session expired and must be restarted from the beginning: {session_uri}")]
    SessionExpired {
        /// The session that was invalidated.
        session_uri: String,
    },

    /// The sink answered in a way that breaks the upload protocol.
    #[error("sink protocol violation: {reason}")]
    SinkProtocol {
        /// Description of the violation.
        reason: String,
    },

    /// The sink kept reporting server-side trouble beyond the retry cap.
    #[error("sink unavailable (HTTP {}) after {attempts} attempts", display_status(.status))]
    SinkTransient {
        /// Last status seen, `None` for transport-level failures.
        status: Option<u16>,
        /// Attempts made before giving up.
        attempts: u32,
    },

    /// Any other sink error; aborts the session.
    #[error("sink error during {operation} (HTTP {}): {reason}", display_status(.status))]
    SinkFatal {
        /// Sink operation that failed.
        operation: &'static str,
        /// HTTP status, if the sink answered.
        status: Option<u16>,
        /// Error detail from the sink.
        reason: String,
    },

    /// A referenced artifact or record does not exist.
    #[error("not found: {what}")]
    NotFound {
        /// What was looked up.
        what: String,
    },

    /// A session operation was issued in a state that does not allow it.
    #[error("cannot {operation} while upload session is {state}")]
    InvalidState {
        /// The attempted operation.
        operation: &'static str,
        /// The session state at the time.
        state: SessionState,
    },

    /// The artifact was created but a follow-up call on it failed.
    #[error("artifact {remote_id} was uploaded but {operation} failed: {source}")]
    PostFinalize {
        /// The finalized artifact.
        remote_id: String,
        /// Follow-up operation (publish, metadata).
        operation: &'static str,
        /// The underlying failure.
        #[source]
        source: Box<RelayError>,
    },

    /// Every allowed transfer attempt ended in a restartable failure.
    #[error("transfer failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Attempts made.
        attempts: u32,
        /// Failure of the last attempt.
        #[source]
        last: Box<RelayError>,
    },

    /// The transfer was cancelled before it finalized.
    #[error("transfer cancelled")]
    Cancelled,
}

#[allow(clippy::ref_option)]
fn display_status(status: &Option<u16>) -> String {
    status.map_or_else(|| "-".to_string(), |code| code.to_string())
}

impl RelayError {
    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an unsupported scheme error.
    pub fn unsupported_scheme(url: impl Into<String>, scheme: impl Into<String>) -> Self {
        Self::UnsupportedScheme {
            url: url.into(),
            scheme: scheme.into(),
        }
    }

    /// Creates a source network error from a reqwest error.
    pub fn source_unreachable(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::SourceUnreachable {
            url: url.into(),
            source,
        }
    }

    /// Creates an invalid response error for a bad status code.
    pub fn invalid_status(url: impl Into<String>, status: u16) -> Self {
        Self::InvalidResponse {
            url: url.into(),
            status: Some(status),
            reason: format!("failed to download file, status code: {status}"),
        }
    }

    /// Creates an invalid response error with a free-form reason.
    pub fn invalid_response(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            url: url.into(),
            status: None,
            reason: reason.into(),
        }
    }

    /// Creates a sink protocol violation error.
    pub fn sink_protocol(reason: impl Into<String>) -> Self {
        Self::SinkProtocol {
            reason: reason.into(),
        }
    }

    /// Creates a fatal sink error.
    pub fn sink_fatal(
        operation: &'static str,
        status: Option<u16>,
        reason: impl Into<String>,
    ) -> Self {
        Self::SinkFatal {
            operation,
            status,
            reason: reason.into(),
        }
    }

    /// Creates a not-found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Wraps a failure that happened after the artifact was finalized.
    pub fn post_finalize(
        remote_id: impl Into<String>,
        operation: &'static str,
        source: RelayError,
    ) -> Self {
        Self::PostFinalize {
            remote_id: remote_id.into(),
            operation,
            source: Box::new(source),
        }
    }

    /// Wraps the last failure once transfer attempts are exhausted.
    pub fn retries_exhausted(attempts: u32, last: RelayError) -> Self {
        Self::RetriesExhausted {
            attempts,
            last: Box::new(last),
        }
    }
}

// No `From<reqwest::Error>`: source and sink failures map to different
// variants and every variant needs the URL or operation for context.
