//! Transfer inputs and outcomes.

use serde::Serialize;

use super::RelayError;

/// One URL to relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// The source URL.
    pub source_url: String,
}

impl TransferRequest {
    /// Creates a request for `source_url`.
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
        }
    }
}

/// Description of an artifact stored by the sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactDescriptor {
    /// Sink-assigned id.
    pub remote_id: String,
    /// Content type.
    pub mime_type: String,
    /// Size in bytes.
    pub size: u64,
    /// Browser view link, if the sink reports one.
    pub view_url: Option<String>,
    /// Direct download link, if the sink reports one.
    pub download_url: Option<String>,
}

/// Why a URL could not be relayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferFailure {
    /// The source URL.
    pub source_url: String,
    /// Human-readable reason.
    pub reason: String,
}

impl TransferFailure {
    /// Builds a failure from a relay error.
    pub fn from_error(source_url: impl Into<String>, error: &RelayError) -> Self {
        Self {
            source_url: source_url.into(),
            reason: error.to_string(),
        }
    }
}

/// Final outcome for one URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransferResult {
    /// The artifact was created.
    Uploaded(ArtifactDescriptor),
    /// The URL failed.
    Failed(TransferFailure),
}

impl TransferResult {
    /// Whether the artifact was created.
    #[must_use]
    pub fn is_uploaded(&self) -> bool {
        matches!(self, Self::Uploaded(_))
    }

    /// The artifact, if uploaded.
    #[must_use]
    pub fn artifact(&self) -> Option<&ArtifactDescriptor> {
        match self {
            Self::Uploaded(artifact) => Some(artifact),
            Self::Failed(_) => None,
        }
    }
}

/// A successful relay together with the number of transfer attempts it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayReceipt {
    /// The stored artifact.
    pub artifact: ArtifactDescriptor,
    /// Transfer attempts, 1 when nothing had to restart.
    pub attempts: u32,
}
