//! URL Relay Core Library
//!
//! This library relays files identified by a source URL into object storage
//! that speaks a chunked, resumable upload protocol, and records metadata
//! about every completed transfer.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`relay`] - Streaming download-to-upload pipeline (source, chunking,
//!   resumable session, retry orchestration, coordinator)
//! - [`batch`] - Concurrent multi-URL driver with per-URL outcomes
//! - [`store`] - Transfer metadata persistence
//! - [`db`] - Database connection and schema management

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod batch;
pub mod db;
pub mod relay;
pub mod store;
mod user_agent;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use batch::{BatchDriver, BatchEntry, BatchError, BatchReport, BatchStats, DEFAULT_CONCURRENCY};
pub use db::Database;
pub use relay::{
    ArtifactDescriptor, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_ATTEMPTS, FailureType, HttpSource,
    RelayConfig, RelayCoordinator, RelayError, RetryPolicy, SinkClient, SinkCredentials,
    SinkEndpoints, TransferFailure, TransferResult, classify_error,
};
pub use store::{FileRecord, FileRepository, FileStore, NewFileRecord, StoreError};
