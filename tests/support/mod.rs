//! Shared helpers for integration tests.

pub mod resumable_sink;
pub mod socket_guard;
