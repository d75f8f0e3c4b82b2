//! Shared plumbing: retry/backoff and the process-wide HTTP client.

pub mod retry;

#[cfg(feature = "http")]
pub mod http;
