//! Processor abstraction: the unit that turns a [`Source`] into a
//! [`ProcessorResult`] for one or more MIME types.
//!
//! Processors are stateless after construction and registered once at
//! startup into the [`registry::ProcessorRegistry`]. The registry owns the
//! instances; callers work through `Arc<dyn Processor>` references.
//!
//! # Availability
//!
//! `is_available()` reports whether the processor's external requirements
//! (credentials, local binaries, peer services) are present. Implementations
//! memoize the probe per process with a `OnceCell<bool>` so the check runs
//! lazily and at most once.

pub mod registry;

use crate::core::config::ExtractionConfig;
use crate::types::{Category, ProcessorResult, Source};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Declarative description of what a processor can handle.
#[derive(Debug, Clone)]
pub struct ProcessorCapabilities {
    /// Unique engine name (kebab-case).
    pub name: &'static str,
    /// MIME types handled, exact (`application/pdf`) or wildcard (`audio/*`).
    pub mime_types: &'static [&'static str],
    /// File extensions recognized as a secondary hint.
    pub extensions: &'static [&'static str],
    /// Preference on ties, 0..=100 (higher wins).
    pub priority: i32,
    /// External capability tokens this engine depends on.
    pub requires: &'static [&'static str],
    pub category: Category,
}

impl ProcessorCapabilities {
    /// Whether this processor claims `mime` by exact match.
    pub fn claims_exact(&self, mime: &str) -> bool {
        self.mime_types.iter().any(|m| m.eq_ignore_ascii_case(mime))
    }

    /// Whether this processor claims `mime` through one of its wildcard
    /// entries.
    pub fn claims_wildcard(&self, mime: &str) -> bool {
        self.mime_types
            .iter()
            .any(|m| crate::core::mime::matches_wildcard(m, mime))
    }

    /// Whether this processor claims `mime` at all.
    pub fn claims_mime(&self, mime: &str) -> bool {
        self.claims_exact(mime) || self.claims_wildcard(mime)
    }

    /// Whether this processor recognizes the file extension.
    pub fn claims_extension(&self, ext: &str) -> bool {
        self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext))
    }
}

/// Per-request context handed to every processor invocation.
///
/// Carries the immutable configuration snapshot and the cancellation token
/// the router uses to signal deadline expiry. Processors must honor the
/// token at every suspension point and release resources when it fires.
#[derive(Clone)]
pub struct ProcessorContext {
    pub config: Arc<ExtractionConfig>,
    pub cancel: CancellationToken,
    started: Instant,
}

impl ProcessorContext {
    pub fn new(config: Arc<ExtractionConfig>, cancel: CancellationToken) -> Self {
        Self {
            config,
            cancel,
            started: Instant::now(),
        }
    }

    /// Context with default configuration and no external cancellation,
    /// for tests and direct engine use.
    pub fn for_testing() -> Self {
        Self::new(Arc::new(ExtractionConfig::default()), CancellationToken::new())
    }

    /// Milliseconds since the extraction call began.
    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Bail out early if cancellation was requested.
    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(crate::CcoreError::Cancelled);
        }
        Ok(())
    }

    /// The engine options slice for `engine`, if configured.
    pub fn engine_options(&self, engine: &str) -> Option<&serde_json::Value> {
        self.config.engine_options.get(engine)
    }
}

/// A content extraction engine.
#[async_trait]
pub trait Processor: Send + Sync {
    /// The processor's declared capabilities.
    fn capabilities(&self) -> &ProcessorCapabilities;

    /// Whether the processor's external requirements are satisfied.
    ///
    /// Checked lazily; implementations memoize the probe per process.
    fn is_available(&self) -> bool {
        true
    }

    /// Extract content from the source.
    ///
    /// On success the result's `metadata.extraction_engine` is stamped by
    /// the router; processors do not need to set it themselves.
    async fn extract(&self, source: &Source, ctx: &ProcessorContext) -> Result<ProcessorResult>;

    /// Convenience accessor for the engine name.
    fn name(&self) -> &'static str {
        self.capabilities().name
    }
}
