//! Main extraction entry points.
//!
//! This module wires the pipeline together: classify the source to a MIME
//! type, snapshot the configuration, resolve the engine chain, and hand off
//! to the router. Every source kind (URL, file, raw text) flows through the
//! same machinery; URLs are mapped to synthetic MIME types so the registry
//! can dispatch them like any document.
//!
//! # Functions
//!
//! - [`extract`] - Extract content from any [`Source`]
//! - [`extract_url`] / [`extract_file`] / [`extract_string`] - convenience
//!   constructors plus extraction in one call
//! - `*_sync` variants - blocking wrappers on a shared global runtime

use crate::core::config::ExtractionConfig;
use crate::core::mime::{
    HTML_MIME_TYPE, PLAIN_TEXT_MIME_TYPE, URL_MIME_TYPE, YOUTUBE_MIME_TYPE, detect_mime_type, looks_like_html,
};
use crate::core::{io, resolver, router};
use crate::processors::ProcessorContext;
use crate::types::{ExtractionResult, Source, SourceOrigin};
use crate::{CcoreError, Result};
use once_cell::sync::Lazy;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Global Tokio runtime for the synchronous wrappers.
///
/// Lazily initialized on first use and shared across all sync calls; a
/// runtime per call would rebuild the scheduler and I/O driver every time.
static GLOBAL_RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to create global Tokio runtime - system may be out of resources")
});

/// Classify a source to the MIME type used for engine resolution.
///
/// Files are detected by extension and content sniffing; raw content is
/// split into HTML vs plain text by marker detection; URLs map to the
/// synthetic URL MIME, with YouTube links singled out when the youtube
/// pipeline is compiled in.
pub fn classify_source(source: &Source) -> Result<String> {
    if let Some(mime) = &source.mime_hint {
        return Ok(mime.clone());
    }

    match &source.origin {
        SourceOrigin::RawContent(content) => {
            if looks_like_html(content) {
                Ok(HTML_MIME_TYPE.to_string())
            } else {
                Ok(PLAIN_TEXT_MIME_TYPE.to_string())
            }
        }
        SourceOrigin::FilePath(path) => {
            io::validate_file_exists(path)?;
            detect_mime_type(path)
        }
        SourceOrigin::Url(url) => {
            #[cfg(feature = "youtube")]
            if is_youtube_url(url) {
                return Ok(YOUTUBE_MIME_TYPE.to_string());
            }
            let _ = url;
            Ok(URL_MIME_TYPE.to_string())
        }
    }
}

/// Whether a URL points at a YouTube video page.
pub fn is_youtube_url(raw: &str) -> bool {
    let Ok(parsed) = url::Url::parse(raw) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };
    let host = host.strip_prefix("www.").unwrap_or(host);

    match host {
        "youtu.be" => !parsed.path().trim_matches('/').is_empty(),
        "youtube.com" | "m.youtube.com" | "music.youtube.com" => {
            let path = parsed.path();
            path.starts_with("/watch") || path.starts_with("/shorts/") || path.starts_with("/embed/")
        }
        _ => false,
    }
}

/// Extract content from a source using a configuration snapshot derived
/// from the environment (or the active programmatic override).
///
/// # Example
///
/// ```rust,no_run
/// use ccore::{extract, Source};
///
/// # async fn example() -> ccore::Result<()> {
/// let result = extract(&Source::file("report.pdf")).await?;
/// println!("{} via {}", result.content.len(), result.engine_used);
/// # Ok(())
/// # }
/// ```
pub async fn extract(source: &Source) -> Result<ExtractionResult> {
    let config = ExtractionConfig::snapshot();
    extract_with_snapshot(source, config).await
}

/// Extract content with an explicit configuration.
pub async fn extract_with_config(source: &Source, config: &ExtractionConfig) -> Result<ExtractionResult> {
    extract_with_snapshot(source, Arc::new(config.clone())).await
}

async fn extract_with_snapshot(source: &Source, config: Arc<ExtractionConfig>) -> Result<ExtractionResult> {
    crate::engines::ensure_initialized()?;

    let mime = classify_source(source)?;

    // Per-request engine options are layered over the snapshot.
    let config = if source.engine_options.is_empty() {
        config
    } else {
        let mut merged = (*config).clone();
        merged
            .engine_options
            .extend(source.engine_options.iter().map(|(k, v)| (k.clone(), v.clone())));
        Arc::new(merged)
    };

    let chain = {
        let registry = crate::processors::registry::get_processor_registry();
        let guard = registry
            .read()
            .map_err(|e| CcoreError::Internal(format!("Processor registry lock poisoned: {e}")))?;
        resolver::resolve_engine_chain(&mime, source.engines.as_deref(), &config, &guard)?
    };

    let ctx = ProcessorContext::new(config, CancellationToken::new());
    router::run_chain(source, &mime, &chain, &ctx).await
}

/// Extract content from a URL.
pub async fn extract_url(url: impl Into<String>) -> Result<ExtractionResult> {
    extract(&Source::url(url)).await
}

/// Extract content from a local file.
pub async fn extract_file(path: impl AsRef<Path>) -> Result<ExtractionResult> {
    extract(&Source::file(path)).await
}

/// Extract content from raw text.
pub async fn extract_string(content: impl Into<String>) -> Result<ExtractionResult> {
    extract(&Source::raw(content)).await
}

/// Synchronous wrapper for [`extract`].
pub fn extract_sync(source: &Source) -> Result<ExtractionResult> {
    GLOBAL_RUNTIME.block_on(extract(source))
}

/// Synchronous wrapper for [`extract_with_config`].
pub fn extract_with_config_sync(source: &Source, config: &ExtractionConfig) -> Result<ExtractionResult> {
    GLOBAL_RUNTIME.block_on(extract_with_config(source, config))
}

/// Synchronous wrapper for [`extract_file`].
pub fn extract_file_sync(path: impl AsRef<Path>) -> Result<ExtractionResult> {
    GLOBAL_RUNTIME.block_on(extract_file(path))
}

/// Synchronous wrapper for [`extract_url`].
pub fn extract_url_sync(url: impl Into<String>) -> Result<ExtractionResult> {
    GLOBAL_RUNTIME.block_on(extract_url(url))
}

/// Synchronous wrapper for [`extract_string`].
pub fn extract_string_sync(content: impl Into<String>) -> Result<ExtractionResult> {
    GLOBAL_RUNTIME.block_on(extract_string(content))
}
