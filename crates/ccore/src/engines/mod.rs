//! Built-in extraction engines.
//!
//! All engines implement the [`crate::processors::Processor`] trait and are
//! registered into the global registry on first use via
//! [`ensure_initialized`].

use crate::Result;
use crate::processors::registry::get_processor_registry;
use once_cell::sync::Lazy;
use std::sync::Arc;

pub mod text;

#[cfg(feature = "pdf")]
pub mod pdf;

#[cfg(feature = "office")]
pub mod office;

#[cfg(feature = "url")]
pub mod url;

#[cfg(feature = "audio")]
pub mod stt;

#[cfg(feature = "audio")]
pub mod audio;

#[cfg(feature = "video")]
pub mod video;

#[cfg(feature = "youtube")]
pub mod youtube;

pub use text::PlainTextEngine;

#[cfg(feature = "pdf")]
pub use pdf::{PdfMarkdownEngine, PdfTextEngine, PdfVlmEngine};

#[cfg(feature = "office")]
pub use office::OfficeEngine;

#[cfg(feature = "url")]
pub use url::{BasicUrlEngine, FirecrawlEngine, HeadlessEngine, JinaEngine};

#[cfg(feature = "audio")]
pub use audio::AudioTranscriberEngine;

#[cfg(feature = "video")]
pub use video::VideoDemuxEngine;

#[cfg(feature = "youtube")]
pub use youtube::YouTubeTranscriptEngine;

/// One-shot registration of the built-in engines.
static ENGINES_INITIALIZED: Lazy<Result<()>> = Lazy::new(register_default_processors);

/// Ensure built-in engines are registered.
///
/// Called automatically on the first extraction; safe to call repeatedly.
pub fn ensure_initialized() -> Result<()> {
    ENGINES_INITIALIZED
        .as_ref()
        .map(|_| ())
        .map_err(|e| crate::CcoreError::Internal(format!("Failed to register default engines: {e}")))
}

/// Register all built-in engines with the global registry.
///
/// Runs once at startup (triggered by the first extraction call);
/// registration after the registry is in use is rejected by the
/// duplicate-name check.
pub fn register_default_processors() -> Result<()> {
    let registry = get_processor_registry();
    let mut registry = registry
        .write()
        .map_err(|e| crate::CcoreError::Internal(format!("Processor registry lock poisoned: {e}")))?;

    registry.register(Arc::new(PlainTextEngine::new()))?;

    #[cfg(feature = "pdf")]
    {
        registry.register(Arc::new(PdfTextEngine::new()))?;
        registry.register(Arc::new(PdfMarkdownEngine::new()))?;
        registry.register(Arc::new(PdfVlmEngine::new()))?;
    }

    #[cfg(feature = "office")]
    registry.register(Arc::new(OfficeEngine::new()))?;

    #[cfg(feature = "url")]
    {
        registry.register(Arc::new(FirecrawlEngine::new()))?;
        registry.register(Arc::new(JinaEngine::new()))?;
        registry.register(Arc::new(HeadlessEngine::new()))?;
        registry.register(Arc::new(BasicUrlEngine::new()))?;
    }

    #[cfg(feature = "audio")]
    registry.register(Arc::new(AudioTranscriberEngine::new()))?;

    #[cfg(feature = "video")]
    registry.register(Arc::new(VideoDemuxEngine::new()))?;

    #[cfg(feature = "youtube")]
    registry.register(Arc::new(YouTubeTranscriptEngine::new()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_initialized_registers_engines() {
        ensure_initialized().expect("engine registration failed");

        let registry = get_processor_registry();
        let guard = registry.read().unwrap();
        let names = guard.list();

        assert!(names.contains(&"plain-text".to_string()));

        #[cfg(feature = "pdf")]
        {
            assert!(names.contains(&"pdf-text".to_string()));
            assert!(names.contains(&"pdf-markdown".to_string()));
            assert!(names.contains(&"pdf-vlm".to_string()));
        }

        #[cfg(feature = "office")]
        assert!(names.contains(&"office".to_string()));

        #[cfg(feature = "url")]
        {
            assert!(names.contains(&"firecrawl".to_string()));
            assert!(names.contains(&"jina".to_string()));
            assert!(names.contains(&"headless".to_string()));
            assert!(names.contains(&"basic".to_string()));
        }

        #[cfg(feature = "audio")]
        assert!(names.contains(&"audio-transcriber".to_string()));

        #[cfg(feature = "video")]
        assert!(names.contains(&"video-demux".to_string()));

        #[cfg(feature = "youtube")]
        assert!(names.contains(&"youtube-transcript".to_string()));
    }

    #[test]
    fn test_ensure_initialized_is_idempotent() {
        ensure_initialized().unwrap();
        ensure_initialized().unwrap();
    }
}
