//! Core data types shared across the extraction pipeline.
//!
//! The central types are [`Source`] (an immutable extraction request),
//! [`ProcessorResult`] (what an engine produces), and [`ExtractionResult`]
//! (what callers receive after the router picks a winner).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Where the content of a [`Source`] comes from. Exactly one origin is
/// populated per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOrigin {
    /// Remote content addressed by URL.
    Url(String),
    /// Local file on disk.
    FilePath(PathBuf),
    /// Raw text supplied directly by the caller.
    RawContent(String),
}

/// An immutable extraction request.
///
/// Construct with [`Source::url`], [`Source::file`], or [`Source::raw`] and
/// refine with the builder methods. The hints are optional; anything left
/// unset is resolved from configuration or auto-detected.
///
/// # Example
///
/// ```rust
/// use ccore::types::Source;
///
/// let source = Source::url("https://example.com/article")
///     .with_engine("jina")
///     .with_timeout_seconds(30);
/// assert_eq!(source.engines.as_deref(), Some(&["jina".to_string()][..]));
/// ```
#[derive(Debug, Clone)]
pub struct Source {
    pub origin: SourceOrigin,
    /// Declared MIME type; skips sniffing when present.
    pub mime_hint: Option<String>,
    /// Requested output format for document engines.
    pub output_format: Option<OutputFormat>,
    /// Explicit engine override. When set, the resolver uses it verbatim.
    pub engines: Option<Vec<String>>,
    /// Per-engine opaque options, merged over the config's `engine_options`.
    pub engine_options: HashMap<String, serde_json::Value>,
    /// Speech-to-text provider override. Must be paired with `audio_model`.
    pub audio_provider: Option<String>,
    /// Speech-to-text model override. Must be paired with `audio_provider`.
    pub audio_model: Option<String>,
    /// Segment concurrency override for the audio pipeline.
    pub audio_concurrency: Option<usize>,
    /// Overall extraction budget override in seconds.
    pub timeout_seconds: Option<u64>,
}

impl Source {
    fn from_origin(origin: SourceOrigin) -> Self {
        Self {
            origin,
            mime_hint: None,
            output_format: None,
            engines: None,
            engine_options: HashMap::new(),
            audio_provider: None,
            audio_model: None,
            audio_concurrency: None,
            timeout_seconds: None,
        }
    }

    /// A source backed by a URL.
    pub fn url(url: impl Into<String>) -> Self {
        Self::from_origin(SourceOrigin::Url(url.into()))
    }

    /// A source backed by a local file.
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self::from_origin(SourceOrigin::FilePath(path.as_ref().to_path_buf()))
    }

    /// A source backed by raw text content.
    pub fn raw(content: impl Into<String>) -> Self {
        Self::from_origin(SourceOrigin::RawContent(content.into()))
    }

    /// Declare the MIME type, bypassing detection.
    pub fn with_mime_type(mut self, mime: impl Into<String>) -> Self {
        self.mime_hint = Some(mime.into());
        self
    }

    /// Force a single engine. Replaces any previously set override.
    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        self.engines = Some(vec![engine.into()]);
        self
    }

    /// Force an ordered engine chain. Replaces any previously set override.
    pub fn with_engines(mut self, engines: Vec<String>) -> Self {
        self.engines = Some(engines);
        self
    }

    /// Request a specific output format from document engines.
    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = Some(format);
        self
    }

    /// Attach an opaque option record for one engine.
    pub fn with_engine_option(mut self, engine: impl Into<String>, options: serde_json::Value) -> Self {
        self.engine_options.insert(engine.into(), options);
        self
    }

    /// Override the STT provider and model together.
    pub fn with_audio_backend(mut self, provider: impl Into<String>, model: impl Into<String>) -> Self {
        self.audio_provider = Some(provider.into());
        self.audio_model = Some(model.into());
        self
    }

    /// Override segment concurrency for the audio pipeline.
    pub fn with_audio_concurrency(mut self, concurrency: usize) -> Self {
        self.audio_concurrency = Some(concurrency);
        self
    }

    /// Override the overall extraction budget.
    pub fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    /// Short human-readable description of the origin, used in metadata and
    /// log lines.
    pub fn describe(&self) -> String {
        match &self.origin {
            SourceOrigin::Url(url) => url.clone(),
            SourceOrigin::FilePath(path) => path.display().to_string(),
            SourceOrigin::RawContent(_) => "<raw content>".to_string(),
        }
    }
}

/// Output format requested from document engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Markdown,
    Html,
    Structured,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Markdown
    }
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::Structured => "structured",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "markdown" | "md" => Some(Self::Markdown),
            "html" => Some(Self::Html),
            "structured" | "json" => Some(Self::Structured),
            _ => None,
        }
    }
}

/// Coarse grouping of MIME types used for engine configuration and registry
/// lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Documents,
    Urls,
    Audio,
    Video,
    Images,
    Text,
    Youtube,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Documents,
        Category::Urls,
        Category::Audio,
        Category::Video,
        Category::Images,
        Category::Text,
        Category::Youtube,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Documents => "documents",
            Self::Urls => "urls",
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Images => "images",
            Self::Text => "text",
            Self::Youtube => "youtube",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "documents" => Some(Self::Documents),
            "urls" => Some(Self::Urls),
            "audio" => Some(Self::Audio),
            "video" => Some(Self::Video),
            "images" => Some(Self::Images),
            "text" => Some(Self::Text),
            "youtube" => Some(Self::Youtube),
            _ => None,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured metadata attached to every extraction result.
///
/// Common fields are typed; engine-specific extras live in `additional`,
/// keyed by string. Serialized names match the wire format consumers expect
/// (`extractionTime`, `contentLength`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    /// Name of the engine that produced the result. Always present on a
    /// returned result; the router stamps it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction_engine: Option<String>,

    /// Origin description (URL or file path).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Document or page title, where recoverable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Wall-clock extraction time in milliseconds.
    #[serde(rename = "extractionTime", skip_serializing_if = "Option::is_none")]
    pub extraction_time_ms: Option<u64>,

    /// Length of `content` in bytes.
    #[serde(rename = "contentLength", skip_serializing_if = "Option::is_none")]
    pub content_length: Option<usize>,

    /// Engine-specific extras.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub additional: HashMap<String, serde_json::Value>,
}

impl Metadata {
    /// Insert an engine-specific metadata value.
    pub fn insert(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.additional.insert(key.into(), value);
    }
}

/// What a single engine produces for a source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorResult {
    /// Cleaned textual content.
    pub content: String,
    /// MIME type of the produced content (usually `text/markdown` or
    /// `text/plain`).
    pub mime_type: String,
    pub metadata: Metadata,
    /// Non-fatal notes accumulated while extracting.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ProcessorResult {
    /// A result with empty metadata and no warnings.
    pub fn new(content: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            mime_type: mime_type.into(),
            metadata: Metadata::default(),
            warnings: Vec::new(),
        }
    }
}

/// The externally visible outcome of a successful extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Cleaned textual content.
    pub content: String,
    /// Name of the engine that produced the content.
    pub engine_used: String,
    pub metadata: Metadata,
    /// Warnings from the winning engine plus any skipped prior attempts.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_single_origin() {
        let source = Source::url("https://example.com");
        assert!(matches!(source.origin, SourceOrigin::Url(_)));

        let source = Source::file("/tmp/report.pdf");
        assert!(matches!(source.origin, SourceOrigin::FilePath(_)));

        let source = Source::raw("hello");
        assert!(matches!(source.origin, SourceOrigin::RawContent(_)));
    }

    #[test]
    fn test_source_builder_engine_override() {
        let source = Source::file("/tmp/a.pdf").with_engine("pdf-text");
        assert_eq!(source.engines, Some(vec!["pdf-text".to_string()]));

        let source = source.with_engines(vec!["pdf-vlm".to_string(), "pdf-text".to_string()]);
        assert_eq!(
            source.engines,
            Some(vec!["pdf-vlm".to_string(), "pdf-text".to_string()])
        );
    }

    #[test]
    fn test_source_audio_backend_pair() {
        let source = Source::file("/tmp/a.mp3").with_audio_backend("groq", "whisper-large-v3");
        assert_eq!(source.audio_provider.as_deref(), Some("groq"));
        assert_eq!(source.audio_model.as_deref(), Some("whisper-large-v3"));
    }

    #[test]
    fn test_source_describe() {
        assert_eq!(Source::url("https://a.example").describe(), "https://a.example");
        assert_eq!(Source::raw("x").describe(), "<raw content>");
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!(OutputFormat::parse("markdown"), Some(OutputFormat::Markdown));
        assert_eq!(OutputFormat::parse("MD"), Some(OutputFormat::Markdown));
        assert_eq!(OutputFormat::parse("html"), Some(OutputFormat::Html));
        assert_eq!(OutputFormat::parse("structured"), Some(OutputFormat::Structured));
        assert_eq!(OutputFormat::parse("docbook"), None);
        assert_eq!(OutputFormat::default(), OutputFormat::Markdown);
    }

    #[test]
    fn test_category_parse_round_trip() {
        for category in Category::ALL {
            assert_eq!(Category::parse(category.as_str()), Some(category));
        }
        assert_eq!(Category::parse("spreadsheets"), None);
    }

    #[test]
    fn test_metadata_serialized_names() {
        let metadata = Metadata {
            extraction_engine: Some("jina".to_string()),
            extraction_time_ms: Some(120),
            content_length: Some(42),
            ..Default::default()
        };
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["extractionTime"], 120);
        assert_eq!(json["contentLength"], 42);
        assert_eq!(json["extraction_engine"], "jina");
    }

    #[test]
    fn test_metadata_additional_round_trip() {
        let mut metadata = Metadata::default();
        metadata.insert("video_id", serde_json::json!("dQw4w9WgXcQ"));
        let json = serde_json::to_string(&metadata).unwrap();
        let back: Metadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back.additional["video_id"], "dQw4w9WgXcQ");
    }

    #[test]
    fn test_processor_result_new() {
        let result = ProcessorResult::new("body", "text/markdown");
        assert_eq!(result.content, "body");
        assert_eq!(result.mime_type, "text/markdown");
        assert!(result.warnings.is_empty());
        assert!(result.metadata.extraction_engine.is_none());
    }
}
