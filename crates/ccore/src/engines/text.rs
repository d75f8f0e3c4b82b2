//! Plain text and HTML file engine.
//!
//! Passes plain text and Markdown through untouched; HTML content (declared
//! or detected by markers) is converted to Markdown. Raw-content sources
//! round-trip byte-for-byte.

use crate::core::mime::{self, HTML_MIME_TYPE, MARKDOWN_MIME_TYPE, PLAIN_TEXT_MIME_TYPE};
use crate::processors::{Processor, ProcessorCapabilities, ProcessorContext};
use crate::types::{Category, Metadata, ProcessorResult, Source, SourceOrigin};
use crate::{CcoreError, Result};
use async_trait::async_trait;

const CAPABILITIES: ProcessorCapabilities = ProcessorCapabilities {
    name: "plain-text",
    mime_types: &[
        PLAIN_TEXT_MIME_TYPE,
        MARKDOWN_MIME_TYPE,
        "text/x-markdown",
        HTML_MIME_TYPE,
        "text/csv",
        "application/json",
    ],
    extensions: &["txt", "text", "md", "markdown", "html", "htm", "csv", "json"],
    priority: 50,
    requires: &[],
    category: Category::Text,
};

pub struct PlainTextEngine;

impl PlainTextEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PlainTextEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Processor for PlainTextEngine {
    fn capabilities(&self) -> &ProcessorCapabilities {
        &CAPABILITIES
    }

    async fn extract(&self, source: &Source, ctx: &ProcessorContext) -> Result<ProcessorResult> {
        ctx.check_cancelled()?;

        let content = match &source.origin {
            SourceOrigin::RawContent(content) => content.clone(),
            SourceOrigin::FilePath(path) => {
                let bytes = crate::core::io::read_file_async(path).await?;
                String::from_utf8_lossy(&bytes).into_owned()
            }
            SourceOrigin::Url(_) => {
                return Err(CcoreError::unsupported(
                    "plain-text engine does not fetch URLs",
                ));
            }
        };

        let declared_html = source.mime_hint.as_deref() == Some(HTML_MIME_TYPE)
            || matches!(&source.origin, SourceOrigin::FilePath(p)
                if p.extension().and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm")));

        if declared_html || mime::looks_like_html(&content) {
            return convert_html(&content);
        }

        let mut metadata = Metadata::default();
        metadata.insert("lineCount", serde_json::json!(content.lines().count()));
        metadata.insert("wordCount", serde_json::json!(content.split_whitespace().count()));

        Ok(ProcessorResult {
            content,
            mime_type: PLAIN_TEXT_MIME_TYPE.to_string(),
            metadata,
            warnings: Vec::new(),
        })
    }
}

#[cfg(feature = "html")]
fn convert_html(content: &str) -> Result<ProcessorResult> {
    let markdown = crate::extraction::html::convert_html_to_markdown(content)?;
    let mut result = ProcessorResult::new(markdown, MARKDOWN_MIME_TYPE);
    result.metadata.title = crate::extraction::html::extract_html_title(content);
    Ok(result)
}

#[cfg(not(feature = "html"))]
fn convert_html(content: &str) -> Result<ProcessorResult> {
    let mut result = ProcessorResult::new(content.to_string(), HTML_MIME_TYPE.to_string());
    result
        .warnings
        .push("HTML conversion is not compiled in; returning raw HTML".to_string());
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_plain_text_round_trips_exactly() {
        let engine = PlainTextEngine::new();
        let ctx = ProcessorContext::for_testing();
        let input = "line one\nline two\n";

        let result = engine.extract(&Source::raw(input), &ctx).await.unwrap();
        assert_eq!(result.content, input);
        assert_eq!(result.mime_type, PLAIN_TEXT_MIME_TYPE);
        assert_eq!(result.metadata.additional["lineCount"], 2);
    }

    #[cfg(feature = "html")]
    #[tokio::test]
    async fn test_html_content_is_converted() {
        let engine = PlainTextEngine::new();
        let ctx = ProcessorContext::for_testing();
        let html = "<!DOCTYPE html><html><head><title>Doc</title></head><body><h1>Hi</h1></body></html>";

        let result = engine.extract(&Source::raw(html), &ctx).await.unwrap();
        assert!(result.content.contains("# Hi"));
        assert_eq!(result.mime_type, MARKDOWN_MIME_TYPE);
        assert_eq!(result.metadata.title.as_deref(), Some("Doc"));
    }

    #[tokio::test]
    async fn test_markdown_passes_through() {
        let engine = PlainTextEngine::new();
        let ctx = ProcessorContext::for_testing();
        let markdown = "# Heading\n\nSome *emphasis* here.";

        let source = Source::raw(markdown).with_mime_type(MARKDOWN_MIME_TYPE);
        let result = engine.extract(&source, &ctx).await.unwrap();
        assert_eq!(result.content, markdown);
    }

    #[tokio::test]
    async fn test_file_source_reads_disk() {
        use std::io::Write;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.txt");
        std::fs::File::create(&path).unwrap().write_all(b"from disk").unwrap();

        let engine = PlainTextEngine::new();
        let ctx = ProcessorContext::for_testing();
        let result = engine.extract(&Source::file(&path), &ctx).await.unwrap();
        assert_eq!(result.content, "from disk");
    }

    #[tokio::test]
    async fn test_url_source_is_unsupported() {
        let engine = PlainTextEngine::new();
        let ctx = ProcessorContext::for_testing();
        let result = engine.extract(&Source::url("https://example.com"), &ctx).await;
        assert!(matches!(result, Err(CcoreError::UnsupportedContent { .. })));
    }

    #[tokio::test]
    async fn test_cancelled_context_short_circuits() {
        let engine = PlainTextEngine::new();
        let ctx = ProcessorContext::for_testing();
        ctx.cancel.cancel();

        let result = engine.extract(&Source::raw("x"), &ctx).await;
        assert!(matches!(result, Err(CcoreError::Cancelled)));
    }
}
