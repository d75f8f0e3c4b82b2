//! Basic HTML scraper: plain GET plus HTML-to-Markdown conversion.
//!
//! The last resort of the cascade. No JavaScript rendering, no reader-mode
//! service; works for static pages and plain-text resources.

use crate::engines::url::{require_url, send_with_retry};
use crate::extraction::html::{convert_html_to_markdown, extract_html_title};
use crate::processors::{Processor, ProcessorCapabilities, ProcessorContext};
use crate::types::{Category, ProcessorResult, Source};
use crate::utils::http;
use crate::utils::retry::RetryPolicy;
use crate::Result;
use async_trait::async_trait;

const CAPABILITIES: ProcessorCapabilities = ProcessorCapabilities {
    name: "basic",
    mime_types: &[crate::core::mime::URL_MIME_TYPE],
    extensions: &[],
    priority: 40,
    requires: &[],
    category: Category::Urls,
};

pub struct BasicUrlEngine;

impl BasicUrlEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for BasicUrlEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Processor for BasicUrlEngine {
    fn capabilities(&self) -> &ProcessorCapabilities {
        &CAPABILITIES
    }

    async fn extract(&self, source: &Source, ctx: &ProcessorContext) -> Result<ProcessorResult> {
        ctx.check_cancelled()?;
        let url = require_url(source)?;

        let request = http::client()
            .get(url)
            .header(reqwest::header::USER_AGENT, http::BROWSER_USER_AGENT);

        let response = send_with_retry(request, &RetryPolicy::default(), &ctx.cancel, "basic").await?;
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = response.text().await.map_err(crate::CcoreError::from)?;

        ctx.check_cancelled()?;

        let is_html = content_type.contains("text/html") || crate::core::mime::looks_like_html(&body);
        let (content, mime_type, title) = if is_html {
            let title = extract_html_title(&body);
            (convert_html_to_markdown(&body)?, "text/markdown", title)
        } else {
            (body, "text/plain", None)
        };

        let mut result = ProcessorResult::new(content, mime_type);
        result.metadata.source = Some(final_url);
        result.metadata.title = title;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CcoreError;

    #[tokio::test]
    async fn test_rejects_non_url_sources() {
        let engine = BasicUrlEngine::new();
        let ctx = ProcessorContext::for_testing();
        let result = engine.extract(&Source::raw("text"), &ctx).await;
        assert!(matches!(result, Err(CcoreError::UnsupportedContent { .. })));
    }

    #[test]
    fn test_always_available() {
        assert!(BasicUrlEngine::new().is_available());
    }
}
