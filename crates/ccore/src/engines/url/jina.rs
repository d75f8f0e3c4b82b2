//! Jina Reader engine.
//!
//! Proxies the target through `r.jina.ai`, which renders the page and
//! returns reader-mode content. Works without credentials; a `JINA_API_KEY`
//! raises the rate limits. The reader's text format leads with `Title:` and
//! `URL Source:` lines followed by a `Markdown Content:` body.

use crate::engines::url::{require_url, send_with_retry};
use crate::processors::{Processor, ProcessorCapabilities, ProcessorContext};
use crate::types::{Category, ProcessorResult, Source};
use crate::utils::http;
use crate::utils::retry::RetryPolicy;
use crate::Result;
use async_trait::async_trait;

const READER_BASE: &str = "https://r.jina.ai/";

const CAPABILITIES: ProcessorCapabilities = ProcessorCapabilities {
    name: "jina",
    mime_types: &[crate::core::mime::URL_MIME_TYPE],
    extensions: &[],
    priority: 60,
    requires: &[],
    category: Category::Urls,
};

pub struct JinaEngine;

impl JinaEngine {
    pub fn new() -> Self {
        Self
    }

    fn api_key() -> Option<String> {
        std::env::var("JINA_API_KEY").ok().filter(|v| !v.is_empty())
    }
}

impl Default for JinaEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Parsed reader-format response.
struct ReaderPayload {
    title: Option<String>,
    final_url: Option<String>,
    markdown: String,
}

/// Split the reader's `Title:` / `URL Source:` preamble from the Markdown
/// body. Responses without a preamble are treated as pure Markdown.
fn parse_reader_response(body: &str) -> ReaderPayload {
    let mut title = None;
    let mut final_url = None;

    if let Some(idx) = body.find("Markdown Content:") {
        let (head, tail) = body.split_at(idx);
        for line in head.lines() {
            if let Some(value) = line.strip_prefix("Title:") {
                let value = value.trim();
                if !value.is_empty() {
                    title = Some(value.to_string());
                }
            } else if let Some(value) = line.strip_prefix("URL Source:") {
                let value = value.trim();
                if !value.is_empty() {
                    final_url = Some(value.to_string());
                }
            }
        }
        let markdown = tail
            .trim_start_matches("Markdown Content:")
            .trim()
            .to_string();
        return ReaderPayload {
            title,
            final_url,
            markdown,
        };
    }

    ReaderPayload {
        title: None,
        final_url: None,
        markdown: body.trim().to_string(),
    }
}

#[async_trait]
impl Processor for JinaEngine {
    fn capabilities(&self) -> &ProcessorCapabilities {
        &CAPABILITIES
    }

    async fn extract(&self, source: &Source, ctx: &ProcessorContext) -> Result<ProcessorResult> {
        ctx.check_cancelled()?;
        let url = require_url(source)?;

        http::note_proxy_limitation("jina");

        let mut request = http::client()
            .get(format!("{READER_BASE}{url}"))
            .header("X-Return-Format", "markdown");
        if let Some(key) = Self::api_key() {
            request = request.bearer_auth(key);
        }

        let response = send_with_retry(request, &RetryPolicy::default(), &ctx.cancel, "jina").await?;
        let body = response.text().await.map_err(crate::CcoreError::from)?;

        ctx.check_cancelled()?;

        let payload = parse_reader_response(&body);
        let mut result = ProcessorResult::new(payload.markdown, "text/markdown");
        result.metadata.title = payload.title;
        result.metadata.source = Some(payload.final_url.unwrap_or_else(|| url.to_string()));
        Ok(result)
    }
}
