//! Firecrawl engine.
//!
//! Hosted scraping API with JavaScript rendering and anti-bot handling.
//! Requires `FIRECRAWL_API_KEY`; the highest-priority engine in the
//! cascade when configured.

use crate::engines::url::{require_url, send_with_retry};
use crate::processors::{Processor, ProcessorCapabilities, ProcessorContext};
use crate::types::{Category, ProcessorResult, Source};
use crate::utils::http;
use crate::utils::retry::RetryPolicy;
use crate::{CcoreError, Result};
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use serde::Deserialize;

const SCRAPE_ENDPOINT: &str = "https://api.firecrawl.dev/v1/scrape";

const CAPABILITIES: ProcessorCapabilities = ProcessorCapabilities {
    name: "firecrawl",
    mime_types: &[crate::core::mime::URL_MIME_TYPE],
    extensions: &[],
    priority: 65,
    requires: &["firecrawl-api-key"],
    category: Category::Urls,
};

pub struct FirecrawlEngine {
    availability: OnceCell<bool>,
}

impl FirecrawlEngine {
    pub fn new() -> Self {
        Self {
            availability: OnceCell::new(),
        }
    }

    fn api_key() -> Option<String> {
        std::env::var("FIRECRAWL_API_KEY").ok().filter(|v| !v.is_empty())
    }
}

impl Default for FirecrawlEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<ScrapeData>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScrapeData {
    #[serde(default)]
    markdown: Option<String>,
    #[serde(default)]
    metadata: Option<ScrapeMetadata>,
}

#[derive(Debug, Deserialize)]
struct ScrapeMetadata {
    #[serde(default)]
    title: Option<String>,
    #[serde(default, rename = "sourceURL")]
    source_url: Option<String>,
}

#[async_trait]
impl Processor for FirecrawlEngine {
    fn capabilities(&self) -> &ProcessorCapabilities {
        &CAPABILITIES
    }

    fn is_available(&self) -> bool {
        *self.availability.get_or_init(|| Self::api_key().is_some())
    }

    async fn extract(&self, source: &Source, ctx: &ProcessorContext) -> Result<ProcessorResult> {
        ctx.check_cancelled()?;
        let url = require_url(source)?;

        let key = Self::api_key().ok_or_else(|| CcoreError::Auth {
            message: "FIRECRAWL_API_KEY is not configured".to_string(),
        })?;

        http::note_proxy_limitation("firecrawl");

        let request = http::client()
            .post(SCRAPE_ENDPOINT)
            .bearer_auth(key)
            .json(&serde_json::json!({
                "url": url,
                "formats": ["markdown"],
            }));

        let response = send_with_retry(request, &RetryPolicy::default(), &ctx.cancel, "firecrawl").await?;
        let payload: ScrapeResponse = response.json().await.map_err(CcoreError::from)?;

        ctx.check_cancelled()?;

        if !payload.success {
            return Err(CcoreError::network(format!(
                "Firecrawl scrape failed: {}",
                payload.error.unwrap_or_else(|| "unknown error".to_string())
            )));
        }

        let data = payload
            .data
            .ok_or_else(|| CcoreError::parse("Firecrawl response is missing 'data'"))?;
        let markdown = data
            .markdown
            .ok_or_else(|| CcoreError::parse("Firecrawl response is missing markdown content"))?;

        let mut result = ProcessorResult::new(markdown, "text/markdown");
        if let Some(metadata) = data.metadata {
            result.metadata.title = metadata.title;
            result.metadata.source = metadata.source_url.or_else(|| Some(url.to_string()));
        } else {
            result.metadata.source = Some(url.to_string());
        }
        Ok(result)
    }
}
