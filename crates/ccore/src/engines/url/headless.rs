//! Headless browser engine.
//!
//! Renders the page in a local Chromium/Chrome in headless mode and
//! converts the resulting DOM to Markdown. Handles JavaScript-heavy pages
//! without any hosted service, at the cost of needing a browser binary on
//! the machine.

use crate::engines::url::require_url;
use crate::extraction::html::{convert_html_to_markdown, extract_html_title};
use crate::processors::{Processor, ProcessorCapabilities, ProcessorContext};
use crate::types::{Category, ProcessorResult, Source};
use crate::{CcoreError, Result};
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use std::path::PathBuf;
use tokio::process::Command;

const CAPABILITIES: ProcessorCapabilities = ProcessorCapabilities {
    name: "headless",
    mime_types: &[crate::core::mime::URL_MIME_TYPE],
    extensions: &[],
    priority: 55,
    requires: &["chromium"],
    category: Category::Urls,
};

const BROWSER_NAMES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "chrome",
];

/// Locate a usable browser binary: `CCORE_BROWSER_PATH` first, then PATH.
fn find_browser() -> Option<PathBuf> {
    if let Some(value) = std::env::var_os("CCORE_BROWSER_PATH").filter(|v| !v.is_empty()) {
        let candidate = PathBuf::from(value);
        if candidate.is_file() {
            return Some(candidate);
        }
    }

    let path_env = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_env) {
        for name in BROWSER_NAMES {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

pub struct HeadlessEngine {
    availability: OnceCell<bool>,
}

impl HeadlessEngine {
    pub fn new() -> Self {
        Self {
            availability: OnceCell::new(),
        }
    }
}

impl Default for HeadlessEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Processor for HeadlessEngine {
    fn capabilities(&self) -> &ProcessorCapabilities {
        &CAPABILITIES
    }

    fn is_available(&self) -> bool {
        *self.availability.get_or_init(|| find_browser().is_some())
    }

    async fn extract(&self, source: &Source, ctx: &ProcessorContext) -> Result<ProcessorResult> {
        ctx.check_cancelled()?;
        let url = require_url(source)?;

        let browser = find_browser().ok_or_else(|| CcoreError::EngineUnavailable {
            engine: "headless".to_string(),
            message: "no Chromium/Chrome binary found on PATH".to_string(),
        })?;

        let mut command = Command::new(&browser);
        command
            .args([
                "--headless=new",
                "--disable-gpu",
                "--no-sandbox",
                "--virtual-time-budget=10000",
                "--dump-dom",
            ])
            .arg(url)
            .kill_on_drop(true);

        let output = tokio::select! {
            _ = ctx.cancel.cancelled() => return Err(CcoreError::Cancelled),
            output = command.output() => output.map_err(CcoreError::Io)?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CcoreError::network(format!(
                "headless browser exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let html = String::from_utf8_lossy(&output.stdout).into_owned();
        if html.trim().is_empty() {
            return Err(CcoreError::parse("headless browser produced an empty DOM"));
        }

        ctx.check_cancelled()?;

        let mut result = ProcessorResult::new(convert_html_to_markdown(&html)?, "text/markdown");
        result.metadata.title = extract_html_title(&html);
        result.metadata.source = Some(url.to_string());
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_browser_env_override_must_exist() {
        unsafe { std::env::set_var("CCORE_BROWSER_PATH", "/nonexistent/browser") };
        // Falls through to PATH; either way no panic and no bogus path.
        if let Some(found) = find_browser() {
            assert!(found.is_file());
        }
        unsafe { std::env::remove_var("CCORE_BROWSER_PATH") };
    }

    #[tokio::test]
    async fn test_rejects_non_url_sources() {
        let engine = HeadlessEngine::new();
        let ctx = ProcessorContext::for_testing();
        let result = engine.extract(&Source::raw("text"), &ctx).await;
        assert!(matches!(result, Err(CcoreError::UnsupportedContent { .. })));
    }
}
