//! HTML to Markdown conversion.
//!
//! Thin wrapper over `html-to-markdown-rs`. The converted text preserves
//! heading levels, lists, inline emphasis, code fences, and link targets;
//! scripts, styles, and other non-content markup are dropped by the
//! converter.

use crate::{CcoreError, Result};

/// Convert an HTML document or fragment to Markdown.
pub fn convert_html_to_markdown(html: &str) -> Result<String> {
    let markdown = html_to_markdown_rs::convert(html, None)
        .map_err(|e| CcoreError::parse(format!("Failed to convert HTML to Markdown: {e}")))?;
    Ok(markdown.trim().to_string())
}

/// Extract the `<title>` of an HTML document, if present.
pub fn extract_html_title(html: &str) -> Option<String> {
    let lower = html.to_ascii_lowercase();
    let start = lower.find("<title")?;
    let open_end = lower[start..].find('>')? + start + 1;
    let close = lower[open_end..].find("</title>")? + open_end;
    let title = html[open_end..close].trim();
    if title.is_empty() {
        None
    } else {
        Some(title.to_string())
    }
}
