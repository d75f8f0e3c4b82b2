//! PDF engines: byte-level text, structured markdown, and the remote
//! vision-language pipeline.

use crate::extraction::pdf::{extract_pdf_text, text_to_markdown};
use crate::processors::{Processor, ProcessorCapabilities, ProcessorContext};
use crate::types::{Category, OutputFormat, ProcessorResult, Source, SourceOrigin};
use crate::{CcoreError, Result};
use async_trait::async_trait;
use std::path::PathBuf;

const PDF_MIME: &str = crate::core::mime::PDF_MIME_TYPE;

async fn source_bytes(source: &Source) -> Result<(Vec<u8>, Option<PathBuf>)> {
    match &source.origin {
        SourceOrigin::FilePath(path) => {
            let bytes = crate::core::io::read_file_async(path).await?;
            Ok((bytes, Some(path.clone())))
        }
        SourceOrigin::RawContent(_) => Err(CcoreError::unsupported(
            "PDF engines require a file source, not raw text",
        )),
        SourceOrigin::Url(_) => Err(CcoreError::unsupported("PDF engines do not fetch URLs")),
    }
}

/// Run the CPU-bound PDF decode off the async reactor.
async fn decode_pdf(bytes: Vec<u8>) -> Result<crate::extraction::pdf::PdfExtraction> {
    tokio::task::spawn_blocking(move || extract_pdf_text(&bytes))
        .await
        .map_err(|e| CcoreError::Internal(format!("PDF decode task panicked: {e}")))?
}

fn stamp_pdf_metadata(result: &mut ProcessorResult, extraction: &crate::extraction::pdf::PdfExtraction) {
    result.metadata.insert("pageCount", serde_json::json!(extraction.page_count));
    if extraction.formula_placeholders > 0 {
        result
            .metadata
            .insert("formulaPlaceholders", serde_json::json!(extraction.formula_placeholders));
    }
    if !extraction.ocr_recommended_pages.is_empty() {
        result
            .metadata
            .insert("ocrRecommendedPages", serde_json::json!(extraction.ocr_recommended_pages));
        result.warnings.push(format!(
            "{} page(s) look formula-heavy; an OCR pass is recommended",
            extraction.ocr_recommended_pages.len()
        ));
    }
}

/// Fast byte-level text extraction with ligature and whitespace
/// preservation plus heuristic table conversion.
pub struct PdfTextEngine;

impl PdfTextEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PdfTextEngine {
    fn default() -> Self {
        Self::new()
    }
}

const PDF_TEXT_CAPABILITIES: ProcessorCapabilities = ProcessorCapabilities {
    name: "pdf-text",
    mime_types: &[PDF_MIME],
    extensions: &["pdf"],
    priority: 60,
    requires: &[],
    category: Category::Documents,
};

#[async_trait]
impl Processor for PdfTextEngine {
    fn capabilities(&self) -> &ProcessorCapabilities {
        &PDF_TEXT_CAPABILITIES
    }

    async fn extract(&self, source: &Source, ctx: &ProcessorContext) -> Result<ProcessorResult> {
        ctx.check_cancelled()?;
        let (bytes, _) = source_bytes(source).await?;
        let extraction = decode_pdf(bytes).await?;

        let mut result = ProcessorResult::new(extraction.text.clone(), "text/plain");
        stamp_pdf_metadata(&mut result, &extraction);
        Ok(result)
    }
}

/// Structured-markdown variant of the PDF text engine.
pub struct PdfMarkdownEngine;

impl PdfMarkdownEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PdfMarkdownEngine {
    fn default() -> Self {
        Self::new()
    }
}

const PDF_MARKDOWN_CAPABILITIES: ProcessorCapabilities = ProcessorCapabilities {
    name: "pdf-markdown",
    mime_types: &[PDF_MIME],
    extensions: &["pdf"],
    priority: 55,
    requires: &[],
    category: Category::Documents,
};

#[async_trait]
impl Processor for PdfMarkdownEngine {
    fn capabilities(&self) -> &ProcessorCapabilities {
        &PDF_MARKDOWN_CAPABILITIES
    }

    async fn extract(&self, source: &Source, ctx: &ProcessorContext) -> Result<ProcessorResult> {
        ctx.check_cancelled()?;
        let (bytes, _) = source_bytes(source).await?;
        let extraction = decode_pdf(bytes).await?;

        let markdown = text_to_markdown(&extraction.text);
        let mut result = ProcessorResult::new(markdown, "text/markdown");
        stamp_pdf_metadata(&mut result, &extraction);
        Ok(result)
    }
}

/// Vision-language PDF pipeline, delegated to a peer service over HTTP.
///
/// Available only when `CCORE_PDF_VLM_URL` points at the service. Supports
/// markdown, html, and structured output.
pub struct PdfVlmEngine {
    availability: once_cell::sync::OnceCell<bool>,
}

impl PdfVlmEngine {
    pub fn new() -> Self {
        Self {
            availability: once_cell::sync::OnceCell::new(),
        }
    }

    fn endpoint() -> Option<String> {
        std::env::var("CCORE_PDF_VLM_URL").ok().filter(|v| !v.is_empty())
    }
}

impl Default for PdfVlmEngine {
    fn default() -> Self {
        Self::new()
    }
}

const PDF_VLM_CAPABILITIES: ProcessorCapabilities = ProcessorCapabilities {
    name: "pdf-vlm",
    mime_types: &[PDF_MIME, "image/*"],
    extensions: &["pdf", "png", "jpg", "jpeg", "webp", "tiff"],
    priority: 70,
    requires: &["pdf-vlm"],
    category: Category::Documents,
};

#[async_trait]
impl Processor for PdfVlmEngine {
    fn capabilities(&self) -> &ProcessorCapabilities {
        &PDF_VLM_CAPABILITIES
    }

    fn is_available(&self) -> bool {
        *self.availability.get_or_init(|| Self::endpoint().is_some())
    }

    #[cfg(feature = "http")]
    async fn extract(&self, source: &Source, ctx: &ProcessorContext) -> Result<ProcessorResult> {
        use crate::utils::retry::{RetryAction, RetryPolicy, retry_with_backoff};
        use base64::Engine as _;

        ctx.check_cancelled()?;
        let endpoint = Self::endpoint().ok_or_else(|| CcoreError::EngineUnavailable {
            engine: "pdf-vlm".to_string(),
            message: "CCORE_PDF_VLM_URL is not configured".to_string(),
        })?;

        let (bytes, path) = source_bytes(source).await?;
        let output_format = source
            .output_format
            .or_else(|| configured_output_format(ctx))
            .unwrap_or_default();
        let payload = serde_json::json!({
            "document": base64::engine::general_purpose::STANDARD.encode(&bytes),
            "filename": path.as_ref().and_then(|p| p.file_name()).map(|n| n.to_string_lossy()),
            "output_format": output_format.as_str(),
        });

        let policy = RetryPolicy::default();
        let response: serde_json::Value = retry_with_backoff(&policy, &ctx.cancel, |_| {
            let payload = payload.clone();
            let endpoint = endpoint.clone();
            async move {
                let request = crate::utils::http::client().post(&endpoint).json(&payload).send().await;
                match request {
                    Ok(response) => match response.error_for_status() {
                        Ok(ok) => match ok.json::<serde_json::Value>().await {
                            Ok(value) => RetryAction::Success(value),
                            Err(e) => RetryAction::Fail(CcoreError::from(e)),
                        },
                        Err(e) => RetryAction::from_result(Err(CcoreError::from(e))),
                    },
                    Err(e) => RetryAction::from_result(Err(CcoreError::from(e))),
                }
            }
        })
        .await?;

        let content = response
            .get("content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CcoreError::parse("VLM service response is missing 'content'"))?
            .to_string();

        let mime_type = match output_format {
            OutputFormat::Markdown => "text/markdown",
            OutputFormat::Html => "text/html",
            OutputFormat::Structured => "application/json",
        };

        let mut result = ProcessorResult::new(content, mime_type);
        if let Some(extra) = response.get("metadata").and_then(|v| v.as_object()) {
            for (key, value) in extra {
                result.metadata.insert(key.clone(), value.clone());
            }
        }
        Ok(result)
    }

    #[cfg(not(feature = "http"))]
    async fn extract(&self, _source: &Source, _ctx: &ProcessorContext) -> Result<ProcessorResult> {
        Err(CcoreError::EngineUnavailable {
            engine: "pdf-vlm".to_string(),
            message: "HTTP support is not compiled in".to_string(),
        })
    }
}

/// Read the engine's option record. The only recognized key is
/// `output_format`; anything else is ignored with a warning.
#[cfg(feature = "http")]
fn configured_output_format(ctx: &ProcessorContext) -> Option<OutputFormat> {
    let options = ctx.engine_options("pdf-vlm")?.as_object()?;

    for key in options.keys() {
        if key != "output_format" {
            tracing::warn!(option = %key, "Unknown pdf-vlm engine option, ignoring");
        }
    }

    options
        .get("output_format")
        .and_then(|v| v.as_str())
        .and_then(OutputFormat::parse)
}
