//! Office document engine: DOCX, PPTX, ODT, XLSX, ODS.

use crate::core::mime::{DOCX_MIME_TYPE, ODS_MIME_TYPE, ODT_MIME_TYPE, PPTX_MIME_TYPE, XLSX_MIME_TYPE};
use crate::extraction::office;
use crate::processors::{Processor, ProcessorCapabilities, ProcessorContext};
use crate::types::{Category, ProcessorResult, Source, SourceOrigin};
use crate::{CcoreError, Result};
use async_trait::async_trait;

const CAPABILITIES: ProcessorCapabilities = ProcessorCapabilities {
    name: "office",
    mime_types: &[
        DOCX_MIME_TYPE,
        PPTX_MIME_TYPE,
        ODT_MIME_TYPE,
        XLSX_MIME_TYPE,
        ODS_MIME_TYPE,
    ],
    extensions: &["docx", "pptx", "odt", "xlsx", "ods"],
    priority: 50,
    requires: &[],
    category: Category::Documents,
};

/// Format-specific parsers producing markdown-like text that preserves
/// tables, lists, bold/italic, and headings.
pub struct OfficeEngine;

impl OfficeEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for OfficeEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Processor for OfficeEngine {
    fn capabilities(&self) -> &ProcessorCapabilities {
        &CAPABILITIES
    }

    async fn extract(&self, source: &Source, ctx: &ProcessorContext) -> Result<ProcessorResult> {
        ctx.check_cancelled()?;

        let SourceOrigin::FilePath(path) = &source.origin else {
            return Err(CcoreError::unsupported("office engine requires a file source"));
        };

        let mime = match source.mime_hint.clone() {
            Some(mime) => mime,
            None => crate::core::mime::detect_mime_type(path)?,
        };
        let bytes = crate::core::io::read_file_async(path).await?;

        // Container parsing is CPU-bound; keep it off the async reactor.
        let mime_for_parse = mime.clone();
        let markdown = tokio::task::spawn_blocking(move || match mime_for_parse.as_str() {
            DOCX_MIME_TYPE => office::extract_docx(&bytes),
            PPTX_MIME_TYPE => office::extract_pptx(&bytes),
            ODT_MIME_TYPE => office::extract_odt(&bytes),
            XLSX_MIME_TYPE | ODS_MIME_TYPE => office::extract_spreadsheet(&bytes, &mime_for_parse),
            other => Err(CcoreError::unsupported(format!(
                "office engine cannot handle '{other}'"
            ))),
        })
        .await
        .map_err(|e| CcoreError::Internal(format!("Office parse task panicked: {e}")))??;

        Ok(ProcessorResult::new(markdown, "text/markdown"))
    }
}
