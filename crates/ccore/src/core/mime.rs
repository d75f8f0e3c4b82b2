//! MIME type detection, normalization, and category mapping.
//!
//! Sources are classified to a MIME type before engine resolution. Files are
//! detected by extension first, then content-sniffed with `infer`; URLs map
//! to synthetic MIME types so they flow through the same registry machinery
//! as documents.

use crate::types::Category;
use crate::{CcoreError, Result};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::path::Path;

pub const PLAIN_TEXT_MIME_TYPE: &str = "text/plain";
pub const MARKDOWN_MIME_TYPE: &str = "text/markdown";
pub const HTML_MIME_TYPE: &str = "text/html";
pub const CSV_MIME_TYPE: &str = "text/csv";
pub const JSON_MIME_TYPE: &str = "application/json";
pub const PDF_MIME_TYPE: &str = "application/pdf";
pub const DOCX_MIME_TYPE: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const XLSX_MIME_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const PPTX_MIME_TYPE: &str = "application/vnd.openxmlformats-officedocument.presentationml.presentation";
pub const ODT_MIME_TYPE: &str = "application/vnd.oasis.opendocument.text";
pub const ODS_MIME_TYPE: &str = "application/vnd.oasis.opendocument.spreadsheet";

/// Synthetic MIME type for generic URL sources.
pub const URL_MIME_TYPE: &str = "text/uri-list";
/// Synthetic MIME type for YouTube URL sources.
pub const YOUTUBE_MIME_TYPE: &str = "text/x-youtube";

/// Extension to MIME type mapping for the formats the built-in engines claim.
static EXT_TO_MIME: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut m = HashMap::new();

    m.insert("txt", PLAIN_TEXT_MIME_TYPE);
    m.insert("text", PLAIN_TEXT_MIME_TYPE);
    m.insert("md", MARKDOWN_MIME_TYPE);
    m.insert("markdown", MARKDOWN_MIME_TYPE);
    m.insert("csv", CSV_MIME_TYPE);
    m.insert("json", JSON_MIME_TYPE);

    m.insert("html", HTML_MIME_TYPE);
    m.insert("htm", HTML_MIME_TYPE);

    m.insert("pdf", PDF_MIME_TYPE);

    m.insert("docx", DOCX_MIME_TYPE);
    m.insert("xlsx", XLSX_MIME_TYPE);
    m.insert("pptx", PPTX_MIME_TYPE);
    m.insert("odt", ODT_MIME_TYPE);
    m.insert("ods", ODS_MIME_TYPE);

    m.insert("png", "image/png");
    m.insert("jpg", "image/jpeg");
    m.insert("jpeg", "image/jpeg");
    m.insert("gif", "image/gif");
    m.insert("bmp", "image/bmp");
    m.insert("webp", "image/webp");
    m.insert("tiff", "image/tiff");
    m.insert("tif", "image/tiff");

    m.insert("mp3", "audio/mpeg");
    m.insert("wav", "audio/wav");
    m.insert("m4a", "audio/mp4");
    m.insert("aac", "audio/aac");
    m.insert("flac", "audio/flac");
    m.insert("ogg", "audio/ogg");
    m.insert("opus", "audio/opus");

    m.insert("mp4", "video/mp4");
    m.insert("mkv", "video/x-matroska");
    m.insert("mov", "video/quicktime");
    m.insert("avi", "video/x-msvideo");
    m.insert("webm", "video/webm");

    m
});

/// Detect the MIME type of a file.
///
/// Extension mapping wins; unknown extensions fall back to content sniffing
/// via `infer`, then to `mime_guess`. Fails with `Validation` when nothing
/// matches.
pub fn detect_mime_type(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();

    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        if let Some(mime) = EXT_TO_MIME.get(ext.to_ascii_lowercase().as_str()) {
            return Ok((*mime).to_string());
        }
    }

    if let Ok(Some(kind)) = infer::get_from_path(path) {
        return Ok(kind.mime_type().to_string());
    }

    if let Some(guess) = mime_guess::from_path(path).first() {
        return Ok(guess.essence_str().to_string());
    }

    Err(CcoreError::validation(format!(
        "Could not determine MIME type for {}",
        path.display()
    )))
}

/// Detect the MIME type from an in-memory byte prefix.
pub fn detect_mime_type_from_bytes(bytes: &[u8]) -> Option<String> {
    infer::get(bytes).map(|kind| kind.mime_type().to_string())
}

/// Whether `mime` is a wildcard pattern (`image/*`).
pub fn is_wildcard(mime: &str) -> bool {
    mime.ends_with("/*")
}

/// The wildcard pattern covering `mime` (`image/png` -> `image/*`).
pub fn wildcard_of(mime: &str) -> Option<String> {
    mime.split_once('/').map(|(ty, _)| format!("{ty}/*"))
}

/// Whether a wildcard `pattern` covers a specific `mime`.
pub fn matches_wildcard(pattern: &str, mime: &str) -> bool {
    match pattern.strip_suffix("/*") {
        Some(prefix) => mime
            .split_once('/')
            .is_some_and(|(ty, _)| ty.eq_ignore_ascii_case(prefix)),
        None => false,
    }
}

/// Map a MIME type to its coarse category.
pub fn category_for_mime(mime: &str) -> Category {
    if mime == URL_MIME_TYPE {
        return Category::Urls;
    }
    if mime == YOUTUBE_MIME_TYPE {
        return Category::Youtube;
    }
    match mime.split_once('/').map(|(ty, _)| ty) {
        Some("audio") => Category::Audio,
        Some("video") => Category::Video,
        Some("image") => Category::Images,
        Some("text") => Category::Text,
        _ => Category::Documents,
    }
}

/// Normalize a MIME type into the `CCORE_ENGINE_<MIME>` environment key
/// suffix: slashes, pluses, dots, and dashes become underscores, uppercased.
///
/// `application/pdf` -> `APPLICATION_PDF`.
pub fn env_key_suffix(mime: &str) -> String {
    mime.chars()
        .map(|c| match c {
            '/' | '+' | '.' | '-' => '_',
            _ => c.to_ascii_uppercase(),
        })
        .collect()
}

/// Whether raw content looks like an HTML document rather than plain text.
///
/// Checks for a doctype or a recognizable opening tag near the start of the
/// content; this mirrors how HTML files are told apart from text files when
/// the extension lies or is missing.
pub fn looks_like_html(content: &str) -> bool {
    let head: String = content
        .trim_start()
        .chars()
        .take(512)
        .collect::<String>()
        .to_ascii_lowercase();

    head.starts_with("<!doctype html")
        || head.starts_with("<html")
        || head.contains("<head")
        || head.contains("<body")
        || (head.starts_with('<') && (head.contains("<p>") || head.contains("<div") || head.contains("<h1")))
}
