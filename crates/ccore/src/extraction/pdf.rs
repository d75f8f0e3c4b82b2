//! PDF text extraction.
//!
//! Byte-level extraction via `lopdf`: fast, no rasterization. Extracted text
//! goes through ligature normalization and whitespace-preserving assembly;
//! aligned columns are heuristically converted to Markdown tables. Pages
//! whose decoded text is dominated by undecodable placeholders (common in
//! formula-heavy scans) are flagged in the result so callers can route them
//! to an OCR pass.

use crate::{CcoreError, Result};
use lopdf::Document;

/// Placeholder density above which a page is considered formula-heavy and
/// flagged for OCR.
const FORMULA_PLACEHOLDER_THRESHOLD: usize = 10;

/// Outcome of a byte-level PDF extraction.
#[derive(Debug, Clone)]
pub struct PdfExtraction {
    pub text: String,
    pub page_count: usize,
    /// Total undecoded-glyph placeholders across the document.
    pub formula_placeholders: usize,
    /// Pages whose placeholder count exceeded the threshold.
    pub ocr_recommended_pages: Vec<u32>,
}

/// Extract text from a PDF byte buffer, page by page.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<PdfExtraction> {
    let doc = Document::load_mem(bytes)
        .map_err(|e| CcoreError::parse_with_source("Failed to load PDF document", e))?;

    if doc.is_encrypted() {
        return Err(CcoreError::unsupported("PDF is encrypted"));
    }

    let pages = doc.get_pages();
    let page_count = pages.len();
    let mut parts: Vec<String> = Vec::with_capacity(page_count);
    let mut formula_placeholders = 0usize;
    let mut ocr_recommended_pages = Vec::new();

    for page_number in pages.keys() {
        let raw = doc
            .extract_text(&[*page_number])
            .map_err(|e| CcoreError::parse_with_source(format!("Failed to extract page {page_number}"), e))?;

        let normalized = normalize_ligatures(&raw);
        let placeholders = count_placeholders(&normalized);
        formula_placeholders += placeholders;
        if placeholders > FORMULA_PLACEHOLDER_THRESHOLD {
            ocr_recommended_pages.push(*page_number);
        }

        parts.push(convert_aligned_tables(normalized.trim_end()));
    }

    Ok(PdfExtraction {
        text: parts.join("\n\n"),
        page_count,
        formula_placeholders,
        ocr_recommended_pages,
    })
}

/// Replace typographic ligatures with their ASCII expansions.
pub fn normalize_ligatures(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\u{FB00}' => out.push_str("ff"),
            '\u{FB01}' => out.push_str("fi"),
            '\u{FB02}' => out.push_str("fl"),
            '\u{FB03}' => out.push_str("ffi"),
            '\u{FB04}' => out.push_str("ffl"),
            '\u{FB05}' | '\u{FB06}' => out.push_str("st"),
            _ => out.push(c),
        }
    }
    out
}

/// Count undecoded-glyph placeholders: replacement characters plus raw
/// `(cid:NN)` escapes left behind by fonts without a usable ToUnicode map.
pub fn count_placeholders(text: &str) -> usize {
    let replacement = text.matches('\u{FFFD}').count();
    let cid = text.matches("(cid:").count();
    replacement + cid
}

/// Convert runs of column-aligned lines into Markdown pipe tables.
///
/// A line is table-like when it contains two or more cell gaps (runs of two
/// or more spaces). Three consecutive table-like lines with a consistent
/// column count become a table; anything else passes through untouched.
pub fn convert_aligned_tables(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut i = 0;

    while i < lines.len() {
        let columns = split_columns(lines[i]);
        if columns.len() >= 2 {
            let mut block = vec![columns];
            let mut j = i + 1;
            while j < lines.len() {
                let next = split_columns(lines[j]);
                if next.len() == block[0].len() {
                    block.push(next);
                    j += 1;
                } else {
                    break;
                }
            }

            if block.len() >= 3 {
                let width = block[0].len();
                out.push(format!("| {} |", block[0].join(" | ")));
                out.push(format!("|{}", " --- |".repeat(width)));
                for row in &block[1..] {
                    out.push(format!("| {} |", row.join(" | ")));
                }
                i = j;
                continue;
            }
        }

        out.push(lines[i].to_string());
        i += 1;
    }

    out.join("\n")
}

fn split_columns(line: &str) -> Vec<String> {
    line.trim()
        .split("  ")
        .map(str::trim)
        .filter(|cell| !cell.is_empty())
        .map(str::to_string)
        .collect()
}

/// Reshape plain extracted text into structured Markdown.
///
/// Short standalone lines in all-caps or with no terminal punctuation become
/// headings; bullet glyphs become list markers; paragraphs are joined by
/// blank lines. This is the `pdf-markdown` engine's output path.
pub fn text_to_markdown(text: &str) -> String {
    let mut out: Vec<String> = Vec::new();

    for block in text.split("\n\n") {
        let trimmed = block.trim();
        if trimmed.is_empty() {
            continue;
        }

        let lines: Vec<&str> = trimmed.lines().map(str::trim_end).collect();
        if lines.len() == 1 && looks_like_heading(lines[0]) {
            out.push(format!("## {}", lines[0].trim()));
            continue;
        }

        let mut paragraph: Vec<String> = Vec::new();
        for line in lines {
            let line = line.trim_start();
            if let Some(rest) = line
                .strip_prefix("\u{2022} ")
                .or_else(|| line.strip_prefix("\u{25CF} "))
                .or_else(|| line.strip_prefix("* "))
            {
                paragraph.push(format!("- {rest}"));
            } else {
                paragraph.push(line.to_string());
            }
        }
        out.push(paragraph.join("\n"));
    }

    out.join("\n\n")
}

fn looks_like_heading(line: &str) -> bool {
    let line = line.trim();
    if line.is_empty() || line.len() > 80 || line.starts_with('|') || line.starts_with('-') {
        return false;
    }
    if line.ends_with('.') || line.ends_with(',') || line.ends_with(';') || line.ends_with(':') {
        return false;
    }
    let letters: Vec<char> = line.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.is_empty() {
        return false;
    }
    let upper = letters.iter().filter(|c| c.is_uppercase()).count();
    // All-caps lines, or short lines where most words are capitalized.
    upper == letters.len() || (line.len() < 48 && starts_title_case(line))
}

fn starts_title_case(line: &str) -> bool {
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.len() > 8 {
        return false;
    }
    let capitalized = words
        .iter()
        .filter(|w| w.chars().next().is_some_and(|c| c.is_uppercase()))
        .count();
    capitalized * 2 > words.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_pdf_is_parse_error() {
        let result = extract_pdf_text(b"definitely not a pdf");
        assert!(matches!(result, Err(CcoreError::Parse { .. })));
    }

    #[test]
    fn test_normalize_ligatures() {
        assert_eq!(normalize_ligatures("e\u{FB03}cient \u{FB01}le"), "efficient file");
        assert_eq!(normalize_ligatures("plain"), "plain");
    }

    #[test]
    fn test_count_placeholders() {
        assert_eq!(count_placeholders("clean text"), 0);
        assert_eq!(count_placeholders("x \u{FFFD}\u{FFFD} (cid:42)"), 3);
    }

    #[test]
    fn test_convert_aligned_tables() {
        let text = "Name  Qty  Price\nApples  3  1.20\nPears  5  2.40";
        let converted = convert_aligned_tables(text);
        assert!(converted.contains("| Name | Qty | Price |"));
        assert!(converted.contains("| --- | --- | --- |"));
        assert!(converted.contains("| Pears | 5 | 2.40 |"));
    }

    #[test]
    fn test_short_column_runs_pass_through() {
        let text = "Name  Qty\njust prose afterwards";
        assert_eq!(convert_aligned_tables(text), text);
    }

    #[test]
    fn test_text_to_markdown_headings_and_bullets() {
        let text = "INTRODUCTION\n\nThis is the body of the section.\n\n\u{2022} first point\n\u{2022} second point";
        let markdown = text_to_markdown(text);
        assert!(markdown.contains("## INTRODUCTION"));
        assert!(markdown.contains("- first point"));
        assert!(markdown.contains("- second point"));
        assert!(markdown.contains("This is the body of the section."));
    }

    #[test]
    fn test_text_to_markdown_leaves_sentences_alone() {
        let text = "A normal sentence that ends with a period.";
        assert_eq!(text_to_markdown(text), text);
    }
}
