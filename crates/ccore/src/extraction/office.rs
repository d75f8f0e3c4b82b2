//! Office document extraction.
//!
//! DOCX, PPTX, and ODT are ZIP containers with XML payloads; they are
//! walked with `quick-xml` into markdown-like text that preserves headings,
//! lists, bold/italic runs, and tables. Spreadsheets (XLSX/ODS) go through
//! `calamine` and come out as one Markdown pipe table per sheet.

use crate::{CcoreError, Result};
use quick_xml::Reader;
use quick_xml::events::Event;
use std::io::{Cursor, Read};

/// Read one entry from a ZIP container, if present.
fn read_zip_entry(bytes: &[u8], name: &str) -> Result<Option<String>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| CcoreError::parse(format!("Failed to open document as ZIP: {e}")))?;

    match archive.by_name(name) {
        Ok(mut file) => {
            let mut content = String::new();
            file.read_to_string(&mut content)
                .map_err(|e| CcoreError::parse(format!("Failed to read {name}: {e}")))?;
            Ok(Some(content))
        }
        Err(_) => Ok(None),
    }
}

fn zip_entry_names(bytes: &[u8]) -> Result<Vec<String>> {
    let archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| CcoreError::parse(format!("Failed to open document as ZIP: {e}")))?;
    Ok(archive.file_names().map(String::from).collect())
}

/// Render collected table rows as a Markdown pipe table.
fn render_table(rows: &[Vec<String>]) -> String {
    if rows.is_empty() {
        return String::new();
    }
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    if width == 0 {
        return String::new();
    }

    let mut out = Vec::with_capacity(rows.len() + 1);
    let pad = |row: &[String]| {
        let mut cells: Vec<String> = row.iter().map(|c| c.replace('|', "\\|")).collect();
        cells.resize(width, String::new());
        format!("| {} |", cells.join(" | "))
    };

    out.push(pad(&rows[0]));
    out.push(format!("|{}", " --- |".repeat(width)));
    for row in &rows[1..] {
        out.push(pad(row));
    }
    out.join("\n")
}

/// Shared streaming state for the WordprocessingML and ODF walkers.
#[derive(Default)]
struct DocState {
    blocks: Vec<String>,
    paragraph: String,
    heading_level: usize,
    is_list_item: bool,
    bold: bool,
    italic: bool,
    in_text_run: bool,
    in_table: bool,
    table_rows: Vec<Vec<String>>,
    row: Vec<String>,
    cell: String,
}

impl DocState {
    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let styled = match (self.bold, self.italic) {
            (true, true) => format!("***{text}***"),
            (true, false) => format!("**{text}**"),
            (false, true) => format!("*{text}*"),
            (false, false) => text.to_string(),
        };
        self.paragraph.push_str(&styled);
    }

    fn end_paragraph(&mut self) {
        let text = self.paragraph.trim().to_string();
        self.paragraph.clear();

        if text.is_empty() {
            self.heading_level = 0;
            self.is_list_item = false;
            return;
        }

        if self.in_table {
            if !self.cell.is_empty() {
                self.cell.push(' ');
            }
            self.cell.push_str(&text);
        } else if self.heading_level > 0 {
            let level = self.heading_level.min(6);
            self.blocks.push(format!("{} {}", "#".repeat(level), text));
        } else if self.is_list_item {
            self.blocks.push(format!("- {text}"));
        } else {
            self.blocks.push(text);
        }

        self.heading_level = 0;
        self.is_list_item = false;
    }

    fn end_cell(&mut self) {
        self.row.push(std::mem::take(&mut self.cell).trim().to_string());
    }

    fn end_row(&mut self) {
        self.table_rows.push(std::mem::take(&mut self.row));
    }

    fn end_table(&mut self) {
        let table = render_table(&self.table_rows);
        if !table.is_empty() {
            self.blocks.push(table);
        }
        self.table_rows.clear();
        self.in_table = false;
    }

    fn finish(mut self) -> String {
        // Consecutive list items form one block.
        let mut merged: Vec<String> = Vec::with_capacity(self.blocks.len());
        for block in self.blocks.drain(..) {
            if block.starts_with("- ")
                && let Some(last) = merged.last_mut()
                && last.starts_with("- ")
            {
                last.push('\n');
                last.push_str(&block);
                continue;
            }
            merged.push(block);
        }
        merged.join("\n\n")
    }
}

fn attribute_value(e: &quick_xml::events::BytesStart<'_>, name: &str) -> Option<String> {
    e.try_get_attribute(name)
        .ok()
        .flatten()
        .map(|attr| String::from_utf8_lossy(&attr.value).into_owned())
}

/// Extract a DOCX document into markdown-like text.
pub fn extract_docx(bytes: &[u8]) -> Result<String> {
    let xml = read_zip_entry(bytes, "word/document.xml")?
        .ok_or_else(|| CcoreError::parse("DOCX is missing word/document.xml"))?;
    parse_wordprocessing_xml(&xml)
}

fn parse_wordprocessing_xml(xml: &str) -> Result<String> {
    let mut reader = Reader::from_reader(xml.as_bytes());
    reader.config_mut().trim_text(false);
    reader.config_mut().check_end_names = false;

    let mut state = DocState::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let name = e.name().as_ref().to_vec();
                match name.as_slice() {
                    b"w:tbl" => {
                        state.in_table = true;
                        state.table_rows.clear();
                    }
                    b"w:tr" => state.row.clear(),
                    b"w:tc" => state.cell.clear(),
                    b"w:r" => {
                        state.bold = false;
                        state.italic = false;
                    }
                    b"w:pStyle" => {
                        if let Some(style) = attribute_value(&e, "w:val")
                            && let Some(level) = style.strip_prefix("Heading")
                        {
                            state.heading_level = level.parse().unwrap_or(0);
                        }
                    }
                    b"w:numPr" => state.is_list_item = true,
                    b"w:b" => state.bold = !attribute_value(&e, "w:val").is_some_and(|v| v == "0" || v == "false"),
                    b"w:i" => state.italic = !attribute_value(&e, "w:val").is_some_and(|v| v == "0" || v == "false"),
                    b"w:t" => state.in_text_run = true,
                    b"w:tab" => state.paragraph.push('\t'),
                    b"w:br" => state.paragraph.push('\n'),
                    _ => {}
                }
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:p" => state.end_paragraph(),
                b"w:t" => state.in_text_run = false,
                b"w:tc" => state.end_cell(),
                b"w:tr" => state.end_row(),
                b"w:tbl" => state.end_table(),
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if state.in_text_run {
                    let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                    state.push_text(&text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(CcoreError::parse(format!(
                    "DOCX parsing error at position {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(state.finish())
}

/// Extract a PPTX presentation into markdown-like text, slide by slide.
pub fn extract_pptx(bytes: &[u8]) -> Result<String> {
    let mut slide_names: Vec<String> = zip_entry_names(bytes)?
        .into_iter()
        .filter(|name| name.starts_with("ppt/slides/slide") && name.ends_with(".xml"))
        .collect();
    slide_names.sort_by_key(|name| slide_number(name));

    if slide_names.is_empty() {
        return Err(CcoreError::parse("PPTX contains no slides"));
    }

    let mut sections = Vec::with_capacity(slide_names.len());
    for (index, name) in slide_names.iter().enumerate() {
        let Some(xml) = read_zip_entry(bytes, name)? else {
            continue;
        };
        let body = parse_drawingml_text(&xml)?;
        let mut section = format!("## Slide {}", index + 1);
        if !body.is_empty() {
            section.push_str("\n\n");
            section.push_str(&body);
        }
        sections.push(section);
    }

    Ok(sections.join("\n\n"))
}

fn slide_number(name: &str) -> u32 {
    name.trim_start_matches("ppt/slides/slide")
        .trim_end_matches(".xml")
        .parse()
        .unwrap_or(u32::MAX)
}

fn parse_drawingml_text(xml: &str) -> Result<String> {
    let mut reader = Reader::from_reader(xml.as_bytes());
    reader.config_mut().trim_text(false);
    reader.config_mut().check_end_names = false;

    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"a:t" => in_text = true,
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"a:t" => in_text = false,
                b"a:p" => {
                    let text = current.trim().to_string();
                    if !text.is_empty() {
                        paragraphs.push(text);
                    }
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_text {
                    current.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(CcoreError::parse(format!(
                    "PPTX parsing error at position {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(paragraphs.join("\n\n"))
}

/// Extract an ODT document into markdown-like text.
pub fn extract_odt(bytes: &[u8]) -> Result<String> {
    let xml = read_zip_entry(bytes, "content.xml")?
        .ok_or_else(|| CcoreError::parse("ODT is missing content.xml"))?;
    parse_odf_xml(&xml)
}

fn parse_odf_xml(xml: &str) -> Result<String> {
    let mut reader = Reader::from_reader(xml.as_bytes());
    reader.config_mut().trim_text(false);
    reader.config_mut().check_end_names = false;

    let mut state = DocState::default();
    // ODF wraps paragraph text directly; track nesting of text containers.
    let mut text_depth = 0usize;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = e.name().as_ref().to_vec();
                match name.as_slice() {
                    b"table:table" => {
                        state.in_table = true;
                        state.table_rows.clear();
                    }
                    b"table:table-row" => state.row.clear(),
                    b"table:table-cell" => state.cell.clear(),
                    b"text:h" => {
                        state.heading_level = attribute_value(&e, "text:outline-level")
                            .and_then(|v| v.parse().ok())
                            .unwrap_or(1);
                        text_depth += 1;
                    }
                    b"text:p" => text_depth += 1,
                    b"text:list-item" => state.is_list_item = true,
                    b"text:span" => {}
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"text:tab" => state.paragraph.push('\t'),
                b"text:line-break" => state.paragraph.push('\n'),
                b"text:s" => state.paragraph.push(' '),
                _ => {}
            },
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"text:h" | b"text:p" => {
                    text_depth = text_depth.saturating_sub(1);
                    state.end_paragraph();
                }
                b"table:table-cell" => state.end_cell(),
                b"table:table-row" => state.end_row(),
                b"table:table" => state.end_table(),
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if text_depth > 0 {
                    let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                    state.push_text(&text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(CcoreError::parse(format!(
                    "ODT parsing error at position {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(state.finish())
}

/// Extract a spreadsheet (XLSX or ODS) into Markdown, one pipe table per
/// sheet.
pub fn extract_spreadsheet(bytes: &[u8], mime_type: &str) -> Result<String> {
    use calamine::Reader as _;

    let cursor = Cursor::new(bytes.to_vec());

    if mime_type == crate::core::mime::ODS_MIME_TYPE {
        let mut workbook = calamine::Ods::new(cursor)
            .map_err(|e| CcoreError::parse(format!("Failed to open ODS: {e}")))?;
        return render_workbook_sheets(&mut workbook);
    }

    let mut workbook = calamine::Xlsx::new(cursor)
        .map_err(|e| CcoreError::parse(format!("Failed to open XLSX: {e}")))?;
    render_workbook_sheets(&mut workbook)
}

fn render_workbook_sheets<R>(workbook: &mut R) -> Result<String>
where
    R: calamine::Reader<Cursor<Vec<u8>>>,
{
    let sheet_names = workbook.sheet_names();
    let mut sections = Vec::with_capacity(sheet_names.len());

    for name in &sheet_names {
        let Ok(range) = workbook.worksheet_range(name) else {
            continue;
        };

        let rows: Vec<Vec<String>> = range
            .rows()
            .map(|row| row.iter().map(format_cell).collect())
            .filter(|row: &Vec<String>| row.iter().any(|cell| !cell.is_empty()))
            .collect();

        if rows.is_empty() {
            continue;
        }

        sections.push(format!("## {}\n\n{}", name, render_table(&rows)));
    }

    if sections.is_empty() {
        return Err(CcoreError::parse("Spreadsheet contains no data"));
    }

    Ok(sections.join("\n\n"))
}

fn format_cell(data: &calamine::Data) -> String {
    match data {
        calamine::Data::Empty => String::new(),
        calamine::Data::String(s) => s.replace('|', "\\|"),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::{FileOptions, ZipWriter};

    fn zip_with(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut writer = ZipWriter::new(&mut buffer);
            for (name, content) in entries {
                let options = FileOptions::<'_, ()>::default();
                writer.start_file(*name, options).unwrap();
                writer.write_all(content.as_bytes()).unwrap();
            }
            writer.finish().unwrap();
        }
        buffer.into_inner()
    }

    #[test]
    fn test_extract_docx_paragraphs_and_headings() {
        let document = r#"<?xml version="1.0"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p>
      <w:pPr><w:pStyle w:val="Heading1"/></w:pPr>
      <w:r><w:t>Quarterly Report</w:t></w:r>
    </w:p>
    <w:p>
      <w:r><w:t>Revenue was </w:t></w:r>
      <w:r><w:rPr><w:b/></w:rPr><w:t>strong</w:t></w:r>
      <w:r><w:t> this quarter.</w:t></w:r>
    </w:p>
    <w:p>
      <w:pPr><w:numPr><w:ilvl w:val="0"/></w:numPr></w:pPr>
      <w:r><w:t>first item</w:t></w:r>
    </w:p>
  </w:body>
</w:document>"#;
        let bytes = zip_with(&[("word/document.xml", document)]);

        let markdown = extract_docx(&bytes).unwrap();
        assert!(markdown.contains("# Quarterly Report"));
        assert!(markdown.contains("Revenue was **strong** this quarter."));
        assert!(markdown.contains("- first item"));
    }

    #[test]
    fn test_extract_docx_table() {
        let document = r#"<?xml version="1.0"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:tbl>
      <w:tr>
        <w:tc><w:p><w:r><w:t>Name</w:t></w:r></w:p></w:tc>
        <w:tc><w:p><w:r><w:t>Qty</w:t></w:r></w:p></w:tc>
      </w:tr>
      <w:tr>
        <w:tc><w:p><w:r><w:t>Apples</w:t></w:r></w:p></w:tc>
        <w:tc><w:p><w:r><w:t>3</w:t></w:r></w:p></w:tc>
      </w:tr>
    </w:tbl>
  </w:body>
</w:document>"#;
        let bytes = zip_with(&[("word/document.xml", document)]);

        let markdown = extract_docx(&bytes).unwrap();
        assert!(markdown.contains("| Name | Qty |"));
        assert!(markdown.contains("| --- | --- |"));
        assert!(markdown.contains("| Apples | 3 |"));
    }

    #[test]
    fn test_extract_docx_missing_document_xml() {
        let bytes = zip_with(&[("other.xml", "<x/>")]);
        assert!(matches!(extract_docx(&bytes), Err(CcoreError::Parse { .. })));
    }

    #[test]
    fn test_extract_docx_not_a_zip() {
        assert!(matches!(extract_docx(b"nope"), Err(CcoreError::Parse { .. })));
    }

    #[test]
    fn test_extract_pptx_slides_in_order() {
        let slide = |text: &str| {
            format!(
                r#"<?xml version="1.0"?>
<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main">
  <a:p><a:r><a:t>{text}</a:t></a:r></a:p>
</p:sld>"#
            )
        };
        let s1 = slide("intro");
        let s2 = slide("details");
        let bytes = zip_with(&[
            ("ppt/slides/slide2.xml", s2.as_str()),
            ("ppt/slides/slide1.xml", s1.as_str()),
        ]);

        let markdown = extract_pptx(&bytes).unwrap();
        let intro_pos = markdown.find("intro").unwrap();
        let details_pos = markdown.find("details").unwrap();
        assert!(intro_pos < details_pos);
        assert!(markdown.contains("## Slide 1"));
        assert!(markdown.contains("## Slide 2"));
    }

    #[test]
    fn test_extract_odt_headings_and_text() {
        let content = r#"<?xml version="1.0"?>
<office:document-content xmlns:office="x" xmlns:text="y">
  <office:body>
    <office:text>
      <text:h text:outline-level="2">Background</text:h>
      <text:p>Some body text.</text:p>
    </office:text>
  </office:body>
</office:document-content>"#;
        let bytes = zip_with(&[("content.xml", content)]);

        let markdown = extract_odt(&bytes).unwrap();
        assert!(markdown.contains("## Background"));
        assert!(markdown.contains("Some body text."));
    }

    #[test]
    fn test_render_table_pads_ragged_rows() {
        let rows = vec![
            vec!["a".to_string(), "b".to_string()],
            vec!["only".to_string()],
        ];
        let table = render_table(&rows);
        assert!(table.contains("| a | b |"));
        assert!(table.contains("| only |  |"));
    }

    #[test]
    fn test_extract_spreadsheet_invalid() {
        let result = extract_spreadsheet(b"not a workbook", crate::core::mime::XLSX_MIME_TYPE);
        assert!(result.is_err());
    }
}
