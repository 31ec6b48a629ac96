//! Word (.docx) writer.
//!
//! Chapter HTML is translated back into structural paragraphs: `<h2>` and
//! `<h3>` become headings, paragraphs become plain paragraphs, and inline
//! formatting is dropped.

use super::Exporter;
use crate::db::{Book, Chapter};
use crate::error::Result;
use crate::formats::markup::{collapse_whitespace, decode_entities};
use crate::formats::patterns::{EMPHASIS_RE, H2_RE, H3_RE, PARAGRAPH_RE, TAG_RE};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::io::{Cursor, Write};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  <Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
  <Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/>
</Types>"#;

const ROOT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
</Relationships>"#;

const DOCUMENT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>"#;

const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/></w:style>
  <w:style w:type="paragraph" w:styleId="Title"><w:name w:val="Title"/><w:basedOn w:val="Normal"/><w:rPr><w:b/><w:sz w:val="56"/></w:rPr></w:style>
  <w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:basedOn w:val="Normal"/><w:rPr><w:b/><w:sz w:val="32"/></w:rPr></w:style>
  <w:style w:type="paragraph" w:styleId="Heading2"><w:name w:val="heading 2"/><w:basedOn w:val="Normal"/><w:rPr><w:b/><w:sz w:val="26"/></w:rPr></w:style>
  <w:style w:type="paragraph" w:styleId="Heading3"><w:name w:val="heading 3"/><w:basedOn w:val="Normal"/><w:rPr><w:b/><w:sz w:val="24"/></w:rPr></w:style>
</w:styles>"#;

/// Structural element recovered from chapter HTML.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Block {
    Heading(u8, String),
    Paragraph(String),
}

/// Word document with a title page and one heading per chapter.
pub struct DocxExporter;

impl Exporter for DocxExporter {
    fn export(&self, book: &Book, chapters: &[Chapter]) -> Result<Vec<u8>> {
        let document = document_xml(book, chapters);

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();

        zip.start_file("[Content_Types].xml", options)?;
        zip.write_all(CONTENT_TYPES_XML.as_bytes())?;
        zip.start_file("_rels/.rels", options)?;
        zip.write_all(ROOT_RELS_XML.as_bytes())?;
        zip.start_file("word/_rels/document.xml.rels", options)?;
        zip.write_all(DOCUMENT_RELS_XML.as_bytes())?;
        zip.start_file("word/styles.xml", options)?;
        zip.write_all(STYLES_XML.as_bytes())?;
        zip.start_file("word/document.xml", options)?;
        zip.write_all(&document)?;

        Ok(zip.finish()?.into_inner())
    }
}

fn document_xml(book: &Book, chapters: &[Chapter]) -> Vec<u8> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let _ = writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))));

    let mut root = BytesStart::new("w:document");
    root.push_attribute((
        "xmlns:w",
        "http://schemas.openxmlformats.org/wordprocessingml/2006/main",
    ));
    let _ = writer.write_event(Event::Start(root));
    let _ = writer.write_event(Event::Start(BytesStart::new("w:body")));

    write_paragraph(&mut writer, Some("Title"), true, &book.title);
    if !book.description.is_empty() {
        write_paragraph(&mut writer, None, true, &book.description);
    }
    write_page_break(&mut writer);

    for chapter in chapters {
        write_paragraph(&mut writer, Some("Heading1"), false, &chapter.title);
        for block in chapter_blocks(&chapter.content) {
            match block {
                Block::Heading(level, text) => {
                    write_paragraph(&mut writer, Some(&format!("Heading{}", level)), false, &text)
                }
                Block::Paragraph(text) => write_paragraph(&mut writer, None, false, &text),
            }
        }
        write_page_break(&mut writer);
    }

    let _ = writer.write_event(Event::End(BytesEnd::new("w:body")));
    let _ = writer.write_event(Event::End(BytesEnd::new("w:document")));
    writer.into_inner().into_inner()
}

/// Translate chapter HTML into headings and paragraphs.
///
/// Whitespace is collapsed before the tag translation so that the only line
/// breaks left are the ones the translation inserts.
fn chapter_blocks(content: &str) -> Vec<Block> {
    let text = collapse_whitespace(content);
    let text = H2_RE.replace_all(&text, "\n## $1\n");
    let text = H3_RE.replace_all(&text, "\n### $1\n");
    let text = EMPHASIS_RE.replace_all(&text, "");
    let text = PARAGRAPH_RE.replace_all(&text, "$1\n");
    let text = TAG_RE.replace_all(&text, "");

    text.split('\n')
        .map(|line| decode_entities(line.trim()))
        .filter(|line| !line.is_empty())
        .map(|line| {
            if let Some(heading) = line.strip_prefix("### ") {
                Block::Heading(3, heading.to_string())
            } else if let Some(heading) = line.strip_prefix("## ") {
                Block::Heading(2, heading.to_string())
            } else {
                Block::Paragraph(line)
            }
        })
        .collect()
}

fn write_paragraph<W: Write>(writer: &mut Writer<W>, style: Option<&str>, centered: bool, text: &str) {
    let _ = writer.write_event(Event::Start(BytesStart::new("w:p")));

    if style.is_some() || centered {
        let _ = writer.write_event(Event::Start(BytesStart::new("w:pPr")));
        if let Some(style) = style {
            let mut elem = BytesStart::new("w:pStyle");
            elem.push_attribute(("w:val", style));
            let _ = writer.write_event(Event::Empty(elem));
        }
        if centered {
            let mut elem = BytesStart::new("w:jc");
            elem.push_attribute(("w:val", "center"));
            let _ = writer.write_event(Event::Empty(elem));
        }
        let _ = writer.write_event(Event::End(BytesEnd::new("w:pPr")));
    }

    let _ = writer.write_event(Event::Start(BytesStart::new("w:r")));
    let mut t = BytesStart::new("w:t");
    t.push_attribute(("xml:space", "preserve"));
    let _ = writer.write_event(Event::Start(t));
    let _ = writer.write_event(Event::Text(BytesText::new(text)));
    let _ = writer.write_event(Event::End(BytesEnd::new("w:t")));
    let _ = writer.write_event(Event::End(BytesEnd::new("w:r")));

    let _ = writer.write_event(Event::End(BytesEnd::new("w:p")));
}

fn write_page_break<W: Write>(writer: &mut Writer<W>) {
    let _ = writer.write_event(Event::Start(BytesStart::new("w:p")));
    let _ = writer.write_event(Event::Start(BytesStart::new("w:r")));
    let mut br = BytesStart::new("w:br");
    br.push_attribute(("w:type", "page"));
    let _ = writer.write_event(Event::Empty(br));
    let _ = writer.write_event(Event::End(BytesEnd::new("w:r")));
    let _ = writer.write_event(Event::End(BytesEnd::new("w:p")));
}
