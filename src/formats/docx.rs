//! Word (.docx) document parser.
//!
//! Reads `word/document.xml` paragraph by paragraph and folds the paragraphs
//! into typed sections. Level-1 headings and paragraphs that read like a
//! section title (`Chapter 3`, `Prologue`, ...) open a new section; level-2
//! and level-3 headings become `<h2>`/`<h3>`; everything else becomes a `<p>`
//! with bold and italic runs marked up.

use super::detector::{classify_type, is_chapter_header};
use crate::error::{AppError, Result};
use crate::manuscript::{Section, SectionType};
use roxmltree::{Document, Node};
use std::collections::HashMap;
use std::io::{Cursor, Read};
use zip::ZipArchive;

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// Title of the section collecting content before the first heading.
const LEADING_TITLE: &str = "Imported Content";

/// A formatted run of text.
#[derive(Debug, Clone, Default)]
struct Run {
    text: String,
    bold: bool,
    italic: bool,
}

/// A body paragraph with its resolved style name.
#[derive(Debug, Clone)]
struct Paragraph {
    /// Lowercased style name with spaces removed, e.g. `heading1`.
    style: String,
    runs: Vec<Run>,
}

impl Paragraph {
    fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

/// Parse a .docx file into sections.
///
/// Always returns at least one section; a document without usable content
/// yields a single "Chapter 1" placeholder.
pub fn parse_docx(bytes: &[u8]) -> Result<Vec<Section>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| AppError::Parse(format!("not a Word document: {}", e)))?;

    let document_xml = read_entry(&mut archive, "word/document.xml")?
        .ok_or_else(|| AppError::Parse("missing word/document.xml".to_string()))?;

    let style_names = match read_entry(&mut archive, "word/styles.xml")? {
        Some(xml) => parse_style_names(&xml)?,
        None => HashMap::new(),
    };

    let paragraphs = parse_paragraphs(&document_xml, &style_names)?;
    Ok(fold_sections(&paragraphs))
}

fn read_entry(archive: &mut ZipArchive<Cursor<&[u8]>>, name: &str) -> Result<Option<String>> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(AppError::Parse(format!("{}: {}", name, e))),
    };

    let mut content = String::new();
    entry
        .read_to_string(&mut content)
        .map_err(|e| AppError::Parse(format!("{}: {}", name, e)))?;
    Ok(Some(content))
}

/// Map style ids to display names from `word/styles.xml`.
fn parse_style_names(xml: &str) -> Result<HashMap<String, String>> {
    let doc = Document::parse(xml).map_err(|e| AppError::Parse(format!("styles.xml: {}", e)))?;

    let mut names = HashMap::new();
    for style in doc.descendants().filter(|n| n.has_tag_name((W_NS, "style"))) {
        let Some(id) = style.attribute((W_NS, "styleId")) else {
            continue;
        };
        if let Some(name) = child(style, "name").and_then(|n| n.attribute((W_NS, "val"))) {
            names.insert(id.to_string(), name.to_string());
        }
    }
    Ok(names)
}

fn parse_paragraphs(xml: &str, style_names: &HashMap<String, String>) -> Result<Vec<Paragraph>> {
    let doc =
        Document::parse(xml).map_err(|e| AppError::Parse(format!("document.xml: {}", e)))?;

    let body = doc
        .descendants()
        .find(|n| n.has_tag_name((W_NS, "body")))
        .ok_or_else(|| AppError::Parse("document has no body".to_string()))?;

    let paragraphs = body
        .children()
        .filter(|n| n.has_tag_name((W_NS, "p")))
        .map(|p| {
            let style_id = child(p, "pPr")
                .and_then(|ppr| child(ppr, "pStyle"))
                .and_then(|s| s.attribute((W_NS, "val")));
            let style = style_id
                .map(|id| style_names.get(id).map(String::as_str).unwrap_or(id))
                .unwrap_or("Normal");

            Paragraph {
                style: style.to_lowercase().replace(' ', ""),
                runs: paragraph_runs(p),
            }
        })
        .collect();

    Ok(paragraphs)
}

/// Runs directly under the paragraph or inside hyperlinks.
fn paragraph_runs(paragraph: Node<'_, '_>) -> Vec<Run> {
    let mut runs = Vec::new();
    for node in paragraph.children() {
        if node.has_tag_name((W_NS, "r")) {
            runs.push(read_run(node));
        } else if node.has_tag_name((W_NS, "hyperlink")) {
            runs.extend(
                node.children()
                    .filter(|n| n.has_tag_name((W_NS, "r")))
                    .map(read_run),
            );
        }
    }
    runs
}

fn read_run(run: Node<'_, '_>) -> Run {
    let mut text = String::new();
    for node in run.children().filter(|n| n.is_element()) {
        match node.tag_name().name() {
            "t" => text.push_str(node.text().unwrap_or_default()),
            "tab" => text.push('\t'),
            "br" | "cr" => text.push('\n'),
            _ => {}
        }
    }

    let props = child(run, "rPr");
    Run {
        text,
        bold: props.is_some_and(|p| toggle_set(p, "b")),
        italic: props.is_some_and(|p| toggle_set(p, "i")),
    }
}

/// Whether a run property toggle such as `<w:b/>` is present and not switched off.
fn toggle_set(props: Node<'_, '_>, name: &str) -> bool {
    match child(props, name) {
        Some(toggle) => !matches!(
            toggle.attribute((W_NS, "val")),
            Some("0") | Some("false") | Some("off")
        ),
        None => false,
    }
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.has_tag_name((W_NS, name)))
}

fn fold_sections(paragraphs: &[Paragraph]) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut current = Section::new(LEADING_TITLE, SectionType::Chapter, "");

    for paragraph in paragraphs {
        let full_text = paragraph.text();
        let text = full_text.trim();

        if text.is_empty() {
            current.content.push_str("<p><br/></p>");
            continue;
        }

        if paragraph.style.contains("heading1") || is_chapter_header(text) {
            let next = Section::new(text, classify_type(text), "");
            let finished = std::mem::replace(&mut current, next);
            if !finished.content.trim().is_empty() {
                sections.push(finished);
            }
        } else if paragraph.style.contains("heading2") {
            current.content.push_str(&format!("<h2>{}</h2>", text));
        } else if paragraph.style.contains("heading3") {
            current.content.push_str(&format!("<h3>{}</h3>", text));
        } else {
            let formatted = format_runs(text, &paragraph.runs);
            current.content.push_str(&format!("<p>{}</p>", formatted));
        }
    }

    if !current.content.trim().is_empty() {
        sections.push(current);
    }

    if sections.is_empty() {
        sections.push(Section::new(
            "Chapter 1",
            SectionType::Chapter,
            "<p>No content found</p>",
        ));
    }

    sections
}

/// Wrap bold and italic runs in the paragraph text.
///
/// Every occurrence of a formatted run's text is wrapped, so a bold word that
/// also appears unformatted elsewhere in the paragraph is wrapped twice over,
/// and a run that is both bold and italic nests `<em>` inside `<strong>`.
fn format_runs(text: &str, runs: &[Run]) -> String {
    let mut formatted = text.to_string();
    for run in runs.iter().filter(|r| !r.text.is_empty()) {
        if run.bold {
            formatted = formatted.replace(&run.text, &format!("<strong>{}</strong>", run.text));
        }
        if run.italic {
            formatted = formatted.replace(&run.text, &format!("<em>{}</em>", run.text));
        }
    }
    formatted
}

/// Builders for small .docx fixtures.
#[cfg(test)]
pub(crate) mod fixtures {
    use std::io::{Cursor, Write};
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    /// One run: text, bold, italic.
    pub type RunSpec<'a> = (&'a str, bool, bool);

    /// A paragraph with an optional style id.
    pub struct ParaSpec<'a> {
        pub style: Option<&'a str>,
        pub runs: Vec<RunSpec<'a>>,
    }

    pub fn heading<'a>(level: u8, text: &'a str) -> ParaSpec<'a> {
        let style = match level {
            1 => "Heading1",
            2 => "Heading2",
            _ => "Heading3",
        };
        ParaSpec {
            style: Some(style),
            runs: vec![(text, false, false)],
        }
    }

    pub fn para(text: &str) -> ParaSpec<'_> {
        ParaSpec {
            style: None,
            runs: vec![(text, false, false)],
        }
    }

    pub fn runs<'a>(runs: Vec<RunSpec<'a>>) -> ParaSpec<'a> {
        ParaSpec { style: None, runs }
    }

    fn escape(s: &str) -> String {
        s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
    }

    pub fn document_xml(paragraphs: &[ParaSpec<'_>]) -> String {
        let mut body = String::new();
        for p in paragraphs {
            body.push_str("<w:p>");
            if let Some(style) = p.style {
                body.push_str(&format!("<w:pPr><w:pStyle w:val=\"{}\"/></w:pPr>", style));
            }
            for (text, bold, italic) in &p.runs {
                body.push_str("<w:r>");
                if *bold || *italic {
                    body.push_str("<w:rPr>");
                    if *bold {
                        body.push_str("<w:b/>");
                    }
                    if *italic {
                        body.push_str("<w:i/>");
                    }
                    body.push_str("</w:rPr>");
                }
                body.push_str(&format!(
                    "<w:t xml:space=\"preserve\">{}</w:t></w:r>",
                    escape(text)
                ));
            }
            body.push_str("</w:p>");
        }

        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
             <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
             <w:body>{}</w:body></w:document>",
            body
        )
    }

    /// Package a document body (and optional styles part) as a .docx.
    pub fn package(document_xml: &str, styles_xml: Option<&str>) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();

        zip.start_file("[Content_Types].xml", options).unwrap();
        zip.write_all(
            b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
              <Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
              <Default Extension=\"xml\" ContentType=\"application/xml\"/>\
              <Override PartName=\"/word/document.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml\"/>\
              </Types>",
        )
        .unwrap();
        zip.start_file("word/document.xml", options).unwrap();
        zip.write_all(document_xml.as_bytes()).unwrap();
        if let Some(styles) = styles_xml {
            zip.start_file("word/styles.xml", options).unwrap();
            zip.write_all(styles.as_bytes()).unwrap();
        }

        zip.finish().unwrap().into_inner()
    }

    pub fn build(paragraphs: &[ParaSpec<'_>]) -> Vec<u8> {
        package(&document_xml(paragraphs), None)
    }
}
