//! Book exporters.
//!
//! Every exporter consumes a book and its chapters in reading order and
//! produces the bytes of one file. The HTTP layer wraps the result in an
//! [`ExportArtifact`].

mod docx;
mod epub;
mod html;
mod pdf;
mod text;

pub use docx::DocxExporter;
pub use epub::EpubExporter;
pub use html::HtmlExporter;
pub use pdf::{PaperSize, PdfExporter};
pub use text::TextExporter;

use crate::config::ExportFormat;
use crate::db::{Book, Chapter};
use crate::error::Result;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

/// Serializes a book into one output format.
pub trait Exporter: Send + Sync {
    /// Render the book. `chapters` must already be sorted by `order`.
    fn export(&self, book: &Book, chapters: &[Chapter]) -> Result<Vec<u8>>;
}

/// Options that only some exporters honour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportOptions {
    /// Add trim and bleed boxes to PDF pages.
    #[serde(default)]
    pub print_ready: bool,
    /// Named paper size for PDF output.
    #[serde(default = "default_paper_size")]
    pub paper_size: String,
    /// Expand PDF pages by the bleed margin on every side.
    #[serde(default)]
    pub include_bleed: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            print_ready: false,
            paper_size: default_paper_size(),
            include_bleed: false,
        }
    }
}

fn default_paper_size() -> String {
    "6x9".to_string()
}

/// Pick the exporter for a format.
pub fn get_exporter(format: ExportFormat, options: &ExportOptions) -> Box<dyn Exporter> {
    match format {
        ExportFormat::Html => Box::new(HtmlExporter),
        ExportFormat::Txt => Box::new(TextExporter::default()),
        ExportFormat::Docx => Box::new(DocxExporter),
        ExportFormat::Pdf => Box::new(PdfExporter::new(
            PaperSize::from_name(&options.paper_size),
            options.include_bleed,
            options.print_ready,
        )),
        ExportFormat::Epub => Box::new(EpubExporter),
    }
}

/// A generated export, ready to be returned to the client.
#[derive(Debug, Clone, Serialize)]
pub struct ExportArtifact {
    /// Format name.
    pub format: String,
    /// Suggested download name.
    pub filename: String,
    /// Base64-encoded file contents.
    pub data: String,
    /// MIME type of the decoded contents.
    pub content_type: String,
}

/// Export a book and package the result.
pub fn export_book(
    format: ExportFormat,
    options: &ExportOptions,
    book: &Book,
    chapters: &[Chapter],
) -> Result<ExportArtifact> {
    let bytes = get_exporter(format, options).export(book, chapters)?;

    Ok(ExportArtifact {
        format: format.extension().to_string(),
        filename: format!("{}.{}", book.title, format.extension()),
        data: BASE64.encode(bytes),
        content_type: format.mime_type().to_string(),
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::db::{Book, Chapter};
    use crate::manuscript::SectionType;

    pub fn book(title: &str, description: &str) -> Book {
        Book {
            id: "book-1".to_string(),
            user_id: "user-1".to_string(),
            title: title.to_string(),
            description: description.to_string(),
            genre: String::new(),
            cover_data: None,
            chapter_count: 0,
            word_count: 0,
            created_at: 0,
            updated_at: 0,
        }
    }

    pub fn chapter(index: i64, title: &str, content: &str) -> Chapter {
        Chapter {
            id: format!("chapter-{}", index),
            book_id: "book-1".to_string(),
            title: title.to_string(),
            content: content.to_string(),
            chapter_type: SectionType::Chapter,
            order: index * 10,
            word_count: crate::manuscript::count_words(content),
            tags: Vec::new(),
            created_at: 0,
            updated_at: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_artifact_shape() {
        let book = fixtures::book("My Book", "");
        let chapters = vec![fixtures::chapter(0, "One", "<p>Hello</p>")];

        let artifact =
            export_book(ExportFormat::Txt, &ExportOptions::default(), &book, &chapters).unwrap();
        assert_eq!(artifact.format, "txt");
        assert_eq!(artifact.filename, "My Book.txt");
        assert_eq!(artifact.content_type, "text/plain");

        let decoded = String::from_utf8(BASE64.decode(&artifact.data).unwrap()).unwrap();
        assert!(decoded.starts_with("MY BOOK\n=======\n"));
    }

    #[test]
    fn test_options_defaults() {
        let options: ExportOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options.paper_size, "6x9");
        assert!(!options.include_bleed);
        assert!(!options.print_ready);
    }

    #[test]
    fn test_every_format_produces_output() {
        let book = fixtures::book("Book", "About");
        let chapters = vec![
            fixtures::chapter(0, "One", "<p>First</p>"),
            fixtures::chapter(1, "Two", "<p>Second</p>"),
        ];
        for format in [
            ExportFormat::Pdf,
            ExportFormat::Epub,
            ExportFormat::Html,
            ExportFormat::Txt,
            ExportFormat::Docx,
        ] {
            let bytes = get_exporter(format, &ExportOptions::default())
                .export(&book, &chapters)
                .unwrap();
            assert!(!bytes.is_empty(), "{:?} produced nothing", format);
        }
    }
}
