//! Paginated PDF writer.
//!
//! Text is set with the standard Helvetica fonts, so no font data is
//! embedded. Body text is laid out one word per line, top to bottom.

use super::Exporter;
use crate::db::{Book, Chapter};
use crate::error::{AppError, Result};
use crate::formats::markup::{decode_entities, strip_tags};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};

/// Bleed added on every side, in points.
pub const BLEED: i64 = 9;

/// Distance of the text block from the page edges.
const MARGIN: f32 = 72.0;
/// Vertical advance per body line.
const LINE_HEIGHT: f32 = 14.0;
/// Gap between a chapter heading and its first line.
const HEADING_GAP: f32 = 48.0;
/// Baseline of the book title, from the top edge.
const TITLE_DROP: f32 = 200.0;

const TITLE_SIZE: f32 = 24.0;
const HEADING_SIZE: f32 = 18.0;
const BODY_SIZE: f32 = 11.0;

const REGULAR: &str = "F1";
const BOLD: &str = "F2";

/// Trim sizes, in points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaperSize {
    /// 6 x 9 in.
    #[default]
    Trade,
    /// 5.5 x 8.5 in.
    Digest,
    /// 5 x 8 in.
    Small,
    /// 8.5 x 11 in.
    Letter,
    /// ISO A5.
    A5,
}

impl PaperSize {
    /// Resolve a request name; unknown names fall back to 6x9.
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "5.5x8.5" => PaperSize::Digest,
            "5x8" => PaperSize::Small,
            "8.5x11" => PaperSize::Letter,
            "a5" => PaperSize::A5,
            _ => PaperSize::Trade,
        }
    }

    /// Width and height in points.
    pub fn dimensions(&self) -> (i64, i64) {
        match self {
            PaperSize::Trade => (432, 648),
            PaperSize::Digest => (396, 612),
            PaperSize::Small => (360, 576),
            PaperSize::Letter => (612, 792),
            PaperSize::A5 => (420, 595),
        }
    }
}

/// Page canvas size, expanded by the bleed on both sides when requested.
pub fn canvas_size(paper: PaperSize, include_bleed: bool) -> (i64, i64) {
    let (width, height) = paper.dimensions();
    let bleed = if include_bleed { BLEED } else { 0 };
    (width + bleed * 2, height + bleed * 2)
}

/// Print-style PDF with a title page and one or more pages per chapter.
pub struct PdfExporter {
    paper: PaperSize,
    include_bleed: bool,
    print_ready: bool,
}

impl PdfExporter {
    /// Create an exporter for a paper size.
    pub fn new(paper: PaperSize, include_bleed: bool, print_ready: bool) -> Self {
        Self {
            paper,
            include_bleed,
            print_ready,
        }
    }
}

impl Exporter for PdfExporter {
    fn export(&self, book: &Book, chapters: &[Chapter]) -> Result<Vec<u8>> {
        let (width, height) = canvas_size(self.paper, self.include_bleed);
        let mut canvas = Canvas::default();

        let title_width = approximate_width(&book.title, TITLE_SIZE);
        canvas.draw(
            BOLD,
            TITLE_SIZE,
            (width as f32 - title_width) / 2.0,
            height as f32 - TITLE_DROP,
            &book.title,
        );
        canvas.show_page();

        for chapter in chapters {
            canvas.draw(
                BOLD,
                HEADING_SIZE,
                MARGIN,
                height as f32 - MARGIN,
                &chapter.title,
            );

            let mut y = height as f32 - MARGIN - HEADING_GAP;
            let body = decode_entities(&strip_tags(&chapter.content));
            for word in body.split_whitespace() {
                if y < MARGIN {
                    canvas.show_page();
                    y = height as f32 - MARGIN;
                }
                canvas.draw(REGULAR, BODY_SIZE, MARGIN, y, word);
                y -= LINE_HEIGHT;
            }
            canvas.show_page();
        }

        self.assemble(book, canvas.pages, width, height)
    }
}

impl PdfExporter {
    fn assemble(
        &self,
        book: &Book,
        pages: Vec<Vec<Operation>>,
        width: i64,
        height: i64,
    ) -> Result<Vec<u8>> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let regular_id = doc.add_object(standard_font("Helvetica"));
        let bold_id = doc.add_object(standard_font("Helvetica-Bold"));
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                REGULAR => Object::Reference(regular_id),
                BOLD => Object::Reference(bold_id),
            },
        });

        let media_box: Vec<Object> = vec![0.into(), 0.into(), width.into(), height.into()];
        let bleed = if self.include_bleed { BLEED } else { 0 };
        let trim_box: Vec<Object> = vec![
            bleed.into(),
            bleed.into(),
            (width - bleed).into(),
            (height - bleed).into(),
        ];

        let mut kids = Vec::with_capacity(pages.len());
        for operations in pages {
            let content = Content { operations }.encode()?;
            let content_id = doc.add_object(Stream::new(dictionary! {}, content));

            let mut page = dictionary! {
                "Type" => "Page",
                "Parent" => Object::Reference(pages_id),
                "MediaBox" => media_box.clone(),
                "Contents" => Object::Reference(content_id),
                "Resources" => Object::Reference(resources_id),
            };
            if self.print_ready {
                page.set("TrimBox", trim_box.clone());
                page.set("BleedBox", media_box.clone());
            }
            kids.push(Object::Reference(doc.add_object(page)));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let info_id: ObjectId = doc.add_object(dictionary! {
            "Title" => Object::string_literal(win_ansi(&book.title)),
            "Producer" => Object::string_literal("folio-rs"),
        });
        doc.trailer.set("Info", Object::Reference(info_id));

        let mut pdf_bytes = Vec::new();
        doc.save_to(&mut pdf_bytes)
            .map_err(|e| AppError::Internal(format!("Failed to save PDF: {}", e)))?;

        Ok(pdf_bytes)
    }
}

/// Accumulates drawing operations page by page.
#[derive(Default)]
struct Canvas {
    pages: Vec<Vec<Operation>>,
    current: Vec<Operation>,
}

impl Canvas {
    fn draw(&mut self, font: &str, size: f32, x: f32, y: f32, text: &str) {
        self.current.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![font.into(), size.into()]),
            Operation::new("Td", vec![x.into(), y.into()]),
            Operation::new("Tj", vec![Object::string_literal(win_ansi(text))]),
            Operation::new("ET", vec![]),
        ]);
    }

    /// Close the current page, even when nothing was drawn on it.
    fn show_page(&mut self) {
        self.pages.push(std::mem::take(&mut self.current));
    }
}

fn standard_font(name: &str) -> lopdf::Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => name,
        "Encoding" => "WinAnsiEncoding",
    }
}

/// Encode text for a WinAnsi font; characters outside Latin-1 become `?`.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

/// Rough Helvetica-Bold advance width, used only to center the title.
fn approximate_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * 0.58
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::fixtures;

    fn words(n: usize) -> String {
        format!("<p>{}</p>", vec!["word"; n].join(" "))
    }

    fn page_count(bytes: &[u8]) -> usize {
        Document::load_mem(bytes).unwrap().get_pages().len()
    }

    #[test]
    fn test_canvas_size() {
        assert_eq!(canvas_size(PaperSize::from_name("6x9"), true), (450, 666));
        assert_eq!(canvas_size(PaperSize::from_name("6x9"), false), (432, 648));
        assert_eq!(canvas_size(PaperSize::from_name("A5"), false), (420, 595));
        assert_eq!(canvas_size(PaperSize::from_name("tabloid"), false), (432, 648));
    }

    #[test]
    fn test_media_box_with_bleed() {
        let book = fixtures::book("Title", "");
        let exporter = PdfExporter::new(PaperSize::Trade, true, true);
        let bytes = exporter.export(&book, &[]).unwrap();

        let doc = Document::load_mem(&bytes).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 1);

        let page_id = *pages.values().next().unwrap();
        let page = doc.get_dictionary(page_id).unwrap();
        let dims = |key: &[u8]| -> Vec<i64> {
            page.get(key)
                .unwrap()
                .as_array()
                .unwrap()
                .iter()
                .map(|o| o.as_i64().unwrap())
                .collect()
        };
        assert_eq!(dims(b"MediaBox"), vec![0, 0, 450, 666]);
        assert_eq!(dims(b"TrimBox"), vec![9, 9, 441, 657]);
    }

    #[test]
    fn test_pagination() {
        // On a 6x9 page the body starts at y=528 and stops below y=72:
        // 33 words fit on a chapter's first page.
        let book = fixtures::book("Title", "");
        let exporter = PdfExporter::new(PaperSize::Trade, false, false);

        let fits = vec![fixtures::chapter(0, "One", &words(33))];
        assert_eq!(page_count(&exporter.export(&book, &fits).unwrap()), 2);

        let spills = vec![fixtures::chapter(0, "One", &words(34))];
        assert_eq!(page_count(&exporter.export(&book, &spills).unwrap()), 3);

        let empty = vec![
            fixtures::chapter(0, "One", ""),
            fixtures::chapter(1, "Two", ""),
        ];
        assert_eq!(page_count(&exporter.export(&book, &empty).unwrap()), 3);
    }

    #[test]
    fn test_words_are_drawn() {
        let book = fixtures::book("Title", "");
        let chapters = vec![fixtures::chapter(0, "Opening", "<p>Hello &amp; goodbye</p>")];
        let bytes = PdfExporter::new(PaperSize::Trade, false, false)
            .export(&book, &chapters)
            .unwrap();

        let doc = Document::load_mem(&bytes).unwrap();
        let pages = doc.get_pages();
        let chapter_page = *pages.values().nth(1).unwrap();
        let content = doc.get_page_content(chapter_page).unwrap();
        let content = String::from_utf8_lossy(&content);
        for expected in ["(Opening)", "(Hello)", "(&)", "(goodbye)"] {
            assert!(content.contains(expected), "missing {expected}");
        }
    }

    #[test]
    fn test_win_ansi() {
        assert_eq!(win_ansi("café"), vec![b'c', b'a', b'f', 0xE9]);
        assert_eq!(win_ansi("a→b"), b"a?b".to_vec());
    }
}
