use super::Exporter;
use crate::db::{Book, Chapter};
use crate::error::Result;
use crate::formats::markup::escape_html;

const STYLE: &str = r#"        body { font-family: Georgia, serif; max-width: 800px; margin: 0 auto; padding: 40px 20px; line-height: 1.8; }
        h1 { text-align: center; margin-bottom: 40px; }
        h2 { margin-top: 60px; page-break-before: always; }
        p { text-indent: 1.5em; margin: 0.5em 0; }
        .chapter { margin-bottom: 60px; }
        .title-page { text-align: center; margin-bottom: 100px; }
        .title-page h1 { font-size: 2.5em; }
        .title-page .description { color: #666; font-style: italic; }
"#;

/// Single self-contained HTML page.
///
/// Chapter content is inserted as-is; it is already HTML.
pub struct HtmlExporter;

impl HtmlExporter {
    /// Render the page.
    pub fn render(book: &Book, chapters: &[Chapter]) -> String {
        let title = escape_html(&book.title);
        let mut html = format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>
{STYLE}    </style>
</head>
<body>
    <div class="title-page">
        <h1>{title}</h1>
        <p class="description">{}</p>
    </div>
"#,
            escape_html(&book.description)
        );

        for chapter in chapters {
            html.push_str(&format!(
                r#"
    <div class="chapter">
        <h2>{}</h2>
        {}
    </div>
"#,
                escape_html(&chapter.title),
                chapter.content
            ));
        }

        html.push_str("</body></html>");
        html
    }
}

impl Exporter for HtmlExporter {
    fn export(&self, book: &Book, chapters: &[Chapter]) -> Result<Vec<u8>> {
        Ok(Self::render(book, chapters).into_bytes())
    }
}
