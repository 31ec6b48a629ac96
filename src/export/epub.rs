//! EPUB 3 writer.
//!
//! One XHTML document per chapter, a navigation document and an NCX table of
//! contents for older readers. The reading order is the navigation document
//! followed by the chapters.

use super::Exporter;
use crate::db::{Book, Chapter};
use crate::error::Result;
use crate::formats::markup::{escape_html, to_xhtml};
use std::io::{Cursor, Write};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

const LANGUAGE: &str = "en";

/// Reflowable e-book.
pub struct EpubExporter;

impl Exporter for EpubExporter {
    fn export(&self, book: &Book, chapters: &[Chapter]) -> Result<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

        // mimetype must be first and uncompressed
        let options_stored =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        let options_deflate =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        zip.start_file("mimetype", options_stored)?;
        zip.write_all(b"application/epub+zip")?;

        zip.start_file("META-INF/container.xml", options_deflate)?;
        zip.write_all(CONTAINER_XML.as_bytes())?;

        zip.start_file("OEBPS/content.opf", options_deflate)?;
        zip.write_all(generate_opf(book, chapters).as_bytes())?;

        zip.start_file("OEBPS/nav.xhtml", options_deflate)?;
        zip.write_all(generate_nav(chapters).as_bytes())?;

        zip.start_file("OEBPS/toc.ncx", options_deflate)?;
        zip.write_all(generate_ncx(book, chapters).as_bytes())?;

        for (i, chapter) in chapters.iter().enumerate() {
            zip.start_file(format!("OEBPS/{}", chapter_href(i)), options_deflate)?;
            zip.write_all(chapter_xhtml(chapter).as_bytes())?;
        }

        Ok(zip.finish()?.into_inner())
    }
}

fn chapter_href(index: usize) -> String {
    format!("chapter_{}.xhtml", index)
}

fn generate_opf(book: &Book, chapters: &[Chapter]) -> String {
    let mut opf = String::new();

    opf.push_str(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="id">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
"#,
    );
    opf.push_str(&format!(
        "    <dc:identifier id=\"id\">{}</dc:identifier>\n",
        escape_html(&book.id)
    ));
    opf.push_str(&format!(
        "    <dc:title>{}</dc:title>\n",
        escape_html(&book.title)
    ));
    opf.push_str(&format!("    <dc:language>{}</dc:language>\n", LANGUAGE));
    if !book.description.is_empty() {
        opf.push_str(&format!(
            "    <dc:description>{}</dc:description>\n",
            escape_html(&book.description)
        ));
    }
    opf.push_str(&format!(
        "    <meta property=\"dcterms:modified\">{}</meta>\n",
        crate::db::timestamp_to_datetime(book.updated_at).format("%Y-%m-%dT%H:%M:%SZ")
    ));

    opf.push_str("  </metadata>\n  <manifest>\n");
    opf.push_str(
        "    <item id=\"ncx\" href=\"toc.ncx\" media-type=\"application/x-dtbncx+xml\"/>\n",
    );
    opf.push_str(
        "    <item id=\"nav\" href=\"nav.xhtml\" media-type=\"application/xhtml+xml\" properties=\"nav\"/>\n",
    );
    for i in 0..chapters.len() {
        opf.push_str(&format!(
            "    <item id=\"chapter_{}\" href=\"{}\" media-type=\"application/xhtml+xml\"/>\n",
            i,
            chapter_href(i)
        ));
    }

    opf.push_str("  </manifest>\n  <spine toc=\"ncx\">\n");
    opf.push_str("    <itemref idref=\"nav\"/>\n");
    for i in 0..chapters.len() {
        opf.push_str(&format!("    <itemref idref=\"chapter_{}\"/>\n", i));
    }
    opf.push_str("  </spine>\n</package>\n");
    opf
}

fn generate_nav(chapters: &[Chapter]) -> String {
    let mut nav = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops" lang="en">
<head><title>Contents</title></head>
<body>
  <nav epub:type="toc" id="toc">
    <ol>
"#,
    );
    for (i, chapter) in chapters.iter().enumerate() {
        nav.push_str(&format!(
            "      <li><a href=\"{}\">{}</a></li>\n",
            chapter_href(i),
            escape_html(&chapter.title)
        ));
    }
    nav.push_str("    </ol>\n  </nav>\n</body>\n</html>\n");
    nav
}

fn generate_ncx(book: &Book, chapters: &[Chapter]) -> String {
    let mut ncx = String::new();
    ncx.push_str(&format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head>
    <meta name="dtb:uid" content="{}"/>
  </head>
  <docTitle><text>{}</text></docTitle>
  <navMap>
"#,
        escape_html(&book.id),
        escape_html(&book.title)
    ));
    for (i, chapter) in chapters.iter().enumerate() {
        ncx.push_str(&format!(
            "    <navPoint id=\"navpoint-{0}\" playOrder=\"{0}\">\n      <navLabel><text>{1}</text></navLabel>\n      <content src=\"{2}\"/>\n    </navPoint>\n",
            i + 1,
            escape_html(&chapter.title),
            chapter_href(i)
        ));
    }
    ncx.push_str("  </navMap>\n</ncx>\n");
    ncx
}

fn chapter_xhtml(chapter: &Chapter) -> String {
    let title = escape_html(&chapter.title);
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" lang="{LANGUAGE}">
<head><title>{title}</title></head>
<body><h1>{title}</h1>{}</body>
</html>
"#,
        to_xhtml(&chapter.content)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::fixtures;
    use std::io::Read;
    use zip::ZipArchive;

    fn read(archive: &mut ZipArchive<Cursor<Vec<u8>>>, name: &str) -> String {
        let mut content = String::new();
        archive
            .by_name(name)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        content
    }

    #[test]
    fn test_container_layout() {
        let book = fixtures::book("A & B", "");
        let chapters = vec![
            fixtures::chapter(0, "One", "<p>First</p>"),
            fixtures::chapter(1, "Two", "<p>Second</p>"),
        ];
        let bytes = EpubExporter.export(&book, &chapters).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();

        {
            let first = archive.by_index(0).unwrap();
            assert_eq!(first.name(), "mimetype");
            assert_eq!(first.compression(), zip::CompressionMethod::Stored);
        }
        assert_eq!(read(&mut archive, "mimetype"), "application/epub+zip");

        let opf = read(&mut archive, "OEBPS/content.opf");
        assert!(opf.contains("<dc:title>A &amp; B</dc:title>"));
        let nav = opf.find("idref=\"nav\"").unwrap();
        let one = opf.find("idref=\"chapter_0\"").unwrap();
        let two = opf.find("idref=\"chapter_1\"").unwrap();
        assert!(nav < one && one < two);

        let chapter = read(&mut archive, "OEBPS/chapter_1.xhtml");
        assert!(chapter.contains("<h1>Two</h1><p>Second</p>"));
    }

    #[test]
    fn test_every_entry_is_well_formed_xml() {
        let book = fixtures::book("Tom & Jerry", "A <short> tale");
        let chapters = vec![
            fixtures::chapter(0, "One & Only", "<p>a&nbsp;b</p>"),
            fixtures::chapter(1, "Two", "<p>line<br>break</p><p>unclosed"),
            fixtures::chapter(2, "Three", "Dash &mdash; and <img src=\"x.png\">"),
        ];
        let bytes = EpubExporter.export(&book, &chapters).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();

        let names: Vec<String> = archive
            .file_names()
            .filter(|n| n != &"mimetype")
            .map(str::to_string)
            .collect();
        assert_eq!(names.len(), 7);

        for name in &names {
            let xml = read(&mut archive, name);
            let options = roxmltree::ParsingOptions {
                allow_dtd: true,
                ..Default::default()
            };
            if let Err(e) = roxmltree::Document::parse_with_options(&xml, options) {
                panic!("{name} is not well-formed: {e}");
            }
        }

        let first = read(&mut archive, "OEBPS/chapter_0.xhtml");
        assert!(first.contains("<p>a\u{a0}b</p>"));
        let second = read(&mut archive, "OEBPS/chapter_1.xhtml");
        assert!(second.contains("<p>line<br/>break</p><p>unclosed</p>"));
    }

    #[test]
    fn test_table_of_contents_order() {
        let book = fixtures::book("Book", "");
        let chapters = vec![
            fixtures::chapter(0, "Alpha", ""),
            fixtures::chapter(1, "Beta", ""),
            fixtures::chapter(2, "Gamma", ""),
        ];
        let bytes = EpubExporter.export(&book, &chapters).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();

        let nav = read(&mut archive, "OEBPS/nav.xhtml");
        let positions: Vec<_> = ["Alpha", "Beta", "Gamma"]
            .iter()
            .map(|t| nav.find(&format!(">{}</a>", t)).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));

        let ncx = read(&mut archive, "OEBPS/toc.ncx");
        assert_eq!(ncx.matches("<navPoint").count(), 3);
        assert!(ncx.contains("<content src=\"chapter_2.xhtml\"/>"));
    }
}
