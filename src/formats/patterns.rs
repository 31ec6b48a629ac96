//! Cached regex patterns for the import and export pipelines.

use regex::Regex;
use std::sync::LazyLock;

// === Markup ===

/// Any HTML tag.
pub static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Tags that separate words: block elements and line breaks.
pub static BLOCK_BOUNDARY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?(p|div|h[1-6]|li|ul|ol|blockquote|br|hr|tr|td|th)\b[^>]*>").unwrap()
});

/// Opening paragraph or div element.
pub static BLOCK_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<(p|div)[\s>]").unwrap());

/// A blank line separating paragraphs of plain text.
pub static BLANK_LINE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s*\n").unwrap());

// === Structure detection ===

/// Title prefixes that mark the start of a new top-level section.
pub static SECTION_HEADER_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^chapter\s+\d+",
        r"^part\s+\d+",
        r"^section\s+\d+",
        r"^prologue",
        r"^epilogue",
        r"^introduction",
        r"^preface",
        r"^dedication",
        r"^acknowledgment",
        r"^appendix",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

// === Content splitting ===

/// `Chapter N` delimiter line.
pub static SPLIT_CHAPTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)chapter[ \t]+\d+[:. \t]*[^\n]*").unwrap());

/// `Part N` delimiter line.
pub static SPLIT_PART_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)part[ \t]+\d+[:. \t]*[^\n]*").unwrap());

/// Markdown heading delimiter line.
pub static SPLIT_HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#{1,3}[ \t]+[^\n]+").unwrap());

// === Content analysis ===

/// Chapter marker with arabic or roman numbering.
pub static ANALYZE_CHAPTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)chapter\s+(\d+|[ivxlc]+)").unwrap());

/// Part marker with arabic or roman numbering.
pub static ANALYZE_PART_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)part\s+(\d+|[ivxlc]+)").unwrap());

/// Whole-line markdown heading.
pub static ANALYZE_HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{1,3}\s+(.+)$").unwrap());

// === Paste cleanup ===

/// Word-specific markup, removed in order before whitespace handling.
pub static PASTE_JUNK_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?s)<o:p>.*?</o:p>",
        r"(?s)<!--.*?-->",
        r"(?s)<!\[if.*?\]>.*?<!\[endif\]>",
        r#"class="[^"]*Mso[^"]*""#,
        r#"style="[^"]*mso-[^"]*""#,
        r"<span[^>]*>\s*</span>",
        r"<p[^>]*>\s*</p>",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

// === DOCX export ===

/// Second-level heading.
pub static H2_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<h2>(.*?)</h2>").unwrap());

/// Third-level heading.
pub static H3_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<h3>(.*?)</h3>").unwrap());

/// Inline emphasis tags.
pub static EMPHASIS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?(strong|em)>").unwrap());

/// Paragraph element.
pub static PARAGRAPH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<p>(.*?)</p>").unwrap());

// === URL import ===

/// Document id in an editable-document sharing link.
pub static DOCS_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/d/([a-zA-Z0-9_-]+)").unwrap());

/// File id in a file-sharing link path.
pub static DRIVE_FILE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/file/d/([a-zA-Z0-9_-]+)").unwrap());
