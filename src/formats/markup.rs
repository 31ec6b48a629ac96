//! HTML helpers: tag stripping, entity decoding, paste cleanup and
//! visible-text extraction.

use super::patterns::{BLANK_LINE_RE, BLOCK_BOUNDARY_RE, BLOCK_TAG_RE, PASTE_JUNK_RES, TAG_RE};
use scraper::{ElementRef, Html};

/// Elements whose text never counts as page content.
const HIDDEN_TAGS: &[&str] = &["script", "style", "nav", "header", "footer"];

/// Elements that never have content and must be self-closed in XHTML.
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Remove every tag, keeping the text between them.
///
/// Block-level tags leave a space behind so adjacent paragraphs do not run
/// together; inline tags vanish.
pub fn strip_tags(html: &str) -> String {
    let spaced = BLOCK_BOUNDARY_RE.replace_all(html, " ");
    TAG_RE.replace_all(&spaced, "").into_owned()
}

/// Decode the handful of entities the editor emits.
pub fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
}

/// Collapse whitespace runs to single spaces and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Plain text of an HTML fragment.
pub fn plain_text(html: &str) -> String {
    collapse_whitespace(&decode_entities(&strip_tags(html)))
}

/// Escape text for inclusion in HTML or XML.
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Clean HTML pasted from a word processor or web page.
///
/// Office-specific markup and empty elements are removed. When no block
/// elements remain, blank-line separated text becomes `<p>` paragraphs.
pub fn clean_pasted(content: &str) -> String {
    let mut cleaned = content.to_string();
    for re in PASTE_JUNK_RES.iter() {
        cleaned = re.replace_all(&cleaned, "").into_owned();
    }

    if BLOCK_TAG_RE.is_match(&cleaned) {
        return collapse_whitespace(&cleaned);
    }

    BLANK_LINE_RE
        .split(&cleaned)
        .map(collapse_whitespace)
        .filter(|p| !p.is_empty())
        .map(|p| format!("<p>{}</p>", p))
        .collect()
}

/// Visible text of an HTML page, one text node per line.
pub fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut parts = Vec::new();
    collect_text(document.root_element(), &mut parts);
    parts.join("\n")
}

fn collect_text(element: ElementRef<'_>, parts: &mut Vec<String>) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            parts.push(text.to_string());
        } else if let Some(child_element) = ElementRef::wrap(child)
            && !HIDDEN_TAGS.contains(&child_element.value().name())
        {
            collect_text(child_element, parts);
        }
    }
}

/// Re-serialize an HTML fragment as well-formed XHTML.
///
/// Named entities are decoded by the parser and written back as characters,
/// unclosed elements are closed, void elements are self-closed and comments
/// are dropped.
pub fn to_xhtml(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = String::with_capacity(html.len());
    write_xhtml(fragment.root_element(), &mut out);
    out
}

fn write_xhtml(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(&escape_html(text));
        } else if let Some(child_element) = ElementRef::wrap(child) {
            let value = child_element.value();
            let name = value.name();
            out.push('<');
            out.push_str(name);
            for (attr, attr_value) in value.attrs() {
                out.push_str(&format!(" {}=\"{}\"", attr, escape_html(attr_value)));
            }
            if VOID_TAGS.contains(&name) {
                out.push_str("/>");
                continue;
            }
            out.push('>');
            write_xhtml(child_element, out);
            out.push_str("</");
            out.push_str(name);
            out.push('>');
        }
    }
}
