//! Import orchestration: uploaded documents, batches, remote sources and
//! pasted content, and persisting the resulting sections as chapters.

use crate::config::ImportConfig;
use crate::db::{Chapter, Database, now_timestamp};
use crate::error::{AppError, Result};
use crate::formats::markup::{clean_pasted, visible_text};
use crate::formats::patterns::{DOCS_ID_RE, DRIVE_FILE_ID_RE};
use crate::formats::{
    ContentAnalysis, SplitStrategy, analyze_content_structure, classify_type, parse_docx,
    smart_split,
};
use crate::manuscript::{Section, count_words};
use reqwest::Url;
use serde::Serialize;
use std::time::Duration;

/// MIME type of Word documents.
const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Local file header signature of ZIP archives.
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// An uploaded file.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Name declared by the client.
    pub filename: String,
    /// File contents.
    pub data: Vec<u8>,
}

/// Whether a declared file name has the `.docx` extension.
pub fn is_docx_name(filename: &str) -> bool {
    filename.ends_with(".docx")
}

/// Parse a single uploaded document, rejecting anything but `.docx`.
pub fn parse_upload(file: &UploadedFile) -> Result<Vec<Section>> {
    if !is_docx_name(&file.filename) {
        return Err(AppError::Validation("Only .docx files supported".to_string()));
    }
    parse_docx(&file.data)
}

// ========== BATCH ==========

/// Outcome of one file of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    /// Parsed.
    Success,
    /// Not a `.docx` file.
    Skipped,
    /// Could not be parsed.
    Error,
}

/// Per-file report of a batch import.
#[derive(Debug, Clone, Serialize)]
pub struct BatchEntry {
    /// File name as uploaded.
    pub filename: String,
    /// Outcome.
    pub status: BatchStatus,
    /// Why the file was skipped or failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Parsed sections, on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sections: Option<Vec<Section>>,
    /// Position of the file in the upload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<usize>,
}

impl BatchEntry {
    fn skipped(filename: &str) -> Self {
        Self {
            filename: filename.to_string(),
            status: BatchStatus::Skipped,
            reason: Some("Not a .docx file".to_string()),
            sections: None,
            order: None,
        }
    }
}

/// Parse every file of a batch independently.
///
/// A failing file is reported and does not affect the others.
pub fn preview_batch(files: &[UploadedFile]) -> Vec<BatchEntry> {
    files
        .iter()
        .enumerate()
        .map(|(index, file)| {
            if !is_docx_name(&file.filename) {
                return BatchEntry::skipped(&file.filename);
            }
            match parse_docx(&file.data) {
                Ok(sections) => BatchEntry {
                    filename: file.filename.clone(),
                    status: BatchStatus::Success,
                    reason: None,
                    sections: Some(sections),
                    order: Some(index),
                },
                Err(e) => BatchEntry {
                    filename: file.filename.clone(),
                    status: BatchStatus::Error,
                    reason: Some(e.to_string()),
                    sections: None,
                    order: None,
                },
            }
        })
        .collect()
}

// ========== PERSISTENCE ==========

/// A chapter created by an import.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedChapter {
    /// Chapter ID.
    pub id: String,
    /// Chapter title.
    pub title: String,
}

/// Store sections as new chapters of a book.
///
/// `order_of` maps a section's index to its sort key. Book aggregates are not
/// refreshed here; callers do that once after all their inserts.
pub fn persist_sections(
    db: &Database,
    book_id: &str,
    sections: &[Section],
    order_of: impl Fn(usize) -> i64,
) -> Result<Vec<CreatedChapter>> {
    let mut created = Vec::with_capacity(sections.len());
    for (index, section) in sections.iter().enumerate() {
        let now = now_timestamp();
        let chapter = Chapter {
            id: uuid::Uuid::new_v4().to_string(),
            book_id: book_id.to_string(),
            title: section.title.clone(),
            content: section.content.clone(),
            chapter_type: section.section_type,
            order: order_of(index),
            word_count: count_words(&section.content),
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        db.insert_chapter(&chapter)?;
        created.push(CreatedChapter {
            id: chapter.id,
            title: chapter.title,
        });
    }
    Ok(created)
}

/// Store the sections of one document as chapters of a book, sorted by
/// position, and refresh the book's aggregates.
///
/// Aggregates are refreshed even when an insert fails, so chapters stored
/// before the failure are counted.
pub fn import_sections_into_book(
    db: &Database,
    book_id: &str,
    sections: &[Section],
) -> Result<Vec<CreatedChapter>> {
    let outcome = persist_sections(db, book_id, sections, |i| i as i64 * 10);
    db.update_book_stats(book_id)?;
    outcome
}

/// Parse every `.docx` file of a batch into a book.
///
/// Sort keys leave room for 100 sections per file after the existing
/// chapters. Files that fail to parse are logged and left out. As with
/// [`import_sections_into_book`], aggregates are refreshed on every path.
pub fn import_batch_into_book(
    db: &Database,
    book_id: &str,
    files: &[UploadedFile],
) -> Result<Vec<CreatedChapter>> {
    let existing = db.count_chapters(book_id)?;
    let outcome = persist_batch(db, book_id, files, existing);
    db.update_book_stats(book_id)?;
    outcome
}

fn persist_batch(
    db: &Database,
    book_id: &str,
    files: &[UploadedFile],
    existing: i64,
) -> Result<Vec<CreatedChapter>> {
    let mut created = Vec::new();

    for (file_index, file) in files.iter().enumerate() {
        if !is_docx_name(&file.filename) {
            continue;
        }
        let sections = match parse_docx(&file.data) {
            Ok(sections) => sections,
            Err(e) => {
                tracing::error!(book_id = %book_id, filename = %file.filename, error = %e, "Batch import error");
                continue;
            }
        };
        let base = existing + file_index as i64 * 100;
        created.extend(persist_sections(db, book_id, &sections, |i| {
            (base + i as i64) * 10
        })?);
    }
    Ok(created)
}

// ========== REMOTE SOURCES ==========

/// Rewrite sharing links to a URL that serves the document itself.
///
/// Google Docs links become their plain-text export; Google Drive file links
/// become a direct download. Other URLs are fetched as given.
pub fn resolve_source_url(url: &str) -> Result<String> {
    let parsed =
        Url::parse(url).map_err(|e| AppError::Validation(format!("Invalid URL: {}", e)))?;
    let host = parsed.host_str().unwrap_or_default();

    if host.contains("docs.google.com") {
        if let Some(caps) = DOCS_ID_RE.captures(parsed.path()) {
            return Ok(format!(
                "https://docs.google.com/document/d/{}/export?format=txt",
                &caps[1]
            ));
        }
    } else if host.contains("drive.google.com") {
        let file_id = drive_file_id(&parsed)
            .ok_or_else(|| AppError::Validation("Invalid Google Drive link".to_string()))?;
        return Ok(format!(
            "https://drive.google.com/uc?export=download&id={}",
            file_id
        ));
    }

    Ok(url.to_string())
}

/// File ID of a Drive link, from `/file/d/<id>` or an `id` query parameter.
fn drive_file_id(url: &Url) -> Option<String> {
    if let Some(caps) = DRIVE_FILE_ID_RE.captures(url.path()) {
        return Some(caps[1].to_string());
    }
    url.query_pairs()
        .find(|(key, _)| key == "id")
        .map(|(_, value)| value.into_owned())
        .filter(|id| !id.is_empty())
}

/// Whether a fetched payload is a Word document.
pub fn looks_like_docx(content_type: &str, url: &str, data: &[u8]) -> bool {
    content_type.to_lowercase().contains(DOCX_MIME)
        || url.to_lowercase().ends_with(".docx")
        || data.starts_with(ZIP_MAGIC)
}

/// A fetched remote document.
#[derive(Debug, Clone)]
pub struct FetchedSource {
    /// URL that was fetched.
    pub url: String,
    /// Response `Content-Type`, or empty.
    pub content_type: String,
    /// Response body.
    pub data: Vec<u8>,
}

/// HTTP client for URL imports.
#[derive(Clone)]
pub struct RemoteFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl RemoteFetcher {
    /// Build a fetcher with the configured timeout and user agent. Bodies
    /// larger than `max_bytes` are refused, like oversized uploads.
    pub fn new(config: &ImportConfig, max_bytes: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_seconds))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, max_bytes })
    }

    /// GET a URL; any transport failure, non-success status or oversized
    /// body is an `UpstreamFetch` error.
    pub async fn fetch(&self, url: &str) -> Result<FetchedSource> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::UpstreamFetch(format!("Could not fetch URL: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::UpstreamFetch(format!(
                "Could not fetch URL: server returned {}",
                status
            )));
        }

        if let Some(length) = response.content_length()
            && length > self.max_bytes as u64
        {
            return Err(body_too_large(self.max_bytes));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let mut data = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| AppError::UpstreamFetch(format!("Could not read response: {}", e)))?
        {
            append_limited(&mut data, &chunk, self.max_bytes)?;
        }

        Ok(FetchedSource {
            url: url.to_string(),
            content_type,
            data,
        })
    }
}

/// Append a body chunk unless it would take the body past `max_bytes`.
fn append_limited(data: &mut Vec<u8>, chunk: &[u8], max_bytes: usize) -> Result<()> {
    if data.len() + chunk.len() > max_bytes {
        return Err(body_too_large(max_bytes));
    }
    data.extend_from_slice(chunk);
    Ok(())
}

fn body_too_large(max_bytes: usize) -> AppError {
    AppError::UpstreamFetch(format!(
        "Remote document is larger than {} MB",
        max_bytes / (1024 * 1024)
    ))
}

/// Turn a fetched payload into sections.
///
/// Word documents go through the document parser. HTML pages are reduced to
/// their visible text and anything else is read as text; both are then split
/// on chapter markers.
pub fn sections_from_payload(source: &FetchedSource) -> Result<Vec<Section>> {
    if looks_like_docx(&source.content_type, &source.url, &source.data) {
        return parse_docx(&source.data);
    }

    let body = String::from_utf8_lossy(&source.data);
    let text = if source.content_type.to_lowercase().contains("html") {
        visible_text(&body)
    } else {
        body.into_owned()
    };

    Ok(split_into_sections(&text, SplitStrategy::Chapter))
}

/// Split text and type each part by its title.
pub fn split_into_sections(text: &str, strategy: SplitStrategy) -> Vec<Section> {
    smart_split(text, strategy)
        .into_iter()
        .map(|part| {
            let section_type = classify_type(&part.title);
            Section::new(part.title, section_type, part.content)
        })
        .collect()
}

// ========== SMART PASTE ==========

/// Cleaned paste and its structure analysis.
#[derive(Debug, Clone, Serialize)]
pub struct PasteResult {
    /// Cleaned HTML.
    pub cleaned: String,
    /// Analysis of the cleaned HTML.
    pub analysis: ContentAnalysis,
}

/// Clean pasted content and analyze its structure.
pub fn smart_paste(content: &str) -> Result<PasteResult> {
    if content.is_empty() {
        return Err(AppError::Validation("Content required".to_string()));
    }
    let cleaned = clean_pasted(content);
    let analysis = analyze_content_structure(&cleaned);
    Ok(PasteResult { cleaned, analysis })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::docx::fixtures;
    use crate::manuscript::SectionType;

    fn upload(name: &str, data: Vec<u8>) -> UploadedFile {
        UploadedFile {
            filename: name.to_string(),
            data,
        }
    }

    #[test]
    fn test_parse_upload_requires_docx_name() {
        let err = parse_upload(&upload("novel.pdf", Vec::new())).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);

        let err = parse_upload(&upload("novel.docx", b"not a zip".to_vec())).unwrap_err();
        assert!(matches!(err, AppError::Parse(_)));
    }

    #[test]
    fn test_preview_batch_isolates_failures() {
        let good = fixtures::build(&[fixtures::heading(1, "Chapter 1"), fixtures::para("Text")]);
        let files = vec![
            upload("notes.txt", b"hello".to_vec()),
            upload("good.docx", good),
            upload("bad.docx", b"garbage".to_vec()),
        ];

        let entries = preview_batch(&files);
        let statuses: Vec<_> = entries.iter().map(|e| e.status).collect();
        assert_eq!(
            statuses,
            vec![BatchStatus::Skipped, BatchStatus::Success, BatchStatus::Error]
        );
        assert_eq!(entries[0].reason.as_deref(), Some("Not a .docx file"));
        assert_eq!(entries[1].order, Some(1));
        assert_eq!(entries[1].sections.as_ref().unwrap()[0].title, "Chapter 1");
        assert!(entries[2].reason.is_some());
    }

    #[test]
    fn test_skipped_entries_do_not_depend_on_order() {
        let files = vec![upload("a.txt", Vec::new()), upload("b.odt", Vec::new())];
        let mut reversed = files.clone();
        reversed.reverse();

        let forward = serde_json::to_value(preview_batch(&files)).unwrap();
        let backward = serde_json::to_value(preview_batch(&reversed)).unwrap();
        assert_eq!(forward[0], backward[1]);
        assert_eq!(forward[1], backward[0]);
        assert_eq!(forward[0]["status"], "skipped");
    }

    #[test]
    fn test_resolve_google_docs() {
        assert_eq!(
            resolve_source_url("https://docs.google.com/document/d/abc_DEF-1/edit?usp=sharing")
                .unwrap(),
            "https://docs.google.com/document/d/abc_DEF-1/export?format=txt"
        );
    }

    #[test]
    fn test_resolve_google_drive() {
        let expected = "https://drive.google.com/uc?export=download&id=XYZ_9";
        assert_eq!(
            resolve_source_url("https://drive.google.com/file/d/XYZ_9/view").unwrap(),
            expected
        );
        assert_eq!(
            resolve_source_url("https://drive.google.com/open?id=XYZ_9").unwrap(),
            expected
        );

        let err = resolve_source_url("https://drive.google.com/drive/folders").unwrap_err();
        assert_eq!(err.to_string(), "Invalid Google Drive link");
    }

    #[test]
    fn test_resolve_other_urls() {
        assert_eq!(
            resolve_source_url("https://example.com/story.txt").unwrap(),
            "https://example.com/story.txt"
        );
        assert!(matches!(
            resolve_source_url("not a url"),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_remote_body_is_capped() {
        let mut data = Vec::new();
        append_limited(&mut data, b"abcd", 6).unwrap();
        append_limited(&mut data, b"ef", 6).unwrap();
        assert_eq!(data, b"abcdef");

        let err = append_limited(&mut data, b"g", 6).unwrap_err();
        assert!(matches!(err, AppError::UpstreamFetch(_)));
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
        assert_eq!(data.len(), 6);

        let err = body_too_large(25 * 1024 * 1024);
        assert_eq!(err.to_string(), "Remote document is larger than 25 MB");
    }

    #[test]
    fn test_looks_like_docx() {
        assert!(looks_like_docx(DOCX_MIME, "https://x", b""));
        assert!(looks_like_docx("application/octet-stream", "https://x/a.DOCX", b""));
        assert!(looks_like_docx("", "https://x", b"PK\x03\x04rest"));
        assert!(!looks_like_docx("text/plain", "https://x/a.txt", b"Chapter 1"));
    }

    #[test]
    fn test_sections_from_html_payload() {
        let source = FetchedSource {
            url: "https://example.com/story".to_string(),
            content_type: "text/html; charset=utf-8".to_string(),
            data: b"<html><body><nav>Chapter 9 menu</nav>\
                    <p>Prologue text</p><h1>Chapter 1: Dawn</h1><p>It began.</p>\
                    </body></html>"
                .to_vec(),
        };

        let sections = sections_from_payload(&source).unwrap();
        let titles: Vec<_> = sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Introduction", "Chapter 1: Dawn"]);
        assert_eq!(sections[0].section_type, SectionType::Introduction);
        assert_eq!(sections[1].content, "It began.");
    }

    #[test]
    fn test_sections_from_text_payload() {
        let source = FetchedSource {
            url: "https://example.com/story.txt".to_string(),
            content_type: "text/plain".to_string(),
            data: b"Just one piece of text.".to_vec(),
        };
        let sections = sections_from_payload(&source).unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].title, "Chapter 1");
        assert_eq!(sections[0].content, "Just one piece of text.");
    }

    #[test]
    fn test_sections_from_docx_payload() {
        let data = fixtures::build(&[fixtures::heading(1, "Epilogue"), fixtures::para("Done.")]);
        let source = FetchedSource {
            url: "https://example.com/download".to_string(),
            content_type: "application/octet-stream".to_string(),
            data,
        };
        let sections = sections_from_payload(&source).unwrap();
        assert_eq!(sections[0].section_type, SectionType::Epilogue);
        assert_eq!(sections[0].content, "<p>Done.</p>");
    }

    #[test]
    fn test_smart_paste() {
        assert!(matches!(smart_paste(""), Err(AppError::Validation(_))));

        let result = smart_paste("Chapter 1\n\nIt was late.").unwrap();
        assert_eq!(result.cleaned, "<p>Chapter 1</p><p>It was late.</p>");
        assert_eq!(result.analysis.paragraph_count, 2);
        assert_eq!(result.analysis.detected_headers.len(), 1);
    }
}
