//! HTTP request handlers.

use crate::ai::{self, PromptKind};
use crate::config::ExportFormat;
use crate::db::{
    self, Book, Chapter, ChapterChanges, ChapterSummary, ChapterVersion, Signature, User,
    UserStats,
};
use crate::error::{AppError, Result};
use crate::export::{self, ExportArtifact, ExportOptions};
use crate::formats::{AnalysisOutcome, SplitStrategy, suggest_for_content, smart_split};
use crate::import::{self, BatchEntry, CreatedChapter, PasteResult, UploadedFile};
use crate::manuscript::{Section, SectionType, SplitSection};
use crate::server::AppState;
use crate::server::state::extract_token;
use crate::usage::{self, UsageKind, UsageReport};
use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
};
use serde::{Deserialize, Serialize};

/// Versions kept per chapter.
const MAX_VERSIONS: usize = 20;

/// Signatures returned by a listing.
const MAX_SIGNATURES: i64 = 20;

/// Plain confirmation body.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    message: String,
}

impl MessageResponse {
    fn new(message: &str) -> Json<Self> {
        Json(Self {
            message: message.to_string(),
        })
    }
}

// ============================================================================
// AUTH API
// ============================================================================

/// Register request.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    email: String,
    password: String,
    name: String,
}

/// Login request.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

/// Login response.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    token: String,
    user: User,
}

/// Password change request.
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    current_password: String,
    new_password: String,
}

/// Auth register.
pub async fn auth_register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>> {
    state.auth.register(&req.email, &req.password, &req.name)?;
    let (user, token) = state.auth.login(&req.email, &req.password)?;

    Ok(Json(AuthResponse { token, user }))
}

/// Auth login.
pub async fn auth_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let (user, token) = state.auth.login(&req.email, &req.password)?;
    Ok(Json(AuthResponse { token, user }))
}

/// Auth logout.
pub async fn auth_logout(State(state): State<AppState>, headers: HeaderMap) -> Result<StatusCode> {
    if let Some(token) = extract_token(&headers) {
        state.auth.logout(&token)?;
    }
    Ok(StatusCode::OK)
}

/// Get current user info.
pub async fn auth_me(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<User>> {
    let user = state.authenticate(&headers)?;
    Ok(Json(user))
}

/// Change the caller's password.
pub async fn auth_change_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>> {
    let user = state.authenticate(&headers)?;
    state
        .auth
        .change_password(&user, &req.current_password, &req.new_password)?;
    Ok(MessageResponse::new("Password updated successfully"))
}

// ============================================================================
// BOOKS API
// ============================================================================

/// New book.
#[derive(Debug, Deserialize)]
pub struct CreateBookRequest {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    genre: String,
}

/// Book fields to change.
#[derive(Debug, Deserialize)]
pub struct UpdateBookRequest {
    title: Option<String>,
    description: Option<String>,
    genre: Option<String>,
    cover_data: Option<String>,
}

fn require_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(AppError::Validation("Title required".to_string()));
    }
    Ok(())
}

/// Create a book.
pub async fn create_book(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateBookRequest>,
) -> Result<Json<Book>> {
    let user = state.authenticate(&headers)?;
    require_title(&req.title)?;

    let now = db::now_timestamp();
    let book = Book {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: user.id,
        title: req.title,
        description: req.description,
        genre: req.genre,
        cover_data: None,
        chapter_count: 0,
        word_count: 0,
        created_at: now,
        updated_at: now,
    };

    state.db.create_book(&book)?;
    tracing::info!(book_id = %book.id, user_id = %book.user_id, "Book created");
    Ok(Json(book))
}

/// List the caller's books.
pub async fn list_books(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<Vec<Book>>> {
    let user = state.authenticate(&headers)?;
    Ok(Json(state.db.list_books(&user.id)?))
}

/// Get one book.
pub async fn get_book(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(book_id): Path<String>,
) -> Result<Json<Book>> {
    let user = state.authenticate(&headers)?;
    Ok(Json(state.owned_book(&book_id, &user)?))
}

/// Update book metadata.
pub async fn update_book(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(book_id): Path<String>,
    Json(req): Json<UpdateBookRequest>,
) -> Result<Json<Book>> {
    let user = state.authenticate(&headers)?;
    let mut book = state.owned_book(&book_id, &user)?;

    if let Some(title) = req.title {
        require_title(&title)?;
        book.title = title;
    }
    if let Some(description) = req.description {
        book.description = description;
    }
    if let Some(genre) = req.genre {
        book.genre = genre;
    }
    if let Some(cover_data) = req.cover_data {
        book.cover_data = Some(cover_data);
    }
    book.updated_at = db::now_timestamp();

    state.db.update_book(&book)?;
    Ok(Json(book))
}

/// Delete a book and its chapters.
pub async fn delete_book(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(book_id): Path<String>,
) -> Result<Json<MessageResponse>> {
    let user = state.authenticate(&headers)?;
    if !state.db.delete_book(&book_id, &user.id)? {
        return Err(AppError::NotFound("Book".to_string()));
    }

    tracing::info!(book_id = %book_id, user_id = %user.id, "Book deleted");
    Ok(MessageResponse::new("Book deleted"))
}

// ============================================================================
// CHAPTERS API
// ============================================================================

/// New chapter.
#[derive(Debug, Deserialize)]
pub struct CreateChapterRequest {
    title: String,
    #[serde(rename = "type", default)]
    chapter_type: SectionType,
    #[serde(default)]
    order: i64,
}

/// Chapter fields to change.
#[derive(Debug, Deserialize)]
pub struct UpdateChapterRequest {
    title: Option<String>,
    content: Option<String>,
    #[serde(rename = "type")]
    chapter_type: Option<SectionType>,
    order: Option<i64>,
}

/// Reorder result.
#[derive(Debug, Serialize)]
pub struct ReorderResponse {
    reordered: usize,
}

/// Tags result.
#[derive(Debug, Serialize)]
pub struct TagsResponse {
    tags: Vec<String>,
}

/// Create an empty chapter.
pub async fn create_chapter(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(book_id): Path<String>,
    Json(req): Json<CreateChapterRequest>,
) -> Result<Json<Chapter>> {
    let user = state.authenticate(&headers)?;
    let book = state.owned_book(&book_id, &user)?;

    let now = db::now_timestamp();
    let chapter = Chapter {
        id: uuid::Uuid::new_v4().to_string(),
        book_id: book.id,
        title: req.title,
        content: String::new(),
        chapter_type: req.chapter_type,
        order: req.order,
        word_count: 0,
        tags: Vec::new(),
        created_at: now,
        updated_at: now,
    };

    state.db.insert_chapter(&chapter)?;
    state.db.update_book_stats(&chapter.book_id)?;
    Ok(Json(chapter))
}

/// List a book's chapters in reading order.
pub async fn list_chapters(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(book_id): Path<String>,
) -> Result<Json<Vec<Chapter>>> {
    let user = state.authenticate(&headers)?;
    let book = state.owned_book(&book_id, &user)?;
    Ok(Json(state.db.list_chapters(&book.id)?))
}

/// Update a chapter.
pub async fn update_chapter(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(chapter_id): Path<String>,
    Json(req): Json<UpdateChapterRequest>,
) -> Result<Json<Chapter>> {
    let user = state.authenticate(&headers)?;
    let (chapter, _) = state.chapter_with_access(&chapter_id, &user)?;

    let changes = ChapterChanges {
        title: req.title,
        content: req.content,
        chapter_type: req.chapter_type,
        order: req.order,
    };

    let updated = state
        .db
        .update_chapter(&chapter.id, &changes)?
        .ok_or_else(|| AppError::NotFound("Chapter".to_string()))?;
    state.db.update_book_stats(&chapter.book_id)?;

    Ok(Json(updated))
}

/// Delete a chapter.
pub async fn delete_chapter(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(chapter_id): Path<String>,
) -> Result<Json<MessageResponse>> {
    let user = state.authenticate(&headers)?;
    let (chapter, _) = state.chapter_with_access(&chapter_id, &user)?;

    state.db.delete_chapter(&chapter.id)?;
    state.db.update_book_stats(&chapter.book_id)?;
    Ok(MessageResponse::new("Chapter deleted"))
}

/// Give chapters the order of the listed IDs.
///
/// IDs of other books are counted but left untouched.
pub async fn reorder_chapters(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(book_id): Path<String>,
    Json(chapter_ids): Json<Vec<String>>,
) -> Result<Json<ReorderResponse>> {
    let user = state.authenticate(&headers)?;
    let book = state.owned_book(&book_id, &user)?;

    for (index, chapter_id) in chapter_ids.iter().enumerate() {
        state
            .db
            .set_chapter_order(&book.id, chapter_id, index as i64 * 10)?;
    }
    state.db.update_book_stats(&book.id)?;

    Ok(Json(ReorderResponse {
        reordered: chapter_ids.len(),
    }))
}

/// Replace a chapter's tags.
pub async fn update_tags(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(chapter_id): Path<String>,
    Json(tags): Json<Vec<String>>,
) -> Result<Json<TagsResponse>> {
    let user = state.authenticate(&headers)?;
    let (chapter, _) = state.chapter_with_access(&chapter_id, &user)?;

    state.db.set_chapter_tags(&chapter.id, &tags)?;
    Ok(Json(TagsResponse { tags }))
}

// ============================================================================
// VERSIONS API
// ============================================================================

/// Snapshot a chapter's current content.
pub async fn save_version(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(chapter_id): Path<String>,
) -> Result<Json<ChapterVersion>> {
    let user = state.authenticate(&headers)?;
    let (chapter, _) = state.chapter_with_access(&chapter_id, &user)?;

    let version = ChapterVersion {
        id: uuid::Uuid::new_v4().to_string(),
        chapter_id: chapter.id,
        content: chapter.content,
        word_count: chapter.word_count,
        created_at: db::now_timestamp(),
    };

    state.db.save_version(&version, MAX_VERSIONS)?;
    Ok(Json(version))
}

/// List a chapter's versions, newest first.
pub async fn list_versions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(chapter_id): Path<String>,
) -> Result<Json<Vec<ChapterVersion>>> {
    let user = state.authenticate(&headers)?;
    let (chapter, _) = state.chapter_with_access(&chapter_id, &user)?;
    Ok(Json(state.db.list_versions(&chapter.id)?))
}

/// Copy a version's content back into its chapter.
pub async fn restore_version(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((chapter_id, version_id)): Path<(String, String)>,
) -> Result<Json<Chapter>> {
    let user = state.authenticate(&headers)?;
    let (chapter, _) = state.chapter_with_access(&chapter_id, &user)?;

    let version = state
        .db
        .get_version(&version_id, &chapter.id)?
        .ok_or_else(|| AppError::NotFound("Version".to_string()))?;

    state.db.restore_chapter_content(&chapter.id, &version)?;
    state.db.update_book_stats(&chapter.book_id)?;

    let restored = state
        .db
        .get_chapter(&chapter.id)?
        .ok_or_else(|| AppError::NotFound("Chapter".to_string()))?;
    Ok(Json(restored))
}

// ============================================================================
// SIGNATURES API
// ============================================================================

/// New signature.
#[derive(Debug, Deserialize)]
pub struct CreateSignatureRequest {
    name: String,
    data: String,
}

/// Save a signature.
pub async fn create_signature(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateSignatureRequest>,
) -> Result<Json<Signature>> {
    let user = state.authenticate(&headers)?;
    if req.data.trim().is_empty() {
        return Err(AppError::Validation("Signature data required".to_string()));
    }

    let signature = Signature {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: user.id,
        name: req.name,
        data: req.data,
        created_at: db::now_timestamp(),
    };

    state.db.create_signature(&signature)?;
    tracing::info!(signature_id = %signature.id, user_id = %signature.user_id, "Signature saved");
    Ok(Json(signature))
}

/// List the caller's signatures.
pub async fn list_signatures(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Signature>>> {
    let user = state.authenticate(&headers)?;
    Ok(Json(state.db.list_signatures(&user.id, MAX_SIGNATURES)?))
}

/// Delete a signature.
pub async fn delete_signature(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(signature_id): Path<String>,
) -> Result<Json<MessageResponse>> {
    let user = state.authenticate(&headers)?;
    if !state.db.delete_signature(&signature_id, &user.id)? {
        return Err(AppError::NotFound("Signature".to_string()));
    }
    Ok(MessageResponse::new("Signature deleted"))
}

// ============================================================================
// IMPORT API
// ============================================================================

/// Parsed sections.
#[derive(Debug, Serialize)]
pub struct SectionsResponse {
    sections: Vec<Section>,
    count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
}

/// Chapters stored by a single-file import.
#[derive(Debug, Serialize)]
pub struct ImportResponse {
    imported: usize,
    chapters: Vec<String>,
}

/// Per-file batch report.
#[derive(Debug, Serialize)]
pub struct BatchResponse {
    results: Vec<BatchEntry>,
    total: usize,
}

/// Chapters stored by a batch import.
#[derive(Debug, Serialize)]
pub struct BatchImportResponse {
    imported: usize,
    chapters: Vec<CreatedChapter>,
}

/// URL import request.
#[derive(Debug, Deserialize)]
pub struct UrlImportRequest {
    #[serde(default)]
    url: String,
}

/// Editor content.
#[derive(Debug, Deserialize)]
pub struct ContentRequest {
    #[serde(default)]
    content: String,
}

/// Collect the uploaded files of a multipart body.
async fn read_uploads(multipart: &mut Multipart) -> Result<Vec<UploadedFile>> {
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read upload: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name != "file" && name != "files" {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read file data: {}", e)))?;

        tracing::debug!(filename = %filename, size = data.len(), "Received upload");
        files.push(UploadedFile {
            filename,
            data: data.to_vec(),
        });
    }

    Ok(files)
}

async fn read_single_upload(multipart: &mut Multipart) -> Result<UploadedFile> {
    read_uploads(multipart)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Validation("No file uploaded".to_string()))
}

/// Preview the sections of an uploaded document.
pub async fn import_docx(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<SectionsResponse>> {
    state.authenticate(&headers)?;
    let file = read_single_upload(&mut multipart).await?;

    let sections = import::parse_upload(&file)?;
    Ok(Json(SectionsResponse {
        count: sections.len(),
        sections,
        source: None,
    }))
}

/// Import an uploaded document into a book.
pub async fn import_into_book(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(book_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<ImportResponse>> {
    let user = state.authenticate(&headers)?;
    let book = state.owned_book(&book_id, &user)?;
    let file = read_single_upload(&mut multipart).await?;

    let sections = import::parse_upload(&file)?;
    let created = import::import_sections_into_book(&state.db, &book.id, &sections)?;

    tracing::info!(book_id = %book.id, filename = %file.filename, chapters = created.len(), "Document imported");
    Ok(Json(ImportResponse {
        imported: created.len(),
        chapters: created.into_iter().map(|c| c.id).collect(),
    }))
}

/// Preview several uploaded documents.
pub async fn import_batch(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<BatchResponse>> {
    state.authenticate(&headers)?;
    let files = read_uploads(&mut multipart).await?;

    let results = import::preview_batch(&files);
    Ok(Json(BatchResponse {
        total: results.len(),
        results,
    }))
}

/// Import several uploaded documents into a book.
pub async fn batch_import_into_book(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(book_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<BatchImportResponse>> {
    let user = state.authenticate(&headers)?;
    let book = state.owned_book(&book_id, &user)?;
    let files = read_uploads(&mut multipart).await?;

    let created = import::import_batch_into_book(&state.db, &book.id, &files)?;
    tracing::info!(book_id = %book.id, files = files.len(), chapters = created.len(), "Batch imported");

    Ok(Json(BatchImportResponse {
        imported: created.len(),
        chapters: created,
    }))
}

/// Fetch a remote document and preview its sections.
pub async fn import_url(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<UrlImportRequest>,
) -> Result<Json<SectionsResponse>> {
    state.authenticate(&headers)?;
    if req.url.trim().is_empty() {
        return Err(AppError::Validation("URL required".to_string()));
    }

    let source_url = import::resolve_source_url(req.url.trim())?;
    let fetched = state.fetcher.fetch(&source_url).await?;
    let sections = import::sections_from_payload(&fetched)?;

    Ok(Json(SectionsResponse {
        count: sections.len(),
        sections,
        source: Some(source_url),
    }))
}

/// Clean pasted content.
pub async fn smart_paste(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ContentRequest>,
) -> Result<Json<PasteResult>> {
    state.authenticate(&headers)?;
    Ok(Json(import::smart_paste(&req.content)?))
}

// ============================================================================
// AI API
// ============================================================================

/// Suggestion request.
#[derive(Debug, Deserialize)]
pub struct AiRequest {
    prompt: String,
    #[serde(default)]
    context: String,
    #[serde(rename = "type", default = "default_prompt_type")]
    prompt_type: String,
}

fn default_prompt_type() -> String {
    PromptKind::Content.as_str().to_string()
}

/// Suggestion result.
#[derive(Debug, Serialize)]
pub struct AiResponse {
    result: String,
    #[serde(rename = "type")]
    prompt_type: String,
}

/// Structure detection request.
#[derive(Debug, Deserialize)]
pub struct DetectStructureRequest {
    #[serde(default)]
    content: String,
    #[serde(default)]
    split_by: String,
}

/// Detected sections.
#[derive(Debug, Serialize)]
pub struct DetectStructureResponse {
    chapters: Vec<SplitSection>,
    count: usize,
}

/// Ask the writing assistant for a suggestion.
///
/// Provider failures produce a placeholder result and do not use quota.
pub async fn ai_suggest(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<AiRequest>,
) -> Result<Json<AiResponse>> {
    let user = state.authenticate(&headers)?;
    usage::check_limit(&state.db, &state.config.tiers, &user, UsageKind::Ai)?;

    let kind = PromptKind::from_name(&req.prompt_type);
    let prompt = kind.build_prompt(&req.prompt, &req.context);

    let result = match state.ai.complete(&prompt).await {
        Ok(text) => {
            usage::increment(&state.db, &user.id, UsageKind::Ai)?;
            tracing::info!(user_id = %user.id, kind = kind.as_str(), prompt_len = prompt.len(), "AI usage");
            text
        }
        Err(e) => {
            tracing::warn!(user_id = %user.id, error = %e, "AI suggestion unavailable");
            ai::placeholder(&e)
        }
    };

    Ok(Json(AiResponse {
        result,
        prompt_type: req.prompt_type,
    }))
}

/// Suggest a next step for the editor content.
pub async fn ai_analyze(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ContentRequest>,
) -> Result<Json<AnalysisOutcome>> {
    state.authenticate(&headers)?;
    Ok(Json(suggest_for_content(&req.content)))
}

/// Split text into sections by chapter, part or heading markers.
pub async fn ai_detect_structure(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<DetectStructureRequest>,
) -> Result<Json<DetectStructureResponse>> {
    state.authenticate(&headers)?;

    let chapters = smart_split(&req.content, SplitStrategy::from_name(&req.split_by));
    Ok(Json(DetectStructureResponse {
        count: chapters.len(),
        chapters,
    }))
}

// ============================================================================
// EXPORT API
// ============================================================================

/// Export request.
#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    book_id: String,
    #[serde(default)]
    format: String,
    #[serde(flatten)]
    options: ExportOptions,
}

/// Export with the format named in the body.
pub async fn export_book(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ExportRequest>,
) -> Result<Json<ExportArtifact>> {
    let user = state.authenticate(&headers)?;
    run_export(&state, &user, &req.format, &req.book_id, req.options).await
}

/// Export with the format named in the path.
pub async fn export_book_as(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(format): Path<String>,
    Json(req): Json<ExportRequest>,
) -> Result<Json<ExportArtifact>> {
    let user = state.authenticate(&headers)?;
    run_export(&state, &user, &format, &req.book_id, req.options).await
}

async fn run_export(
    state: &AppState,
    user: &User,
    format_name: &str,
    book_id: &str,
    options: ExportOptions,
) -> Result<Json<ExportArtifact>> {
    let format = ExportFormat::from_name(format_name)
        .ok_or_else(|| AppError::Validation("Unsupported format".to_string()))?;

    usage::check_limit(&state.db, &state.config.tiers, user, UsageKind::Export)?;
    let book = state.owned_book(book_id, user)?;
    let chapters = state.db.list_chapters(&book.id)?;

    let book_id = book.id.clone();
    let artifact = tokio::task::spawn_blocking(move || {
        export::export_book(format, &options, &book, &chapters)
    })
    .await
    .map_err(|e| AppError::Internal(format!("Export task failed: {}", e)))??;

    usage::increment(&state.db, &user.id, UsageKind::Export)?;
    tracing::info!(user_id = %user.id, format = format.extension(), book_id = %book_id, "Export");

    Ok(Json(artifact))
}

// ============================================================================
// ACCOUNT API
// ============================================================================

/// Search query.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    q: String,
}

/// Search results.
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    books: Vec<Book>,
    chapters: Vec<ChapterSummary>,
}

/// Current month's usage.
pub async fn subscription_usage(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UsageReport>> {
    let user = state.authenticate(&headers)?;
    Ok(Json(usage::report(&state.db, &state.config.tiers, &user)?))
}

/// Search the caller's books and chapters.
pub async fn search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>> {
    let user = state.authenticate(&headers)?;
    if query.q.trim().is_empty() {
        return Err(AppError::Validation("Query required".to_string()));
    }

    Ok(Json(SearchResponse {
        books: state.db.search_books(&user.id, &query.q)?,
        chapters: state.db.search_chapters(&user.id, &query.q)?,
    }))
}

/// Totals across the caller's books.
pub async fn stats(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<UserStats>> {
    let user = state.authenticate(&headers)?;
    Ok(Json(state.db.user_stats(&user.id)?))
}

// ============================================================================
// ROYALTY CALCULATOR
// ============================================================================

/// Royalty calculator input.
#[derive(Debug, Deserialize)]
pub struct RoyaltyRequest {
    #[serde(default = "default_book_price")]
    book_price: f64,
    #[serde(default = "default_page_count")]
    page_count: f64,
}

fn default_book_price() -> f64 {
    9.99
}

fn default_page_count() -> f64 {
    200.0
}

/// Royalty of one sales channel.
#[derive(Debug, Serialize, PartialEq)]
pub struct PlatformRoyalty {
    name: &'static str,
    royalty: f64,
}

/// Royalties per sales channel.
#[derive(Debug, Serialize, PartialEq)]
pub struct Platforms {
    amazon_kdp_ebook: PlatformRoyalty,
    amazon_kdp_print: PlatformRoyalty,
    apple_books: PlatformRoyalty,
    kobo: PlatformRoyalty,
    google_play: PlatformRoyalty,
}

/// Royalty estimate.
#[derive(Debug, Serialize, PartialEq)]
pub struct RoyaltyResponse {
    platforms: Platforms,
    print_cost: f64,
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn calculate_royalties(price: f64, pages: f64) -> RoyaltyResponse {
    let print_cost = 0.85 + pages * 0.012;
    let ebook = |name: &'static str| PlatformRoyalty {
        name,
        royalty: round_cents(price * 0.7),
    };

    RoyaltyResponse {
        platforms: Platforms {
            amazon_kdp_ebook: ebook("Amazon KDP (eBook)"),
            amazon_kdp_print: PlatformRoyalty {
                name: "Amazon KDP (Print)",
                royalty: round_cents(((price - print_cost) * 0.6).max(0.0)),
            },
            apple_books: ebook("Apple Books"),
            kobo: ebook("Kobo"),
            google_play: ebook("Google Play"),
        },
        print_cost: round_cents(print_cost),
    }
}

/// Estimate royalties per sales channel.
pub async fn calculator_royalties(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RoyaltyRequest>,
) -> Result<Json<RoyaltyResponse>> {
    state.authenticate(&headers)?;
    Ok(Json(calculate_royalties(req.book_price, req.page_count)))
}

// ============================================================================
// HEALTH
// ============================================================================

/// Health status.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    timestamp: String,
}

/// Liveness probe.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
