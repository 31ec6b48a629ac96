mod schema;

pub use schema::Database;

use crate::manuscript::SectionType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique user ID.
    pub id: String,
    /// Email used for login.
    pub email: String,
    /// Argon2 password hash.
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Display name.
    pub name: String,
    /// Subscription tier name.
    pub subscription_tier: String,
    /// Account creation timestamp.
    pub created_at: i64,
    /// Last login timestamp.
    pub last_login: Option<i64>,
}

/// Authentication session.
#[derive(Debug, Clone)]
pub struct Session {
    /// Session token.
    pub token: String,
    /// User ID.
    pub user_id: String,
    /// Expiration timestamp.
    pub expires_at: i64,
}

/// A book owned by one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    /// Book ID.
    pub id: String,
    /// Owner user ID.
    pub user_id: String,
    /// Book title.
    pub title: String,
    /// Book description.
    pub description: String,
    /// Genre.
    pub genre: String,
    /// Cover image as a data URL.
    pub cover_data: Option<String>,
    /// Number of chapters (derived).
    pub chapter_count: i64,
    /// Sum of chapter word counts (derived).
    pub word_count: i64,
    /// Creation timestamp.
    pub created_at: i64,
    /// Last update timestamp.
    pub updated_at: i64,
}

/// A chapter of a book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chapter {
    /// Chapter ID.
    pub id: String,
    /// Book ID.
    pub book_id: String,
    /// Chapter title.
    pub title: String,
    /// Inline HTML content.
    pub content: String,
    /// Section classification.
    #[serde(rename = "type")]
    pub chapter_type: SectionType,
    /// Sort key, spaced by 10.
    pub order: i64,
    /// Word count of the content (derived).
    pub word_count: i64,
    /// Free-form tags.
    pub tags: Vec<String>,
    /// Creation timestamp.
    pub created_at: i64,
    /// Last update timestamp.
    pub updated_at: i64,
}

/// Chapter listing without content, used in search results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterSummary {
    /// Chapter ID.
    pub id: String,
    /// Book ID.
    pub book_id: String,
    /// Chapter title.
    pub title: String,
    /// Section classification.
    #[serde(rename = "type")]
    pub chapter_type: SectionType,
    /// Sort key.
    pub order: i64,
    /// Word count.
    pub word_count: i64,
    /// Tags.
    pub tags: Vec<String>,
}

/// Field changes applied to a chapter. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct ChapterChanges {
    /// New title.
    pub title: Option<String>,
    /// New content; the word count is recomputed from it.
    pub content: Option<String>,
    /// New type.
    pub chapter_type: Option<SectionType>,
    /// New sort key.
    pub order: Option<i64>,
}

/// Snapshot of a chapter's content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterVersion {
    /// Version ID.
    pub id: String,
    /// Chapter ID.
    pub chapter_id: String,
    /// Content at snapshot time.
    pub content: String,
    /// Word count at snapshot time.
    pub word_count: i64,
    /// Snapshot timestamp.
    pub created_at: i64,
}

/// Per-user usage counters for one month.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageRecord {
    /// AI suggestion calls.
    pub ai_calls: i64,
    /// Exports.
    pub exports: i64,
}

/// Totals across a user's books.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserStats {
    /// Number of books.
    pub total_books: i64,
    /// Sum of book word counts.
    pub total_words: i64,
    /// Sum of book chapter counts.
    pub total_chapters: i64,
}

/// A saved signature image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signature {
    /// Signature ID.
    pub id: String,
    /// Owner.
    pub user_id: String,
    /// Display name.
    pub name: String,
    /// Image data as sent by the client, typically a data URL.
    pub data: String,
    /// Creation timestamp.
    pub created_at: i64,
}

/// Timestamp helper.
pub fn now_timestamp() -> i64 {
    Utc::now().timestamp()
}

/// Convert timestamp to DateTime.
pub fn timestamp_to_datetime(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_else(Utc::now)
}
