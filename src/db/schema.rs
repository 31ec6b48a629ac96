use crate::db::*;
use crate::error::{AppError, Result};
use crate::usage::UsageKind;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Arc;

const BOOK_COLUMNS: &str = "id, user_id, title, description, genre, cover_data, chapter_count, \
                            word_count, created_at, updated_at";

const CHAPTER_COLUMNS: &str = "id, book_id, title, content, chapter_type, sort_order, word_count, \
                               tags_json, created_at, updated_at";

/// Maximum rows returned by a search.
const SEARCH_LIMIT: i64 = 50;

/// Database wrapper for thread-safe access.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| AppError::Database(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_schema()?;
        Ok(db)
    }

    /// Open in-memory database (for testing).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Database(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_schema()?;
        Ok(db)
    }

    /// Initialize database schema.
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            -- Users table
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                name TEXT NOT NULL,
                subscription_tier TEXT NOT NULL DEFAULT 'free',
                created_at INTEGER NOT NULL,
                last_login INTEGER
            );

            -- Sessions table
            CREATE TABLE IF NOT EXISTS sessions (
                token TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                expires_at INTEGER NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            -- Books table
            CREATE TABLE IF NOT EXISTS books (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                genre TEXT NOT NULL DEFAULT '',
                cover_data TEXT,
                chapter_count INTEGER NOT NULL DEFAULT 0,
                word_count INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            -- Chapters table
            CREATE TABLE IF NOT EXISTS chapters (
                id TEXT PRIMARY KEY,
                book_id TEXT NOT NULL,
                title TEXT NOT NULL,
                content TEXT NOT NULL DEFAULT '',
                chapter_type TEXT NOT NULL DEFAULT 'chapter',
                sort_order INTEGER NOT NULL DEFAULT 0,
                word_count INTEGER NOT NULL DEFAULT 0,
                tags_json TEXT NOT NULL DEFAULT '[]',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE CASCADE
            );

            -- Chapter version snapshots
            CREATE TABLE IF NOT EXISTS chapter_versions (
                id TEXT PRIMARY KEY,
                chapter_id TEXT NOT NULL,
                content TEXT NOT NULL,
                word_count INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                FOREIGN KEY (chapter_id) REFERENCES chapters(id) ON DELETE CASCADE
            );

            -- Monthly usage counters
            CREATE TABLE IF NOT EXISTS usage (
                user_id TEXT NOT NULL,
                month TEXT NOT NULL,
                ai_calls INTEGER NOT NULL DEFAULT 0,
                exports INTEGER NOT NULL DEFAULT 0,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (user_id, month),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            -- Saved signatures
            CREATE TABLE IF NOT EXISTS signatures (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                name TEXT NOT NULL,
                data TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_books_user ON books(user_id);
            CREATE INDEX IF NOT EXISTS idx_chapters_book ON chapters(book_id, sort_order);
            CREATE INDEX IF NOT EXISTS idx_versions_chapter ON chapter_versions(chapter_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_signatures_user ON signatures(user_id, created_at);
            "#,
        )
        .map_err(|e| AppError::Database(format!("Failed to initialize schema: {}", e)))?;

        Ok(())
    }

    // ========== USER OPERATIONS ==========

    /// Create a new user.
    pub fn create_user(&self, user: &User) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO users (id, email, password_hash, name, subscription_tier, created_at, last_login)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                user.id,
                user.email,
                user.password_hash,
                user.name,
                user.subscription_tier,
                user.created_at,
                user.last_login,
            ],
        )
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint") {
                AppError::Validation(format!("Email '{}' is already registered", user.email))
            } else {
                AppError::Database(format!("Failed to create user: {}", e))
            }
        })?;
        Ok(())
    }

    /// Get user by email.
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, email, password_hash, name, subscription_tier, created_at, last_login
             FROM users WHERE email = ?1",
            params![email],
            Self::row_to_user,
        )
        .optional()
        .map_err(|e| AppError::Database(format!("Failed to get user: {}", e)))
    }

    /// Get user by ID.
    pub fn get_user_by_id(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, email, password_hash, name, subscription_tier, created_at, last_login
             FROM users WHERE id = ?1",
            params![id],
            Self::row_to_user,
        )
        .optional()
        .map_err(|e| AppError::Database(format!("Failed to get user: {}", e)))
    }

    /// List all users.
    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, email, password_hash, name, subscription_tier, created_at, last_login
                 FROM users ORDER BY email",
            )
            .map_err(|e| AppError::Database(format!("Failed to prepare query: {}", e)))?;

        let users = stmt
            .query_map([], Self::row_to_user)
            .map_err(|e| AppError::Database(format!("Failed to list users: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Database(format!("Failed to collect users: {}", e)))?;

        Ok(users)
    }

    fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get(0)?,
            email: row.get(1)?,
            password_hash: row.get(2)?,
            name: row.get(3)?,
            subscription_tier: row.get(4)?,
            created_at: row.get(5)?,
            last_login: row.get(6)?,
        })
    }

    /// Update user password.
    pub fn update_user_password(&self, email: &str, password_hash: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "UPDATE users SET password_hash = ?1 WHERE email = ?2",
                params![password_hash, email],
            )
            .map_err(|e| AppError::Database(format!("Failed to update password: {}", e)))?;
        Ok(rows > 0)
    }

    /// Update user subscription tier.
    pub fn update_user_tier(&self, email: &str, tier: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "UPDATE users SET subscription_tier = ?1 WHERE email = ?2",
                params![tier, email],
            )
            .map_err(|e| AppError::Database(format!("Failed to update tier: {}", e)))?;
        Ok(rows > 0)
    }

    /// Update user last login.
    pub fn update_user_last_login(&self, user_id: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE users SET last_login = ?1 WHERE id = ?2",
            params![now_timestamp(), user_id],
        )
        .map_err(|e| AppError::Database(format!("Failed to update last login: {}", e)))?;
        Ok(())
    }

    /// Delete user and everything they own.
    pub fn delete_user(&self, email: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute("DELETE FROM users WHERE email = ?1", params![email])
            .map_err(|e| AppError::Database(format!("Failed to delete user: {}", e)))?;
        Ok(rows > 0)
    }

    // ========== SESSION OPERATIONS ==========

    /// Create session.
    pub fn create_session(&self, session: &Session) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO sessions (token, user_id, expires_at) VALUES (?1, ?2, ?3)",
            params![session.token, session.user_id, session.expires_at],
        )
        .map_err(|e| AppError::Database(format!("Failed to create session: {}", e)))?;
        Ok(())
    }

    /// Get session by token.
    pub fn get_session(&self, token: &str) -> Result<Option<Session>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT token, user_id, expires_at FROM sessions WHERE token = ?1",
            params![token],
            |row| {
                Ok(Session {
                    token: row.get(0)?,
                    user_id: row.get(1)?,
                    expires_at: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(|e| AppError::Database(format!("Failed to get session: {}", e)))
    }

    /// Delete session.
    pub fn delete_session(&self, token: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])
            .map_err(|e| AppError::Database(format!("Failed to delete session: {}", e)))?;
        Ok(())
    }

    /// Cleanup expired sessions.
    pub fn cleanup_expired_sessions(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "DELETE FROM sessions WHERE expires_at < ?1",
                params![now_timestamp()],
            )
            .map_err(|e| AppError::Database(format!("Failed to cleanup sessions: {}", e)))?;
        Ok(rows)
    }

    // ========== BOOK OPERATIONS ==========

    /// Insert a new book.
    pub fn create_book(&self, book: &Book) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            &format!(
                "INSERT INTO books ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                BOOK_COLUMNS
            ),
            params![
                book.id,
                book.user_id,
                book.title,
                book.description,
                book.genre,
                book.cover_data,
                book.chapter_count,
                book.word_count,
                book.created_at,
                book.updated_at,
            ],
        )
        .map_err(|e| AppError::Database(format!("Failed to create book: {}", e)))?;
        Ok(())
    }

    /// Get a book owned by the given user.
    pub fn get_book(&self, id: &str, user_id: &str) -> Result<Option<Book>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!(
                "SELECT {} FROM books WHERE id = ?1 AND user_id = ?2",
                BOOK_COLUMNS
            ),
            params![id, user_id],
            Self::row_to_book,
        )
        .optional()
        .map_err(|e| AppError::Database(format!("Failed to get book: {}", e)))
    }

    /// List a user's books, most recently updated first.
    pub fn list_books(&self, user_id: &str) -> Result<Vec<Book>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM books WHERE user_id = ?1 ORDER BY updated_at DESC, title",
                BOOK_COLUMNS
            ))
            .map_err(|e| AppError::Database(format!("Failed to prepare query: {}", e)))?;

        let books = stmt
            .query_map(params![user_id], Self::row_to_book)
            .map_err(|e| AppError::Database(format!("Failed to list books: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Database(format!("Failed to collect books: {}", e)))?;

        Ok(books)
    }

    /// Write back a book's editable fields.
    pub fn update_book(&self, book: &Book) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "UPDATE books SET title = ?1, description = ?2, genre = ?3, cover_data = ?4,
                        updated_at = ?5
                 WHERE id = ?6 AND user_id = ?7",
                params![
                    book.title,
                    book.description,
                    book.genre,
                    book.cover_data,
                    now_timestamp(),
                    book.id,
                    book.user_id,
                ],
            )
            .map_err(|e| AppError::Database(format!("Failed to update book: {}", e)))?;
        Ok(rows > 0)
    }

    /// Delete a book and its chapters.
    pub fn delete_book(&self, id: &str, user_id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "DELETE FROM books WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
            )
            .map_err(|e| AppError::Database(format!("Failed to delete book: {}", e)))?;

        if rows > 0 {
            conn.execute("DELETE FROM chapters WHERE book_id = ?1", params![id])
                .map_err(|e| AppError::Database(format!("Failed to delete chapters: {}", e)))?;
        }
        Ok(rows > 0)
    }

    /// Recompute a book's chapter count and word count from its chapters.
    pub fn update_book_stats(&self, book_id: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE books SET
                chapter_count = (SELECT COUNT(*) FROM chapters WHERE book_id = ?1),
                word_count = (SELECT COALESCE(SUM(word_count), 0) FROM chapters WHERE book_id = ?1),
                updated_at = ?2
             WHERE id = ?1",
            params![book_id, now_timestamp()],
        )
        .map_err(|e| AppError::Database(format!("Failed to update book stats: {}", e)))?;
        Ok(())
    }

    fn row_to_book(row: &rusqlite::Row<'_>) -> rusqlite::Result<Book> {
        Ok(Book {
            id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            genre: row.get(4)?,
            cover_data: row.get(5)?,
            chapter_count: row.get(6)?,
            word_count: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    // ========== CHAPTER OPERATIONS ==========

    /// Insert a chapter.
    pub fn insert_chapter(&self, chapter: &Chapter) -> Result<()> {
        let tags_json = serde_json::to_string(&chapter.tags)
            .map_err(|e| AppError::Internal(format!("Failed to encode tags: {}", e)))?;

        let conn = self.conn.lock();
        conn.execute(
            &format!(
                "INSERT INTO chapters ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                CHAPTER_COLUMNS
            ),
            params![
                chapter.id,
                chapter.book_id,
                chapter.title,
                chapter.content,
                chapter.chapter_type.as_str(),
                chapter.order,
                chapter.word_count,
                tags_json,
                chapter.created_at,
                chapter.updated_at,
            ],
        )
        .map_err(|e| AppError::Database(format!("Failed to insert chapter: {}", e)))?;
        Ok(())
    }

    /// Get a chapter by ID.
    pub fn get_chapter(&self, id: &str) -> Result<Option<Chapter>> {
        let conn = self.conn.lock();
        Self::fetch_chapter(&conn, id)
    }

    fn fetch_chapter(conn: &Connection, id: &str) -> Result<Option<Chapter>> {
        conn.query_row(
            &format!("SELECT {} FROM chapters WHERE id = ?1", CHAPTER_COLUMNS),
            params![id],
            Self::row_to_chapter,
        )
        .optional()
        .map_err(|e| AppError::Database(format!("Failed to get chapter: {}", e)))
    }

    /// List a book's chapters in reading order.
    pub fn list_chapters(&self, book_id: &str) -> Result<Vec<Chapter>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM chapters WHERE book_id = ?1 ORDER BY sort_order, rowid",
                CHAPTER_COLUMNS
            ))
            .map_err(|e| AppError::Database(format!("Failed to prepare query: {}", e)))?;

        let chapters = stmt
            .query_map(params![book_id], Self::row_to_chapter)
            .map_err(|e| AppError::Database(format!("Failed to list chapters: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Database(format!("Failed to collect chapters: {}", e)))?;

        Ok(chapters)
    }

    /// Count a book's chapters.
    pub fn count_chapters(&self, book_id: &str) -> Result<i64> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT COUNT(*) FROM chapters WHERE book_id = ?1",
            params![book_id],
            |row| row.get(0),
        )
        .map_err(|e| AppError::Database(format!("Failed to count chapters: {}", e)))
    }

    /// Apply field changes to a chapter and return the updated row.
    ///
    /// When the content changes, its word count is recomputed.
    pub fn update_chapter(&self, id: &str, changes: &ChapterChanges) -> Result<Option<Chapter>> {
        let conn = self.conn.lock();
        let Some(mut chapter) = Self::fetch_chapter(&conn, id)? else {
            return Ok(None);
        };

        if let Some(title) = &changes.title {
            chapter.title = title.clone();
        }
        if let Some(content) = &changes.content {
            chapter.content = content.clone();
            chapter.word_count = crate::manuscript::count_words(content);
        }
        if let Some(chapter_type) = changes.chapter_type {
            chapter.chapter_type = chapter_type;
        }
        if let Some(order) = changes.order {
            chapter.order = order;
        }
        chapter.updated_at = now_timestamp();

        conn.execute(
            "UPDATE chapters SET title = ?1, content = ?2, chapter_type = ?3, sort_order = ?4,
                    word_count = ?5, updated_at = ?6
             WHERE id = ?7",
            params![
                chapter.title,
                chapter.content,
                chapter.chapter_type.as_str(),
                chapter.order,
                chapter.word_count,
                chapter.updated_at,
                chapter.id,
            ],
        )
        .map_err(|e| AppError::Database(format!("Failed to update chapter: {}", e)))?;

        Ok(Some(chapter))
    }

    /// Overwrite a chapter's content and word count as stored in a snapshot.
    pub fn restore_chapter_content(&self, id: &str, version: &ChapterVersion) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "UPDATE chapters SET content = ?1, word_count = ?2, updated_at = ?3 WHERE id = ?4",
                params![version.content, version.word_count, now_timestamp(), id],
            )
            .map_err(|e| AppError::Database(format!("Failed to restore chapter: {}", e)))?;
        Ok(rows > 0)
    }

    /// Set the sort key of a chapter, only if it belongs to the book.
    pub fn set_chapter_order(&self, book_id: &str, chapter_id: &str, order: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "UPDATE chapters SET sort_order = ?1, updated_at = ?2 WHERE id = ?3 AND book_id = ?4",
                params![order, now_timestamp(), chapter_id, book_id],
            )
            .map_err(|e| AppError::Database(format!("Failed to reorder chapter: {}", e)))?;
        Ok(rows > 0)
    }

    /// Replace a chapter's tags.
    pub fn set_chapter_tags(&self, id: &str, tags: &[String]) -> Result<bool> {
        let tags_json = serde_json::to_string(tags)
            .map_err(|e| AppError::Internal(format!("Failed to encode tags: {}", e)))?;

        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "UPDATE chapters SET tags_json = ?1, updated_at = ?2 WHERE id = ?3",
                params![tags_json, now_timestamp(), id],
            )
            .map_err(|e| AppError::Database(format!("Failed to update tags: {}", e)))?;
        Ok(rows > 0)
    }

    /// Delete a chapter.
    pub fn delete_chapter(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute("DELETE FROM chapters WHERE id = ?1", params![id])
            .map_err(|e| AppError::Database(format!("Failed to delete chapter: {}", e)))?;
        Ok(rows > 0)
    }

    /// Delete all chapters of a book.
    pub fn delete_chapters_by_book(&self, book_id: &str) -> Result<usize> {
        let conn = self.conn.lock();
        let rows = conn
            .execute("DELETE FROM chapters WHERE book_id = ?1", params![book_id])
            .map_err(|e| AppError::Database(format!("Failed to delete chapters: {}", e)))?;
        Ok(rows)
    }

    fn row_to_chapter(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chapter> {
        let chapter_type: String = row.get(4)?;
        let tags_json: String = row.get(7)?;
        Ok(Chapter {
            id: row.get(0)?,
            book_id: row.get(1)?,
            title: row.get(2)?,
            content: row.get(3)?,
            chapter_type: crate::manuscript::SectionType::from_name(&chapter_type),
            order: row.get(5)?,
            word_count: row.get(6)?,
            tags: serde_json::from_str(&tags_json).unwrap_or_default(),
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    // ========== VERSION OPERATIONS ==========

    /// Store a snapshot and prune all but the `keep` newest for the chapter.
    pub fn save_version(&self, version: &ChapterVersion, keep: usize) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO chapter_versions (id, chapter_id, content, word_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                version.id,
                version.chapter_id,
                version.content,
                version.word_count,
                version.created_at,
            ],
        )
        .map_err(|e| AppError::Database(format!("Failed to save version: {}", e)))?;

        conn.execute(
            "DELETE FROM chapter_versions
             WHERE chapter_id = ?1 AND id NOT IN (
                SELECT id FROM chapter_versions WHERE chapter_id = ?1
                ORDER BY created_at DESC, rowid DESC LIMIT ?2
             )",
            params![version.chapter_id, keep as i64],
        )
        .map_err(|e| AppError::Database(format!("Failed to prune versions: {}", e)))?;

        Ok(())
    }

    /// List a chapter's snapshots, newest first.
    pub fn list_versions(&self, chapter_id: &str) -> Result<Vec<ChapterVersion>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, chapter_id, content, word_count, created_at
                 FROM chapter_versions WHERE chapter_id = ?1
                 ORDER BY created_at DESC, rowid DESC",
            )
            .map_err(|e| AppError::Database(format!("Failed to prepare query: {}", e)))?;

        let versions = stmt
            .query_map(params![chapter_id], Self::row_to_version)
            .map_err(|e| AppError::Database(format!("Failed to list versions: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Database(format!("Failed to collect versions: {}", e)))?;

        Ok(versions)
    }

    /// Get one snapshot of a chapter.
    pub fn get_version(&self, id: &str, chapter_id: &str) -> Result<Option<ChapterVersion>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, chapter_id, content, word_count, created_at
             FROM chapter_versions WHERE id = ?1 AND chapter_id = ?2",
            params![id, chapter_id],
            Self::row_to_version,
        )
        .optional()
        .map_err(|e| AppError::Database(format!("Failed to get version: {}", e)))
    }

    fn row_to_version(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChapterVersion> {
        Ok(ChapterVersion {
            id: row.get(0)?,
            chapter_id: row.get(1)?,
            content: row.get(2)?,
            word_count: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    // ========== USAGE OPERATIONS ==========

    /// Usage counters of a user for a month key.
    pub fn get_usage(&self, user_id: &str, month: &str) -> Result<UsageRecord> {
        let conn = self.conn.lock();
        let usage = conn
            .query_row(
                "SELECT ai_calls, exports FROM usage WHERE user_id = ?1 AND month = ?2",
                params![user_id, month],
                |row| {
                    Ok(UsageRecord {
                        ai_calls: row.get(0)?,
                        exports: row.get(1)?,
                    })
                },
            )
            .optional()
            .map_err(|e| AppError::Database(format!("Failed to get usage: {}", e)))?;

        Ok(usage.unwrap_or_default())
    }

    /// Add one to a usage counter, creating the month row if needed.
    pub fn increment_usage(&self, user_id: &str, month: &str, kind: UsageKind) -> Result<()> {
        let (ai_calls, exports) = match kind {
            UsageKind::Ai => (1, 0),
            UsageKind::Export => (0, 1),
        };

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO usage (user_id, month, ai_calls, exports, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (user_id, month) DO UPDATE SET
                ai_calls = ai_calls + excluded.ai_calls,
                exports = exports + excluded.exports,
                updated_at = excluded.updated_at",
            params![user_id, month, ai_calls, exports, now_timestamp()],
        )
        .map_err(|e| AppError::Database(format!("Failed to increment usage: {}", e)))?;
        Ok(())
    }

    // ========== SEARCH & STATS ==========

    /// Books of a user whose title or description contains the query.
    pub fn search_books(&self, user_id: &str, query: &str) -> Result<Vec<Book>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM books
                 WHERE user_id = ?1
                   AND (title LIKE ?2 ESCAPE '\\' OR description LIKE ?2 ESCAPE '\\')
                 ORDER BY updated_at DESC LIMIT ?3",
                BOOK_COLUMNS
            ))
            .map_err(|e| AppError::Database(format!("Failed to prepare query: {}", e)))?;

        let books = stmt
            .query_map(
                params![user_id, like_pattern(query), SEARCH_LIMIT],
                Self::row_to_book,
            )
            .map_err(|e| AppError::Database(format!("Failed to search books: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Database(format!("Failed to collect books: {}", e)))?;

        Ok(books)
    }

    /// Chapters of a user's books matching the query by title, content or exact tag.
    pub fn search_chapters(&self, user_id: &str, query: &str) -> Result<Vec<ChapterSummary>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT c.id, c.book_id, c.title, c.chapter_type, c.sort_order, c.word_count,
                        c.tags_json
                 FROM chapters c JOIN books b ON b.id = c.book_id
                 WHERE b.user_id = ?1
                   AND (c.title LIKE ?2 ESCAPE '\\'
                        OR c.content LIKE ?2 ESCAPE '\\'
                        OR EXISTS (SELECT 1 FROM json_each(c.tags_json) WHERE json_each.value = ?3))
                 ORDER BY c.book_id, c.sort_order LIMIT ?4",
            )
            .map_err(|e| AppError::Database(format!("Failed to prepare query: {}", e)))?;

        let chapters = stmt
            .query_map(
                params![user_id, like_pattern(query), query, SEARCH_LIMIT],
                |row| {
                    let chapter_type: String = row.get(3)?;
                    let tags_json: String = row.get(6)?;
                    Ok(ChapterSummary {
                        id: row.get(0)?,
                        book_id: row.get(1)?,
                        title: row.get(2)?,
                        chapter_type: crate::manuscript::SectionType::from_name(&chapter_type),
                        order: row.get(4)?,
                        word_count: row.get(5)?,
                        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
                    })
                },
            )
            .map_err(|e| AppError::Database(format!("Failed to search chapters: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Database(format!("Failed to collect chapters: {}", e)))?;

        Ok(chapters)
    }

    /// Totals across a user's books.
    pub fn user_stats(&self, user_id: &str) -> Result<UserStats> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(word_count), 0), COALESCE(SUM(chapter_count), 0)
             FROM books WHERE user_id = ?1",
            params![user_id],
            |row| {
                Ok(UserStats {
                    total_books: row.get(0)?,
                    total_words: row.get(1)?,
                    total_chapters: row.get(2)?,
                })
            },
        )
        .map_err(|e| AppError::Database(format!("Failed to get stats: {}", e)))
    }

    // ========== SIGNATURE OPERATIONS ==========

    /// Store a signature.
    pub fn create_signature(&self, signature: &Signature) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO signatures (id, user_id, name, data, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                signature.id,
                signature.user_id,
                signature.name,
                signature.data,
                signature.created_at,
            ],
        )
        .map_err(|e| AppError::Database(format!("Failed to create signature: {}", e)))?;
        Ok(())
    }

    /// List up to `limit` of a user's signatures, oldest first.
    pub fn list_signatures(&self, user_id: &str, limit: i64) -> Result<Vec<Signature>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, name, data, created_at
                 FROM signatures WHERE user_id = ?1
                 ORDER BY created_at, rowid LIMIT ?2",
            )
            .map_err(|e| AppError::Database(format!("Failed to prepare query: {}", e)))?;

        let signatures = stmt
            .query_map(params![user_id, limit], |row| {
                Ok(Signature {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    name: row.get(2)?,
                    data: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })
            .map_err(|e| AppError::Database(format!("Failed to list signatures: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Database(format!("Failed to collect signatures: {}", e)))?;

        Ok(signatures)
    }

    /// Delete one of a user's signatures. Returns false when the user has no
    /// signature with that ID.
    pub fn delete_signature(&self, id: &str, user_id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "DELETE FROM signatures WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
            )
            .map_err(|e| AppError::Database(format!("Failed to delete signature: {}", e)))?;
        Ok(rows > 0)
    }

    /// Run raw SQL on the connection.
    #[cfg(test)]
    pub(crate) fn execute_batch(&self, sql: &str) -> rusqlite::Result<()> {
        self.conn.lock().execute_batch(sql)
    }
}

/// Build a `LIKE` pattern matching the query as a literal substring.
fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}
