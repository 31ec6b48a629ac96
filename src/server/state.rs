//! Application state shared across handlers.

use crate::ai::AiClient;
use crate::auth::AuthService;
use crate::config::Config;
use crate::db::{Book, Chapter, Database, User};
use crate::error::{AppError, Result};
use crate::import::RemoteFetcher;
use axum::http::{HeaderMap, header};
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<Config>,
    /// Database connection.
    pub db: Database,
    /// Authentication service.
    pub auth: Arc<AuthService>,
    /// HTTP client for URL imports.
    pub fetcher: RemoteFetcher,
    /// Writing assistant client.
    pub ai: AiClient,
}

impl AppState {
    /// Create new application state with database.
    pub fn new_with_db(config: Config, db: Database, auth: AuthService) -> Result<Self> {
        let fetcher =
            RemoteFetcher::new(&config.import, config.server.max_upload_mb * 1024 * 1024)?;
        let ai = AiClient::new(&config.ai)?;

        Ok(Self {
            config: Arc::new(config),
            db,
            auth: Arc::new(auth),
            fetcher,
            ai,
        })
    }

    /// Resolve the bearer token of a request to its user.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<User> {
        let token = extract_token(headers)
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".to_string()))?;

        self.auth
            .validate_token(&token)?
            .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".to_string()))
    }

    /// A book owned by `user`. Books of other users are reported as missing.
    pub fn owned_book(&self, book_id: &str, user: &User) -> Result<Book> {
        self.db
            .get_book(book_id, &user.id)?
            .ok_or_else(|| AppError::NotFound("Book".to_string()))
    }

    /// A chapter and its book, if the book belongs to `user`.
    pub fn chapter_with_access(&self, chapter_id: &str, user: &User) -> Result<(Chapter, Book)> {
        let chapter = self
            .db
            .get_chapter(chapter_id)?
            .ok_or_else(|| AppError::NotFound("Chapter".to_string()))?;

        let book = self
            .db
            .get_book(&chapter.book_id, &user.id)?
            .ok_or(AppError::AccessDenied)?;

        Ok((chapter, book))
    }
}

/// Extract token from Authorization header.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}
