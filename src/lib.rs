//! folio-rs: a multi-tenant backend for writing and publishing books.
//!
//! Authors keep books as ordered chapters of inline HTML. Manuscripts come in
//! as Word documents, pasted text or remote links and are split into typed
//! sections; books go out as HTML, plain text, Word, paginated PDF or EPUB.
//!
//! # Features
//!
//! - `.docx` import with heading-based section detection
//! - Chapter, part and heading splitting of plain text
//! - HTML, TXT, DOCX, PDF (with print trim and bleed) and EPUB 3 export
//! - Chapter version history, tags and search
//! - Subscription tiers with monthly AI and export quotas
//! - Optional AI writing suggestions over an OpenAI-compatible API

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// AI writing suggestions.
pub mod ai;
/// Authentication and user management.
pub mod auth;
/// Configuration and CLI.
pub mod config;
/// Database operations.
pub mod db;
/// Error types.
pub mod error;
/// Book exporters.
pub mod export;
/// Document parsing and text structure detection.
pub mod formats;
/// Import orchestration.
pub mod import;
/// Manuscript sections.
pub mod manuscript;
/// HTTP server.
pub mod server;
/// Subscription usage metering.
pub mod usage;


pub use config::{Cli, Command, Config};
pub use db::Database;
pub use error::{AppError, Result};
pub use server::AppState;
