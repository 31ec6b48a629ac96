//! HTTP server and routes.

mod handlers;
mod state;

pub use state::AppState;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let upload_limit = state.config.server.max_upload_mb * 1024 * 1024;

    let auth_routes = Router::new()
        .route("/register", post(handlers::auth_register))
        .route("/login", post(handlers::auth_login))
        .route("/logout", post(handlers::auth_logout))
        .route("/me", get(handlers::auth_me))
        .route("/password", put(handlers::auth_change_password));

    let book_routes = Router::new()
        .route("/", post(handlers::create_book).get(handlers::list_books))
        .route(
            "/{id}",
            get(handlers::get_book)
                .put(handlers::update_book)
                .delete(handlers::delete_book),
        )
        .route(
            "/{id}/chapters",
            post(handlers::create_chapter).get(handlers::list_chapters),
        )
        .route("/{id}/reorder-chapters", put(handlers::reorder_chapters))
        .route("/{id}/import", post(handlers::import_into_book))
        .route("/{id}/batch-import", post(handlers::batch_import_into_book));

    let chapter_routes = Router::new()
        .route(
            "/{id}",
            put(handlers::update_chapter).delete(handlers::delete_chapter),
        )
        .route("/{id}/tags", put(handlers::update_tags))
        .route(
            "/{id}/versions",
            post(handlers::save_version).get(handlers::list_versions),
        )
        .route(
            "/{id}/versions/{version_id}/restore",
            post(handlers::restore_version),
        );

    let import_routes = Router::new()
        .route("/docx", post(handlers::import_docx))
        .route("/batch", post(handlers::import_batch))
        .route("/url", post(handlers::import_url))
        .route("/smart-paste", post(handlers::smart_paste));

    let ai_routes = Router::new()
        .route("/suggest", post(handlers::ai_suggest))
        .route("/analyze", post(handlers::ai_analyze))
        .route("/detect-structure", post(handlers::ai_detect_structure));

    let api_routes = Router::new()
        .route("/export", post(handlers::export_book))
        .route("/export/{format}", post(handlers::export_book_as))
        .route(
            "/signatures",
            post(handlers::create_signature).get(handlers::list_signatures),
        )
        .route("/signatures/{id}", delete(handlers::delete_signature))
        .route("/subscription/usage", get(handlers::subscription_usage))
        .route("/search", get(handlers::search))
        .route("/stats", get(handlers::stats))
        .route("/calculator/royalties", post(handlers::calculator_royalties))
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/books", book_routes)
        .nest("/api/chapters", chapter_routes)
        .nest("/api/import", import_routes)
        .nest("/api/ai", ai_routes)
        .nest("/api", api_routes)
        .layer(DefaultBodyLimit::max(upload_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
