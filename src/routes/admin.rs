use crate::{AppState, handlers};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
};

/// Admin Router Module
///
/// Content management and the dashboard. The authentication layer rejects anonymous
/// callers with 401; the role check in each handler answers 403 for everyone else.
///
/// `max_upload_bytes` bounds the multipart body of article creation.
pub fn admin_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        // GET /api/admin/stats
        .route("/stats", get(handlers::get_admin_stats))
        // GET /api/admin/articles  (drafts included)
        // POST /api/admin/articles (multipart form with optional image)
        .route(
            "/articles",
            get(handlers::get_admin_articles).post(handlers::create_article).layer(
                DefaultBodyLimit::max(max_upload_bytes),
            ),
        )
        // DELETE /api/admin/articles/{id}
        .route("/articles/{id}", delete(handlers::delete_article))
        // POST /api/admin/videos
        .route("/videos", post(handlers::create_video))
}
