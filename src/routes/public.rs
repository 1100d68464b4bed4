use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a token. Only published content is ever returned
/// from here; drafts stay behind the admin routes.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // POST /api/auth/register
        .route("/auth/register", post(handlers::register))
        // POST /api/auth/login
        .route("/auth/login", post(handlers::login))
        // GET /api/articles?category=...&featured=...&search=...&limit=...
        .route("/articles", get(handlers::list_articles))
        // GET /api/articles/{slug}
        // Counts a view on every successful fetch.
        .route("/articles/{article}", get(handlers::get_article))
        // GET /api/articles/{id}/comments
        .route("/articles/{article}/comments", get(handlers::get_comments))
        // GET /api/videos
        .route("/videos", get(handlers::list_videos))
        // POST /api/newsletter/subscribe
        .route("/newsletter/subscribe", post(handlers::subscribe))
}
