use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Routes for any signed-in caller, whatever the role. The router is wrapped in the
/// authentication layer, so handlers always receive a verified `AuthUser`.
///
/// `/articles/{article}` shares its segment name with the public routes: the same
/// path position must use one parameter name across merged routers.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /api/auth/me
        .route("/auth/me", get(handlers::get_me))
        // POST /api/articles/{id}/comments
        .route("/articles/{article}/comments", post(handlers::add_comment))
        // POST /api/articles/{id}/like
        // Toggle: a second call by the same user removes the like.
        .route("/articles/{article}/like", post(handlers::toggle_like))
}
