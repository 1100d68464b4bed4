use crate::{
    AppState,
    auth::AuthUser,
    content,
    error::{AppError, AppResult},
    guard::{self, Action},
    identity,
    listing::{self, ArticleFilter},
    models::{
        AdminStats, Article, ArticleForm, ArticleView, AuthResponse, CommentView,
        CreateCommentRequest, CreateVideoRequest, ImageUpload, LikeToggle, LoginRequest,
        MessageResponse, PublicUser, RegisterRequest, SubscribeRequest, Video,
    },
};
use axum::{
    Json,
    extract::{FromRequest, Multipart, Path, Query, State, multipart::MultipartRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};

// --- Extractors ---

/// ApiJson
///
/// `axum::Json` whose rejection is an [`AppError`], so malformed or mistyped bodies
/// get the same `{"error": ...}` shape as every other failure.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// ArticleQuery
///
/// Query parameters of the public article listing (GET /api/articles). Kept as raw
/// strings and converted by [`ArticleQuery::into_filter`] so a bad value is a
/// readable 400.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct ArticleQuery {
    /// Exact category, e.g. `Reviews`.
    pub category: Option<String>,
    /// `true` or `1` restricts the listing to featured articles.
    pub featured: Option<String>,
    /// Case-insensitive substring of the title or content.
    pub search: Option<String>,
    /// Maximum number of articles returned.
    pub limit: Option<String>,
}

impl ArticleQuery {
    pub fn into_filter(self) -> AppResult<ArticleFilter> {
        let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());

        let featured_only = non_empty(self.featured)
            .is_some_and(|v| v.eq_ignore_ascii_case("true") || v == "1");

        let limit = match non_empty(self.limit) {
            Some(raw) => Some(
                raw.trim()
                    .parse::<usize>()
                    .map_err(|_| AppError::validation("limit must be a non-negative integer"))?,
            ),
            None => None,
        };

        Ok(ArticleFilter {
            category: non_empty(self.category),
            featured_only,
            search: non_empty(self.search),
            limit,
        })
    }
}

/// Numeric article ids. Anything else cannot name an article.
fn parse_id(raw: &str) -> AppResult<i64> {
    raw.parse::<i64>().map_err(|_| AppError::not_found("Article"))
}

// --- Service ---

/// index
///
/// Service name, version and a map of the main endpoints.
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "API index"))
)]
pub async fn index() -> Json<Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "articles": "/api/articles",
            "auth": "/api/auth/login",
            "videos": "/api/videos",
            "newsletter": "/api/newsletter/subscribe",
            "admin": "/api/admin/stats",
            "docs": "/swagger-ui"
        }
    }))
}

// --- Identity ---

/// register
///
/// [Public Route] Creates a `user` account and returns a session token with the
/// public profile.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = AuthResponse),
        (status = 400, description = "Missing fields or email already registered")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> AppResult<impl IntoResponse> {
    let response = identity::register(state.repo.as_ref(), &state.config, payload).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// login
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let response = identity::login(state.repo.as_ref(), &state.config, payload).await?;
    Ok(Json(response))
}

/// get_me
///
/// [Authenticated Route] The caller's profile. Fails with 404 if the account behind
/// a still-valid token is gone.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Profile", body = PublicUser),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "User no longer exists")
    )
)]
pub async fn get_me(user: AuthUser, State(state): State<AppState>) -> AppResult<Json<PublicUser>> {
    guard::authorize_user(&user, Action::ReadOwnProfile)?;
    Ok(Json(identity::current_user(state.repo.as_ref(), user.id).await?))
}

// --- Articles ---

/// list_articles
///
/// [Public Route] Published articles, newest first, with author display fields.
#[utoipa::path(
    get,
    path = "/api/articles",
    params(ArticleQuery),
    responses(
        (status = 200, description = "Published articles", body = [ArticleView]),
        (status = 400, description = "Invalid limit")
    )
)]
pub async fn list_articles(
    State(state): State<AppState>,
    Query(query): Query<ArticleQuery>,
) -> AppResult<Json<Vec<ArticleView>>> {
    guard::authorize(None, Action::ListArticles)?;
    let filter = query.into_filter()?;
    Ok(Json(listing::list_articles(state.repo.as_ref(), &filter).await?))
}

/// get_article
///
/// [Public Route] A published article by slug. Each successful call counts a view.
#[utoipa::path(
    get,
    path = "/api/articles/{article}",
    params(("article" = String, Path, description = "Article slug")),
    responses(
        (status = 200, description = "Found", body = ArticleView),
        (status = 404, description = "No published article with this slug")
    )
)]
pub async fn get_article(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<ArticleView>> {
    guard::authorize(None, Action::ReadArticle)?;
    Ok(Json(content::get_article_by_slug(state.repo.as_ref(), &slug).await?))
}

// --- Comments & Likes ---

#[utoipa::path(
    get,
    path = "/api/articles/{article}/comments",
    params(("article" = i64, Path, description = "Article ID")),
    responses(
        (status = 200, description = "Comments, oldest first", body = [CommentView]),
        (status = 404, description = "Article not found")
    )
)]
pub async fn get_comments(
    State(state): State<AppState>,
    Path(article): Path<String>,
) -> AppResult<Json<Vec<CommentView>>> {
    guard::authorize(None, Action::ListComments)?;
    let article_id = parse_id(&article)?;
    Ok(Json(content::list_comments(state.repo.as_ref(), article_id).await?))
}

/// add_comment
///
/// [Authenticated Route] Posts a comment as the caller.
#[utoipa::path(
    post,
    path = "/api/articles/{article}/comments",
    params(("article" = i64, Path, description = "Article ID")),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment added", body = CommentView),
        (status = 400, description = "Empty content"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Article not found")
    )
)]
pub async fn add_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path(article): Path<String>,
    ApiJson(payload): ApiJson<CreateCommentRequest>,
) -> AppResult<impl IntoResponse> {
    guard::authorize_user(&user, Action::CreateComment)?;
    let article_id = parse_id(&article)?;
    let comment = content::add_comment(state.repo.as_ref(), article_id, user.id, payload).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// toggle_like
///
/// [Authenticated Route] Likes the article, or removes the caller's like if present.
#[utoipa::path(
    post,
    path = "/api/articles/{article}/like",
    params(("article" = i64, Path, description = "Article ID")),
    responses(
        (status = 200, description = "New like state", body = LikeToggle),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Article not found")
    )
)]
pub async fn toggle_like(
    user: AuthUser,
    State(state): State<AppState>,
    Path(article): Path<String>,
) -> AppResult<Json<LikeToggle>> {
    guard::authorize_user(&user, Action::ToggleLike)?;
    let article_id = parse_id(&article)?;
    Ok(Json(content::toggle_like(state.repo.as_ref(), article_id, user.id).await?))
}

// --- Uploads ---

/// serve_upload
///
/// Streams a stored image for storage backends without a local directory (the S3
/// bucket). Local disk uploads are served by `ServeDir` instead.
#[utoipa::path(
    get,
    path = "/uploads/{key}",
    params(("key" = String, Path, description = "Generated file name")),
    responses(
        (status = 200, description = "Image bytes"),
        (status = 404, description = "No such file")
    )
)]
pub async fn serve_upload(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> AppResult<Response> {
    let blob = state
        .storage
        .fetch_blob(&key)
        .await?
        .ok_or_else(|| AppError::not_found("File"))?;

    Ok((
        [
            (header::CONTENT_TYPE, blob.content_type),
            (header::CACHE_CONTROL, "public, max-age=86400".to_string()),
        ],
        blob.bytes,
    )
        .into_response())
}

// --- Videos & Newsletter ---

#[utoipa::path(
    get,
    path = "/api/videos",
    responses((status = 200, description = "Published videos", body = [Video]))
)]
pub async fn list_videos(State(state): State<AppState>) -> AppResult<Json<Vec<Video>>> {
    guard::authorize(None, Action::ListVideos)?;
    Ok(Json(listing::list_videos(state.repo.as_ref()).await?))
}

#[utoipa::path(
    post,
    path = "/api/newsletter/subscribe",
    request_body = SubscribeRequest,
    responses(
        (status = 200, description = "Subscribed", body = MessageResponse),
        (status = 400, description = "Missing, malformed or already subscribed email")
    )
)]
pub async fn subscribe(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<SubscribeRequest>,
) -> AppResult<Json<MessageResponse>> {
    guard::authorize(None, Action::SubscribeNewsletter)?;
    content::subscribe(state.repo.as_ref(), payload.email).await?;
    Ok(Json(MessageResponse::new("Subscribed to the newsletter")))
}

// --- Admin ---

/// create_article
///
/// [Admin Route] Creates an article from a `multipart/form-data` body. The optional
/// `image` part is stored through the configured storage backend.
#[utoipa::path(
    post,
    path = "/api/admin/articles",
    request_body(content = ArticleForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Article created", body = Article),
        (status = 400, description = "Invalid form"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Administrators only"),
        (status = 413, description = "Body over the upload limit"),
        (status = 500, description = "Image could not be stored")
    )
)]
pub async fn create_article(
    user: AuthUser,
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<impl IntoResponse> {
    // Role first, so non-admins never get as far as body parsing.
    guard::authorize_user(&user, Action::CreateArticle)?;
    let form = read_article_form(multipart?).await?;

    let article =
        content::create_article(state.repo.as_ref(), state.storage.as_ref(), user.id, form).await?;
    Ok((StatusCode::CREATED, Json(article)))
}

/// Collects the known fields of the article form. Unknown parts are skipped.
async fn read_article_form(mut multipart: Multipart) -> AppResult<ArticleForm> {
    let mut form = ArticleForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "image" => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?.to_vec();
                form.image = Some(ImageUpload {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            "title" => form.title = Some(field.text().await?),
            "category" => form.category = Some(field.text().await?),
            "content" => form.content = Some(field.text().await?),
            "excerpt" => form.excerpt = Some(field.text().await?),
            "status" => form.status = Some(field.text().await?),
            "featured" => form.featured = Some(field.text().await?),
            other => tracing::debug!(field = other, "ignoring unknown form field"),
        }
    }

    Ok(form)
}

/// delete_article
///
/// [Admin Route] Removes an article with its comments and likes.
#[utoipa::path(
    delete,
    path = "/api/admin/articles/{id}",
    params(("id" = i64, Path, description = "Article ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Administrators only"),
        (status = 404, description = "Article not found")
    )
)]
pub async fn delete_article(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    guard::authorize_user(&user, Action::DeleteArticle)?;
    content::delete_article(state.repo.as_ref(), parse_id(&id)?).await?;
    Ok(Json(MessageResponse::new("Article deleted")))
}

/// get_admin_articles
///
/// [Admin Route] Every article including drafts, in creation order.
#[utoipa::path(
    get,
    path = "/api/admin/articles",
    responses(
        (status = 200, description = "All articles", body = [ArticleView]),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Administrators only")
    )
)]
pub async fn get_admin_articles(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<ArticleView>>> {
    guard::authorize_user(&user, Action::ListAllArticlesAdmin)?;
    Ok(Json(listing::list_all_articles(state.repo.as_ref()).await?))
}

#[utoipa::path(
    post,
    path = "/api/admin/videos",
    request_body = CreateVideoRequest,
    responses(
        (status = 201, description = "Video created", body = Video),
        (status = 400, description = "Missing title or invalid video id"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Administrators only")
    )
)]
pub async fn create_video(
    user: AuthUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateVideoRequest>,
) -> AppResult<impl IntoResponse> {
    guard::authorize_user(&user, Action::CreateVideo)?;
    let video = content::create_video(state.repo.as_ref(), payload).await?;
    Ok((StatusCode::CREATED, Json(video)))
}

/// get_admin_stats
///
/// [Admin Route] Dashboard counters computed from live state.
#[utoipa::path(
    get,
    path = "/api/admin/stats",
    responses(
        (status = 200, description = "Dashboard counters", body = AdminStats),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Administrators only")
    )
)]
pub async fn get_admin_stats(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<AdminStats>> {
    guard::authorize_user(&user, Action::ViewAdminStats)?;
    Ok(Json(content::compute_stats(state.repo.as_ref()).await?))
}
