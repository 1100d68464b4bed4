//! Business rules for articles, comments, likes, videos and the newsletter.
//!
//! Everything here validates and derives, then delegates persistence to the
//! injected [`Repository`].

use crate::{
    error::{AppError, AppResult},
    identity::normalize_email,
    listing::{with_author, with_commenters},
    models::{
        AdminStats, Article, ArticleForm, ArticleView, CommentView, CreateCommentRequest,
        CreateVideoRequest, ImageUpload, LikeToggle, NewArticle, NewComment, NewVideo,
        PublishStatus, Subscription, Video,
    },
    repository::Repository,
    storage::{StorageService, generate_blob_name},
};

// --- Articles ---

/// slugify
///
/// Lowercases the title, drops everything but ASCII letters, digits, whitespace and
/// hyphens, then joins the remaining words with single hyphens. Existing hyphens
/// are kept as they are.
pub fn slugify(title: &str) -> String {
    let kept: String = title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace() || *c == '-')
        .collect();

    kept.split_whitespace().collect::<Vec<_>>().join("-")
}

/// Form checkbox semantics: `true`, `1` or `on`, case-insensitive.
pub fn coerce_featured(raw: Option<&str>) -> bool {
    raw.map(str::trim).is_some_and(|v| {
        v.eq_ignore_ascii_case("true") || v == "1" || v.eq_ignore_ascii_case("on")
    })
}

fn parse_status(raw: Option<&str>, default: PublishStatus) -> AppResult<PublishStatus> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(default),
        Some(s) => PublishStatus::parse(&s.to_ascii_lowercase())
            .ok_or_else(|| AppError::validation("Status must be 'draft' or 'published'")),
    }
}

/// Tokens outlive accounts (an in-memory store is wiped on restart, ids get reused),
/// so every write on behalf of a user re-checks that the account exists.
async fn require_user(repo: &dyn Repository, user_id: i64) -> AppResult<()> {
    match repo.get_user(user_id).await? {
        Some(_) => Ok(()),
        None => {
            tracing::warn!(user_id, "write rejected: account no longer exists");
            Err(AppError::not_found("User"))
        }
    }
}

fn required(value: Option<String>, message: &str) -> AppResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::validation(message))
}

/// create_article
///
/// Validates the submitted form, stores the image (when one was sent) and creates
/// the article with zeroed counters.
///
/// The blob is written before the row, and the storage backends have no delete:
/// if the insert fails afterwards the blob stays behind unreferenced. Every check
/// that can reject the request runs before the upload to keep that window small.
///
/// # Errors
/// `Validation` for a blank title, category or content, a title without any
/// letter or digit, an unknown status, or a non-image upload. `NotFound` when the
/// author account does not exist. Storage failures surface as `Internal`.
pub async fn create_article(
    repo: &dyn Repository,
    storage: &dyn StorageService,
    author_id: i64,
    form: ArticleForm,
) -> AppResult<Article> {
    let title = required(form.title, "Title is required")?;
    let slug = slugify(&title);
    if slug.is_empty() {
        return Err(AppError::validation(
            "Title must contain at least one letter or digit",
        ));
    }

    let category = required(form.category, "Category is required")?;
    let content = required(form.content, "Content is required")?;
    let status = parse_status(form.status.as_deref(), PublishStatus::Draft)?;
    let featured = coerce_featured(form.featured.as_deref());
    require_user(repo, author_id).await?;

    let image = match form.image {
        Some(upload) if !upload.bytes.is_empty() => Some(store_image(storage, upload).await?),
        _ => None,
    };

    let article = repo
        .create_article(NewArticle {
            title,
            slug,
            category,
            content,
            excerpt: form.excerpt.unwrap_or_default().trim().to_string(),
            image,
            author_id,
            status,
            featured,
        })
        .await?;

    tracing::info!(article_id = article.id, slug = %article.slug, "article created");
    Ok(article)
}

async fn store_image(storage: &dyn StorageService, upload: ImageUpload) -> AppResult<String> {
    let content_type = upload
        .content_type
        .filter(|ct| ct.starts_with("image/"))
        .ok_or_else(|| AppError::validation("Only image uploads are allowed"))?;

    let name = generate_blob_name(upload.file_name.as_deref());
    storage.store_blob(&name, &content_type, upload.bytes).await
}

/// Removes the article together with its comments and likes.
pub async fn delete_article(repo: &dyn Repository, id: i64) -> AppResult<()> {
    if !repo.delete_article(id).await? {
        return Err(AppError::not_found("Article"));
    }

    tracing::info!(article_id = id, "article deleted");
    Ok(())
}

/// get_article_by_slug
///
/// Public fetch of a published article. Counts one view per successful call; an
/// unknown slug (or one only used by drafts) changes nothing.
pub async fn get_article_by_slug(repo: &dyn Repository, slug: &str) -> AppResult<ArticleView> {
    let article = repo
        .view_published_article(slug)
        .await?
        .ok_or_else(|| AppError::not_found("Article"))?;

    with_author(repo, article).await
}

// --- Comments & Likes ---

pub async fn add_comment(
    repo: &dyn Repository,
    article_id: i64,
    user_id: i64,
    req: CreateCommentRequest,
) -> AppResult<CommentView> {
    let content = required(req.content, "Comment content is required")?;
    require_user(repo, user_id).await?;

    let comment = repo
        .add_comment(NewComment {
            article_id,
            user_id,
            content,
        })
        .await?;

    tracing::info!(comment_id = comment.id, article_id, user_id, "comment added");

    let mut views = with_commenters(repo, vec![comment]).await?;
    views
        .pop()
        .ok_or_else(|| AppError::internal("comment vanished during denormalization"))
}

/// Comments of an existing article, oldest first, with commenter display fields.
pub async fn list_comments(repo: &dyn Repository, article_id: i64) -> AppResult<Vec<CommentView>> {
    if repo.get_article(article_id).await?.is_none() {
        return Err(AppError::not_found("Article"));
    }

    let comments = repo.get_comments(article_id).await?;
    with_commenters(repo, comments).await
}

pub async fn toggle_like(repo: &dyn Repository, article_id: i64, user_id: i64) -> AppResult<LikeToggle> {
    require_user(repo, user_id).await?;
    let outcome = repo.toggle_like(article_id, user_id).await?;
    tracing::debug!(article_id, user_id, liked = outcome.liked, likes = outcome.like_count, "like toggled");
    Ok(outcome)
}

// --- Videos ---

/// Thumbnail URL derived from a YouTube video id.
pub fn thumbnail_for(external_id: &str) -> String {
    format!("https://img.youtube.com/vi/{external_id}/maxresdefault.jpg")
}

fn is_valid_external_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// create_video
///
/// The external id ends up inside the thumbnail URL, so it is restricted to
/// `[A-Za-z0-9_-]`. Status defaults to published.
pub async fn create_video(repo: &dyn Repository, req: CreateVideoRequest) -> AppResult<Video> {
    let title = required(req.title, "Title is required")?;
    let external_id = required(req.external_id, "Video id is required")?;
    if !is_valid_external_id(&external_id) {
        return Err(AppError::validation("Video id may only contain letters, digits, '-' and '_'"));
    }

    let video = repo
        .create_video(NewVideo {
            title,
            description: req.description.unwrap_or_default().trim().to_string(),
            thumbnail: thumbnail_for(&external_id),
            external_id,
            duration: req.duration.unwrap_or_default().trim().to_string(),
            status: req.status.unwrap_or(PublishStatus::Published),
        })
        .await?;

    tracing::info!(video_id = video.id, "video created");
    Ok(video)
}

// --- Newsletter ---

/// Shape check only: one `@`, non-empty local part, a dotted domain, no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain
            .split('.')
            .filter(|label| !label.is_empty())
            .count()
            >= 2
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

pub async fn subscribe(repo: &dyn Repository, email: Option<String>) -> AppResult<Subscription> {
    let email = normalize_email(&required(email, "Email is required")?);
    if !is_valid_email(&email) {
        return Err(AppError::validation("Invalid email address"));
    }

    let subscription = repo.subscribe(&email).await?;
    tracing::info!(subscription_id = subscription.id, "newsletter subscription added");
    Ok(subscription)
}

/// Dashboard counters, computed from live state.
pub async fn compute_stats(repo: &dyn Repository) -> AppResult<AdminStats> {
    repo.get_stats().await
}
