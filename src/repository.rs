use crate::{
    error::{AppError, AppResult},
    listing::ArticleFilter,
    models::{
        AdminStats, Article, Comment, Like, LikeToggle, NewArticle, NewComment, NewUser,
        NewVideo, PublishStatus, Role, Subscription, User, Video,
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, query_builder::QueryBuilder};
use std::sync::Arc;

/// Repository Trait
///
/// The abstract store every business rule runs against. Implementations own id and
/// timestamp assignment, uniqueness of user and subscriber emails, and the atomicity
/// of single-resource counter updates. Everything else (validation, slug derivation,
/// defaults, denormalization) happens above this trait.
///
/// **Send + Sync + async_trait** make `Arc<dyn Repository>` shareable across Axum's
/// task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    /// Fails with `Conflict` when the email is taken.
    async fn create_user(&self, user: NewUser) -> AppResult<User>;
    async fn get_user(&self, id: i64) -> AppResult<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> AppResult<Option<User>>;

    // --- Articles ---
    async fn create_article(&self, article: NewArticle) -> AppResult<Article>;
    async fn get_article(&self, id: i64) -> AppResult<Option<Article>>;
    /// Finds the published article with `slug` (lowest id wins on duplicates) and
    /// increments its view count by one in the same step. Returns the updated article.
    async fn view_published_article(&self, slug: &str) -> AppResult<Option<Article>>;
    /// Published articles matching `filter`, newest first, ties by id ascending.
    async fn get_published_articles(&self, filter: &ArticleFilter) -> AppResult<Vec<Article>>;
    /// Every article regardless of status, in id order.
    async fn get_all_articles(&self) -> AppResult<Vec<Article>>;
    /// Removes the article with its comments and likes. `false` when absent.
    async fn delete_article(&self, id: i64) -> AppResult<bool>;

    // --- Comments & Likes ---
    /// Fails with `NotFound` when the article does not exist.
    async fn add_comment(&self, comment: NewComment) -> AppResult<Comment>;
    /// Comments of an article, oldest first.
    async fn get_comments(&self, article_id: i64) -> AppResult<Vec<Comment>>;
    /// Adds the (article, user) like if absent, removes it otherwise, and moves the
    /// article's like count by exactly one. Atomic per article.
    async fn toggle_like(&self, article_id: i64, user_id: i64) -> AppResult<LikeToggle>;
    async fn get_likes(&self, article_id: i64) -> AppResult<Vec<Like>>;

    // --- Videos ---
    async fn create_video(&self, video: NewVideo) -> AppResult<Video>;
    /// Published videos in insertion order.
    async fn get_published_videos(&self) -> AppResult<Vec<Video>>;

    // --- Newsletter ---
    /// Fails with `Conflict` when the email is already subscribed.
    async fn subscribe(&self, email: &str) -> AppResult<Subscription>;

    // --- Dashboard ---
    async fn get_stats(&self) -> AppResult<AdminStats>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

// --- Postgres ---

const USER_COLUMNS: &str = "id, name, email, password_hash, role, avatar, created_at";
const ARTICLE_COLUMNS: &str = "id, title, slug, category, content, excerpt, image, author_id, \
     status, featured, like_count, view_count, created_at, updated_at";
const COMMENT_COLUMNS: &str = "id, article_id, user_id, content, created_at, updated_at";
const VIDEO_COLUMNS: &str = "id, title, description, external_id, thumbnail, duration, \
     view_count, status, created_at";

/// PostgresRepository
///
/// The `Repository` backed by PostgreSQL. Counters are updated inside transactions
/// holding the article's row lock.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded migrations in `migrations/`.
    pub async fn migrate(&self) -> AppResult<()> {
        sqlx::migrate!()
            .run(&self.pool)
            .await
            .map_err(|e| AppError::internal(format!("migration failed: {e}")))
    }
}

// Rows whose enum columns are stored as text.

#[derive(FromRow)]
struct UserRow {
    id: i64,
    name: String,
    email: String,
    password_hash: String,
    role: String,
    avatar: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> AppResult<Self> {
        let role = Role::parse(&row.role)
            .ok_or_else(|| AppError::internal(format!("unknown role '{}'", row.role)))?;
        Ok(Self {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            role,
            avatar: row.avatar,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct ArticleRow {
    id: i64,
    title: String,
    slug: String,
    category: String,
    content: String,
    excerpt: String,
    image: Option<String>,
    author_id: i64,
    status: String,
    featured: bool,
    like_count: i64,
    view_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ArticleRow> for Article {
    type Error = AppError;

    fn try_from(row: ArticleRow) -> AppResult<Self> {
        Ok(Self {
            id: row.id,
            title: row.title,
            slug: row.slug,
            category: row.category,
            content: row.content,
            excerpt: row.excerpt,
            image: row.image,
            author_id: row.author_id,
            status: decode_status(&row.status)?,
            featured: row.featured,
            like_count: row.like_count,
            view_count: row.view_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct VideoRow {
    id: i64,
    title: String,
    description: String,
    external_id: String,
    thumbnail: String,
    duration: String,
    view_count: i64,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<VideoRow> for Video {
    type Error = AppError;

    fn try_from(row: VideoRow) -> AppResult<Self> {
        Ok(Self {
            id: row.id,
            title: row.title,
            description: row.description,
            external_id: row.external_id,
            thumbnail: row.thumbnail,
            duration: row.duration,
            view_count: row.view_count,
            status: decode_status(&row.status)?,
            created_at: row.created_at,
        })
    }
}

fn decode_status(raw: &str) -> AppResult<PublishStatus> {
    PublishStatus::parse(raw).ok_or_else(|| AppError::internal(format!("unknown status '{raw}'")))
}

fn convert_all<R, T>(rows: Vec<R>) -> AppResult<Vec<T>>
where
    T: TryFrom<R, Error = AppError>,
{
    rows.into_iter().map(T::try_from).collect()
}

/// Maps a unique violation to a `Conflict` carrying `message`.
fn unique_violation_as(err: sqlx::Error, message: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict(message.to_string())
        }
        _ => err.into(),
    }
}

/// Escapes LIKE metacharacters so a search term matches literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn create_user(&self, user: NewUser) -> AppResult<User> {
        let sql = format!(
            "INSERT INTO users (name, email, password_hash, role, avatar) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(&user.avatar)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| unique_violation_as(e, "Email already registered"))?;
        row.try_into()
    }

    async fn get_user(&self, id: i64) -> AppResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn get_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn create_article(&self, article: NewArticle) -> AppResult<Article> {
        let sql = format!(
            "INSERT INTO articles \
                (title, slug, category, content, excerpt, image, author_id, status, featured) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {ARTICLE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(&article.title)
            .bind(&article.slug)
            .bind(&article.category)
            .bind(&article.content)
            .bind(&article.excerpt)
            .bind(&article.image)
            .bind(article.author_id)
            .bind(article.status.as_str())
            .bind(article.featured)
            .fetch_one(&self.pool)
            .await?;
        row.try_into()
    }

    async fn get_article(&self, id: i64) -> AppResult<Option<Article>> {
        let sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = $1");
        sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Article::try_from)
            .transpose()
    }

    /// Lookup and increment happen in one UPDATE, so concurrent fetches never lose a view.
    async fn view_published_article(&self, slug: &str) -> AppResult<Option<Article>> {
        let sql = format!(
            "UPDATE articles SET view_count = view_count + 1 \
             WHERE id = ( \
                 SELECT id FROM articles \
                 WHERE slug = $1 AND status = 'published' \
                 ORDER BY id ASC LIMIT 1 \
             ) RETURNING {ARTICLE_COLUMNS}"
        );
        sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?
            .map(Article::try_from)
            .transpose()
    }

    /// Builds the listing query with `QueryBuilder` so every user-supplied value is bound.
    async fn get_published_articles(&self, filter: &ArticleFilter) -> AppResult<Vec<Article>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE status = 'published'"
        ));

        if let Some(category) = &filter.category {
            builder.push(" AND category = ");
            builder.push_bind(category.clone());
        }

        if filter.featured_only {
            builder.push(" AND featured = true");
        }

        if let Some(term) = filter.search_term() {
            let pattern = format!("%{}%", escape_like(term));
            builder.push(" AND (title ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR content ILIKE ");
            builder.push_bind(pattern);
            builder.push(")");
        }

        builder.push(" ORDER BY created_at DESC, id ASC");

        if let Some(limit) = filter.limit {
            builder.push(" LIMIT ");
            builder.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let rows = builder
            .build_query_as::<ArticleRow>()
            .fetch_all(&self.pool)
            .await?;
        convert_all(rows)
    }

    async fn get_all_articles(&self) -> AppResult<Vec<Article>> {
        let sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles ORDER BY id ASC");
        let rows = sqlx::query_as::<_, ArticleRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        convert_all(rows)
    }

    /// Comments and likes go with it through `ON DELETE CASCADE`.
    async fn delete_article(&self, id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM articles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// The existence check and the insert are one statement.
    async fn add_comment(&self, comment: NewComment) -> AppResult<Comment> {
        let sql = format!(
            "INSERT INTO comments (article_id, user_id, content) \
             SELECT $1, $2, $3 WHERE EXISTS (SELECT 1 FROM articles WHERE id = $1) \
             RETURNING {COMMENT_COLUMNS}"
        );
        sqlx::query_as::<_, Comment>(&sql)
            .bind(comment.article_id)
            .bind(comment.user_id)
            .bind(&comment.content)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found("Article"))
    }

    async fn get_comments(&self, article_id: i64) -> AppResult<Vec<Comment>> {
        let sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE article_id = $1 \
             ORDER BY created_at ASC, id ASC"
        );
        Ok(sqlx::query_as::<_, Comment>(&sql)
            .bind(article_id)
            .fetch_all(&self.pool)
            .await?)
    }

    /// The article row lock (`FOR UPDATE`) is the exclusion unit: concurrent toggles
    /// on the same article queue behind it, so the like row and the counter always
    /// move together.
    async fn toggle_like(&self, article_id: i64, user_id: i64) -> AppResult<LikeToggle> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<i64> =
            sqlx::query_scalar("SELECT id FROM articles WHERE id = $1 FOR UPDATE")
                .bind(article_id)
                .fetch_optional(&mut *tx)
                .await?;

        if locked.is_none() {
            return Err(AppError::not_found("Article"));
        }

        let removed = sqlx::query("DELETE FROM likes WHERE article_id = $1 AND user_id = $2")
            .bind(article_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        if !removed {
            sqlx::query("INSERT INTO likes (article_id, user_id) VALUES ($1, $2)")
                .bind(article_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        let delta: i64 = if removed { -1 } else { 1 };
        let like_count: i64 = sqlx::query_scalar(
            "UPDATE articles SET like_count = like_count + $2 WHERE id = $1 RETURNING like_count",
        )
        .bind(article_id)
        .bind(delta)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(LikeToggle {
            liked: !removed,
            like_count,
        })
    }

    async fn get_likes(&self, article_id: i64) -> AppResult<Vec<Like>> {
        Ok(sqlx::query_as::<_, Like>(
            "SELECT id, article_id, user_id, created_at FROM likes \
             WHERE article_id = $1 ORDER BY id ASC",
        )
        .bind(article_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn create_video(&self, video: NewVideo) -> AppResult<Video> {
        let sql = format!(
            "INSERT INTO videos (title, description, external_id, thumbnail, duration, status) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {VIDEO_COLUMNS}"
        );
        let row = sqlx::query_as::<_, VideoRow>(&sql)
            .bind(&video.title)
            .bind(&video.description)
            .bind(&video.external_id)
            .bind(&video.thumbnail)
            .bind(&video.duration)
            .bind(video.status.as_str())
            .fetch_one(&self.pool)
            .await?;
        row.try_into()
    }

    async fn get_published_videos(&self) -> AppResult<Vec<Video>> {
        let sql = format!(
            "SELECT {VIDEO_COLUMNS} FROM videos WHERE status = 'published' ORDER BY id ASC"
        );
        let rows = sqlx::query_as::<_, VideoRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        convert_all(rows)
    }

    async fn subscribe(&self, email: &str) -> AppResult<Subscription> {
        sqlx::query_as::<_, Subscription>(
            "INSERT INTO newsletter_subscriptions (email) VALUES ($1) \
             RETURNING id, email, created_at",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation_as(e, "Email already subscribed"))
    }

    /// Compiles all dashboard counters in a single round trip.
    async fn get_stats(&self) -> AppResult<AdminStats> {
        Ok(sqlx::query_as::<_, AdminStats>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM articles) AS article_count,
                (SELECT COUNT(*) FROM articles WHERE status = 'published') AS published_count,
                (SELECT COUNT(*) FROM users) AS user_count,
                (SELECT COUNT(*) FROM comments) AS comment_count,
                (SELECT COALESCE(SUM(view_count), 0)::BIGINT FROM articles) AS total_views,
                (SELECT COALESCE(SUM(like_count), 0)::BIGINT FROM articles) AS total_likes,
                (SELECT COUNT(*) FROM newsletter_subscriptions) AS subscriber_count
            "#,
        )
        .fetch_one(&self.pool)
        .await?)
    }
}
