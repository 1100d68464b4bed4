use crate::{
    error::{AppError, AppResult},
    listing::ArticleFilter,
    models::{
        AdminStats, Article, Comment, Like, LikeToggle, NewArticle, NewComment, NewUser,
        NewVideo, PublishStatus, Subscription, User, Video,
    },
    repository::Repository,
};
use async_trait::async_trait;
use chrono::Utc;
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::{
        Arc,
        atomic::{AtomicI64, Ordering},
    },
};
use tokio::sync::{Mutex, RwLock};

/// MemoryRepository
///
/// The `Repository` used when no database is configured, and by the test suite.
///
/// Each table sits behind its own `RwLock`. An article and its likes share one
/// `Mutex`, which makes that mutex the exclusion unit for like toggles and view
/// increments: the counters can only move together with the rows they count.
///
/// Lock order is articles, then comments. Per-article mutexes are only taken while
/// the articles table guard is held.
#[derive(Default)]
pub struct MemoryRepository {
    users: RwLock<UserTable>,
    articles: RwLock<ArticleTable>,
    comments: RwLock<CommentTable>,
    videos: RwLock<VideoTable>,
    subscriptions: RwLock<SubscriptionTable>,
    like_ids: AtomicI64,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Default)]
struct UserTable {
    last_id: i64,
    by_id: BTreeMap<i64, User>,
    by_email: HashMap<String, i64>,
}

struct ArticleEntry {
    article: Article,
    // Keyed by user id, at most one like per user.
    likes: HashMap<i64, Like>,
}

type SharedEntry = Arc<Mutex<ArticleEntry>>;

#[derive(Default)]
struct ArticleTable {
    last_id: i64,
    by_id: BTreeMap<i64, SharedEntry>,
    by_slug: HashMap<String, BTreeSet<i64>>,
}

impl ArticleTable {
    fn entry(&self, id: i64) -> Option<SharedEntry> {
        self.by_id.get(&id).cloned()
    }

    async fn snapshot(&self) -> Vec<Article> {
        let mut articles = Vec::with_capacity(self.by_id.len());
        for entry in self.by_id.values() {
            articles.push(entry.lock().await.article.clone());
        }
        articles
    }
}

#[derive(Default)]
struct CommentTable {
    last_id: i64,
    // Per article, in insertion order.
    by_article: HashMap<i64, Vec<Comment>>,
}

#[derive(Default)]
struct VideoTable {
    last_id: i64,
    rows: Vec<Video>,
}

#[derive(Default)]
struct SubscriptionTable {
    last_id: i64,
    by_email: HashMap<String, Subscription>,
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn create_user(&self, user: NewUser) -> AppResult<User> {
        let mut table = self.users.write().await;

        if table.by_email.contains_key(&user.email) {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        table.last_id += 1;
        let record = User {
            id: table.last_id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            avatar: user.avatar,
            created_at: Utc::now(),
        };

        table.by_email.insert(record.email.clone(), record.id);
        table.by_id.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_user(&self, id: i64) -> AppResult<Option<User>> {
        Ok(self.users.read().await.by_id.get(&id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let table = self.users.read().await;
        Ok(table
            .by_email
            .get(email)
            .and_then(|id| table.by_id.get(id))
            .cloned())
    }

    async fn create_article(&self, article: NewArticle) -> AppResult<Article> {
        let mut table = self.articles.write().await;

        table.last_id += 1;
        let now = Utc::now();
        let record = Article {
            id: table.last_id,
            title: article.title,
            slug: article.slug,
            category: article.category,
            content: article.content,
            excerpt: article.excerpt,
            image: article.image,
            author_id: article.author_id,
            status: article.status,
            featured: article.featured,
            like_count: 0,
            view_count: 0,
            created_at: now,
            updated_at: now,
        };

        table
            .by_slug
            .entry(record.slug.clone())
            .or_default()
            .insert(record.id);
        table.by_id.insert(
            record.id,
            Arc::new(Mutex::new(ArticleEntry {
                article: record.clone(),
                likes: HashMap::new(),
            })),
        );

        Ok(record)
    }

    async fn get_article(&self, id: i64) -> AppResult<Option<Article>> {
        let table = self.articles.read().await;
        match table.entry(id) {
            Some(entry) => Ok(Some(entry.lock().await.article.clone())),
            None => Ok(None),
        }
    }

    async fn view_published_article(&self, slug: &str) -> AppResult<Option<Article>> {
        let table = self.articles.read().await;
        let Some(ids) = table.by_slug.get(slug) else {
            return Ok(None);
        };

        for id in ids {
            let Some(entry) = table.entry(*id) else {
                continue;
            };
            let mut entry = entry.lock().await;
            if entry.article.status == PublishStatus::Published {
                entry.article.view_count += 1;
                return Ok(Some(entry.article.clone()));
            }
        }

        Ok(None)
    }

    async fn get_published_articles(&self, filter: &ArticleFilter) -> AppResult<Vec<Article>> {
        let articles = self.articles.read().await.snapshot().await;
        Ok(filter.apply(articles))
    }

    async fn get_all_articles(&self) -> AppResult<Vec<Article>> {
        Ok(self.articles.read().await.snapshot().await)
    }

    async fn delete_article(&self, id: i64) -> AppResult<bool> {
        let mut articles = self.articles.write().await;
        let Some(entry) = articles.by_id.remove(&id) else {
            return Ok(false);
        };

        let slug = entry.lock().await.article.slug.clone();
        let slug_freed = match articles.by_slug.get_mut(&slug) {
            Some(ids) => {
                ids.remove(&id);
                ids.is_empty()
            }
            None => false,
        };
        if slug_freed {
            articles.by_slug.remove(&slug);
        }

        // Likes live in the dropped entry; comments are stored separately.
        self.comments.write().await.by_article.remove(&id);
        Ok(true)
    }

    async fn add_comment(&self, comment: NewComment) -> AppResult<Comment> {
        // Held across the insert so a concurrent delete cannot orphan the comment.
        let articles = self.articles.read().await;
        if !articles.by_id.contains_key(&comment.article_id) {
            return Err(AppError::not_found("Article"));
        }

        let mut table = self.comments.write().await;
        table.last_id += 1;
        let now = Utc::now();
        let record = Comment {
            id: table.last_id,
            article_id: comment.article_id,
            user_id: comment.user_id,
            content: comment.content,
            created_at: now,
            updated_at: now,
        };

        table
            .by_article
            .entry(record.article_id)
            .or_default()
            .push(record.clone());

        Ok(record)
    }

    async fn get_comments(&self, article_id: i64) -> AppResult<Vec<Comment>> {
        Ok(self
            .comments
            .read()
            .await
            .by_article
            .get(&article_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn toggle_like(&self, article_id: i64, user_id: i64) -> AppResult<LikeToggle> {
        let table = self.articles.read().await;
        let entry = table
            .entry(article_id)
            .ok_or_else(|| AppError::not_found("Article"))?;

        let mut entry = entry.lock().await;
        let liked = if entry.likes.remove(&user_id).is_some() {
            entry.article.like_count -= 1;
            false
        } else {
            let like = Like {
                id: self.like_ids.fetch_add(1, Ordering::Relaxed) + 1,
                article_id,
                user_id,
                created_at: Utc::now(),
            };
            entry.likes.insert(user_id, like);
            entry.article.like_count += 1;
            true
        };

        Ok(LikeToggle {
            liked,
            like_count: entry.article.like_count,
        })
    }

    async fn get_likes(&self, article_id: i64) -> AppResult<Vec<Like>> {
        let table = self.articles.read().await;
        let Some(entry) = table.entry(article_id) else {
            return Ok(Vec::new());
        };

        let mut likes: Vec<Like> = entry.lock().await.likes.values().cloned().collect();
        likes.sort_by_key(|like| like.id);
        Ok(likes)
    }

    async fn create_video(&self, video: NewVideo) -> AppResult<Video> {
        let mut table = self.videos.write().await;
        table.last_id += 1;
        let record = Video {
            id: table.last_id,
            title: video.title,
            description: video.description,
            external_id: video.external_id,
            thumbnail: video.thumbnail,
            duration: video.duration,
            view_count: 0,
            status: video.status,
            created_at: Utc::now(),
        };
        table.rows.push(record.clone());
        Ok(record)
    }

    async fn get_published_videos(&self) -> AppResult<Vec<Video>> {
        Ok(self
            .videos
            .read()
            .await
            .rows
            .iter()
            .filter(|video| video.status == PublishStatus::Published)
            .cloned()
            .collect())
    }

    async fn subscribe(&self, email: &str) -> AppResult<Subscription> {
        let mut table = self.subscriptions.write().await;
        if table.by_email.contains_key(email) {
            return Err(AppError::Conflict("Email already subscribed".to_string()));
        }

        table.last_id += 1;
        let record = Subscription {
            id: table.last_id,
            email: email.to_string(),
            created_at: Utc::now(),
        };
        table.by_email.insert(record.email.clone(), record.clone());
        Ok(record)
    }

    async fn get_stats(&self) -> AppResult<AdminStats> {
        let articles = self.articles.read().await.snapshot().await;

        let to_i64 = |n: usize| i64::try_from(n).unwrap_or(i64::MAX);
        let comment_count: usize = self
            .comments
            .read()
            .await
            .by_article
            .values()
            .map(Vec::len)
            .sum();

        Ok(AdminStats {
            article_count: to_i64(articles.len()),
            published_count: to_i64(
                articles
                    .iter()
                    .filter(|a| a.status == PublishStatus::Published)
                    .count(),
            ),
            user_count: to_i64(self.users.read().await.by_id.len()),
            comment_count: to_i64(comment_count),
            total_views: articles.iter().map(|a| a.view_count).sum(),
            total_likes: articles.iter().map(|a| a.like_count).sum(),
            subscriber_count: to_i64(self.subscriptions.read().await.by_email.len()),
        })
    }
}
