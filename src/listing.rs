//! Anonymous read paths: filtering, ordering and truncation of published
//! articles, plus the display fields copied onto articles and comments.

use std::collections::HashMap;

use crate::{
    error::AppResult,
    models::{Article, ArticleView, Comment, CommentView, PublishStatus, Video},
    repository::Repository,
};

/// Shown when an article's author no longer resolves.
pub const UNKNOWN_AUTHOR: &str = "Unknown";
/// Shown when a comment's author no longer resolves.
pub const UNKNOWN_COMMENTER: &str = "User";

/// ArticleFilter
///
/// Criteria for the public article listing. An empty filter lists every published
/// article.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleFilter {
    /// Exact category match.
    pub category: Option<String>,
    pub featured_only: bool,
    /// Case-insensitive substring of title or content.
    pub search: Option<String>,
    pub limit: Option<usize>,
}

impl ArticleFilter {
    /// The search term, if one worth applying was given.
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().filter(|term| !term.is_empty())
    }

    pub fn matches(&self, article: &Article) -> bool {
        if article.status != PublishStatus::Published {
            return false;
        }

        if let Some(category) = &self.category {
            if article.category != *category {
                return false;
            }
        }

        if self.featured_only && !article.featured {
            return false;
        }

        match self.search_term() {
            Some(term) => {
                let needle = term.to_lowercase();
                article.title.to_lowercase().contains(&needle)
                    || article.content.to_lowercase().contains(&needle)
            }
            None => true,
        }
    }

    /// Filters, sorts newest first (ties by id ascending) and truncates.
    pub fn apply(&self, articles: impl IntoIterator<Item = Article>) -> Vec<Article> {
        let mut selected: Vec<Article> = articles
            .into_iter()
            .filter(|article| self.matches(article))
            .collect();

        selected.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }

        selected
    }
}

/// Published articles matching `filter`, with author display fields.
pub async fn list_articles(repo: &dyn Repository, filter: &ArticleFilter) -> AppResult<Vec<ArticleView>> {
    let articles = repo.get_published_articles(filter).await?;
    with_authors(repo, articles).await
}

/// Every article including drafts, with author display fields (admin listing).
pub async fn list_all_articles(repo: &dyn Repository) -> AppResult<Vec<ArticleView>> {
    let articles = repo.get_all_articles().await?;
    with_authors(repo, articles).await
}

/// Published videos in insertion order.
pub async fn list_videos(repo: &dyn Repository) -> AppResult<Vec<Video>> {
    repo.get_published_videos().await
}

// --- Denormalization ---

/// Resolves user display fields once per user id within a single response.
struct DisplayCache<'a> {
    repo: &'a dyn Repository,
    seen: HashMap<i64, Option<(String, String)>>,
}

impl<'a> DisplayCache<'a> {
    fn new(repo: &'a dyn Repository) -> Self {
        Self {
            repo,
            seen: HashMap::new(),
        }
    }

    /// `(name, avatar)` of the user, or `None` for a dangling id.
    async fn lookup(&mut self, user_id: i64) -> AppResult<Option<(String, String)>> {
        if let Some(hit) = self.seen.get(&user_id) {
            return Ok(hit.clone());
        }

        let display = self
            .repo
            .get_user(user_id)
            .await?
            .map(|user| (user.name, user.avatar));

        if display.is_none() {
            tracing::warn!(user_id, "dangling user reference");
        }

        self.seen.insert(user_id, display.clone());
        Ok(display)
    }
}

pub async fn with_authors(repo: &dyn Repository, articles: Vec<Article>) -> AppResult<Vec<ArticleView>> {
    let mut cache = DisplayCache::new(repo);
    let mut views = Vec::with_capacity(articles.len());

    for article in articles {
        views.push(article_view(&mut cache, article).await?);
    }

    Ok(views)
}

pub async fn with_author(repo: &dyn Repository, article: Article) -> AppResult<ArticleView> {
    article_view(&mut DisplayCache::new(repo), article).await
}

async fn article_view(cache: &mut DisplayCache<'_>, article: Article) -> AppResult<ArticleView> {
    let (author_name, author_avatar) = match cache.lookup(article.author_id).await? {
        Some((name, avatar)) => (name, Some(avatar)),
        None => (UNKNOWN_AUTHOR.to_string(), None),
    };

    Ok(ArticleView {
        article,
        author_name,
        author_avatar,
    })
}

pub async fn with_commenters(repo: &dyn Repository, comments: Vec<Comment>) -> AppResult<Vec<CommentView>> {
    let mut cache = DisplayCache::new(repo);
    let mut views = Vec::with_capacity(comments.len());

    for comment in comments {
        let (user_name, user_avatar) = match cache.lookup(comment.user_id).await? {
            Some((name, avatar)) => (name, Some(avatar)),
            None => (UNKNOWN_COMMENTER.to_string(), None),
        };
        views.push(CommentView {
            comment,
            user_name,
            user_avatar,
        });
    }

    Ok(views)
}
