use gaming_news_cms::{
    AppError, MemoryRepository, PostgresRepository,
    listing::ArticleFilter,
    models::{NewArticle, NewComment, NewUser, NewVideo, PublishStatus, Role},
    repository::{Repository, RepositoryState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;

// --- Fixtures ---

fn new_user(email: &str) -> NewUser {
    NewUser {
        name: "Tester".to_string(),
        email: email.to_string(),
        password_hash: "hash".to_string(),
        role: Role::User,
        avatar: "https://example.com/a.png".to_string(),
    }
}

fn new_article(author_id: i64, slug: &str, status: PublishStatus) -> NewArticle {
    NewArticle {
        title: slug.replace('-', " "),
        slug: slug.to_string(),
        category: "News".to_string(),
        content: "Body text".to_string(),
        excerpt: String::new(),
        image: None,
        author_id,
        status,
        featured: false,
    }
}

fn new_video(external_id: &str, status: PublishStatus) -> NewVideo {
    NewVideo {
        title: "Trailer".to_string(),
        description: String::new(),
        external_id: external_id.to_string(),
        thumbnail: format!("https://img.youtube.com/vi/{external_id}/maxresdefault.jpg"),
        duration: "2:30".to_string(),
        status,
    }
}

/// Exercises the contract every `Repository` has to honour.
async fn check_repository_contract(repo: RepositoryState, email_suffix: &str) {
    let author = repo
        .create_user(new_user(&format!("author{email_suffix}")))
        .await
        .unwrap();
    let reader = repo
        .create_user(new_user(&format!("reader{email_suffix}")))
        .await
        .unwrap();

    // Duplicate emails conflict.
    let err = repo
        .create_user(new_user(&format!("author{email_suffix}")))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let slug = format!("contract{}", email_suffix.replace(['@', '.'], "-"));
    let article = repo
        .create_article(new_article(author.id, &slug, PublishStatus::Published))
        .await
        .unwrap();
    assert_eq!(article.like_count, 0);
    assert_eq!(article.view_count, 0);

    // Like toggle: on, then off, counter follows the rows.
    let on = repo.toggle_like(article.id, reader.id).await.unwrap();
    assert!(on.liked);
    assert_eq!(on.like_count, 1);
    assert_eq!(repo.get_likes(article.id).await.unwrap().len(), 1);

    let off = repo.toggle_like(article.id, reader.id).await.unwrap();
    assert!(!off.liked);
    assert_eq!(off.like_count, 0);
    assert!(repo.get_likes(article.id).await.unwrap().is_empty());

    // Views count once per published fetch.
    let viewed = repo.view_published_article(&slug).await.unwrap().unwrap();
    assert_eq!(viewed.view_count, 1);

    // Comments require the article.
    repo.add_comment(NewComment {
        article_id: article.id,
        user_id: reader.id,
        content: "First!".to_string(),
    })
    .await
    .unwrap();
    let err = repo
        .add_comment(NewComment {
            article_id: i64::MAX,
            user_id: reader.id,
            content: "Lost".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    // Deletion cascades.
    repo.toggle_like(article.id, reader.id).await.unwrap();
    assert!(repo.delete_article(article.id).await.unwrap());
    assert!(!repo.delete_article(article.id).await.unwrap());
    assert!(repo.get_comments(article.id).await.unwrap().is_empty());
    assert!(repo.get_likes(article.id).await.unwrap().is_empty());
    assert!(repo.view_published_article(&slug).await.unwrap().is_none());
}

// --- In-Memory Store ---

#[tokio::test]
async fn test_memory_repository_contract() {
    check_repository_contract(Arc::new(MemoryRepository::new()), "@example.com").await;
}

#[tokio::test]
async fn test_toggle_like_on_missing_article_is_not_found() {
    let repo = MemoryRepository::new();
    let err = repo.toggle_like(999, 1).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_concurrent_toggles_by_different_users() {
    let repo = Arc::new(MemoryRepository::new());
    let article = repo
        .create_article(new_article(1, "hot-take", PublishStatus::Published))
        .await
        .unwrap();
    let article_id = article.id;

    let tasks: Vec<_> = (1..=2)
        .map(|user_id| {
            let repo = repo.clone();
            tokio::spawn(async move { repo.toggle_like(article_id, user_id).await })
        })
        .collect();

    for task in tasks {
        assert!(task.await.unwrap().unwrap().liked);
    }

    let stored = repo.get_article(article_id).await.unwrap().unwrap();
    assert_eq!(stored.like_count, 2);
    assert_eq!(repo.get_likes(article_id).await.unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_like_count_matches_rows_under_contention() {
    let repo = Arc::new(MemoryRepository::new());
    let article = repo
        .create_article(new_article(1, "contended", PublishStatus::Published))
        .await
        .unwrap();
    let article_id = article.id;

    // Users 1..=20 toggle 1..=3 times each: odd counts end liked.
    let mut tasks = Vec::new();
    for user_id in 1..=20_i64 {
        for _ in 0..(user_id % 3 + 1) {
            let repo = repo.clone();
            tasks.push(tokio::spawn(async move {
                repo.toggle_like(article_id, user_id).await.unwrap();
            }));
        }
    }
    for task in tasks {
        task.await.unwrap();
    }

    let expected = (1..=20_i64).filter(|u| (u % 3 + 1) % 2 == 1).count();
    let stored = repo.get_article(article_id).await.unwrap().unwrap();
    let likes = repo.get_likes(article_id).await.unwrap();

    assert_eq!(likes.len(), expected);
    assert_eq!(stored.like_count, expected as i64);
}

#[tokio::test]
async fn test_unknown_slug_leaves_views_untouched() {
    let repo = MemoryRepository::new();
    let article = repo
        .create_article(new_article(1, "real-slug", PublishStatus::Published))
        .await
        .unwrap();

    assert!(repo.view_published_article("no-such-slug").await.unwrap().is_none());

    let stored = repo.get_article(article.id).await.unwrap().unwrap();
    assert_eq!(stored.view_count, 0);
}

#[tokio::test]
async fn test_duplicate_slug_resolves_to_lowest_published_id() {
    let repo = MemoryRepository::new();
    let draft = repo
        .create_article(new_article(1, "same", PublishStatus::Draft))
        .await
        .unwrap();
    let first = repo
        .create_article(new_article(1, "same", PublishStatus::Published))
        .await
        .unwrap();
    repo.create_article(new_article(1, "same", PublishStatus::Published))
        .await
        .unwrap();

    let viewed = repo.view_published_article("same").await.unwrap().unwrap();
    assert_eq!(viewed.id, first.id);
    assert_eq!(viewed.view_count, 1);

    let untouched = repo.get_article(draft.id).await.unwrap().unwrap();
    assert_eq!(untouched.view_count, 0);
}

#[tokio::test]
async fn test_draft_slug_is_not_viewable() {
    let repo = MemoryRepository::new();
    repo.create_article(new_article(1, "secret", PublishStatus::Draft))
        .await
        .unwrap();

    assert!(repo.view_published_article("secret").await.unwrap().is_none());
}

#[tokio::test]
async fn test_published_listing_excludes_drafts() {
    let repo = MemoryRepository::new();
    repo.create_article(new_article(1, "visible", PublishStatus::Published))
        .await
        .unwrap();
    repo.create_article(new_article(1, "hidden", PublishStatus::Draft))
        .await
        .unwrap();

    let published = repo
        .get_published_articles(&ArticleFilter::default())
        .await
        .unwrap();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].slug, "visible");

    // The admin listing keeps drafts, in id order.
    let all = repo.get_all_articles().await.unwrap();
    let slugs: Vec<_> = all.iter().map(|a| a.slug.as_str()).collect();
    assert_eq!(slugs, ["visible", "hidden"]);
}

#[tokio::test]
async fn test_videos_and_subscriptions() {
    let repo = MemoryRepository::new();
    repo.create_video(new_video("abc", PublishStatus::Published))
        .await
        .unwrap();
    repo.create_video(new_video("def", PublishStatus::Draft))
        .await
        .unwrap();
    repo.create_video(new_video("ghi", PublishStatus::Published))
        .await
        .unwrap();

    let videos = repo.get_published_videos().await.unwrap();
    let ids: Vec<_> = videos.iter().map(|v| v.external_id.as_str()).collect();
    assert_eq!(ids, ["abc", "ghi"]);

    repo.subscribe("fan@example.com").await.unwrap();
    let err = repo.subscribe("fan@example.com").await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(ref m) if m == "Email already subscribed"));
}

#[tokio::test]
async fn test_stats_reflect_live_state() {
    let repo = MemoryRepository::new();
    let user = repo.create_user(new_user("u@example.com")).await.unwrap();
    let published = repo
        .create_article(new_article(user.id, "one", PublishStatus::Published))
        .await
        .unwrap();
    repo.create_article(new_article(user.id, "two", PublishStatus::Draft))
        .await
        .unwrap();

    repo.view_published_article("one").await.unwrap();
    repo.view_published_article("one").await.unwrap();
    repo.toggle_like(published.id, user.id).await.unwrap();
    repo.add_comment(NewComment {
        article_id: published.id,
        user_id: user.id,
        content: "Nice".to_string(),
    })
    .await
    .unwrap();
    repo.subscribe("u@example.com").await.unwrap();

    let stats = repo.get_stats().await.unwrap();
    assert_eq!(stats.article_count, 2);
    assert_eq!(stats.published_count, 1);
    assert_eq!(stats.user_count, 1);
    assert_eq!(stats.comment_count, 1);
    assert_eq!(stats.total_views, 2);
    assert_eq!(stats.total_likes, 1);
    assert_eq!(stats.subscriber_count, 1);

    repo.delete_article(published.id).await.unwrap();
    let stats = repo.get_stats().await.unwrap();
    assert_eq!(stats.article_count, 1);
    assert_eq!(stats.comment_count, 0);
    assert_eq!(stats.total_likes, 0);
}

// --- Postgres ---

/// Requires a reachable database: `DATABASE_URL=... cargo test -- --ignored`.
#[tokio::test]
#[ignore]
async fn test_postgres_repository_contract() {
    dotenv::dotenv().ok();
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for this test");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("Failed to connect to Postgres in tests");

    let repo = PostgresRepository::new(pool);
    repo.migrate().await.unwrap();

    // Unique per run so the test can be repeated against the same database.
    let suffix = format!("+{}@example.com", uuid::Uuid::new_v4().simple());
    check_repository_contract(Arc::new(repo), &suffix).await;
}
