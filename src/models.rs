use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use ts_rs::TS;
use utoipa::ToSchema;

// --- Enumerations ---

/// Role
///
/// Coarse authorization tier. Embedded in session tokens and checked by the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// PublishStatus
///
/// Publication state shared by articles and videos. Only `Published` content is
/// visible on the anonymous read paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum PublishStatus {
    #[default]
    Draft,
    Published,
}

impl PublishStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "published" => Some(Self::Published),
            _ => None,
        }
    }
}

// --- Core Records ---

/// User
///
/// The stored identity record. Holds the credential hash, so it is never serialized;
/// responses go through [`PublicUser`].
#[derive(Clone)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub avatar: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            avatar: self.avatar.clone(),
            role: self.role,
        }
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

/// PublicUser
///
/// Output projection of [`User`] without the credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PublicUser {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub avatar: String,
    pub role: Role,
}

/// Article
///
/// A news article. `like_count` mirrors the number of [`Like`] rows for the article
/// and `view_count` is bumped on every public fetch by slug.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub category: String,
    pub content: String,
    pub excerpt: String,
    /// `/uploads/<file>` reference, when an image was uploaded.
    pub image: Option<String>,
    pub author_id: i64,
    pub status: PublishStatus,
    pub featured: bool,
    pub like_count: i64,
    pub view_count: i64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// ArticleView
///
/// An article with the author's display fields attached.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ArticleView {
    #[serde(flatten)]
    pub article: Article,
    pub author_name: String,
    pub author_avatar: Option<String>,
}

/// Comment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Comment {
    pub id: i64,
    pub article_id: i64,
    pub user_id: i64,
    pub content: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// CommentView
///
/// A comment with the commenter's display fields attached.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub user_name: String,
    pub user_avatar: Option<String>,
}

/// Like
///
/// At most one per (article, user) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Like {
    pub id: i64,
    pub article_id: i64,
    pub user_id: i64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// LikeToggle
///
/// Outcome of a like toggle: whether the caller now likes the article and the
/// article's resulting like count (sent as `likes`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LikeToggle {
    pub liked: bool,
    #[serde(rename = "likes")]
    pub like_count: i64,
}

/// Video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Video {
    pub id: i64,
    pub title: String,
    pub description: String,
    /// Identifier of the video at its source (a YouTube id).
    pub external_id: String,
    pub thumbnail: String,
    pub duration: String,
    pub view_count: i64,
    pub status: PublishStatus,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Subscription
///
/// A newsletter subscription. Emails are unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Subscription {
    pub id: i64,
    pub email: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// AdminStats
///
/// Output schema for the administrative dashboard (GET /api/admin/stats).
/// Computed from live state on every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AdminStats {
    pub article_count: i64,
    pub published_count: i64,
    pub user_count: i64,
    pub comment_count: i64,
    pub total_views: i64,
    pub total_likes: i64,
    pub subscriber_count: i64,
}

// --- Request Payloads ---
//
// Fields are optional so that a missing field becomes a 400 with a readable
// message instead of a deserialization failure.

/// RegisterRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// LoginRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// AuthResponse
///
/// Returned by register and login: a fresh session token plus the public profile.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AuthResponse {
    pub token: String,
    pub user: PublicUser,
}

/// CreateCommentRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateCommentRequest {
    pub content: Option<String>,
}

/// CreateVideoRequest
///
/// `youtubeId` is accepted as an alias of `externalId`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateVideoRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "youtubeId")]
    pub external_id: Option<String>,
    pub duration: Option<String>,
    pub status: Option<PublishStatus>,
}

/// SubscribeRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SubscribeRequest {
    pub email: Option<String>,
}

/// MessageResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// ArticleForm
///
/// The multipart body of POST /api/admin/articles after the fields have been read.
/// Every text field arrives as a string; coercion happens in [`crate::content`].
#[derive(Debug, Clone, ToSchema, Default)]
pub struct ArticleForm {
    pub title: Option<String>,
    pub category: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    /// "draft" (default) or "published".
    pub status: Option<String>,
    /// "true", "1" or "on" marks the article as featured.
    pub featured: Option<String>,
    #[schema(value_type = Option<String>, format = Binary)]
    pub image: Option<ImageUpload>,
}

/// ImageUpload
///
/// The raw `image` part of an article form.
#[derive(Clone, Default)]
pub struct ImageUpload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for ImageUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageUpload")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

// --- Store Inputs ---
//
// Fully validated values handed to the repository. Ids and timestamps are assigned
// by the store.

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub avatar: String,
}

#[derive(Debug, Clone)]
pub struct NewArticle {
    pub title: String,
    pub slug: String,
    pub category: String,
    pub content: String,
    pub excerpt: String,
    pub image: Option<String>,
    pub author_id: i64,
    pub status: PublishStatus,
    pub featured: bool,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub article_id: i64,
    pub user_id: i64,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct NewVideo {
    pub title: String,
    pub description: String,
    pub external_id: String,
    pub thumbnail: String,
    pub duration: String,
    pub status: PublishStatus,
}
