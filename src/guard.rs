//! Role-based authorization.
//!
//! Every handler states the action it performs and asks [`authorize`] before
//! touching the store. The decision depends only on the caller's role claim.

use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
    models::Role,
};

/// Action
///
/// Everything a caller can ask the service to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateArticle,
    DeleteArticle,
    CreateVideo,
    ViewAdminStats,
    ListAllArticlesAdmin,
    CreateComment,
    ToggleLike,
    ReadOwnProfile,
    ReadArticle,
    ListArticles,
    ListComments,
    ListVideos,
    SubscribeNewsletter,
}

/// Requirement
///
/// Minimum caller standing for an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Anyone,
    Authenticated,
    Admin,
}

impl Action {
    pub const fn requirement(self) -> Requirement {
        match self {
            Self::CreateArticle
            | Self::DeleteArticle
            | Self::CreateVideo
            | Self::ViewAdminStats
            | Self::ListAllArticlesAdmin => Requirement::Admin,
            Self::CreateComment | Self::ToggleLike | Self::ReadOwnProfile => {
                Requirement::Authenticated
            }
            Self::ReadArticle
            | Self::ListArticles
            | Self::ListComments
            | Self::ListVideos
            | Self::SubscribeNewsletter => Requirement::Anyone,
        }
    }
}

/// authorize
///
/// `None` is an anonymous caller. Anonymous callers on protected actions get
/// `Unauthorized`; authenticated callers lacking the admin role get `Forbidden`.
pub fn authorize(caller: Option<Role>, action: Action) -> AppResult<()> {
    match (action.requirement(), caller) {
        (Requirement::Anyone, _) => Ok(()),
        (_, None) => Err(AppError::Unauthorized("Authentication required".to_string())),
        (Requirement::Authenticated, Some(_)) => Ok(()),
        (Requirement::Admin, Some(Role::Admin)) => Ok(()),
        (Requirement::Admin, Some(Role::User)) => {
            tracing::debug!(?action, "non-admin caller denied");
            Err(AppError::Forbidden(
                "Access denied: administrators only".to_string(),
            ))
        }
    }
}

/// Shorthand for handlers that already hold a verified caller.
pub fn authorize_user(user: &AuthUser, action: Action) -> AppResult<()> {
    authorize(Some(user.role), action)
}
