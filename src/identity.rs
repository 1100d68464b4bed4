//! Account registration, credential checks and session issuance.

use crate::{
    auth::{hash_password, issue_token, verify_password},
    config::{AdminSeed, AppConfig},
    error::{AppError, AppResult},
    models::{AuthResponse, LoginRequest, NewUser, PublicUser, RegisterRequest, Role},
    repository::Repository,
};
use tokio::sync::OnceCell;

/// Hash checked when a login names an unknown email, so that path costs one bcrypt
/// verification like a wrong password does.
static DECOY_HASH: OnceCell<String> = OnceCell::const_new();

async fn decoy_hash(cost: u32) -> AppResult<String> {
    DECOY_HASH
        .get_or_try_init(|| hash_password("decoy-password".to_string(), cost))
        .await
        .cloned()
}

/// Canonical form used for storage and lookup of every email address.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Generated avatar URL for a display name.
pub fn avatar_for(name: &str) -> String {
    format!(
        "https://ui-avatars.com/api/?name={}&background=dc2626&color=fff",
        urlencoding::encode(name)
    )
}

/// Returns the field unless it is absent or whitespace only.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// register
///
/// Creates a `user`-role account and signs a session for it.
///
/// # Errors
/// `Validation` when a field is missing or blank, `Conflict` when the email is taken.
pub async fn register(
    repo: &dyn Repository,
    config: &AppConfig,
    req: RegisterRequest,
) -> AppResult<AuthResponse> {
    let (Some(name), Some(email), Some(password)) =
        (present(req.name), present(req.email), present(req.password))
    else {
        return Err(AppError::validation("Name, email and password are required"));
    };

    let name = name.trim().to_string();
    let email = normalize_email(&email);

    // Cheap check before paying for the hash; the store enforces it again.
    if repo.get_user_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }

    let password_hash = hash_password(password, config.bcrypt_cost).await?;
    let user = repo
        .create_user(NewUser {
            avatar: avatar_for(&name),
            name,
            email,
            password_hash,
            role: Role::User,
        })
        .await?;

    tracing::info!(user_id = user.id, "user registered");

    Ok(AuthResponse {
        token: issue_token(user.id, user.role, config)?,
        user: user.public(),
    })
}

/// login
///
/// Exchanges credentials for a fresh session. Unknown emails, wrong passwords and
/// missing fields all fail with the same `Unauthorized("Invalid credentials")`.
pub async fn login(
    repo: &dyn Repository,
    config: &AppConfig,
    req: LoginRequest,
) -> AppResult<AuthResponse> {
    let (Some(email), Some(password)) = (req.email, req.password) else {
        return Err(AppError::invalid_credentials());
    };

    let Some(user) = repo.get_user_by_email(&normalize_email(&email)).await? else {
        verify_password(password, decoy_hash(config.bcrypt_cost).await?).await?;
        tracing::warn!("login rejected: unknown email");
        return Err(AppError::invalid_credentials());
    };

    if !verify_password(password, user.password_hash.clone()).await? {
        tracing::warn!(user_id = user.id, "login rejected: wrong password");
        return Err(AppError::invalid_credentials());
    }

    tracing::info!(user_id = user.id, "user logged in");

    Ok(AuthResponse {
        token: issue_token(user.id, user.role, config)?,
        user: user.public(),
    })
}

/// The caller's profile, re-read from the store.
pub async fn current_user(repo: &dyn Repository, user_id: i64) -> AppResult<PublicUser> {
    repo.get_user(user_id)
        .await?
        .map(|user| user.public())
        .ok_or_else(|| AppError::not_found("User"))
}

/// ensure_admin
///
/// Creates the configured administrator unless an account with that email exists.
/// An existing account is left untouched, whatever its role.
pub async fn ensure_admin(
    repo: &dyn Repository,
    seed: &AdminSeed,
    bcrypt_cost: u32,
) -> AppResult<PublicUser> {
    let email = normalize_email(&seed.email);

    if let Some(existing) = repo.get_user_by_email(&email).await? {
        if existing.role != Role::Admin {
            tracing::warn!(user_id = existing.id, "admin seed email belongs to a non-admin account");
        }
        return Ok(existing.public());
    }

    let password_hash = hash_password(seed.password.clone(), bcrypt_cost).await?;
    let admin = repo
        .create_user(NewUser {
            name: seed.name.clone(),
            avatar: avatar_for(&seed.name),
            email,
            password_hash,
            role: Role::Admin,
        })
        .await?;

    tracing::info!(user_id = admin.id, "administrator account created");
    Ok(admin.public())
}
