use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use tokio::task;

use crate::{
    config::AppConfig,
    error::{AppError, AppResult},
    models::Role,
};

/// Claims
///
/// Payload of a session token. Only the identity and the role travel in the token;
/// every other user field is re-read from the store when needed.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user id, as a string per the JWT convention.
    pub sub: String,
    /// The caller's role at issue time. Trusted until `exp`, so a role change only
    /// takes effect once older tokens expire.
    pub role: Role,
    /// Expiration Time (exp), seconds since the epoch.
    pub exp: usize,
    /// Issued At (iat), seconds since the epoch.
    pub iat: usize,
}

/// AuthUser
///
/// The verified identity of a request, resolved purely from the bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i64,
    pub role: Role,
}

/// issue_token
///
/// Signs a session token for `user_id` valid for `config.token_ttl_days`.
pub fn issue_token(user_id: i64, role: Role, config: &AppConfig) -> AppResult<String> {
    let now = Utc::now();
    let expires = now + Duration::days(config.token_ttl_days);

    let claims = Claims {
        sub: user_id.to_string(),
        role,
        iat: now.timestamp().max(0) as usize,
        exp: expires.timestamp().max(0) as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::internal(format!("token signing failed: {e}")))
}

/// verify_token
///
/// Checks signature and expiry and returns the embedded identity. Pure: no store
/// access, no locking.
pub fn verify_token(token: &str, secret: &str) -> AppResult<AuthUser> {
    if token.is_empty() {
        return Err(AppError::Unauthorized("Missing token".to_string()));
    }

    let mut validation = Validation::default();
    validation.validate_exp = true;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AppError::Unauthorized("Token expired".to_string()),
        _ => AppError::Unauthorized("Invalid token".to_string()),
    })?;

    let id = token_data
        .claims
        .sub
        .parse::<i64>()
        .map_err(|_| AppError::Unauthorized("Invalid token".to_string()))?;

    Ok(AuthUser {
        id,
        role: token_data.claims.role,
    })
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// AuthUser Extractor Implementation
///
/// Makes `AuthUser` usable as a handler argument. A missing header, a malformed
/// token, a bad signature or an expired token all reject with 401 and an
/// `{"error": ...}` body; role checks are left to [`crate::guard`].
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);

        let token = bearer_token(&parts.headers)
            .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;

        verify_token(token, &config.jwt_secret)
    }
}

// --- Credentials ---
//
// bcrypt is CPU-bound, so both directions run on the blocking pool.

/// Produces the one-way hash stored for a new credential.
pub async fn hash_password(password: String, cost: u32) -> AppResult<String> {
    task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await?
        .map_err(|e| AppError::internal(format!("password hashing failed: {e}")))
}

/// Compares a candidate password with a stored hash. A malformed hash counts as a
/// mismatch.
pub async fn verify_password(password: String, password_hash: String) -> AppResult<bool> {
    let outcome = task::spawn_blocking(move || bcrypt::verify(password, &password_hash)).await?;

    Ok(outcome.unwrap_or_else(|e| {
        tracing::error!(error = %e, "stored credential hash could not be parsed");
        false
    }))
}
