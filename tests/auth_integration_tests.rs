use axum::{
    extract::FromRequestParts,
    http::{Method, Request, StatusCode, Uri, header, request::Parts},
};
use gaming_news_cms::{
    AppConfig, AppError, AppState, MemoryRepository, MockStorageService,
    auth::{AuthUser, Claims, bearer_token, hash_password, issue_token, verify_password, verify_token},
    identity,
    models::{LoginRequest, RegisterRequest, Role},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use std::{
    sync::Arc,
    time::{Instant, SystemTime},
};

// --- Helper Functions ---

const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";
const TEST_USER_ID: i64 = 42;

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// Signs claims by hand so tests control `exp` and the signing secret.
fn create_token(sub: &str, role: Role, exp: u64, secret: &str) -> String {
    let claims = Claims {
        sub: sub.to_string(),
        role,
        iat: now_secs() as usize,
        exp: exp as usize,
    };

    let key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), &claims, &key).unwrap()
}

fn test_config() -> AppConfig {
    AppConfig {
        jwt_secret: TEST_JWT_SECRET.to_string(),
        ..AppConfig::default()
    }
}

fn create_app_state() -> AppState {
    AppState {
        repo: Arc::new(MemoryRepository::new()),
        storage: Arc::new(MockStorageService::new()),
        config: test_config(),
    }
}

/// Helper to get the mutable Parts struct from a generated Request
fn get_request_parts(method: Method, uri: Uri) -> Parts {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let (parts, _) = request.into_parts();
    parts
}

fn with_bearer(parts: &mut Parts, token: &str) {
    parts.headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
    );
}

fn assert_unauthorized(result: Result<AuthUser, AppError>, expected_message: &str) {
    match result {
        Err(err) => {
            assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
            assert_eq!(err.to_string(), expected_message);
        }
        Ok(user) => panic!("expected rejection, got {user:?}"),
    }
}

// --- Token Tests ---

#[test]
fn test_issued_token_verifies_to_same_identity() {
    let config = test_config();
    let token = issue_token(TEST_USER_ID, Role::Admin, &config).unwrap();

    let user = verify_token(&token, TEST_JWT_SECRET).unwrap();
    assert_eq!(
        user,
        AuthUser {
            id: TEST_USER_ID,
            role: Role::Admin
        }
    );
}

#[test]
fn test_token_signed_with_other_secret_is_invalid() {
    let token = create_token("42", Role::User, now_secs() + 3600, "some-other-secret");
    assert_unauthorized(verify_token(&token, TEST_JWT_SECRET), "Invalid token");
}

#[test]
fn test_expired_token_is_rejected() {
    // Well past the default 60s leeway.
    let token = create_token("42", Role::User, now_secs() - 3600, TEST_JWT_SECRET);
    assert_unauthorized(verify_token(&token, TEST_JWT_SECRET), "Token expired");
}

#[test]
fn test_malformed_and_empty_tokens() {
    assert_unauthorized(verify_token("not-a-jwt", TEST_JWT_SECRET), "Invalid token");
    assert_unauthorized(verify_token("", TEST_JWT_SECRET), "Missing token");
}

#[test]
fn test_non_numeric_subject_is_invalid() {
    let token = create_token("alice", Role::User, now_secs() + 3600, TEST_JWT_SECRET);
    assert_unauthorized(verify_token(&token, TEST_JWT_SECRET), "Invalid token");
}

#[test]
fn test_bearer_token_parsing() {
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    assert_eq!(bearer_token(&parts.headers), None);

    parts.headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_static("Basic dXNlcjpwYXNz"),
    );
    assert_eq!(bearer_token(&parts.headers), None);

    with_bearer(&mut parts, "abc.def.ghi");
    assert_eq!(bearer_token(&parts.headers), Some("abc.def.ghi"));
}

// --- Extractor Tests ---

#[tokio::test]
async fn test_auth_success_with_valid_jwt() {
    let app_state = create_app_state();
    let token = create_token("42", Role::User, now_secs() + 3600, TEST_JWT_SECRET);

    let mut parts = get_request_parts(Method::GET, "/api/auth/me".parse().unwrap());
    with_bearer(&mut parts, &token);

    let user = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap();
    assert_eq!(user.id, TEST_USER_ID);
    assert_eq!(user.role, Role::User);
}

#[tokio::test]
async fn test_auth_failure_with_missing_header() {
    let app_state = create_app_state();
    let mut parts = get_request_parts(Method::GET, "/api/auth/me".parse().unwrap());

    let result = AuthUser::from_request_parts(&mut parts, &app_state).await;
    assert_unauthorized(result, "Missing bearer token");
}

#[tokio::test]
async fn test_auth_failure_with_expired_jwt() {
    let app_state = create_app_state();
    let token = create_token("42", Role::Admin, now_secs() - 3600, TEST_JWT_SECRET);

    let mut parts = get_request_parts(Method::GET, "/api/admin/stats".parse().unwrap());
    with_bearer(&mut parts, &token);

    let result = AuthUser::from_request_parts(&mut parts, &app_state).await;
    assert_unauthorized(result, "Token expired");
}

#[tokio::test]
async fn test_user_id_header_is_not_a_bypass() {
    let app_state = create_app_state();

    let mut parts = get_request_parts(Method::GET, "/api/auth/me".parse().unwrap());
    parts.headers.insert(
        header::HeaderName::from_static("x-user-id"),
        header::HeaderValue::from_static("1"),
    );

    let result = AuthUser::from_request_parts(&mut parts, &app_state).await;
    assert_unauthorized(result, "Missing bearer token");
}

// --- Credential Tests ---

#[tokio::test]
async fn test_password_hash_roundtrip() {
    let hash = hash_password("hunter2".to_string(), 4).await.unwrap();
    assert_ne!(hash, "hunter2");

    assert!(verify_password("hunter2".to_string(), hash.clone()).await.unwrap());
    assert!(!verify_password("hunter3".to_string(), hash).await.unwrap());
}

#[tokio::test]
async fn test_malformed_hash_counts_as_mismatch() {
    let result = verify_password("hunter2".to_string(), "not-a-bcrypt-hash".to_string()).await;
    assert!(!result.unwrap());
}

async fn wrong_password_login(
    repo: &MemoryRepository,
    config: &AppConfig,
    email: &str,
) -> Result<(), AppError> {
    identity::login(
        repo,
        config,
        LoginRequest {
            email: Some(email.to_string()),
            password: Some("wrong".to_string()),
        },
    )
    .await
    .map(|_| ())
}

#[tokio::test]
async fn test_unknown_email_login_pays_for_a_verification() {
    const COST: u32 = 10;
    let repo = MemoryRepository::new();
    let config = AppConfig {
        bcrypt_cost: COST,
        ..AppConfig::default()
    };
    identity::register(
        &repo,
        &config,
        RegisterRequest {
            name: Some("Gina".to_string()),
            email: Some("gina@example.com".to_string()),
            password: Some("right".to_string()),
        },
    )
    .await
    .unwrap();

    // Warm up the lazily built decoy hash.
    assert!(wrong_password_login(&repo, &config, "nobody@example.com").await.is_err());

    let baseline_hash = hash_password("reference".to_string(), COST).await.unwrap();
    let started = Instant::now();
    verify_password("other".to_string(), baseline_hash).await.unwrap();
    let one_verification = started.elapsed();

    let started = Instant::now();
    let err = wrong_password_login(&repo, &config, "nobody@example.com")
        .await
        .unwrap_err();
    let unknown_email = started.elapsed();

    assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    assert!(
        unknown_email * 4 >= one_verification,
        "unknown email took {unknown_email:?}, one verification takes {one_verification:?}"
    );
}
