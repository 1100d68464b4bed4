use std::{env, str::FromStr};

const LOCAL_JWT_SECRET: &str = "super-secure-test-secret-value-local";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3001";
const DEFAULT_TOKEN_TTL_DAYS: i64 = 7;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// AppConfig
///
/// Holds the application's entire configuration state. Immutable once loaded and
/// shared with handlers and extractors through `FromRef<AppState>`.
#[derive(Clone)]
pub struct AppConfig {
    // Runtime environment marker. Selects log format, storage backend and defaults.
    pub env: Env,
    // Socket address the HTTP server binds to.
    pub bind_addr: String,
    // Postgres connection string. `None` selects the in-memory store (local only).
    pub database_url: Option<String>,
    // HMAC secret used to sign and verify session tokens.
    pub jwt_secret: String,
    // Session token lifetime.
    pub token_ttl_days: i64,
    // bcrypt work factor for credential hashing.
    pub bcrypt_cost: u32,
    // Where uploaded article images go.
    pub storage: StorageConfig,
    // Upper bound for the multipart body of article creation.
    pub max_upload_bytes: usize,
    // Administrator account ensured at startup, if any.
    pub admin: Option<AdminSeed>,
}

/// Env
///
/// Defines the runtime context: developer conveniences (in-memory store, local disk
/// uploads, default admin) versus production infrastructure (Postgres, S3).
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

/// StorageConfig
///
/// Backend for uploaded blobs. Both variants hand out `/uploads/<file>` references.
#[derive(Clone, PartialEq, Debug)]
pub enum StorageConfig {
    /// Files written below `upload_dir` and served by the app at `/uploads`.
    LocalDisk { upload_dir: String },
    /// S3-compatible bucket; objects keyed `uploads/<file>`.
    S3 {
        endpoint: String,
        region: String,
        access_key: String,
        secret_key: String,
        bucket: String,
    },
}

/// AdminSeed
///
/// Credentials of the administrator created at startup when missing.
#[derive(Clone)]
pub struct AdminSeed {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl Default for AppConfig {
    /// Safe, non-panicking configuration for tests: local env, in-memory store and a
    /// minimal bcrypt cost so credential hashing stays fast.
    fn default() -> Self {
        Self {
            env: Env::Local,
            bind_addr: "127.0.0.1:3001".to_string(),
            database_url: None,
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            token_ttl_days: DEFAULT_TOKEN_TTL_DAYS,
            bcrypt_cost: 4,
            storage: StorageConfig::LocalDisk {
                upload_dir: "uploads".to_string(),
            },
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            admin: None,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables, failing fast.
    ///
    /// # Panics
    /// Panics in production when `JWT_SECRET`, `DATABASE_URL` or the S3 credentials
    /// are missing, so the service never starts half-configured.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
        let token_ttl_days = var_or("TOKEN_TTL_DAYS", DEFAULT_TOKEN_TTL_DAYS);
        let bcrypt_cost = var_or("BCRYPT_COST", bcrypt::DEFAULT_COST);
        let max_upload_bytes = var_or("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES);

        match env {
            Env::Local => Self {
                env: Env::Local,
                bind_addr,
                // Without a database the in-memory store is used.
                database_url: env::var("DATABASE_URL").ok(),
                jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string()),
                token_ttl_days,
                bcrypt_cost,
                storage: StorageConfig::LocalDisk {
                    upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()),
                },
                max_upload_bytes,
                admin: Some(AdminSeed {
                    name: env::var("ADMIN_NAME").unwrap_or_else(|_| "Admin".to_string()),
                    email: env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@localhost".to_string()),
                    password: env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin123".to_string()),
                }),
            },
            Env::Production => Self {
                env: Env::Production,
                bind_addr,
                database_url: Some(
                    env::var("DATABASE_URL").expect("FATAL: DATABASE_URL required in prod"),
                ),
                jwt_secret: env::var("JWT_SECRET")
                    .expect("FATAL: JWT_SECRET must be set in production."),
                token_ttl_days,
                bcrypt_cost,
                storage: StorageConfig::S3 {
                    endpoint: env::var("S3_ENDPOINT").expect("FATAL: S3_ENDPOINT required in prod"),
                    region: env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
                    access_key: env::var("S3_ACCESS_KEY")
                        .expect("FATAL: S3_ACCESS_KEY required in prod"),
                    secret_key: env::var("S3_SECRET_KEY")
                        .expect("FATAL: S3_SECRET_KEY required in prod"),
                    bucket: env::var("S3_BUCKET_NAME").unwrap_or_else(|_| "uploads".to_string()),
                },
                max_upload_bytes,
                // Production only seeds an admin when explicitly asked to.
                admin: match (env::var("ADMIN_EMAIL"), env::var("ADMIN_PASSWORD")) {
                    (Ok(email), Ok(password)) => Some(AdminSeed {
                        name: env::var("ADMIN_NAME").unwrap_or_else(|_| "Admin".to_string()),
                        email,
                        password,
                    }),
                    _ => None,
                },
            },
        }
    }
}

/// Parses an optional variable, keeping the default when unset or unparsable.
fn var_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "ignoring unparsable configuration value");
            default
        }),
        Err(_) => default,
    }
}
