use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
    routing::get,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Ambient layers: configuration, errors, tokens and credentials.
pub mod auth;
pub mod config;
pub mod error;

// Business rules, independent of HTTP and of the store implementation.
pub mod content;
pub mod guard;
pub mod identity;
pub mod listing;

// Persistence and blob storage adapters.
pub mod memory;
pub mod models;
pub mod repository;
pub mod storage;

// HTTP surface, segregated by access level (Public, Authenticated, Admin).
pub mod handlers;
pub mod routes;
use auth::AuthUser;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::{AppConfig, StorageConfig};
pub use error::{AppError, AppResult};
pub use memory::MemoryRepository;
pub use repository::{PostgresRepository, RepositoryState};
pub use storage::{LocalDiskStorage, MockStorageService, S3StorageClient, StorageState};

/// ApiDoc
///
/// Aggregates every `#[utoipa::path]` handler and `ToSchema` model into the OpenAPI
/// document served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::index, handlers::register, handlers::login, handlers::get_me,
        handlers::list_articles, handlers::get_article, handlers::get_comments,
        handlers::add_comment, handlers::toggle_like, handlers::list_videos,
        handlers::subscribe, handlers::create_article, handlers::delete_article,
        handlers::get_admin_articles, handlers::create_video, handlers::get_admin_stats,
        handlers::serve_upload
    ),
    components(
        schemas(
            models::Role, models::PublishStatus, models::PublicUser, models::Article,
            models::ArticleView, models::Comment, models::CommentView, models::Like,
            models::LikeToggle, models::Video, models::Subscription, models::AdminStats,
            models::RegisterRequest, models::LoginRequest, models::AuthResponse,
            models::CreateCommentRequest, models::CreateVideoRequest, models::SubscribeRequest,
            models::MessageResponse, models::ArticleForm,
        )
    ),
    tags(
        (name = "gaming-news", description = "Gaming news CMS API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single container of shared services, cloned cheaply into every request.
#[derive(Clone)]
pub struct AppState {
    /// The injected store: Postgres or in-memory.
    pub repo: RepositoryState,
    /// Where uploaded images are written.
    pub storage: StorageState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Rejects the request with 401 unless `AuthUser` can be extracted from it. Role
/// checks happen later, in the handlers.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the routing structure, the scoped auth layers, the `/uploads` surface
/// and the observability stack.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let api = Router::new()
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .nest(
            "/admin",
            admin::admin_routes(state.config.max_upload_bytes).route_layer(
                middleware::from_fn_with_state(state.clone(), auth_middleware),
            ),
        );

    let mut base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/", get(handlers::index))
        .route("/health", get(|| async { "ok" }))
        .nest("/api", api);

    // Disk uploads are plain files; bucket objects are streamed through the storage service.
    base_router = match &state.config.storage {
        StorageConfig::LocalDisk { upload_dir } => {
            base_router.nest_service("/uploads", ServeDir::new(upload_dir))
        }
        StorageConfig::S3 { .. } => {
            base_router.route("/uploads/{*key}", get(handlers::serve_upload))
        }
    };

    base_router
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for `TraceLayer`: method, uri and the `x-request-id` set by the layer above,
/// so every log line of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
