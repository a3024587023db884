use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
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

// Core application services and components.
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod storage;

// Module for routing segregation (Public, Authenticated, Admin).
pub mod routes;
use auth::{AuthUser, authorize};
use error::ApiError;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

// Makes core state types easily accessible to the application entry point
// and the integration tests.
pub use config::AppConfig;
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use storage::{LocalDiskStorage, MockStorageService, StorageState};

/// ApiDoc
///
/// Auto-generates the OpenAPI documentation for the application by
/// aggregating every handler decorated with `#[utoipa::path]` and every
/// schema decorated with `ToSchema`. The resulting JSON is served at
/// `/api-docs/openapi.json` and rendered at `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::register_user, handlers::login_user,
        handlers::get_posts, handlers::get_post_details, handlers::create_post,
        handlers::update_post, handlers::delete_post,
        handlers::get_comments, handlers::add_comment, handlers::delete_comment,
        handlers::get_metrics
    ),
    components(
        schemas(
            models::Post, models::Comment, models::PublicUser,
            models::RegisterRequest, models::LoginRequest, models::CreateCommentRequest,
            models::AuthResponse, models::PostPage, models::MessageResponse,
            models::BlogMetrics, models::CategoryCount, models::DailyViews,
        )
    ),
    tags(
        (name = "blog-portal", description = "Blog Portal API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, thread-safe container holding all application services and
/// configuration, shared across all incoming requests.
#[derive(Clone)]
pub struct AppState {
    /// Repository Layer: abstracts database access.
    pub repo: RepositoryState,
    /// Storage Layer: abstracts the upload directory on local disk.
    pub storage: StorageState,
    /// Configuration: the loaded, immutable environment configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// Allow extractors and middleware to pull individual components out of the
// shared AppState.

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
/// Route-layer guard for the authenticated routes. The `AuthUser` extractor
/// rejects the request with 401 before the handler runs if the token is
/// missing or invalid; the `authorize` call then consults the permission
/// table, which for these routes admits every known role.
async fn auth_middleware(
    auth_user: AuthUser,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authorize(&auth_user, routes::ANY_ROLE)?;
    Ok(next.run(request).await)
}

/// admin_middleware
///
/// Route-layer guard for the admin routes: authentication via the extractor,
/// then the `ADMIN_ONLY` entry of the permission table. Anonymous callers
/// get 401, authenticated non-admins 403.
async fn admin_middleware(
    auth_user: AuthUser,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authorize(&auth_user, routes::ADMIN_ONLY)?;
    Ok(next.run(request).await)
}

/// create_router
///
/// Assembles the application's entire routing structure, applies global and
/// scoped middleware, and registers the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for request correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    let upload_dir = state.config.upload_dir.clone();

    // 2. Base Router Assembly
    let base_router = Router::new()
        // Documentation: serve the auto-generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Static serving of uploaded images.
        .nest_service("/uploads", ServeDir::new(upload_dir))
        // Public routes: no guard applied.
        .merge(public::public_routes())
        // Authenticated routes: any valid session.
        .merge(
            authenticated::authenticated_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        // Admin routes: valid session plus the admin role.
        .merge(
            admin::admin_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), admin_middleware)),
        )
        // Apply the unified state to all routes.
        .with_state(state);

    // 3. Observability and Correlation Layers (applied outermost)
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. Request ID generation: a unique UUID per incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. Request tracing: wraps the request/response lifecycle in
                // a span carrying the request id.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Request ID propagation back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Customizes the tracing span created per request so every log line of a
/// single request is correlated by its `x-request-id`.
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
