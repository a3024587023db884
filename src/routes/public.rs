use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Defines endpoints that are **unauthenticated** and accessible to any
/// client. These cover the read-only blog surface (listing, detail,
/// comments, metrics) and the identity gateway (register/login).
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Unauthenticated liveness endpoint for monitoring and load
        // balancer checks.
        .route("/health", get(|| async { "ok" }))
        // POST /api/auth/register
        // New account creation; answers with a token so it doubles as login.
        .route("/api/auth/register", post(handlers::register_user))
        // POST /api/auth/login
        // Credential exchange for a bearer token.
        .route("/api/auth/login", post(handlers::login_user))
        // GET /api/posts?search=...&category=...&page=...&limit=...
        // Paginated post listing with search and category filters.
        .route("/api/posts", get(handlers::get_posts))
        // GET /api/posts/{id}
        // Detailed view of a single post.
        .route("/api/posts/{id}", get(handlers::get_post_details))
        // GET /api/posts/{id}/comments
        // All comments of a post, newest first.
        .route("/api/posts/{id}/comments", get(handlers::get_comments))
        // GET /api/metrics
        // Dashboard aggregate counts.
        .route("/api/metrics", get(handlers::get_metrics))
}
