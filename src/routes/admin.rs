use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, post, put},
};

/// Admin Router Module
///
/// All write operations on posts and comment moderation, restricted to the
/// 'admin' role (see `ADMIN_ONLY` in the permission table). The role check
/// itself lives in the route-layer guard wired up in `create_router`, not in
/// the handlers.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // POST /api/posts
        // Creates a post from a multipart form, including the optional image.
        .route("/api/posts", post(handlers::create_post))
        // PUT/DELETE /api/posts/{id}
        // Partial update and removal of a post.
        .route(
            "/api/posts/{id}",
            put(handlers::update_post).delete(handlers::delete_post),
        )
        // DELETE /api/posts/{id}/comments/{comment_id}
        // Comment moderation.
        .route(
            "/api/posts/{id}/comments/{comment_id}",
            delete(handlers::delete_comment),
        )
}
