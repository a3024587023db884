use crate::{AppState, handlers};
use axum::{Router, routing::post};

/// Authenticated Router Module
///
/// Routes available to any caller who passed the authentication layer,
/// regardless of role (see `ANY_ROLE` in the permission table). The identity
/// resolved by the `AuthUser` extractor is what gets recorded as the comment
/// author; nothing identity-related is taken from the request body.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // POST /api/posts/{id}/comments
        // Posts a new comment or, with parent_id, a one-level reply.
        .route("/api/posts/{id}/comments", post(handlers::add_comment))
}
