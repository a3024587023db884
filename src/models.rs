use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// Canonical identity record from the `users` table. Deliberately does NOT
/// derive `Serialize`: the password hash must never appear in a response, so
/// every outbound path goes through [`PublicUser`] instead.
#[derive(Debug, Clone, Deserialize, FromRow, Default)]
pub struct User {
    pub id: Uuid,
    // Stored lowercased; unique.
    pub username: String,
    // Stored lowercased; unique.
    pub email: String,
    // Argon2 salted hash, never the raw password.
    pub password_hash: String,
    // The RBAC field: 'admin' or 'user'.
    pub role: String,
}

/// PublicUser
///
/// The sanitized projection of a [`User`] returned by the auth endpoints and
/// mirrored client-side next to the token.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: String,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
        }
    }
}

/// Post
///
/// A blog post record from the `posts` table. The primary data structure of
/// the application.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    // Display name; defaults to the creating caller's username.
    pub author: String,
    pub category: String,
    // Relative URL of the uploaded cover image, if any.
    pub image: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Comment
///
/// A comment on a post. `parent_id` points at a top-level comment of the same
/// post when the comment is a reply; replies nest one level only.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub author_name: String,
    pub content: String,
    pub parent_id: Option<Uuid>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

// --- Request Payloads (Input Schemas) ---

/// RegisterRequest
///
/// Input for POST /api/auth/register. Fields default to empty strings so a
/// missing field fails our own validation (with its enumerated rule message)
/// rather than serde's.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    /// Optional role request; anything outside {admin, user} falls back to user.
    pub role: Option<String>,
}

/// LoginRequest
///
/// Input for POST /api/auth/login.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// CreateCommentRequest
///
/// Input for posting a new comment. Supplying `parent_id` files the comment
/// as a reply to an existing top-level comment.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateCommentRequest {
    #[serde(default)]
    pub content: String,
    pub parent_id: Option<Uuid>,
}

// --- Internal Write Types ---

/// NewPost
///
/// Fully-resolved post fields handed to the repository after the multipart
/// form has been validated and defaults applied.
#[derive(Debug, Clone, Default)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub author: String,
    pub category: String,
    pub image: Option<String>,
}

/// PostUpdate
///
/// Partial update: only `Some` fields overwrite existing values, mirroring
/// the COALESCE update in the repository.
#[derive(Debug, Clone, Default)]
pub struct PostUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub author: Option<String>,
    pub category: Option<String>,
    pub image: Option<String>,
}

/// NewComment
///
/// Comment fields handed to the repository; identity fields come from the
/// authenticated caller, never from the request body.
#[derive(Debug, Clone, Default)]
pub struct NewComment {
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub author_name: String,
    pub content: String,
    pub parent_id: Option<Uuid>,
}

/// NewUser
///
/// User fields handed to the repository. `password_hash` is already hashed.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
}

// --- Response Envelopes (Output Schemas) ---

/// AuthResponse
///
/// Output of register/login: the signed bearer token plus the sanitized user.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AuthResponse {
    pub message: String,
    pub token: String,
    pub user: PublicUser,
}

/// PostPage
///
/// One pagination window of the post listing, newest first.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PostPage {
    pub posts: Vec<Post>,
    pub current_page: i64,
    /// ceil(total_posts / limit); 0 when there are no matches.
    pub total_pages: i64,
    pub total_posts: i64,
}

/// MessageResponse
///
/// Plain confirmation body for delete operations.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

/// CategoryCount
///
/// One group-by bucket of the metrics aggregate, shaped for the dashboard's
/// chart widgets.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct CategoryCount {
    pub name: String,
    pub value: i64,
}

/// DailyViews
///
/// One synthesized day of view counts. Placeholder data: views are not
/// tracked anywhere.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct DailyViews {
    pub date: String,
    pub views: i64,
}

/// BlogMetrics
///
/// Output of GET /api/metrics, consumed by the admin dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct BlogMetrics {
    pub total_posts: i64,
    pub total_views: i64,
    pub total_comments: i64,
    pub views_by_day: Vec<DailyViews>,
    pub posts_by_category: Vec<CategoryCount>,
}

/// MetricsSnapshot
///
/// The store-derived portion of [`BlogMetrics`], produced by the repository
/// before the handler layers the synthesized view figures on top.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub total_posts: i64,
    pub total_comments: i64,
    pub posts_by_category: Vec<CategoryCount>,
}
