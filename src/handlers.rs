use crate::{
    AppState,
    auth::{self, AuthUser},
    error::ApiError,
    models::{
        AuthResponse, BlogMetrics, Comment, CreateCommentRequest, DailyViews, LoginRequest,
        MessageResponse, NewComment, NewPost, NewUser, Post, PostPage, PostUpdate,
        RegisterRequest,
    },
    storage::StorageState,
};
use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};
use chrono::{Days, Utc};
use rand::Rng;
use serde::Deserialize;
use uuid::Uuid;

/// Page size applied when the listing request does not specify one.
const DEFAULT_PAGE_SIZE: i64 = 6;

// --- Filter Structs ---

/// PostFilter
///
/// Accepted query parameters of the public post listing (GET /api/posts).
#[derive(Deserialize, utoipa::IntoParams)]
pub struct PostFilter {
    /// Case-insensitive substring match against title or content.
    pub search: Option<String>,
    /// Exact category match.
    pub category: Option<String>,
    /// 1-based page number, default 1.
    pub page: Option<i64>,
    /// Page size, default 6.
    pub limit: Option<i64>,
}

// --- Shared Helpers ---

/// Maps a path segment onto the store's identifier shape; anything that is
/// not a UUID is a malformed-identifier failure, not a NotFound.
fn parse_post_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::InvalidId("Invalid post ID"))
}

fn parse_comment_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::InvalidId("Invalid comment ID"))
}

/// Conventional address-shape check: non-empty local part, a single '@', a
/// dotted domain, no whitespace anywhere.
fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    !host.is_empty() && !tld.is_empty()
}

/// PostForm
///
/// The decoded multipart body shared by post create and update. Text fields
/// are trimmed, with empty values treated as absent so an update can never
/// blank out a required column; an uploaded image is already persisted and
/// reduced to its serving path.
#[derive(Debug, Default)]
struct PostForm {
    title: Option<String>,
    content: Option<String>,
    author: Option<String>,
    category: Option<String>,
    image: Option<String>,
}

async fn read_post_form(
    multipart: &mut Multipart,
    storage: &StorageState,
) -> Result<PostForm, ApiError> {
    let malformed = || ApiError::Validation(vec!["Malformed form data".to_string()]);

    let mut form = PostForm::default();
    while let Some(field) = multipart.next_field().await.map_err(|_| malformed())? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == "image" {
            let filename = field.file_name().unwrap_or("upload.bin").to_string();
            let data = field.bytes().await.map_err(|_| malformed())?;
            // An empty file part means no image was selected.
            if data.is_empty() {
                continue;
            }
            let path = storage.save_image(&filename, &data).await.map_err(|e| {
                tracing::error!("image upload failed: {}", e);
                ApiError::Internal
            })?;
            form.image = Some(path);
            continue;
        }

        let value = field.text().await.map_err(|_| malformed())?;
        let value = value.trim().to_string();
        if value.is_empty() {
            continue;
        }
        match name.as_str() {
            "title" => form.title = Some(value),
            "content" => form.content = Some(value),
            "author" => form.author = Some(value),
            "category" => form.category = Some(value),
            _ => {}
        }
    }

    Ok(form)
}

// --- Auth Handlers ---

/// register_user
///
/// [Public Route] Creates a new account. All broken validation rules are
/// reported together; uniqueness is pre-checked case-insensitively and
/// re-validated against the store's duplicate-key failure. Responds with a
/// fresh token and the sanitized user, so registration doubles as login.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = AuthResponse),
        (status = 400, description = "Validation failure or duplicate username/email")
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let mut broken_rules = Vec::new();
    if payload.username.trim().chars().count() < 3 {
        broken_rules.push("Username must be at least 3 characters long".to_string());
    }
    if !is_valid_email(payload.email.trim()) {
        broken_rules.push("Please provide a valid email address".to_string());
    }
    if payload.password.chars().count() < 6 {
        broken_rules.push("Password must be at least 6 characters long".to_string());
    }
    if !broken_rules.is_empty() {
        return Err(ApiError::Validation(broken_rules));
    }

    let username = payload.username.trim().to_lowercase();
    let email = payload.email.trim().to_lowercase();

    if let Some(existing) = state.repo.find_user_by_login(&username, &email).await? {
        if existing.email.eq_ignore_ascii_case(&email) {
            return Err(ApiError::Conflict("Email is already registered"));
        }
        return Err(ApiError::Conflict("Username is already taken"));
    }

    // Anything outside the known role set silently becomes a regular user.
    let role = match payload.role.as_deref() {
        Some(r @ ("admin" | "user")) => r,
        _ => "user",
    };

    let password_hash = auth::hash_password(&payload.password)?;
    let user = state
        .repo
        .create_user(NewUser {
            username,
            email,
            password_hash,
            role: role.to_string(),
        })
        .await?;

    let token = auth::issue_token(&user, &state.config.jwt_secret)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "User registered successfully".to_string(),
            token,
            user: user.into(),
        }),
    ))
}

/// login_user
///
/// [Public Route] Exchanges credentials for a bearer token. The email lookup
/// is case-insensitive; an unknown email and a wrong password produce the
/// same answer so the endpoint cannot be used to enumerate accounts.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login_user(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(ApiError::Validation(vec![
            "Email and password are required".to_string(),
        ]));
    }

    let user = state
        .repo
        .find_user_by_email(payload.email.trim())
        .await?
        .ok_or(ApiError::Unauthorized("Invalid credentials"))?;

    if !auth::verify_password(&payload.password, &user.password_hash) {
        return Err(ApiError::Unauthorized("Invalid credentials"));
    }

    let token = auth::issue_token(&user, &state.config.jwt_secret)?;

    Ok(Json(AuthResponse {
        message: "Login successful".to_string(),
        token,
        user: user.into(),
    }))
}

// --- Post Handlers ---

/// get_posts
///
/// [Public Route] Lists posts newest-first with optional search/category
/// filters and a `(page, limit)` pagination window. A page past the end
/// returns an empty list, not an error.
#[utoipa::path(
    get,
    path = "/api/posts",
    params(PostFilter),
    responses((status = 200, description = "One page of posts", body = PostPage))
)]
pub async fn get_posts(
    State(state): State<AppState>,
    Query(filter): Query<PostFilter>,
) -> Result<Json<PostPage>, ApiError> {
    let page = filter.page.unwrap_or(1).max(1);
    let limit = filter.limit.unwrap_or(DEFAULT_PAGE_SIZE).max(1);

    let page_data = state
        .repo
        .list_posts(
            filter.search.filter(|s| !s.is_empty()),
            filter.category.filter(|c| !c.is_empty()),
            page,
            limit,
        )
        .await?;

    Ok(Json(page_data))
}

/// get_post_details
///
/// [Public Route] Retrieves a single post by id.
#[utoipa::path(
    get,
    path = "/api/posts/{id}",
    params(("id" = String, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Found", body = Post),
        (status = 404, description = "Post not found"),
        (status = 400, description = "Invalid post ID")
    )
)]
pub async fn get_post_details(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Post>, ApiError> {
    let id = parse_post_id(&id)?;
    match state.repo.get_post(id).await? {
        Some(post) => Ok(Json(post)),
        None => Err(ApiError::NotFound("Post not found")),
    }
}

/// create_post
///
/// [Admin Route] Creates a post from a multipart form (title, content,
/// author, category, image). `author` defaults to the caller's username and
/// `category` to "Uncategorized"; the optional image lands in the upload
/// directory and only its serving path is stored.
#[utoipa::path(
    post,
    path = "/api/posts",
    responses(
        (status = 201, description = "Created", body = Post),
        (status = 400, description = "Missing title or content"),
        (status = 403, description = "Caller is not an admin")
    )
)]
pub async fn create_post(
    AuthUser { username, .. }: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Post>), ApiError> {
    let form = read_post_form(&mut multipart, &state.storage).await?;

    let mut broken_rules = Vec::new();
    if form.title.is_none() {
        broken_rules.push("Title is required".to_string());
    }
    if form.content.is_none() {
        broken_rules.push("Content is required".to_string());
    }
    let (Some(title), Some(content)) = (form.title, form.content) else {
        return Err(ApiError::Validation(broken_rules));
    };

    let post = state
        .repo
        .create_post(NewPost {
            title,
            content,
            author: form.author.unwrap_or(username),
            category: form
                .category
                .unwrap_or_else(|| "Uncategorized".to_string()),
            image: form.image,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(post)))
}

/// update_post
///
/// [Admin Route] Partial update from a multipart form: only supplied,
/// non-empty fields overwrite existing values, everything else keeps its
/// prior value.
#[utoipa::path(
    put,
    path = "/api/posts/{id}",
    params(("id" = String, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Updated", body = Post),
        (status = 404, description = "Post not found"),
        (status = 400, description = "Invalid post ID")
    )
)]
pub async fn update_post(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<Post>, ApiError> {
    let id = parse_post_id(&id)?;
    let form = read_post_form(&mut multipart, &state.storage).await?;

    let changes = PostUpdate {
        title: form.title,
        content: form.content,
        author: form.author,
        category: form.category,
        image: form.image,
    };

    match state.repo.update_post(id, changes).await? {
        Some(post) => Ok(Json(post)),
        None => Err(ApiError::NotFound("Post not found")),
    }
}

/// delete_post
///
/// [Admin Route] Removes a post by id. Comments referencing the post stay in
/// the store; the observed non-cascading behavior is intentional.
#[utoipa::path(
    delete,
    path = "/api/posts/{id}",
    params(("id" = String, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 404, description = "Post not found"),
        (status = 400, description = "Invalid post ID")
    )
)]
pub async fn delete_post(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_post_id(&id)?;
    if state.repo.delete_post(id).await? {
        Ok(Json(MessageResponse {
            message: "Post deleted successfully".to_string(),
        }))
    } else {
        Err(ApiError::NotFound("Post not found"))
    }
}

// --- Comment Handlers ---

/// get_comments
///
/// [Public Route] All comments of a post, newest first. An unknown post
/// yields an empty list rather than an error.
#[utoipa::path(
    get,
    path = "/api/posts/{id}/comments",
    params(("id" = String, Path, description = "Post ID")),
    responses((status = 200, description = "Comments", body = [Comment]))
)]
pub async fn get_comments(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Comment>>, ApiError> {
    let post_id = parse_post_id(&id)?;
    let comments = state.repo.get_comments(post_id).await?;
    Ok(Json(comments))
}

/// add_comment
///
/// [Authenticated Route] Posts a comment, recording the caller as its
/// author. A supplied `parent_id` files the comment as a reply and must name
/// an existing top-level comment of the same post; replies cannot themselves
/// be replied to.
#[utoipa::path(
    post,
    path = "/api/posts/{id}/comments",
    request_body = CreateCommentRequest,
    params(("id" = String, Path, description = "Post ID")),
    responses(
        (status = 201, description = "Comment added", body = Comment),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Post not found")
    )
)]
pub async fn add_comment(
    AuthUser {
        id: author_id,
        username,
        ..
    }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let post_id = parse_post_id(&id)?;

    let content = payload.content.trim().to_string();
    if content.is_empty() {
        return Err(ApiError::Validation(vec!["Content is required".to_string()]));
    }

    // Comments always reference an existing post at creation time.
    if state.repo.get_post(post_id).await?.is_none() {
        return Err(ApiError::NotFound("Post not found"));
    }

    if let Some(parent_id) = payload.parent_id {
        match state.repo.get_comment(parent_id).await? {
            Some(parent) if parent.post_id == post_id && parent.parent_id.is_none() => {}
            _ => {
                return Err(ApiError::Validation(vec![
                    "parent_id must reference a top-level comment on this post".to_string(),
                ]));
            }
        }
    }

    let comment = state
        .repo
        .add_comment(NewComment {
            post_id,
            author_id,
            author_name: username,
            content,
            parent_id: payload.parent_id,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(comment)))
}

/// delete_comment
///
/// [Admin Route] Removes a comment of a post.
#[utoipa::path(
    delete,
    path = "/api/posts/{id}/comments/{comment_id}",
    params(
        ("id" = String, Path, description = "Post ID"),
        ("comment_id" = String, Path, description = "Comment ID")
    ),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 404, description = "Comment not found")
    )
)]
pub async fn delete_comment(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path((id, comment_id)): Path<(String, String)>,
) -> Result<Json<MessageResponse>, ApiError> {
    let post_id = parse_post_id(&id)?;
    let comment_id = parse_comment_id(&comment_id)?;

    if state.repo.delete_comment(post_id, comment_id).await? {
        Ok(Json(MessageResponse {
            message: "Comment deleted successfully".to_string(),
        }))
    } else {
        Err(ApiError::NotFound("Comment not found"))
    }
}

// --- Metrics ---

/// get_metrics
///
/// [Public Route] Dashboard aggregate: real post/comment counts and the
/// per-category breakdown from the store, plus seven days of synthesized
/// view figures. View tracking does not exist; the numbers are placeholders
/// regenerated on every call.
#[utoipa::path(
    get,
    path = "/api/metrics",
    responses((status = 200, description = "Aggregate metrics", body = BlogMetrics))
)]
pub async fn get_metrics(State(state): State<AppState>) -> Result<Json<BlogMetrics>, ApiError> {
    let snapshot = state.repo.get_metrics().await?;

    let mut rng = rand::rng();
    let today = Utc::now().date_naive();
    let mut views_by_day: Vec<DailyViews> = (0..7u64)
        .map(|days_ago| DailyViews {
            date: (today - Days::new(days_ago)).format("%Y-%m-%d").to_string(),
            views: rng.random_range(0..100),
        })
        .collect();
    // Oldest day first, today last.
    views_by_day.reverse();

    let total_views = views_by_day.iter().map(|day| day.views).sum();

    Ok(Json(BlogMetrics {
        total_posts: snapshot.total_posts,
        total_views,
        total_comments: snapshot.total_comments,
        views_by_day,
        posts_by_category: snapshot.posts_by_category,
    }))
}
