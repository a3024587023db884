use crate::error::RepositoryError;
use crate::models::{
    CategoryCount, Comment, MetricsSnapshot, NewComment, NewPost, NewUser, Post, PostPage,
    PostUpdate, User,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use sqlx::{PgPool, QueryBuilder};
use uuid::Uuid;

/// Repository Trait
///
/// The abstract contract for all persistence operations: the Resource Access
/// Layer the handlers talk to. Handlers never see the concrete store, which
/// keeps them testable against the in-memory implementation below.
///
/// **Send + Sync + async_trait** make the trait object (`Arc<dyn Repository>`)
/// shareable across Axum's task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Posts ---
    /// One pagination window of posts matching the optional search/category
    /// filters, newest first. `page` is 1-based.
    async fn list_posts(
        &self,
        search: Option<String>,
        category: Option<String>,
        page: i64,
        limit: i64,
    ) -> Result<PostPage, RepositoryError>;
    async fn get_post(&self, id: Uuid) -> Result<Option<Post>, RepositoryError>;
    async fn create_post(&self, new: NewPost) -> Result<Post, RepositoryError>;
    /// Partial update: only `Some` fields overwrite. Returns None when the
    /// post does not exist.
    async fn update_post(&self, id: Uuid, changes: PostUpdate)
    -> Result<Option<Post>, RepositoryError>;
    /// Returns true if a row was removed. Comments of the post are left in
    /// place; there is no cascade.
    async fn delete_post(&self, id: Uuid) -> Result<bool, RepositoryError>;

    // --- Comments ---
    async fn get_comments(&self, post_id: Uuid) -> Result<Vec<Comment>, RepositoryError>;
    async fn get_comment(&self, id: Uuid) -> Result<Option<Comment>, RepositoryError>;
    async fn add_comment(&self, new: NewComment) -> Result<Comment, RepositoryError>;
    async fn delete_comment(
        &self,
        post_id: Uuid,
        comment_id: Uuid,
    ) -> Result<bool, RepositoryError>;

    // --- Users / Auth ---
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepositoryError>;
    /// Case-insensitive email lookup, used by login.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;
    /// Case-insensitive lookup by username OR email, used for the uniqueness
    /// pre-check during registration.
    async fn find_user_by_login(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<User>, RepositoryError>;
    /// Inserts a user. A duplicate-key failure from the store is reported as
    /// `RepositoryError::Duplicate` even when the pre-check raced and missed.
    async fn create_user(&self, new: NewUser) -> Result<User, RepositoryError>;

    // --- Metrics ---
    /// Counters for the dashboard aggregate: post/comment totals and the
    /// per-category group-by.
    async fn get_metrics(&self) -> Result<MetricsSnapshot, RepositoryError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the
/// application state.
pub type RepositoryState = Arc<dyn Repository>;

const POST_COLUMNS: &str = "id, title, content, author, category, image, created_at, updated_at";
const COMMENT_COLUMNS: &str = "id, post_id, author_id, author_name, content, parent_id, created_at";
const USER_COLUMNS: &str = "id, username, email, password_hash, role";

/// Appends the optional search/category predicates shared by the count and
/// page queries of the post listing.
fn apply_post_filters(
    builder: &mut QueryBuilder<'_, sqlx::Postgres>,
    search: &Option<String>,
    category: &Option<String>,
) {
    let mut prefix = " WHERE ";

    if let Some(s) = search {
        // Case-insensitive substring match against title OR content.
        let pattern = format!("%{}%", s);
        builder.push(prefix);
        builder.push("(title ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR content ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
        prefix = " AND ";
    }

    if let Some(c) = category {
        builder.push(prefix);
        builder.push("category = ");
        builder.push_bind(c.clone());
    }
}

/// Translates a unique-constraint failure into the field-level duplicate the
/// handlers answer Conflict with; any other database error passes through.
fn map_unique_violation(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db) = e {
        if db.is_unique_violation() {
            let constraint = db.constraint().unwrap_or_default();
            if constraint.contains("email") {
                return RepositoryError::Duplicate("email");
            }
            if constraint.contains("username") {
                return RepositoryError::Duplicate("username");
            }
        }
    }
    RepositoryError::Database(e)
}

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by the
/// PostgreSQL connection pool. All queries use the runtime-checked sqlx API
/// with bound parameters.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    /// list_posts
    ///
    /// Runs the shared filter predicates twice: once for the total count the
    /// pagination arithmetic needs, once for the requested window. Ordering
    /// is `created_at DESC` with `id DESC` breaking timestamp ties so pages
    /// never shuffle between requests.
    async fn list_posts(
        &self,
        search: Option<String>,
        category: Option<String>,
        page: i64,
        limit: i64,
    ) -> Result<PostPage, RepositoryError> {
        let mut count_builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM posts");
        apply_post_filters(&mut count_builder, &search, &category);
        let total_posts: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM posts", POST_COLUMNS));
        apply_post_filters(&mut builder, &search, &category);
        builder.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        builder.push_bind(limit);
        builder.push(" OFFSET ");
        builder.push_bind((page - 1) * limit);

        let posts = builder
            .build_query_as::<Post>()
            .fetch_all(&self.pool)
            .await?;

        let total_pages = if total_posts == 0 {
            0
        } else {
            (total_posts + limit - 1) / limit
        };

        Ok(PostPage {
            posts,
            current_page: page,
            total_pages,
            total_posts,
        })
    }

    async fn get_post(&self, id: Uuid) -> Result<Option<Post>, RepositoryError> {
        let post = sqlx::query_as::<_, Post>(&format!(
            "SELECT {} FROM posts WHERE id = $1",
            POST_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(post)
    }

    async fn create_post(&self, new: NewPost) -> Result<Post, RepositoryError> {
        let post = sqlx::query_as::<_, Post>(&format!(
            "INSERT INTO posts (id, title, content, author, category, image, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW()) RETURNING {}",
            POST_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(new.title)
        .bind(new.content)
        .bind(new.author)
        .bind(new.category)
        .bind(new.image)
        .fetch_one(&self.pool)
        .await?;
        Ok(post)
    }

    /// update_post
    ///
    /// Uses COALESCE so only the supplied fields overwrite existing values;
    /// a NULL bind leaves the column untouched. `updated_at` always advances.
    async fn update_post(
        &self,
        id: Uuid,
        changes: PostUpdate,
    ) -> Result<Option<Post>, RepositoryError> {
        let post = sqlx::query_as::<_, Post>(&format!(
            "UPDATE posts \
             SET title = COALESCE($2, title), \
                 content = COALESCE($3, content), \
                 author = COALESCE($4, author), \
                 category = COALESCE($5, category), \
                 image = COALESCE($6, image), \
                 updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            POST_COLUMNS
        ))
        .bind(id)
        .bind(changes.title)
        .bind(changes.content)
        .bind(changes.author)
        .bind(changes.category)
        .bind(changes.image)
        .fetch_optional(&self.pool)
        .await?;
        Ok(post)
    }

    async fn delete_post(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_comments(&self, post_id: Uuid) -> Result<Vec<Comment>, RepositoryError> {
        let comments = sqlx::query_as::<_, Comment>(&format!(
            "SELECT {} FROM comments WHERE post_id = $1 ORDER BY created_at DESC, id DESC",
            COMMENT_COLUMNS
        ))
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(comments)
    }

    async fn get_comment(&self, id: Uuid) -> Result<Option<Comment>, RepositoryError> {
        let comment = sqlx::query_as::<_, Comment>(&format!(
            "SELECT {} FROM comments WHERE id = $1",
            COMMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(comment)
    }

    async fn add_comment(&self, new: NewComment) -> Result<Comment, RepositoryError> {
        let comment = sqlx::query_as::<_, Comment>(&format!(
            "INSERT INTO comments (id, post_id, author_id, author_name, content, parent_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, NOW()) RETURNING {}",
            COMMENT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(new.post_id)
        .bind(new.author_id)
        .bind(new.author_name)
        .bind(new.content)
        .bind(new.parent_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(comment)
    }

    async fn delete_comment(
        &self,
        post_id: Uuid,
        comment_id: Uuid,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1 AND post_id = $2")
            .bind(comment_id)
            .bind(post_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE LOWER(email) = LOWER($1)",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_login(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE LOWER(username) = LOWER($1) OR LOWER(email) = LOWER($2)",
            USER_COLUMNS
        ))
        .bind(username)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create_user(&self, new: NewUser) -> Result<User, RepositoryError> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, username, email, password_hash, role) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.role)
        .fetch_one(&self.pool)
        .await
        .map_err(map_unique_violation)
    }

    /// get_metrics
    ///
    /// Compiles the store-derived dashboard counters in one call.
    async fn get_metrics(&self) -> Result<MetricsSnapshot, RepositoryError> {
        let total_posts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await?;
        let total_comments: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments")
            .fetch_one(&self.pool)
            .await?;
        let posts_by_category = sqlx::query_as::<_, CategoryCount>(
            "SELECT category AS name, COUNT(*) AS value FROM posts \
             GROUP BY category ORDER BY COUNT(*) DESC, category ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(MetricsSnapshot {
            total_posts,
            total_comments,
            posts_by_category,
        })
    }
}

/// InMemoryRepository
///
/// A store-free implementation of `Repository` used by the integration tests,
/// mirroring the SQL semantics above: same filtering, same ordering, same
/// duplicate detection. Lives next to the real implementation the same way
/// `MockStorageService` does in the storage module.
#[derive(Default)]
pub struct InMemoryRepository {
    posts: Mutex<Vec<Post>>,
    comments: Mutex<Vec<Comment>>,
    users: Mutex<Vec<User>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a fully-formed post, timestamps included. Test seeding hook
    /// for cases `create_post` cannot produce, e.g. identical timestamps.
    pub fn seed_post(&self, post: Post) {
        self.posts.lock().unwrap().push(post);
    }
}

fn sort_newest_first(posts: &mut [Post]) {
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn list_posts(
        &self,
        search: Option<String>,
        category: Option<String>,
        page: i64,
        limit: i64,
    ) -> Result<PostPage, RepositoryError> {
        let mut matching: Vec<Post> = self
            .posts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| {
                let search_ok = match &search {
                    Some(s) => {
                        let needle = s.to_lowercase();
                        p.title.to_lowercase().contains(&needle)
                            || p.content.to_lowercase().contains(&needle)
                    }
                    None => true,
                };
                let category_ok = match &category {
                    Some(c) => &p.category == c,
                    None => true,
                };
                search_ok && category_ok
            })
            .cloned()
            .collect();

        sort_newest_first(&mut matching);

        let total_posts = matching.len() as i64;
        let total_pages = if total_posts == 0 {
            0
        } else {
            (total_posts + limit - 1) / limit
        };
        let posts = matching
            .into_iter()
            .skip(((page - 1) * limit) as usize)
            .take(limit as usize)
            .collect();

        Ok(PostPage {
            posts,
            current_page: page,
            total_pages,
            total_posts,
        })
    }

    async fn get_post(&self, id: Uuid) -> Result<Option<Post>, RepositoryError> {
        Ok(self
            .posts
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == id)
            .cloned())
    }

    async fn create_post(&self, new: NewPost) -> Result<Post, RepositoryError> {
        let now = Utc::now();
        let post = Post {
            id: Uuid::new_v4(),
            title: new.title,
            content: new.content,
            author: new.author,
            category: new.category,
            image: new.image,
            created_at: now,
            updated_at: now,
        };
        self.posts.lock().unwrap().push(post.clone());
        Ok(post)
    }

    async fn update_post(
        &self,
        id: Uuid,
        changes: PostUpdate,
    ) -> Result<Option<Post>, RepositoryError> {
        let mut posts = self.posts.lock().unwrap();
        let Some(post) = posts.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };

        if let Some(title) = changes.title {
            post.title = title;
        }
        if let Some(content) = changes.content {
            post.content = content;
        }
        if let Some(author) = changes.author {
            post.author = author;
        }
        if let Some(category) = changes.category {
            post.category = category;
        }
        if let Some(image) = changes.image {
            post.image = Some(image);
        }
        post.updated_at = Utc::now();

        Ok(Some(post.clone()))
    }

    async fn delete_post(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let mut posts = self.posts.lock().unwrap();
        let before = posts.len();
        posts.retain(|p| p.id != id);
        Ok(posts.len() < before)
    }

    async fn get_comments(&self, post_id: Uuid) -> Result<Vec<Comment>, RepositoryError> {
        let mut comments: Vec<Comment> = self
            .comments
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(comments)
    }

    async fn get_comment(&self, id: Uuid) -> Result<Option<Comment>, RepositoryError> {
        Ok(self
            .comments
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn add_comment(&self, new: NewComment) -> Result<Comment, RepositoryError> {
        let comment = Comment {
            id: Uuid::new_v4(),
            post_id: new.post_id,
            author_id: new.author_id,
            author_name: new.author_name,
            content: new.content,
            parent_id: new.parent_id,
            created_at: Utc::now(),
        };
        self.comments.lock().unwrap().push(comment.clone());
        Ok(comment)
    }

    async fn delete_comment(
        &self,
        post_id: Uuid,
        comment_id: Uuid,
    ) -> Result<bool, RepositoryError> {
        let mut comments = self.comments.lock().unwrap();
        let before = comments.len();
        comments.retain(|c| !(c.id == comment_id && c.post_id == post_id));
        Ok(comments.len() < before)
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == id)
            .cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_user_by_login(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| {
                u.username.eq_ignore_ascii_case(username) || u.email.eq_ignore_ascii_case(email)
            })
            .cloned())
    }

    async fn create_user(&self, new: NewUser) -> Result<User, RepositoryError> {
        let mut users = self.users.lock().unwrap();

        // Same duplicate detection the unique indexes provide in Postgres.
        if users.iter().any(|u| u.email.eq_ignore_ascii_case(&new.email)) {
            return Err(RepositoryError::Duplicate("email"));
        }
        if users
            .iter()
            .any(|u| u.username.eq_ignore_ascii_case(&new.username))
        {
            return Err(RepositoryError::Duplicate("username"));
        }

        let user = User {
            id: Uuid::new_v4(),
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            role: new.role,
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn get_metrics(&self) -> Result<MetricsSnapshot, RepositoryError> {
        let total_posts = self.posts.lock().unwrap().len() as i64;
        let total_comments = self.comments.lock().unwrap().len() as i64;

        let mut by_category: HashMap<String, i64> = HashMap::new();
        for post in self.posts.lock().unwrap().iter() {
            *by_category.entry(post.category.clone()).or_insert(0) += 1;
        }
        let mut posts_by_category: Vec<CategoryCount> = by_category
            .into_iter()
            .map(|(name, value)| CategoryCount { name, value })
            .collect();
        posts_by_category.sort_by(|a, b| b.value.cmp(&a.value).then(a.name.cmp(&b.name)));

        Ok(MetricsSnapshot {
            total_posts,
            total_comments,
            posts_by_category,
        })
    }
}
