use blog_portal::models::{
    AuthResponse, CreateCommentRequest, Post, PostPage, PublicUser, RegisterRequest, User,
};
use uuid::Uuid;

#[test]
fn test_public_user_never_carries_password_material() {
    // The row type holds the hash; the outbound projection drops it.
    let user = User {
        id: Uuid::new_v4(),
        username: "alice".to_string(),
        email: "alice@example.com".to_string(),
        password_hash: "$argon2id$v=19$secret".to_string(),
        role: "user".to_string(),
    };

    let public: PublicUser = user.into();
    let json = serde_json::to_value(&public).unwrap();

    let keys: Vec<&String> = json.as_object().unwrap().keys().collect();
    assert_eq!(keys.len(), 4);
    assert!(keys.iter().all(|k| !k.contains("password")));
    assert_eq!(json["username"], "alice");
}

#[test]
fn test_auth_response_shape() {
    let response = AuthResponse {
        message: "Login successful".to_string(),
        token: "signed.jwt.token".to_string(),
        user: PublicUser::default(),
    };

    let json = serde_json::to_string(&response).unwrap();
    assert!(json.contains(r#""token":"signed.jwt.token""#));
    assert!(json.contains(r#""user":"#));
    assert!(!json.contains("password"));
}

#[test]
fn test_missing_request_fields_default_to_empty() {
    // A body with absent fields must reach our validation layer instead of
    // failing in serde, so the enumerated rule messages apply.
    let request: RegisterRequest = serde_json::from_str("{}").unwrap();
    assert!(request.username.is_empty());
    assert!(request.email.is_empty());
    assert!(request.password.is_empty());
    assert!(request.role.is_none());

    let request: CreateCommentRequest = serde_json::from_str("{}").unwrap();
    assert!(request.content.is_empty());
    assert!(request.parent_id.is_none());
}

#[test]
fn test_comment_request_accepts_parent_id() {
    let parent = Uuid::new_v4();
    let body = format!(r#"{{"content":"agreed","parent_id":"{}"}}"#, parent);
    let request: CreateCommentRequest = serde_json::from_str(&body).unwrap();
    assert_eq!(request.parent_id, Some(parent));
}

#[test]
fn test_post_serializes_missing_image_as_null() {
    let post = Post::default();
    let json = serde_json::to_value(&post).unwrap();
    assert!(json["image"].is_null());
    assert!(json["created_at"].is_string());
}

#[test]
fn test_post_page_envelope_keys() {
    let page = PostPage {
        posts: vec![],
        current_page: 2,
        total_pages: 5,
        total_posts: 27,
    };

    let json = serde_json::to_value(&page).unwrap();
    assert_eq!(json["current_page"], 2);
    assert_eq!(json["total_pages"], 5);
    assert_eq!(json["total_posts"], 27);
    assert!(json["posts"].as_array().unwrap().is_empty());
}
