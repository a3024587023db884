use axum::{
    extract::FromRequestParts,
    http::{Request, header},
};
use blog_portal::{
    AppConfig, AppState, InMemoryRepository, MockStorageService,
    auth::{self, AuthUser, Claims, authorize},
    config::Env,
    error::ApiError,
    models::{NewUser, User},
    repository::{Repository, RepositoryState},
    routes,
    storage::StorageState,
};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use std::sync::Arc;
use uuid::Uuid;

/// Builds an AppState around an in-memory repository holding exactly one
/// user of the given role.
async fn state_with_user(role: &str) -> (AppState, Arc<InMemoryRepository>, User) {
    let repo = Arc::new(InMemoryRepository::new());
    let user = repo
        .create_user(NewUser {
            username: "tester".to_string(),
            email: "tester@example.com".to_string(),
            password_hash: auth::hash_password("secret123").unwrap(),
            role: role.to_string(),
        })
        .await
        .unwrap();

    let state = AppState {
        repo: repo.clone() as RepositoryState,
        storage: Arc::new(MockStorageService::new()) as StorageState,
        config: AppConfig::default(),
    };
    (state, repo, user)
}

fn parts_with_headers(headers: &[(&str, String)]) -> axum::http::request::Parts {
    let mut builder = Request::builder().uri("/");
    for (name, value) in headers {
        builder = builder.header(*name, value.as_str());
    }
    let (parts, _) = builder.body(()).unwrap().into_parts();
    parts
}

#[tokio::test]
async fn test_bearer_token_resolves_identity() {
    let (state, _repo, user) = state_with_user("admin").await;
    let token = auth::issue_token(&user, &state.config.jwt_secret).unwrap();

    let mut parts = parts_with_headers(&[("authorization", format!("Bearer {}", token))]);
    let resolved = AuthUser::from_request_parts(&mut parts, &state)
        .await
        .expect("valid token must authenticate");

    assert_eq!(resolved.id, user.id);
    assert_eq!(resolved.username, "tester");
    assert_eq!(resolved.role, "admin");
}

#[tokio::test]
async fn test_missing_token_rejected() {
    let (state, _repo, _user) = state_with_user("user").await;

    let mut parts = parts_with_headers(&[]);
    let result = AuthUser::from_request_parts(&mut parts, &state).await;
    assert!(matches!(result, Err(ApiError::Unauthorized(_))));
}

#[tokio::test]
async fn test_malformed_token_rejected() {
    let (state, _repo, _user) = state_with_user("user").await;

    let mut parts =
        parts_with_headers(&[("authorization", "Bearer not.a.real.token".to_string())]);
    let result = AuthUser::from_request_parts(&mut parts, &state).await;
    assert!(matches!(result, Err(ApiError::Unauthorized(_))));
}

#[tokio::test]
async fn test_expired_token_rejected() {
    let (state, _repo, user) = state_with_user("user").await;

    // Expired an hour ago, well past any validation leeway.
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user.id,
        role: user.role.clone(),
        iat: (now - 7200) as usize,
        exp: (now - 3600) as usize,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.config.jwt_secret.as_bytes()),
    )
    .unwrap();

    let mut parts = parts_with_headers(&[("authorization", format!("Bearer {}", token))]);
    let result = AuthUser::from_request_parts(&mut parts, &state).await;
    assert!(matches!(result, Err(ApiError::Unauthorized(_))));
}

#[tokio::test]
async fn test_token_for_deleted_user_rejected() {
    let (state, _repo, _user) = state_with_user("user").await;

    // Signed correctly, but the subject does not exist in the store.
    let ghost = User {
        id: Uuid::new_v4(),
        role: "admin".to_string(),
        ..Default::default()
    };
    let token = auth::issue_token(&ghost, &state.config.jwt_secret).unwrap();

    let mut parts = parts_with_headers(&[("authorization", format!("Bearer {}", token))]);
    let result = AuthUser::from_request_parts(&mut parts, &state).await;
    assert!(matches!(result, Err(ApiError::Unauthorized(_))));
}

#[tokio::test]
async fn test_local_bypass_header_only_works_in_local_env() {
    let (state, repo, user) = state_with_user("admin").await;
    assert_eq!(state.config.env, Env::Local);

    let mut parts = parts_with_headers(&[("x-user-id", user.id.to_string())]);
    let resolved = AuthUser::from_request_parts(&mut parts, &state)
        .await
        .expect("bypass must work in local env");
    assert_eq!(resolved.id, user.id);

    // The same header is ignored in production; with no token the request
    // is unauthorized.
    let mut config = AppConfig::default();
    config.env = Env::Production;
    let prod_state = AppState {
        repo: repo as RepositoryState,
        storage: Arc::new(MockStorageService::new()) as StorageState,
        config,
    };
    let mut parts = parts_with_headers(&[("x-user-id", user.id.to_string())]);
    let result = AuthUser::from_request_parts(&mut parts, &prod_state).await;
    assert!(matches!(result, Err(ApiError::Unauthorized(_))));
}

#[tokio::test]
async fn test_bearer_prefix_is_required() {
    let (state, _repo, user) = state_with_user("user").await;
    let token = auth::issue_token(&user, &state.config.jwt_secret).unwrap();

    let mut parts = parts_with_headers(&[(header::AUTHORIZATION.as_str(), token)]);
    let result = AuthUser::from_request_parts(&mut parts, &state).await;
    assert!(matches!(result, Err(ApiError::Unauthorized(_))));
}

#[test]
fn test_authorize_consults_the_permission_table() {
    let admin = AuthUser {
        id: Uuid::new_v4(),
        username: "a".to_string(),
        role: "admin".to_string(),
    };
    let user = AuthUser {
        id: Uuid::new_v4(),
        username: "u".to_string(),
        role: "user".to_string(),
    };

    assert!(authorize(&admin, routes::ADMIN_ONLY).is_ok());
    assert!(authorize(&admin, routes::ANY_ROLE).is_ok());
    assert!(authorize(&user, routes::ANY_ROLE).is_ok());
    assert!(matches!(
        authorize(&user, routes::ADMIN_ONLY),
        Err(ApiError::Forbidden)
    ));
}

#[test]
fn test_password_hashing_roundtrip() {
    let hash = auth::hash_password("secret123").unwrap();

    // Salted hash, never the raw password.
    assert_ne!(hash, "secret123");
    assert!(auth::verify_password("secret123", &hash));
    assert!(!auth::verify_password("wrong", &hash));

    // A corrupt stored hash counts as a mismatch, not a panic.
    assert!(!auth::verify_password("secret123", "not-a-hash"));
}

#[test]
fn test_issued_token_decodes_to_its_claims() {
    let user = User {
        id: Uuid::new_v4(),
        role: "admin".to_string(),
        ..Default::default()
    };
    let token = auth::issue_token(&user, "some-secret").unwrap();

    let claims = auth::decode_token(&token, "some-secret").unwrap();
    assert_eq!(claims.sub, user.id);
    assert_eq!(claims.role, "admin");
    assert!(claims.exp > claims.iat);

    // A different secret must not validate.
    assert!(auth::decode_token(&token, "other-secret").is_err());
}
