use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{TimeDelta, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::ApiError,
    models::User,
    repository::RepositoryState,
};

/// Fixed lifetime of an issued bearer token.
const TOKEN_TTL_HOURS: i64 = 24;

/// Claims
///
/// Payload structure of the signed bearer token: the user's id and role plus
/// the standard issued-at/expiry pair. Signed with the server's shared secret
/// and validated on every authenticated request.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user's UUID.
    pub sub: Uuid,
    /// The role embedded at issue time. Treated as a hint only; the extractor
    /// re-reads the authoritative role from the store.
    pub role: String,
    /// Expiration time (exp): timestamp after which the token is rejected.
    pub exp: usize,
    /// Issued at (iat).
    pub iat: usize,
}

/// AuthUser
///
/// The resolved identity of an authenticated request, attached by the
/// extractor below and consumed by handlers and the authorization guards.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    /// Display name, used as the default post/comment author.
    pub username: String,
    /// 'admin' or 'user'.
    pub role: String,
}

/// AuthUser Extractor Implementation
///
/// Implements Axum's FromRequestParts trait, making AuthUser usable as a
/// function argument in any authenticated handler and in the route-layer
/// guards. The flow:
/// 1. Dependency resolution: Repository and AppConfig from the shared state.
/// 2. Local bypass: in `Env::Local` a known user id in the `x-user-id` header
///    authenticates directly, to speed up development and tests.
/// 3. Token validation: Bearer extraction, signature and expiry check.
/// 4. Store lookup: the user must still exist; a valid token for a deleted
///    user is rejected.
///
/// Rejection: `ApiError::Unauthorized` (401) on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        // Development bypass, guarded by the environment check.
        if config.env == Env::Local {
            if let Some(user_id_header) = parts.headers.get("x-user-id") {
                if let Ok(id_str) = user_id_header.to_str() {
                    if let Ok(user_id) = Uuid::parse_str(id_str) {
                        if let Ok(Some(user)) = repo.get_user(user_id).await {
                            return Ok(AuthUser {
                                id: user.id,
                                username: user.username,
                                role: user.role,
                            });
                        }
                    }
                }
            }
        }
        // Fall through to the standard JWT validation flow.

        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthorized("No token provided"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Unauthorized("No token provided"))?;

        let claims = decode_token(token, &config.jwt_secret)?;

        // The token alone is not enough: the user must still be present in
        // the store, and the role used downstream is the stored one.
        let user = repo
            .get_user(claims.sub)
            .await
            .map_err(|_| ApiError::Unauthorized("Invalid token"))?
            .ok_or(ApiError::Unauthorized("Invalid token"))?;

        Ok(AuthUser {
            id: user.id,
            username: user.username,
            role: user.role,
        })
    }
}

/// Mints a signed bearer token for the given user with the fixed 24-hour
/// expiry, embedding `{sub, role}`.
pub fn issue_token(user: &User, secret: &str) -> Result<String, ApiError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.id,
        role: user.role.clone(),
        iat: now.timestamp() as usize,
        exp: (now + TimeDelta::hours(TOKEN_TTL_HOURS)).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| {
        tracing::error!("token encoding failed: {:?}", e);
        ApiError::Internal
    })
}

/// Verifies signature and expiry and returns the decoded claims.
pub fn decode_token(token: &str, secret: &str) -> Result<Claims, ApiError> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::default();
    validation.validate_exp = true;

    decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                ApiError::Unauthorized("Token expired")
            }
            _ => ApiError::Unauthorized("Invalid token"),
        })
}

/// Salts and hashes a password for storage.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            tracing::error!("password hashing failed: {:?}", e);
            ApiError::Internal
        })
}

/// Compares a submitted password against a stored hash. A malformed stored
/// hash counts as a mismatch rather than an error.
pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Authorization Gate
///
/// Pure predicate mapping a resolved identity against a route's declared role
/// set (see `routes::ADMIN_ONLY` / `routes::ANY_ROLE`). No side effects, no
/// state beyond the table entry passed in.
pub fn authorize(user: &AuthUser, required_roles: &[&str]) -> Result<(), ApiError> {
    if required_roles.iter().any(|role| *role == user.role) {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}
