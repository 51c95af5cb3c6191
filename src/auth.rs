use argon2::password_hash::{SaltString, rand_core::OsRng};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::{
    extract::{FromRef, FromRequestParts, OptionalFromRequestParts},
    http::{header, request::Parts},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    error::AppError,
    models::Content,
    repository::RepositoryState,
};

/// Name of the HttpOnly cookie carrying the session token for the HTML pages.
/// The cookie value is the same JWT the API accepts as a bearer token.
pub const SESSION_COOKIE: &str = "cms_session";

/// How long a minted token stays valid.
const TOKEN_TTL_DAYS: i64 = 7;

/// Claims
///
/// Payload structure inside every issued JSON Web Token (JWT). Signed with
/// the server secret and validated on each authenticated request.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the UUID of the user, used to re-fetch the identity
    /// from the users table on every request.
    pub sub: Uuid,
    /// Expiration time (exp): timestamp after which the token is rejected.
    pub exp: usize,
    /// Issued at (iat): timestamp when the token was minted.
    pub iat: usize,
}

/// Signs a fresh token for the given user. Used by both the API login and the
/// HTML login form; the HTML side stores the result in the session cookie.
pub fn mint_token(user_id: Uuid, secret: &str) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id,
        exp: (now + Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize,
        iat: now.timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|err| AppError::Internal(err.to_string()))
}

// --- Password Handling ---

/// Hashes a password with Argon2id and a per-password random salt. The
/// resulting PHC string is the only credential material ever persisted.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AppError::Internal(err.to_string()))
}

/// Verifies a password against a stored PHC hash. An unparsable hash counts
/// as a failed verification rather than an internal error, so a corrupt row
/// cannot be used to log in.
pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

// --- Ownership ---

/// The single ownership rule: only the author may modify or delete a record.
/// Every mutating path goes through this predicate after loading the record.
pub fn can_modify(principal: &AuthUser, content: &Content) -> bool {
    principal.id == content.author_id
}

/// AuthUser
///
/// Resolved identity of an authenticated request; the output of the extractor
/// below. Handlers use it for ownership checks and to stamp new records.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
}

/// AuthUser Extractor
///
/// Implements Axum's `FromRequestParts`, making `AuthUser` usable as an
/// argument in any handler that requires authentication. Two credential
/// sources are accepted:
///
/// 1. `Authorization: Bearer <token>`, the JSON API convention.
/// 2. The `cms_session` cookie that the HTML login form sets.
///
/// The header wins when both are present. After decoding, the subject is
/// looked up in the users table so a deleted account cannot keep using an
/// old token.
///
/// Rejection: [`AppError::AuthRequired`] (401) on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        let token = bearer_token(parts)
            .or_else(|| session_token(parts))
            .ok_or(AppError::AuthRequired)?;

        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let token_data = decode::<Claims>(&token, &decoding_key, &validation).map_err(|err| {
            match err.kind() {
                ErrorKind::ExpiredSignature => tracing::debug!("rejected expired token"),
                _ => tracing::debug!("rejected invalid token"),
            }
            AppError::AuthRequired
        })?;

        // Final verification against the database: the token may be valid
        // while the account no longer exists.
        let user = repo
            .get_user(token_data.claims.sub)
            .await?
            .ok_or(AppError::AuthRequired)?;

        Ok(AuthUser {
            id: user.id,
            username: user.username,
        })
    }
}

/// Optional variant used by the HTML pages, where an anonymous visitor is a
/// normal case (public listing) or triggers a redirect instead of a 401.
impl<S> OptionalFromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(<AuthUser as FromRequestParts<S>>::from_request_parts(parts, state)
            .await
            .ok())
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

fn session_token(parts: &Parts) -> Option<String> {
    CookieJar::from_headers(&parts.headers)
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
}
