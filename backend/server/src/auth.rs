//! Bearer-credential boundary.
//!
//! Identity issuance lives in the external auth service; this module only
//! *decodes* its opaque tokens. A token is `"<user_id>.<signature>"` where
//! the signature is the hex SHA-256 of the shared secret and the user id.
//! [`issue_token`] exists so tests and local tooling can mint credentials
//! with the same shape.

use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::api::AppState;
use crate::errors::ApiError;

fn signature(secret: &str, user_id: i64) -> String {
    sha256::digest(format!("{secret}:{user_id}"))
}

/// Mint a token for `user_id`.
pub fn issue_token(secret: &str, user_id: i64) -> String {
    format!("{user_id}.{}", signature(secret, user_id))
}

/// Verify a token and extract the user id it names.
pub fn decode_token(secret: &str, token: &str) -> Option<i64> {
    let (id, sig) = token.split_once('.')?;
    let user_id: i64 = id.parse().ok()?;
    (sig == signature(secret, user_id)).then_some(user_id)
}

/// The authenticated caller, extracted from `Authorization: Bearer <token>`
/// or — for WebSocket upgrades, where headers are awkward for browser
/// clients — from a `?token=` query parameter.
#[derive(Debug, Clone, Copy)]
pub struct Identity(pub i64);

fn bearer_token(parts: &Parts) -> Option<&str> {
    let header = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    header.strip_prefix("Bearer ")
}

fn query_token(parts: &Parts) -> Option<&str> {
    parts
        .uri
        .query()?
        .split('&')
        .find_map(|pair| pair.strip_prefix("token="))
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app = AppState::from_ref(state);
        let token = bearer_token(parts)
            .or_else(|| query_token(parts))
            .ok_or(ApiError::Unauthorized)?;

        decode_token(&app.auth_secret, token)
            .map(Identity)
            .ok_or(ApiError::Unauthorized)
    }
}
