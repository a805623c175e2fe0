use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use subtle::ConstantTimeEq;

use crate::errors::AppError;

/// Bearer credential taken from the `Authorization` header.
///
/// Only extracts; comparing against a configured secret is the caller's job
/// (see [`secret_matches`]).
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

#[axum::async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        extract_bearer_token(&parts.headers).map(Self)
    }
}

pub fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let auth_header = headers
        .get("Authorization")
        .ok_or_else(|| AppError::unauthorized("missing authorization header"))?
        .to_str()
        .map_err(|_| AppError::unauthorized("invalid authorization header"))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::unauthorized("authorization header must use Bearer scheme"))?;

    Ok(token.trim().to_string())
}

/// Constant-time comparison of a presented credential with the configured one.
/// An empty configured secret never matches.
pub fn secret_matches(provided: &str, expected: &str) -> bool {
    if expected.is_empty() {
        return false;
    }
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}
