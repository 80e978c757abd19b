use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
};

use crate::error::AuthError;

/// Pulls the raw token out of the `Authorization: Bearer ...` header.
/// Verification happens in the session issuer, not here.
pub struct BearerToken(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(AuthError::Unauthorized)?;
        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .ok_or(AuthError::Unauthorized)?;
        Ok(BearerToken(token.to_string()))
    }
}
