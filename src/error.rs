use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::store::StoreError;

/// Every failure the auth core can hand back to a caller.
///
/// Token-path failures (`Unauthorized`, `InvalidRefreshToken`, `NotFound`)
/// all render as the same generic 401 body so a caller cannot tell a bad
/// signature from an expired token from a deleted account.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error("email already registered")]
    DuplicateEmail,
    #[error("username already taken")]
    DuplicateUsername,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("account is deactivated")]
    AccountDisabled,
    #[error("invalid or expired token")]
    Unauthorized,
    #[error("invalid refresh token")]
    InvalidRefreshToken,
    #[error("invalid assertion")]
    InvalidAssertion,
    #[error("user not found")]
    NotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => AuthError::DuplicateEmail,
            StoreError::DuplicateUsername => AuthError::DuplicateUsername,
            StoreError::Backend(e) => AuthError::Internal(e),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AuthError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AuthError::DuplicateEmail | AuthError::DuplicateUsername => {
                (StatusCode::CONFLICT, self.to_string())
            }
            AuthError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "Invalid credentials".into())
            }
            // Only reachable after the password verified, so this does not
            // leak account status to an attacker without the password.
            AuthError::AccountDisabled => (StatusCode::FORBIDDEN, "Account is deactivated".into()),
            AuthError::Unauthorized | AuthError::InvalidRefreshToken | AuthError::NotFound => {
                (StatusCode::UNAUTHORIZED, "Invalid or expired token".into())
            }
            AuthError::InvalidAssertion => (StatusCode::UNAUTHORIZED, "Invalid assertion".into()),
            AuthError::Internal(e) => {
                error!(error = %e, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".into(),
                )
            }
        };
        (status, Json(json!({ "detail": message }))).into_response()
    }
}
