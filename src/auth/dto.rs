use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::credentials::Registration;
use crate::auth::session::SessionTokens;
use crate::store::User;

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

impl From<RegisterRequest> for Registration {
    fn from(req: RegisterRequest) -> Self {
        Registration {
            email: req.email,
            username: req.username,
            password: req.password,
            full_name: req.full_name,
        }
    }
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for token refresh.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Request body for third-party assertion login.
#[derive(Debug, Deserialize)]
pub struct AssertionRequest {
    pub assertion: String,
}

/// Token pair returned after login, refresh or assertion login.
#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
}

impl From<SessionTokens> for TokenPair {
    fn from(tokens: SessionTokens) -> Self {
        TokenPair {
            access_token: tokens.access,
            refresh_token: tokens.refresh,
            token_type: "bearer",
        }
    }
}

/// Outward-facing projection of a user. Never carries the password hash.
#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: Uuid,
    pub email: String,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub is_verified: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        UserView {
            id: user.id,
            email: user.email,
            username: user.username,
            full_name: user.full_name,
            is_active: user.is_active,
            is_verified: user.is_verified,
            created_at: user.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_view_never_exposes_password_hash() {
        let view = UserView::from(User {
            id: Uuid::new_v4(),
            email: "a@x.com".into(),
            username: Some("alice".into()),
            password_hash: Some("$argon2id$secret-material".into()),
            full_name: None,
            is_active: true,
            is_verified: false,
            created_at: OffsetDateTime::now_utc(),
        });
        let json = serde_json::to_string(&view).unwrap();
        assert!(json.contains("a@x.com"));
        assert!(!json.contains("argon2id"));
        assert!(!json.contains("password"));
    }
}
