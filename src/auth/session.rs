use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::token::{TokenCodec, TokenKind};
use crate::error::AuthError;
use crate::store::{User, UserStore};

/// Freshly minted access + refresh pair.
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub access: String,
    pub refresh: String,
}

/// Mints token pairs on login, rotates them on refresh, and resolves
/// access tokens back to users.
///
/// There is no revocation list: rotation supersedes the previous refresh
/// token but a stolen one stays usable until its natural expiry.
pub struct SessionIssuer {
    codec: TokenCodec,
    store: Arc<dyn UserStore>,
}

impl SessionIssuer {
    pub fn new(codec: TokenCodec, store: Arc<dyn UserStore>) -> Self {
        Self { codec, store }
    }

    pub fn issue_session(&self, user: &User) -> Result<SessionTokens, AuthError> {
        let access = self.codec.encode(user.id, &user.email, TokenKind::Access)?;
        let refresh = self.codec.encode(user.id, &user.email, TokenKind::Refresh)?;
        info!(user_id = %user.id, "session issued");
        Ok(SessionTokens { access, refresh })
    }

    /// Verifies a refresh token and issues a full new pair. The user is
    /// re-read from the store so a deleted or deactivated account cannot
    /// keep renewing sessions.
    pub async fn refresh(&self, refresh_token: &str) -> Result<(User, SessionTokens), AuthError> {
        let claims = self
            .codec
            .decode_expecting(refresh_token, TokenKind::Refresh)
            .map_err(|_| AuthError::InvalidRefreshToken)?;
        let user = self
            .store
            .find_by_id(claims.sub)
            .await?
            .ok_or(AuthError::NotFound)?;
        if !user.is_active {
            warn!(user_id = %user.id, "refresh on deactivated account");
            return Err(AuthError::InvalidRefreshToken);
        }
        let tokens = self.issue_session(&user)?;
        Ok((user, tokens))
    }

    /// Verifies an access token and returns the current user record, read
    /// fresh from the store so deactivation and deletion take effect
    /// immediately rather than at token expiry.
    pub async fn authorize(&self, access_token: &str) -> Result<User, AuthError> {
        let claims = self
            .codec
            .decode_expecting(access_token, TokenKind::Access)
            .map_err(|_| AuthError::Unauthorized)?;
        let user = self
            .store
            .find_by_id(claims.sub)
            .await?
            .ok_or(AuthError::NotFound)?;
        if !user.is_active {
            warn!(user_id = %user.id, "access token for deactivated account");
            return Err(AuthError::Unauthorized);
        }
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use time::macros::datetime;
    use time::Duration as TimeDuration;

    use super::*;
    use crate::auth::credentials::{CredentialService, Registration};
    use crate::auth::token::test_clock::ManualClock;
    use crate::store::MemoryUserStore;

    struct Fixture {
        store: Arc<MemoryUserStore>,
        clock: Arc<ManualClock>,
        codec: TokenCodec,
        credentials: CredentialService,
        sessions: SessionIssuer,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryUserStore::new());
        let clock = Arc::new(ManualClock::starting_at(datetime!(2025-06-01 12:00 UTC)));
        let codec = TokenCodec::new(
            "dev-secret",
            Duration::from_secs(30 * 60),
            Duration::from_secs(7 * 24 * 3600),
            clock.clone(),
        );
        Fixture {
            store: store.clone(),
            clock,
            codec: codec.clone(),
            credentials: CredentialService::new(store.clone()),
            sessions: SessionIssuer::new(codec, store),
        }
    }

    async fn register_alice(fx: &Fixture) -> User {
        fx.credentials
            .register(Registration {
                email: "a@x.com".into(),
                username: "alice".into(),
                password: "pw12345678".into(),
                full_name: None,
            })
            .await
            .expect("register")
    }

    #[tokio::test]
    async fn login_authorize_refresh_scenario() {
        let fx = fixture();
        let user = register_alice(&fx).await;
        assert!(!user.is_verified);

        let user = fx
            .credentials
            .authenticate("a@x.com", "pw12345678")
            .await
            .expect("login");
        let tokens = fx.sessions.issue_session(&user).expect("issue");

        let access_claims = fx
            .codec
            .decode_expecting(&tokens.access, TokenKind::Access)
            .expect("access claims");
        assert_eq!(access_claims.exp - access_claims.iat, 1800);
        assert_eq!(access_claims.email, "a@x.com");

        let authorized = fx.sessions.authorize(&tokens.access).await.expect("authorize");
        assert_eq!(authorized.id, user.id);

        let (refreshed_user, new_pair) =
            fx.sessions.refresh(&tokens.refresh).await.expect("refresh");
        assert_eq!(refreshed_user.id, user.id);
        assert_ne!(new_pair.refresh, tokens.refresh);

        // Rotation does not revoke: the original access token stays valid
        // until its own expiry.
        fx.sessions
            .authorize(&tokens.access)
            .await
            .expect("old access token still valid");
    }

    #[tokio::test]
    async fn refresh_rejects_access_token() {
        let fx = fixture();
        register_alice(&fx).await;
        let user = fx
            .credentials
            .authenticate("a@x.com", "pw12345678")
            .await
            .expect("login");
        let tokens = fx.sessions.issue_session(&user).expect("issue");
        let err = fx.sessions.refresh(&tokens.access).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidRefreshToken));
    }

    #[tokio::test]
    async fn authorize_rejects_refresh_token() {
        let fx = fixture();
        let user = register_alice(&fx).await;
        let tokens = fx.sessions.issue_session(&user).expect("issue");
        let err = fx.sessions.authorize(&tokens.refresh).await.unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized));
    }

    #[tokio::test]
    async fn refresh_fails_for_deleted_account() {
        let fx = fixture();
        let user = register_alice(&fx).await;
        let tokens = fx.sessions.issue_session(&user).expect("issue");
        fx.store.remove(user.id);
        let err = fx.sessions.refresh(&tokens.refresh).await.unwrap_err();
        assert!(matches!(err, AuthError::NotFound));
    }

    #[tokio::test]
    async fn deactivation_takes_effect_immediately() {
        let fx = fixture();
        let user = register_alice(&fx).await;
        let tokens = fx.sessions.issue_session(&user).expect("issue");
        fx.store.deactivate(user.id);

        let err = fx.sessions.authorize(&tokens.access).await.unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized));
        let err = fx.sessions.refresh(&tokens.refresh).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidRefreshToken));
    }

    #[tokio::test]
    async fn expired_access_token_rejected() {
        let fx = fixture();
        let user = register_alice(&fx).await;
        let tokens = fx.sessions.issue_session(&user).expect("issue");
        fx.clock.advance(TimeDuration::minutes(30));
        let err = fx.sessions.authorize(&tokens.access).await.unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized));
    }
}
