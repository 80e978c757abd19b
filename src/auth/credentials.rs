use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::password::{hash_password, verify_password};
use crate::error::AuthError;
use crate::store::{NewUser, User, UserStore};

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Registration input as supplied by the caller. The plaintext password is
/// consumed by `register` and dropped once hashed.
#[derive(Debug)]
pub struct Registration {
    pub email: String,
    pub username: String,
    pub password: String,
    pub full_name: Option<String>,
}

/// Registration and password authentication against the user store.
pub struct CredentialService {
    store: Arc<dyn UserStore>,
}

impl CredentialService {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Creates a new account. Duplicate email is reported before duplicate
    /// username; both are pre-checked here, but the store's own uniqueness
    /// constraint decides the race between concurrent registrations.
    pub async fn register(&self, reg: Registration) -> Result<User, AuthError> {
        let email = normalize_email(&reg.email);
        if !is_valid_email(&email) {
            return Err(AuthError::Validation("Invalid email".into()));
        }
        let username = reg.username.trim().to_string();
        if username.len() < 3 {
            return Err(AuthError::Validation("Username too short".into()));
        }
        if reg.password.len() < 8 {
            return Err(AuthError::Validation("Password too short".into()));
        }

        if self.store.find_by_email(&email).await?.is_some() {
            warn!(email = %email, "email already registered");
            return Err(AuthError::DuplicateEmail);
        }
        if self.store.find_by_username(&username).await?.is_some() {
            warn!(username = %username, "username already taken");
            return Err(AuthError::DuplicateUsername);
        }

        // Hashing is CPU-bound; keep it off the async workers.
        let plain = reg.password;
        let hash = tokio::task::spawn_blocking(move || hash_password(&plain))
            .await
            .map_err(anyhow::Error::from)??;

        let user = self
            .store
            .create(NewUser {
                email,
                username: Some(username),
                password_hash: Some(hash),
                full_name: reg.full_name,
                is_verified: false,
            })
            .await?;
        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    /// Verifies email + password. Unknown email and wrong password return
    /// the same error, and a disabled account is only reported after the
    /// password verified, so account state never leaks to an attacker who
    /// does not hold the password.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = normalize_email(email);
        let user = self
            .store
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        // Accounts created through an external identity have no password.
        let Some(hash) = user.password_hash.clone() else {
            return Err(AuthError::InvalidCredentials);
        };

        let plain = password.to_string();
        let ok = tokio::task::spawn_blocking(move || verify_password(&plain, &hash))
            .await
            .map_err(anyhow::Error::from)?;
        if !ok {
            warn!(user_id = %user.id, "login with invalid password");
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_active {
            warn!(user_id = %user.id, "login on deactivated account");
            return Err(AuthError::AccountDisabled);
        }

        info!(user_id = %user.id, "user authenticated");
        Ok(user)
    }

    pub async fn lookup(&self, user_id: Uuid) -> Result<User, AuthError> {
        self.store
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use std::mem::discriminant;

    use super::*;
    use crate::store::MemoryUserStore;

    fn service() -> (Arc<MemoryUserStore>, CredentialService) {
        let store = Arc::new(MemoryUserStore::new());
        let service = CredentialService::new(store.clone());
        (store, service)
    }

    fn registration(email: &str, username: &str) -> Registration {
        Registration {
            email: email.into(),
            username: username.into(),
            password: "pw12345678".into(),
            full_name: None,
        }
    }

    #[tokio::test]
    async fn register_creates_active_unverified_user() {
        let (_, service) = service();
        let user = service
            .register(registration("a@x.com", "alice"))
            .await
            .expect("register");
        assert!(user.is_active);
        assert!(!user.is_verified);
        assert_eq!(user.email, "a@x.com");
        assert_eq!(user.username.as_deref(), Some("alice"));
        assert!(user.password_hash.is_some());
    }

    #[tokio::test]
    async fn register_normalizes_email() {
        let (_, service) = service();
        let user = service
            .register(registration("  Alice@X.COM ", "alice"))
            .await
            .expect("register");
        assert_eq!(user.email, "alice@x.com");
    }

    #[tokio::test]
    async fn register_rejects_duplicate_email_with_no_partial_write() {
        let (store, service) = service();
        service
            .register(registration("a@x.com", "alice"))
            .await
            .expect("first register");
        let err = service
            .register(registration("a@x.com", "other"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::DuplicateEmail));
        assert_eq!(store.len(), 1);
        // The failed attempt must not have claimed the username either.
        assert!(store.find_by_username("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn register_checks_email_before_username() {
        let (_, service) = service();
        service
            .register(registration("a@x.com", "alice"))
            .await
            .expect("first register");
        // Both fields collide; the email conflict must win.
        let err = service
            .register(registration("a@x.com", "alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::DuplicateEmail));
    }

    #[tokio::test]
    async fn register_rejects_duplicate_username() {
        let (_, service) = service();
        service
            .register(registration("a@x.com", "alice"))
            .await
            .expect("first register");
        let err = service
            .register(registration("b@x.com", "alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::DuplicateUsername));
    }

    #[tokio::test]
    async fn register_validates_input() {
        let (_, service) = service();
        let err = service
            .register(registration("not-an-email", "alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));

        let err = service
            .register(Registration {
                password: "short".into(),
                ..registration("a@x.com", "alice")
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
    }

    #[tokio::test]
    async fn authenticate_roundtrip() {
        let (_, service) = service();
        let created = service
            .register(registration("a@x.com", "alice"))
            .await
            .expect("register");
        let user = service
            .authenticate("a@x.com", "pw12345678")
            .await
            .expect("authenticate");
        assert_eq!(user.id, created.id);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_are_indistinguishable() {
        let (_, service) = service();
        service
            .register(registration("a@x.com", "alice"))
            .await
            .expect("register");
        let wrong_password = service
            .authenticate("a@x.com", "bad-password")
            .await
            .unwrap_err();
        let unknown_email = service
            .authenticate("nobody@x.com", "pw12345678")
            .await
            .unwrap_err();
        assert!(matches!(wrong_password, AuthError::InvalidCredentials));
        assert_eq!(discriminant(&wrong_password), discriminant(&unknown_email));
    }

    #[tokio::test]
    async fn disabled_account_rejected_only_with_correct_password() {
        let (store, service) = service();
        let user = service
            .register(registration("a@x.com", "alice"))
            .await
            .expect("register");
        store.deactivate(user.id);

        let err = service
            .authenticate("a@x.com", "pw12345678")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AccountDisabled));

        // With the wrong password the caller learns nothing about the
        // account being disabled.
        let err = service
            .authenticate("a@x.com", "bad-password")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn passwordless_account_cannot_authenticate() {
        let (store, service) = service();
        store
            .create(NewUser {
                email: "sso@x.com".into(),
                username: None,
                password_hash: None,
                full_name: None,
                is_verified: true,
            })
            .await
            .expect("create");
        let err = service.authenticate("sso@x.com", "anything").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn lookup_missing_user_is_not_found() {
        let (_, service) = service();
        let err = service.lookup(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AuthError::NotFound));
    }
}
