use std::sync::Arc;

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tracing::{debug, info};

use crate::auth::credentials::normalize_email;
use crate::config::AssertionConfig;
use crate::error::AuthError;
use crate::store::{NewUser, StoreError, User, UserStore};

/// Identity attested by the external provider after its assertion checked
/// out.
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    pub email: String,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
}

/// Single opaque rejection for every way an assertion can fail: bad
/// signature, wrong issuer or audience, expired.
#[derive(Debug, thiserror::Error)]
#[error("invalid assertion")]
pub struct AssertionError;

/// Verifies a raw third-party assertion against the provider's published
/// keys and expected audience.
pub trait AssertionVerifier: Send + Sync {
    fn verify(&self, raw: &str, expected_audience: &str)
        -> Result<VerifiedIdentity, AssertionError>;
}

#[derive(Debug, Deserialize)]
struct AssertionClaims {
    email: String,
    #[serde(default)]
    given_name: Option<String>,
    #[serde(default)]
    family_name: Option<String>,
}

/// Verifier for providers that issue JWT assertions. Signature, issuer,
/// audience, and expiry are all checked by the JWT library; any failure
/// collapses to `AssertionError`.
pub struct JwtAssertionVerifier {
    decoding: DecodingKey,
    algorithm: Algorithm,
    issuer: String,
}

impl JwtAssertionVerifier {
    pub fn hs256(secret: &str, issuer: &str) -> Self {
        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            algorithm: Algorithm::HS256,
            issuer: issuer.to_string(),
        }
    }

    /// For providers publishing an RSA key in PEM form.
    pub fn rs256_pem(pem: &[u8], issuer: &str) -> anyhow::Result<Self> {
        Ok(Self {
            decoding: DecodingKey::from_rsa_pem(pem)?,
            algorithm: Algorithm::RS256,
            issuer: issuer.to_string(),
        })
    }
}

impl AssertionVerifier for JwtAssertionVerifier {
    fn verify(
        &self,
        raw: &str,
        expected_audience: &str,
    ) -> Result<VerifiedIdentity, AssertionError> {
        let mut validation = Validation::new(self.algorithm);
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation.set_audience(&[expected_audience]);
        let data = decode::<AssertionClaims>(raw, &self.decoding, &validation).map_err(|e| {
            debug!(error = %e, "assertion rejected");
            AssertionError
        })?;
        Ok(VerifiedIdentity {
            email: data.claims.email,
            given_name: data.claims.given_name,
            family_name: data.claims.family_name,
        })
    }
}

/// Logs a user in from a third-party identity assertion, creating a local
/// account on first sight. Assertion-created accounts carry no password
/// hash and count as verified, since the provider attested the address.
pub struct ExternalIdentityBridge {
    verifier: Arc<dyn AssertionVerifier>,
    store: Arc<dyn UserStore>,
    audience: String,
}

impl ExternalIdentityBridge {
    pub fn new(
        verifier: Arc<dyn AssertionVerifier>,
        store: Arc<dyn UserStore>,
        config: &AssertionConfig,
    ) -> Self {
        Self {
            verifier,
            store,
            audience: config.audience.clone(),
        }
    }

    pub async fn login_with_assertion(&self, raw: &str) -> Result<User, AuthError> {
        let identity = self
            .verifier
            .verify(raw, &self.audience)
            .map_err(|_| AuthError::InvalidAssertion)?;
        let email = normalize_email(&identity.email);

        if let Some(user) = self.store.find_by_email(&email).await? {
            info!(user_id = %user.id, "assertion login for existing account");
            return Ok(user);
        }

        let full_name = match (identity.given_name, identity.family_name) {
            (Some(given), Some(family)) => Some(format!("{given} {family}")),
            (Some(given), None) => Some(given),
            (None, Some(family)) => Some(family),
            (None, None) => None,
        };
        match self
            .store
            .create(NewUser {
                email: email.clone(),
                username: None,
                password_hash: None,
                full_name,
                is_verified: true,
            })
            .await
        {
            Ok(user) => {
                info!(user_id = %user.id, "account created from assertion");
                Ok(user)
            }
            // Lost the creation race to a concurrent assertion login for
            // the same address; the winner's account is ours too.
            Err(StoreError::DuplicateEmail) => self
                .store
                .find_by_email(&email)
                .await?
                .ok_or(AuthError::NotFound),
            Err(e) => Err(e.into()),
        }
    }
}
