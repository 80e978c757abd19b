use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::config::JwtConfig;

/// Time source for token issuance and expiry checks. Injected so expiry
/// behavior is testable without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Token type used to distinguish access and refresh tokens. Checked on
/// every verification so one kind can never stand in for the other.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Claim set carried inside a signed session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,       // user ID
    pub email: String,   // subject email at issuance
    pub iat: usize,      // issued at (unix timestamp)
    pub exp: usize,      // expires at (unix timestamp)
    pub kind: TokenKind, // access or refresh
}

/// Single opaque rejection for every way a token can be bad: tampered
/// signature, garbage payload, expiry, wrong kind. The distinct causes are
/// logged at debug, never surfaced.
#[derive(Debug, thiserror::Error)]
#[error("invalid or expired token")]
pub struct TokenError;

/// Signs and verifies session tokens with a shared HS256 secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    pub fn new(
        secret: &str,
        access_ttl: Duration,
        refresh_ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl,
            refresh_ttl,
            clock,
        }
    }

    pub fn from_config(cfg: &JwtConfig, clock: Arc<dyn Clock>) -> Self {
        Self::new(
            &cfg.secret,
            Duration::from_secs((cfg.access_ttl_minutes as u64) * 60),
            Duration::from_secs((cfg.refresh_ttl_days as u64) * 24 * 3600),
            clock,
        )
    }

    fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        }
    }

    /// Signs a claim set for `user_id` expiring `ttl(kind)` from now.
    pub fn encode(&self, user_id: Uuid, email: &str, kind: TokenKind) -> anyhow::Result<String> {
        let now = self.clock.now();
        let exp = now + self.ttl(kind);
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            kind,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, kind = ?kind, "token signed");
        Ok(token)
    }

    /// Verifies signature and expiry and returns the claims. Expiry is
    /// checked against the injected clock: a token is rejected from the
    /// instant the current time reaches `exp`.
    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::default();
        // exp must still be present in the payload; it is just checked
        // against our own clock instead of the library's.
        validation.validate_exp = false;
        // session tokens carry no audience claim
        validation.validate_aud = false;
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            debug!(error = %e, "token rejected");
            TokenError
        })?;
        let now = self.clock.now().unix_timestamp();
        if now >= data.claims.exp as i64 {
            debug!(user_id = %data.claims.sub, "token expired");
            return Err(TokenError);
        }
        Ok(data.claims)
    }

    /// Verifies the token and additionally requires a specific kind.
    pub fn decode_expecting(&self, token: &str, kind: TokenKind) -> Result<Claims, TokenError> {
        let claims = self.decode(token)?;
        if claims.kind != kind {
            debug!(user_id = %claims.sub, expected = ?kind, got = ?claims.kind, "token kind mismatch");
            return Err(TokenError);
        }
        Ok(claims)
    }
}
