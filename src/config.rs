use serde::Deserialize;

/// Signing configuration for session tokens. One shared secret signs and
/// verifies both access and refresh tokens; rotating it invalidates every
/// outstanding token.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_days: i64,
}

/// Trust anchors for third-party identity assertions.
#[derive(Debug, Clone, Deserialize)]
pub struct AssertionConfig {
    pub issuer: String,
    pub audience: String,
    pub secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub assertion: AssertionConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            access_ttl_minutes: std::env::var("ACCESS_TOKEN_EXPIRE_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(30),
            refresh_ttl_days: std::env::var("REFRESH_TOKEN_EXPIRE_DAYS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(7),
        };
        let assertion = AssertionConfig {
            issuer: std::env::var("ASSERTION_ISSUER")
                .unwrap_or_else(|_| "https://accounts.example.com".into()),
            audience: std::env::var("ASSERTION_AUDIENCE").unwrap_or_else(|_| "buzzauth".into()),
            secret: std::env::var("ASSERTION_SECRET")?,
        };
        Ok(Self {
            database_url,
            jwt,
            assertion,
        })
    }
}
