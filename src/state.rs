use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::auth::bridge::{AssertionVerifier, ExternalIdentityBridge, JwtAssertionVerifier};
use crate::auth::credentials::CredentialService;
use crate::auth::session::SessionIssuer;
use crate::auth::token::{Clock, SystemClock, TokenCodec};
use crate::config::AppConfig;
use crate::store::{PgUserStore, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub credentials: Arc<CredentialService>,
    pub sessions: Arc<SessionIssuer>,
    pub bridge: Arc<ExternalIdentityBridge>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
            tracing::warn!(error = %e, "migration failed; continuing");
        }

        let store: Arc<dyn UserStore> = Arc::new(PgUserStore::new(pool));
        let verifier: Arc<dyn AssertionVerifier> = Arc::new(JwtAssertionVerifier::hs256(
            &config.assertion.secret,
            &config.assertion.issuer,
        ));
        Ok(Self::from_parts(store, verifier, Arc::new(SystemClock), config))
    }

    /// Wires the services from explicit collaborators. Everything the core
    /// needs is passed in here; there is no hidden global state.
    pub fn from_parts(
        store: Arc<dyn UserStore>,
        verifier: Arc<dyn AssertionVerifier>,
        clock: Arc<dyn Clock>,
        config: Arc<AppConfig>,
    ) -> Self {
        let codec = TokenCodec::from_config(&config.jwt, clock);
        let credentials = Arc::new(CredentialService::new(store.clone()));
        let sessions = Arc::new(SessionIssuer::new(codec, store.clone()));
        let bridge = Arc::new(ExternalIdentityBridge::new(
            verifier,
            store,
            &config.assertion,
        ));
        Self {
            credentials,
            sessions,
            bridge,
            config,
        }
    }
}
