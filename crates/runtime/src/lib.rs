use std::sync::Arc;

use anyhow::{ensure, Result};
use quill_auth::{
    DefaultPasswordPolicy, SessionManager, SessionPolicy, TokenSigner, MIN_SECRET_BYTES,
};
use quill_config::{AppConfig, AuthConfig};
use quill_database::{initialize_database, SqliteAuthRepository, SqliteUserRepository};
use rand::{rngs::OsRng, RngCore};
use sqlx::SqlitePool;
use tracing::{info, warn};

const GENERATED_SECRET_BYTES: usize = 64;

pub mod telemetry {
    use anyhow::Result;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    pub fn init_tracing() -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = SubscriberBuilder::default()
            .with_env_filter(env_filter)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

#[derive(Clone)]
pub struct BackendServices {
    pub db_pool: SqlitePool,
    pub sessions: SessionManager,
    pub session_store: SqliteAuthRepository,
}

impl BackendServices {
    pub async fn initialise(config: &AppConfig) -> Result<Self> {
        let db_pool = initialize_database(&config.database).await?;

        let secret = signing_secret(&config.auth)?;
        let signer = TokenSigner::new(&secret, config.auth.token_issuer.clone());

        let users = SqliteUserRepository::new(db_pool.clone());
        let session_store = SqliteAuthRepository::new(db_pool.clone());
        let sessions = SessionManager::new(
            Arc::new(users),
            Arc::new(session_store.clone()),
            Arc::new(signer),
            SessionPolicy::from_ttl_seconds(config.auth.session_ttl_seconds),
        )
        .with_password_policy(Arc::new(DefaultPasswordPolicy::new(
            config.auth.password_min_length,
        )));

        info!(
            issuer = %config.auth.token_issuer,
            session_ttl_seconds = sessions.session_ttl().num_seconds(),
            "session manager ready"
        );

        Ok(Self {
            db_pool,
            sessions,
            session_store,
        })
    }
}

/// The configured signing secret, or a fresh random one when none is set.
pub fn signing_secret(config: &AuthConfig) -> Result<Vec<u8>> {
    match &config.signing_secret {
        Some(secret) => {
            ensure!(
                secret.len() >= MIN_SECRET_BYTES,
                "auth.signing_secret must be at least {MIN_SECRET_BYTES} bytes"
            );
            Ok(secret.as_bytes().to_vec())
        }
        None => {
            warn!("no auth.signing_secret configured; generated a random key, sessions will not survive a restart");
            let mut secret = vec![0u8; GENERATED_SECRET_BYTES];
            OsRng.fill_bytes(&mut secret);
            Ok(secret)
        }
    }
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
