use crate::{
    api,
    auth::{
        Argon2Verifier, AuthConfig, AuthService, PgSessionStore, PgUserStore, SessionStore,
        Signer, UserStore,
    },
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub access_secret: SecretString,
    pub refresh_secret: SecretString,
    pub issuer: String,
    pub audience: String,
    pub access_ttl_seconds: u64,
    pub refresh_ttl_seconds: u64,
    pub min_password_length: usize,
    pub request_timeout_seconds: u64,
    pub production: bool,
}

impl Args {
    #[must_use]
    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig::new(self.access_secret.clone(), self.refresh_secret.clone())
            .with_issuer(self.issuer.clone())
            .with_audience(self.audience.clone())
            .with_access_ttl(Duration::from_secs(self.access_ttl_seconds))
            .with_refresh_ttl(Duration::from_secs(self.refresh_ttl_seconds))
            .with_min_password_length(self.min_password_length)
            .with_request_timeout(Duration::from_secs(self.request_timeout_seconds))
            .with_production(self.production)
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the secrets are invalid, the database is unreachable or the server fails.
pub async fn execute(args: Args) -> Result<()> {
    let config = args.auth_config();

    // Reject weak secrets before touching the database or binding a port.
    Signer::new(&config).context("Invalid signing secrets")?;

    debug!(
        issuer = config.issuer(),
        audience = config.audience(),
        production = config.cookie_secure(),
        "Auth configuration loaded"
    );

    let pool = api::connect(&args.dsn).await?;

    let sessions: Arc<dyn SessionStore> = Arc::new(PgSessionStore::new(pool.clone()));
    let users: Arc<dyn UserStore> = Arc::new(PgUserStore::new(pool));
    let service = AuthService::new(config, sessions, users, Arc::new(Argon2Verifier))
        .context("Failed to build auth service")?;

    info!("Starting {} {}", env!("CARGO_PKG_NAME"), crate::GIT_COMMIT_HASH);

    api::serve(args.port, Arc::new(service)).await
}
