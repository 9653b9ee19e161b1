//! Auth configuration shared by the signer, the service and the cookie helpers.

use secrecy::SecretString;
use std::time::Duration;

const DEFAULT_ISSUER: &str = "luxsuv-api";
const DEFAULT_AUDIENCE: &str = "luxsuv-clients";
const DEFAULT_ACCESS_TTL_SECONDS: u64 = 15 * 60;
const DEFAULT_REFRESH_TTL_SECONDS: u64 = 7 * 24 * 60 * 60;
const DEFAULT_MIN_SECRET_BYTES: usize = 32;
const DEFAULT_MIN_PASSWORD_LENGTH: usize = 8;
const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 3;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    access_secret: SecretString,
    refresh_secret: SecretString,
    issuer: String,
    audience: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
    min_secret_bytes: usize,
    min_password_length: usize,
    request_timeout: Duration,
    production: bool,
}

impl AuthConfig {
    #[must_use]
    pub fn new(access_secret: SecretString, refresh_secret: SecretString) -> Self {
        Self {
            access_secret,
            refresh_secret,
            issuer: DEFAULT_ISSUER.to_string(),
            audience: DEFAULT_AUDIENCE.to_string(),
            access_ttl: Duration::from_secs(DEFAULT_ACCESS_TTL_SECONDS),
            refresh_ttl: Duration::from_secs(DEFAULT_REFRESH_TTL_SECONDS),
            min_secret_bytes: DEFAULT_MIN_SECRET_BYTES,
            min_password_length: DEFAULT_MIN_PASSWORD_LENGTH,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECONDS),
            production: false,
        }
    }

    #[must_use]
    pub fn with_issuer(mut self, issuer: String) -> Self {
        self.issuer = issuer;
        self
    }

    #[must_use]
    pub fn with_audience(mut self, audience: String) -> Self {
        self.audience = audience;
        self
    }

    #[must_use]
    pub fn with_access_ttl(mut self, ttl: Duration) -> Self {
        self.access_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_refresh_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_min_secret_bytes(mut self, bytes: usize) -> Self {
        self.min_secret_bytes = bytes;
        self
    }

    #[must_use]
    pub fn with_min_password_length(mut self, length: usize) -> Self {
        self.min_password_length = length;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Production mode only changes the cookie `Secure` attribute.
    #[must_use]
    pub fn with_production(mut self, production: bool) -> Self {
        self.production = production;
        self
    }

    pub(crate) fn access_secret(&self) -> &SecretString {
        &self.access_secret
    }

    pub(crate) fn refresh_secret(&self) -> &SecretString {
        &self.refresh_secret
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    #[must_use]
    pub fn audience(&self) -> &str {
        &self.audience
    }

    #[must_use]
    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    #[must_use]
    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    #[must_use]
    pub fn min_secret_bytes(&self) -> usize {
        self.min_secret_bytes
    }

    #[must_use]
    pub fn min_password_length(&self) -> usize {
        self.min_password_length
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        self.production
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(value: &str) -> SecretString {
        SecretString::from(value.to_string())
    }

    #[test]
    fn auth_config_defaults_and_overrides() {
        let config = AuthConfig::new(secret("a"), secret("b"));

        assert_eq!(config.issuer(), DEFAULT_ISSUER);
        assert_eq!(config.audience(), DEFAULT_AUDIENCE);
        assert_eq!(config.access_ttl(), Duration::from_secs(900));
        assert_eq!(config.refresh_ttl(), Duration::from_secs(604_800));
        assert_eq!(config.min_secret_bytes(), 32);
        assert_eq!(config.min_password_length(), 8);
        assert_eq!(config.request_timeout(), Duration::from_secs(3));
        assert!(!config.cookie_secure());

        let config = config
            .with_issuer("issuer.test".to_string())
            .with_audience("audience.test".to_string())
            .with_access_ttl(Duration::from_secs(60))
            .with_refresh_ttl(Duration::from_secs(120))
            .with_min_password_length(12)
            .with_request_timeout(Duration::from_secs(1))
            .with_production(true);

        assert_eq!(config.issuer(), "issuer.test");
        assert_eq!(config.audience(), "audience.test");
        assert_eq!(config.access_ttl(), Duration::from_secs(60));
        assert_eq!(config.refresh_ttl(), Duration::from_secs(120));
        assert_eq!(config.min_password_length(), 12);
        assert_eq!(config.request_timeout(), Duration::from_secs(1));
        assert!(config.cookie_secure());
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let config = AuthConfig::new(secret("super-secret-access"), secret("super-secret-refresh"));
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret-access"));
        assert!(!debug.contains("super-secret-refresh"));
    }
}
