//! Login, refresh rotation and logout.

use chrono::{DateTime, Utc};
use regex::Regex;
use std::{future::Future, sync::Arc};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    config::AuthConfig,
    error::AuthError,
    password::{DUMMY_HASH, PasswordVerifier},
    session::{ClientMeta, SessionStore},
    signer::{AccessClaims, Signer, SignerError, TokenError},
    users::{UserStore, normalize_email},
};

const BAD_LOGIN_INPUT: &str = "email and password are required";

/// Tokens handed back to the client after login or refresh.
#[derive(Debug)]
pub struct IssuedTokens {
    pub access_token: String,
    pub access_expires_at: DateTime<Utc>,
    /// Raw refresh credential; only ever placed in the response cookie.
    pub refresh_token: String,
    pub session_id: Uuid,
}

/// Absolute deadline shared by every boundary call of one operation.
#[derive(Clone, Copy)]
struct Deadline(Instant);

impl Deadline {
    fn after(config: &AuthConfig) -> Self {
        Self(Instant::now() + config.request_timeout())
    }

    async fn run<T, E, F>(self, future: F) -> Result<T, AuthError>
    where
        F: Future<Output = Result<T, E>>,
        AuthError: From<E>,
    {
        timeout_at(self.0, future)
            .await
            .map_err(|_| AuthError::Timeout)?
            .map_err(AuthError::from)
    }
}

pub(crate) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

pub struct AuthService {
    config: AuthConfig,
    signer: Signer,
    sessions: Arc<dyn SessionStore>,
    users: Arc<dyn UserStore>,
    verifier: Arc<dyn PasswordVerifier>,
}

impl AuthService {
    /// # Errors
    /// Returns [`SignerError::SecretsInvalid`] when either secret is too short.
    pub fn new(
        config: AuthConfig,
        sessions: Arc<dyn SessionStore>,
        users: Arc<dyn UserStore>,
        verifier: Arc<dyn PasswordVerifier>,
    ) -> Result<Self, SignerError> {
        let signer = Signer::new(&config)?;
        Ok(Self {
            config,
            signer,
            sessions,
            users,
            verifier,
        })
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Validate an access token presented by a client.
    ///
    /// # Errors
    /// Returns the [`TokenError`] kind describing why the token was rejected.
    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        self.signer.verify_access(token)
    }

    /// # Errors
    /// `BadRequest` for malformed input (no storage access), `InvalidCredentials`
    /// for unknown, inactive or wrong-password accounts alike.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        client: ClientMeta,
    ) -> Result<IssuedTokens, AuthError> {
        let email = normalize_email(email);
        let password = password.trim();
        if email.is_empty()
            || !valid_email(&email)
            || password.chars().count() < self.config.min_password_length()
        {
            return Err(AuthError::BadRequest(BAD_LOGIN_INPUT.to_string()));
        }

        let deadline = Deadline::after(&self.config);
        let user = deadline.run(self.users.find_by_email(&email)).await?;

        let candidate = match &user {
            Some(user) if user.is_active => user.password_hash.clone(),
            _ => DUMMY_HASH.to_string(),
        };
        let verifier = Arc::clone(&self.verifier);
        let password = password.to_string();
        let matches = deadline
            .run(tokio::task::spawn_blocking(move || {
                verifier.verify(&password, &candidate)
            }))
            .await?;

        let user = match user {
            Some(user) if user.is_active && matches => user,
            Some(user) if !user.is_active => {
                debug!(user_id = %user.id, "login rejected: account inactive");
                return Err(AuthError::InvalidCredentials);
            }
            Some(user) => {
                debug!(user_id = %user.id, "login rejected: password mismatch");
                return Err(AuthError::InvalidCredentials);
            }
            None => {
                debug!("login rejected: unknown email");
                return Err(AuthError::InvalidCredentials);
            }
        };

        let (access_token, access_expires_at) = self.signer.mint_access(user.id, user.role)?;
        let refresh_token = self.signer.mint_refresh_value()?;
        let token_hash = self.signer.hash_refresh_value(&refresh_token);

        let session = deadline
            .run(self.sessions.create(
                user.id,
                token_hash,
                &client,
                self.config.refresh_ttl(),
            ))
            .await?;

        info!(user_id = %user.id, session_id = %session.id, role = %user.role, "login succeeded");

        Ok(IssuedTokens {
            access_token,
            access_expires_at,
            refresh_token,
            session_id: session.id,
        })
    }

    /// Exchange a refresh credential for new tokens, consuming the old one.
    ///
    /// # Errors
    /// `Unauthorized` when the credential is missing, unknown, expired or the
    /// account is inactive; `ReuseDetected` when it was already consumed, in
    /// which case its whole family has been revoked.
    pub async fn refresh(
        &self,
        presented: Option<&str>,
        client: ClientMeta,
    ) -> Result<IssuedTokens, AuthError> {
        let Some(presented) = presented.filter(|value| !value.is_empty()) else {
            return Err(AuthError::Unauthorized);
        };
        let deadline = Deadline::after(&self.config);
        let token_hash = self.signer.hash_refresh_value(presented);

        let session = deadline
            .run(self.sessions.find_by_hash(&token_hash))
            .await?
            .ok_or(AuthError::Unauthorized)?;

        if session.expires_at <= Utc::now() {
            return Err(AuthError::Unauthorized);
        }

        let user = deadline.run(self.users.find_by_id(session.user_id)).await?;
        let Some(user) = user.filter(|user| user.is_active) else {
            deadline
                .run(self.sessions.revoke_family(session.family_id))
                .await?;
            info!(user_id = %session.user_id, family_id = %session.family_id, "refresh rejected: account inactive");
            return Err(AuthError::Unauthorized);
        };

        let refresh_token = self.signer.mint_refresh_value()?;
        let successor = deadline
            .run(self.sessions.rotate(
                session.id,
                self.signer.hash_refresh_value(&refresh_token),
                &client,
                self.config.refresh_ttl(),
            ))
            .await
            .inspect_err(|err| {
                if let AuthError::ReuseDetected { family_id, user_id } = err {
                    warn!(%user_id, %family_id, session_id = %session.id, "refresh credential reuse detected");
                }
            })?;

        let (access_token, access_expires_at) = self.signer.mint_access(user.id, user.role)?;

        debug!(user_id = %user.id, session_id = %successor.id, family_id = %successor.family_id, "session rotated");

        Ok(IssuedTokens {
            access_token,
            access_expires_at,
            refresh_token,
            session_id: successor.id,
        })
    }

    /// Revoke the session behind a refresh credential. Missing or unknown
    /// credentials are already logged out.
    ///
    /// # Errors
    /// Only storage failures and deadline expiry.
    pub async fn logout(&self, presented: Option<&str>) -> Result<(), AuthError> {
        let Some(presented) = presented.filter(|value| !value.is_empty()) else {
            return Ok(());
        };
        let deadline = Deadline::after(&self.config);
        let token_hash = self.signer.hash_refresh_value(presented);

        if let Some(session) = deadline.run(self.sessions.find_by_hash(&token_hash)).await? {
            deadline.run(self.sessions.revoke(session.id)).await?;
            debug!(user_id = %session.user_id, session_id = %session.id, "session revoked");
        }
        Ok(())
    }

    /// Revoke every session of `user_id`. Returns the number revoked.
    ///
    /// # Errors
    /// Only storage failures and deadline expiry.
    pub async fn logout_all(&self, user_id: Uuid) -> Result<u64, AuthError> {
        let deadline = Deadline::after(&self.config);
        let revoked = deadline
            .run(self.sessions.revoke_all_for_user(user_id))
            .await?;
        info!(%user_id, revoked, "all sessions revoked");
        Ok(revoked)
    }

    /// # Errors
    /// Returns the store error when the session store is unreachable.
    pub async fn ping(&self) -> Result<(), AuthError> {
        Deadline::after(&self.config)
            .run(self.sessions.ping())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{
        error::StoreError,
        password::{Argon2Verifier, hash_password},
        role::Role,
        session::{MemorySessionStore, Session},
        users::{MemoryUserStore, User},
    };
    use async_trait::async_trait;
    use secrecy::SecretString;
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    const PASSWORD: &str = "longenough1";

    fn config() -> AuthConfig {
        AuthConfig::new(
            SecretString::from("access-secret-access-secret-0123".to_string()),
            SecretString::from("refresh-secret-refresh-secret-01".to_string()),
        )
    }

    struct Fixture {
        service: AuthService,
        sessions: Arc<MemorySessionStore>,
        users: Arc<CountingUsers>,
        user: User,
    }

    /// Counts lookups so tests can assert storage was never touched.
    #[derive(Default)]
    struct CountingUsers {
        inner: MemoryUserStore,
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl UserStore for CountingUsers {
        async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.find_by_email(email).await
        }

        async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.find_by_id(user_id).await
        }
    }

    async fn fixture_with(config: AuthConfig) -> Fixture {
        let sessions = Arc::new(MemorySessionStore::new());
        let users = Arc::new(CountingUsers::default());
        let user = User {
            id: Uuid::new_v4(),
            email: "a@b.com".to_string(),
            password_hash: hash_password(PASSWORD).expect("hash test password"),
            role: Role::Driver,
            is_active: true,
        };
        users.inner.insert(user.clone()).await;

        let service = AuthService::new(
            config,
            sessions.clone(),
            users.clone(),
            Arc::new(Argon2Verifier),
        )
        .expect("valid test secrets");

        Fixture {
            service,
            sessions,
            users,
            user,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(config()).await
    }

    async fn session_for(fixture: &Fixture, id: Uuid) -> Option<Session> {
        fixture.sessions.get(id).await
    }

    #[tokio::test]
    async fn login_issues_tokens_and_stores_only_the_hash() -> Result<(), AuthError> {
        let fixture = fixture().await;
        let client = ClientMeta {
            user_agent: Some("ua".to_string()),
            ip: "203.0.113.9".parse().ok(),
        };
        let tokens = fixture.service.login(" A@B.com ", PASSWORD, client).await?;

        let claims = fixture
            .service
            .verify_access(&tokens.access_token)
            .map_err(AuthError::from)?;
        assert_eq!(claims.user_id, fixture.user.id);
        assert_eq!(claims.role, Role::Driver);

        let session = session_for(&fixture, tokens.session_id)
            .await
            .expect("session stored");
        assert_ne!(session.token_hash, tokens.refresh_token.as_bytes());
        assert_eq!(session.user_agent.as_deref(), Some("ua"));
        assert_eq!(session.ip, "203.0.113.9".parse().ok());
        Ok(())
    }

    #[tokio::test]
    async fn malformed_login_never_touches_storage() {
        let fixture = fixture().await;
        for (email, password) in [
            ("", PASSWORD),
            ("   ", PASSWORD),
            ("not-an-email", PASSWORD),
            ("a@b.com", "short"),
        ] {
            let result = fixture
                .service
                .login(email, password, ClientMeta::default())
                .await;
            assert!(matches!(result, Err(AuthError::BadRequest(_))), "{email:?}");
        }
        assert_eq!(fixture.users.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn password_is_trimmed_before_checks() -> Result<(), AuthError> {
        let fixture = fixture().await;
        fixture
            .service
            .login("a@b.com", "  longenough1 ", ClientMeta::default())
            .await?;
        let lookups = fixture.users.lookups.load(Ordering::SeqCst);

        let result = fixture
            .service
            .login("a@b.com", "       x", ClientMeta::default())
            .await;
        assert!(matches!(result, Err(AuthError::BadRequest(_))));
        assert_eq!(fixture.users.lookups.load(Ordering::SeqCst), lookups);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_inactive_and_wrong_password_are_identical() {
        let fixture = fixture().await;
        let unknown = fixture
            .service
            .login("nobody@b.com", PASSWORD, ClientMeta::default())
            .await;
        let wrong = fixture
            .service
            .login("a@b.com", "wrongpassword", ClientMeta::default())
            .await;
        fixture.users.inner.set_active(fixture.user.id, false).await;
        let inactive = fixture
            .service
            .login("a@b.com", PASSWORD, ClientMeta::default())
            .await;

        for result in [unknown, wrong, inactive] {
            assert!(matches!(result, Err(AuthError::InvalidCredentials)));
        }
    }

    #[tokio::test]
    async fn refresh_rotates_and_replay_revokes_family() -> Result<(), AuthError> {
        let fixture = fixture().await;
        let first = fixture
            .service
            .login("a@b.com", PASSWORD, ClientMeta::default())
            .await?;
        let second = fixture
            .service
            .refresh(Some(&first.refresh_token), ClientMeta::default())
            .await?;
        assert_ne!(second.refresh_token, first.refresh_token);

        let replay = fixture
            .service
            .refresh(Some(&first.refresh_token), ClientMeta::default())
            .await;
        assert!(matches!(replay, Err(AuthError::ReuseDetected { .. })));

        let after = fixture
            .service
            .refresh(Some(&second.refresh_token), ClientMeta::default())
            .await;
        assert!(matches!(after, Err(AuthError::ReuseDetected { .. })));

        let now = Utc::now();
        let successor = session_for(&fixture, second.session_id)
            .await
            .expect("successor stored");
        for session in fixture.sessions.family(successor.family_id).await {
            assert!(!session.is_usable(now));
        }
        Ok(())
    }

    #[tokio::test]
    async fn refresh_without_or_with_unknown_cookie_is_unauthorized() {
        let fixture = fixture().await;
        for presented in [None, Some(""), Some("never-issued")] {
            let result = fixture
                .service
                .refresh(presented, ClientMeta::default())
                .await;
            assert!(matches!(result, Err(AuthError::Unauthorized)));
        }
    }

    #[tokio::test]
    async fn refresh_of_expired_session_is_unauthorized() -> Result<(), AuthError> {
        let fixture = fixture_with(config().with_refresh_ttl(Duration::ZERO)).await;
        let tokens = fixture
            .service
            .login("a@b.com", PASSWORD, ClientMeta::default())
            .await?;
        let result = fixture
            .service
            .refresh(Some(&tokens.refresh_token), ClientMeta::default())
            .await;
        assert!(matches!(result, Err(AuthError::Unauthorized)));
        Ok(())
    }

    #[tokio::test]
    async fn refresh_for_deactivated_user_revokes_session() -> Result<(), AuthError> {
        let fixture = fixture().await;
        let tokens = fixture
            .service
            .login("a@b.com", PASSWORD, ClientMeta::default())
            .await?;
        fixture.users.inner.set_active(fixture.user.id, false).await;

        let result = fixture
            .service
            .refresh(Some(&tokens.refresh_token), ClientMeta::default())
            .await;
        assert!(matches!(result, Err(AuthError::Unauthorized)));
        let revoked = session_for(&fixture, tokens.session_id)
            .await
            .and_then(|session| session.revoked_at);
        assert!(revoked.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn refresh_for_deactivated_user_revokes_whole_family() -> Result<(), AuthError> {
        let fixture = fixture().await;
        let first = fixture
            .service
            .login("a@b.com", PASSWORD, ClientMeta::default())
            .await?;
        let second = fixture
            .service
            .refresh(Some(&first.refresh_token), ClientMeta::default())
            .await?;
        fixture.users.inner.set_active(fixture.user.id, false).await;

        // Replaying the consumed credential still takes the successor down.
        let result = fixture
            .service
            .refresh(Some(&first.refresh_token), ClientMeta::default())
            .await;
        assert!(matches!(result, Err(AuthError::Unauthorized)));
        let successor = session_for(&fixture, second.session_id)
            .await
            .and_then(|session| session.revoked_at);
        assert!(successor.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn logout_is_idempotent() -> Result<(), AuthError> {
        let fixture = fixture().await;
        let tokens = fixture
            .service
            .login("a@b.com", PASSWORD, ClientMeta::default())
            .await?;

        fixture.service.logout(Some(&tokens.refresh_token)).await?;
        fixture.service.logout(Some(&tokens.refresh_token)).await?;
        fixture.service.logout(None).await?;
        fixture.service.logout(Some("garbage")).await?;

        let revoked = session_for(&fixture, tokens.session_id)
            .await
            .and_then(|session| session.revoked_at);
        assert!(revoked.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn logout_all_revokes_every_session() -> Result<(), AuthError> {
        let fixture = fixture().await;
        let a = fixture
            .service
            .login("a@b.com", PASSWORD, ClientMeta::default())
            .await?;
        let b = fixture
            .service
            .login("a@b.com", PASSWORD, ClientMeta::default())
            .await?;

        assert_eq!(fixture.service.logout_all(fixture.user.id).await?, 2);

        for tokens in [a, b] {
            let result = fixture
                .service
                .refresh(Some(&tokens.refresh_token), ClientMeta::default())
                .await;
            assert!(matches!(result, Err(AuthError::ReuseDetected { .. })));
        }
        Ok(())
    }

    struct SlowSessions;

    #[async_trait]
    impl SessionStore for SlowSessions {
        async fn create(
            &self,
            _: Uuid,
            _: Vec<u8>,
            _: &ClientMeta,
            _: Duration,
        ) -> Result<Session, StoreError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Err(StoreError::NotFound)
        }

        async fn find_by_hash(&self, _: &[u8]) -> Result<Option<Session>, StoreError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(None)
        }

        async fn rotate(
            &self,
            _: Uuid,
            _: Vec<u8>,
            _: &ClientMeta,
            _: Duration,
        ) -> Result<Session, StoreError> {
            Err(StoreError::NotFound)
        }

        async fn revoke(&self, _: Uuid) -> Result<(), StoreError> {
            Ok(())
        }

        async fn revoke_all_for_user(&self, _: Uuid) -> Result<u64, StoreError> {
            Ok(0)
        }

        async fn revoke_family(&self, _: Uuid) -> Result<u64, StoreError> {
            Ok(0)
        }

        async fn ping(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn slow_store_times_out() {
        let config = config().with_request_timeout(Duration::from_millis(20));
        let service = AuthService::new(
            config,
            Arc::new(SlowSessions),
            Arc::new(MemoryUserStore::new()),
            Arc::new(Argon2Verifier),
        )
        .expect("valid test secrets");
        let result = service
            .refresh(Some("anything"), ClientMeta::default())
            .await;
        assert!(matches!(result, Err(AuthError::Timeout)));
    }

    #[test]
    fn short_secrets_are_rejected_at_construction() {
        let config = AuthConfig::new(
            SecretString::from("short".to_string()),
            SecretString::from("refresh-secret-refresh-secret-01".to_string()),
        );
        let result = AuthService::new(
            config,
            Arc::new(MemorySessionStore::new()),
            Arc::new(MemoryUserStore::new()),
            Arc::new(Argon2Verifier),
        );
        assert!(matches!(result, Err(SignerError::SecretsInvalid { .. })));
    }

    #[test]
    fn email_shape() {
        assert!(valid_email("a@b.com"));
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("a@b"));
        assert!(!valid_email("a b@c.com"));
    }
}
