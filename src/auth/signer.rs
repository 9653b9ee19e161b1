//! Access token minting/verification and refresh credential generation.
//!
//! Access tokens are HS256 JWTs keyed by the access secret. Refresh credentials
//! are opaque random values; the store only ever sees their HMAC-SHA256 digest
//! keyed by the refresh secret, so a database read yields nothing usable.

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use hmac::{Hmac, Mac};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use rand::{rngs::OsRng, RngCore};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use super::{config::AuthConfig, role::Role};

type HmacSha256 = Hmac<Sha256>;

const ACCESS_ALGORITHM: Algorithm = Algorithm::HS256;
const REFRESH_VALUE_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("{which} secret must be at least {min} bytes")]
    SecretsInvalid { which: &'static str, min: usize },
    #[error("failed to encode access token")]
    Encode(#[from] jsonwebtoken::errors::Error),
    #[error("failed to generate refresh credential")]
    Random(#[from] rand::Error),
}

/// Why an access token was rejected. Every kind maps to 401 on the wire.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("token issuer mismatch")]
    IssuerMismatch,
    #[error("token audience mismatch")]
    AudienceMismatch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenClaims {
    sub: String,
    role: Role,
    iss: String,
    aud: String,
    iat: i64,
    exp: i64,
    jti: String,
}

/// Claims returned by a successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessClaims {
    pub user_id: Uuid,
    pub role: Role,
    pub token_id: String,
    pub expires_at: DateTime<Utc>,
}

pub struct Signer {
    issuer: String,
    audience: String,
    access_ttl: ChronoDuration,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    refresh_mac: HmacSha256,
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_ttl", &self.access_ttl)
            .field("keys", &"***")
            .finish_non_exhaustive()
    }
}

impl Signer {
    /// Build the signer from configuration.
    ///
    /// # Errors
    /// Returns `SecretsInvalid` if either secret is shorter than the configured
    /// minimum. Callers treat this as fatal at startup.
    pub fn new(config: &AuthConfig) -> Result<Self, SignerError> {
        let min = config.min_secret_bytes();
        let access = config.access_secret().expose_secret().as_bytes();
        let refresh = config.refresh_secret().expose_secret().as_bytes();

        if access.len() < min {
            return Err(SignerError::SecretsInvalid {
                which: "access",
                min,
            });
        }
        if refresh.len() < min {
            return Err(SignerError::SecretsInvalid {
                which: "refresh",
                min,
            });
        }

        let refresh_mac =
            HmacSha256::new_from_slice(refresh).map_err(|_| SignerError::SecretsInvalid {
                which: "refresh",
                min,
            })?;

        // Pin the algorithm and drop the default leeway so expiry is exact.
        let mut validation = Validation::new(ACCESS_ALGORITHM);
        validation.leeway = 0;
        validation.set_issuer(&[config.issuer()]);
        validation.set_audience(&[config.audience()]);
        validation.set_required_spec_claims(&["exp", "iat", "iss", "aud", "sub"]);

        let access_ttl = ChronoDuration::from_std(config.access_ttl())
            .unwrap_or_else(|_| ChronoDuration::minutes(15));

        Ok(Self {
            issuer: config.issuer().to_string(),
            audience: config.audience().to_string(),
            access_ttl,
            encoding_key: EncodingKey::from_secret(access),
            decoding_key: DecodingKey::from_secret(access),
            validation,
            refresh_mac,
        })
    }

    /// Mint an access token for `user_id`. Returns the token and its expiry.
    ///
    /// # Errors
    /// Returns an error if JWT encoding fails.
    pub fn mint_access(
        &self,
        user_id: Uuid,
        role: Role,
    ) -> Result<(String, DateTime<Utc>), SignerError> {
        self.mint_access_at(user_id, role, Utc::now())
    }

    pub(crate) fn mint_access_at(
        &self,
        user_id: Uuid,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<(String, DateTime<Utc>), SignerError> {
        let expires_at = now + self.access_ttl;
        let claims = TokenClaims {
            sub: user_id.to_string(),
            role,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        let token = encode(&Header::new(ACCESS_ALGORITHM), &claims, &self.encoding_key)?;
        Ok((token, expires_at))
    }

    /// Verify an access token.
    ///
    /// # Errors
    /// Fails closed: anything that is not an expiry, issuer or audience problem
    /// is reported as `InvalidSignature`.
    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        let data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation).map_err(
            |err| match err.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidIssuer => TokenError::IssuerMismatch,
                ErrorKind::InvalidAudience => TokenError::AudienceMismatch,
                _ => TokenError::InvalidSignature,
            },
        )?;

        let claims = data.claims;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| TokenError::InvalidSignature)?;
        let expires_at =
            DateTime::from_timestamp(claims.exp, 0).ok_or(TokenError::InvalidSignature)?;

        Ok(AccessClaims {
            user_id,
            role: claims.role,
            token_id: claims.jti,
            expires_at,
        })
    }

    /// Generate a raw refresh credential. It is shown to the client exactly once.
    ///
    /// # Errors
    /// Returns an error if the OS random source fails.
    pub fn mint_refresh_value(&self) -> Result<String, SignerError> {
        let mut bytes = [0u8; REFRESH_VALUE_BYTES];
        OsRng.try_fill_bytes(&mut bytes)?;
        Ok(Base64UrlUnpadded::encode_string(&bytes))
    }

    /// Deterministic keyed digest used as the session lookup key.
    #[must_use]
    pub fn hash_refresh_value(&self, value: &str) -> Vec<u8> {
        let mut mac = self.refresh_mac.clone();
        mac.update(value.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use std::time::Duration;

    const ACCESS_SECRET: &str = "access-secret-for-tests-0123456789abcdef";
    const REFRESH_SECRET: &str = "refresh-secret-for-tests-0123456789abcdef";

    fn config() -> AuthConfig {
        AuthConfig::new(
            SecretString::from(ACCESS_SECRET.to_string()),
            SecretString::from(REFRESH_SECRET.to_string()),
        )
        .with_issuer("luxsuv-test".to_string())
        .with_audience("luxsuv-test-clients".to_string())
    }

    fn signer() -> Signer {
        Signer::new(&config()).unwrap()
    }

    fn tamper_signature(token: &str) -> String {
        let (head, signature) = token.rsplit_once('.').unwrap();
        let mut chars: Vec<char> = signature.chars().collect();
        chars[0] = if chars[0] == 'A' { 'B' } else { 'A' };
        format!("{head}.{}", chars.into_iter().collect::<String>())
    }

    #[test]
    fn mint_then_verify_round_trips_subject_and_role() {
        let signer = signer();
        let user_id = Uuid::new_v4();
        let (token, expires_at) = signer.mint_access(user_id, Role::Driver).unwrap();

        let claims = signer.verify_access(&token).unwrap();
        assert_eq!(claims.user_id, user_id);
        assert_eq!(claims.role, Role::Driver);
        assert_eq!(claims.expires_at.timestamp(), expires_at.timestamp());
        assert!(!claims.token_id.is_empty());
    }

    #[test]
    fn expiry_is_bounded_by_access_ttl() {
        let signer = Signer::new(&config().with_access_ttl(Duration::from_secs(60))).unwrap();
        let now = Utc::now();
        let (_, expires_at) = signer.mint_access_at(Uuid::new_v4(), Role::Rider, now).unwrap();
        assert_eq!(expires_at - now, ChronoDuration::seconds(60));
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let signer = signer();
        let (token, _) = signer.mint_access(Uuid::new_v4(), Role::Rider).unwrap();
        assert_eq!(
            signer.verify_access(&tamper_signature(&token)),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn issuer_mismatch_is_rejected() {
        let (token, _) = signer().mint_access(Uuid::new_v4(), Role::Rider).unwrap();
        let other = Signer::new(&config().with_issuer("someone-else".to_string())).unwrap();
        assert_eq!(other.verify_access(&token), Err(TokenError::IssuerMismatch));
    }

    #[test]
    fn audience_mismatch_is_rejected() {
        let (token, _) = signer().mint_access(Uuid::new_v4(), Role::Rider).unwrap();
        let other = Signer::new(&config().with_audience("another-app".to_string())).unwrap();
        assert_eq!(other.verify_access(&token), Err(TokenError::AudienceMismatch));
    }

    #[test]
    fn algorithm_substitution_is_rejected() {
        let signer = signer();
        let now = Utc::now();
        let claims = TokenClaims {
            sub: Uuid::new_v4().to_string(),
            role: Role::Admin,
            iss: "luxsuv-test".to_string(),
            aud: "luxsuv-test-clients".to_string(),
            iat: now.timestamp(),
            exp: (now + ChronoDuration::minutes(5)).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        let hs512 = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(ACCESS_SECRET.as_bytes()),
        )
        .unwrap();
        assert_eq!(signer.verify_access(&hs512), Err(TokenError::InvalidSignature));

        // Unsigned token with "alg":"none".
        let header = Base64UrlUnpadded::encode_string(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = Base64UrlUnpadded::encode_string(&serde_json::to_vec(&claims).unwrap());
        let unsigned = format!("{header}.{payload}.");
        assert_eq!(
            signer.verify_access(&unsigned),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn token_signed_with_other_keys_is_rejected() {
        let signer = signer();
        let (token, _) = signer.mint_access(Uuid::new_v4(), Role::Rider).unwrap();

        let other = Signer::new(&AuthConfig::new(
            SecretString::from("a-completely-different-access-secret-xyz".to_string()),
            SecretString::from(REFRESH_SECRET.to_string()),
        )
        .with_issuer("luxsuv-test".to_string())
        .with_audience("luxsuv-test-clients".to_string()))
        .unwrap();
        assert_eq!(other.verify_access(&token), Err(TokenError::InvalidSignature));

        // The refresh secret must never validate an access token.
        let swapped = Signer::new(&AuthConfig::new(
            SecretString::from(REFRESH_SECRET.to_string()),
            SecretString::from(ACCESS_SECRET.to_string()),
        )
        .with_issuer("luxsuv-test".to_string())
        .with_audience("luxsuv-test-clients".to_string()))
        .unwrap();
        let (swapped_token, _) = swapped.mint_access(Uuid::new_v4(), Role::Admin).unwrap();
        assert_eq!(
            signer.verify_access(&swapped_token),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn expired_token_always_reports_expired() {
        let signer = signer();
        let issued = Utc::now() - ChronoDuration::hours(1);
        let (token, _) = signer.mint_access_at(Uuid::new_v4(), Role::Rider, issued).unwrap();
        assert_eq!(signer.verify_access(&token), Err(TokenError::Expired));
    }

    #[test]
    fn garbage_is_rejected() {
        let signer = signer();
        assert_eq!(
            signer.verify_access("not.a.token"),
            Err(TokenError::InvalidSignature)
        );
        assert_eq!(signer.verify_access(""), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn short_secrets_fail_construction() {
        let short_access = AuthConfig::new(
            SecretString::from("too-short".to_string()),
            SecretString::from(REFRESH_SECRET.to_string()),
        );
        assert!(matches!(
            Signer::new(&short_access),
            Err(SignerError::SecretsInvalid {
                which: "access",
                min: 32
            })
        ));

        let short_refresh = AuthConfig::new(
            SecretString::from(ACCESS_SECRET.to_string()),
            SecretString::from("x".repeat(31)),
        );
        assert!(matches!(
            Signer::new(&short_refresh),
            Err(SignerError::SecretsInvalid {
                which: "refresh",
                min: 32
            })
        ));
    }

    #[test]
    fn refresh_values_are_random_and_opaque() {
        let signer = signer();
        let first = signer.mint_refresh_value().unwrap();
        let second = signer.mint_refresh_value().unwrap();
        assert_ne!(first, second);
        assert_eq!(
            Base64UrlUnpadded::decode_vec(&first).map(|bytes| bytes.len()).ok(),
            Some(REFRESH_VALUE_BYTES)
        );
        assert!(!first.contains('.'));
    }

    #[test]
    fn refresh_hash_is_deterministic_and_keyed() {
        let signer = signer();
        let value = signer.mint_refresh_value().unwrap();
        assert_eq!(signer.hash_refresh_value(&value), signer.hash_refresh_value(&value));
        assert_ne!(signer.hash_refresh_value(&value), signer.hash_refresh_value("other"));
        assert_eq!(signer.hash_refresh_value(&value).len(), 32);

        let other = Signer::new(&AuthConfig::new(
            SecretString::from(ACCESS_SECRET.to_string()),
            SecretString::from("another-refresh-secret-0123456789abcdef".to_string()),
        ))
        .unwrap();
        assert_ne!(signer.hash_refresh_value(&value), other.hash_refresh_value(&value));
    }

    #[test]
    fn debug_does_not_leak_keys() {
        let debug = format!("{:?}", signer());
        assert!(!debug.contains(ACCESS_SECRET));
        assert!(!debug.contains(REFRESH_SECRET));
    }
}
