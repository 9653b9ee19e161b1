//! Error taxonomy surfaced at the service boundary.

use axum::http::StatusCode;
use thiserror::Error;
use uuid::Uuid;

use super::signer::{SignerError, TokenError};

/// Errors raised by the session and user stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("refresh credential reuse detected in family {family_id}")]
    ReuseDetected { family_id: Uuid, user_id: Uuid },
    #[error("session expired")]
    Expired,
    #[error("database error")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    BadRequest(String),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
    #[error("signing secrets are invalid: {0}")]
    SecretsInvalid(String),
    #[error("database error")]
    Database(#[source] sqlx::Error),
    #[error("refresh credential reuse detected in family {family_id}")]
    ReuseDetected { family_id: Uuid, user_id: Uuid },
    #[error("request deadline exceeded")]
    Timeout,
    #[error("internal error")]
    Internal,
}

impl AuthError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials | Self::Unauthorized | Self::ReuseDetected { .. } => {
                StatusCode::UNAUTHORIZED
            }
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::SecretsInvalid(_) | Self::Database(_) | Self::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable code. Reuse is reported as a plain `UNAUTHORIZED`.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::Unauthorized | Self::ReuseDetected { .. } => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::Timeout => "TIMEOUT",
            Self::SecretsInvalid(_) | Self::Internal => "INTERNAL_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Message safe to show to clients; never includes underlying error text.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::BadRequest(message) => message.clone(),
            Self::InvalidCredentials => "Invalid email or password".to_string(),
            Self::Unauthorized | Self::ReuseDetected { .. } => {
                "Authentication required".to_string()
            }
            Self::Forbidden => "Insufficient role for this resource".to_string(),
            Self::Timeout => "Request timed out".to_string(),
            Self::Database(_) => "Database operation failed".to_string(),
            Self::SecretsInvalid(_) | Self::Internal => "Internal server error".to_string(),
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound | StoreError::Expired => Self::Unauthorized,
            StoreError::ReuseDetected { family_id, user_id } => {
                Self::ReuseDetected { family_id, user_id }
            }
            StoreError::Database(err) => Self::Database(err),
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(_: TokenError) -> Self {
        Self::Unauthorized
    }
}

impl From<SignerError> for AuthError {
    fn from(err: SignerError) -> Self {
        match err {
            SignerError::SecretsInvalid { .. } => Self::SecretsInvalid(err.to_string()),
            SignerError::Encode(_) | SignerError::Random(_) => Self::Internal,
        }
    }
}

impl From<tokio::task::JoinError> for AuthError {
    fn from(_: tokio::task::JoinError) -> Self {
        Self::Internal
    }
}
