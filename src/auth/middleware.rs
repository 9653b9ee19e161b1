//! Route guards: `require_auth` validates the bearer token, `require_role`
//! checks the identity it injected.

use axum::{
    Extension,
    extract::Request,
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{error::AuthError, role::Role, service::AuthService, signer::AccessClaims};
use crate::api::response::{correlation_id, error_response};

/// Authenticated caller, stored in request extensions by [`require_auth`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct Identity {
    pub user_id: Uuid,
    pub role: Role,
    #[serde(skip)]
    pub token_id: String,
}

impl From<AccessClaims> for Identity {
    fn from(claims: AccessClaims) -> Self {
        Self {
            user_id: claims.user_id,
            role: claims.role,
            token_id: claims.token_id,
        }
    }
}

pub const ADMIN_ONLY: &[Role] = &[Role::Admin];
pub const DRIVER_ONLY: &[Role] = &[Role::Driver];

/// Token from `Authorization: Bearer <token>`; the scheme is case-insensitive.
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token.to_string())
    } else {
        None
    }
}

/// Reject the request with 401 unless it carries a valid access token.
pub async fn require_auth(
    Extension(service): Extension<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Response {
    let correlation_id = correlation_id(request.headers());
    let Some(token) = bearer_token(request.headers()) else {
        return error_response(&AuthError::Unauthorized, &correlation_id);
    };

    match service.verify_access(&token) {
        Ok(claims) => {
            request.extensions_mut().insert(Identity::from(claims));
            next.run(request).await
        }
        Err(kind) => {
            debug!(correlation_id = %correlation_id, ?kind, "access token rejected");
            error_response(&AuthError::from(kind), &correlation_id)
        }
    }
}

/// Reject with 403 unless the injected identity holds one of `allowed`.
/// Without an identity (guard mounted outside `require_auth`) the request is 401.
pub async fn require_role(allowed: &'static [Role], request: Request, next: Next) -> Response {
    let correlation_id = correlation_id(request.headers());
    let Some(identity) = request.extensions().get::<Identity>() else {
        return error_response(&AuthError::Unauthorized, &correlation_id);
    };

    if allowed.contains(&identity.role) {
        next.run(request).await
    } else {
        debug!(correlation_id = %correlation_id, user_id = %identity.user_id, role = %identity.role, "role not allowed");
        error_response(&AuthError::Forbidden, &correlation_id)
    }
}
