//! `/api/v1/auth/*` handlers.
//!
//! Service calls run in a spawned task: if the client goes away mid-request
//! the store writes still finish, and only the response is dropped. The task
//! keeps the request span, so service logs carry the request id.

use axum::{
    Json,
    extract::{ConnectInfo, Extension, rejection::JsonRejection},
    http::{HeaderMap, HeaderValue, StatusCode, header::SET_COOKIE},
    response::Response,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{future::Future, net::SocketAddr, sync::Arc};
use tracing::{Instrument, debug, error};
use utoipa::ToSchema;

use crate::{
    api::response::{
        ErrorBody, correlation_id, data_response, error_response, message_response,
    },
    auth::{
        AuthError, AuthService, ClientMeta, Identity, IssuedTokens,
        client_ip::client_ip,
        cookie::{clear_refresh_cookie, extract_refresh_token, refresh_cookie},
    },
};

const INVALID_BODY: &str = "request body must be JSON with email and password";

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LogoutAllResponse {
    pub revoked: u64,
}

async fn run_detached<T, F>(operation: F) -> Result<T, AuthError>
where
    T: Send + 'static,
    F: Future<Output = Result<T, AuthError>> + Send + 'static,
{
    tokio::spawn(operation.in_current_span()).await?
}

fn client_meta(headers: &HeaderMap, peer: Option<ConnectInfo<SocketAddr>>) -> ClientMeta {
    ClientMeta {
        user_agent: headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        ip: client_ip(headers, peer.map(|ConnectInfo(addr)| addr)),
    }
}

fn set_cookie(mut response: Response, cookie: HeaderValue) -> Response {
    response.headers_mut().append(SET_COOKIE, cookie);
    response
}

fn with_cleared_cookie(service: &AuthService, response: Response) -> Response {
    match clear_refresh_cookie(service.config()) {
        Ok(cookie) => set_cookie(response, cookie),
        Err(err) => {
            error!("Failed to build clearing cookie: {err}");
            response
        }
    }
}

fn token_response(service: &AuthService, tokens: IssuedTokens, correlation_id: &str) -> Response {
    let cookie = match refresh_cookie(service.config(), &tokens.refresh_token) {
        Ok(cookie) => cookie,
        Err(err) => {
            error!(correlation_id, "Failed to build refresh cookie: {err}");
            return error_response(&AuthError::Internal, correlation_id);
        }
    };
    let body = TokenResponse {
        access_token: tokens.access_token,
        token_type: "Bearer".to_string(),
        expires_at: tokens.access_expires_at,
    };
    set_cookie(data_response(StatusCode::OK, body, correlation_id), cookie)
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses (
        (status = 200, description = "Access token in the body, refresh credential in the `refresh_token` cookie", body = TokenResponse),
        (status = 400, description = "Malformed, oversized or invalid request body", body = ErrorBody),
        (status = 401, description = "Unknown email, inactive account or wrong password", body = ErrorBody),
        (status = 504, description = "Request deadline exceeded", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    Extension(service): Extension<Arc<AuthService>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Response {
    let correlation_id = correlation_id(&headers);
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            debug!(correlation_id = %correlation_id, "Login body rejected: {rejection}");
            return error_response(
                &AuthError::BadRequest(INVALID_BODY.to_string()),
                &correlation_id,
            );
        }
    };

    let client = client_meta(&headers, peer);
    let task_service = Arc::clone(&service);
    let result = run_detached(async move {
        task_service
            .login(&request.email, &request.password, client)
            .await
    })
    .await;

    match result {
        Ok(tokens) => token_response(&service, tokens, &correlation_id),
        Err(err) => error_response(&err, &correlation_id),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    responses (
        (status = 200, description = "New access token; the refresh cookie is rotated", body = TokenResponse),
        (status = 401, description = "Missing, unknown, expired or reused refresh credential; the cookie is cleared", body = ErrorBody),
        (status = 504, description = "Request deadline exceeded", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn refresh(
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    Extension(service): Extension<Arc<AuthService>>,
) -> Response {
    let correlation_id = correlation_id(&headers);
    let presented = extract_refresh_token(&headers);
    let client = client_meta(&headers, peer);

    let task_service = Arc::clone(&service);
    let result = run_detached(async move {
        task_service.refresh(presented.as_deref(), client).await
    })
    .await;

    match result {
        Ok(tokens) => token_response(&service, tokens, &correlation_id),
        Err(err) if err.status() == StatusCode::UNAUTHORIZED => {
            with_cleared_cookie(&service, error_response(&err, &correlation_id))
        }
        Err(err) => error_response(&err, &correlation_id),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    responses (
        (status = 200, description = "Session revoked (or already gone); the cookie is cleared"),
        (status = 504, description = "Request deadline exceeded", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    Extension(service): Extension<Arc<AuthService>>,
) -> Response {
    let correlation_id = correlation_id(&headers);
    let presented = extract_refresh_token(&headers);

    let task_service = Arc::clone(&service);
    let result =
        run_detached(async move { task_service.logout(presented.as_deref()).await }).await;

    // The cookie is cleared even when revocation failed.
    let response = match result {
        Ok(()) => message_response(StatusCode::OK, "logged out", &correlation_id),
        Err(err) => error_response(&err, &correlation_id),
    };
    with_cleared_cookie(&service, response)
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/logout-all",
    responses (
        (status = 200, description = "Every session of the caller was revoked", body = LogoutAllResponse),
        (status = 401, description = "Missing or invalid access token", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn logout_all(
    headers: HeaderMap,
    Extension(service): Extension<Arc<AuthService>>,
    Extension(identity): Extension<Identity>,
) -> Response {
    let correlation_id = correlation_id(&headers);

    let task_service = Arc::clone(&service);
    let user_id = identity.user_id;
    let result = run_detached(async move { task_service.logout_all(user_id).await }).await;

    match result {
        Ok(revoked) => with_cleared_cookie(
            &service,
            data_response(StatusCode::OK, LogoutAllResponse { revoked }, &correlation_id),
        ),
        Err(err) => error_response(&err, &correlation_id),
    }
}
