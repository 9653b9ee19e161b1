//! Response envelopes shared by every handler.
//!
//! Errors render as `{"error":{"code","message","correlation_id","timestamp"}}`;
//! successes as `{"data"?,"message"?,"correlation_id","timestamp"}`.

use axum::{
    Json,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error};
use utoipa::ToSchema;

use crate::auth::AuthError;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Correlation id for the current request, as stamped by the request-id layer.
#[must_use]
pub fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("none")
        .to_string()
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct SuccessBody<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Render an [`AuthError`] without leaking its underlying cause.
pub fn error_response(err: &AuthError, correlation_id: &str) -> Response {
    let status = err.status();
    if status.is_server_error() {
        error!(
            correlation_id,
            code = err.code(),
            http_status = status.as_u16(),
            "request failed: {err:?}"
        );
    } else {
        debug!(
            correlation_id,
            code = err.code(),
            http_status = status.as_u16(),
            "request rejected"
        );
    }

    let body = ErrorBody {
        error: ErrorDetail {
            code: err.code().to_string(),
            message: err.public_message(),
            correlation_id: correlation_id.to_string(),
            timestamp: Utc::now(),
        },
    };
    (status, Json(body)).into_response()
}

pub fn data_response<T: Serialize>(status: StatusCode, data: T, correlation_id: &str) -> Response {
    let body = SuccessBody {
        data: Some(data),
        message: None,
        correlation_id: correlation_id.to_string(),
        timestamp: Utc::now(),
    };
    (status, Json(body)).into_response()
}

pub fn message_response(status: StatusCode, message: &str, correlation_id: &str) -> Response {
    let body: SuccessBody<()> = SuccessBody {
        data: None,
        message: Some(message.to_string()),
        correlation_id: correlation_id.to_string(),
        timestamp: Utc::now(),
    };
    (status, Json(body)).into_response()
}
