use axum::{Extension, http::HeaderMap, http::StatusCode, response::Response};

use crate::{
    api::response::{ErrorBody, correlation_id, data_response},
    auth::Identity,
};

fn identity_response(headers: &HeaderMap, identity: Identity) -> Response {
    data_response(StatusCode::OK, identity, &correlation_id(headers))
}

#[utoipa::path(
    get,
    path = "/api/v1/me",
    responses (
        (status = 200, description = "Identity carried by the access token", body = Identity),
        (status = 401, description = "Missing or invalid access token", body = ErrorBody)
    ),
    tag = "identity"
)]
pub async fn me(headers: HeaderMap, Extension(identity): Extension<Identity>) -> Response {
    identity_response(&headers, identity)
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/whoami",
    responses (
        (status = 200, description = "Caller is an admin", body = Identity),
        (status = 401, description = "Missing or invalid access token", body = ErrorBody),
        (status = 403, description = "Caller is not an admin", body = ErrorBody)
    ),
    tag = "identity"
)]
pub async fn admin_whoami(
    headers: HeaderMap,
    Extension(identity): Extension<Identity>,
) -> Response {
    identity_response(&headers, identity)
}

#[utoipa::path(
    get,
    path = "/api/v1/driver/whoami",
    responses (
        (status = 200, description = "Caller is a driver", body = Identity),
        (status = 401, description = "Missing or invalid access token", body = ErrorBody),
        (status = 403, description = "Caller is not a driver", body = ErrorBody)
    ),
    tag = "identity"
)]
pub async fn driver_whoami(
    headers: HeaderMap,
    Extension(identity): Extension<Identity>,
) -> Response {
    identity_response(&headers, identity)
}
