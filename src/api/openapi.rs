use axum::{
    extract::Request,
    middleware::{Next, from_fn},
};
use utoipa::openapi::{Contact, InfoBuilder, License, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

use super::handlers::{auth, health, me};
use crate::auth::{
    middleware::{ADMIN_ONLY, DRIVER_ONLY},
    require_auth, require_role,
};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Router that also drives the `OpenAPI` document.
///
/// Paths are absolute in each `#[utoipa::path]`, so nothing here is nested.
/// Guards are attached with `route_layer` to the group they protect.
pub(crate) fn api_router() -> OpenApiRouter {
    let admin = OpenApiRouter::new()
        .routes(routes!(me::admin_whoami))
        .route_layer(from_fn(|request: Request, next: Next| {
            require_role(ADMIN_ONLY, request, next)
        }));

    let driver = OpenApiRouter::new()
        .routes(routes!(me::driver_whoami))
        .route_layer(from_fn(|request: Request, next: Next| {
            require_role(DRIVER_ONLY, request, next)
        }));

    let protected = OpenApiRouter::new()
        .routes(routes!(auth::logout_all))
        .routes(routes!(me::me))
        .merge(admin)
        .merge(driver)
        .route_layer(from_fn(require_auth));

    let mut openapi = cargo_openapi();
    openapi.tags = Some(vec![
        tag("auth", "Login, refresh rotation and logout"),
        tag("identity", "Identity carried by the access token"),
        tag("health", "Liveness of the session store"),
    ]);

    OpenApiRouter::with_openapi(openapi)
        .routes(routes!(health::health))
        .routes(routes!(auth::login))
        .routes(routes!(auth::refresh))
        .routes(routes!(auth::logout))
        .merge(protected)
}

fn tag(name: &str, description: &str) -> Tag {
    let mut tag = Tag::new(name);
    tag.description = Some(description.to_string());
    tag
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = optional_str(env!("CARGO_PKG_LICENSE")).map(|identifier| {
        let mut license = License::new(identifier);
        license.identifier = Some(identifier.to_string());
        license
    });

    OpenApiBuilder::new().info(info).build()
}

/// First author from `CARGO_PKG_AUTHORS`, in `Name <email>` form.
fn cargo_contact() -> Option<Contact> {
    let primary = env!("CARGO_PKG_AUTHORS").split(':').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let mut contact = Contact::new();
    match primary.split_once('<') {
        Some((name, email)) => {
            contact.name = optional_str(name).map(str::to_string);
            contact.email = optional_str(email.trim_end_matches('>')).map(str::to_string);
        }
        None => contact.name = Some(primary.to_string()),
    }
    Some(contact)
}

fn optional_str(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}
