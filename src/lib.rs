//! # LuxSUV identity and session layer
//!
//! `luxsuv` answers one question for every request: who is this caller, and may
//! the request proceed? Riders, drivers and admins log in with email/password and
//! receive:
//!
//! - a short-lived **access token** (HS256 JWT) sent as `Authorization: Bearer`,
//! - a long-lived **refresh credential**, an opaque random value delivered once
//!   in the `refresh_token` cookie. Only its keyed hash is ever stored.
//!
//! ## Refresh sessions and rotation
//!
//! Each refresh credential maps to one row in `refresh_sessions`. A refresh call
//! consumes the row and creates its successor in the same **family**. Presenting
//! a consumed or revoked credential is treated as theft: the whole family is
//! revoked and the client must log in again.
//!
//! ## Authorization
//!
//! Protected routes run behind `require_auth` (token validity) and optionally
//! `require_role` (role allow-list). Identity is injected into the request
//! extensions; there is no global "current user".

pub mod api;
pub mod auth;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
