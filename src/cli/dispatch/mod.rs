//! Map validated CLI matches to an [`Action`].

use crate::cli::actions::{Action, hash_password, server};
use crate::cli::commands::{ARG_DSN, ARG_PASSWORD, ARG_PORT, CMD_HASH_PASSWORD, auth};
use anyhow::{Context, Result};
use secrecy::SecretString;

const DATABASE_URL: &str = "DATABASE_URL";

/// Map validated CLI matches to an action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    if let Some(sub) = matches.subcommand_matches(CMD_HASH_PASSWORD) {
        let password = sub
            .get_one::<String>(ARG_PASSWORD)
            .cloned()
            .context("missing required argument: <password>")?;
        return Ok(Action::HashPassword(hash_password::Args {
            password: SecretString::from(password),
        }));
    }

    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .or_else(|| std::env::var(DATABASE_URL).ok())
        .filter(|dsn| !dsn.trim().is_empty())
        .context("missing required argument: --dsn (or DATABASE_URL)")?;

    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(server::Args {
        port,
        dsn,
        access_secret: auth_opts.access_secret,
        refresh_secret: auth_opts.refresh_secret,
        issuer: auth_opts.issuer,
        audience: auth_opts.audience,
        access_ttl_seconds: auth_opts.access_ttl_seconds,
        refresh_ttl_seconds: auth_opts.refresh_ttl_seconds,
        min_password_length: auth_opts.min_password_length,
        request_timeout_seconds: auth_opts.request_timeout_seconds,
        production: auth_opts.production,
    }))
}
