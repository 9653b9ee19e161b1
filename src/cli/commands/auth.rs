use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_ACCESS_SECRET: &str = "access-secret";
pub const ARG_REFRESH_SECRET: &str = "refresh-secret";
pub const ARG_ISSUER: &str = "issuer";
pub const ARG_AUDIENCE: &str = "audience";
pub const ARG_ACCESS_TTL_SECONDS: &str = "access-ttl-seconds";
pub const ARG_REFRESH_TTL_SECONDS: &str = "refresh-ttl-seconds";
pub const ARG_MIN_PASSWORD_LENGTH: &str = "min-password-length";
pub const ARG_REQUEST_TIMEOUT_SECONDS: &str = "request-timeout-seconds";
pub const ARG_APP_ENV: &str = "app-env";

const PRODUCTION: &str = "production";

#[derive(Debug, Clone)]
pub struct Options {
    pub access_secret: SecretString,
    pub refresh_secret: SecretString,
    pub issuer: String,
    pub audience: String,
    pub access_ttl_seconds: u64,
    pub refresh_ttl_seconds: u64,
    pub min_password_length: usize,
    pub request_timeout_seconds: u64,
    pub production: bool,
}

impl Options {
    /// Parse auth arguments from matches.
    ///
    /// Secret length is not checked here; the signer rejects short secrets.
    ///
    /// # Errors
    /// Returns an error if a required argument is missing or empty.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let read_required = |id: &str| -> anyhow::Result<String> {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow::anyhow!("missing required argument: --{id}"))
        };
        let read_u64 = |id: &str| -> anyhow::Result<u64> {
            matches
                .get_one::<u64>(id)
                .copied()
                .ok_or_else(|| anyhow::anyhow!("missing required argument: --{id}"))
        };

        let min_password_length = matches
            .get_one::<usize>(ARG_MIN_PASSWORD_LENGTH)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_MIN_PASSWORD_LENGTH}"))?;

        Ok(Self {
            access_secret: SecretString::from(read_required(ARG_ACCESS_SECRET)?),
            refresh_secret: SecretString::from(read_required(ARG_REFRESH_SECRET)?),
            issuer: read_required(ARG_ISSUER)?,
            audience: read_required(ARG_AUDIENCE)?,
            access_ttl_seconds: read_u64(ARG_ACCESS_TTL_SECONDS)?,
            refresh_ttl_seconds: read_u64(ARG_REFRESH_TTL_SECONDS)?,
            min_password_length,
            request_timeout_seconds: read_u64(ARG_REQUEST_TIMEOUT_SECONDS)?,
            production: is_production(matches),
        })
    }
}

/// `true` when `APP_ENV` (or `--app-env`) selects production.
#[must_use]
pub fn is_production(matches: &ArgMatches) -> bool {
    matches
        .get_one::<String>(ARG_APP_ENV)
        .is_some_and(|env| env.trim().eq_ignore_ascii_case(PRODUCTION))
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_secret_args(command);
    with_token_args(command)
}

fn with_secret_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ACCESS_SECRET)
                .long(ARG_ACCESS_SECRET)
                .help("HMAC secret for access tokens (at least 32 bytes)")
                .env("LUXSUV_ACCESS_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_REFRESH_SECRET)
                .long(ARG_REFRESH_SECRET)
                .help("HMAC key for hashing refresh credentials (at least 32 bytes)")
                .env("LUXSUV_REFRESH_SECRET")
                .hide_env_values(true)
                .required(true),
        )
}

fn with_token_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ISSUER)
                .long(ARG_ISSUER)
                .help("Access token issuer")
                .env("LUXSUV_ISSUER")
                .default_value("luxsuv-api"),
        )
        .arg(
            Arg::new(ARG_AUDIENCE)
                .long(ARG_AUDIENCE)
                .help("Access token audience")
                .env("LUXSUV_AUDIENCE")
                .default_value("luxsuv-clients"),
        )
        .arg(
            Arg::new(ARG_ACCESS_TTL_SECONDS)
                .long(ARG_ACCESS_TTL_SECONDS)
                .help("Access token TTL in seconds")
                .env("LUXSUV_ACCESS_TTL_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_REFRESH_TTL_SECONDS)
                .long(ARG_REFRESH_TTL_SECONDS)
                .help("Refresh session TTL in seconds")
                .env("LUXSUV_REFRESH_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_MIN_PASSWORD_LENGTH)
                .long(ARG_MIN_PASSWORD_LENGTH)
                .help("Minimum password length accepted by login")
                .env("LUXSUV_MIN_PASSWORD_LENGTH")
                .default_value("8")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new(ARG_REQUEST_TIMEOUT_SECONDS)
                .long(ARG_REQUEST_TIMEOUT_SECONDS)
                .help("Per-request deadline for password checks and store calls")
                .env("LUXSUV_REQUEST_TIMEOUT_SECONDS")
                .default_value("3")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_APP_ENV)
                .long(ARG_APP_ENV)
                .help("Runtime environment; production enables Secure cookies and JSON logs")
                .env("APP_ENV")
                .global(true)
                .default_value("development"),
        )
}
