pub mod auth;
pub mod logging;

use clap::{
    Arg, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};

pub const ARG_PORT: &str = "port";
pub const ARG_DSN: &str = "dsn";
pub const CMD_HASH_PASSWORD: &str = "hash-password";
pub const ARG_PASSWORD: &str = "password";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("luxsuv")
        .about("Rider, driver and admin authentication")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_negates_reqs(true)
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("Port to listen on")
                .default_value("8080")
                .env("LUXSUV_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_DSN)
                .short('d')
                .long(ARG_DSN)
                .help("Database connection string")
                .long_help("Database connection string. Falls back to DATABASE_URL when unset.")
                .env("LUXSUV_DSN"),
        )
        .subcommand(
            Command::new(CMD_HASH_PASSWORD)
                .about("Print an Argon2id hash for seeding users.password_hash")
                .arg(
                    Arg::new(ARG_PASSWORD)
                        .help("Plaintext password to hash")
                        .required(true),
                ),
        );

    let command = auth::with_args(command);
    logging::with_args(command)
}
