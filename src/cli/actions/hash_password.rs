use crate::auth::hash_password;
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};

#[derive(Debug)]
pub struct Args {
    pub password: SecretString,
}

/// Print an Argon2id PHC string for `args.password` on stdout.
/// # Errors
/// Returns an error if hashing fails.
pub fn execute(args: &Args) -> Result<()> {
    let hash = hash_password(args.password.expose_secret()).context("Failed to hash password")?;
    println!("{hash}");
    Ok(())
}
