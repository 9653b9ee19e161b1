//! Credentials, sessions and route guards.

pub mod client_ip;
pub mod config;
pub mod cookie;
pub mod error;
pub mod middleware;
pub mod password;
pub mod role;
pub mod service;
pub mod session;
pub mod signer;
pub mod users;

pub use config::AuthConfig;
pub use error::{AuthError, StoreError};
pub use middleware::{Identity, require_auth, require_role};
pub use password::{Argon2Verifier, PasswordVerifier, hash_password};
pub use role::Role;
pub use service::{AuthService, IssuedTokens};
pub use session::{ClientMeta, MemorySessionStore, PgSessionStore, Session, SessionStore};
pub use signer::{AccessClaims, Signer, SignerError, TokenError};
pub use users::{MemoryUserStore, PgUserStore, User, UserStore};
