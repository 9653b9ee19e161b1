//! Refresh sessions: one row per issued refresh credential.
//!
//! Sessions form families. Login starts a family; every successful refresh
//! consumes the presented session (`replaced_by` points at its successor) and
//! inserts the successor under the same `family_id`. A session that is revoked
//! or already replaced must never be rotated again: doing so is reuse, and the
//! store revokes the whole family before reporting it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::{net::IpAddr, time::Duration};
use uuid::Uuid;

use super::error::StoreError;

mod memory;
mod postgres;

pub use memory::MemorySessionStore;
pub use postgres::PgSessionStore;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: Vec<u8>,
    pub user_agent: Option<String>,
    pub ip: Option<IpAddr>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub replaced_by: Option<Uuid>,
    pub family_id: Uuid,
}

impl Session {
    /// Usable means: not revoked, not yet rotated and not expired at `now`.
    #[must_use]
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.replaced_by.is_none() && now < self.expires_at
    }

    #[must_use]
    pub fn is_consumed(&self) -> bool {
        self.revoked_at.is_some() || self.replaced_by.is_some()
    }
}

/// Request metadata recorded with a session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientMeta {
    pub user_agent: Option<String>,
    pub ip: Option<IpAddr>,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Start a new family with a single usable session.
    async fn create(
        &self,
        user_id: Uuid,
        token_hash: Vec<u8>,
        client: &ClientMeta,
        ttl: Duration,
    ) -> Result<Session, StoreError>;

    async fn find_by_hash(&self, token_hash: &[u8]) -> Result<Option<Session>, StoreError>;

    /// Atomically consume `old_session_id` and insert its successor.
    ///
    /// Returns [`StoreError::ReuseDetected`] after revoking the family when the
    /// old session is already consumed, [`StoreError::Expired`] when it is past
    /// its expiry and [`StoreError::NotFound`] when it does not exist. Of two
    /// concurrent rotations of the same session exactly one succeeds.
    async fn rotate(
        &self,
        old_session_id: Uuid,
        token_hash: Vec<u8>,
        client: &ClientMeta,
        ttl: Duration,
    ) -> Result<Session, StoreError>;

    /// Idempotent; an already revoked session keeps its original `revoked_at`.
    async fn revoke(&self, session_id: Uuid) -> Result<(), StoreError>;

    /// Revoke every active session of the user. Returns the number revoked.
    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, StoreError>;

    /// Revoke every active session of the family. Returns the number revoked.
    async fn revoke_family(&self, family_id: Uuid) -> Result<u64, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

const MAX_TTL_DAYS: i64 = 3650;

/// Converts a configured TTL, capping it so `now + ttl` cannot overflow.
pub(crate) fn ttl_to_chrono(ttl: Duration) -> chrono::Duration {
    let cap = chrono::Duration::days(MAX_TTL_DAYS);
    chrono::Duration::from_std(ttl).map_or(cap, |ttl| ttl.min(cap))
}
