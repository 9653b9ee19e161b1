//! In-process session store used by tests and local runs without a database.

use async_trait::async_trait;
use chrono::Utc;
use std::{collections::HashMap, time::Duration};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{ClientMeta, Session, SessionStore, ttl_to_chrono};
use crate::auth::error::StoreError;

#[derive(Default)]
struct Inner {
    sessions: HashMap<Uuid, Session>,
    by_hash: HashMap<Vec<u8>, Uuid>,
}

impl Inner {
    fn insert(&mut self, session: Session) {
        self.by_hash.insert(session.token_hash.clone(), session.id);
        self.sessions.insert(session.id, session);
    }

    fn revoke_where(&mut self, matches: impl Fn(&Session) -> bool) -> u64 {
        let now = Utc::now();
        let mut revoked = 0;
        for session in self.sessions.values_mut() {
            if session.revoked_at.is_none() && matches(session) {
                session.revoked_at = Some(now);
                revoked += 1;
            }
        }
        revoked
    }
}

/// A single mutex serializes every operation, which makes `rotate` atomic.
#[derive(Default)]
pub struct MemorySessionStore {
    inner: Mutex<Inner>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every session in a family, oldest first.
    pub async fn family(&self, family_id: Uuid) -> Vec<Session> {
        let inner = self.inner.lock().await;
        let mut sessions: Vec<Session> = inner
            .sessions
            .values()
            .filter(|session| session.family_id == family_id)
            .cloned()
            .collect();
        sessions.sort_by_key(|session| session.id);
        sessions
    }

    pub async fn get(&self, session_id: Uuid) -> Option<Session> {
        self.inner.lock().await.sessions.get(&session_id).cloned()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(
        &self,
        user_id: Uuid,
        token_hash: Vec<u8>,
        client: &ClientMeta,
        ttl: Duration,
    ) -> Result<Session, StoreError> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::now_v7(),
            user_id,
            token_hash,
            user_agent: client.user_agent.clone(),
            ip: client.ip,
            created_at: now,
            expires_at: now + ttl_to_chrono(ttl),
            revoked_at: None,
            replaced_by: None,
            family_id: Uuid::now_v7(),
        };
        self.inner.lock().await.insert(session.clone());
        Ok(session)
    }

    async fn find_by_hash(&self, token_hash: &[u8]) -> Result<Option<Session>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .by_hash
            .get(token_hash)
            .and_then(|id| inner.sessions.get(id))
            .cloned())
    }

    async fn rotate(
        &self,
        old_session_id: Uuid,
        token_hash: Vec<u8>,
        client: &ClientMeta,
        ttl: Duration,
    ) -> Result<Session, StoreError> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();

        let old = inner
            .sessions
            .get(&old_session_id)
            .cloned()
            .ok_or(StoreError::NotFound)?;

        if old.is_consumed() {
            let family_id = old.family_id;
            inner.revoke_where(|session| session.family_id == family_id);
            return Err(StoreError::ReuseDetected {
                family_id,
                user_id: old.user_id,
            });
        }

        if old.expires_at <= now {
            return Err(StoreError::Expired);
        }

        let successor = Session {
            id: Uuid::now_v7(),
            user_id: old.user_id,
            token_hash,
            user_agent: client.user_agent.clone(),
            ip: client.ip,
            created_at: now,
            expires_at: now + ttl_to_chrono(ttl),
            revoked_at: None,
            replaced_by: None,
            family_id: old.family_id,
        };

        if let Some(previous) = inner.sessions.get_mut(&old_session_id) {
            previous.replaced_by = Some(successor.id);
        }
        inner.insert(successor.clone());

        Ok(successor)
    }

    async fn revoke(&self, session_id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(session) = inner.sessions.get_mut(&session_id) {
            if session.revoked_at.is_none() {
                session.revoked_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .revoke_where(|session| session.user_id == user_id))
    }

    async fn revoke_family(&self, family_id: Uuid) -> Result<u64, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .revoke_where(|session| session.family_id == family_id))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
