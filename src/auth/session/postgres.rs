//! `refresh_sessions` table access.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow, types::ipnetwork::IpNetwork};
use std::{net::IpAddr, time::Duration};
use tracing::{Instrument, warn};
use uuid::Uuid;

use super::{ClientMeta, Session, SessionStore, ttl_to_chrono};
use crate::auth::error::StoreError;

const SESSION_COLUMNS: &str = "id, user_id, token_hash, user_agent, ip, created_at, expires_at, \
                               revoked_at, replaced_by, family_id";

fn query_span(operation: &'static str, statement: &str) -> tracing::Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

fn session_from_row(row: &PgRow) -> Result<Session, sqlx::Error> {
    let ip: Option<IpNetwork> = row.try_get("ip")?;
    Ok(Session {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        token_hash: row.try_get("token_hash")?,
        user_agent: row.try_get("user_agent")?,
        ip: ip.map(|network| network.ip()),
        created_at: row.try_get("created_at")?,
        expires_at: row.try_get("expires_at")?,
        revoked_at: row.try_get("revoked_at")?,
        replaced_by: row.try_get("replaced_by")?,
        family_id: row.try_get("family_id")?,
    })
}

fn ip_network(ip: Option<IpAddr>) -> Option<IpNetwork> {
    ip.map(IpNetwork::from)
}

fn ttl_seconds(ttl: Duration) -> i64 {
    ttl_to_chrono(ttl).num_seconds()
}

#[derive(Clone, Debug)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        family_id: Uuid,
        token_hash: &[u8],
        client: &ClientMeta,
        ttl: Duration,
    ) -> Result<Session, sqlx::Error> {
        let query = format!(
            r"
            INSERT INTO refresh_sessions
                (id, user_id, token_hash, user_agent, ip, expires_at, family_id)
            VALUES ($1, $2, $3, $4, $5, NOW() + ($6 * INTERVAL '1 second'), $7)
            RETURNING {SESSION_COLUMNS}
            "
        );
        let row = sqlx::query(&query)
            .bind(Uuid::now_v7())
            .bind(user_id)
            .bind(token_hash)
            .bind(client.user_agent.as_deref())
            .bind(ip_network(client.ip))
            .bind(ttl_seconds(ttl))
            .bind(family_id)
            .fetch_one(&mut **tx)
            .instrument(query_span("INSERT", &query))
            .await?;
        session_from_row(&row)
    }

    async fn revoke_family_in(
        tx: &mut Transaction<'_, Postgres>,
        family_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let query = r"
            UPDATE refresh_sessions
            SET revoked_at = NOW()
            WHERE family_id = $1 AND revoked_at IS NULL
        ";
        let result = sqlx::query(query)
            .bind(family_id)
            .execute(&mut **tx)
            .instrument(query_span("UPDATE", query))
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(
        &self,
        user_id: Uuid,
        token_hash: Vec<u8>,
        client: &ClientMeta,
        ttl: Duration,
    ) -> Result<Session, StoreError> {
        let mut tx = self.pool.begin().await?;
        let session =
            Self::insert(&mut tx, user_id, Uuid::now_v7(), &token_hash, client, ttl).await?;
        tx.commit().await?;
        Ok(session)
    }

    async fn find_by_hash(&self, token_hash: &[u8]) -> Result<Option<Session>, StoreError> {
        let query = format!("SELECT {SESSION_COLUMNS} FROM refresh_sessions WHERE token_hash = $1");
        let row = sqlx::query(&query)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await?;

        Ok(row.as_ref().map(session_from_row).transpose()?)
    }

    async fn rotate(
        &self,
        old_session_id: Uuid,
        token_hash: Vec<u8>,
        client: &ClientMeta,
        ttl: Duration,
    ) -> Result<Session, StoreError> {
        // The row lock serializes concurrent rotations of the same session.
        let mut tx = self.pool.begin().await?;

        let query = format!(
            "SELECT {SESSION_COLUMNS}, expires_at <= NOW() AS expired \
             FROM refresh_sessions WHERE id = $1 FOR UPDATE"
        );
        let row = sqlx::query(&query)
            .bind(old_session_id)
            .fetch_optional(&mut *tx)
            .instrument(query_span("SELECT", &query))
            .await?;

        let Some(row) = row else {
            return Err(StoreError::NotFound);
        };
        let old = session_from_row(&row)?;
        let expired: bool = row.try_get("expired")?;

        if old.is_consumed() {
            let revoked = Self::revoke_family_in(&mut tx, old.family_id).await?;
            tx.commit().await?;
            warn!(
                family_id = %old.family_id,
                user_id = %old.user_id,
                revoked,
                "rotation of consumed session, family revoked"
            );
            return Err(StoreError::ReuseDetected {
                family_id: old.family_id,
                user_id: old.user_id,
            });
        }

        if expired {
            return Err(StoreError::Expired);
        }

        let successor =
            Self::insert(&mut tx, old.user_id, old.family_id, &token_hash, client, ttl).await?;

        let query = "UPDATE refresh_sessions SET replaced_by = $2 WHERE id = $1";
        sqlx::query(query)
            .bind(old.id)
            .bind(successor.id)
            .execute(&mut *tx)
            .instrument(query_span("UPDATE", query))
            .await?;

        tx.commit().await?;
        Ok(successor)
    }

    async fn revoke(&self, session_id: Uuid) -> Result<(), StoreError> {
        let query = r"
            UPDATE refresh_sessions
            SET revoked_at = NOW()
            WHERE id = $1 AND revoked_at IS NULL
        ";
        sqlx::query(query)
            .bind(session_id)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await?;
        Ok(())
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let query = r"
            UPDATE refresh_sessions
            SET revoked_at = NOW()
            WHERE user_id = $1 AND revoked_at IS NULL
        ";
        let result = sqlx::query(query)
            .bind(user_id)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await?;
        Ok(result.rows_affected())
    }

    async fn revoke_family(&self, family_id: Uuid) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;
        let revoked = Self::revoke_family_in(&mut tx, family_id).await?;
        tx.commit().await?;
        Ok(revoked)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let query = "SELECT 1";
        sqlx::query(query)
            .execute(&self.pool)
            .instrument(query_span("SELECT", query))
            .await?;
        Ok(())
    }
}
