//! Read-only access to user accounts.

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{Instrument, warn};
use uuid::Uuid;

use super::{error::StoreError, role::Role};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
}

/// Trim and lower-case an email address for lookup.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// `email_normalized` must already be trimmed and lower-cased.
    async fn find_by_email(&self, email_normalized: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, StoreError>;
}

/// Missing or unrecognized roles fall back to the least privileged one.
fn role_from_column(user_id: Uuid, role: Option<String>) -> Role {
    match role.as_deref().map(str::trim) {
        None | Some("") => Role::Rider,
        Some(value) => value.parse().unwrap_or_else(|err| {
            warn!(%user_id, "{err}, treating account as rider");
            Role::Rider
        }),
    }
}

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    let id: Uuid = row.try_get("id")?;
    Ok(User {
        id,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        role: role_from_column(id, row.try_get("role")?),
        is_active: row.try_get("is_active")?,
    })
}

#[derive(Clone, Debug)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email_normalized: &str) -> Result<Option<User>, StoreError> {
        let query = "SELECT id, email, password_hash, role, is_active FROM users \
                     WHERE lower(email) = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(email_normalized)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;

        Ok(row.as_ref().map(user_from_row).transpose()?)
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        let query = "SELECT id, email, password_hash, role, is_active FROM users WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;

        Ok(row.as_ref().map(user_from_row).transpose()?)
    }
}

/// In-process user directory for tests and local runs.
#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a user. The email is stored normalized.
    pub async fn insert(&self, mut user: User) {
        user.email = normalize_email(&user.email);
        self.users.lock().await.insert(user.id, user);
    }

    pub async fn set_active(&self, user_id: Uuid, is_active: bool) {
        if let Some(user) = self.users.lock().await.get_mut(&user_id) {
            user.is_active = is_active;
        }
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email_normalized: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .lock()
            .await
            .values()
            .find(|user| user.email == email_normalized)
            .cloned())
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.lock().await.get(&user_id).cloned())
    }
}
