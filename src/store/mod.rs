/// Persistence ports
///
/// The core only talks to these traits; `postgres` backs them with sqlx and
/// `memory` with a process-local table for tests and throwaway runs.

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::auth::RefreshTokenRecord;
use crate::error::StoreError;

pub use memory::{InMemoryRefreshTokenStore, InMemoryUserStore};
pub use postgres::{PgRefreshTokenStore, PgUserStore};

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
}

/// Lower-cased form used for the case-insensitive email uniqueness rule
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// The external credential store
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Case-insensitive lookup
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Fails with `StoreError::Duplicate` if the email is taken
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;
}

/// Refresh-token records
///
/// "Latest" lookups pick the matching record with the greatest
/// `created_time`; on equal timestamps the one inserted last wins. The conditional updates return `true` only when this call
/// changed the record, which lets concurrent callers agree on a single winner.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn insert(&self, record: &RefreshTokenRecord) -> Result<(), StoreError>;

    async fn find_by_token(&self, token: &str) -> Result<Option<RefreshTokenRecord>, StoreError>;

    async fn find_latest_by_user(
        &self,
        user_id: Uuid,
    ) -> Result<Option<RefreshTokenRecord>, StoreError>;

    async fn find_latest_by_jwt_id(
        &self,
        jwt_id: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError>;

    /// Overwrite the mutable fields (`jwt_id`, `is_used`, `is_revoked`)
    async fn update(&self, record: &RefreshTokenRecord) -> Result<(), StoreError>;

    /// `is_used = true` where it was false
    async fn mark_used(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Move `jwt_id` from `expected_jwt_id` to `new_jwt_id` and mark the record
    /// used, provided it is not revoked and still points at `expected_jwt_id`
    async fn rotate_jwt_id(
        &self,
        id: Uuid,
        expected_jwt_id: &str,
        new_jwt_id: &str,
    ) -> Result<bool, StoreError>;

    /// `is_used = is_revoked = true` where it was not yet revoked
    async fn revoke(&self, id: Uuid) -> Result<bool, StoreError>;
}
