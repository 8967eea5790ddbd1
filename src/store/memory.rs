use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{normalize_email, NewUser, RefreshTokenStore, User, UserStore};
use crate::auth::RefreshTokenRecord;
use crate::error::StoreError;

/// Users kept in process memory
#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<Vec<User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let wanted = normalize_email(email);
        let users = self.users.read().await;
        Ok(users
            .iter()
            .find(|u| normalize_email(&u.email) == wanted)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let wanted = normalize_email(&user.email);
        let mut users = self.users.write().await;
        if users.iter().any(|u| normalize_email(&u.email) == wanted) {
            return Err(StoreError::Duplicate(format!("email {}", user.email)));
        }

        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            name: user.name,
            password_hash: user.password_hash,
            created_at: Utc::now(),
        };
        users.push(created.clone());
        Ok(created)
    }
}

/// Refresh-token records kept in process memory
///
/// Every conditional update checks and writes under one write lock.
#[derive(Default)]
pub struct InMemoryRefreshTokenStore {
    records: RwLock<Vec<RefreshTokenRecord>>,
}

impl InMemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn latest<'a>(
    records: impl Iterator<Item = &'a RefreshTokenRecord>,
) -> Option<RefreshTokenRecord> {
    // max_by_key keeps the last maximum, so equal timestamps favour later inserts
    records.max_by_key(|r| r.created_time).cloned()
}

#[async_trait]
impl RefreshTokenStore for InMemoryRefreshTokenStore {
    async fn insert(&self, record: &RefreshTokenRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        if records.iter().any(|r| r.token == record.token || r.id == record.id) {
            return Err(StoreError::Duplicate("refresh token".to_string()));
        }
        records.push(record.clone());
        Ok(())
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(latest(records.iter().filter(|r| r.token == token)))
    }

    async fn find_latest_by_user(
        &self,
        user_id: Uuid,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(latest(records.iter().filter(|r| r.user_id == user_id)))
    }

    async fn find_latest_by_jwt_id(
        &self,
        jwt_id: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(latest(records.iter().filter(|r| r.jwt_id == jwt_id)))
    }

    async fn update(&self, record: &RefreshTokenRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        if let Some(stored) = records.iter_mut().find(|r| r.id == record.id) {
            stored.jwt_id = record.jwt_id.clone();
            stored.is_used = record.is_used;
            stored.is_revoked = record.is_revoked;
        }
        Ok(())
    }

    async fn mark_used(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut records = self.records.write().await;
        match records.iter_mut().find(|r| r.id == id && !r.is_used) {
            Some(stored) => {
                stored.is_used = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn rotate_jwt_id(
        &self,
        id: Uuid,
        expected_jwt_id: &str,
        new_jwt_id: &str,
    ) -> Result<bool, StoreError> {
        let mut records = self.records.write().await;
        let target = records
            .iter_mut()
            .find(|r| r.id == id && !r.is_revoked && r.jwt_id == expected_jwt_id);
        match target {
            Some(stored) => {
                stored.jwt_id = new_jwt_id.to_string();
                stored.is_used = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn revoke(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut records = self.records.write().await;
        match records.iter_mut().find(|r| r.id == id && !r.is_revoked) {
            Some(stored) => {
                stored.is_used = true;
                stored.is_revoked = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
