use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use super::{normalize_email, NewUser, RefreshTokenStore, User, UserStore};
use crate::auth::RefreshTokenRecord;
use crate::error::StoreError;

const SELECT_BY_TOKEN: &str = r#"
    SELECT id, token, jwt_id, user_id, created_time, expiration_date, is_used, is_revoked
    FROM refresh_tokens
    WHERE token = $1
    ORDER BY created_time DESC, insert_seq DESC
    LIMIT 1
"#;

const SELECT_LATEST_BY_USER: &str = r#"
    SELECT id, token, jwt_id, user_id, created_time, expiration_date, is_used, is_revoked
    FROM refresh_tokens
    WHERE user_id = $1
    ORDER BY created_time DESC, insert_seq DESC
    LIMIT 1
"#;

const SELECT_LATEST_BY_JWT_ID: &str = r#"
    SELECT id, token, jwt_id, user_id, created_time, expiration_date, is_used, is_revoked
    FROM refresh_tokens
    WHERE jwt_id = $1
    ORDER BY created_time DESC, insert_seq DESC
    LIMIT 1
"#;

/// `users` table
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, name, password_hash, created_at
            FROM users
            WHERE normalized_email = $1
            "#,
        )
        .bind(normalize_email(email))
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, name, password_hash, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, normalized_email, name, password_hash, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, email, name, password_hash, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(normalize_email(&user.email))
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }
}

/// `refresh_tokens` table
///
/// Conditional updates are single guarded `UPDATE` statements, so Postgres'
/// row locking decides the winner between concurrent requests.
#[derive(Clone)]
pub struct PgRefreshTokenStore {
    pool: PgPool,
}

impl PgRefreshTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshTokenStore for PgRefreshTokenStore {
    async fn insert(&self, record: &RefreshTokenRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens
                (id, token, jwt_id, user_id, created_time, expiration_date, is_used, is_revoked)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.id)
        .bind(&record.token)
        .bind(&record.jwt_id)
        .bind(record.user_id)
        .bind(record.created_time)
        .bind(record.expiration_date)
        .bind(record.is_used)
        .bind(record.is_revoked)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let record = sqlx::query_as::<_, RefreshTokenRecord>(SELECT_BY_TOKEN)
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn find_latest_by_user(
        &self,
        user_id: Uuid,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let record = sqlx::query_as::<_, RefreshTokenRecord>(SELECT_LATEST_BY_USER)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn find_latest_by_jwt_id(
        &self,
        jwt_id: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let record = sqlx::query_as::<_, RefreshTokenRecord>(SELECT_LATEST_BY_JWT_ID)
            .bind(jwt_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn update(&self, record: &RefreshTokenRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET jwt_id = $2, is_used = $3, is_revoked = $4
            WHERE id = $1
            "#,
        )
        .bind(record.id)
        .bind(&record.jwt_id)
        .bind(record.is_used)
        .bind(record.is_revoked)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_used(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET is_used = true WHERE id = $1 AND is_used = false",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn rotate_jwt_id(
        &self,
        id: Uuid,
        expected_jwt_id: &str,
        new_jwt_id: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET jwt_id = $3, is_used = true
            WHERE id = $1 AND jwt_id = $2 AND is_revoked = false
            "#,
        )
        .bind(id)
        .bind(expected_jwt_id)
        .bind(new_jwt_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn revoke(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET is_used = true, is_revoked = true
            WHERE id = $1 AND is_revoked = false
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
