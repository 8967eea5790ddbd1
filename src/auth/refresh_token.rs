/// Refresh Token Records
///
/// A refresh token is an opaque random string tracked server-side. Each
/// record points at the `jti` of the access token it currently backs; that
/// pointer moves every time the pair is rotated.

use chrono::{DateTime, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use uuid::Uuid;

/// Length of generated refresh tokens (62^64, roughly 381 bits)
pub const REFRESH_TOKEN_LENGTH: usize = 64;

/// Generate a new refresh token string
///
/// `thread_rng` is a CSPRNG (ChaCha seeded from the OS), so tokens are not
/// guessable from earlier ones.
pub fn generate_refresh_token() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(REFRESH_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    pub token: String,
    pub jwt_id: String,
    pub user_id: Uuid,
    pub created_time: DateTime<Utc>,
    pub expiration_date: DateTime<Utc>,
    pub is_used: bool,
    pub is_revoked: bool,
}

/// Lifecycle state of a record at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTokenState {
    Active,
    Consumed,
    Revoked,
    Expired,
}

impl RefreshTokenRecord {
    /// A fresh, unused record for `user_id` backing the access token `jwt_id`
    pub fn issue(user_id: Uuid, jwt_id: String, ttl: Duration, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            token: generate_refresh_token(),
            jwt_id,
            user_id,
            created_time: now,
            expiration_date: now + ttl,
            is_used: false,
            is_revoked: false,
        }
    }

    /// Expiry is inclusive: a record whose expiration date is `now` is expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiration_date
    }

    /// Revocation wins over expiry, expiry over use.
    pub fn state_at(&self, now: DateTime<Utc>) -> RefreshTokenState {
        if self.is_revoked {
            RefreshTokenState::Revoked
        } else if self.is_expired_at(now) {
            RefreshTokenState::Expired
        } else if self.is_used {
            RefreshTokenState::Consumed
        } else {
            RefreshTokenState::Active
        }
    }

    /// Can still back a new access token (Active or Consumed)
    pub fn is_reusable_at(&self, now: DateTime<Utc>) -> bool {
        matches!(
            self.state_at(now),
            RefreshTokenState::Active | RefreshTokenState::Consumed
        )
    }
}
