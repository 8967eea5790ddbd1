/// JWT Claims structure
///
/// Payload of an access token. Besides the subject and email, every token
/// carries a unique `jti` binding it to exactly one refresh-token record.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthError;

/// JWT Claims for access tokens
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    pub email: String,
    /// Unique token id, stored as `jwt_id` on the paired refresh token
    pub jti: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Create claims for `user_id` with a fresh `jti`, valid for `expiry_seconds`
    pub fn new(user_id: Uuid, email: String, expiry_seconds: i64) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: user_id.to_string(),
            email,
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + expiry_seconds,
        }
    }

    /// Extract user ID from claims
    ///
    /// # Errors
    /// Returns error if the subject is not a valid UUID
    pub fn user_id(&self) -> Result<Uuid, AuthError> {
        Uuid::parse_str(&self.sub).map_err(|_| AuthError::TokenInvalid)
    }
}
