/// Token Issuer
///
/// Mints an access token and binds it to a refresh-token record. A user's
/// latest record is reused while it is neither expired nor revoked: its
/// `jwt_id` is swapped onto the new access token and the same refresh token
/// string goes back to the client.

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::auth::claims::Claims;
use crate::auth::jwt::encode_access_token;
use crate::auth::refresh_token::RefreshTokenRecord;
use crate::configuration::JwtSettings;
use crate::error::AuthFlowError;
use crate::store::{RefreshTokenStore, User};

/// Attempts at swapping onto the latest record before giving up
const MAX_ROTATION_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Clone)]
pub struct TokenIssuer {
    tokens: Arc<dyn RefreshTokenStore>,
    config: JwtSettings,
}

impl TokenIssuer {
    pub fn new(tokens: Arc<dyn RefreshTokenStore>, config: JwtSettings) -> Self {
        Self { tokens, config }
    }

    pub fn config(&self) -> &JwtSettings {
        &self.config
    }

    fn mint_access_token(&self, user: &User) -> Result<(Claims, String), AuthFlowError> {
        let claims = Claims::new(user.id, user.email.clone(), self.config.access_token_expiry);
        let token = encode_access_token(&claims, &self.config)
            .map_err(|e| AuthFlowError::server(format!("Token generation failed: {}", e)))?;
        Ok((claims, token))
    }

    /// Issue a pair for a freshly authenticated user (register / login)
    pub async fn issue(&self, user: &User) -> Result<IssuedTokens, AuthFlowError> {
        for attempt in 1..=MAX_ROTATION_ATTEMPTS {
            let (claims, access_token) = self.mint_access_token(user)?;
            let now = Utc::now();

            match self.tokens.find_latest_by_user(user.id).await? {
                Some(current) if current.is_reusable_at(now) => {
                    if self
                        .tokens
                        .rotate_jwt_id(current.id, &current.jwt_id, &claims.jti)
                        .await?
                    {
                        tracing::debug!(user_id = %user.id, "Reusing refresh token");
                        return Ok(IssuedTokens {
                            access_token,
                            refresh_token: current.token,
                        });
                    }
                    tracing::debug!(user_id = %user.id, attempt, "Refresh token rotated concurrently");
                }
                _ => {
                    let record = RefreshTokenRecord::issue(
                        user.id,
                        claims.jti,
                        Duration::seconds(self.config.refresh_token_expiry),
                        now,
                    );
                    self.tokens.insert(&record).await?;
                    tracing::debug!(user_id = %user.id, "Issued new refresh token");
                    return Ok(IssuedTokens {
                        access_token,
                        refresh_token: record.token,
                    });
                }
            }
        }

        Err(AuthFlowError::server(format!(
            "refresh token for user {} kept rotating concurrently",
            user.id
        )))
    }

    /// Rotate an already validated `record` onto a new access token
    ///
    /// Returns `None` if the record was revoked or rotated by someone else
    /// since it was read.
    pub async fn rotate(
        &self,
        user: &User,
        record: &RefreshTokenRecord,
    ) -> Result<Option<IssuedTokens>, AuthFlowError> {
        let (claims, access_token) = self.mint_access_token(user)?;

        let swapped = self
            .tokens
            .rotate_jwt_id(record.id, &record.jwt_id, &claims.jti)
            .await?;

        Ok(swapped.then(|| IssuedTokens {
            access_token,
            refresh_token: record.token.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{verify_access_token, ExpiryCheck};
    use crate::store::InMemoryRefreshTokenStore;
    use uuid::Uuid;

    fn config() -> JwtSettings {
        JwtSettings {
            secret: "test-secret-key-at-least-32-characters-long".to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 3600,
        }
    }

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            email: "reader@example.com".to_string(),
            name: "Reader".to_string(),
            password_hash: "hash".to_string(),
            created_at: Utc::now(),
        }
    }

    fn issuer() -> (TokenIssuer, Arc<InMemoryRefreshTokenStore>) {
        let store = Arc::new(InMemoryRefreshTokenStore::new());
        (TokenIssuer::new(store.clone(), config()), store)
    }

    fn jti_of(tokens: &IssuedTokens) -> String {
        verify_access_token(&tokens.access_token, &config(), ExpiryCheck::Strict)
            .unwrap()
            .jti
    }

    #[tokio::test]
    async fn first_issue_creates_a_record_bound_to_the_jti() {
        let (issuer, store) = issuer();
        let user = user();

        let tokens = issuer.issue(&user).await.unwrap();

        let record = store.find_by_token(&tokens.refresh_token).await.unwrap().unwrap();
        assert_eq!(record.user_id, user.id);
        assert_eq!(record.jwt_id, jti_of(&tokens));
        assert!(!record.is_used);
        assert!(!record.is_revoked);
        assert_eq!(
            record.expiration_date - record.created_time,
            Duration::seconds(3600)
        );
    }

    #[tokio::test]
    async fn live_record_is_reused_and_rebound() {
        let (issuer, store) = issuer();
        let user = user();

        let first = issuer.issue(&user).await.unwrap();
        let second = issuer.issue(&user).await.unwrap();

        assert_eq!(first.refresh_token, second.refresh_token);
        assert_ne!(first.access_token, second.access_token);

        let record = store.find_by_token(&second.refresh_token).await.unwrap().unwrap();
        assert_eq!(record.jwt_id, jti_of(&second));
        // The previous access token no longer has a backing record
        assert!(store
            .find_latest_by_jwt_id(&jti_of(&first))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn revoked_record_is_replaced() {
        let (issuer, store) = issuer();
        let user = user();

        let first = issuer.issue(&user).await.unwrap();
        let record = store.find_by_token(&first.refresh_token).await.unwrap().unwrap();
        store.revoke(record.id).await.unwrap();

        let second = issuer.issue(&user).await.unwrap();
        assert_ne!(first.refresh_token, second.refresh_token);
    }

    #[tokio::test]
    async fn expired_record_is_replaced() {
        let (issuer, store) = issuer();
        let user = user();

        let now = Utc::now();
        let expired = RefreshTokenRecord::issue(
            user.id,
            "old-jti".to_string(),
            Duration::seconds(1),
            now - Duration::hours(1),
        );
        store.insert(&expired).await.unwrap();

        let tokens = issuer.issue(&user).await.unwrap();
        assert_ne!(tokens.refresh_token, expired.token);

        let untouched = store.find_by_token(&expired.token).await.unwrap().unwrap();
        assert_eq!(untouched.jwt_id, "old-jti");
    }

    #[tokio::test]
    async fn rotate_refuses_a_stale_read() {
        let (issuer, store) = issuer();
        let user = user();

        let tokens = issuer.issue(&user).await.unwrap();
        let record = store.find_by_token(&tokens.refresh_token).await.unwrap().unwrap();

        let rotated = issuer.rotate(&user, &record).await.unwrap();
        assert!(rotated.is_some());
        // Same snapshot again: jwt_id has moved on
        assert!(issuer.rotate(&user, &record).await.unwrap().is_none());
    }
}
