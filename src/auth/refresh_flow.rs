/// Refresh Flow
///
/// Exchanges a (typically expired) access token plus its paired refresh token
/// for a new pair. A record moves Active -> Consumed on its first exchange and
/// stays usable until it expires or is revoked; the refresh token string is
/// kept, only its `jwt_id` moves to the new access token.

use chrono::Utc;

use crate::auth::issuer::{IssuedTokens, TokenIssuer};
use crate::auth::jwt::{verify_access_token, ExpiryCheck};
use crate::error::{AuthFlowError, TokenError};
use crate::store::{RefreshTokenStore, UserStore};

pub async fn exchange(
    issuer: &TokenIssuer,
    tokens: &dyn RefreshTokenStore,
    users: &dyn UserStore,
    access_token: &str,
    refresh_token: &str,
) -> Result<IssuedTokens, AuthFlowError> {
    let claims = verify_access_token(access_token, issuer.config(), ExpiryCheck::Lenient)
        .map_err(|e| {
            tracing::warn!(error = %e, "Refresh presented an unverifiable access token");
            TokenError::InvalidToken
        })?;

    let record = tokens
        .find_by_token(refresh_token)
        .await?
        .ok_or(TokenError::NotFound)?;

    if record.is_revoked {
        tracing::warn!(user_id = %record.user_id, "Refresh attempted with revoked token");
        return Err(TokenError::Revoked.into());
    }

    if record.jwt_id != claims.jti {
        tracing::warn!(user_id = %record.user_id, "Refresh token presented with a foreign access token");
        return Err(TokenError::ClaimMismatch.into());
    }

    if record.is_expired_at(Utc::now()) {
        tracing::info!(user_id = %record.user_id, "Refresh token expired");
        return Err(TokenError::Expired.into());
    }

    tokens.mark_used(record.id).await?;

    let user = users
        .find_by_id(record.user_id)
        .await?
        .ok_or_else(|| {
            AuthFlowError::server(format!("refresh token owner {} not found", record.user_id))
        })?;

    match issuer.rotate(&user, &record).await? {
        Some(issued) => {
            tracing::info!(user_id = %user.id, "Token pair rotated");
            Ok(issued)
        }
        None => {
            // Lost to a concurrent refresh or logout between the read and the swap
            let current = tokens.find_by_token(refresh_token).await?;
            match current {
                Some(current) if current.is_revoked => Err(TokenError::Revoked.into()),
                _ => Err(TokenError::ClaimMismatch.into()),
            }
        }
    }
}
