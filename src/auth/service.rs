/// Auth flows behind the `/authentication` endpoints
///
/// Every flow returns either a token pair or an `AuthFlowError` that the
/// handler renders as `{ "result": false, "errors": [...] }`.

use std::sync::Arc;

use crate::auth::issuer::{IssuedTokens, TokenIssuer};
use crate::auth::password::{hash_password, password_policy_violations, verify_password};
use crate::auth::refresh_flow;
use crate::configuration::{JwtSettings, PasswordSettings};
use crate::error::{AuthFlowError, CredentialError, StoreError};
use crate::store::{NewUser, RefreshTokenStore, UserStore};
use crate::validators::{is_valid_email, is_valid_name};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutOutcome {
    LoggedOut,
    AlreadyLoggedOut,
}

impl LogoutOutcome {
    pub fn message(self) -> &'static str {
        match self {
            LogoutOutcome::LoggedOut => "Logout successful.",
            LogoutOutcome::AlreadyLoggedOut => "User is already logged out.",
        }
    }
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    tokens: Arc<dyn RefreshTokenStore>,
    issuer: TokenIssuer,
    password: PasswordSettings,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        tokens: Arc<dyn RefreshTokenStore>,
        jwt: JwtSettings,
        password: PasswordSettings,
    ) -> Self {
        let issuer = TokenIssuer::new(tokens.clone(), jwt);
        Self {
            users,
            tokens,
            issuer,
            password,
        }
    }

    pub fn users(&self) -> Arc<dyn UserStore> {
        self.users.clone()
    }

    pub fn tokens(&self) -> Arc<dyn RefreshTokenStore> {
        self.tokens.clone()
    }

    pub fn jwt_settings(&self) -> &JwtSettings {
        self.issuer.config()
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<IssuedTokens, AuthFlowError> {
        let mut errors = Vec::new();
        let email = is_valid_email(email).map_err(|e| errors.push(e.to_string())).ok();
        let name = is_valid_name(name).map_err(|e| errors.push(e.to_string())).ok();
        let (email, name) = match (email, name) {
            (Some(email), Some(name)) if errors.is_empty() => (email, name),
            _ => return Err(AuthFlowError::Validation(errors)),
        };

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AuthFlowError::DuplicateEmail);
        }

        let violations = password_policy_violations(password);
        if !violations.is_empty() {
            return Err(AuthFlowError::Validation(violations));
        }

        let password_hash = hash_password(password.to_string(), self.password.hash_cost)
            .await
            .map_err(AuthFlowError::server)?;

        let user = self
            .users
            .create(NewUser {
                email,
                name,
                password_hash,
            })
            .await
            .map_err(|e| match e {
                StoreError::Duplicate(_) => AuthFlowError::DuplicateEmail,
                other => AuthFlowError::from(other),
            })?;

        tracing::info!(user_id = %user.id, "User registered");
        self.issuer.issue(&user).await
    }

    /// Unknown email and wrong password are reported differently, which lets a
    /// caller probe for registered addresses.
    pub async fn login(&self, email: &str, password: &str) -> Result<IssuedTokens, AuthFlowError> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(CredentialError::UnknownUser)?;

        let matches = verify_password(password.to_string(), user.password_hash.clone())
            .await
            .map_err(AuthFlowError::server)?;
        if !matches {
            return Err(CredentialError::InvalidPassword.into());
        }

        tracing::info!(user_id = %user.id, "User logged in");
        self.issuer.issue(&user).await
    }

    pub async fn logout(&self, refresh_token: &str) -> Result<LogoutOutcome, AuthFlowError> {
        let record = self
            .tokens
            .find_by_token(refresh_token)
            .await?
            .ok_or(AuthFlowError::UnknownSession)?;

        if record.is_revoked {
            return Ok(LogoutOutcome::AlreadyLoggedOut);
        }

        if self.tokens.revoke(record.id).await? {
            tracing::info!(user_id = %record.user_id, "Refresh token revoked");
            Ok(LogoutOutcome::LoggedOut)
        } else {
            Ok(LogoutOutcome::AlreadyLoggedOut)
        }
    }

    pub async fn refresh(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<IssuedTokens, AuthFlowError> {
        refresh_flow::exchange(
            &self.issuer,
            self.tokens.as_ref(),
            self.users.as_ref(),
            access_token,
            refresh_token,
        )
        .await
    }
}
