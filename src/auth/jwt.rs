/// JWT Token Generation and Verification
///
/// Access tokens are HS256-signed. There is a single verification path; the
/// caller decides whether an expired token is acceptable through
/// [`ExpiryCheck`].

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::auth::claims::Claims;
use crate::configuration::JwtSettings;

const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// Whether `exp` is enforced during verification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryCheck {
    /// Signature and expiration (protected requests)
    Strict,
    /// Signature only (refresh exchange, where the token is expected to be stale)
    Lenient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("signature does not match")]
    InvalidSignature,
    #[error("token is not signed with HS256")]
    InvalidAlgorithm,
    #[error("token has expired")]
    Expired,
    #[error("token is malformed")]
    Malformed,
}

impl From<jsonwebtoken::errors::Error> for VerifyError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => VerifyError::InvalidSignature,
            ErrorKind::InvalidAlgorithm => VerifyError::InvalidAlgorithm,
            ErrorKind::ExpiredSignature => VerifyError::Expired,
            _ => VerifyError::Malformed,
        }
    }
}

/// Sign `claims` with the configured secret
///
/// # Errors
/// Returns error if the claims cannot be serialized
pub fn encode_access_token(
    claims: &Claims,
    config: &JwtSettings,
) -> Result<String, jsonwebtoken::errors::Error> {
    encode(
        &Header::new(SIGNING_ALGORITHM),
        claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
}

/// Verify an access token and return its claims
///
/// Only HS256 is accepted, whatever the token header claims. Issuer and
/// audience are not checked.
pub fn verify_access_token(
    token: &str,
    config: &JwtSettings,
    expiry: ExpiryCheck,
) -> Result<Claims, VerifyError> {
    let mut validation = Validation::new(SIGNING_ALGORITHM);
    validation.leeway = 0;
    validation.validate_exp = expiry == ExpiryCheck::Strict;
    validation.set_required_spec_claims(&["exp", "sub"]);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::debug!("JWT verification failed: {}", e);
        VerifyError::from(e)
    })
}
