/// Authentication module
///
/// Access-token signing and verification, refresh-token records, the issuer
/// that pairs them, the refresh exchange, and the register/login/logout flows
/// built on top.

mod claims;
mod issuer;
mod jwt;
mod password;
mod refresh_flow;
mod refresh_token;
mod service;

pub use claims::Claims;
pub use issuer::{IssuedTokens, TokenIssuer};
pub use jwt::{encode_access_token, verify_access_token, ExpiryCheck, VerifyError};
pub use password::{hash_password, password_policy_violations, verify_password, PasswordError};
pub use refresh_token::{
    generate_refresh_token, RefreshTokenRecord, RefreshTokenState, REFRESH_TOKEN_LENGTH,
};
pub use service::{AuthService, LogoutOutcome};
