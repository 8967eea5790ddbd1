mod auth;
mod health_check;
mod me;

pub use auth::{
    json_config, login, logout, refresh_token, register, AuthResult, LoginRequest,
    LogoutRequest, RegisterRequest, TokenRequest, INVALID_PARAMETERS, INVALID_PAYLOAD,
};
pub use health_check::health_check;
pub use me::{me, MeResponse};
