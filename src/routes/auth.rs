/// Authentication Routes
///
/// Register, login, logout and token refresh. Failures come back as 400 with
/// `{ "result": false, "errors": [...] }`.

use actix_web::{error::JsonPayloadError, web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{AuthService, IssuedTokens};
use crate::error::{AuthFlowError, ErrorContext};

pub const INVALID_PAYLOAD: &str = "Invalid payload.";
pub const INVALID_PARAMETERS: &str = "Invalid parameters.";

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub refresh_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    pub token: String,
    pub refresh_token: String,
}

/// Body of every auth endpoint answer except a successful logout
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthResult {
    pub result: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

impl AuthResult {
    pub fn success(tokens: IssuedTokens) -> Self {
        Self {
            result: true,
            token: Some(tokens.access_token),
            refresh_token: Some(tokens.refresh_token),
            errors: None,
        }
    }

    pub fn failure(errors: Vec<String>) -> Self {
        Self {
            result: false,
            token: None,
            refresh_token: None,
            errors: Some(errors),
        }
    }
}

/// JSON extractor config answering unparseable bodies with `message`
pub fn json_config(message: &'static str) -> web::JsonConfig {
    web::JsonConfig::default().error_handler(move |err: JsonPayloadError, _req: &HttpRequest| {
        tracing::debug!(error = %err, "Rejected auth request body");
        AuthFlowError::InvalidPayload(message).into()
    })
}

fn require(fields: &[&str], message: &'static str) -> Result<(), AuthFlowError> {
    if fields.iter().any(|f| f.trim().is_empty()) {
        return Err(AuthFlowError::InvalidPayload(message));
    }
    Ok(())
}

fn logged<T>(context: &ErrorContext, result: Result<T, AuthFlowError>) -> Result<T, AuthFlowError> {
    if let Err(e) = &result {
        context.log_rejection(e);
    }
    result
}

/// POST /authentication/register
pub async fn register(
    form: web::Json<RegisterRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AuthFlowError> {
    let context = ErrorContext::new("user_registration");
    require(
        &[form.email.as_str(), form.password.as_str(), form.name.as_str()],
        INVALID_PAYLOAD,
    )?;

    let tokens = logged(
        &context,
        service.register(&form.email, &form.password, &form.name).await,
    )?;

    tracing::info!(request_id = %context.request_id, "Registration succeeded");
    Ok(HttpResponse::Ok().json(AuthResult::success(tokens)))
}

/// POST /authentication/login
pub async fn login(
    form: web::Json<LoginRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AuthFlowError> {
    let context = ErrorContext::new("user_login");
    require(&[form.email.as_str(), form.password.as_str()], INVALID_PAYLOAD)?;

    let tokens = logged(&context, service.login(&form.email, &form.password).await)?;

    tracing::info!(request_id = %context.request_id, "Login succeeded");
    Ok(HttpResponse::Ok().json(AuthResult::success(tokens)))
}

/// POST /authentication/logout
///
/// Answers with a plain-text confirmation, including for a token that was
/// already revoked.
pub async fn logout(
    form: web::Json<LogoutRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AuthFlowError> {
    let context = ErrorContext::new("user_logout");
    require(&[form.refresh_token.as_str()], INVALID_PAYLOAD)?;

    let outcome = logged(&context, service.logout(&form.refresh_token).await)?;

    tracing::info!(request_id = %context.request_id, outcome = ?outcome, "Logout handled");
    Ok(HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body(outcome.message()))
}

/// POST /authentication/refreshtoken
pub async fn refresh_token(
    form: web::Json<TokenRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AuthFlowError> {
    let context = ErrorContext::new("token_refresh");
    require(&[form.token.as_str(), form.refresh_token.as_str()], INVALID_PARAMETERS)?;

    let tokens = logged(
        &context,
        service.refresh(&form.token, &form.refresh_token).await,
    )?;

    tracing::info!(request_id = %context.request_id, "Token refresh succeeded");
    Ok(HttpResponse::Ok().json(AuthResult::success(tokens)))
}
