/// Error types
///
/// Two families live here:
/// 1. Flow errors (`AuthFlowError` and the token/credential errors it wraps),
///    rendered by the auth endpoints as `{ "result": false, "errors": [...] }`.
/// 2. `AppError`, used by everything else (protected resources, the current
///    user extractor), rendered as a JSON `ErrorResponse` envelope.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};

use crate::routes::AuthResult;

// ============================================================================
// STORAGE
// ============================================================================

/// Errors raised by the user and refresh-token stores
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate entry: {0}")]
    Duplicate(String),
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

const PG_UNIQUE_VIOLATION: &str = "23505";

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some(PG_UNIQUE_VIOLATION) {
                return StoreError::Duplicate(db_err.message().to_string());
            }
        }
        StoreError::Database(err)
    }
}

// ============================================================================
// FLOW ERRORS (auth endpoints)
// ============================================================================

/// Why a refresh token (or the access token presented with it) was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("Invalid tokens, couldn't find token.")]
    NotFound,
    #[error("Invalid tokens, token is revoked.")]
    Revoked,
    #[error("Invalid tokens, jti doesn't match.")]
    ClaimMismatch,
    #[error("Expired tokens.")]
    Expired,
    /// Bad signature, wrong algorithm or malformed access token
    #[error("Invalid tokens, couldn't verify and generate token.")]
    InvalidToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    #[error("User does not exist.")]
    UnknownUser,
    #[error("Invalid password.")]
    InvalidPassword,
}

/// Failure of one of the register / login / logout / refresh flows
#[derive(Debug, thiserror::Error)]
pub enum AuthFlowError {
    /// Request body missing fields or not parseable
    #[error("{0}")]
    InvalidPayload(&'static str),
    /// Itemized, user-correctable problems with otherwise well-formed input
    #[error("{}", .0.join(" "))]
    Validation(Vec<String>),
    #[error("Email already exists.")]
    DuplicateEmail,
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error(transparent)]
    Token(#[from] TokenError),
    /// Logout with a refresh token nobody issued
    #[error("Invalid tokens, token null.")]
    UnknownSession,
    /// Anything unexpected; details are logged, never sent to the client
    #[error("Server error.")]
    Server(String),
}

impl AuthFlowError {
    pub fn server(detail: impl std::fmt::Display) -> Self {
        AuthFlowError::Server(detail.to_string())
    }

    /// Client-facing messages for the `errors` array
    pub fn messages(&self) -> Vec<String> {
        match self {
            AuthFlowError::Validation(errors) => errors.clone(),
            other => vec![other.to_string()],
        }
    }
}

impl From<StoreError> for AuthFlowError {
    fn from(err: StoreError) -> Self {
        AuthFlowError::server(err)
    }
}

impl ResponseError for AuthFlowError {
    fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }

    // Logged by the handler through `ErrorContext`, which knows the request id.
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(AuthResult::failure(self.messages()))
    }
}

// ============================================================================
// APPLICATION ERRORS (everything outside the auth endpoints)
// ============================================================================

/// Authentication errors surfaced to protected handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Missing authentication token")]
    MissingToken,
    #[error("Invalid token")]
    TokenInvalid,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Error response structure for HTTP responses
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    /// Unique error ID for tracking
    pub error_id: String,
    pub message: String,
    /// Error code for client-side handling
    pub code: String,
    pub status: u16,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String, status: u16) -> Self {
        Self {
            error_id,
            message,
            code,
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Converts errors to HTTP responses with matching log lines
pub trait ErrorHandler {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse);
    fn log_error(&self, request_id: &str);
}

impl ErrorHandler for AppError {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse) {
        let (status, code, message) = match self {
            AppError::Auth(AuthError::MissingToken) => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Missing or invalid authorization header",
            ),
            AppError::Auth(AuthError::TokenInvalid) => (
                StatusCode::UNAUTHORIZED,
                "TOKEN_INVALID",
                "Invalid or expired token",
            ),
            AppError::Store(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "Database error occurred",
            ),
        };

        let error_response = ErrorResponse::new(
            request_id.to_string(),
            message.to_string(),
            code.to_string(),
            status.as_u16(),
        );

        (status, error_response)
    }

    fn log_error(&self, request_id: &str) {
        match self {
            AppError::Auth(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Authentication error");
            }
            AppError::Store(e) => {
                tracing::error!(request_id = request_id, error = %e, "Database error");
            }
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let request_id = uuid::Uuid::new_v4().to_string();
        self.log_error(&request_id);

        let (status, error_response) = <Self as ErrorHandler>::error_response(self, &request_id);

        HttpResponse::build(status).json(error_response)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Request id and operation name attached to flow log lines
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub request_id: String,
    pub operation: &'static str,
}

impl ErrorContext {
    pub fn new(operation: &'static str) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            operation,
        }
    }

    pub fn log_rejection(&self, error: &AuthFlowError) {
        match error {
            AuthFlowError::Server(detail) => tracing::error!(
                request_id = %self.request_id,
                operation = self.operation,
                error = %detail,
                "Server error"
            ),
            other => tracing::warn!(
                request_id = %self.request_id,
                operation = self.operation,
                error = %other,
                "Request rejected"
            ),
        }
    }
}
