use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};

use crate::auth::Claims;
use crate::error::{AppError, AuthError};

/// Identity admitted by the `RequestGate`
///
/// Extraction fails with 401 when the gate let the request through without a
/// bearer token.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Claims);

impl FromRequest for CurrentUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let claims = req.extensions().get::<Claims>().cloned();
        ready(claims.map(CurrentUser).ok_or(AppError::Auth(AuthError::MissingToken)))
    }
}
