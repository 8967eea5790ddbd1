/// Identity of the caller behind a protected scope

use actix_web::{web, HttpResponse};
use serde::Serialize;

use crate::auth::AuthService;
use crate::error::{AppError, AuthError};
use crate::middleware::CurrentUser;

#[derive(Serialize)]
pub struct MeResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    pub created_at: String,
}

/// GET /api/me
///
/// Requires `Authorization: Bearer <access_token>`; the request gate has
/// already checked the token against the revocation store.
pub async fn me(
    user: CurrentUser,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let user_id = user.0.user_id()?;

    let found = service
        .users()
        .find_by_id(user_id)
        .await?
        .ok_or(AuthError::TokenInvalid)?;

    Ok(HttpResponse::Ok().json(MeResponse {
        id: found.id.to_string(),
        email: found.email,
        name: found.name,
        created_at: found.created_at.to_rfc3339(),
    }))
}
