/// Request Gate
///
/// Guards protected scopes. A bearer token must verify (signature and
/// expiry) AND its `jti` must still be backed by a live refresh-token record,
/// so a logout takes effect on the very next request. Requests without an
/// `Authorization` header pass through unauthenticated; handlers that need an
/// identity refuse them through the `CurrentUser` extractor. A header with
/// any scheme other than `Bearer` (matched case-insensitively) is refused.
///
/// Rejections are bare status codes with no body.

use std::rc::Rc;
use std::sync::Arc;

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderValue, AUTHORIZATION},
    Error, HttpMessage, HttpResponse,
};
use chrono::{DateTime, Utc};
use futures::future::LocalBoxFuture;

use crate::auth::{verify_access_token, ExpiryCheck};
use crate::configuration::JwtSettings;
use crate::error::StoreError;
use crate::store::RefreshTokenStore;

/// Outcome of checking an access token's `jti` against the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    NoRecord,
    Revoked,
    Expired,
}

/// Look up the newest record for `jti`; record its first use if admitted.
pub async fn check_revocation(
    tokens: &dyn RefreshTokenStore,
    jti: &str,
    now: DateTime<Utc>,
) -> Result<Admission, StoreError> {
    let record = match tokens.find_latest_by_jwt_id(jti).await? {
        Some(record) => record,
        None => return Ok(Admission::NoRecord),
    };

    if record.is_revoked {
        return Ok(Admission::Revoked);
    }
    if record.is_expired_at(now) {
        return Ok(Admission::Expired);
    }
    if !record.is_used {
        tokens.mark_used(record.id).await?;
    }

    Ok(Admission::Admitted)
}

/// What the `Authorization` header offers
#[derive(Debug, PartialEq, Eq)]
enum Credentials {
    Absent,
    Bearer(String),
    /// Present but not a usable `Bearer <token>` value
    Unusable,
}

fn credentials(header: Option<&HeaderValue>) -> Credentials {
    let value = match header {
        None => return Credentials::Absent,
        Some(value) => value,
    };

    let value = match value.to_str() {
        Ok(value) => value.trim(),
        Err(_) => return Credentials::Unusable,
    };

    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => {
            let token = token.trim();
            if token.is_empty() {
                Credentials::Unusable
            } else {
                Credentials::Bearer(token.to_string())
            }
        }
        _ => Credentials::Unusable,
    }
}

fn reject(response: HttpResponse) -> Error {
    actix_web::error::InternalError::from_response("request refused by gate", response).into()
}

pub struct RequestGate {
    tokens: Arc<dyn RefreshTokenStore>,
    jwt_config: JwtSettings,
}

impl RequestGate {
    pub fn new(tokens: Arc<dyn RefreshTokenStore>, jwt_config: JwtSettings) -> Self {
        Self { tokens, jwt_config }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequestGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestGateService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(RequestGateService {
            service: Rc::new(service),
            tokens: self.tokens.clone(),
            jwt_config: Rc::new(self.jwt_config.clone()),
        }))
    }
}

pub struct RequestGateService<S> {
    service: Rc<S>,
    tokens: Arc<dyn RefreshTokenStore>,
    jwt_config: Rc<JwtSettings>,
}

impl<S, B> Service<ServiceRequest> for RequestGateService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let tokens = self.tokens.clone();
        let jwt_config = self.jwt_config.clone();

        Box::pin(async move {
            let token = match credentials(req.headers().get(AUTHORIZATION)) {
                Credentials::Bearer(token) => token,
                Credentials::Absent => return service.call(req).await,
                Credentials::Unusable => {
                    tracing::warn!("Authorization header is not a bearer token");
                    return Err(reject(HttpResponse::Unauthorized().finish()));
                }
            };

            let claims = match verify_access_token(&token, &jwt_config, ExpiryCheck::Strict) {
                Ok(claims) => claims,
                Err(e) => {
                    tracing::warn!(error = %e, "Access token failed verification");
                    return Err(reject(HttpResponse::Unauthorized().finish()));
                }
            };

            match check_revocation(tokens.as_ref(), &claims.jti, Utc::now()).await {
                Ok(Admission::Admitted) => {}
                Ok(refusal) => {
                    tracing::warn!(user_id = %claims.sub, reason = ?refusal, "Access token refused");
                    return Err(reject(HttpResponse::Unauthorized().finish()));
                }
                Err(e) => {
                    tracing::error!(error = %e, "Revocation lookup failed");
                    return Err(reject(HttpResponse::InternalServerError().finish()));
                }
            }

            tracing::debug!(user_id = %claims.sub, "Access token admitted");
            req.extensions_mut().insert(claims);
            service.call(req).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::RefreshTokenRecord;
    use crate::store::InMemoryRefreshTokenStore;
    use chrono::Duration;
    use uuid::Uuid;

    async fn store_with(record: &RefreshTokenRecord) -> InMemoryRefreshTokenStore {
        let store = InMemoryRefreshTokenStore::new();
        store.insert(record).await.unwrap();
        store
    }

    #[tokio::test]
    async fn first_admission_marks_record_used() {
        let now = Utc::now();
        let record = RefreshTokenRecord::issue(Uuid::new_v4(), "jti".to_string(), Duration::hours(1), now);
        let store = store_with(&record).await;

        assert_eq!(check_revocation(&store, "jti", now).await.unwrap(), Admission::Admitted);
        let stored = store.find_by_token(&record.token).await.unwrap().unwrap();
        assert!(stored.is_used);

        // Consumed records keep admitting
        assert_eq!(check_revocation(&store, "jti", now).await.unwrap(), Admission::Admitted);
    }

    #[tokio::test]
    async fn unknown_jti_is_refused() {
        let store = InMemoryRefreshTokenStore::new();
        assert_eq!(
            check_revocation(&store, "jti", Utc::now()).await.unwrap(),
            Admission::NoRecord
        );
    }

    #[tokio::test]
    async fn revoked_record_is_refused() {
        let now = Utc::now();
        let record = RefreshTokenRecord::issue(Uuid::new_v4(), "jti".to_string(), Duration::hours(1), now);
        let store = store_with(&record).await;
        store.revoke(record.id).await.unwrap();

        assert_eq!(check_revocation(&store, "jti", now).await.unwrap(), Admission::Revoked);
    }

    #[tokio::test]
    async fn expiry_boundary_is_inclusive() {
        let now = Utc::now();
        let record = RefreshTokenRecord::issue(Uuid::new_v4(), "jti".to_string(), Duration::hours(1), now);
        let store = store_with(&record).await;

        let at_expiry = record.expiration_date;
        assert_eq!(check_revocation(&store, "jti", at_expiry).await.unwrap(), Admission::Expired);

        let just_before = record.expiration_date - Duration::microseconds(1);
        assert_eq!(check_revocation(&store, "jti", just_before).await.unwrap(), Admission::Admitted);
    }

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        for header in ["Bearer abc", "bearer abc", "BEARER  abc "] {
            assert_eq!(
                credentials(Some(&HeaderValue::from_static(header))),
                Credentials::Bearer("abc".to_string()),
                "{}",
                header
            );
        }
    }

    #[test]
    fn other_schemes_are_unusable() {
        assert_eq!(credentials(None), Credentials::Absent);
        for header in ["Token abc", "Basic dXNlcjpwdw==", "Bearer", "Bearer   ", "abc"] {
            assert_eq!(
                credentials(Some(&HeaderValue::from_static(header))),
                Credentials::Unusable,
                "{}",
                header
            );
        }
    }
}
