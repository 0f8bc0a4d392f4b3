pub mod jwt;

use actix_web::{FromRequest, HttpRequest, HttpResponse, ResponseError, dev::Payload, web};
use std::future::{Ready, ready};
use uuid::Uuid;

use jwt::JwtService;

/// The authenticated caller, resolved from the `Authorization` header.
/// Results are partitioned per caller, so every handler that reads or writes
/// predictions takes this as an argument.
#[derive(Debug)]
pub struct CallerIdentity(pub Uuid);

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing or invalid authorization token")]
    MissingBearer,
    #[error("Token verification failed")]
    VerificationFailed(String),
    #[error("Invalid token claims")]
    InvalidClaims(String),
}

impl ResponseError for AuthError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::Unauthorized().json(serde_json::json!({ "error": self.to_string() }))
    }
}

fn caller_from_request(req: &HttpRequest) -> Result<Uuid, AuthError> {
    let jwt_service = req
        .app_data::<web::Data<JwtService>>()
        .ok_or(AuthError::MissingBearer)?;

    let token = req
        .headers()
        .get("Authorization")
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .ok_or(AuthError::MissingBearer)?;

    let claims = jwt_service.verify_token(token).map_err(|e| {
        log::warn!("token verification failed for {}: {}", req.path(), e);
        AuthError::VerificationFailed(e.to_string())
    })?;

    Uuid::parse_str(&claims.sub).map_err(|_| {
        log::warn!("non-uuid subject in token claims: {}", claims.sub);
        AuthError::InvalidClaims(claims.sub.clone())
    })
}

impl FromRequest for CallerIdentity {
    type Error = AuthError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(caller_from_request(req).map(CallerIdentity))
    }
}
