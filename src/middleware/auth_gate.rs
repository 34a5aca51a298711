/// Auth gate middleware
///
/// Verifies the bearer token on every protected request: signature and
/// expiry first, then the revocation cache, so a logged-out session is
/// rejected even while its token would otherwise still validate. On
/// success the authenticated user id is injected into the request
/// extensions for handlers to pick up via `web::ReqData`.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage, HttpResponse,
};
use futures::future::LocalBoxFuture;
use redis::aio::ConnectionManager;
use std::rc::Rc;
use uuid::Uuid;

use crate::auth::{is_blacklisted, verify_access_token};
use crate::configuration::JwtSettings;
use crate::error::ErrorResponse;

/// Authenticated caller, inserted into request extensions by the gate.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser(pub Uuid);

pub struct AuthGate {
    jwt_config: JwtSettings,
    redis: ConnectionManager,
}

impl AuthGate {
    pub fn new(jwt_config: JwtSettings, redis: ConnectionManager) -> Self {
        Self { jwt_config, redis }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthGateService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(AuthGateService {
            service: Rc::new(service),
            jwt_config: self.jwt_config.clone(),
            redis: self.redis.clone(),
        }))
    }
}

pub struct AuthGateService<S> {
    service: Rc<S>,
    jwt_config: JwtSettings,
    redis: ConnectionManager,
}

fn unauthorized(message: &str, code: &str) -> Error {
    let response = HttpResponse::Unauthorized().json(ErrorResponse::new(message, code));
    actix_web::error::InternalError::from_response("Unauthorized", response).into()
}

fn bearer_token(req: &ServiceRequest) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.to_string())
}

impl<S, B> Service<ServiceRequest> for AuthGateService<S>
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
        let token = bearer_token(&req);
        let jwt_config = self.jwt_config.clone();
        let redis = self.redis.clone();
        let service = self.service.clone();

        Box::pin(async move {
            let token = match token {
                Some(token) => token,
                None => {
                    tracing::warn!("Missing or invalid Authorization header");
                    return Err(unauthorized(
                        "Not authorized, no token provided",
                        "MISSING_TOKEN",
                    ));
                }
            };

            let claims = match verify_access_token(&token, &jwt_config) {
                Ok(claims) => claims,
                Err(e) => {
                    tracing::warn!("Access token rejected: {}", e);
                    return Err(unauthorized("Not authorized, invalid token", "TOKEN_INVALID"));
                }
            };

            match is_blacklisted(&redis, &claims.jti).await {
                Ok(false) => (),
                Ok(true) => {
                    tracing::warn!(jti = %claims.jti, "Revoked token presented");
                    return Err(unauthorized(
                        "Token revoked, please login again",
                        "TOKEN_REVOKED",
                    ));
                }
                Err(e) => {
                    // Cannot prove the session is alive without the cache.
                    tracing::error!("Revocation cache unavailable: {}", e);
                    return Err(unauthorized("Not authorized, invalid token", "TOKEN_INVALID"));
                }
            }

            let user_id = match claims.user_id() {
                Ok(id) => id,
                Err(_) => {
                    tracing::warn!(sub = %claims.sub, "Token subject is not a valid user id");
                    return Err(unauthorized("Not authorized, invalid token", "TOKEN_INVALID"));
                }
            };

            req.extensions_mut().insert(AuthenticatedUser(user_id));

            service.call(req).await
        })
    }
}
