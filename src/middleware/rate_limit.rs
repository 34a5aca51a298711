/// Fixed-window rate limiter backed by Redis
///
/// One counter per scope and client IP: `rate-limit:{scope}:{ip}`.
/// Every hit re-arms the window expiry if the key has none, so a counter
/// whose EXPIRE was lost cannot lock an address out permanently. Once
/// the count passes the limit the request is rejected with a 429.
/// Loopback addresses are skipped. If Redis is down the limiter fails
/// open with a logged error rather than taking the endpoint down with it.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpResponse,
};
use futures::future::LocalBoxFuture;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::rc::Rc;

use crate::error::ErrorResponse;

const DEFAULT_WINDOW_SECONDS: i64 = 15 * 60;
const DEFAULT_MAX_REQUESTS: u64 = 10;

pub struct RateLimiter {
    scope: &'static str,
    redis: ConnectionManager,
    window_seconds: i64,
    max_requests: u64,
}

impl RateLimiter {
    pub fn new(scope: &'static str, redis: ConnectionManager) -> Self {
        Self {
            scope,
            redis,
            window_seconds: DEFAULT_WINDOW_SECONDS,
            max_requests: DEFAULT_MAX_REQUESTS,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimiter
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RateLimiterService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(RateLimiterService {
            service: Rc::new(service),
            scope: self.scope,
            redis: self.redis.clone(),
            window_seconds: self.window_seconds,
            max_requests: self.max_requests,
        }))
    }
}

pub struct RateLimiterService<S> {
    service: Rc<S>,
    scope: &'static str,
    redis: ConnectionManager,
    window_seconds: i64,
    max_requests: u64,
}

fn window_key(scope: &str, ip: &str) -> String {
    format!("rate-limit:{}:{}", scope, ip)
}

fn is_loopback(ip: &str) -> bool {
    ip == "127.0.0.1" || ip == "::1" || ip == "localhost"
}

/// TTL of -1 means the key exists without an expiry, -2 that it is gone;
/// either way the window must be (re)armed.
fn needs_window(ttl: i64) -> bool {
    ttl < 0
}

impl<S, B> Service<ServiceRequest> for RateLimiterService<S>
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
        let client_ip = req
            .connection_info()
            .realip_remote_addr()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let scope = self.scope;
        let redis = self.redis.clone();
        let window_seconds = self.window_seconds;
        let max_requests = self.max_requests;
        let service = self.service.clone();

        Box::pin(async move {
            if !is_loopback(&client_ip) {
                let key = window_key(scope, &client_ip);
                let mut conn = redis.clone();

                let count: Result<u64, redis::RedisError> = conn.incr(&key, 1u64).await;
                match count {
                    Ok(count) => {
                        match conn.ttl::<_, i64>(&key).await {
                            Ok(ttl) if needs_window(ttl) => {
                                if let Err(e) = conn.expire::<_, ()>(&key, window_seconds).await {
                                    tracing::error!("Failed to set rate-limit window: {}", e);
                                }
                            }
                            Ok(_) => (),
                            Err(e) => {
                                tracing::error!("Failed to read rate-limit window: {}", e);
                            }
                        }
                        if count > max_requests {
                            tracing::warn!(scope = scope, ip = %client_ip, count = count, "Rate limit exceeded");
                            let response = HttpResponse::TooManyRequests().json(
                                ErrorResponse::new(
                                    "Too many attempts, try again later",
                                    "RATE_LIMITED",
                                ),
                            );
                            return Err(actix_web::error::InternalError::from_response(
                                "Rate limited",
                                response,
                            )
                            .into());
                        }
                    }
                    Err(e) => {
                        tracing::error!("Rate limiter backend unavailable: {}", e);
                    }
                }
            }

            service.call(req).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_key_format() {
        assert_eq!(window_key("login", "203.0.113.9"), "rate-limit:login:203.0.113.9");
    }

    #[test]
    fn test_window_rearmed_when_expiry_is_missing() {
        assert!(needs_window(-1)); // counter survived without a TTL
        assert!(needs_window(-2)); // counter gone, next INCR recreates it
        assert!(!needs_window(120));
    }

    #[test]
    fn test_loopback_detection() {
        assert!(is_loopback("127.0.0.1"));
        assert!(is_loopback("::1"));
        assert!(!is_loopback("203.0.113.9"));
    }
}
