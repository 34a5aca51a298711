/// Middleware module
///
/// The auth gate for protected routes and the Redis-backed fixed-window
/// rate limiter.

mod auth_gate;
mod rate_limit;

pub use auth_gate::{AuthGate, AuthenticatedUser};
pub use rate_limit::RateLimiter;
