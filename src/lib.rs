pub mod auth;
pub mod configuration;
pub mod email_client;
pub mod error;
pub mod middleware;
pub mod pdf;
pub mod request_logging;
pub mod routes;
pub mod startup;
pub mod telemetry;
pub mod validators;
