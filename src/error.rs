/// Unified Error Handling Module
///
/// Every fallible operation in the application funnels into `AppError`,
/// which carries enough structure to pick the right HTTP status and a
/// client-safe message. Internal detail goes to the logs, never the wire.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::error::Error as StdError;
use std::fmt;

/// Validation errors for request input
#[derive(Debug, Clone)]
pub enum ValidationError {
    MissingField(&'static str),
    TooShort(&'static str, usize),
    TooLong(&'static str, usize),
    InvalidFormat(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MissingField(field) => write!(f, "{} is required", field),
            ValidationError::TooShort(field, min) => {
                write!(f, "{} is too short (minimum {} characters)", field, min)
            }
            ValidationError::TooLong(field, max) => {
                write!(f, "{} is too long (maximum {} characters)", field, max)
            }
            ValidationError::InvalidFormat(msg) => write!(f, "{}", msg),
        }
    }
}

impl StdError for ValidationError {}

/// Authentication and session errors
#[derive(Debug, Clone)]
pub enum AuthError {
    /// No bearer token on a protected request
    MissingToken,
    /// Unknown email or wrong password; deliberately indistinguishable
    InvalidCredentials,
    /// Bad signature, expired, revoked, or otherwise unusable token
    InvalidToken,
    /// Token could not be parsed at all (logout path)
    MalformedToken,
    /// Credentials are fine but the account has not verified its email
    EmailNotVerified,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::MissingToken => write!(f, "Not authorized, no token provided"),
            AuthError::InvalidCredentials => write!(f, "Invalid credentials!"),
            AuthError::InvalidToken => write!(f, "Invalid or expired token"),
            AuthError::MalformedToken => write!(f, "Invalid token format"),
            AuthError::EmailNotVerified => {
                write!(f, "Please verify your email before logging in. Check your inbox!")
            }
        }
    }
}

impl StdError for AuthError {}

/// Datastore errors, already classified from the driver error
#[derive(Debug)]
pub enum DatabaseError {
    Duplicate(String),
    NotFound(String),
    Query(String),
    Pool(String),
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseError::Duplicate(msg) => write!(f, "Duplicate entry: {}", msg),
            DatabaseError::NotFound(msg) => write!(f, "Not found: {}", msg),
            DatabaseError::Query(msg) => write!(f, "Query error: {}", msg),
            DatabaseError::Pool(msg) => write!(f, "Database connection error: {}", msg),
        }
    }
}

impl StdError for DatabaseError {}

/// Central application error type
#[derive(Debug)]
pub enum AppError {
    Validation(ValidationError),
    Auth(AuthError),
    Database(DatabaseError),
    /// Revocation cache / rate limiter backend failure
    Cache(String),
    /// Outbound email relay failure
    Email(String),
    /// HTML-to-PDF render service failure
    Render(String),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::Auth(e) => write!(f, "{}", e),
            AppError::Database(e) => write!(f, "{}", e),
            AppError::Cache(msg) => write!(f, "Cache error: {}", msg),
            AppError::Email(msg) => write!(f, "Email error: {}", msg),
            AppError::Render(msg) => write!(f, "Render error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl StdError for AppError {}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        AppError::Database(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => {
                AppError::Database(DatabaseError::NotFound("Record not found".to_string()))
            }
            sqlx::Error::Database(db_err) => {
                // 23505 = unique_violation
                if db_err.code().as_deref() == Some("23505") {
                    AppError::Database(DatabaseError::Duplicate(
                        "Record already exists".to_string(),
                    ))
                } else {
                    AppError::Database(DatabaseError::Query(db_err.to_string()))
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                AppError::Database(DatabaseError::Pool(err.to_string()))
            }
            _ => AppError::Database(DatabaseError::Query(err.to_string())),
        }
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::Cache(err.to_string())
    }
}

/// JSON error body: `{"success": false, "message": ..., "code": ...}`
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    pub code: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            code: code.into(),
        }
    }
}

impl AppError {
    /// Status, machine code, and client-safe message for this error.
    fn http_parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Validation(e) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string()),

            AppError::Auth(e) => match e {
                AuthError::EmailNotVerified => (StatusCode::FORBIDDEN, "EMAIL_NOT_VERIFIED", e.to_string()),
                AuthError::MissingToken => (StatusCode::UNAUTHORIZED, "MISSING_TOKEN", e.to_string()),
                AuthError::InvalidCredentials => {
                    (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS", e.to_string())
                }
                AuthError::MalformedToken => (StatusCode::UNAUTHORIZED, "TOKEN_MALFORMED", e.to_string()),
                AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "TOKEN_INVALID", e.to_string()),
            },

            AppError::Database(e) => match e {
                // Duplicate registration is surfaced as a 400, matching the
                // endpoint contract rather than a generic 409.
                DatabaseError::Duplicate(msg) => (StatusCode::BAD_REQUEST, "DUPLICATE", msg.clone()),
                DatabaseError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "Database error occurred".to_string(),
                ),
            },

            AppError::Cache(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CACHE_ERROR",
                "Server error, try again later!".to_string(),
            ),
            AppError::Email(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "EMAIL_ERROR",
                "Error occurred while sending email".to_string(),
            ),
            AppError::Render(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "RENDER_ERROR",
                "Failed to generate invoice document".to_string(),
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error".to_string(),
            ),
        }
    }

    fn log(&self) {
        match self {
            AppError::Validation(e) => tracing::warn!(error = %e, "Validation error"),
            AppError::Auth(e) => tracing::warn!(error = %e, "Authentication error"),
            AppError::Database(DatabaseError::Duplicate(msg)) => {
                tracing::warn!(error = %msg, "Duplicate entry attempt")
            }
            AppError::Database(e) => tracing::error!(error = %e, "Database error"),
            AppError::Cache(msg) => tracing::error!(error = %msg, "Cache error"),
            AppError::Email(msg) => tracing::error!(error = %msg, "Email service error"),
            AppError::Render(msg) => tracing::error!(error = %msg, "PDF render error"),
            AppError::Internal(msg) => tracing::error!(error = %msg, "Internal error"),
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        self.log();
        let (status, code, message) = self.http_parts();
        HttpResponse::build(status).json(ErrorResponse::new(message, code))
    }

    fn status_code(&self) -> StatusCode {
        self.http_parts().0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_map_to_400() {
        let err = AppError::Validation(ValidationError::MissingField("email"));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn invalid_token_maps_to_401() {
        let err = AppError::Auth(AuthError::InvalidToken);
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn unverified_email_maps_to_403() {
        let err = AppError::Auth(AuthError::EmailNotVerified);
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn duplicate_maps_to_400() {
        let err = AppError::Database(DatabaseError::Duplicate("Email taken".to_string()));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn backend_failures_stay_generic() {
        let err = AppError::Database(DatabaseError::Query("connection reset by peer".to_string()));
        let (status, _, message) = err.http_parts();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!message.contains("connection reset"));
    }

    #[test]
    fn error_body_shape() {
        let body = ErrorResponse::new("Invalid credentials!", "INVALID_CREDENTIALS");
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Invalid credentials!");
        assert_eq!(json["code"], "INVALID_CREDENTIALS");
    }
}
