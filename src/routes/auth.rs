/// Authentication routes
///
/// Register, login, refresh-token rotation, logout, and the email
/// verification flow. All error paths go through `AppError`; bodies are
/// always `{"success": ..., "message": ...}` shaped.

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{
    blacklist_session, decode_access_token_allow_expired, hash_password, issue_token_pair,
    refresh_ledger, verify_password, verify_refresh_token, VerificationCode,
};
use crate::configuration::JwtSettings;
use crate::email_client::EmailClient;
use crate::error::{AppError, AuthError, ValidationError};
use crate::validators::{is_valid_email, is_valid_name};

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub password: String,
    pub company_name: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub token: String,
}

#[derive(Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

#[derive(Deserialize)]
pub struct VerifyEmailRequest {
    pub code: String,
}

#[derive(Deserialize)]
pub struct ResendVerificationRequest {
    pub email: String,
}

/// User fields that are safe to return to the client.
#[derive(Serialize)]
pub struct SafeUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub company_name: String,
    pub is_email_verified: bool,
    pub created_at: String,
}

impl SafeUser {
    fn new(
        id: Uuid,
        email: String,
        name: String,
        company_name: String,
        is_email_verified: bool,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.to_string(),
            email,
            name,
            company_name,
            is_email_verified,
            created_at: created_at.to_rfc3339(),
        }
    }
}

/// POST /api/auth/register
///
/// Creates an unverified account and emails a 6-digit verification
/// code. A duplicate email gets a differentiated message depending on
/// whether the existing account is verified; this disclosure is a
/// deliberate product decision, not an oversight.
pub async fn register(
    form: web::Json<RegisterRequest>,
    pool: web::Data<PgPool>,
    email_client: web::Data<EmailClient>,
) -> Result<HttpResponse, AppError> {
    let email = is_valid_email(&form.email)?;
    let name = is_valid_name("name", &form.name)?;
    let company_name = is_valid_name("company_name", &form.company_name)?;
    if form.password.is_empty() {
        return Err(ValidationError::MissingField("password").into());
    }

    let existing = sqlx::query_as::<_, (Uuid, bool)>(
        "SELECT id, is_email_verified FROM users WHERE email = $1",
    )
    .bind(&email)
    .fetch_optional(pool.get_ref())
    .await?;

    if let Some((_, is_email_verified)) = existing {
        let message = if is_email_verified {
            "User already exists, try logging in!"
        } else {
            "Check your email to verify your account first."
        };
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "success": false,
            "message": message
        })));
    }

    let password_hash = hash_password(&form.password)?;
    let verification = VerificationCode::new();
    let user_id = Uuid::new_v4();
    let created_at = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO users
            (id, email, name, company_name, password_hash, is_email_verified,
             verification_token, verification_token_expires_at, created_at)
        VALUES ($1, $2, $3, $4, $5, false, $6, $7, $8)
        "#,
    )
    .bind(user_id)
    .bind(&email)
    .bind(&name)
    .bind(&company_name)
    .bind(&password_hash)
    .bind(verification.code())
    .bind(verification.expires_at())
    .bind(created_at)
    .execute(pool.get_ref())
    .await?;

    email_client
        .send_verification_email(&email, verification.code(), &name)
        .await?;

    tracing::info!(user_id = %user_id, "User registered");

    let user = SafeUser::new(user_id, email, name, company_name, false, created_at);
    Ok(HttpResponse::Created().json(serde_json::json!({
        "success": true,
        "message": "User created successfully, kindly login!",
        "user": user
    })))
}

/// POST /api/auth/login
///
/// Unknown email and wrong password produce the same 401; a correct
/// password on an unverified account produces a 403.
pub async fn login(
    form: web::Json<LoginRequest>,
    pool: web::Data<PgPool>,
    jwt_config: web::Data<JwtSettings>,
) -> Result<HttpResponse, AppError> {
    let email = is_valid_email(&form.email)?;
    if form.password.is_empty() {
        return Err(ValidationError::MissingField("password").into());
    }

    let user = sqlx::query_as::<_, (Uuid, String, String, String, String, bool, DateTime<Utc>)>(
        r#"
        SELECT id, email, name, company_name, password_hash, is_email_verified, created_at
        FROM users
        WHERE email = $1
        "#,
    )
    .bind(&email)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or(AppError::Auth(AuthError::InvalidCredentials))?;

    let (user_id, user_email, name, company_name, password_hash, is_email_verified, created_at) =
        user;

    if !verify_password(&form.password, &password_hash)? {
        return Err(AppError::Auth(AuthError::InvalidCredentials));
    }

    if !is_email_verified {
        return Err(AppError::Auth(AuthError::EmailNotVerified));
    }

    let pair = issue_token_pair(pool.get_ref(), user_id, jwt_config.get_ref()).await?;

    tracing::info!(user_id = %user_id, "User logged in");

    let user = SafeUser::new(user_id, user_email, name, company_name, true, created_at);
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "token": pair.access_token,
        "refresh_token": pair.refresh_token,
        "user": user
    })))
}

/// POST /api/auth/refresh-token
///
/// Single-use rotation. The presented token is consumed with an atomic
/// conditional update before the new pair is minted, so a concurrent
/// replay of the same token can never yield two live sessions.
pub async fn refresh_token(
    form: web::Json<RefreshRequest>,
    pool: web::Data<PgPool>,
    jwt_config: web::Data<JwtSettings>,
) -> Result<HttpResponse, AppError> {
    if form.token.is_empty() {
        return Err(AppError::Auth(AuthError::MissingToken));
    }

    let claims = verify_refresh_token(&form.token, jwt_config.get_ref())?;

    let row = refresh_ledger::find_by_token(pool.get_ref(), &form.token)
        .await?
        .ok_or(AppError::Auth(AuthError::InvalidToken))?;

    // jti mismatch means the signed claim and the stored row disagree;
    // treat it the same as any other unusable token.
    if row.revoked || row.is_expired() || row.jti != claims.jti {
        tracing::warn!(user_id = %row.user_id, jti = %row.jti, "Unusable refresh token presented");
        return Err(AppError::Auth(AuthError::InvalidToken));
    }

    if !refresh_ledger::consume(pool.get_ref(), &form.token).await? {
        // A concurrent rotation with the same token won the race.
        tracing::warn!(user_id = %row.user_id, jti = %row.jti, "Refresh token replay detected");
        return Err(AppError::Auth(AuthError::InvalidToken));
    }

    let pair = issue_token_pair(pool.get_ref(), row.user_id, jwt_config.get_ref()).await?;

    tracing::info!(user_id = %row.user_id, "Refresh token rotated");

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "token": pair.access_token,
        "refresh_token": pair.refresh_token
    })))
}

/// POST /api/auth/logout
///
/// Blacklists the access token's session for its remaining lifetime and
/// revokes the supplied refresh token, if any. Works for expired access
/// tokens and is idempotent, so clients can always clean up.
pub async fn logout(
    req: HttpRequest,
    form: Option<web::Json<LogoutRequest>>,
    pool: web::Data<PgPool>,
    jwt_config: web::Data<JwtSettings>,
    redis: web::Data<ConnectionManager>,
) -> Result<HttpResponse, AppError> {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(AppError::Auth(AuthError::MissingToken))?;

    let claims = decode_access_token_allow_expired(token, jwt_config.get_ref())?;
    if claims.jti.is_empty() {
        return Err(AppError::Auth(AuthError::MalformedToken));
    }

    let remaining = claims.remaining_seconds();
    if remaining > 0 {
        blacklist_session(redis.get_ref(), &claims.jti, remaining).await?;
    }

    if let Some(form) = form {
        if let Some(refresh_token) = &form.refresh_token {
            refresh_ledger::revoke_by_token(pool.get_ref(), refresh_token).await?;
        }
    }

    tracing::info!(jti = %claims.jti, "User logged out");

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "User logged out successfully!"
    })))
}

/// POST /api/auth/verify-email
///
/// Consumes a pending verification code: exact match, not expired. The
/// code fields are cleared on success, so replaying the code fails.
pub async fn verify_email(
    form: web::Json<VerifyEmailRequest>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    if form.code.is_empty() {
        return Err(ValidationError::MissingField("code").into());
    }

    let user = sqlx::query_as::<_, (Uuid, String, String, String, DateTime<Utc>)>(
        r#"
        SELECT id, email, name, company_name, created_at
        FROM users
        WHERE verification_token = $1 AND verification_token_expires_at > $2
        "#,
    )
    .bind(&form.code)
    .bind(Utc::now())
    .fetch_optional(pool.get_ref())
    .await?;

    let (user_id, email, name, company_name, created_at) = match user {
        Some(user) => user,
        None => {
            return Ok(HttpResponse::BadRequest().json(serde_json::json!({
                "success": false,
                "message": "Invalid or expired code!"
            })))
        }
    };

    sqlx::query(
        r#"
        UPDATE users
        SET is_email_verified = true,
            verification_token = NULL,
            verification_token_expires_at = NULL
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .execute(pool.get_ref())
    .await?;

    tracing::info!(user_id = %user_id, "Email verified");

    let user = SafeUser::new(user_id, email, name, company_name, true, created_at);
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Verification successful!",
        "user": user
    })))
}

/// POST /api/auth/resend-verification
///
/// Overwrites any pending code with a fresh one; the previous code
/// stops matching immediately. No cooldown beyond the rate limiter.
pub async fn resend_verification(
    form: web::Json<ResendVerificationRequest>,
    pool: web::Data<PgPool>,
    email_client: web::Data<EmailClient>,
) -> Result<HttpResponse, AppError> {
    let email = is_valid_email(&form.email)?;

    let user = sqlx::query_as::<_, (Uuid, String)>("SELECT id, name FROM users WHERE email = $1")
        .bind(&email)
        .fetch_optional(pool.get_ref())
        .await?;

    let (user_id, name) = match user {
        Some(user) => user,
        None => {
            return Ok(HttpResponse::BadRequest().json(serde_json::json!({
                "success": false,
                "message": "Wrong email, kindly confirm email"
            })))
        }
    };

    let verification = VerificationCode::new();

    // Persist first so the emailed code is always the one on record.
    sqlx::query(
        r#"
        UPDATE users
        SET verification_token = $1, verification_token_expires_at = $2
        WHERE id = $3
        "#,
    )
    .bind(verification.code())
    .bind(verification.expires_at())
    .bind(user_id)
    .execute(pool.get_ref())
    .await?;

    email_client
        .send_verification_email(&email, verification.code(), &name)
        .await?;

    tracing::info!(user_id = %user_id, "Verification email resent");

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Email verification sent, check your inbox!"
    })))
}
