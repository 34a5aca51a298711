/// Token issuer
///
/// Mints a signed access/refresh pair sharing one fresh session
/// identifier and records the refresh token in the ledger. The pair is
/// only returned once the ledger row exists; a session that cannot be
/// revoked must never be handed out.

use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::jwt::{sign_access_token, sign_refresh_token};
use crate::auth::refresh_ledger;
use crate::configuration::JwtSettings;
use crate::error::AppError;

#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

pub async fn issue_token_pair(
    pool: &PgPool,
    user_id: Uuid,
    config: &JwtSettings,
) -> Result<TokenPair, AppError> {
    let jti = Uuid::new_v4().to_string();

    let access_token = sign_access_token(user_id, &jti, config)?;
    let refresh_token = sign_refresh_token(user_id, &jti, config)?;

    refresh_ledger::insert(
        pool,
        user_id,
        &refresh_token,
        &jti,
        config.refresh_token_expiry,
    )
    .await?;

    tracing::debug!(user_id = %user_id, jti = %jti, "Issued token pair");

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}
