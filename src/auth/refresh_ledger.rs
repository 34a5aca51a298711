/// Refresh token ledger
///
/// Persisted record of every refresh token ever issued. Tokens are
/// looked up by their exact signed string and are single-use: rotation
/// consumes a row with an atomic conditional update, so a replayed
/// token loses the race and is rejected.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;

/// A row from the refresh_tokens table.
#[derive(Debug)]
pub struct LedgerRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub jti: String,
    pub revoked: bool,
    pub expires_at: DateTime<Utc>,
}

impl LedgerRow {
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

/// Insert a new ledger row for a freshly signed refresh token.
///
/// Called by the token issuer; failure here must abort issuance so no
/// session can exist without a revocable record.
pub async fn insert(
    pool: &PgPool,
    user_id: Uuid,
    token: &str,
    jti: &str,
    expiry_seconds: i64,
) -> Result<(), AppError> {
    let expires_at = Utc::now() + Duration::seconds(expiry_seconds);

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (id, user_id, token, jti, revoked, expires_at, created_at)
        VALUES ($1, $2, $3, $4, false, $5, $6)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(token)
    .bind(jti)
    .bind(expires_at)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Look up a ledger row by exact token string.
pub async fn find_by_token(pool: &PgPool, token: &str) -> Result<Option<LedgerRow>, AppError> {
    let row = sqlx::query_as::<_, (Uuid, Uuid, String, bool, DateTime<Utc>)>(
        r#"
        SELECT id, user_id, jti, revoked, expires_at
        FROM refresh_tokens
        WHERE token = $1
        "#,
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(id, user_id, jti, revoked, expires_at)| LedgerRow {
        id,
        user_id,
        jti,
        revoked,
        expires_at,
    }))
}

/// Atomically consume a token for rotation.
///
/// The conditional update only succeeds for a not-yet-revoked row, so of
/// two concurrent rotations presenting the same token exactly one sees
/// `true` here. The loser must be rejected as a replay.
pub async fn consume(pool: &PgPool, token: &str) -> Result<bool, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET revoked = true
        WHERE token = $1 AND revoked = false
        "#,
    )
    .bind(token)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Revoke every row matching a token string (logout path).
///
/// Normally exactly one row matches; zero matches is fine, logout stays
/// idempotent either way.
pub async fn revoke_by_token(pool: &PgPool, token: &str) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET revoked = true
        WHERE token = $1
        "#,
    )
    .bind(token)
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_row_expiry() {
        let mut row = LedgerRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            jti: "jti".to_string(),
            revoked: false,
            expires_at: Utc::now() + Duration::days(7),
        };
        assert!(!row.is_expired());

        row.expires_at = Utc::now() - Duration::seconds(1);
        assert!(row.is_expired());
    }
}
