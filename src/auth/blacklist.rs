/// Access token revocation cache
///
/// Redis keys of the form `blacklist:{jti}` mark sessions that were
/// explicitly logged out before their access token expired. Entries
/// carry a TTL equal to the token's remaining lifetime, so the cache
/// cleans itself and never needs explicit deletion.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::error::AppError;

fn blacklist_key(jti: &str) -> String {
    format!("blacklist:{}", jti)
}

/// Mark a session identifier as revoked for `ttl_seconds`.
pub async fn blacklist_session(
    conn: &ConnectionManager,
    jti: &str,
    ttl_seconds: i64,
) -> Result<(), AppError> {
    let mut conn = conn.clone();

    conn.set_ex::<_, _, ()>(blacklist_key(jti), "true", ttl_seconds as u64)
        .await?;

    tracing::info!(jti = %jti, ttl = ttl_seconds, "Access token blacklisted");
    Ok(())
}

/// Check whether a session identifier has been revoked.
pub async fn is_blacklisted(conn: &ConnectionManager, jti: &str) -> Result<bool, AppError> {
    let mut conn = conn.clone();

    let marker: Option<String> = conn.get(blacklist_key(jti)).await?;
    Ok(marker.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blacklist_key_format() {
        assert_eq!(
            blacklist_key("4a6cb823-9fc1-4a7a-a55c-6b8e0a4f61f2"),
            "blacklist:4a6cb823-9fc1-4a7a-a55c-6b8e0a4f61f2"
        );
    }
}
