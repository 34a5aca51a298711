/// JWT Claims structure
///
/// Payload shared by access and refresh tokens. The two members of a
/// pair carry the same `jti`, which is how a logout can revoke the whole
/// session.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AuthError};

pub const TOKEN_TYPE_ACCESS: &str = "access";
pub const TOKEN_TYPE_REFRESH: &str = "refresh";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    /// Session identifier, shared by both tokens of a pair
    pub jti: String,
    /// "access" or "refresh"
    #[serde(rename = "type")]
    pub token_type: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    pub fn new(user_id: Uuid, jti: &str, token_type: &str, expiry_seconds: i64) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: user_id.to_string(),
            jti: jti.to_string(),
            token_type: token_type.to_string(),
            iat: now,
            exp: now + expiry_seconds,
        }
    }

    /// Extract the user ID from the subject claim
    ///
    /// # Errors
    /// Returns `MalformedToken` if the subject is not a valid UUID
    pub fn user_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.sub).map_err(|_| AppError::Auth(AuthError::MalformedToken))
    }

    /// Seconds until this token's natural expiry; negative once expired.
    pub fn remaining_seconds(&self) -> i64 {
        self.exp - chrono::Utc::now().timestamp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_creation() {
        let user_id = Uuid::new_v4();
        let jti = Uuid::new_v4().to_string();
        let claims = Claims::new(user_id, &jti, TOKEN_TYPE_ACCESS, 900);

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.jti, jti);
        assert_eq!(claims.token_type, "access");
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn test_user_id_extraction() {
        let user_id = Uuid::new_v4();
        let claims = Claims::new(user_id, "jti", TOKEN_TYPE_REFRESH, 60);

        assert_eq!(claims.user_id().unwrap(), user_id);
    }

    #[test]
    fn test_invalid_user_id() {
        let mut claims = Claims::new(Uuid::new_v4(), "jti", TOKEN_TYPE_ACCESS, 60);
        claims.sub = "not-a-uuid".to_string();

        assert!(claims.user_id().is_err());
    }

    #[test]
    fn test_remaining_seconds() {
        let claims = Claims::new(Uuid::new_v4(), "jti", TOKEN_TYPE_ACCESS, 900);
        assert!(claims.remaining_seconds() > 890);
        assert!(claims.remaining_seconds() <= 900);

        let mut expired = Claims::new(Uuid::new_v4(), "jti", TOKEN_TYPE_ACCESS, 900);
        expired.exp = chrono::Utc::now().timestamp() - 10;
        assert!(expired.remaining_seconds() < 0);
    }

    #[test]
    fn test_type_field_serializes_as_type() {
        let claims = Claims::new(Uuid::new_v4(), "jti", TOKEN_TYPE_ACCESS, 60);
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["type"], "access");
    }
}
