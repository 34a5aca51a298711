/// JWT signing and verification
///
/// Access tokens are signed with the access secret, refresh tokens with
/// the refresh secret. Verification also checks the embedded `type`
/// claim so a refresh token can never pass as an access token even if
/// both secrets were configured identically.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::claims::{Claims, TOKEN_TYPE_ACCESS, TOKEN_TYPE_REFRESH};
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};

fn sign(claims: &Claims, secret: &str) -> Result<String, AppError> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
}

fn verify(token: &str, secret: &str, expected_type: &str) -> Result<Claims, AppError> {
    let validation = Validation::new(Algorithm::HS256);

    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::warn!("JWT validation error: {}", e);
        AppError::Auth(AuthError::InvalidToken)
    })?;

    if claims.token_type != expected_type {
        tracing::warn!(token_type = %claims.token_type, "Token type mismatch");
        return Err(AppError::Auth(AuthError::InvalidToken));
    }

    Ok(claims)
}

pub fn sign_access_token(user_id: Uuid, jti: &str, config: &JwtSettings) -> Result<String, AppError> {
    let claims = Claims::new(user_id, jti, TOKEN_TYPE_ACCESS, config.access_token_expiry);
    sign(&claims, &config.access_secret)
}

pub fn sign_refresh_token(user_id: Uuid, jti: &str, config: &JwtSettings) -> Result<String, AppError> {
    let claims = Claims::new(user_id, jti, TOKEN_TYPE_REFRESH, config.refresh_token_expiry);
    sign(&claims, &config.refresh_secret)
}

/// Validate an access token's signature and expiry.
pub fn verify_access_token(token: &str, config: &JwtSettings) -> Result<Claims, AppError> {
    verify(token, &config.access_secret, TOKEN_TYPE_ACCESS)
}

/// Validate a refresh token's signature and expiry.
pub fn verify_refresh_token(token: &str, config: &JwtSettings) -> Result<Claims, AppError> {
    verify(token, &config.refresh_secret, TOKEN_TYPE_REFRESH)
}

/// Decode an access token while ignoring its expiry.
///
/// Logout must work for an already-expired token so clients can always
/// clean up. Signature and structure are still checked; an unparseable
/// token fails with `MalformedToken`.
pub fn decode_access_token_allow_expired(
    token: &str,
    config: &JwtSettings,
) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.access_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::warn!("JWT decode error on logout: {}", e);
        AppError::Auth(AuthError::MalformedToken)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_test_config() -> JwtSettings {
        JwtSettings {
            access_secret: "access-secret-key-at-least-32-chars-long".to_string(),
            refresh_secret: "refresh-secret-key-at-least-32-chars-xx".to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 604800,
        }
    }

    #[test]
    fn test_sign_and_verify_access_token() {
        let config = get_test_config();
        let user_id = Uuid::new_v4();
        let jti = Uuid::new_v4().to_string();

        let token = sign_access_token(user_id, &jti, &config).expect("Failed to sign token");
        let claims = verify_access_token(&token, &config).expect("Failed to verify token");

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.jti, jti);
        assert_eq!(claims.token_type, "access");
    }

    #[test]
    fn test_sign_and_verify_refresh_token() {
        let config = get_test_config();
        let user_id = Uuid::new_v4();

        let token = sign_refresh_token(user_id, "session-1", &config).expect("Failed to sign token");
        let claims = verify_refresh_token(&token, &config).expect("Failed to verify token");

        assert_eq!(claims.token_type, "refresh");
        assert_eq!(claims.jti, "session-1");
    }

    #[test]
    fn test_refresh_token_rejected_as_access_token() {
        let config = get_test_config();
        let token = sign_refresh_token(Uuid::new_v4(), "jti", &config).unwrap();

        assert!(verify_access_token(&token, &config).is_err());
    }

    #[test]
    fn test_access_token_rejected_as_refresh_token() {
        let config = get_test_config();
        let token = sign_access_token(Uuid::new_v4(), "jti", &config).unwrap();

        assert!(verify_refresh_token(&token, &config).is_err());
    }

    #[test]
    fn test_invalid_token() {
        let config = get_test_config();
        assert!(verify_access_token("invalid.token.here", &config).is_err());
    }

    #[test]
    fn test_tampered_token() {
        let config = get_test_config();
        let token = sign_access_token(Uuid::new_v4(), "jti", &config).unwrap();

        let tampered = format!("{}X", token);
        assert!(verify_access_token(&tampered, &config).is_err());
    }

    #[test]
    fn test_wrong_secret() {
        let config = get_test_config();
        let token = sign_access_token(Uuid::new_v4(), "jti", &config).unwrap();

        let mut other = get_test_config();
        other.access_secret = "a-completely-different-signing-secret-00".to_string();
        assert!(verify_access_token(&token, &other).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let mut config = get_test_config();
        config.access_token_expiry = -120;
        let token = sign_access_token(Uuid::new_v4(), "jti", &config).unwrap();

        assert!(verify_access_token(&token, &config).is_err());
    }

    #[test]
    fn test_expired_token_still_decodes_for_logout() {
        let mut config = get_test_config();
        config.access_token_expiry = -120;
        let user_id = Uuid::new_v4();
        let token = sign_access_token(user_id, "jti-logout", &config).unwrap();

        let claims = decode_access_token_allow_expired(&token, &config)
            .expect("Expired token should still decode on logout");
        assert_eq!(claims.jti, "jti-logout");
        assert!(claims.remaining_seconds() < 0);
    }

    #[test]
    fn test_garbage_token_is_malformed_on_logout() {
        let config = get_test_config();
        let result = decode_access_token_allow_expired("not-a-jwt", &config);

        match result {
            Err(AppError::Auth(AuthError::MalformedToken)) => (),
            other => panic!("Expected MalformedToken, got {:?}", other.map(|c| c.jti)),
        }
    }
}
