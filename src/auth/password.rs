/// Password hashing and verification with bcrypt.

use bcrypt::{hash, verify, DEFAULT_COST};

use crate::error::AppError;

/// Hash a password using bcrypt
///
/// # Errors
/// Returns error if bcrypt hashing fails
pub fn hash_password(password: &str) -> Result<String, AppError> {
    hash(password, DEFAULT_COST)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against its bcrypt hash
///
/// # Errors
/// Returns error if the stored hash is not a valid bcrypt string
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    verify(password, hash)
        .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password() {
        let password = "s3cret-password";
        let hash = hash_password(password).expect("Failed to hash password");

        assert_ne!(password, hash);
        assert!(hash.starts_with("$2"));
    }

    #[test]
    fn test_verify_password() {
        let password = "s3cret-password";
        let hash = hash_password(password).expect("Failed to hash password");

        assert!(verify_password(password, &hash).expect("Failed to verify password"));
    }

    #[test]
    fn test_verify_wrong_password() {
        let hash = hash_password("s3cret-password").expect("Failed to hash password");

        assert!(!verify_password("wrong-password", &hash).expect("Failed to verify password"));
    }

    #[test]
    fn test_verify_against_garbage_hash_errors() {
        assert!(verify_password("anything", "not-a-bcrypt-hash").is_err());
    }
}
