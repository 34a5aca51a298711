/// Email verification codes
///
/// A 6-digit numeric code stored on the user row, valid for one hour.
/// Resending overwrites the previous code; there is no separate table
/// and no state beyond "has a pending code" / "verified".

use chrono::{DateTime, Duration, Utc};
use rand::{thread_rng, Rng};

pub const VERIFICATION_CODE_TTL_SECONDS: i64 = 3600;

#[derive(Clone, Debug)]
pub struct VerificationCode {
    code: String,
    expires_at: DateTime<Utc>,
}

impl VerificationCode {
    pub fn new() -> Self {
        let code = thread_rng().gen_range(100_000..1_000_000).to_string();
        let expires_at = Utc::now() + Duration::seconds(VERIFICATION_CODE_TTL_SECONDS);

        Self { code, expires_at }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

impl Default for VerificationCode {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_is_six_digits() {
        for _ in 0..100 {
            let code = VerificationCode::new();
            assert_eq!(code.code().len(), 6);
            assert!(code.code().chars().all(|c| c.is_ascii_digit()));
            // never starts with 0, the range starts at 100000
            assert_ne!(code.code().as_bytes()[0], b'0');
        }
    }

    #[test]
    fn test_code_expires_in_one_hour() {
        let code = VerificationCode::new();
        let ttl = (code.expires_at() - Utc::now()).num_seconds();

        assert!(ttl > VERIFICATION_CODE_TTL_SECONDS - 5);
        assert!(ttl <= VERIFICATION_CODE_TTL_SECONDS);
    }
}
