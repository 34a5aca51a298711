/// Authentication module
///
/// JWT signing/verification, password hashing, the refresh token
/// ledger, the access-token revocation cache, and email verification
/// codes.

mod blacklist;
mod claims;
mod jwt;
mod password;
pub mod refresh_ledger;
mod token_pair;
mod verification;

pub use blacklist::blacklist_session;
pub use blacklist::is_blacklisted;
pub use claims::Claims;
pub use claims::{TOKEN_TYPE_ACCESS, TOKEN_TYPE_REFRESH};
pub use jwt::decode_access_token_allow_expired;
pub use jwt::sign_access_token;
pub use jwt::sign_refresh_token;
pub use jwt::verify_access_token;
pub use jwt::verify_refresh_token;
pub use password::hash_password;
pub use password::verify_password;
pub use token_pair::{issue_token_pair, TokenPair};
pub use verification::{VerificationCode, VERIFICATION_CODE_TTL_SECONDS};
