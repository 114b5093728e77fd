//! Burn-after-read tokens
//!
//! The plaintext token rides inside the encrypted envelope; the server only
//! stores `hex(sha256(token))`. A reader proves it decrypted the paste by
//! presenting the preimage on delete.

use sha2::{Digest, Sha256};

/// Plaintext burn token (a random UUID v4 string).
pub type BurnToken = String;

pub fn generate_burn_token() -> BurnToken {
    uuid::Uuid::new_v4().to_string()
}

/// Lower-case hex SHA-256 of the token's UTF-8 bytes.
pub fn hash_burn_token(token: &str) -> String {
    crate::encoding::to_hex(&Sha256::digest(token.as_bytes()))
}

/// Check a presented token against a stored hash.
pub fn verify_burn_token(token: &str, stored_hash: &str) -> bool {
    hash_burn_token(token).eq_ignore_ascii_case(stored_hash)
}
