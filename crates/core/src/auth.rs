//! Password verifier hashing, using Argon2 in place of a plaintext column.
//!
//! `Argon2::default()` for both sides, a PHC string as the durable
//! representation, [`PasswordVerifier::verify_password`] for the comparison.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng};
use argon2::Argon2;

use crate::error::{Result, TrackerError};

/// Hash `password` into a PHC string suitable for the `user_password` column.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| TrackerError::Hash(e.to_string()))
}

/// Verify `password` against a previously stored PHC string.
///
/// Returns `Ok(true)` on match, `Ok(false)` on mismatch, `Err` only if
/// `stored` is not a well-formed PHC string (a storage-layer corruption, not
/// a login failure).
pub fn verify_password(password: &str, stored: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored).map_err(|e| TrackerError::Hash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_round_trips() {
        let hash = hash_password("pw123456").unwrap();
        assert!(verify_password("pw123456", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn distinct_hashes_for_same_password() {
        let a = hash_password("pw123456").unwrap();
        let b = hash_password("pw123456").unwrap();
        assert_ne!(a, b, "random salt should make hashes differ");
    }

    #[test]
    fn malformed_stored_hash_errors() {
        assert!(verify_password("pw123456", "not-a-phc-string").is_err());
    }
}
