//! Argon2id password hashing for staff accounts.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::errors::ServiceError;

/// Hash a plaintext password into a PHC string.
pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::HashError(e.to_string()))
}

/// Returns false for a wrong password; a malformed stored hash is an error.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, ServiceError> {
    let parsed =
        PasswordHash::new(stored_hash).map_err(|e| ServiceError::HashError(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verifies_only_original_password() {
        let hash = hash_password("festive-season-2024").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("festive-season-2024", &hash).unwrap());
        assert!(!verify_password("festive-season-2025", &hash).unwrap());
    }

    #[test]
    fn salts_differ_between_hashes() {
        let a = hash_password("same-password").unwrap();
        let b = hash_password("same-password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(verify_password("anything", "not-a-phc-string").is_err());
    }
}
