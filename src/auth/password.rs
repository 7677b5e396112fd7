/// Password Hashing and Verification
///
/// Passwords are stored only as salted bcrypt hashes.

use bcrypt::{hash, verify};

use crate::error::AppError;
use crate::validators::is_valid_password;

/// Validate bounds and hash a password with the given bcrypt cost.
pub fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    is_valid_password(password)?;

    hash(password, cost).map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against its hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    verify(password, hash)
        .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const COST: u32 = 4;

    #[test]
    fn test_hash_password() {
        let password = "valid-password";
        let hash = hash_password(password, COST).expect("Failed to hash password");

        assert_ne!(password, hash);
        assert!(hash.starts_with("$2"));
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("valid-password", COST).expect("Failed to hash password");

        assert!(verify_password("valid-password", &hash).expect("Failed to verify"));
        assert!(!verify_password("wrong-password", &hash).expect("Failed to verify"));
    }

    #[test]
    fn test_same_password_different_salts() {
        let a = hash_password("valid-password", COST).unwrap();
        let b = hash_password("valid-password", COST).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_too_short_password() {
        assert!(hash_password("Short1", COST).is_err());
    }

    #[test]
    fn test_too_long_password() {
        let long_password = "a".repeat(129);
        assert!(hash_password(&long_password, COST).is_err());
    }
}
