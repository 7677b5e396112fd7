/// Opaque Token Generation and Hashing
///
/// Refresh, password-reset and email-verify tokens are:
/// - 48 bytes from the OS RNG, hex encoded for transport
/// - hashed with SHA-256 before storage (never store plaintext)
/// - compared by hash, never by raw value

use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use sha2::{Digest, Sha256};

const TOKEN_BYTES: usize = 48;

/// A freshly minted token: the raw value goes to the client, the hash to
/// the store.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub raw: String,
    pub hash: String,
    pub expires_at: DateTime<Utc>,
}

/// Generate a new high-entropy opaque token with the given lifetime.
pub fn issue_token(lifetime_seconds: i64) -> IssuedToken {
    let raw = generate_opaque_token();
    let hash = hash_token(&raw);
    IssuedToken {
        raw,
        hash,
        expires_at: Utc::now() + Duration::seconds(lifetime_seconds),
    }
}

/// Generate the raw token value.
pub fn generate_opaque_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    to_hex(&bytes)
}

/// Deterministic SHA-256 digest of a raw token, hex encoded.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Human-typable temporary password of `length` lowercase hex characters.
pub fn generate_temp_password(length: usize) -> String {
    const HEX: &[u8] = b"0123456789abcdef";
    let mut rng = OsRng;
    (0..length)
        .map(|_| HEX[rng.gen_range(0..HEX.len())] as char)
        .collect()
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opaque_token_length_and_charset() {
        let token = generate_opaque_token();

        assert_eq!(token.len(), TOKEN_BYTES * 2);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_token_hashing() {
        let token = generate_opaque_token();
        let hash1 = hash_token(&token);
        let hash2 = hash_token(&token);

        assert_eq!(hash1, hash2);
        assert_ne!(token, hash1);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_tokens_different_hashes() {
        let a = issue_token(60);
        let b = issue_token(60);

        assert_ne!(a.raw, b.raw);
        assert_ne!(a.hash, b.hash);
        assert_eq!(a.hash, hash_token(&a.raw));
        assert!(a.expires_at > Utc::now());
    }

    #[test]
    fn test_temp_password() {
        let password = generate_temp_password(12);
        assert_eq!(password.len(), 12);
        assert!(password.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));
    }
}
