//! Salted slow hashing for passwords and election passcodes.

use std::sync::OnceLock;

use argon2::Config;
use rand::Rng;

/// Minimum length of a user password.
pub const MIN_PASSWORD_LENGTH: usize = 8;


/// Hash a plaintext secret with a fresh random salt.
pub fn hash_secret(plaintext: &str) -> Result<String, argon2::Error> {
    // 16 bytes is recommended for password hashing:
    //  https://en.wikipedia.org/wiki/Argon2
    let mut salt = [0_u8; 16];
    rand::thread_rng().fill(&mut salt);
    argon2::hash_encoded(plaintext.as_bytes(), &salt, &Config::default())
}

/// Check a plaintext secret against an encoded hash.
/// A malformed hash never verifies.
pub fn verify_secret(encoded: &str, plaintext: &str) -> bool {
    argon2::verify_encoded(encoded, plaintext.as_bytes()).unwrap_or(false)
}

/// A hash no user owns, made with the same parameters as every real one.
/// Verifying against it when a user doesn't exist keeps both login failure
/// paths equally expensive.
fn dummy_hash() -> &'static str {
    static DUMMY_HASH: OnceLock<String> = OnceLock::new();
    DUMMY_HASH.get_or_init(|| hash_secret("no user has this password").unwrap_or_default())
}

/// Burn the same work as a real verification, always failing.
pub fn verify_dummy(plaintext: &str) -> bool {
    let _ = verify_secret(dummy_hash(), plaintext);
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = hash_secret("correct horse").unwrap();
        assert_ne!(hash, "correct horse");
        assert!(verify_secret(&hash, "correct horse"));
        assert!(!verify_secret(&hash, "battery staple"));
    }

    #[test]
    fn salts_differ() {
        assert_ne!(hash_secret("same").unwrap(), hash_secret("same").unwrap());
    }

    #[test]
    fn malformed_hash_fails_closed() {
        assert!(!verify_secret("plaintext-in-db", "plaintext-in-db"));
        assert!(!verify_dummy("anything"));
        assert!(!verify_dummy("no user has this password"));
    }

    /// Everything before the salt: variant, version and cost parameters.
    fn parameters(encoded: &str) -> Vec<&str> {
        encoded.split('$').take(4).collect()
    }

    #[test]
    fn dummy_hash_costs_the_same() {
        let real = hash_secret("correct horse").unwrap();
        assert_eq!(parameters(dummy_hash()), parameters(&real));
        assert_eq!(parameters(&real).len(), 4);
    }
}
