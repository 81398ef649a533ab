//! Salted PBKDF2-SHA256 password hashes.
//!
//! Stored as `pbkdf2:sha256:<iterations>$<salt>$<hex digest>` so the
//! iteration count can be raised without invalidating existing accounts.

use rand::{distributions::Alphanumeric, Rng};
use sha2::Sha256;
use subtle::ConstantTimeEq;

const METHOD_PREFIX: &str = "pbkdf2:sha256:";
const SALT_LEN: usize = 16;
const DIGEST_LEN: usize = 32;
const DECOY_SALT: &str = "naturelogdecoy00";

#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    iterations: u32,
}

impl PasswordHasher {
    pub fn new(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(1),
        }
    }

    pub fn hash(&self, password: &str) -> String {
        let salt: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(SALT_LEN)
            .map(char::from)
            .collect();
        let digest = derive(password, &salt, self.iterations);
        format!(
            "{METHOD_PREFIX}{}${salt}${}",
            self.iterations,
            hex::encode(digest)
        )
    }

    /// Check `password` against a stored hash. Malformed hashes never match.
    pub fn verify(stored: &str, password: &str) -> bool {
        let Some(rest) = stored.strip_prefix(METHOD_PREFIX) else {
            return false;
        };
        let mut parts = rest.splitn(3, '$');
        let (Some(iterations), Some(salt), Some(expected)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return false;
        };
        let Ok(iterations) = iterations.parse::<u32>() else {
            return false;
        };
        let Ok(expected) = hex::decode(expected) else {
            return false;
        };
        if iterations == 0 {
            return false;
        }

        let actual = derive(password, salt, iterations);
        actual.as_slice().ct_eq(expected.as_slice()).into()
    }

    /// Do the work of a real check for an account that does not exist, so
    /// response time does not reveal which usernames are registered.
    /// Always false.
    pub fn reject(&self, password: &str) -> bool {
        std::hint::black_box(derive(password, DECOY_SALT, self.iterations));
        false
    }
}

fn derive(password: &str, salt: &str, iterations: u32) -> [u8; DIGEST_LEN] {
    let mut out = [0u8; DIGEST_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), iterations, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_then_verify() {
        let hasher = PasswordHasher::new(1_000);
        let stored = hasher.hash("correct horse");

        assert!(stored.starts_with("pbkdf2:sha256:1000$"));
        assert!(PasswordHasher::verify(&stored, "correct horse"));
        assert!(!PasswordHasher::verify(&stored, "correct horse "));
        assert!(!PasswordHasher::verify(&stored, ""));
    }

    #[test]
    fn test_salts_differ() {
        let hasher = PasswordHasher::new(10);
        assert_ne!(hasher.hash("same"), hasher.hash("same"));
    }

    #[test]
    fn test_malformed_hashes_never_match() {
        assert!(!PasswordHasher::verify("", "x"));
        assert!(!PasswordHasher::verify("plaintext", "plaintext"));
        assert!(!PasswordHasher::verify("pbkdf2:sha256:abc$salt$00", "x"));
        assert!(!PasswordHasher::verify("pbkdf2:sha256:0$salt$00", "x"));
        assert!(!PasswordHasher::verify("pbkdf2:sha256:10$salt$zz", "x"));
    }

    #[test]
    fn test_truncated_digest_never_matches() {
        let stored = PasswordHasher::new(10).hash("pw");
        let truncated = &stored[..stored.len() - 2];
        assert!(!PasswordHasher::verify(truncated, "pw"));

        let (prefix, _) = stored.rsplit_once('$').unwrap();
        assert!(!PasswordHasher::verify(&format!("{prefix}$"), "pw"));
    }

    #[test]
    fn test_reject_never_matches() {
        let hasher = PasswordHasher::new(10);
        assert!(!hasher.reject("anything"));
        assert!(!hasher.reject(""));
    }
}
