//! Password generation and hashing.
//!
//! Generated passwords are shown once in the approval email; accounts only
//! ever store the Argon2id hash.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;

/// Error type for password operations.
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashError(String),

    #[error("Failed to verify password: {0}")]
    VerifyError(String),

    #[error("Invalid password hash format")]
    InvalidHashFormat,
}

/// Shortest password the generator will produce.
pub const MIN_GENERATED_PASSWORD_LEN: usize = 8;

const UPPER: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";
const LOWER: &[u8] = b"abcdefghijkmnpqrstuvwxyz";
const DIGITS: &[u8] = b"23456789";

/// Argon2id parameters following OWASP recommendations (2024).
/// - Memory: 19456 KiB (19 MiB)
/// - Iterations: 2
/// - Parallelism: 1
const MEMORY_COST: u32 = 19456; // 19 MiB in KiB
const TIME_COST: u32 = 2;
const PARALLELISM: u32 = 1;
const OUTPUT_LEN: usize = 32; // 256-bit hash output

/// Creates an Argon2id hasher with OWASP-recommended parameters.
fn create_argon2() -> Result<Argon2<'static>, PasswordError> {
    let params = Params::new(MEMORY_COST, TIME_COST, PARALLELISM, Some(OUTPUT_LEN))
        .map_err(|e| PasswordError::HashError(format!("Failed to create Argon2 params: {}", e)))?;

    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hashes a password using Argon2id with OWASP-recommended parameters.
///
/// Returns a PHC-formatted string that includes the algorithm, parameters,
/// salt, and hash. This format is self-describing and allows for future
/// algorithm upgrades.
///
/// # Arguments
/// * `password` - The plaintext password to hash
///
/// # Returns
/// * `Ok(String)` - PHC-formatted hash string
/// * `Err(PasswordError)` - If hashing fails
///
/// # Example
/// ```
/// use shared::password::hash_password;
///
/// let hash = hash_password("Kq7mWz2pRt").unwrap();
/// assert!(hash.starts_with("$argon2id$"));
/// ```
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = create_argon2()?;

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::HashError(e.to_string()))
}

/// Verifies a password against a stored hash.
///
/// This function is constant-time to prevent timing attacks.
///
/// # Arguments
/// * `password` - The plaintext password to verify
/// * `hash` - The PHC-formatted hash to verify against
///
/// # Returns
/// * `Ok(true)` - Password matches
/// * `Ok(false)` - Password does not match
/// * `Err(PasswordError)` - If verification fails (e.g., invalid hash format)
///
/// # Example
/// ```
/// use shared::password::{hash_password, verify_password};
///
/// let hash = hash_password("Kq7mWz2pRt").unwrap();
/// assert!(verify_password("Kq7mWz2pRt", &hash).unwrap());
/// assert!(!verify_password("wrong_password", &hash).unwrap());
/// ```
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHashFormat)?;

    // Create a new Argon2 instance for verification
    // Note: The stored hash contains its own parameters, so we use default for verification
    let argon2 = Argon2::default();

    match argon2.verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(e.to_string())),
    }
}

/// Generates a random password of `length` characters (at least
/// [`MIN_GENERATED_PASSWORD_LEN`]).
///
/// The result always contains an upper-case letter, a lower-case letter and a
/// digit. The characters are shuffled afterwards so the position of each
/// class is not predictable.
pub fn generate_password(length: usize) -> String {
    let length = length.max(MIN_GENERATED_PASSWORD_LEN);
    let mut rng = rand::thread_rng();
    let mut pick = |set: &[u8]| set[rng.gen_range(0..set.len())];

    let mut chars = vec![pick(UPPER), pick(LOWER), pick(DIGITS)];
    let all: Vec<u8> = [UPPER, LOWER, DIGITS].concat();
    while chars.len() < length {
        chars.push(pick(&all));
    }
    chars.shuffle(&mut rand::thread_rng());

    chars.into_iter().map(char::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_password_length() {
        assert_eq!(generate_password(12).len(), 12);
        assert_eq!(generate_password(3).len(), MIN_GENERATED_PASSWORD_LEN);
    }

    #[test]
    fn test_generate_password_character_classes() {
        for _ in 0..200 {
            let password = generate_password(MIN_GENERATED_PASSWORD_LEN);
            assert!(password.chars().any(|c| c.is_ascii_uppercase()), "{}", password);
            assert!(password.chars().any(|c| c.is_ascii_lowercase()), "{}", password);
            assert!(password.chars().any(|c| c.is_ascii_digit()), "{}", password);
        }
    }

    #[test]
    fn test_generate_password_class_positions_vary() {
        // The upper-case letter must not always land in the first slot.
        let first_is_upper = (0..200)
            .filter(|_| {
                generate_password(10)
                    .chars()
                    .next()
                    .is_some_and(|c| c.is_ascii_uppercase())
            })
            .count();
        assert!(first_is_upper < 200);
    }

    #[test]
    fn test_hash_password_returns_phc_format() {
        let hash = hash_password("Kq7mWz2pRt").unwrap();
        assert!(hash.starts_with("$argon2id$v=19$m=19456,t=2,p=1$"));
    }

    #[test]
    fn test_generated_password_verifies_against_hash() {
        let password = generate_password(12);
        let hash = hash_password(&password).unwrap();
        assert!(verify_password(&password, &hash).unwrap());
        assert!(!verify_password("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_verify_password_invalid_hash() {
        let result = verify_password("password", "invalid_hash_format");
        assert!(matches!(result, Err(PasswordError::InvalidHashFormat)));
    }
}
