//! PBKDF2-SHA256 password hashes in the `pbkdf2_sha256$<iterations>$<salt>$<hash>` format.

use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;
use subtle::ConstantTimeEq;

const HASH_PREFIX: &str = "pbkdf2_sha256";
const DEFAULT_ITERATIONS: u32 = 200_000;
const SALT_BYTES: usize = 16;
const DERIVED_BYTES: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PasswordError {
    #[error("Password cannot be blank")]
    Blank,
    #[error("Iteration count must be positive")]
    ZeroIterations,
}

/// Hashes with the production iteration count.
///
/// # Errors
///
/// Returns [`PasswordError::Blank`] for empty or whitespace-only passwords.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    hash_password_with_iterations(password, DEFAULT_ITERATIONS)
}

/// # Errors
///
/// Returns [`PasswordError`] for blank passwords or a zero iteration count.
pub fn hash_password_with_iterations(
    password: &str,
    iterations: u32,
) -> Result<String, PasswordError> {
    let trimmed = password.trim();
    if trimmed.is_empty() {
        return Err(PasswordError::Blank);
    }
    if iterations == 0 {
        return Err(PasswordError::ZeroIterations);
    }

    let mut salt = [0u8; SALT_BYTES];
    OsRng.fill_bytes(&mut salt);
    let derived = derive(trimmed.as_bytes(), &salt, iterations);

    Ok(format!(
        "{HASH_PREFIX}${iterations}${}${}",
        STANDARD_NO_PAD.encode(salt),
        STANDARD_NO_PAD.encode(derived)
    ))
}

/// Constant-time check of `password` against a stored hash. Malformed hashes never match.
#[must_use]
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let trimmed = password.trim();
    if trimmed.is_empty() {
        return false;
    }

    let mut parts = password_hash.splitn(4, '$');
    let (Some(prefix), Some(iterations_text), Some(salt_b64), Some(hash_b64)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    if prefix != HASH_PREFIX {
        return false;
    }
    let Ok(iterations) = iterations_text.parse::<u32>() else {
        return false;
    };
    if iterations == 0 {
        return false;
    }
    let (Ok(salt), Ok(expected)) = (
        STANDARD_NO_PAD.decode(salt_b64),
        STANDARD_NO_PAD.decode(hash_b64),
    ) else {
        return false;
    };

    let derived = derive(trimmed.as_bytes(), &salt, iterations);
    derived.as_slice().ct_eq(expected.as_slice()).into()
}

fn derive(password: &[u8], salt: &[u8], iterations: u32) -> [u8; DERIVED_BYTES] {
    let mut out = [0u8; DERIVED_BYTES];
    pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut out);
    out
}
