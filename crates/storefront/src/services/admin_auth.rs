//! Admin password authentication.
//!
//! There is a single admin account. Its password is stored as an Argon2id PHC
//! string in `ADMIN_PASSWORD_HASH`, produced by `sc-cli admin hash-password`.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

/// Minimum admin password length.
pub const MIN_PASSWORD_LENGTH: usize = 12;

/// Errors from admin authentication.
#[derive(Debug, Error)]
pub enum AdminAuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("password must be at least {MIN_PASSWORD_LENGTH} characters")]
    WeakPassword,

    #[error("failed to hash password")]
    PasswordHash,
}

/// Hash a new admin password with Argon2id.
///
/// # Errors
///
/// Returns `AdminAuthError::WeakPassword` if the password is too short.
pub fn hash_password(password: &str) -> Result<String, AdminAuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AdminAuthError::WeakPassword);
    }

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AdminAuthError::PasswordHash)
}

/// Verify a login attempt against the configured hash.
///
/// # Errors
///
/// Returns `AdminAuthError::InvalidCredentials` on mismatch or an unparsable
/// hash.
pub fn verify_password(password: &str, hash: &SecretString) -> Result<(), AdminAuthError> {
    let parsed =
        PasswordHash::new(hash.expose_secret()).map_err(|_| AdminAuthError::InvalidCredentials)?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| AdminAuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_then_verify() {
        let hash = SecretString::from(hash_password("correct horse battery").unwrap());

        assert!(verify_password("correct horse battery", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse battery", &hash),
            Err(AdminAuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_short_password_rejected() {
        assert!(matches!(
            hash_password("short"),
            Err(AdminAuthError::WeakPassword)
        ));
    }

    #[test]
    fn test_garbage_hash_is_invalid_credentials() {
        let hash = SecretString::from("not-a-phc-string");
        assert!(matches!(
            verify_password("anything at all", &hash),
            Err(AdminAuthError::InvalidCredentials)
        ));
    }
}
