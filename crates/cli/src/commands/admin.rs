//! Admin password management.
//!
//! The admin panel has a single password, configured as an Argon2 PHC hash in
//! `ADMIN_PASSWORD_HASH`. This command produces that hash.
//!
//! ```bash
//! sc-cli admin hash-password            # prompts on stdin
//! echo -n 'a long passphrase' | sc-cli admin hash-password
//! ```

use std::io::BufRead;

use thiserror::Error;

use second_chance_storefront::services::admin_auth::{AdminAuthError, hash_password};

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("Failed to read password: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Auth(#[from] AdminAuthError),
}

/// Read a password from the first line of `input`.
fn read_password(input: &mut impl BufRead) -> Result<String, AdminError> {
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Hash the password read from stdin and print the PHC string.
///
/// # Errors
///
/// Returns an error if stdin can't be read or the password is too weak.
pub fn hash_password_from_stdin() -> Result<(), AdminError> {
    tracing::info!("Reading admin password from stdin");
    let password = read_password(&mut std::io::stdin().lock())?;
    let hash = hash_password(&password)?;

    #[allow(clippy::print_stdout)]
    {
        println!("{hash}");
    }
    tracing::info!("Set ADMIN_PASSWORD_HASH to the value above");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_read_password_strips_newline() {
        let mut input = "correct horse battery\r\nsecond line\n".as_bytes();
        assert_eq!(read_password(&mut input).unwrap(), "correct horse battery");
    }

    #[test]
    fn test_read_password_keeps_inner_spaces() {
        let mut input = "  spaced out pass  ".as_bytes();
        assert_eq!(read_password(&mut input).unwrap(), "  spaced out pass  ");
    }
}
