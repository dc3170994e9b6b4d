//! Read and write site settings.
//!
//! ```bash
//! sc-cli settings get tiktok_pixel_id
//! sc-cli settings set tiktok_pixel_id C4ABC123XYZ
//! ```
//!
//! A running storefront caches settings for up to a minute.

use thiserror::Error;

use second_chance_storefront::db::settings::keys;
use second_chance_storefront::db::{RepositoryError, SettingsRepository};

use super::{ConnectError, connect};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Unknown setting: {0}. Known settings: {known}", known = keys::ALL.join(", "))]
    UnknownKey(String),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

fn known_key(key: &str) -> Result<&'static str, SettingsError> {
    keys::ALL
        .iter()
        .copied()
        .find(|k| *k == key)
        .ok_or_else(|| SettingsError::UnknownKey(key.to_string()))
}

/// Print a setting's value. Unset settings print nothing.
///
/// # Errors
///
/// Returns an error for an unknown key or a database failure.
pub async fn get(key: &str) -> Result<(), SettingsError> {
    let key = known_key(key)?;
    let pool = connect().await?;

    match SettingsRepository::new(&pool).get(key).await? {
        Some(value) => {
            #[allow(clippy::print_stdout)]
            {
                println!("{value}");
            }
        }
        None => tracing::info!(key, "Setting is not set"),
    }
    Ok(())
}

/// Store a setting. An empty value clears it.
///
/// # Errors
///
/// Returns an error for an unknown key or a database failure.
pub async fn set(key: &str, value: &str) -> Result<(), SettingsError> {
    let key = known_key(key)?;
    let pool = connect().await?;

    SettingsRepository::new(&pool).set(key, value.trim()).await?;
    tracing::info!(key, "Setting saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_key() {
        assert_eq!(known_key("tiktok_pixel_id").ok(), Some(keys::TIKTOK_PIXEL_ID));
        assert!(matches!(
            known_key("stripe_key"),
            Err(SettingsError::UnknownKey(k)) if k == "stripe_key"
        ));
    }
}
