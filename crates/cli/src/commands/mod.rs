//! CLI command implementations.

pub mod admin;
pub mod migrate;
pub mod seed;
pub mod settings;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

use second_chance_storefront::db;

/// Database URL variable shared with the storefront.
pub const DATABASE_URL_VAR: &str = "STOREFRONT_DATABASE_URL";

/// Errors common to every command that touches the database.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Connect to the storefront database named by `STOREFRONT_DATABASE_URL`.
///
/// # Errors
///
/// Returns an error if the variable is unset or the connection fails.
pub async fn connect() -> Result<PgPool, ConnectError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var(DATABASE_URL_VAR)
        .map(SecretString::from)
        .map_err(|_| ConnectError::MissingEnvVar(DATABASE_URL_VAR))?;

    tracing::info!("Connecting to storefront database...");
    Ok(db::create_pool(&database_url).await?)
}
