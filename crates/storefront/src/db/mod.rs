//! Database operations for the storefront `PostgreSQL` database.
//!
//! ## Tables
//!
//! - `products` - Catalog, soft-deleted via `is_active`
//! - `orders` - One row per checkout attempt
//! - `settings` - Key/value site settings (`tiktok_pixel_id`)
//! - `tower_sessions.session` - Visitor and admin sessions (created by the store)
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p second-chance-cli -- migrate
//! ```
//!
//! Queries are checked at runtime (`query_as` + `FromRow`) so the workspace
//! builds without a live database.

pub mod orders;
pub mod products;
pub mod settings;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

pub use orders::{NewOrder, Order, OrderRepository, OrderSummary, SalesStats};
pub use products::{NewProduct, Product, ProductInput, ProductInputError, ProductRepository};
pub use settings::SettingsRepository;

/// Errors returned by repositories.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate slug).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique-constraint violation to `Conflict`, anything else to `Database`.
    pub(crate) fn from_write(err: sqlx::Error, conflict: &str) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::Conflict(conflict.to_string())
            }
            _ => Self::Database(err),
        }
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
