//! Seed the product catalog from a YAML file.
//!
//! Products are inserted without Stripe IDs; the storefront registers them
//! with Stripe on their first checkout. Products whose slug already exists
//! are skipped, so seeding is repeatable.
//!
//! ```yaml
//! products:
//!   - name: Curso Básico
//!     description: Acceso de por vida
//!     price: "9.90"        # quoted, parsed as a decimal
//!     currency: EUR
//!     image_url: https://cdn.example.com/curso.png
//!     slug: curso-basico   # optional, derived from the name
//! ```

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info, warn};

use second_chance_storefront::db::{NewProduct, ProductInput, ProductRepository, RepositoryError};

use super::{ConnectError, connect};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0} invalid product(s)")]
    Invalid(usize),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, Deserialize)]
struct SeedFile {
    #[serde(default)]
    products: Vec<ProductInput>,
}

/// Outcome of a seeding run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub inserted: usize,
    pub skipped: usize,
}

/// Parse and validate every entry, reporting all failures at once.
fn parse_products(content: &str) -> Result<Vec<NewProduct>, SeedError> {
    let file: SeedFile = serde_yaml::from_str(content)?;

    let mut products = Vec::with_capacity(file.products.len());
    let mut invalid = 0;
    for (index, input) in file.products.iter().enumerate() {
        match input.validate() {
            Ok(product) => products.push(product),
            Err(e) => {
                error!(entry = index + 1, name = %input.name, "  - {e}");
                invalid += 1;
            }
        }
    }

    if invalid > 0 {
        return Err(SeedError::Invalid(invalid));
    }
    Ok(products)
}

/// Seed products from `file_path`. With `dry_run` the file is only validated.
///
/// # Errors
///
/// Returns an error if the file is unreadable or invalid, or the database
/// fails.
pub async fn products(file_path: &str, dry_run: bool) -> Result<SeedSummary, SeedError> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(SeedError::NotFound(file_path.to_string()));
    }

    info!(path = %file_path, "Loading products from file");
    let content = tokio::fs::read_to_string(path).await?;
    let products = parse_products(&content)?;
    info!(count = products.len(), "Products validated");

    if dry_run {
        return Ok(SeedSummary::default());
    }

    let pool = connect().await?;
    let repo = ProductRepository::new(&pool);

    let mut summary = SeedSummary::default();
    for product in &products {
        match repo.create(product, None, None).await {
            Ok(created) => {
                info!(slug = %created.slug, "Inserted {}", created.name);
                summary.inserted += 1;
            }
            Err(RepositoryError::Conflict(_)) => {
                warn!(slug = %product.slug, "Skipped, slug already exists");
                summary.skipped += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!("Seeding complete!");
    info!("  Inserted: {}", summary.inserted);
    info!("  Skipped (already exist): {}", summary.skipped);
    Ok(summary)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_products() {
        let yaml = r#"
products:
  - name: Curso Básico
    price: "9.90"
    currency: EUR
  - name: Mentoría
    description: Una hora
    price: "49,00"
    currency: usd
    slug: mentoria-1h
"#;
        let products = parse_products(yaml).unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].slug.as_str(), "curso-basico");
        assert_eq!(products[1].slug.as_str(), "mentoria-1h");
        assert_eq!(products[1].price.currency_code.code(), "USD");
    }

    #[test]
    fn test_parse_reports_every_invalid_entry() {
        let yaml = r#"
products:
  - name: ""
    price: "9.90"
  - name: Gratis
    price: "0"
  - name: Válido
    price: "1"
"#;
        assert!(matches!(parse_products(yaml), Err(SeedError::Invalid(2))));
    }

    #[test]
    fn test_empty_file_seeds_nothing() {
        assert!(parse_products("products: []").unwrap().is_empty());
    }

    #[test]
    fn test_bundled_seed_file_is_valid() {
        let content = include_str!("../../seeds/products.yaml");
        assert!(!parse_products(content).unwrap().is_empty());
    }
}
