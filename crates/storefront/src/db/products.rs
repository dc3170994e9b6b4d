//! Product repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{FromRow, PgPool};
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use second_chance_core::{CurrencyCode, Price, ProductId, Slug};

use super::RepositoryError;

const PRODUCT_COLUMNS: &str = "id, name, description, price, currency, image_url, banner_url, \
                               slug, stripe_product_id, stripe_price_id, is_active, \
                               created_at, updated_at";

/// A catalog product.
#[derive(Debug, Clone)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub price: Price,
    pub image_url: Option<String>,
    pub banner_url: Option<String>,
    pub slug: Slug,
    pub stripe_product_id: Option<String>,
    pub stripe_price_id: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Path of this product's checkout page.
    #[must_use]
    pub fn checkout_path(&self) -> String {
        self.slug.checkout_path()
    }
}

/// Fields written when creating or editing a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price: Price,
    pub image_url: Option<String>,
    pub banner_url: Option<String>,
    pub slug: Slug,
}

/// Why a product form or seed entry was rejected. Shown to the admin as is.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProductInputError {
    #[error("El nombre es obligatorio")]
    MissingName,
    #[error("Precio inválido")]
    InvalidPrice,
    #[error("Moneda no soportada")]
    InvalidCurrency,
    #[error("URL inválida: {0}")]
    InvalidUrl(String),
    #[error("Slug inválido")]
    InvalidSlug,
}

/// Raw product fields as submitted by the admin form or a seed file.
///
/// Blank optional fields count as absent. A blank slug is derived from the
/// name.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductInput {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub currency: String,
    pub image_url: Option<String>,
    pub banner_url: Option<String>,
    pub slug: Option<String>,
}

fn non_blank(value: Option<&String>) -> Option<String> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty()).map(str::to_string)
}

fn https_url(value: Option<&String>) -> Result<Option<String>, ProductInputError> {
    let Some(raw) = non_blank(value) else {
        return Ok(None);
    };
    match Url::parse(&raw) {
        Ok(url) if matches!(url.scheme(), "https" | "http") => Ok(Some(raw)),
        _ => Err(ProductInputError::InvalidUrl(raw)),
    }
}

impl ProductInput {
    /// Validate into a [`NewProduct`].
    ///
    /// # Errors
    ///
    /// Returns the first invalid field.
    pub fn validate(&self) -> Result<NewProduct, ProductInputError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ProductInputError::MissingName);
        }

        let currency = if self.currency.trim().is_empty() {
            CurrencyCode::default()
        } else {
            self.currency
                .parse()
                .map_err(|_| ProductInputError::InvalidCurrency)?
        };
        let price = Price::parse(&self.price, currency).map_err(|_| ProductInputError::InvalidPrice)?;

        let slug = match non_blank(self.slug.as_ref()) {
            Some(slug) => Slug::parse(&slug),
            None => Slug::from_name(name),
        }
        .map_err(|_| ProductInputError::InvalidSlug)?;

        Ok(NewProduct {
            name: name.to_string(),
            description: non_blank(self.description.as_ref()),
            price,
            image_url: https_url(self.image_url.as_ref())?,
            banner_url: https_url(self.banner_url.as_ref())?,
            slug,
        })
    }
}

impl From<&Product> for ProductInput {
    fn from(product: &Product) -> Self {
        Self {
            name: product.name.clone(),
            description: product.description.clone(),
            price: format!("{:.2}", product.price.amount),
            currency: product.price.currency_code.code().to_string(),
            image_url: product.image_url.clone(),
            banner_url: product.banner_url.clone(),
            slug: Some(product.slug.to_string()),
        }
    }
}

#[derive(FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    price: Decimal,
    currency: String,
    image_url: Option<String>,
    banner_url: Option<String>,
    slug: String,
    stripe_product_id: Option<String>,
    stripe_price_id: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let currency: CurrencyCode = row.currency.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid currency for product {}: {e}", row.id))
        })?;
        let slug = Slug::parse(&row.slug).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid slug for product {}: {e}", row.id))
        })?;

        Ok(Self {
            id: ProductId::from_uuid(row.id),
            name: row.name,
            description: row.description,
            price: Price::new(row.price, currency),
            image_url: row.image_url,
            banner_url: row.banner_url,
            slug,
            stripe_product_id: row.stripe_product_id,
            stripe_price_id: row.stripe_price_id,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn convert_rows(rows: Vec<ProductRow>) -> Result<Vec<Product>, RepositoryError> {
    rows.into_iter().map(Product::try_from).collect()
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Newest active products, for the storefront listing.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_active(&self, limit: i64) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE is_active ORDER BY created_at DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        convert_rows(rows)
    }

    /// Every product, active or not, newest first (admin listing).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY created_at DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        convert_rows(rows)
    }

    /// Get an active product by its slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_active_by_slug(&self, slug: &Slug) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE slug = $1 AND is_active"
        ))
        .bind(slug.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }

    /// Get a product by ID regardless of its active flag.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }

    /// Get an active product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_active_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.get_by_id(id).await?.filter(|p| p.is_active))
    }

    /// Insert a product with the Stripe IDs it was registered under.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(
        &self,
        product: &NewProduct,
        stripe_product_id: Option<&str>,
        stripe_price_id: Option<&str>,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "INSERT INTO products \
                 (id, name, description, price, currency, image_url, banner_url, slug, \
                  stripe_product_id, stripe_price_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(ProductId::new())
        .bind(&product.name)
        .bind(product.description.as_deref())
        .bind(product.price.amount)
        .bind(product.price.currency_code.code())
        .bind(product.image_url.as_deref())
        .bind(product.banner_url.as_deref())
        .bind(product.slug.as_str())
        .bind(stripe_product_id)
        .bind(stripe_price_id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "slug already in use"))?;

        Product::try_from(row)
    }

    /// Update a product's editable fields.
    ///
    /// A changed price or currency clears `stripe_price_id` so the next
    /// checkout registers a fresh Stripe price instead of charging the old one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist and
    /// `RepositoryError::Conflict` if the new slug is taken.
    pub async fn update(&self, id: ProductId, product: &NewProduct) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "UPDATE products SET \
                 name = $2, description = $3, image_url = $6, banner_url = $7, slug = $8, \
                 stripe_price_id = CASE WHEN price = $4 AND currency = $5 \
                                        THEN stripe_price_id ELSE NULL END, \
                 price = $4, currency = $5, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id)
        .bind(&product.name)
        .bind(product.description.as_deref())
        .bind(product.price.amount)
        .bind(product.price.currency_code.code())
        .bind(product.image_url.as_deref())
        .bind(product.banner_url.as_deref())
        .bind(product.slug.as_str())
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "slug already in use"))?
        .ok_or(RepositoryError::NotFound)?;

        Product::try_from(row)
    }

    /// Record the Stripe product and price a product is sold under.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn set_stripe_ids(
        &self,
        id: ProductId,
        stripe_product_id: &str,
        stripe_price_id: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE products SET stripe_product_id = $2, stripe_price_id = $3, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(stripe_product_id)
        .bind(stripe_price_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Soft delete: hide the product from the storefront and checkout.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn deactivate(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE products SET is_active = FALSE, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Number of active products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_active(&self) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn row() -> ProductRow {
        ProductRow {
            id: Uuid::new_v4(),
            name: "Widget".to_string(),
            description: None,
            price: Decimal::new(990, 2),
            currency: "EUR".to_string(),
            image_url: None,
            banner_url: None,
            slug: "widget-42".to_string(),
            stripe_product_id: None,
            stripe_price_id: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_row_conversion() {
        let product = Product::try_from(row()).unwrap();
        assert_eq!(product.checkout_path(), "/checkout/widget-42");
        assert_eq!(product.price.display(), "9,90 €");
    }

    #[test]
    fn test_row_with_bad_currency_is_corruption() {
        let bad = ProductRow {
            currency: "DOGE".to_string(),
            ..row()
        };
        assert!(matches!(
            Product::try_from(bad),
            Err(RepositoryError::DataCorruption(_))
        ));
    }

    fn input() -> ProductInput {
        ProductInput {
            name: "Curso Básico".to_string(),
            description: Some("  ".to_string()),
            price: "9,90".to_string(),
            currency: "eur".to_string(),
            image_url: Some(String::new()),
            banner_url: None,
            slug: None,
        }
    }

    #[test]
    fn test_input_derives_slug_and_drops_blanks() {
        let product = input().validate().unwrap();
        assert_eq!(product.slug.as_str(), "curso-basico");
        assert_eq!(product.price.display(), "9,90 €");
        assert_eq!(product.description, None);
        assert_eq!(product.image_url, None);
    }

    #[test]
    fn test_input_rejections() {
        let no_name = ProductInput {
            name: " ".to_string(),
            ..input()
        };
        assert_eq!(no_name.validate().unwrap_err(), ProductInputError::MissingName);

        let free = ProductInput {
            price: "0".to_string(),
            ..input()
        };
        assert_eq!(free.validate().unwrap_err(), ProductInputError::InvalidPrice);

        let bad_url = ProductInput {
            image_url: Some("javascript:alert(1)".to_string()),
            ..input()
        };
        assert!(matches!(
            bad_url.validate(),
            Err(ProductInputError::InvalidUrl(_))
        ));

        let bad_slug = ProductInput {
            slug: Some("Bad Slug".to_string()),
            ..input()
        };
        assert_eq!(bad_slug.validate().unwrap_err(), ProductInputError::InvalidSlug);
    }

    #[test]
    fn test_row_with_bad_slug_is_corruption() {
        let bad = ProductRow {
            slug: "Not A Slug".to_string(),
            ..row()
        };
        assert!(matches!(
            Product::try_from(bad),
            Err(RepositoryError::DataCorruption(_))
        ));
    }
}
