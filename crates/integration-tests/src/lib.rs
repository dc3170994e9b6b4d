//! Integration tests for Second Chance Checkout.
//!
//! The tests drive a running storefront over HTTP and inspect its database.
//! They are `#[ignore]`d by default.
//!
//! # Running Tests
//!
//! ```bash
//! sc-cli migrate
//! cargo run -p second-chance-storefront &
//! ADMIN_TEST_PASSWORD='...' cargo test -p second-chance-integration-tests -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_TEST_URL` - server under test (default `http://localhost:3000`)
//! - `STOREFRONT_DATABASE_URL` - the server's database
//! - `ADMIN_TEST_PASSWORD` - plain-text password matching `ADMIN_PASSWORD_HASH`

#![allow(clippy::missing_panics_doc, clippy::expect_used, clippy::indexing_slicing)]

use reqwest::{Client, redirect};
use secrecy::SecretString;
use sqlx::PgPool;
use uuid::Uuid;

use second_chance_core::{CurrencyCode, Price, Slug};
use second_chance_storefront::db::{self, NewProduct, Product, ProductRepository};

/// Base URL of the storefront under test.
#[must_use]
pub fn base_url() -> String {
    std::env::var("STOREFRONT_TEST_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// Client that keeps cookies and doesn't follow redirects, so tests can
/// assert on `Location`.
#[must_use]
pub fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .redirect(redirect::Policy::none())
        .build()
        .expect("Failed to create HTTP client")
}

/// Client logged into the admin panel.
///
/// Each login claims its own client IP so parallel tests stay under the
/// login rate limit.
pub async fn admin_client() -> Client {
    let password =
        std::env::var("ADMIN_TEST_PASSWORD").expect("ADMIN_TEST_PASSWORD must be set");
    let octets = Uuid::new_v4().into_bytes();
    let client_ip = format!("10.{}.{}.{}", octets[0], octets[1], octets[2]);

    let client = client();
    let resp = client
        .post(format!("{}/admin/login", base_url()))
        .header("x-forwarded-for", client_ip)
        .form(&[("password", password.as_str())])
        .send()
        .await
        .expect("Failed to log in");
    assert!(resp.status().is_redirection(), "login failed: {}", resp.status());
    client
}

/// Pool on the server's database.
pub async fn pool() -> PgPool {
    let url = std::env::var("STOREFRONT_DATABASE_URL")
        .map(SecretString::from)
        .expect("STOREFRONT_DATABASE_URL must be set");
    db::create_pool(&url).await.expect("Failed to connect")
}

/// Insert an active product with a unique slug.
pub async fn seed_product(pool: &PgPool) -> Product {
    let suffix = Uuid::new_v4().simple().to_string();
    let slug = Slug::parse(&format!("it-{}", &suffix[..12])).expect("valid slug");
    let product = NewProduct {
        name: format!("Producto de prueba {}", &suffix[..6]),
        description: Some("Creado por los tests de integración".to_string()),
        price: Price::parse("9.90", CurrencyCode::EUR).expect("valid price"),
        image_url: None,
        banner_url: None,
        slug,
    };
    ProductRepository::new(pool)
        .create(&product, None, None)
        .await
        .expect("Failed to insert product")
}

/// Value of the first `attr="..."` in `html`.
#[must_use]
pub fn attribute<'a>(html: &'a str, attr: &str) -> Option<&'a str> {
    let needle = format!("{attr}=\"");
    let start = html.find(&needle)? + needle.len();
    let len = html[start..].find('"')?;
    Some(&html[start..start + len])
}
