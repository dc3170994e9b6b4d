//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront, used in Stripe return URLs
//! - `STRIPE_SECRET_KEY` - Stripe API secret key
//! - `ADMIN_PASSWORD_HASH` - Argon2 PHC string for the admin panel password
//! - `SPECIAL_OFFER_PRICE_ID` - Stripe price charged by the exit offer
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STRIPE_API_BASE` - Stripe API base URL (default: <https://api.stripe.com>)
//! - `SPECIAL_OFFER_AMOUNT` - Offer price shown to buyers (default: 4.75)
//! - `SPECIAL_OFFER_COMPARE_AT` - Struck-through original price (default: 9.90)
//! - `SPECIAL_OFFER_CURRENCY` - Offer currency (default: EUR)
//! - `EXIT_GUARD_IDLE_SECONDS` - Idle lifetime of a mounted checkout guard (default: 1800)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate, 0.0 to 1.0 (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate, 0.0 to 1.0 (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use argon2::password_hash::PasswordHash;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use second_chance_core::{CurrencyCode, Price};

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront, without trailing slash
    pub base_url: String,
    /// Stripe API configuration
    pub stripe: StripeConfig,
    /// Admin panel configuration
    pub admin: AdminConfig,
    /// Exit offer pricing
    pub special_offer: SpecialOfferConfig,
    /// How long an untouched checkout guard stays registered
    pub exit_guard_idle: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Fraction of errors sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions traced
    pub sentry_traces_sample_rate: f32,
}

/// Stripe API configuration.
///
/// Implements `Debug` manually to redact the secret key.
#[derive(Clone)]
pub struct StripeConfig {
    /// Secret API key (`sk_live_…` / `sk_test_…`)
    pub secret_key: SecretString,
    /// API base URL, overridable for tests and mocks
    pub api_base: String,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Admin panel configuration.
#[derive(Clone)]
pub struct AdminConfig {
    /// Argon2 PHC hash of the admin password
    pub password_hash: SecretString,
}

impl std::fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminConfig")
            .field("password_hash", &"[REDACTED]")
            .finish()
    }
}

/// Fixed-price retention offer shown on the exit offer page.
#[derive(Debug, Clone)]
pub struct SpecialOfferConfig {
    /// Stripe price the offer checkout charges
    pub price_id: String,
    /// Price the buyer pays
    pub price: Price,
    /// Original price shown struck through
    pub compare_at: Price,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host = parse_env("STOREFRONT_HOST", "127.0.0.1")?;
        let port = parse_env("STOREFRONT_PORT", "3000")?;
        let base_url = parse_base_url(&get_required_env("STOREFRONT_BASE_URL")?)?;

        let stripe = StripeConfig::from_env()?;
        let admin = AdminConfig::from_env()?;
        let special_offer = SpecialOfferConfig::from_env()?;
        let exit_guard_idle = Duration::from_secs(parse_env("EXIT_GUARD_IDLE_SECONDS", "1800")?);

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            stripe,
            admin,
            special_offer,
            exit_guard_idle,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_sample_rate("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_sample_rate("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the public site is served over HTTPS.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl StripeConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let api_base = get_env_or_default("STRIPE_API_BASE", "https://api.stripe.com");
        Ok(Self {
            secret_key: get_validated_secret("STRIPE_SECRET_KEY")?,
            api_base: parse_base_url(&api_base)
                .map_err(|_| invalid("STRIPE_API_BASE", "must be an http(s) URL"))?,
        })
    }
}

impl AdminConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let hash = get_required_env("ADMIN_PASSWORD_HASH")?;
        validate_password_hash(&hash, "ADMIN_PASSWORD_HASH")?;
        Ok(Self {
            password_hash: SecretString::from(hash),
        })
    }
}

impl SpecialOfferConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let currency: CurrencyCode = get_env_or_default("SPECIAL_OFFER_CURRENCY", "EUR")
            .parse()
            .map_err(|e| invalid("SPECIAL_OFFER_CURRENCY", e))?;
        let price = Price::parse(&get_env_or_default("SPECIAL_OFFER_AMOUNT", "4.75"), currency)
            .map_err(|e| invalid("SPECIAL_OFFER_AMOUNT", e))?;
        let compare_at = Price::parse(
            &get_env_or_default("SPECIAL_OFFER_COMPARE_AT", "9.90"),
            currency,
        )
        .map_err(|e| invalid("SPECIAL_OFFER_COMPARE_AT", e))?;

        Ok(Self {
            price_id: get_required_env("SPECIAL_OFFER_PRICE_ID")?,
            price,
            compare_at,
        })
    }

    /// Whole-percent discount against the compare-at price (`50` for 4.75 vs 9.90).
    #[must_use]
    pub fn discount_percent(&self) -> u32 {
        use rust_decimal::prelude::ToPrimitive;

        if self.compare_at.amount <= self.price.amount {
            return 0;
        }
        let ratio = (self.compare_at.amount - self.price.amount) / self.compare_at.amount;
        (ratio * rust_decimal::Decimal::ONE_HUNDRED)
            .round()
            .to_u32()
            .unwrap_or(0)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn invalid(key: &str, reason: impl ToString) -> ConfigError {
    ConfigError::InvalidEnvVar(key.to_string(), reason.to_string())
}

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable (or its default) with `FromStr`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| invalid(key, e))
}

/// Parse a Sentry sample rate and check it lies in `0.0..=1.0`.
fn parse_sample_rate(key: &str, default: &str) -> Result<f32, ConfigError> {
    let rate: f32 = parse_env(key, default)?;
    if (0.0..=1.0).contains(&rate) {
        Ok(rate)
    } else {
        Err(invalid(key, "must be between 0.0 and 1.0"))
    }
}

/// Validate an http(s) base URL and strip any trailing slash.
fn parse_base_url(value: &str) -> Result<String, ConfigError> {
    let url = Url::parse(value).map_err(|e| invalid("STOREFRONT_BASE_URL", e))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(invalid("STOREFRONT_BASE_URL", "must be an http(s) URL"));
    }
    Ok(value.trim_end_matches('/').to_string())
}

/// Check that a value is a parseable PHC password hash.
fn validate_password_hash(hash: &str, var_name: &str) -> Result<(), ConfigError> {
    PasswordHash::new(hash).map_err(|_| {
        ConfigError::InsecureSecret(
            var_name.to_string(),
            "must be an Argon2 PHC string (generate one with `sc-cli admin hash-password`)"
                .to_string(),
        )
    })?;
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the key from the Stripe dashboard."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    /// A fully populated config for handler tests. Nothing here is contacted
    /// unless a test drives a route that needs it.
    pub(crate) fn test_config() -> StorefrontConfig {
        StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/second_chance_test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            stripe: StripeConfig {
                secret_key: SecretString::from("sk_test_4eC39HqLyjWDarjtT1zdp7dc"),
                api_base: "http://127.0.0.1:9".to_string(),
            },
            admin: AdminConfig {
                password_hash: SecretString::from(
                    "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHQ$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
                ),
            },
            special_offer: SpecialOfferConfig {
                price_id: "price_special".to_string(),
                price: Price::parse("4.75", CurrencyCode::EUR).unwrap(),
                compare_at: Price::parse("9.90", CurrencyCode::EUR).unwrap(),
            },
            exit_guard_idle: Duration::from_secs(1800),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        }
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("sk_test_your-key-here", "STRIPE_SECRET_KEY");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaa", "STRIPE_SECRET_KEY");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_stripe_key() {
        assert!(validate_secret_strength("sk_test_4eC39HqLyjWDarjtT1zdp7dc", "K").is_ok());
    }

    #[test]
    fn test_password_hash_must_be_phc() {
        assert!(validate_password_hash("hunter2", "ADMIN_PASSWORD_HASH").is_err());
        let config = test_config();
        assert!(
            validate_password_hash(config.admin.password_hash.expose_secret(), "H").is_ok()
        );
    }

    #[test]
    fn test_parse_base_url_strips_trailing_slash() {
        assert_eq!(
            parse_base_url("https://shop.example.com/").unwrap(),
            "https://shop.example.com"
        );
        assert!(parse_base_url("ftp://shop.example.com").is_err());
        assert!(parse_base_url("not a url").is_err());
    }

    #[test]
    fn test_discount_percent() {
        assert_eq!(test_config().special_offer.discount_percent(), 52);

        let even = SpecialOfferConfig {
            price_id: "p".to_string(),
            price: Price::parse("5", CurrencyCode::EUR).unwrap(),
            compare_at: Price::parse("10", CurrencyCode::EUR).unwrap(),
        };
        assert_eq!(even.discount_percent(), 50);
    }

    #[test]
    fn test_socket_addr() {
        let addr = test_config().socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let debug_output = format!("{:?}", test_config());
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("sk_test_4eC39HqLyjWDarjtT1zdp7dc"));
        assert!(!debug_output.contains("argon2id"));
    }
}
