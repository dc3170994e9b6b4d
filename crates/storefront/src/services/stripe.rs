//! Stripe REST API client.
//!
//! Talks to the handful of Stripe endpoints the checkout needs, using
//! form-encoded requests and bearer auth:
//!
//! - `GET  /v1/customers?email=` - reuse an existing customer
//! - `POST /v1/products`, `POST /v1/prices` - register a catalog product
//! - `POST /v1/checkout/sessions` - hosted payment page
//! - `GET  /v1/checkout/sessions/{id}` - payment status on return

use std::collections::HashMap;

use reqwest::{Client, Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use second_chance_core::{Email, Price, PriceError};

use crate::config::StripeConfig;

/// Errors that can occur when talking to Stripe.
#[derive(Debug, Error)]
pub enum StripeError {
    /// HTTP request failed.
    #[error("Stripe request failed: {0}")]
    Request(String),

    /// Failed to parse response.
    #[error("Stripe response error: {0}")]
    Response(String),

    /// Stripe rejected the request.
    #[error("Stripe API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Amount can't be expressed in minor units.
    #[error("invalid amount: {0}")]
    Amount(#[from] PriceError),
}

/// A Stripe customer.
#[derive(Debug, Clone, Deserialize)]
pub struct Customer {
    pub id: String,
}

/// A Stripe product.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeProduct {
    pub id: String,
}

/// A Stripe price.
#[derive(Debug, Clone, Deserialize)]
pub struct StripePrice {
    pub id: String,
}

/// A Stripe Checkout session.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    /// Hosted payment page; only present while the session is open.
    pub url: Option<String>,
    /// `paid`, `unpaid` or `no_payment_required`.
    pub payment_status: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSession {
    /// Whether the buyer has paid.
    #[must_use]
    pub fn is_paid(&self) -> bool {
        self.payment_status == "paid"
    }
}

#[derive(Deserialize)]
struct ListResponse<T> {
    data: Vec<T>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Who the session is for.
#[derive(Debug, Clone)]
pub enum SessionCustomer {
    /// Attach to an existing Stripe customer.
    Existing(String),
    /// Let Stripe create a customer for this email.
    Email(Email),
}

/// Parameters of a single-item `payment` mode Checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutSessionRequest {
    pub price_id: String,
    pub customer: SessionCustomer,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: Vec<(&'static str, String)>,
}

impl CheckoutSessionRequest {
    /// Form body in Stripe's bracketed-key encoding.
    fn form(&self) -> Vec<(String, String)> {
        let mut form = vec![
            ("mode".to_string(), "payment".to_string()),
            ("line_items[0][price]".to_string(), self.price_id.clone()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("success_url".to_string(), self.success_url.clone()),
            ("cancel_url".to_string(), self.cancel_url.clone()),
        ];
        match &self.customer {
            SessionCustomer::Existing(id) => form.push(("customer".to_string(), id.clone())),
            SessionCustomer::Email(email) => {
                form.push(("customer_email".to_string(), email.to_string()));
            }
        }
        for (key, value) in &self.metadata {
            form.push((format!("metadata[{key}]"), value.clone()));
        }
        form
    }
}

/// Stripe API client.
#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: SecretString,
    api_base: String,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("secret_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl StripeClient {
    /// Create a new Stripe client.
    #[must_use]
    pub fn new(config: &StripeConfig) -> Self {
        Self {
            client: Client::new(),
            secret_key: config.secret_key.clone(),
            api_base: config.api_base.clone(),
        }
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(self.secret_key.expose_secret())
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/v1/{path}", self.api_base)
    }

    /// Send a request and decode the JSON body, turning Stripe's error
    /// envelope into `StripeError::Api`.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, StripeError> {
        let response = request
            .send()
            .await
            .map_err(|e| StripeError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorResponse>()
                .await
                .ok()
                .and_then(|body| body.error.message)
                .unwrap_or_else(|| "Unknown error".to_string());
            return Err(StripeError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| StripeError::Response(e.to_string()))
    }

    /// Find an existing customer by email.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, email))]
    pub async fn find_customer_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<Customer>, StripeError> {
        let url = Url::parse_with_params(
            &self.endpoint("customers"),
            &[("email", email.as_str()), ("limit", "1")],
        )
        .map_err(|e| StripeError::Request(e.to_string()))?;

        let list: ListResponse<Customer> = self.send(self.request(Method::GET, url.as_str())).await?;
        let customer = list.data.into_iter().next();
        debug!(found = customer.is_some(), "Stripe customer lookup");
        Ok(customer)
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, description, image_url))]
    pub async fn create_product(
        &self,
        name: &str,
        description: Option<&str>,
        image_url: Option<&str>,
    ) -> Result<StripeProduct, StripeError> {
        let mut form = vec![("name", name.to_string())];
        if let Some(description) = description.filter(|d| !d.is_empty()) {
            form.push(("description", description.to_string()));
        }
        if let Some(image_url) = image_url.filter(|u| !u.is_empty()) {
            form.push(("images[0]", image_url.to_string()));
        }

        let product: StripeProduct = self
            .send(self.request(Method::POST, &self.endpoint("products")).form(&form))
            .await?;
        debug!(product_id = %product.id, "Stripe product created");
        Ok(product)
    }

    /// Create a one-off price for a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the amount is out of range or the API request fails.
    #[instrument(skip(self), fields(amount = %price))]
    pub async fn create_price(
        &self,
        stripe_product_id: &str,
        price: &Price,
    ) -> Result<StripePrice, StripeError> {
        let form = [
            ("product", stripe_product_id.to_string()),
            ("unit_amount", price.minor_units()?.to_string()),
            ("currency", price.currency_code.stripe_code()),
        ];

        let created: StripePrice = self
            .send(self.request(Method::POST, &self.endpoint("prices")).form(&form))
            .await?;
        debug!(price_id = %created.id, "Stripe price created");
        Ok(created)
    }

    /// Create a hosted Checkout session.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, request), fields(price_id = %request.price_id))]
    pub async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, StripeError> {
        let session: CheckoutSession = self
            .send(
                self.request(Method::POST, &self.endpoint("checkout/sessions"))
                    .form(&request.form()),
            )
            .await?;
        debug!(session_id = %session.id, "Stripe checkout session created");
        Ok(session)
    }

    /// Retrieve a Checkout session.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSession, StripeError> {
        let url = self.endpoint(&format!(
            "checkout/sessions/{}",
            urlencoding::encode(session_id)
        ));
        self.send(self.request(Method::GET, &url)).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request(customer: SessionCustomer) -> CheckoutSessionRequest {
        CheckoutSessionRequest {
            price_id: "price_123".to_string(),
            customer,
            success_url: "https://shop.test/payment-success?session_id={CHECKOUT_SESSION_ID}"
                .to_string(),
            cancel_url: "https://shop.test/payment-canceled?order_id=abc".to_string(),
            metadata: vec![("order_id", "abc".to_string()), ("special_offer", "true".to_string())],
        }
    }

    fn value<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
        form.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_session_form_for_new_customer() {
        let email = Email::parse("ana@example.com").unwrap();
        let form = request(SessionCustomer::Email(email)).form();

        assert_eq!(value(&form, "mode"), Some("payment"));
        assert_eq!(value(&form, "line_items[0][price]"), Some("price_123"));
        assert_eq!(value(&form, "line_items[0][quantity]"), Some("1"));
        assert_eq!(value(&form, "customer_email"), Some("ana@example.com"));
        assert_eq!(value(&form, "customer"), None);
        assert_eq!(value(&form, "metadata[order_id]"), Some("abc"));
        assert_eq!(value(&form, "metadata[special_offer]"), Some("true"));
    }

    #[test]
    fn test_session_form_for_existing_customer() {
        let form = request(SessionCustomer::Existing("cus_9".to_string())).form();

        assert_eq!(value(&form, "customer"), Some("cus_9"));
        assert_eq!(value(&form, "customer_email"), None);
    }

    #[test]
    fn test_session_deserialize() {
        let session: CheckoutSession = serde_json::from_str(
            r#"{"id":"cs_test_1","object":"checkout.session","url":null,
                "payment_status":"paid","metadata":{"order_id":"abc"}}"#,
        )
        .unwrap();

        assert!(session.is_paid());
        assert_eq!(session.metadata.get("order_id").map(String::as_str), Some("abc"));
    }

    #[test]
    fn test_debug_redacts_key() {
        let client = StripeClient::new(&StripeConfig {
            secret_key: SecretString::from("sk_test_supersecret"),
            api_base: "https://api.stripe.com".to_string(),
        });
        let debug = format!("{client:?}");
        assert!(!debug.contains("supersecret"));
    }
}
