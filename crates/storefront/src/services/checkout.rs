//! Checkout orchestration: buyer details in, Stripe redirect out.
//!
//! There are no webhooks. An order is created `pending` when the hosted
//! session opens and is settled when the buyer comes back to the success or
//! canceled page.

use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument, warn};

use second_chance_core::{CustomerName, Email, OrderId, Price};

use crate::config::StorefrontConfig;
use crate::db::{NewOrder, OrderRepository, Product, ProductRepository, RepositoryError};
use crate::services::stripe::{
    CheckoutSessionRequest, SessionCustomer, StripeClient, StripeError,
};

/// Which checkout form the buyer used. Decides the language of error toasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutFlow {
    /// `/checkout/{slug}` (Portuguese copy).
    Product,
    /// `/oferta-especial/checkout` (Spanish copy).
    SpecialOffer,
}

/// Errors that can occur while opening a payment session.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("invalid buyer details: {0}")]
    InvalidBuyer(String),

    #[error("product not found")]
    ProductNotFound,

    #[error("Stripe returned a session without a payment URL")]
    MissingSessionUrl,

    #[error(transparent)]
    Stripe(#[from] StripeError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl CheckoutError {
    /// Toast text shown on the form that failed.
    #[must_use]
    pub const fn user_message(&self, flow: CheckoutFlow) -> &'static str {
        match (self, flow) {
            (Self::InvalidBuyer(_), CheckoutFlow::Product) => "Por favor preencha todos os campos",
            (Self::InvalidBuyer(_), CheckoutFlow::SpecialOffer) => {
                "Por favor completa todos los campos"
            }
            (Self::ProductNotFound, _) => "Produto não encontrado",
            (Self::Stripe(_) | Self::MissingSessionUrl, CheckoutFlow::Product) => {
                "Não foi possível criar a sessão de pagamento"
            }
            (Self::Stripe(_) | Self::MissingSessionUrl, CheckoutFlow::SpecialOffer) => {
                "No fue posible crear la sesión de pago"
            }
            (Self::Repository(_), CheckoutFlow::Product) => "Erro ao processar o pagamento",
            (Self::Repository(_), CheckoutFlow::SpecialOffer) => "Error al procesar el pago",
        }
    }

    /// Whether this is the buyer's fault rather than ours.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidBuyer(_) | Self::ProductNotFound)
    }
}

/// Validated identity fields from a checkout form.
#[derive(Debug, Clone)]
pub struct Buyer {
    pub email: Email,
    pub name: CustomerName,
}

impl Buyer {
    /// Validate raw form input.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::InvalidBuyer` if either field is missing or
    /// malformed.
    pub fn parse(email: &str, name: &str) -> Result<Self, CheckoutError> {
        let email = Email::parse(email).map_err(|e| CheckoutError::InvalidBuyer(e.to_string()))?;
        let name =
            CustomerName::parse(name).map_err(|e| CheckoutError::InvalidBuyer(e.to_string()))?;
        Ok(Self { email, name })
    }
}

/// Where Stripe sends the buyer after paying. Stripe fills in the
/// `{CHECKOUT_SESSION_ID}` placeholder itself.
#[must_use]
pub fn success_url(base_url: &str) -> String {
    format!("{base_url}/payment-success?session_id={{CHECKOUT_SESSION_ID}}")
}

/// Where Stripe sends the buyer after backing out of the hosted page.
#[must_use]
pub fn cancel_url(base_url: &str, order_id: OrderId) -> String {
    format!("{base_url}/payment-canceled?order_id={order_id}")
}

/// Checkout operations over the shared pool, Stripe client and config.
pub struct CheckoutService<'a> {
    pool: &'a PgPool,
    stripe: &'a StripeClient,
    config: &'a StorefrontConfig,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, stripe: &'a StripeClient, config: &'a StorefrontConfig) -> Self {
        Self {
            pool,
            stripe,
            config,
        }
    }

    /// Open a Stripe session for a catalog product and return its payment URL.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError` if the product is gone or any Stripe or
    /// database step fails. Nothing is retried.
    #[instrument(skip(self, product, buyer), fields(product_id = %product.id))]
    pub async fn start_product_checkout(
        &self,
        product: &Product,
        buyer: &Buyer,
    ) -> Result<String, CheckoutError> {
        if !product.is_active {
            return Err(CheckoutError::ProductNotFound);
        }

        let customer = self.customer_for(&buyer.email).await?;
        let price_id = self.ensure_stripe_price(product).await?;

        let order = OrderRepository::new(self.pool)
            .create(&NewOrder {
                product_id: Some(product.id),
                customer_email: &buyer.email,
                customer_name: &buyer.name,
                amount: product.price,
                special_offer: false,
            })
            .await?;

        let metadata = vec![
            ("order_id", order.id.to_string()),
            ("product_id", product.id.to_string()),
        ];
        self.open_session(order.id, price_id, customer, metadata).await
    }

    /// Open a Stripe session for the discounted special offer.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError` if any Stripe or database step fails.
    #[instrument(skip(self, buyer))]
    pub async fn start_special_offer_checkout(&self, buyer: &Buyer) -> Result<String, CheckoutError> {
        let offer = &self.config.special_offer;
        let customer = self.customer_for(&buyer.email).await?;

        let order = OrderRepository::new(self.pool)
            .create(&NewOrder {
                product_id: None,
                customer_email: &buyer.email,
                customer_name: &buyer.name,
                amount: offer.price,
                special_offer: true,
            })
            .await?;

        let metadata = vec![
            ("order_id", order.id.to_string()),
            ("special_offer", "true".to_string()),
        ];
        self.open_session(order.id, offer.price_id.clone(), customer, metadata)
            .await
    }

    /// Settle the order behind a returned session if Stripe says it's paid.
    ///
    /// Returns the order that moved to `paid`, if any. Safe to call on every
    /// reload of the success page.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError` if Stripe or the database can't be reached.
    #[instrument(skip(self))]
    pub async fn confirm_payment(&self, session_id: &str) -> Result<Option<OrderId>, CheckoutError> {
        let session = self.stripe.retrieve_checkout_session(session_id).await?;
        if !session.is_paid() {
            info!(payment_status = %session.payment_status, "Session not paid yet");
            return Ok(None);
        }

        let order_id = OrderRepository::new(self.pool)
            .mark_paid_by_session(&session.id)
            .await?;
        if let Some(id) = order_id {
            info!(order_id = %id, "Order paid");
        }
        Ok(order_id)
    }

    /// Mark a still-pending order as failed after the buyer canceled.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Repository` if the update fails.
    #[instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: OrderId) -> Result<bool, CheckoutError> {
        let changed = OrderRepository::new(self.pool)
            .mark_failed_if_pending(order_id)
            .await?;
        if changed {
            info!(%order_id, "Order marked failed");
        }
        Ok(changed)
    }

    /// Register a product with Stripe.
    ///
    /// Returns the `(stripe_product_id, stripe_price_id)` pair to store.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Stripe` if either call fails.
    #[instrument(skip(self, description, image_url))]
    pub async fn register_product(
        &self,
        name: &str,
        description: Option<&str>,
        image_url: Option<&str>,
        price: &Price,
    ) -> Result<(String, String), CheckoutError> {
        let product = self
            .stripe
            .create_product(name, description, image_url)
            .await?;
        let created = self.stripe.create_price(&product.id, price).await?;
        Ok((product.id, created.id))
    }

    async fn customer_for(&self, email: &Email) -> Result<SessionCustomer, CheckoutError> {
        Ok(match self.stripe.find_customer_by_email(email).await? {
            Some(customer) => SessionCustomer::Existing(customer.id),
            None => SessionCustomer::Email(email.clone()),
        })
    }

    /// Stripe price to charge for `product`, creating the Stripe product
    /// and/or price the first time it is sold or after a price change.
    async fn ensure_stripe_price(&self, product: &Product) -> Result<String, CheckoutError> {
        if let Some(price_id) = &product.stripe_price_id {
            return Ok(price_id.clone());
        }

        let stripe_product_id = match &product.stripe_product_id {
            Some(id) => id.clone(),
            None => {
                self.stripe
                    .create_product(
                        &product.name,
                        product.description.as_deref(),
                        product.image_url.as_deref(),
                    )
                    .await?
                    .id
            }
        };
        let price = self
            .stripe
            .create_price(&stripe_product_id, &product.price)
            .await?;

        ProductRepository::new(self.pool)
            .set_stripe_ids(product.id, &stripe_product_id, &price.id)
            .await?;
        info!(product_id = %product.id, price_id = %price.id, "Registered Stripe price");
        Ok(price.id)
    }

    async fn open_session(
        &self,
        order_id: OrderId,
        price_id: String,
        customer: SessionCustomer,
        metadata: Vec<(&'static str, String)>,
    ) -> Result<String, CheckoutError> {
        let request = CheckoutSessionRequest {
            price_id,
            customer,
            success_url: success_url(&self.config.base_url),
            cancel_url: cancel_url(&self.config.base_url, order_id),
            metadata,
        };
        let session = self.stripe.create_checkout_session(&request).await?;

        OrderRepository::new(self.pool)
            .set_session_id(order_id, &session.id)
            .await?;

        session.url.ok_or_else(|| {
            warn!(session_id = %session.id, "Checkout session has no URL");
            CheckoutError::MissingSessionUrl
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_success_url_keeps_stripe_placeholder() {
        assert_eq!(
            success_url("https://shop.test"),
            "https://shop.test/payment-success?session_id={CHECKOUT_SESSION_ID}"
        );
    }

    #[test]
    fn test_cancel_url_carries_order() {
        let id: OrderId = "6f1b5a1e-3a1c-4b8e-9a55-0b2f8a8f4a10".parse().unwrap();
        assert_eq!(
            cancel_url("https://shop.test", id),
            "https://shop.test/payment-canceled?order_id=6f1b5a1e-3a1c-4b8e-9a55-0b2f8a8f4a10"
        );
    }

    #[test]
    fn test_buyer_requires_both_fields() {
        assert!(Buyer::parse("ana@example.com", "Ana Souza").is_ok());
        assert!(matches!(
            Buyer::parse("", "Ana Souza"),
            Err(CheckoutError::InvalidBuyer(_))
        ));
        assert!(matches!(
            Buyer::parse("ana@example.com", "   "),
            Err(CheckoutError::InvalidBuyer(_))
        ));
    }

    #[test]
    fn test_user_messages_follow_flow_language() {
        let err = CheckoutError::InvalidBuyer("empty".to_string());
        assert_eq!(
            err.user_message(CheckoutFlow::Product),
            "Por favor preencha todos os campos"
        );
        assert_eq!(
            err.user_message(CheckoutFlow::SpecialOffer),
            "Por favor completa todos los campos"
        );

        let err = CheckoutError::Stripe(StripeError::Request("timeout".to_string()));
        assert_eq!(
            err.user_message(CheckoutFlow::SpecialOffer),
            "No fue posible crear la sesión de pago"
        );
        assert!(!err.is_client_error());
    }
}
