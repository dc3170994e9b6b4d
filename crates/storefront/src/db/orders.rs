//! Order repository.
//!
//! Orders are written once at checkout start (`pending`) and then moved to
//! `paid` or `failed` when the buyer comes back from Stripe.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use second_chance_core::{
    CurrencyCode, CustomerName, Email, OrderId, OrderStatus, Price, ProductId,
};

use super::RepositoryError;

const ORDER_COLUMNS: &str = "o.id, o.product_id, o.customer_email, o.customer_name, o.amount, \
                             o.currency, o.status, o.stripe_session_id, o.special_offer, \
                             o.created_at, o.updated_at";

/// A checkout attempt.
#[derive(Debug, Clone)]
pub struct Order {
    pub id: OrderId,
    pub product_id: Option<ProductId>,
    pub customer_email: String,
    pub customer_name: String,
    pub amount: Price,
    pub status: OrderStatus,
    pub stripe_session_id: Option<String>,
    pub special_offer: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An order joined with the name of the product it was for.
#[derive(Debug, Clone)]
pub struct OrderSummary {
    pub order: Order,
    pub product_name: Option<String>,
}

/// A pending order about to be sent to Stripe.
#[derive(Debug, Clone)]
pub struct NewOrder<'a> {
    pub product_id: Option<ProductId>,
    pub customer_email: &'a Email,
    pub customer_name: &'a CustomerName,
    pub amount: Price,
    pub special_offer: bool,
}

/// Dashboard totals.
#[derive(Debug, Clone, Copy, Default)]
pub struct SalesStats {
    pub total_orders: i64,
    /// Sum of paid order amounts, across currencies.
    pub paid_total: Decimal,
}

#[derive(FromRow)]
struct OrderRow {
    id: Uuid,
    product_id: Option<Uuid>,
    customer_email: String,
    customer_name: String,
    amount: Decimal,
    currency: String,
    status: String,
    stripe_session_id: Option<String>,
    special_offer: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct OrderSummaryRow {
    #[sqlx(flatten)]
    order: OrderRow,
    product_name: Option<String>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let currency: CurrencyCode = row.currency.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid currency for order {}: {e}", row.id))
        })?;
        let status: OrderStatus = row.status.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("order {}: {e}", row.id))
        })?;

        Ok(Self {
            id: OrderId::from_uuid(row.id),
            product_id: row.product_id.map(ProductId::from_uuid),
            customer_email: row.customer_email,
            customer_name: row.customer_name,
            amount: Price::new(row.amount, currency),
            status,
            stripe_session_id: row.stripe_session_id,
            special_offer: row.special_offer,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a `pending` order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, order: &NewOrder<'_>) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "INSERT INTO orders AS o \
                 (id, product_id, customer_email, customer_name, amount, currency, status, \
                  special_offer) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(OrderId::new())
        .bind(order.product_id)
        .bind(order.customer_email.as_str())
        .bind(order.customer_name.as_str())
        .bind(order.amount.amount)
        .bind(order.amount.currency_code.code())
        .bind(OrderStatus::Pending.as_str())
        .bind(order.special_offer)
        .fetch_one(self.pool)
        .await?;

        Order::try_from(row)
    }

    /// Attach the Stripe Checkout session created for an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    pub async fn set_session_id(&self, id: OrderId, session_id: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE orders SET stripe_session_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(session_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Mark the order behind a Stripe session as paid.
    ///
    /// Returns the order ID, or `None` if no unpaid order has that session.
    /// Calling it again for the same session is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_paid_by_session(
        &self,
        session_id: &str,
    ) -> Result<Option<OrderId>, RepositoryError> {
        let id: Option<Uuid> = sqlx::query_scalar(
            "UPDATE orders SET status = $2, updated_at = NOW() \
             WHERE stripe_session_id = $1 AND status <> $2 \
             RETURNING id",
        )
        .bind(session_id)
        .bind(OrderStatus::Paid.as_str())
        .fetch_optional(self.pool)
        .await?;

        Ok(id.map(OrderId::from_uuid))
    }

    /// Mark an order as failed if it is still pending.
    ///
    /// Returns `true` if the status changed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_failed_if_pending(&self, id: OrderId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1 AND status = $3",
        )
        .bind(id)
        .bind(OrderStatus::Failed.as_str())
        .bind(OrderStatus::Pending.as_str())
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Newest orders with their product names (admin listing).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_recent(&self, limit: i64) -> Result<Vec<OrderSummary>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderSummaryRow>(&format!(
            "SELECT {ORDER_COLUMNS}, p.name AS product_name \
             FROM orders o LEFT JOIN products p ON p.id = o.product_id \
             ORDER BY o.created_at DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(OrderSummary {
                    order: Order::try_from(row.order)?,
                    product_name: row.product_name,
                })
            })
            .collect()
    }

    /// Total order count and paid revenue.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn stats(&self) -> Result<SalesStats, RepositoryError> {
        let (total_orders, paid_total): (i64, Decimal) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(amount) FILTER (WHERE status = $1), 0) FROM orders",
        )
        .bind(OrderStatus::Paid.as_str())
        .fetch_one(self.pool)
        .await?;

        Ok(SalesStats {
            total_orders,
            paid_total,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn row(status: &str) -> OrderRow {
        OrderRow {
            id: Uuid::new_v4(),
            product_id: None,
            customer_email: "ana@example.com".to_string(),
            customer_name: "Ana".to_string(),
            amount: Decimal::new(475, 2),
            currency: "EUR".to_string(),
            status: status.to_string(),
            stripe_session_id: Some("cs_test_123".to_string()),
            special_offer: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_row_conversion() {
        let order = Order::try_from(row("paid")).unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(order.amount.display(), "4,75 €");
        assert!(order.product_id.is_none());
    }

    #[test]
    fn test_unknown_status_is_corruption() {
        assert!(matches!(
            Order::try_from(row("refunded")),
            Err(RepositoryError::DataCorruption(_))
        ));
    }
}
