//! Admin dashboard: stats, products, orders and settings tabs.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Query, State};
use serde::Deserialize;
use tracing::instrument;

use second_chance_core::{CurrencyCode, Price};

use crate::db::settings::keys;
use crate::db::{OrderRepository, OrderSummary, Product, ProductRepository, SettingsRepository};
use crate::error::Result;
use crate::filters;
use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// Orders shown in the orders tab.
const RECENT_ORDERS_LIMIT: i64 = 100;

/// Dashboard tab.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    #[default]
    Products,
    Orders,
    Settings,
}

impl Tab {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Products => "products",
            Self::Orders => "orders",
            Self::Settings => "settings",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    #[serde(default)]
    pub tab: Tab,
    pub success: Option<String>,
    pub error: Option<String>,
}

/// Product row of the products table.
pub struct ProductRow {
    pub id: String,
    pub name: String,
    pub price: String,
    pub image_url: Option<String>,
    pub checkout_url: String,
    pub synced: bool,
}

impl ProductRow {
    fn new(product: &Product, base_url: &str) -> Self {
        Self {
            id: product.id.to_string(),
            name: product.name.clone(),
            price: product.price.display(),
            image_url: product.image_url.clone(),
            checkout_url: format!("{base_url}{}", product.checkout_path()),
            synced: product.stripe_price_id.is_some(),
        }
    }
}

/// Order row of the orders table.
pub struct OrderRow {
    pub customer_name: String,
    pub customer_email: String,
    pub product: String,
    pub amount: String,
    pub status: &'static str,
    pub status_class: &'static str,
    pub created_at: String,
}

impl From<OrderSummary> for OrderRow {
    fn from(summary: OrderSummary) -> Self {
        let OrderSummary {
            order,
            product_name,
        } = summary;
        let product = match product_name {
            Some(name) => name,
            None if order.special_offer => "Oferta especial".to_string(),
            None => "-".to_string(),
        };

        Self {
            customer_name: order.customer_name,
            customer_email: order.customer_email,
            product,
            amount: order.amount.display(),
            status: order.status.label(),
            status_class: order.status.as_str(),
            created_at: order.created_at.format("%d/%m/%Y %H:%M").to_string(),
        }
    }
}

/// Dashboard template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/dashboard.html")]
pub struct DashboardTemplate {
    pub tab: Tab,
    pub active_products: i64,
    pub total_orders: i64,
    pub paid_total: String,
    pub products: Vec<ProductRow>,
    pub orders: Vec<OrderRow>,
    pub pixel_id: String,
    pub success_message: Option<String>,
    pub error_message: Option<String>,
}

/// GET /admin
#[instrument(skip(state, _admin))]
pub async fn dashboard(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<DashboardTemplate> {
    let pool = state.pool();
    let product_repo = ProductRepository::new(pool);
    let order_repo = OrderRepository::new(pool);
    let settings_repo = SettingsRepository::new(pool);

    let (active_products, stats, products, orders, pixel_id) = tokio::try_join!(
        product_repo.count_active(),
        order_repo.stats(),
        product_repo.list_all(),
        order_repo.list_recent(RECENT_ORDERS_LIMIT),
        settings_repo.get(keys::TIKTOK_PIXEL_ID),
    )?;

    let base_url = state.config().base_url.as_str();
    Ok(DashboardTemplate {
        tab: query.tab,
        active_products,
        total_orders: stats.total_orders,
        paid_total: Price::new(stats.paid_total, CurrencyCode::EUR).display(),
        products: products
            .iter()
            .filter(|p| p.is_active)
            .map(|p| ProductRow::new(p, base_url))
            .collect(),
        orders: orders.into_iter().map(OrderRow::from).collect(),
        pixel_id: pixel_id.unwrap_or_default(),
        success_message: query.success,
        error_message: query.error,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::Uri;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use second_chance_core::{OrderId, OrderStatus};

    use crate::db::Order;

    fn summary(product_name: Option<&str>, special_offer: bool) -> OrderSummary {
        let created_at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap();
        OrderSummary {
            order: Order {
                id: OrderId::new(),
                product_id: None,
                customer_email: "ana@example.com".to_string(),
                customer_name: "Ana".to_string(),
                amount: Price::new(Decimal::new(475, 2), CurrencyCode::EUR),
                status: OrderStatus::Paid,
                stripe_session_id: None,
                special_offer,
                created_at,
                updated_at: created_at,
            },
            product_name: product_name.map(str::to_string),
        }
    }

    #[test]
    fn test_order_row_formats() {
        let row = OrderRow::from(summary(Some("Curso"), false));
        assert_eq!(row.product, "Curso");
        assert_eq!(row.amount, "4,75 €");
        assert_eq!(row.status, "Pagado");
        assert_eq!(row.status_class, "paid");
        assert_eq!(row.created_at, "09/03/2024 14:05");
    }

    #[test]
    fn test_special_offer_order_without_product() {
        assert_eq!(OrderRow::from(summary(None, true)).product, "Oferta especial");
        assert_eq!(OrderRow::from(summary(None, false)).product, "-");
    }

    #[test]
    fn test_tab_parses_lowercase() {
        let uri: Uri = "/admin?tab=orders".parse().unwrap();
        let Query(query) = Query::<DashboardQuery>::try_from_uri(&uri).unwrap();
        assert_eq!(query.tab, Tab::Orders);

        let uri: Uri = "/admin".parse().unwrap();
        let Query(query) = Query::<DashboardQuery>::try_from_uri(&uri).unwrap();
        assert_eq!(query.tab, Tab::Products);
    }
}
