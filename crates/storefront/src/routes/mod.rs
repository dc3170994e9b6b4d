//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                             - Product listing
//! GET  /health, /health/ready        - Liveness / readiness
//!
//! # Checkout
//! GET  /checkout/{slug}              - Checkout view (mounts an exit-intent guard)
//! POST /checkout/{slug}              - Identity form -> Stripe redirect
//! POST /checkout/views/{id}/back     - Report a back-navigation
//! POST /checkout/views/{id}/release  - Tear the view's guard down
//!
//! # Exit offer
//! GET  /oferta-especial              - Retention offer (?returnUrl=)
//! POST /oferta-especial/accept       - Resume the checkout at returnUrl
//! GET  /oferta-especial/checkout     - Special offer checkout form
//! POST /oferta-especial/checkout     - Special offer -> Stripe redirect
//!
//! # Payment return
//! GET  /payment-success              - ?session_id=
//! GET  /payment-canceled             - ?order_id=
//!
//! # Admin (see `admin`)
//! /admin/...
//! ```

pub mod admin;
pub mod checkout;
pub mod exit_offer;
pub mod home;
pub mod payment;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Router,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;

use crate::filters;
use crate::middleware::checkout_rate_limiter;
use crate::services::analytics::{PixelEvent, events_json};
use crate::state::AppState;

/// Per-page data shared by every public template.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    /// TikTok pixel ID; the pixel script is only included when set.
    pub pixel_id: Option<String>,
    /// JSON list of [`PixelEvent`]s fired on load.
    pub pixel_events: String,
    /// Transient error toast.
    pub toast: Option<String>,
}

impl PageContext {
    /// Build the context, looking up the pixel ID.
    pub async fn load(state: &AppState, events: &[PixelEvent], toast: Option<String>) -> Self {
        Self {
            pixel_id: state.pixel().pixel_id(state.pool()).await,
            pixel_events: events_json(events),
            toast,
        }
    }
}

/// `?success=` / `?error=` messages carried across redirects.
#[derive(Debug, Default, Deserialize)]
pub struct MessageParams {
    pub success: Option<String>,
    pub error: Option<String>,
}

/// Append a `?success=` or `?error=` message to a redirect target.
#[must_use]
pub fn with_message(path: &str, key: &str, message: &str) -> String {
    let sep = if path.contains('?') { '&' } else { '?' };
    format!("{path}{sep}{key}={}", urlencoding::encode(message))
}

/// 404 page.
#[derive(Template, WebTemplate)]
#[template(path = "not_found.html")]
pub struct NotFoundTemplate {
    pub page: PageContext,
}

/// Fallback handler for unknown paths.
pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        NotFoundTemplate {
            page: PageContext::default(),
        },
    )
}

fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/checkout/{slug}",
            get(checkout::show).merge(post(checkout::submit).route_layer(checkout_rate_limiter())),
        )
        .route("/checkout/views/{id}/back", post(checkout::view_back))
        .route("/checkout/views/{id}/release", post(checkout::view_release))
}

fn exit_offer_routes() -> Router<AppState> {
    Router::new()
        .route("/oferta-especial", get(exit_offer::show))
        .route("/oferta-especial/accept", post(exit_offer::accept))
        .route(
            "/oferta-especial/checkout",
            get(exit_offer::checkout_form)
                .merge(post(exit_offer::checkout_submit).route_layer(checkout_rate_limiter())),
        )
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::index))
        .merge(checkout_routes())
        .merge(exit_offer_routes())
        .route("/payment-success", get(payment::success))
        .route("/payment-canceled", get(payment::canceled))
        .nest("/admin", admin::router())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_message_encodes() {
        assert_eq!(
            with_message("/admin", "success", "Producto creado"),
            "/admin?success=Producto%20creado"
        );
        assert_eq!(
            with_message("/admin?tab=orders", "error", "x&y"),
            "/admin?tab=orders&error=x%26y"
        );
    }
}
