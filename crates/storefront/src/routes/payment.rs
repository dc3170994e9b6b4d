//! Pages Stripe returns the buyer to.
//!
//! Both settle the order best-effort: any failure is logged and the buyer
//! still sees the page. Either one ends the checkout attempt, so the next
//! checkout shows the exit offer again.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Query, State};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{instrument, warn};

use second_chance_core::OrderId;

use crate::filters;
use crate::middleware::end_checkout_attempt;
use crate::routes::PageContext;
use crate::services::analytics::PixelEvent;
use crate::state::AppState;

#[derive(Template, WebTemplate)]
#[template(path = "payment_success.html")]
pub struct PaymentSuccessTemplate {
    pub page: PageContext,
}

#[derive(Template, WebTemplate)]
#[template(path = "payment_canceled.html")]
pub struct PaymentCanceledTemplate {
    pub page: PageContext,
}

#[derive(Debug, Deserialize)]
pub struct SuccessQuery {
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CanceledQuery {
    pub order_id: Option<String>,
}

/// GET /payment-success?session_id=
#[instrument(skip(state, session))]
pub async fn success(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<SuccessQuery>,
) -> PaymentSuccessTemplate {
    end_checkout_attempt(&session).await;

    if let Some(session_id) = query.session_id.as_deref().filter(|s| !s.is_empty())
        && let Err(e) = state.checkout().confirm_payment(session_id).await
    {
        warn!(error = %e, "Failed to confirm payment");
    }

    PaymentSuccessTemplate {
        page: PageContext::load(&state, &[PixelEvent::complete_payment()], None).await,
    }
}

/// GET /payment-canceled?order_id=
#[instrument(skip(state, session))]
pub async fn canceled(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<CanceledQuery>,
) -> PaymentCanceledTemplate {
    end_checkout_attempt(&session).await;

    if let Some(raw) = query.order_id.as_deref() {
        match raw.parse::<OrderId>() {
            Ok(order_id) => {
                if let Err(e) = state.checkout().cancel_order(order_id).await {
                    warn!(error = %e, "Failed to mark order failed");
                }
            }
            Err(_) => warn!(order_id = raw, "Ignoring malformed order id"),
        }
    }

    PaymentCanceledTemplate {
        page: PageContext::load(&state, &[], None).await,
    }
}
