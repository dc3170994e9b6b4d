//! Retention offer shown after an intercepted back-navigation, plus the
//! special offer checkout it advertises.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Json,
    extract::{Query, State},
    http::{HeaderMap, header},
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{info, instrument};

use second_chance_core::exit_intent::{ExitOffer, NavigationCommand, NavigationCommands};

use crate::config::SpecialOfferConfig;
use crate::error::{Result, add_breadcrumb};
use crate::filters;
use crate::middleware::mark_offer_shown;
use crate::routes::PageContext;
use crate::routes::checkout::{CheckoutForm, checkout_error_status};
use crate::services::analytics::{PixelEvent, events_json};
use crate::services::checkout::{Buyer, CheckoutFlow};
use crate::state::AppState;

/// Pixel content ID of the special offer.
pub const SPECIAL_OFFER_CONTENT_ID: &str = "special-offer";

/// Pixel content name of the special offer.
pub const SPECIAL_OFFER_CONTENT_NAME: &str = "Pay Second Chance";

/// Prices as rendered on the offer pages.
pub struct OfferPrices {
    pub compare_at: String,
    pub price: String,
    pub discount_percent: u32,
}

impl From<&SpecialOfferConfig> for OfferPrices {
    fn from(offer: &SpecialOfferConfig) -> Self {
        Self {
            compare_at: offer.compare_at.display(),
            price: offer.price.display(),
            discount_percent: offer.discount_percent(),
        }
    }
}

/// Exit offer page template.
#[derive(Template, WebTemplate)]
#[template(path = "exit_offer.html")]
pub struct ExitOfferTemplate {
    pub page: PageContext,
    pub offer: OfferPrices,
    /// Sanitized destination the accept button resumes.
    pub return_url: String,
}

/// Special offer checkout template.
#[derive(Template, WebTemplate)]
#[template(path = "special_offer.html")]
pub struct SpecialOfferTemplate {
    pub page: PageContext,
    pub offer: OfferPrices,
    pub submit_event: String,
    pub email: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct OfferQuery {
    #[serde(rename = "returnUrl")]
    pub return_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AcceptForm {
    #[serde(rename = "returnUrl")]
    pub return_url: Option<String>,
}

/// Render the retention offer.
///
/// GET /oferta-especial?returnUrl=
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Query(query): Query<OfferQuery>,
) -> ExitOfferTemplate {
    let offer = ExitOffer::from_query(query.return_url.as_deref());

    ExitOfferTemplate {
        page: PageContext::load(&state, &[], None).await,
        offer: OfferPrices::from(&state.config().special_offer),
        return_url: offer.return_to().to_string(),
    }
}

/// History commands answering a scripted accept.
#[derive(Debug, Serialize)]
pub struct AcceptResponse {
    pub commands: NavigationCommands,
}

fn wants_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("application/json"))
}

/// The buyer accepted: resume exactly where they came from.
///
/// The offer page script asks for JSON and replays the commands, replacing
/// the offer's history entry. A plain form post gets a 303 instead.
/// Returning to a checkout records the shown offer so the resumed view
/// mounts with its guard disarmed.
///
/// POST /oferta-especial/accept
#[instrument(skip(session, headers))]
pub async fn accept(
    session: Session,
    headers: HeaderMap,
    Form(form): Form<AcceptForm>,
) -> Result<Response> {
    let offer = ExitOffer::from_query(form.return_url.as_deref());

    let mut commands = NavigationCommands::new();
    let return_to = offer.accept(&mut commands).clone();
    if return_to.is_checkout() {
        mark_offer_shown(&session, &return_to).await?;
    }

    add_breadcrumb(
        "exit_intent",
        "Offer accepted",
        Some(&[("return_to", return_to.as_str())]),
    );
    info!(return_to = %return_to, "Exit offer accepted");

    if wants_json(&headers) {
        return Ok(Json(AcceptResponse { commands }).into_response());
    }

    let destination = commands
        .as_slice()
        .iter()
        .find_map(|c| match c {
            NavigationCommand::Navigate { to } | NavigationCommand::Replace { to } => {
                Some(to.as_str())
            }
            NavigationCommand::PushEntry => None,
        })
        .unwrap_or_else(|| return_to.as_str());
    Ok(Redirect::to(destination).into_response())
}

async fn render_special_offer(
    state: &AppState,
    form: CheckoutForm,
    toast: Option<String>,
) -> SpecialOfferTemplate {
    let offer = &state.config().special_offer;
    let submit_event = PixelEvent::initiate_checkout(
        SPECIAL_OFFER_CONTENT_ID,
        SPECIAL_OFFER_CONTENT_NAME,
        &offer.price,
    );

    SpecialOfferTemplate {
        page: PageContext::load(state, &[], toast).await,
        offer: OfferPrices::from(offer),
        submit_event: events_json(&[submit_event]),
        email: form.email,
        name: form.name,
    }
}

/// Render the special offer identity form.
///
/// GET /oferta-especial/checkout
#[instrument(skip(state))]
pub async fn checkout_form(State(state): State<AppState>) -> SpecialOfferTemplate {
    render_special_offer(&state, CheckoutForm::default(), None).await
}

/// Open a Stripe session for the special offer.
///
/// POST /oferta-especial/checkout
#[instrument(skip(state, form))]
pub async fn checkout_submit(
    State(state): State<AppState>,
    Form(form): Form<CheckoutForm>,
) -> Response {
    let result = match Buyer::parse(&form.email, &form.name) {
        Ok(buyer) => state.checkout().start_special_offer_checkout(&buyer).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(url) => {
            add_breadcrumb("checkout", "Special offer redirected to Stripe", None);
            Redirect::to(&url).into_response()
        }
        Err(e) => {
            let status = checkout_error_status(&e);
            let toast = e.user_message(CheckoutFlow::SpecialOffer).to_string();
            (status, render_special_offer(&state, form, Some(toast)).await).into_response()
        }
    }
}
