//! Product checkout view and its exit-intent guard endpoints.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{debug, error, instrument, warn};

use second_chance_core::exit_intent::ReturnPath;
use second_chance_core::{CheckoutViewId, Slug};

use crate::db::{Product, ProductRepository};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::middleware::{checkout_guard_state, mark_offer_shown};
use crate::routes::PageContext;
use crate::services::analytics::{PixelEvent, events_json};
use crate::services::checkout::{Buyer, CheckoutError, CheckoutFlow};
use crate::services::exit_guard::{BackResponse, MountedView};
use crate::state::AppState;

/// Checkout page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout.html")]
pub struct CheckoutTemplate {
    pub page: PageContext,
    pub product: Product,
    pub view_id: String,
    /// History commands the page replays on load.
    pub guard_commands: String,
    /// `InitiateCheckout` event fired on submit.
    pub submit_event: String,
    pub email: String,
    pub name: String,
}

/// Shown when the slug doesn't match an active product.
#[derive(Template, WebTemplate)]
#[template(path = "product_not_found.html")]
pub struct ProductNotFoundTemplate {
    pub page: PageContext,
}

/// Identity form fields.
#[derive(Debug, Default, Deserialize)]
pub struct CheckoutForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
}

async fn load_product(state: &AppState, slug: &str) -> Result<Option<Product>> {
    let Ok(slug) = Slug::parse(slug) else {
        return Ok(None);
    };
    Ok(ProductRepository::new(state.pool())
        .get_active_by_slug(&slug)
        .await?)
}

async fn product_not_found(state: &AppState) -> Response {
    let page = PageContext::load(state, &[], None).await;
    (StatusCode::NOT_FOUND, ProductNotFoundTemplate { page }).into_response()
}

/// Mount a fresh checkout view at `slug`'s checkout page.
///
/// The guard starts disarmed when this session's buyer already saw the
/// offer for the same checkout.
pub(crate) async fn mount_view(state: &AppState, session: &Session, slug: &Slug) -> MountedView {
    let path = ReturnPath::checkout(slug);
    let guard_state = checkout_guard_state(session, &path).await;
    let view = state.guards().mount(path, guard_state).await;
    debug!(view_id = %view.id, guard_state = ?view.state, "Checkout guard mounted");
    view
}

/// Render the form for a mounted view.
async fn render_checkout(
    state: &AppState,
    product: Product,
    view: MountedView,
    form: CheckoutForm,
    toast: Option<String>,
) -> CheckoutTemplate {
    let submit_event = PixelEvent::initiate_checkout(
        &product.id.to_string(),
        &product.name,
        &product.price,
    );

    CheckoutTemplate {
        page: PageContext::load(state, &[], toast).await,
        view_id: view.id.to_string(),
        guard_commands: view.commands.to_json(),
        submit_event: events_json(&[submit_event]),
        email: form.email,
        name: form.name,
        product,
    }
}

/// Render the checkout view and mount its guard.
///
/// GET /checkout/{slug}
#[instrument(skip(state, session))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    Path(slug): Path<String>,
) -> Result<Response> {
    let Some(product) = load_product(&state, &slug).await? else {
        return Ok(product_not_found(&state).await);
    };

    let view = mount_view(&state, &session, &product.slug).await;
    let page = render_checkout(&state, product, view, CheckoutForm::default(), None).await;
    Ok(page.into_response())
}

/// Validate the identity form and redirect to Stripe.
///
/// POST /checkout/{slug}
#[instrument(skip(state, session, form))]
pub async fn submit(
    State(state): State<AppState>,
    session: Session,
    Path(slug): Path<String>,
    Form(form): Form<CheckoutForm>,
) -> Result<Response> {
    let Some(product) = load_product(&state, &slug).await? else {
        return Ok(product_not_found(&state).await);
    };

    let result = match Buyer::parse(&form.email, &form.name) {
        Ok(buyer) => state.checkout().start_product_checkout(&product, &buyer).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(url) => {
            add_breadcrumb("checkout", "Redirected to Stripe", Some(&[("slug", slug.as_str())]));
            Ok(Redirect::to(&url).into_response())
        }
        Err(e) => {
            let status = checkout_error_status(&e);
            let toast = e.user_message(CheckoutFlow::Product).to_string();
            let view = mount_view(&state, &session, &product.slug).await;
            let page = render_checkout(&state, product, view, form, Some(toast)).await;
            Ok((status, page).into_response())
        }
    }
}

/// Log a failed checkout and pick the status of the re-rendered form.
pub(crate) fn checkout_error_status(e: &CheckoutError) -> StatusCode {
    if e.is_client_error() {
        warn!(error = %e, "Checkout rejected");
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        let event_id = sentry::capture_error(e);
        error!(error = %e, sentry_event_id = %event_id, "Checkout failed");
        StatusCode::BAD_GATEWAY
    }
}

fn parse_view_id(id: &str) -> Result<CheckoutViewId> {
    id.parse()
        .map_err(|_| AppError::BadRequest("invalid view id".to_string()))
}

/// Report a back-navigation from a mounted view.
///
/// An intercept is remembered in the session, so the checkout entry the
/// guard pushed under the offer page mounts disarmed when back reloads it.
///
/// POST /checkout/views/{id}/back
#[instrument(skip(state, session))]
pub async fn view_back(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Json<BackResponse>> {
    let response = state.guards().back(parse_view_id(&id)?).await;
    if let Some(path) = &response.offered_for {
        add_breadcrumb("exit_intent", "Back intercepted", Some(&[("view_id", id.as_str())]));
        if let Err(e) = mark_offer_shown(&session, path).await {
            warn!(error = %e, "Failed to record shown offer");
        }
    }
    Ok(Json(response))
}

/// Tear a view's guard down.
///
/// POST /checkout/views/{id}/release
#[instrument(skip(state))]
pub async fn view_release(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.guards().release(parse_view_id(&id)?).await;
    Ok(StatusCode::NO_CONTENT)
}
