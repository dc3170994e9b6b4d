//! Admin product CRUD.
//!
//! Creating a product registers it with Stripe first so that the first
//! checkout doesn't have to. Updates leave Stripe alone; a changed price gets
//! a fresh Stripe price on the next checkout.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use tracing::{error, info, instrument, warn};

use second_chance_core::{CurrencyCode, ProductId};

use crate::db::{ProductInput, ProductRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::RequireAdmin;
use crate::routes::with_message;
use crate::state::AppState;

use super::DASHBOARD_PATH;

const SAVE_FAILED: &str = "Error al guardar el producto";

/// Create/edit form template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/product_form.html")]
pub struct ProductFormTemplate {
    /// `None` when creating.
    pub product_id: Option<String>,
    pub form: ProductInput,
    pub currencies: Vec<&'static str>,
    pub success_message: Option<String>,
    pub error_message: Option<String>,
}

impl ProductFormTemplate {
    fn new(product_id: Option<ProductId>, form: ProductInput, error_message: Option<String>) -> Self {
        Self {
            product_id: product_id.map(|id| id.to_string()),
            form,
            currencies: CurrencyCode::ALL.iter().map(CurrencyCode::code).collect(),
            success_message: None,
            error_message,
        }
    }

    /// Form action URL.
    #[must_use]
    pub fn action(&self) -> String {
        match &self.product_id {
            Some(id) => format!("/admin/products/{id}"),
            None => "/admin/products".to_string(),
        }
    }
}

fn parse_product_id(id: &str) -> Result<ProductId> {
    id.parse()
        .map_err(|_| AppError::NotFound(format!("product {id}")))
}

fn invalid_form(product_id: Option<ProductId>, form: ProductInput, message: String) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        ProductFormTemplate::new(product_id, form, Some(message)),
    )
        .into_response()
}

fn saved(message: &str) -> Response {
    Redirect::to(&with_message(DASHBOARD_PATH, "success", message)).into_response()
}

fn save_failed() -> Response {
    Redirect::to(&with_message(DASHBOARD_PATH, "error", SAVE_FAILED)).into_response()
}

/// GET /admin/products/new
pub async fn new_form(RequireAdmin(_admin): RequireAdmin) -> ProductFormTemplate {
    let form = ProductInput {
        currency: CurrencyCode::default().code().to_string(),
        ..ProductInput::default()
    };
    ProductFormTemplate::new(None, form, None)
}

/// GET /admin/products/{id}/edit
#[instrument(skip(state, _admin))]
pub async fn edit_form(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ProductFormTemplate> {
    let id = parse_product_id(&id)?;
    let product = ProductRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;

    Ok(ProductFormTemplate::new(
        Some(id),
        ProductInput::from(&product),
        None,
    ))
}

/// Register with Stripe, then store.
///
/// POST /admin/products
#[instrument(skip(state, _admin, form), fields(name = %form.name))]
pub async fn create(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Form(form): Form<ProductInput>,
) -> Response {
    let product = match form.validate() {
        Ok(product) => product,
        Err(e) => return invalid_form(None, form, e.to_string()),
    };

    let (stripe_product_id, stripe_price_id) = match state
        .checkout()
        .register_product(
            &product.name,
            product.description.as_deref(),
            product.image_url.as_deref(),
            &product.price,
        )
        .await
    {
        Ok(ids) => ids,
        Err(e) => {
            let event_id = sentry::capture_error(&e);
            error!(error = %e, sentry_event_id = %event_id, "Stripe product registration failed");
            return save_failed();
        }
    };

    match ProductRepository::new(state.pool())
        .create(&product, Some(&stripe_product_id), Some(&stripe_price_id))
        .await
    {
        Ok(created) => {
            info!(product_id = %created.id, slug = %created.slug, "Product created");
            saved("Producto creado")
        }
        Err(RepositoryError::Conflict(_)) => {
            invalid_form(None, form, "Ya existe un producto con ese slug".to_string())
        }
        Err(e) => {
            error!(error = %e, "Failed to insert product");
            save_failed()
        }
    }
}

/// POST /admin/products/{id}
#[instrument(skip(state, _admin, form))]
pub async fn update(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Form(form): Form<ProductInput>,
) -> Result<Response> {
    let id = parse_product_id(&id)?;
    let product = match form.validate() {
        Ok(product) => product,
        Err(e) => return Ok(invalid_form(Some(id), form, e.to_string())),
    };

    Ok(match ProductRepository::new(state.pool()).update(id, &product).await {
        Ok(updated) => {
            info!(product_id = %updated.id, "Product updated");
            saved("Producto actualizado")
        }
        Err(RepositoryError::Conflict(_)) => {
            invalid_form(Some(id), form, "Ya existe un producto con ese slug".to_string())
        }
        Err(RepositoryError::NotFound) => return Err(AppError::NotFound(format!("product {id}"))),
        Err(e) => {
            error!(error = %e, "Failed to update product");
            save_failed()
        }
    })
}

/// Deactivate a product. Its orders keep pointing at it.
///
/// POST /admin/products/{id}/delete
#[instrument(skip(state, _admin))]
pub async fn delete(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Redirect> {
    let id = parse_product_id(&id)?;
    let target = match ProductRepository::new(state.pool()).deactivate(id).await {
        Ok(()) => {
            info!(product_id = %id, "Product deactivated");
            with_message(DASHBOARD_PATH, "success", "Producto eliminado")
        }
        Err(e) => {
            warn!(error = %e, product_id = %id, "Failed to deactivate product");
            with_message(DASHBOARD_PATH, "error", "Error al eliminar el producto")
        }
    };
    Ok(Redirect::to(&target))
}
