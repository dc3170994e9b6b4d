//! Product listing.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;
use tracing::instrument;

use crate::db::{Product, ProductRepository};
use crate::error::Result;
use crate::filters;
use crate::routes::PageContext;
use crate::state::AppState;

/// Products shown on the home page.
const LISTING_LIMIT: i64 = 6;

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub page: PageContext,
    pub products: Vec<Product>,
}

/// Render the newest active products.
///
/// GET /
#[instrument(skip(state))]
pub async fn index(State(state): State<AppState>) -> Result<IndexTemplate> {
    let products = ProductRepository::new(state.pool())
        .list_active(LISTING_LIMIT)
        .await?;

    Ok(IndexTemplate {
        page: PageContext::load(&state, &[], None).await,
        products,
    })
}
