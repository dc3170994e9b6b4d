//! Password-protected admin panel.
//!
//! # Route Structure
//!
//! ```text
//! GET  /admin/login                  - Login form
//! POST /admin/login                  - Verify the admin password
//! POST /admin/logout                 - Clear the admin session
//! GET  /admin                        - Dashboard (?tab=products|orders|settings)
//! GET  /admin/products/new           - New product form
//! POST /admin/products               - Create (Stripe product + price first)
//! GET  /admin/products/{id}/edit     - Edit form
//! POST /admin/products/{id}          - Update
//! POST /admin/products/{id}/delete   - Deactivate
//! POST /admin/settings               - Save the TikTok pixel ID
//! ```

pub mod auth;
pub mod dashboard;
pub mod products;
pub mod settings;

use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware::login_rate_limiter;
use crate::state::AppState;

/// Dashboard path, also the target of every admin redirect.
pub const DASHBOARD_PATH: &str = "/admin";

/// Build the admin router. Nested under `/admin`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard::dashboard))
        .route(
            "/login",
            get(auth::login_page).merge(post(auth::login).route_layer(login_rate_limiter())),
        )
        .route("/logout", post(auth::logout))
        .route("/products", post(products::create))
        .route("/products/new", get(products::new_form))
        .route("/products/{id}", post(products::update))
        .route("/products/{id}/edit", get(products::edit_form))
        .route("/products/{id}/delete", post(products::delete))
        .route("/settings", post(settings::save))
}
