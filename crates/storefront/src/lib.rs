//! Second Chance storefront library.
//!
//! Product listing, Stripe checkout with an exit-intent back-button guard,
//! the retention offer it falls back to, and the admin panel. The binary in
//! `main.rs` wires configuration, the database and the session store into
//! [`app`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use std::time::Duration;

use axum::{
    Router,
    extract::State,
    http::{HeaderValue, StatusCode, header},
    routing::get,
};
use tower::ServiceBuilder;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tower_sessions::{SessionManagerLayer, SessionStore};
use tracing::Span;

use crate::state::AppState;

/// Static assets, relative to the workspace root.
pub const STATIC_DIR: &str = "crates/storefront/static";

/// Asset URLs carry a content hash, so they never change.
const STATIC_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Build the full application router.
///
/// Sentry layers are added by the binary on top of this.
pub fn app<S>(state: AppState, session_layer: SessionManagerLayer<S>) -> Router
where
    S: SessionStore + Clone,
{
    let static_files = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            HeaderValue::from_static(STATIC_CACHE_CONTROL),
        ))
        .service(ServeDir::new(STATIC_DIR));

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes::routes())
        .nest_service("/static", static_files)
        .fallback(routes::not_found)
        .layer(axum::middleware::from_fn(
            middleware::security_headers_middleware,
        ))
        .layer(session_layer)
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: Duration, span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use second_chance_core::{GuardState, Slug};
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;
    use tower_sessions::session::Id;
    use tower_sessions::{MemoryStore, Session};

    use crate::config::tests::test_config;
    use crate::routes::checkout::mount_view;

    /// State over a pool that never connects. Pages degrade without the
    /// database: the pixel lookup fails fast and is skipped.
    fn test_state() -> AppState {
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(50))
            .connect_lazy("postgres://127.0.0.1:1/unreachable")
            .unwrap();
        AppState::new(test_config(), pool)
    }

    fn app_with(state: AppState, store: MemoryStore) -> Router {
        let session_layer = middleware::create_session_layer(store, state.config());
        app(state, session_layer)
    }

    fn test_app() -> Router {
        app_with(test_state(), MemoryStore::default())
    }

    /// `name=value` of the session cookie set by `response`.
    fn session_cookie(response: &axum::response::Response) -> String {
        let set_cookie = response.headers()["set-cookie"].to_str().unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    /// The visitor session behind `cookie`, as a handler would see it.
    fn session_for(store: &MemoryStore, cookie: &str) -> Session {
        let id: Id = cookie.split_once('=').unwrap().1.parse().unwrap();
        Session::new(Some(id), Arc::new(store.clone()), None)
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = test_app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "ok");
    }

    #[tokio::test]
    async fn test_readiness_without_database() {
        let response = test_app()
            .oneshot(Request::get("/health/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found_page() {
        let response = test_app()
            .oneshot(Request::get("/no/such/page").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().contains_key("content-security-policy"));
        assert!(body_string(response).await.contains("404"));
    }

    #[tokio::test]
    async fn test_request_id_is_echoed() {
        let response = test_app()
            .oneshot(
                Request::get("/health")
                    .header("x-request-id", "edge-1234")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()["x-request-id"], "edge-1234");
    }

    #[tokio::test]
    async fn test_exit_offer_sanitizes_return_url() {
        let response = test_app()
            .oneshot(
                Request::get("/oferta-especial?returnUrl=https%3A%2F%2Fevil.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_string(response).await;
        assert!(body.contains(r#"name="returnUrl" value="/""#));
        assert!(!body.contains("evil.example"));
    }

    #[tokio::test]
    async fn test_exit_offer_accept_redirects_to_checkout() {
        let response = test_app()
            .oneshot(
                Request::post("/oferta-especial/accept")
                    .header("content-type", "application/x-www-form-urlencoded")
                    .body(Body::from("returnUrl=%2Fcheckout%2Fcurso-basico"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()["location"], "/checkout/curso-basico");
        assert!(response.headers().contains_key("set-cookie"));
    }

    #[tokio::test]
    async fn test_back_on_unknown_view_proceeds() {
        let id = second_chance_core::CheckoutViewId::new();
        let response = test_app()
            .oneshot(
                Request::post(format!("/checkout/views/{id}/back"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_string(response).await,
            r#"{"intercepted":false,"commands":[]}"#
        );
    }

    #[tokio::test]
    async fn test_back_with_malformed_view_id() {
        let response = test_app()
            .oneshot(
                Request::post("/checkout/views/not-a-uuid/back")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    /// Back, offer, back again, accept, back again, then a new attempt.
    ///
    /// Product lookup needs the database, so the checkout page's mount is
    /// driven through the same `mount_view` the page handler uses.
    #[tokio::test]
    async fn test_offer_is_shown_once_per_checkout_attempt() {
        let state = test_state();
        let store = MemoryStore::default();
        let app = app_with(state.clone(), store.clone());
        let slug = Slug::parse("widget-42").unwrap();

        // Open the checkout page.
        let fresh = Session::new(None, Arc::new(store.clone()), None);
        let view = mount_view(&state, &fresh, &slug).await;
        assert_eq!(view.state, GuardState::Armed);

        // Back once: sent to the offer.
        let response = app
            .clone()
            .oneshot(
                Request::post(format!("/checkout/views/{}/back", view.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = session_cookie(&response);
        assert_eq!(
            body_string(response).await,
            r#"{"intercepted":true,"commands":[{"op":"push_entry"},{"op":"navigate","to":"/oferta-especial?returnUrl=%2Fcheckout%2Fwidget-42"}]}"#
        );

        let response = app
            .clone()
            .oneshot(
                Request::get("/oferta-especial?returnUrl=%2Fcheckout%2Fwidget-42")
                    .header("cookie", &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains(r#"name="returnUrl" value="/checkout/widget-42""#));

        // Back from the offer reloads the checkout entry below it.
        let reloaded = mount_view(&state, &session_for(&store, &cookie), &slug).await;
        assert_eq!(reloaded.state, GuardState::Disarmed);
        assert!(reloaded.commands.is_empty());
        let response = app
            .clone()
            .oneshot(
                Request::post(format!("/checkout/views/{}/back", reloaded.id))
                    .header("cookie", &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            body_string(response).await,
            r#"{"intercepted":false,"commands":[]}"#
        );

        // Accept replaces the offer entry with the checkout.
        let response = app
            .clone()
            .oneshot(
                Request::post("/oferta-especial/accept")
                    .header("cookie", &cookie)
                    .header("accept", "application/json")
                    .header("content-type", "application/x-www-form-urlencoded")
                    .body(Body::from("returnUrl=%2Fcheckout%2Fwidget-42"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_string(response).await,
            r#"{"commands":[{"op":"replace","to":"/checkout/widget-42"}]}"#
        );

        let resumed = mount_view(&state, &session_for(&store, &cookie), &slug).await;
        assert_eq!(resumed.state, GuardState::Disarmed);
        assert!(!state.guards().back(resumed.id).await.intercepted);

        // Returning from Stripe ends the attempt.
        let response = app
            .clone()
            .oneshot(
                Request::get("/payment-canceled")
                    .header("cookie", &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let next = mount_view(&state, &session_for(&store, &cookie), &slug).await;
        assert_eq!(next.state, GuardState::Armed);
        assert!(state.guards().back(next.id).await.intercepted);
    }

    #[tokio::test]
    async fn test_admin_requires_login() {
        let response = test_app()
            .oneshot(Request::get("/admin").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()["location"], "/admin/login");
    }

    #[tokio::test]
    async fn test_admin_login_rejects_wrong_password() {
        let response = test_app()
            .oneshot(
                Request::post("/admin/login")
                    .header("content-type", "application/x-www-form-urlencoded")
                    .header("x-forwarded-for", "203.0.113.7")
                    .body(Body::from("password=wrong-password"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(body_string(response).await.contains("Contraseña incorrecta"));
    }
}
