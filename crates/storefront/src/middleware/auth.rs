//! Authentication extractors for the admin panel.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::models::{AdminSession, session_keys};

/// Path of the admin login form.
pub const LOGIN_PATH: &str = "/admin/login";

/// Extractor that requires an admin session.
///
/// Requests without one are redirected to the login form.
///
/// # Example
///
/// ```rust,ignore
/// async fn dashboard(RequireAdmin(admin): RequireAdmin) -> impl IntoResponse {
///     format!("Logged in at {}", admin.logged_in_at)
/// }
/// ```
pub struct RequireAdmin(pub AdminSession);

/// Error returned when an admin session is required but missing.
pub enum AdminRejection {
    /// Redirect to the login page.
    RedirectToLogin,
    /// No session layer in the stack.
    NoSession,
}

impl IntoResponse for AdminRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to(LOGIN_PATH).into_response(),
            Self::NoSession => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AdminRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or(AdminRejection::NoSession)?;

        let admin: AdminSession = session
            .get(session_keys::ADMIN)
            .await
            .ok()
            .flatten()
            .ok_or(AdminRejection::RedirectToLogin)?;

        Ok(Self(admin))
    }
}

/// Mark the session as logged in, rotating its ID first.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_admin(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::ADMIN, AdminSession::now()).await
}

/// Log the admin out.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_admin(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.remove::<AdminSession>(session_keys::ADMIN).await?;
    Ok(())
}
