//! Admin login and logout.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use crate::error::Result;
use crate::filters;
use crate::middleware::{clear_admin, set_admin};
use crate::middleware::auth::LOGIN_PATH;
use crate::routes::MessageParams;
use crate::services::admin_auth::verify_password;
use crate::state::AppState;

use super::DASHBOARD_PATH;

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/login.html")]
pub struct LoginTemplate {
    pub success_message: Option<String>,
    pub error_message: Option<String>,
}

/// Login form. Not `Debug`: it holds the raw password.
#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub password: String,
}

/// GET /admin/login
pub async fn login_page(Query(params): Query<MessageParams>) -> LoginTemplate {
    LoginTemplate {
        success_message: params.success,
        error_message: params.error,
    }
}

/// Verify the password and start an admin session.
///
/// POST /admin/login
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    if form.password.is_empty()
        || verify_password(&form.password, &state.config().admin.password_hash).is_err()
    {
        warn!("Admin login failed");
        let page = LoginTemplate {
            success_message: None,
            error_message: Some("Contraseña incorrecta".to_string()),
        };
        return Ok((StatusCode::UNAUTHORIZED, page).into_response());
    }

    set_admin(&session).await?;
    info!("Admin logged in");
    Ok(Redirect::to(DASHBOARD_PATH).into_response())
}

/// POST /admin/logout
pub async fn logout(session: Session) -> Redirect {
    if let Err(e) = clear_admin(&session).await {
        warn!(error = %e, "Failed to clear admin session");
    }
    Redirect::to(LOGIN_PATH)
}
