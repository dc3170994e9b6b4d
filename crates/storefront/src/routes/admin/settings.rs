//! Admin settings form.

use axum::{Form, extract::State, response::Redirect};
use serde::Deserialize;
use tracing::{error, info, instrument};

use crate::db::SettingsRepository;
use crate::db::settings::keys;
use crate::middleware::RequireAdmin;
use crate::routes::with_message;
use crate::state::AppState;

use super::DASHBOARD_PATH;

/// Longest pixel ID accepted.
const MAX_PIXEL_ID_LENGTH: usize = 64;

#[derive(Debug, Deserialize)]
pub struct SettingsForm {
    #[serde(default)]
    pub tiktok_pixel_id: String,
}

/// Pixel IDs are alphanumeric. Blank clears the pixel.
fn normalize_pixel_id(raw: &str) -> Option<String> {
    let id = raw.trim();
    (id.len() <= MAX_PIXEL_ID_LENGTH && id.chars().all(|c| c.is_ascii_alphanumeric()))
        .then(|| id.to_string())
}

/// POST /admin/settings
#[instrument(skip(state, _admin))]
pub async fn save(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Form(form): Form<SettingsForm>,
) -> Redirect {
    let back = format!("{DASHBOARD_PATH}?tab=settings");
    let Some(pixel_id) = normalize_pixel_id(&form.tiktok_pixel_id) else {
        return Redirect::to(&with_message(&back, "error", "ID del Pixel inválido"));
    };

    match SettingsRepository::new(state.pool())
        .set(keys::TIKTOK_PIXEL_ID, &pixel_id)
        .await
    {
        Ok(()) => {
            state.pixel().invalidate().await;
            info!(pixel_set = !pixel_id.is_empty(), "Settings saved");
            Redirect::to(&with_message(&back, "success", "Configuración guardada"))
        }
        Err(e) => {
            error!(error = %e, "Failed to save settings");
            Redirect::to(&with_message(
                &back,
                "error",
                "Error al guardar la configuración",
            ))
        }
    }
}
