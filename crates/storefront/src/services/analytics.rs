//! TikTok pixel beacon support.
//!
//! The pixel ID lives in the `settings` table and is cached for a minute so
//! page renders don't hit the database. Events are rendered into a
//! `data-pixel-events` attribute and fired by `static/js/pixel.js`; the
//! server never talks to TikTok.

use std::time::Duration;

use moka::future::Cache;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{debug, warn};

use second_chance_core::Price;

use crate::db::SettingsRepository;
use crate::db::settings::keys;

const PIXEL_ID_TTL: Duration = Duration::from_secs(60);

/// Cached lookup of the configured pixel ID.
#[derive(Clone)]
pub struct PixelSettings {
    cache: Cache<&'static str, Option<String>>,
}

impl Default for PixelSettings {
    fn default() -> Self {
        Self::new()
    }
}

impl PixelSettings {
    #[must_use]
    pub fn new() -> Self {
        let cache = Cache::builder()
            .max_capacity(keys::ALL.len() as u64)
            .time_to_live(PIXEL_ID_TTL)
            .build();
        Self { cache }
    }

    /// The configured pixel ID, or `None` when unset or unreadable.
    ///
    /// Lookup failures are logged and not cached; the page renders without
    /// the pixel.
    pub async fn pixel_id(&self, pool: &PgPool) -> Option<String> {
        if let Some(cached) = self.cache.get(keys::TIKTOK_PIXEL_ID).await {
            return cached;
        }

        match SettingsRepository::new(pool).get(keys::TIKTOK_PIXEL_ID).await {
            Ok(value) => {
                let value = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
                self.cache.insert(keys::TIKTOK_PIXEL_ID, value.clone()).await;
                value
            }
            Err(e) => {
                warn!(error = %e, "Failed to load pixel ID");
                None
            }
        }
    }

    /// Drop the cached value after the admin changes it.
    pub async fn invalidate(&self) {
        self.cache.invalidate(keys::TIKTOK_PIXEL_ID).await;
        debug!("Pixel ID cache invalidated");
    }
}

/// A `ttq.track` call.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PixelEvent {
    pub event: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<PixelProperties>,
}

/// Event payload in TikTok's `content_*` vocabulary.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PixelProperties {
    pub content_id: String,
    pub content_name: String,
    pub value: f64,
    pub currency: &'static str,
}

impl PixelEvent {
    /// Fired when a checkout form is submitted.
    #[must_use]
    pub fn initiate_checkout(content_id: &str, content_name: &str, price: &Price) -> Self {
        Self {
            event: "InitiateCheckout",
            properties: Some(PixelProperties {
                content_id: content_id.to_string(),
                content_name: content_name.to_string(),
                value: price.amount.to_f64().unwrap_or_default(),
                currency: price.currency_code.code(),
            }),
        }
    }

    /// Fired on the payment success page.
    #[must_use]
    pub const fn complete_payment() -> Self {
        Self {
            event: "CompletePayment",
            properties: None,
        }
    }
}

/// Serialize events for a `data-pixel-events` attribute.
#[must_use]
pub fn events_json(events: &[PixelEvent]) -> String {
    serde_json::to_string(events).unwrap_or_else(|_| "[]".to_string())
}
