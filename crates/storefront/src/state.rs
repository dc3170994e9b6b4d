//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::services::analytics::PixelSettings;
use crate::services::checkout::CheckoutService;
use crate::services::exit_guard::GuardRegistry;
use crate::services::stripe::StripeClient;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    stripe: StripeClient,
    guards: GuardRegistry,
    pixel: PixelSettings,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Self {
        let stripe = StripeClient::new(&config.stripe);
        let guards = GuardRegistry::new(config.exit_guard_idle);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                stripe,
                guards,
                pixel: PixelSettings::new(),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn stripe(&self) -> &StripeClient {
        &self.inner.stripe
    }

    /// Exit-intent guards of mounted checkout views.
    #[must_use]
    pub fn guards(&self) -> &GuardRegistry {
        &self.inner.guards
    }

    #[must_use]
    pub fn pixel(&self) -> &PixelSettings {
        &self.inner.pixel
    }

    /// Checkout service borrowing this state's pool, client and config.
    #[must_use]
    pub fn checkout(&self) -> CheckoutService<'_> {
        CheckoutService::new(self.pool(), self.stripe(), self.config())
    }
}
