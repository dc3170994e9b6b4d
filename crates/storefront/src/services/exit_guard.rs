//! Server-side registry of mounted checkout views and their exit-intent guards.
//!
//! Each checkout page render mounts one guard under a fresh random
//! [`CheckoutViewId`]. The page script reports back-navigation to
//! `POST /checkout/views/{id}/back` and replays the history commands it gets
//! back. `POST /checkout/views/{id}/release` is the teardown.
//!
//! Guards are held in a `moka` cache with a time-to-idle, so views whose
//! tab was closed without a release beacon expire on their own. An unknown
//! or expired view never intercepts.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use second_chance_core::exit_intent::{ExitIntentGuard, NavigationCommands, ReturnPath};
use second_chance_core::{CheckoutViewId, GuardState};

/// Upper bound on concurrently tracked checkout views.
const MAX_VIEWS: u64 = 100_000;

/// A freshly mounted checkout view.
#[derive(Debug, Clone)]
pub struct MountedView {
    pub id: CheckoutViewId,
    pub state: GuardState,
    /// Activation commands for the page to replay on load.
    pub commands: NavigationCommands,
}

/// Answer to a reported back-navigation.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BackResponse {
    pub intercepted: bool,
    pub commands: NavigationCommands,
    /// Checkout the offer was shown for, when intercepted.
    #[serde(skip)]
    pub offered_for: Option<ReturnPath>,
}

impl BackResponse {
    /// Let the browser navigate normally.
    #[must_use]
    pub const fn proceed() -> Self {
        Self {
            intercepted: false,
            commands: NavigationCommands::new(),
            offered_for: None,
        }
    }
}

/// Guards of all live checkout views.
#[derive(Clone)]
pub struct GuardRegistry {
    views: Cache<CheckoutViewId, Arc<Mutex<ExitIntentGuard>>>,
}

impl std::fmt::Debug for GuardRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardRegistry")
            .field("views", &self.views.entry_count())
            .finish()
    }
}

impl GuardRegistry {
    /// Create a registry whose views expire after `idle` without activity.
    #[must_use]
    pub fn new(idle: Duration) -> Self {
        let views = Cache::builder()
            .max_capacity(MAX_VIEWS)
            .time_to_idle(idle)
            .build();
        Self { views }
    }

    /// Mount a guard for a checkout view and arm it.
    ///
    /// `state` is [`GuardState::Armed`] unless the offer was already shown
    /// during this checkout attempt.
    #[instrument(skip(self))]
    pub async fn mount(&self, return_to: ReturnPath, state: GuardState) -> MountedView {
        let mut guard = ExitIntentGuard::resume(return_to, state);
        let mut commands = NavigationCommands::new();
        guard.arm(&mut commands);

        let id = CheckoutViewId::new();
        self.views.insert(id, Arc::new(Mutex::new(guard))).await;
        debug!(view_id = %id, "Checkout view mounted");

        MountedView {
            id,
            state,
            commands,
        }
    }

    /// Handle a back-navigation reported by view `id`.
    #[instrument(skip(self))]
    pub async fn back(&self, id: CheckoutViewId) -> BackResponse {
        let Some(entry) = self.views.get(&id).await else {
            debug!("Back from unknown view");
            return BackResponse::proceed();
        };

        let mut guard = entry.lock().await;
        let mut commands = NavigationCommands::new();
        let outcome = guard.on_back(&mut commands);
        let intercepted = outcome.is_intercepted();
        BackResponse {
            intercepted,
            commands,
            offered_for: intercepted.then(|| guard.return_to().clone()),
        }
    }

    /// Tear down view `id`. Returns `false` if it was already gone.
    #[instrument(skip(self))]
    pub async fn release(&self, id: CheckoutViewId) -> bool {
        match self.views.remove(&id).await {
            Some(entry) => {
                entry.lock().await.release();
                true
            }
            None => false,
        }
    }

    /// Current guard state of view `id`, if it is still mounted.
    #[cfg(test)]
    pub async fn state(&self, id: CheckoutViewId) -> Option<GuardState> {
        let entry = self.views.get(&id).await?;
        let state = entry.lock().await.state();
        Some(state)
    }
}
