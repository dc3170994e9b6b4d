//! Session middleware configuration and the exit offer's per-attempt marker.

use tower_sessions::{Expiry, Session, SessionManagerLayer, SessionStore};

use second_chance_core::GuardState;
use second_chance_core::exit_intent::ReturnPath;

use crate::config::StorefrontConfig;
use crate::models::{OfferShown, session_keys};

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "sc_session";

/// Session expiry time in seconds (7 days).
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Create the session layer over `store`.
///
/// Production passes a `PostgresStore`; the router tests use `MemoryStore`.
#[must_use]
pub fn create_session_layer<S: SessionStore + Clone>(
    store: S,
    config: &StorefrontConfig,
) -> SessionManagerLayer<S> {
    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.is_secure())
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}

/// Remember that the retention offer was shown for the checkout at `path`.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn mark_offer_shown(
    session: &Session,
    path: &ReturnPath,
) -> Result<(), tower_sessions::session::Error> {
    session
        .insert(session_keys::OFFER_SHOWN, OfferShown { path: path.clone() })
        .await
}

/// Guard state for a checkout view being mounted at `path`.
///
/// Views of a checkout whose offer was already shown start disarmed. A
/// marker for another path belongs to an abandoned attempt and is dropped.
/// Session errors degrade to `Armed`.
pub async fn checkout_guard_state(session: &Session, path: &ReturnPath) -> GuardState {
    match session.get::<OfferShown>(session_keys::OFFER_SHOWN).await {
        Ok(Some(marker)) if marker.path == *path => GuardState::Disarmed,
        Ok(Some(_)) => {
            end_checkout_attempt(session).await;
            GuardState::Armed
        }
        Ok(None) => GuardState::Armed,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read offer marker");
            GuardState::Armed
        }
    }
}

/// Forget the offer marker: the next checkout is a new attempt.
pub async fn end_checkout_attempt(session: &Session) {
    if let Err(e) = session
        .remove::<OfferShown>(session_keys::OFFER_SHOWN)
        .await
    {
        tracing::warn!(error = %e, "Failed to clear offer marker");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tower_sessions::MemoryStore;

    use super::*;
    use crate::services::exit_guard::GuardRegistry;

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    fn widget() -> ReturnPath {
        ReturnPath::parse("/checkout/widget-42").unwrap()
    }

    #[tokio::test]
    async fn test_marker_disarms_every_mount_of_the_attempt() {
        let session = session();
        mark_offer_shown(&session, &widget()).await.unwrap();

        assert_eq!(checkout_guard_state(&session, &widget()).await, GuardState::Disarmed);
        assert_eq!(checkout_guard_state(&session, &widget()).await, GuardState::Disarmed);
    }

    #[tokio::test]
    async fn test_other_checkout_starts_new_attempt() {
        let session = session();
        mark_offer_shown(&session, &widget()).await.unwrap();

        let other = ReturnPath::parse("/checkout/other-1").unwrap();
        assert_eq!(checkout_guard_state(&session, &other).await, GuardState::Armed);
        assert_eq!(checkout_guard_state(&session, &widget()).await, GuardState::Armed);
    }

    #[tokio::test]
    async fn test_ended_attempt_arms_again() {
        let session = session();
        mark_offer_shown(&session, &widget()).await.unwrap();
        end_checkout_attempt(&session).await;

        assert_eq!(checkout_guard_state(&session, &widget()).await, GuardState::Armed);
    }

    #[tokio::test]
    async fn test_no_marker_is_armed() {
        assert_eq!(checkout_guard_state(&session(), &widget()).await, GuardState::Armed);
    }

    /// Back from the offer page reloads the checkout entry pushed under it.
    /// That mount belongs to the same attempt and must not offer again.
    #[tokio::test]
    async fn test_checkout_reloaded_from_offer_is_not_offered_again() {
        let session = session();
        let registry = GuardRegistry::new(Duration::from_secs(60));

        let state = checkout_guard_state(&session, &widget()).await;
        let first = registry.mount(widget(), state).await;
        let back = registry.back(first.id).await;
        assert!(back.intercepted);
        mark_offer_shown(&session, &widget()).await.unwrap();
        registry.release(first.id).await;

        let state = checkout_guard_state(&session, &widget()).await;
        assert_eq!(state, GuardState::Disarmed);
        let second = registry.mount(widget(), state).await;
        assert!(second.commands.is_empty());
        assert!(!registry.back(second.id).await.intercepted);
    }
}
