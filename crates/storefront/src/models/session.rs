//! Session-related types.
//!
//! Everything here is stored by `tower-sessions` as JSON in the session row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use second_chance_core::exit_intent::ReturnPath;

/// Marker for a logged-in admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminSession {
    pub logged_in_at: DateTime<Utc>,
}

impl AdminSession {
    #[must_use]
    pub fn now() -> Self {
        Self {
            logged_in_at: Utc::now(),
        }
    }
}

/// The retention offer was already shown for the checkout at `path`.
///
/// Set when a guard intercepts a back press and when the offer is accepted.
/// Every checkout view mounted at `path` while it is present starts with its
/// guard disarmed, including reloads of entries left in browser history. A
/// checkout for another path or a return from Stripe ends the attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferShown {
    pub path: ReturnPath,
}

/// Session keys.
pub mod keys {
    /// Key for the [`super::AdminSession`] marker.
    pub const ADMIN: &str = "admin";

    /// Key for the [`super::OfferShown`] marker.
    pub const OFFER_SHOWN: &str = "offer_shown";
}
