//! Exit-intent guard for the checkout page.
//!
//! While a buyer is on a checkout page, the first press of the browser back
//! button is taken as intent to abandon. Instead of leaving, the buyer is
//! sent to the retention offer at [`OFFER_PATH`], with the checkout page
//! carried along as the `returnUrl` query parameter. The offer is shown once
//! per checkout view; every later back press behaves normally.
//!
//! ```text
//!            mount                 back (first)
//!   ───────────────▶ Armed ─────────────────────▶ Disarmed ◀──┐
//!                     │   push entry, navigate      │        │ back
//!                     │   to offer view             └────────┘ (no-op)
//! ```
//!
//! The guard never touches a real browser. Side effects go through
//! [`NavigationHistory`], which the storefront implements with a command
//! buffer ([`NavigationCommands`]) replayed by the page script, and which
//! tests implement with an in-memory history stack.

mod commands;
mod return_path;

pub use commands::{NavigationCommand, NavigationCommands};
pub use return_path::{ReturnPath, ReturnPathError};

use crate::GuardState;

/// Route of the retention offer view.
pub const OFFER_PATH: &str = "/oferta-especial";

/// Query parameter carrying the return destination to the offer view.
pub const RETURN_URL_PARAM: &str = "returnUrl";

/// The environment has no usable history API.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("history API unavailable")]
pub struct HistoryUnavailable;

/// Browser history operations the guard needs.
pub trait NavigationHistory {
    /// Push a synthetic copy of the current entry so the next back press is
    /// observable instead of leaving the page.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryUnavailable`] when the environment can't manipulate
    /// history. The guard treats that as "do nothing".
    fn push_entry(&mut self) -> Result<(), HistoryUnavailable>;

    /// Navigate to `destination`.
    fn navigate(&mut self, destination: &str);

    /// Navigate to `destination` in place of the current entry, so that back
    /// skips the page being left.
    fn replace(&mut self, destination: &str);
}

/// What happened to a back-navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackOutcome {
    /// Default navigation was replaced by a redirect to the offer view.
    Intercepted {
        /// The offer URL navigated to.
        destination: String,
    },
    /// The guard stayed out of the way.
    Proceed,
}

impl BackOutcome {
    #[must_use]
    pub const fn is_intercepted(&self) -> bool {
        matches!(self, Self::Intercepted { .. })
    }
}

/// Build the offer view URL for a return destination.
///
/// ```
/// use second_chance_core::exit_intent::{offer_url, ReturnPath};
///
/// let to = ReturnPath::parse("/checkout/widget-42").unwrap();
/// assert_eq!(offer_url(&to), "/oferta-especial?returnUrl=%2Fcheckout%2Fwidget-42");
/// ```
#[must_use]
pub fn offer_url(return_to: &ReturnPath) -> String {
    format!(
        "{OFFER_PATH}?{RETURN_URL_PARAM}={}",
        urlencoding::encode(return_to.as_str())
    )
}

/// Per-view guard state machine.
///
/// One instance belongs to exactly one mounted checkout view. There is no
/// shared or global state: a fresh mount is always [`GuardState::Armed`]
/// unless the caller explicitly resumes it otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitIntentGuard {
    state: GuardState,
    return_to: ReturnPath,
    listening: bool,
}

impl ExitIntentGuard {
    /// Guard for a freshly mounted checkout view.
    #[must_use]
    pub const fn mount(return_to: ReturnPath) -> Self {
        Self::resume(return_to, GuardState::Armed)
    }

    /// Guard for a view mounted with an explicit prior state, e.g. a checkout
    /// whose offer was already shown earlier in the same attempt.
    #[must_use]
    pub const fn resume(return_to: ReturnPath, state: GuardState) -> Self {
        Self {
            state,
            return_to,
            listening: false,
        }
    }

    /// Activate the guard: push the synthetic entry that makes the next back
    /// press observable.
    ///
    /// Returns `true` if the guard is now listening. A disarmed guard has
    /// nothing to intercept and doesn't touch history; a missing history API
    /// leaves the guard inert.
    pub fn arm<H: NavigationHistory + ?Sized>(&mut self, history: &mut H) -> bool {
        if !self.state.is_armed() {
            return false;
        }
        self.listening = history.push_entry().is_ok();
        self.listening
    }

    /// Handle one observed back-navigation.
    pub fn on_back<H: NavigationHistory + ?Sized>(&mut self, history: &mut H) -> BackOutcome {
        if !self.listening || !self.state.is_armed() {
            return BackOutcome::Proceed;
        }

        self.state = GuardState::Disarmed;
        // Keeps the offer page from being popped by the same back press.
        history.push_entry().ok();

        let destination = offer_url(&self.return_to);
        history.navigate(&destination);
        BackOutcome::Intercepted { destination }
    }

    /// Tear down: stop observing navigation. Idempotent.
    pub const fn release(&mut self) {
        self.listening = false;
    }

    #[must_use]
    pub const fn state(&self) -> GuardState {
        self.state
    }

    #[must_use]
    pub const fn is_listening(&self) -> bool {
        self.listening
    }

    #[must_use]
    pub const fn return_to(&self) -> &ReturnPath {
        &self.return_to
    }
}

/// The retention offer view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitOffer {
    return_to: ReturnPath,
}

impl ExitOffer {
    /// Build the view from its `returnUrl` query value. Missing or unsafe
    /// values send the buyer to the site root on accept.
    #[must_use]
    pub fn from_query(return_url: Option<&str>) -> Self {
        Self {
            return_to: ReturnPath::parse_or_root(return_url),
        }
    }

    #[must_use]
    pub const fn return_to(&self) -> &ReturnPath {
        &self.return_to
    }

    /// The buyer accepted the offer: resume the original flow.
    ///
    /// The offer page is replaced rather than stacked, so back from the
    /// resumed checkout never lands on the offer again.
    pub fn accept<H: NavigationHistory + ?Sized>(&self, history: &mut H) -> &ReturnPath {
        history.replace(self.return_to.as_str());
        &self.return_to
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    /// In-memory browser history: a stack of URLs and a cursor.
    struct FakeBrowser {
        entries: Vec<String>,
        cursor: usize,
        history_api: bool,
        navigations: Vec<String>,
    }

    impl FakeBrowser {
        fn at(url: &str) -> Self {
            Self {
                entries: vec!["/".to_owned(), url.to_owned()],
                cursor: 1,
                history_api: true,
                navigations: Vec::new(),
            }
        }

        fn without_history_api(url: &str) -> Self {
            Self {
                history_api: false,
                ..Self::at(url)
            }
        }

        fn current(&self) -> &str {
            &self.entries[self.cursor]
        }

        /// Pop one entry, as the back button does.
        fn back(&mut self) {
            self.cursor = self.cursor.saturating_sub(1);
        }

        fn push(&mut self, url: String) {
            self.entries.truncate(self.cursor + 1);
            self.entries.push(url);
            self.cursor += 1;
        }
    }

    impl NavigationHistory for FakeBrowser {
        fn push_entry(&mut self) -> Result<(), HistoryUnavailable> {
            if !self.history_api {
                return Err(HistoryUnavailable);
            }
            let current = self.current().to_owned();
            self.push(current);
            Ok(())
        }

        fn navigate(&mut self, destination: &str) {
            self.navigations.push(destination.to_owned());
            self.push(destination.to_owned());
        }

        fn replace(&mut self, destination: &str) {
            self.navigations.push(destination.to_owned());
            self.entries.truncate(self.cursor + 1);
            self.entries[self.cursor] = destination.to_owned();
        }
    }

    fn widget_path() -> ReturnPath {
        ReturnPath::parse("/checkout/widget-42").unwrap()
    }

    #[test]
    fn test_arm_pushes_synthetic_entry() {
        let mut browser = FakeBrowser::at("/checkout/widget-42");
        let mut guard = ExitIntentGuard::mount(widget_path());

        assert!(guard.arm(&mut browser));
        assert_eq!(browser.entries.len(), 3);
        assert_eq!(browser.current(), "/checkout/widget-42");
    }

    #[test]
    fn test_first_back_redirects_once_and_disarms() {
        let mut browser = FakeBrowser::at("/checkout/widget-42");
        let mut guard = ExitIntentGuard::mount(widget_path());
        guard.arm(&mut browser);

        browser.back();
        let outcome = guard.on_back(&mut browser);

        assert!(outcome.is_intercepted());
        assert_eq!(guard.state(), GuardState::Disarmed);
        assert_eq!(browser.navigations.len(), 1);
        assert_eq!(
            browser.current(),
            "/oferta-especial?returnUrl=%2Fcheckout%2Fwidget-42"
        );
        // The re-armed entry sits right below the offer page.
        assert_eq!(browser.entries[browser.cursor - 1], "/checkout/widget-42");
    }

    #[test]
    fn test_disarmed_back_is_untouched() {
        let mut browser = FakeBrowser::at("/checkout/widget-42");
        let mut guard = ExitIntentGuard::mount(widget_path());
        guard.arm(&mut browser);
        browser.back();
        guard.on_back(&mut browser);

        let before = browser.entries.clone();
        browser.back();
        assert_eq!(guard.on_back(&mut browser), BackOutcome::Proceed);
        assert_eq!(guard.state(), GuardState::Disarmed);
        assert_eq!(browser.navigations.len(), 1);
        assert_eq!(browser.entries, before);
    }

    #[test]
    fn test_new_mount_is_armed_regardless_of_others() {
        let mut browser = FakeBrowser::at("/checkout/widget-42");
        let mut first = ExitIntentGuard::mount(widget_path());
        first.arm(&mut browser);
        browser.back();
        first.on_back(&mut browser);
        assert_eq!(first.state(), GuardState::Disarmed);

        let second = ExitIntentGuard::mount(widget_path());
        assert_eq!(second.state(), GuardState::Armed);
    }

    #[test]
    fn test_missing_history_api_degrades_to_noop() {
        let mut browser = FakeBrowser::without_history_api("/checkout/widget-42");
        let mut guard = ExitIntentGuard::mount(widget_path());

        assert!(!guard.arm(&mut browser));
        browser.back();
        assert_eq!(guard.on_back(&mut browser), BackOutcome::Proceed);
        assert!(browser.navigations.is_empty());
        assert_eq!(browser.current(), "/");
    }

    #[test]
    fn test_released_guard_never_intercepts() {
        let mut browser = FakeBrowser::at("/checkout/widget-42");
        let mut guard = ExitIntentGuard::mount(widget_path());
        guard.arm(&mut browser);
        guard.release();

        browser.back();
        assert_eq!(guard.on_back(&mut browser), BackOutcome::Proceed);
        assert_eq!(guard.state(), GuardState::Armed);
        assert!(browser.navigations.is_empty());
    }

    #[test]
    fn test_back_before_arm_is_ignored() {
        let mut browser = FakeBrowser::at("/checkout/widget-42");
        let mut guard = ExitIntentGuard::mount(widget_path());
        assert_eq!(guard.on_back(&mut browser), BackOutcome::Proceed);
    }

    #[test]
    fn test_offer_accept_navigates_to_exact_return_path() {
        let mut browser = FakeBrowser::at("/oferta-especial?returnUrl=%2Fcheckout%2Fwidget-42");
        let offer = ExitOffer::from_query(Some("/checkout/widget-42"));

        offer.accept(&mut browser);
        assert_eq!(browser.current(), "/checkout/widget-42");
        assert_eq!(browser.entries, ["/", "/checkout/widget-42"]);
    }

    #[test]
    fn test_offer_with_hostile_return_url_goes_home() {
        let mut browser = FakeBrowser::at("/oferta-especial");
        let offer = ExitOffer::from_query(Some("https://evil.example/phish"));

        offer.accept(&mut browser);
        assert_eq!(browser.current(), "/");
    }

    #[test]
    fn test_full_abandon_accept_abandon_scenario() {
        // Open the checkout page.
        let mut browser = FakeBrowser::at("/checkout/widget-42");
        let mut guard = ExitIntentGuard::mount(widget_path());
        guard.arm(&mut browser);

        // Back once: routed to the offer.
        browser.back();
        let outcome = guard.on_back(&mut browser);
        let BackOutcome::Intercepted { destination } = outcome else {
            panic!("first back press must be intercepted");
        };
        assert_eq!(
            destination,
            "/oferta-especial?returnUrl=%2Fcheckout%2Fwidget-42"
        );
        guard.release();

        // Accept: routed back to the checkout page.
        let query = destination.split_once('=').unwrap().1;
        let return_url = urlencoding::decode(query).unwrap();
        let offer = ExitOffer::from_query(Some(&return_url));
        offer.accept(&mut browser);
        assert_eq!(browser.current(), "/checkout/widget-42");

        // The resumed checkout carries the disarmed state explicitly.
        let mut resumed = ExitIntentGuard::resume(offer.return_to().clone(), guard.state());
        assert!(!resumed.arm(&mut browser));

        // Back again: default navigation, no second offer. The offer entry
        // was replaced, so nothing below leads back to it.
        browser.back();
        assert_eq!(resumed.on_back(&mut browser), BackOutcome::Proceed);
        while browser.cursor > 0 {
            assert!(!browser.current().starts_with(OFFER_PATH));
            browser.back();
        }
        assert_eq!(browser.current(), "/");
        assert_eq!(browser.navigations.len(), 2);
    }
}
