//! Recorded history operations for a browser to replay.

use serde::{Deserialize, Serialize};

use super::{HistoryUnavailable, NavigationHistory};

/// One history operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum NavigationCommand {
    /// `history.pushState` a synthetic copy of the current entry.
    PushEntry,
    /// Leave the current page for `to`.
    Navigate { to: String },
    /// Leave the current page for `to`, dropping its history entry.
    Replace { to: String },
}

/// A [`NavigationHistory`] that records operations instead of performing
/// them.
///
/// The server drives the guard against this buffer and ships the result to
/// the page as JSON (`[{"op":"push_entry"},{"op":"navigate","to":"…"}]`),
/// where `exit-intent.js` applies it to the real `window.history`. Recording
/// never fails; the page itself degrades to a no-op when the history API is
/// missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NavigationCommands(Vec<NavigationCommand>);

impl NavigationCommands {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub fn as_slice(&self) -> &[NavigationCommand] {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Serialize for embedding in a page attribute.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "[]".to_owned())
    }
}

impl NavigationHistory for NavigationCommands {
    fn push_entry(&mut self) -> Result<(), HistoryUnavailable> {
        self.0.push(NavigationCommand::PushEntry);
        Ok(())
    }

    fn navigate(&mut self, destination: &str) {
        self.0.push(NavigationCommand::Navigate {
            to: destination.to_owned(),
        });
    }

    fn replace(&mut self, destination: &str) {
        self.0.push(NavigationCommand::Replace {
            to: destination.to_owned(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_shape() {
        let mut commands = NavigationCommands::new();
        assert!(commands.push_entry().is_ok());
        commands.navigate("/oferta-especial?returnUrl=%2F");

        assert_eq!(
            commands.to_json(),
            r#"[{"op":"push_entry"},{"op":"navigate","to":"/oferta-especial?returnUrl=%2F"}]"#
        );
    }

    #[test]
    fn test_replace_json_shape() {
        let mut commands = NavigationCommands::new();
        commands.replace("/checkout/widget-42");

        assert_eq!(
            commands.to_json(),
            r#"[{"op":"replace","to":"/checkout/widget-42"}]"#
        );
    }

    #[test]
    fn test_empty_serializes_to_empty_array() {
        assert_eq!(NavigationCommands::new().to_json(), "[]");
        assert!(NavigationCommands::default().is_empty());
    }
}
