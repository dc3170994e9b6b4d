//! Buyer display name.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`CustomerName`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CustomerNameError {
    #[error("name cannot be empty")]
    Empty,
    #[error("name must be at most {max} characters")]
    TooLong { max: usize },
}

/// Full name typed into the checkout identity form.
///
/// Inner whitespace runs are collapsed so `"Ana   María"` and `"Ana María"`
/// are stored identically.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct CustomerName(String);

impl CustomerName {
    /// Maximum length in characters.
    pub const MAX_LENGTH: usize = 120;

    /// Parse and normalize a name.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is blank or longer than
    /// [`Self::MAX_LENGTH`] characters.
    pub fn parse(s: &str) -> Result<Self, CustomerNameError> {
        let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            return Err(CustomerNameError::Empty);
        }
        if collapsed.chars().count() > Self::MAX_LENGTH {
            return Err(CustomerNameError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        Ok(Self(collapsed))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CustomerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
