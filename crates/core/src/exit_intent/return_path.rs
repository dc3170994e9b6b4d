//! Same-origin return destination carried through the offer view.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::Slug;

/// Errors that can occur when parsing a [`ReturnPath`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ReturnPathError {
    #[error("return path must start with '/'")]
    NotAbsolutePath,
    #[error("return path must stay on this site")]
    OffSite,
    #[error("return path must be at most {max} characters")]
    TooLong { max: usize },
}

/// A path on this site the offer view may send the visitor back to.
///
/// Only origin-relative paths are accepted: anything that a browser could
/// resolve to another host (`https://…`, `//host`, `/\host`) is rejected so
/// the `returnUrl` parameter can't be used as an open redirect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct ReturnPath(String);

impl ReturnPath {
    /// Maximum accepted length.
    pub const MAX_LENGTH: usize = 2048;

    /// Parse a return path.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not an origin-relative path.
    pub fn parse(s: &str) -> Result<Self, ReturnPathError> {
        if s.len() > Self::MAX_LENGTH {
            return Err(ReturnPathError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if !s.starts_with('/') {
            return Err(ReturnPathError::NotAbsolutePath);
        }
        if s.starts_with("//") || s.contains('\\') || s.chars().any(char::is_control) {
            return Err(ReturnPathError::OffSite);
        }
        Ok(Self(s.to_owned()))
    }

    /// Parse an optional query value, falling back to the site root when it
    /// is missing or unsafe.
    #[must_use]
    pub fn parse_or_root(s: Option<&str>) -> Self {
        s.and_then(|s| Self::parse(s).ok()).unwrap_or_else(Self::root)
    }

    /// The site root, `/`.
    #[must_use]
    pub fn root() -> Self {
        Self("/".to_owned())
    }

    /// The checkout page of a product.
    #[must_use]
    pub fn checkout(slug: &Slug) -> Self {
        Self(slug.checkout_path())
    }

    /// Returns `true` if this path points at a checkout page.
    #[must_use]
    pub fn is_checkout(&self) -> bool {
        self.0.starts_with("/checkout/")
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReturnPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ReturnPath {
    type Error = ReturnPathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ReturnPath> for String {
    fn from(path: ReturnPath) -> Self {
        path.0
    }
}
