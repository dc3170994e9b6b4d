//! URL slug used in `/checkout/{slug}` links.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Slug`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug cannot be empty")]
    Empty,
    #[error("slug must be at most {max} characters")]
    TooLong { max: usize },
    #[error("slug may only contain lowercase letters, digits and single hyphens")]
    InvalidCharacters,
}

/// A product slug: lowercase ASCII letters, digits and single inner hyphens.
///
/// ```
/// use second_chance_core::Slug;
///
/// assert_eq!(Slug::from_name("Curso Básico: Edición 2").unwrap().as_str(), "curso-basico-edicion-2");
/// assert!(Slug::parse("widget-42").is_ok());
/// assert!(Slug::parse("Widget 42").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    /// Maximum length of a slug.
    pub const MAX_LENGTH: usize = 96;

    /// Validate an already-formed slug.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, too long, or not in canonical
    /// form.
    pub fn parse(s: &str) -> Result<Self, SlugError> {
        if s.is_empty() {
            return Err(SlugError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(SlugError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        let valid_chars = s
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !valid_chars || s.starts_with('-') || s.ends_with('-') || s.contains("--") {
            return Err(SlugError::InvalidCharacters);
        }
        Ok(Self(s.to_owned()))
    }

    /// Derive a slug from a product name.
    ///
    /// Common Spanish and Portuguese accents are folded to ASCII, every other
    /// run of non-alphanumeric characters becomes one hyphen.
    ///
    /// # Errors
    ///
    /// Returns `SlugError::Empty` if nothing usable remains.
    pub fn from_name(name: &str) -> Result<Self, SlugError> {
        let mut out = String::with_capacity(name.len());
        let mut pending_hyphen = false;

        for c in name.chars().flat_map(char::to_lowercase) {
            let folded = fold_accent(c);
            if folded.is_ascii_alphanumeric() {
                if pending_hyphen && !out.is_empty() {
                    out.push('-');
                }
                pending_hyphen = false;
                out.push(folded);
            } else {
                pending_hyphen = true;
            }
        }

        if out.len() > Self::MAX_LENGTH {
            out.truncate(Self::MAX_LENGTH);
            while out.ends_with('-') {
                out.pop();
            }
        }

        Self::parse(&out)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path of the checkout page for this slug.
    #[must_use]
    pub fn checkout_path(&self) -> String {
        format!("/checkout/{}", self.0)
    }
}

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        other => other,
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_folds_and_hyphenates() {
        let slug = Slug::from_name("  ¡Oferta Única!  Pack x3 ").unwrap();
        assert_eq!(slug.as_str(), "oferta-unica-pack-x3");
    }

    #[test]
    fn test_from_name_rejects_symbols_only() {
        assert_eq!(Slug::from_name("¡¿?!"), Err(SlugError::Empty));
    }

    #[test]
    fn test_from_name_truncates_without_trailing_hyphen() {
        let name = format!("{} b", "a".repeat(95));
        let slug = Slug::from_name(&name).unwrap();
        assert_eq!(slug.as_str().len(), 95);
        assert!(!slug.as_str().ends_with('-'));
    }

    #[test]
    fn test_parse_rejects_non_canonical() {
        assert_eq!(Slug::parse("-a"), Err(SlugError::InvalidCharacters));
        assert_eq!(Slug::parse("a--b"), Err(SlugError::InvalidCharacters));
        assert_eq!(Slug::parse("A"), Err(SlugError::InvalidCharacters));
        assert_eq!(Slug::parse(""), Err(SlugError::Empty));
    }

    #[test]
    fn test_checkout_path() {
        let slug = Slug::parse("widget-42").unwrap();
        assert_eq!(slug.checkout_path(), "/checkout/widget-42");
    }
}
