//! URL slug type for products and categories.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when building a [`Slug`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SlugError {
    /// Nothing slug-worthy remained after normalization.
    #[error("slug cannot be empty")]
    Empty,
    /// The slug is longer than allowed.
    #[error("slug must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input is not in canonical slug form.
    #[error("slug must be lowercase letters, digits and single dashes")]
    NotCanonical,
}

/// A URL-safe identifier such as `organic-green-tea`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    /// Maximum length of a slug.
    pub const MAX_LENGTH: usize = 120;

    /// Derive a slug from a display name.
    ///
    /// Runs of ASCII letters and digits are lowercased and joined by single
    /// dashes; everything else is dropped.
    ///
    /// ```
    /// use emporium_core::Slug;
    ///
    /// let slug = Slug::from_name("  Café & Tea: Green!! ").unwrap();
    /// assert_eq!(slug.as_str(), "caf-tea-green");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `SlugError::Empty` if the name has no ASCII letters or digits,
    /// or `SlugError::TooLong` if the result exceeds the maximum length.
    pub fn from_name(name: &str) -> Result<Self, SlugError> {
        let mut slug = String::with_capacity(name.len());
        let mut pending_dash = false;

        for c in name.chars() {
            if c.is_ascii_alphanumeric() {
                if pending_dash && !slug.is_empty() {
                    slug.push('-');
                }
                pending_dash = false;
                slug.push(c.to_ascii_lowercase());
            } else {
                pending_dash = true;
            }
        }

        Self::check_len(&slug)?;
        Ok(Self(slug))
    }

    /// Validate a slug that is already in canonical form.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, too long, or not canonical.
    pub fn parse(s: &str) -> Result<Self, SlugError> {
        Self::check_len(s)?;

        let canonical = !s.starts_with('-')
            && !s.ends_with('-')
            && !s.contains("--")
            && s
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');

        if !canonical {
            return Err(SlugError::NotCanonical);
        }

        Ok(Self(s.to_owned()))
    }

    fn check_len(s: &str) -> Result<(), SlugError> {
        if s.is_empty() {
            return Err(SlugError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(SlugError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        Ok(())
    }

    /// Returns the slug as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `Slug` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
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
    fn test_from_name_basic() {
        assert_eq!(
            Slug::from_name("Organic Green Tea").unwrap().as_str(),
            "organic-green-tea"
        );
    }

    #[test]
    fn test_from_name_collapses_separators() {
        assert_eq!(
            Slug::from_name("--Tea -- & -- Cups--").unwrap().as_str(),
            "tea-cups"
        );
    }

    #[test]
    fn test_from_name_keeps_digits() {
        assert_eq!(
            Slug::from_name("Mug 350ml v2").unwrap().as_str(),
            "mug-350ml-v2"
        );
    }

    #[test]
    fn test_from_name_empty() {
        assert_eq!(Slug::from_name("!!! ¿? "), Err(SlugError::Empty));
    }

    #[test]
    fn test_from_name_too_long() {
        let name = "a".repeat(121);
        assert_eq!(
            Slug::from_name(&name),
            Err(SlugError::TooLong { max: 120 })
        );
    }

    #[test]
    fn test_parse_canonical() {
        assert!(Slug::parse("green-tea-2").is_ok());
        assert_eq!(Slug::parse("Green-Tea"), Err(SlugError::NotCanonical));
        assert_eq!(Slug::parse("green--tea"), Err(SlugError::NotCanonical));
        assert_eq!(Slug::parse("-green"), Err(SlugError::NotCanonical));
        assert_eq!(Slug::parse(""), Err(SlugError::Empty));
    }
}
