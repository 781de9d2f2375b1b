//! Coupon code type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`CouponCode`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CouponCodeError {
    /// The code is shorter than the minimum length.
    #[error("coupon code must be at least {min} characters")]
    TooShort {
        /// Minimum allowed length.
        min: usize,
    },
    /// The code is longer than the maximum length.
    #[error("coupon code must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The code contains a character outside `A-Z`, `0-9`, `-` and `_`.
    #[error("coupon code contains invalid character '{0}'")]
    InvalidCharacter(char),
}

/// A coupon code.
///
/// Coupon codes are case-insensitive for customers and always stored
/// uppercase.
///
/// ## Constraints
///
/// - Length: 3-32 characters after trimming
/// - Characters: `A-Z`, `0-9`, `-`, `_`
///
/// ## Examples
///
/// ```
/// use emporium_core::CouponCode;
///
/// let code = CouponCode::parse(" summer-10 ").unwrap();
/// assert_eq!(code.as_str(), "SUMMER-10");
///
/// assert!(CouponCode::parse("no").is_err());
/// assert!(CouponCode::parse("50% OFF").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct CouponCode(String);

impl CouponCode {
    /// Minimum length of a coupon code.
    pub const MIN_LENGTH: usize = 3;
    /// Maximum length of a coupon code.
    pub const MAX_LENGTH: usize = 32;

    /// Parse a `CouponCode` from user input.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is too short, too long, or
    /// contains characters other than letters, digits, `-` and `_`.
    pub fn parse(s: &str) -> Result<Self, CouponCodeError> {
        let normalized = Self::normalize(s);
        let len = normalized.chars().count();

        if len < Self::MIN_LENGTH {
            return Err(CouponCodeError::TooShort {
                min: Self::MIN_LENGTH,
            });
        }
        if len > Self::MAX_LENGTH {
            return Err(CouponCodeError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if let Some(c) = normalized
            .chars()
            .find(|c| !(c.is_ascii_uppercase() || c.is_ascii_digit() || *c == '-' || *c == '_'))
        {
            return Err(CouponCodeError::InvalidCharacter(c));
        }

        Ok(Self(normalized))
    }

    /// Trim and uppercase a code without validating its character set.
    ///
    /// Used when normalizing legacy rows that predate validation.
    #[must_use]
    pub fn normalize(s: &str) -> String {
        s.trim().to_uppercase()
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `CouponCode` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for CouponCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for CouponCode {
    type Err = CouponCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for CouponCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uppercases() {
        assert_eq!(CouponCode::parse("welcome10").unwrap().as_str(), "WELCOME10");
    }

    #[test]
    fn test_parse_allows_dash_and_underscore() {
        assert!(CouponCode::parse("BLACK_FRIDAY-2026").is_ok());
    }

    #[test]
    fn test_parse_too_short() {
        assert_eq!(
            CouponCode::parse(" ab "),
            Err(CouponCodeError::TooShort { min: 3 })
        );
    }

    #[test]
    fn test_parse_too_long() {
        let long = "A".repeat(33);
        assert_eq!(
            CouponCode::parse(&long),
            Err(CouponCodeError::TooLong { max: 32 })
        );
    }

    #[test]
    fn test_parse_rejects_spaces_inside() {
        assert_eq!(
            CouponCode::parse("TEN OFF"),
            Err(CouponCodeError::InvalidCharacter(' '))
        );
    }

    #[test]
    fn test_normalize_does_not_validate() {
        assert_eq!(CouponCode::normalize(" 10% off "), "10% OFF");
    }

    #[test]
    fn test_serde_transparent() {
        let code = CouponCode::parse("spring").unwrap();
        assert_eq!(serde_json::to_string(&code).unwrap(), "\"SPRING\"");
    }
}
