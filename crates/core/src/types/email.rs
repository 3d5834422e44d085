//! Email address type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing an [`Email`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    /// The input string is empty.
    #[error("email cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("email must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input does not contain exactly one @ symbol.
    #[error("email must contain exactly one @ symbol")]
    InvalidAtSymbol,
    /// The local part (before @) is empty.
    #[error("email local part cannot be empty")]
    EmptyLocalPart,
    /// The domain part (after @) is empty or has no dot.
    #[error("email domain is invalid")]
    InvalidDomain,
}

/// A customer email address.
///
/// Surrounding whitespace is trimmed and the address is lowercased, since
/// the backend matches accounts case-insensitively.
///
/// ```
/// use atelie_core::Email;
///
/// let email = Email::parse("  Cliente@Exemplo.com.br ").unwrap();
/// assert_eq!(email.as_str(), "cliente@exemplo.com.br");
/// assert!(Email::parse("sem-arroba").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Maximum length of an email address (RFC 5321).
    pub const MAX_LENGTH: usize = 254;

    /// Parse and normalize an `Email`.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, too long, does not contain
    /// exactly one `@`, or has an empty local part or a domain without a dot.
    pub fn parse(s: &str) -> Result<Self, EmailError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(EmailError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(EmailError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        let mut parts = s.split('@');
        let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(EmailError::InvalidAtSymbol);
        };

        if local.is_empty() {
            return Err(EmailError::EmptyLocalPart);
        }
        if domain.is_empty()
            || !domain.contains('.')
            || domain.starts_with('.')
            || domain.ends_with('.')
        {
            return Err(EmailError::InvalidDomain);
        }

        Ok(Self(s.to_lowercase()))
    }

    /// Returns the email address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the domain part of the email (after the @).
    #[must_use]
    pub fn domain(&self) -> &str {
        self.0.split_once('@').map_or("", |(_, domain)| domain)
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Email {
    type Err = EmailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Email {
    type Error = EmailError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_emails() {
        assert!(Email::parse("user@example.com").is_ok());
        assert!(Email::parse("user.name+tag@example.com.br").is_ok());
        assert!(Email::parse("a@b.c").is_ok());
    }

    #[test]
    fn test_parse_normalizes() {
        let email = Email::parse(" Maria@Atelie.COM ").unwrap();
        assert_eq!(email.as_str(), "maria@atelie.com");
        assert_eq!(email.domain(), "atelie.com");
    }

    #[test]
    fn test_parse_rejects_invalid() {
        assert_eq!(Email::parse("   "), Err(EmailError::Empty));
        assert_eq!(Email::parse("no-at"), Err(EmailError::InvalidAtSymbol));
        assert_eq!(Email::parse("a@b@c.com"), Err(EmailError::InvalidAtSymbol));
        assert_eq!(Email::parse("@atelie.com"), Err(EmailError::EmptyLocalPart));
        assert_eq!(Email::parse("user@localhost"), Err(EmailError::InvalidDomain));
        assert_eq!(Email::parse("user@.com"), Err(EmailError::InvalidDomain));
    }

    #[test]
    fn test_parse_too_long() {
        let long = format!("{}@atelie.com", "a".repeat(250));
        assert!(matches!(
            Email::parse(&long),
            Err(EmailError::TooLong { max: 254 })
        ));
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Result<Email, _> = serde_json::from_str("\"X@Y.com\"");
        assert_eq!(ok.unwrap().as_str(), "x@y.com");
        let bad: Result<Email, _> = serde_json::from_str("\"nope\"");
        assert!(bad.is_err());
    }
}
