//! Envelope addresses.

use crate::error::{Error, Result};

/// Address for the SMTP envelope (`MAIL FROM` / `RCPT TO` path).
///
/// Only the mailbox is kept; display names never reach the envelope. The
/// empty address is the null reverse-path `<>` used for bounces.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Creates a new envelope address.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the address contains a line
    /// break, and [`Error::InvalidAddress`] if it contains whitespace or
    /// angle brackets or lacks a local part or domain.
    pub fn new(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        Self::validate(&addr)?;
        Ok(Self(addr))
    }

    /// The null reverse-path `<>`.
    #[must_use]
    pub const fn null() -> Self {
        Self(String::new())
    }

    /// Returns true for the null reverse-path.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the address needs the `SMTPUTF8` extension.
    #[must_use]
    pub fn is_utf8(&self) -> bool {
        !self.0.is_ascii()
    }

    fn validate(addr: &str) -> Result<()> {
        if addr.contains(['\r', '\n']) {
            return Err(Error::InvalidArgument(format!(
                "line break in address {}",
                addr.escape_debug()
            )));
        }
        if addr.chars().any(|c| c.is_whitespace() || c == '<' || c == '>') {
            return Err(Error::InvalidAddress(addr.to_string()));
        }

        match addr.rsplit_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
            _ => Err(Error::InvalidAddress(addr.to_string())),
        }
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{}>", self.0)
    }
}

impl std::str::FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_address() {
        let addr = Address::new("user@example.com").unwrap();
        assert_eq!(addr.as_str(), "user@example.com");
        assert_eq!(addr.to_string(), "<user@example.com>");
        assert!(!addr.is_utf8());
    }

    #[test]
    fn test_quoted_local_part_with_at() {
        assert!(Address::new("\"a@b\"@example.com").is_ok());
    }

    #[test]
    fn test_line_break_is_rejected() {
        assert!(matches!(
            Address::new("somewhere\nbad"),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            Address::new("a@example.com\r\nRCPT TO:<x@y>"),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_invalid_addresses() {
        assert!(Address::new("userexample.com").is_err());
        assert!(Address::new("").is_err());
        assert!(Address::new("@example.com").is_err());
        assert!(Address::new("user@").is_err());
        assert!(Address::new("<user@example.com>").is_err());
        assert!(Address::new("us er@example.com").is_err());
    }

    #[test]
    fn test_null_path() {
        let null = Address::null();
        assert!(null.is_null());
        assert_eq!(null.to_string(), "<>");
    }

    #[test]
    fn test_utf8_address() {
        assert!(Address::new("j\u{f6}rg@example.com").unwrap().is_utf8());
    }
}
