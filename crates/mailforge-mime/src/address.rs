//! Address validation, IDN canonicalization and recipient sets.

use crate::encoding::{HeaderPosition, encode_header};
use crate::error::{Error, Result};
use std::collections::HashSet;
use std::fmt;

/// Maximum length of a local part in octets (RFC 5321 section 4.5.3.1.1).
const MAX_LOCAL_PART: usize = 64;

/// Maximum length of a forward-path address in octets.
const MAX_ADDRESS: usize = 254;

/// A validated email address with an optional display name.
///
/// The mailbox is stored in canonical form: surrounding whitespace removed
/// and an internationalized domain converted to its ASCII-compatible
/// encoding. The local part is never altered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    raw: String,
    name: Option<String>,
    mailbox: String,
}

impl Address {
    /// Parses and canonicalizes an address without a display name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address is not a valid
    /// RFC 5322 `addr-spec`.
    pub fn new(address: &str) -> Result<Self> {
        canonicalize(address)
    }

    /// Parses an address and attaches a display name.
    ///
    /// Line breaks are stripped from the name and blank names are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address is invalid.
    pub fn with_name(address: &str, name: &str) -> Result<Self> {
        let mut parsed = canonicalize(address)?;
        let name: String = name.chars().filter(|c| *c != '\r' && *c != '\n').collect();
        let name = name.trim();
        parsed.name = (!name.is_empty()).then(|| name.to_string());
        Ok(parsed)
    }

    /// Returns the address exactly as supplied.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Returns the display name, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the canonical `local@domain` form.
    #[must_use]
    pub fn mailbox(&self) -> &str {
        &self.mailbox
    }

    /// Returns the local part.
    #[must_use]
    pub fn local_part(&self) -> &str {
        self.mailbox
            .rsplit_once('@')
            .map_or(self.mailbox.as_str(), |(local, _)| local)
    }

    /// Returns the canonical domain.
    #[must_use]
    pub fn domain(&self) -> &str {
        self.mailbox
            .rsplit_once('@')
            .map_or("", |(_, domain)| domain)
    }

    /// Key used for duplicate detection.
    fn key(&self) -> String {
        self.mailbox.to_lowercase()
    }

    /// Renders the address for an address header.
    ///
    /// A display name is encoded as an RFC 2047 phrase and followed by the
    /// mailbox in angle brackets; without a name the bare mailbox is used.
    #[must_use]
    pub fn to_header(&self, charset: &str, line_length: usize) -> String {
        match &self.name {
            Some(name) => {
                let phrase = encode_header(name, charset, HeaderPosition::Phrase, line_length);
                format!("{phrase} <{}>", self.mailbox)
            }
            None => self.mailbox.clone(),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} <{}>", self.mailbox),
            None => f.write_str(&self.mailbox),
        }
    }
}

/// Returns `true` if `address` is a valid `addr-spec` once canonicalized.
#[must_use]
pub fn validate_address(address: &str) -> bool {
    canonicalize(address).is_ok()
}

/// Returns `true` if internationalized domains are converted to punycode.
#[must_use]
pub const fn idn_supported() -> bool {
    cfg!(feature = "idn")
}

/// Validates an address and converts a non-ASCII domain to punycode.
///
/// Canonicalization is idempotent: feeding the canonical mailbox back in
/// yields the same mailbox.
///
/// # Errors
///
/// Returns [`Error::InvalidAddress`] if the address is empty, malformed, or
/// its domain cannot be converted.
pub fn canonicalize(address: &str) -> Result<Address> {
    let trimmed = address.trim();
    let invalid = || Error::InvalidAddress(trimmed.to_string());

    if trimmed.is_empty() {
        return Err(invalid());
    }

    let (local, domain) = trimmed.rsplit_once('@').ok_or_else(invalid)?;
    let domain = if domain.is_ascii() {
        domain.to_string()
    } else {
        to_ascii_domain(domain).ok_or_else(invalid)?
    };

    let mailbox = format!("{local}@{domain}");
    if mailbox.len() > MAX_ADDRESS || !is_valid_local_part(local) || !is_valid_domain(&domain) {
        return Err(invalid());
    }

    Ok(Address {
        raw: address.to_string(),
        name: None,
        mailbox,
    })
}

#[cfg(feature = "idn")]
fn to_ascii_domain(domain: &str) -> Option<String> {
    match url::Host::parse(domain).ok()? {
        url::Host::Domain(ascii) => Some(ascii),
        url::Host::Ipv4(_) | url::Host::Ipv6(_) => None,
    }
}

#[cfg(not(feature = "idn"))]
fn to_ascii_domain(domain: &str) -> Option<String> {
    Some(domain.to_string())
}

const fn is_atext(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            '!' | '#' | '$' | '%' | '&' | '\'' | '*' | '+' | '-' | '/' | '=' | '?' | '^' | '_'
                | '`' | '{' | '|' | '}' | '~'
        )
}

fn is_valid_local_part(local: &str) -> bool {
    if local.is_empty() || local.len() > MAX_LOCAL_PART {
        return false;
    }

    if let Some(inner) = local
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    {
        return is_valid_quoted_content(inner);
    }

    local
        .split('.')
        .all(|atom| !atom.is_empty() && atom.chars().all(is_atext))
}

fn is_valid_quoted_content(inner: &str) -> bool {
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped) if escaped == ' ' || escaped.is_ascii_graphic() => {}
                _ => return false,
            },
            '"' => return false,
            c if c == ' ' || c.is_ascii_graphic() => {}
            _ => return false,
        }
    }
    true
}

fn is_valid_domain(domain: &str) -> bool {
    if let Some(literal) = domain
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
    {
        return is_valid_domain_literal(literal);
    }

    !domain.is_empty()
        && domain.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || (!c.is_ascii() && c.is_alphanumeric()))
        })
}

fn is_valid_domain_literal(literal: &str) -> bool {
    if let Some(v6) = literal.strip_prefix("IPv6:") {
        return v6.parse::<std::net::Ipv6Addr>().is_ok();
    }
    literal.parse::<std::net::Ipv4Addr>().is_ok()
}

/// Recipient set an address is added to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecipientKind {
    /// `To` header.
    To,
    /// `Cc` header.
    Cc,
    /// Envelope-only recipient.
    Bcc,
    /// `Reply-To` header.
    ReplyTo,
}

impl fmt::Display for RecipientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::To => "to",
            Self::Cc => "cc",
            Self::Bcc => "bcc",
            Self::ReplyTo => "Reply-To",
        })
    }
}

/// To, Cc, Bcc and Reply-To lists with duplicate suppression.
///
/// An address may appear only once across To, Cc and Bcc, compared by its
/// canonical form without regard to case. Reply-To keeps its own set.
/// Insertion order is preserved for header rendering.
#[derive(Debug, Clone, Default)]
pub struct Recipients {
    to: Vec<Address>,
    cc: Vec<Address>,
    bcc: Vec<Address>,
    reply_to: Vec<Address>,
    seen: HashSet<String>,
    reply_to_seen: HashSet<String>,
}

impl Recipients {
    /// Creates empty recipient sets.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an address to a set, reporting why it was refused.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] for empty or malformed addresses and
    /// [`Error::DuplicateAddress`] if the address is already present.
    pub fn try_add(&mut self, kind: RecipientKind, address: &str, name: &str) -> Result<()> {
        let address = Address::with_name(address, name)
            .map_err(|_| Error::InvalidAddress(format!("({kind}): {}", address.trim())))?;
        let key = address.key();

        let (list, seen) = match kind {
            RecipientKind::To => (&mut self.to, &mut self.seen),
            RecipientKind::Cc => (&mut self.cc, &mut self.seen),
            RecipientKind::Bcc => (&mut self.bcc, &mut self.seen),
            RecipientKind::ReplyTo => (&mut self.reply_to, &mut self.reply_to_seen),
        };

        if !seen.insert(key) {
            return Err(Error::DuplicateAddress(address.mailbox));
        }
        list.push(address);
        Ok(())
    }

    /// Adds an address to a set.
    ///
    /// Returns `false` without modifying anything if the address is empty,
    /// invalid, or already present.
    pub fn add(&mut self, kind: RecipientKind, address: &str, name: &str) -> bool {
        match self.try_add(kind, address, name) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(%kind, error = %e, "Recipient not added");
                false
            }
        }
    }

    /// Returns the addresses of one set in insertion order.
    #[must_use]
    pub fn list(&self, kind: RecipientKind) -> &[Address] {
        match kind {
            RecipientKind::To => &self.to,
            RecipientKind::Cc => &self.cc,
            RecipientKind::Bcc => &self.bcc,
            RecipientKind::ReplyTo => &self.reply_to,
        }
    }

    /// Removes every address of one set.
    pub fn clear(&mut self, kind: RecipientKind) {
        let removed = match kind {
            RecipientKind::ReplyTo => {
                self.reply_to.clear();
                self.reply_to_seen.clear();
                return;
            }
            RecipientKind::To => std::mem::take(&mut self.to),
            RecipientKind::Cc => std::mem::take(&mut self.cc),
            RecipientKind::Bcc => std::mem::take(&mut self.bcc),
        };
        for address in &removed {
            self.seen.remove(&address.key());
        }
    }

    /// Removes all addresses from To, Cc and Bcc.
    pub fn clear_all(&mut self) {
        self.to.clear();
        self.cc.clear();
        self.bcc.clear();
        self.seen.clear();
    }

    /// Iterates over envelope recipients: To, then Cc, then Bcc.
    pub fn envelope(&self) -> impl Iterator<Item = &Address> {
        self.to.iter().chain(&self.cc).chain(&self.bcc)
    }

    /// Returns the number of envelope recipients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.to.len() + self.cc.len() + self.bcc.len()
    }

    /// Returns `true` if there are no envelope recipients.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
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
    use proptest::prelude::*;

    #[test]
    fn test_valid_addresses() {
        for address in [
            "user@example.com",
            "first.last+tag@sub.example.co.uk",
            "\"quoted name\"@example.com",
            "user@[127.0.0.1]",
            "user@[IPv6:::1]",
            "user@localhost",
            "  padded@example.com  ",
        ] {
            assert!(validate_address(address), "{address}");
        }
    }

    #[test]
    fn test_invalid_addresses() {
        for address in [
            "",
            "   ",
            "mehome.com",
            "a@example..com",
            "@example.com",
            "user@",
            ".user@example.com",
            "us..er@example.com",
            "user@-example.com",
            "user@[999.1.1.1]",
            "some\nbody@example.com",
        ] {
            assert!(!validate_address(address), "{address:?}");
        }
    }

    #[test]
    fn test_local_part_length_limit() {
        let long = format!("{}@example.com", "a".repeat(65));
        assert!(!validate_address(&long));
        let ok = format!("{}@example.com", "a".repeat(64));
        assert!(validate_address(&ok));
    }

    #[cfg(feature = "idn")]
    #[test]
    fn test_canonicalize_idn_domain() {
        let address = canonicalize("user@françois.ch").unwrap();
        assert_eq!(address.mailbox(), "user@xn--franois-xxa.ch");
        assert_eq!(address.raw(), "user@françois.ch");
        assert_eq!(address.local_part(), "user");
    }

    #[test]
    fn test_canonicalize_keeps_ascii_case() {
        let address = canonicalize(" User@Example.COM ").unwrap();
        assert_eq!(address.mailbox(), "User@Example.COM");
    }

    #[cfg(feature = "idn")]
    #[test]
    fn test_idn_duplicates_collapse() {
        let mut recipients = Recipients::new();
        assert!(recipients.add(RecipientKind::To, "test@françois.ch", ""));
        assert!(!recipients.add(RecipientKind::To, "test@FRANÇOIS.CH", ""));
        assert!(!recipients.add(RecipientKind::Cc, "test@xn--franois-xxa.ch", ""));
        assert!(!recipients.add(RecipientKind::Bcc, "test@XN--FRANOIS-XXA.CH", ""));
        assert_eq!(recipients.len(), 1);
    }

    #[test]
    fn test_duplicates_across_sets() {
        let mut recipients = Recipients::new();
        assert!(recipients.add(RecipientKind::To, "a@example.com", "A"));
        assert!(!recipients.add(RecipientKind::To, "a@example.com", ""));
        assert!(!recipients.add(RecipientKind::Cc, "A@EXAMPLE.COM", ""));
        assert!(!recipients.add(RecipientKind::Bcc, "a@example.com", ""));
        assert_eq!(recipients.len(), 1);
        assert!(matches!(
            recipients.try_add(RecipientKind::Cc, "a@example.com", ""),
            Err(Error::DuplicateAddress(_))
        ));
    }

    #[test]
    fn test_reply_to_is_separate() {
        let mut recipients = Recipients::new();
        assert!(recipients.add(RecipientKind::To, "a@example.com", ""));
        assert!(recipients.add(RecipientKind::ReplyTo, "a@example.com", ""));
        assert!(!recipients.add(RecipientKind::ReplyTo, "a@example.com", ""));
        assert_eq!(recipients.list(RecipientKind::ReplyTo).len(), 1);
        assert_eq!(recipients.len(), 1);
    }

    #[test]
    fn test_insertion_order_and_clear() {
        let mut recipients = Recipients::new();
        recipients.add(RecipientKind::To, "b@example.com", "");
        recipients.add(RecipientKind::To, "a@example.com", "");
        recipients.add(RecipientKind::Cc, "c@example.com", "");
        let order: Vec<&str> = recipients.envelope().map(Address::mailbox).collect();
        assert_eq!(order, ["b@example.com", "a@example.com", "c@example.com"]);

        recipients.clear(RecipientKind::To);
        assert!(recipients.add(RecipientKind::Bcc, "a@example.com", ""));
        assert!(!recipients.add(RecipientKind::To, "c@example.com", ""));

        recipients.clear_all();
        assert!(recipients.is_empty());
    }

    #[test]
    fn test_invalid_add_reports_kind() {
        let mut recipients = Recipients::new();
        let err = recipients
            .try_add(RecipientKind::Cc, "not-an-address", "")
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid address: (cc): not-an-address");
        assert!(!recipients.add(RecipientKind::To, "", ""));
    }

    #[test]
    fn test_header_rendering() {
        let plain = Address::new("foo@example.com").unwrap();
        assert_eq!(plain.to_header("utf-8", 63), "foo@example.com");

        let quoted = Address::with_name("foo@example.com", "Tim \"The Book\" O'Reilly").unwrap();
        assert_eq!(
            quoted.to_header("utf-8", 63),
            "\"Tim \\\"The Book\\\" O'Reilly\" <foo@example.com>"
        );

        let named = Address::with_name("foo@example.com", " Foo\r\n ").unwrap();
        assert_eq!(named.name(), Some("Foo"));
        assert_eq!(named.to_header("utf-8", 63), "Foo <foo@example.com>");
    }

    proptest! {
        #[test]
        fn canonicalize_is_idempotent(
            local in "[a-z0-9][a-z0-9._+-]{0,15}",
            domain in "[a-zé0-9]{1,12}\\.(com|ch|de)",
        ) {
            let input = format!("{local}@{domain}");
            if let Ok(first) = canonicalize(&input) {
                let second = canonicalize(first.mailbox()).unwrap();
                prop_assert_eq!(first.mailbox(), second.mailbox());
            }
        }
    }
}
