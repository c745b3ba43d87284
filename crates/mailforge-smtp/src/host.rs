//! Parsing of `;`-separated SMTP host lists.
//!
//! Each entry has the form `[scheme://]host[:port]`. `ssl://` selects
//! implicit TLS and `tls://` requires STARTTLS. IPv6 literals must be
//! bracketed when a port follows: `[::1]:2525`.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::config::Security;
use crate::error::{Error, Result};

/// One connection candidate from a host list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCandidate {
    /// Hostname or IP address, without IPv6 brackets.
    pub host: String,
    /// Port given in the entry.
    pub port: Option<u16>,
    /// Security forced by an `ssl://` or `tls://` prefix.
    pub security: Option<Security>,
}

impl HostCandidate {
    /// Parses a single host list entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHost`] for an unknown scheme, a malformed
    /// host, or a port outside 1..=65535.
    pub fn parse(entry: &str) -> Result<Self> {
        let invalid = || Error::InvalidHost(entry.to_string());
        let entry = entry.trim();

        let (security, rest) = match entry.split_once("://") {
            Some((scheme, rest)) => match scheme.to_ascii_lowercase().as_str() {
                "ssl" => (Some(Security::Implicit), rest),
                "tls" => (Some(Security::StartTls), rest),
                _ => return Err(invalid()),
            },
            None => (None, entry),
        };

        let (host, port) = if let Some(bracketed) = rest.strip_prefix('[') {
            let (inner, after) = bracketed.split_once(']').ok_or_else(invalid)?;
            inner.parse::<Ipv6Addr>().map_err(|_| invalid())?;
            let port = match after {
                "" => None,
                _ => Some(after.strip_prefix(':').ok_or_else(invalid)?),
            };
            (inner, port)
        } else if rest.parse::<Ipv6Addr>().is_ok() {
            (rest, None)
        } else {
            match rest.rsplit_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (rest, None),
            }
        };

        if !is_valid_host(host) {
            return Err(invalid());
        }
        let port = port
            .map(|p| p.parse::<u16>().ok().filter(|&p| p > 0).ok_or_else(invalid))
            .transpose()?;

        Ok(Self {
            host: host.to_string(),
            port,
            security,
        })
    }
}

impl fmt::Display for HostCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.security {
            Some(Security::Implicit) => f.write_str("ssl://")?,
            Some(Security::StartTls) => f.write_str("tls://")?,
            Some(Security::None) | None => {}
        }
        if self.host.contains(':') {
            write!(f, "[{}]", self.host)?;
        } else {
            f.write_str(&self.host)?;
        }
        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }
        Ok(())
    }
}

/// Splits a host list on `;` and parses every entry.
///
/// Whitespace around entries is ignored and empty entries are dropped.
/// Invalid entries are skipped with a warning, so the result may be empty.
#[must_use]
pub fn parse_hosts(list: &str) -> Vec<HostCandidate> {
    list.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| match HostCandidate::parse(entry) {
            Ok(candidate) => Some(candidate),
            Err(e) => {
                tracing::warn!(entry, error = %e, "Skipping invalid SMTP host");
                None
            }
        })
        .collect()
}

/// Checks for an IPv4 or IPv6 address or an RFC 1123 hostname.
fn is_valid_host(host: &str) -> bool {
    if host.is_empty() || host.len() > 253 {
        return false;
    }
    if host.parse::<Ipv6Addr>().is_ok() {
        return true;
    }
    if host.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        return host.parse::<Ipv4Addr>().is_ok();
    }

    host.trim_end_matches('.').split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    })
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

    fn candidate(host: &str, port: Option<u16>, security: Option<Security>) -> HostCandidate {
        HostCandidate {
            host: host.to_string(),
            port,
            security,
        }
    }

    #[test]
    fn test_list_with_stray_whitespace() {
        assert_eq!(
            parse_hosts(" localhost:12345 ; localhost "),
            vec![
                candidate("localhost", Some(12345), None),
                candidate("localhost", None, None)
            ]
        );
    }

    #[test]
    fn test_ipv6_literals() {
        assert_eq!(
            parse_hosts("[::1]:2525;[fe80::1];::1"),
            vec![
                candidate("::1", Some(2525), None),
                candidate("fe80::1", None, None),
                candidate("::1", None, None)
            ]
        );
    }

    #[test]
    fn test_schemes() {
        assert_eq!(
            parse_hosts("ssl://smtp.example.com:465;TLS://mail.example.com"),
            vec![
                candidate("smtp.example.com", Some(465), Some(Security::Implicit)),
                candidate("mail.example.com", None, Some(Security::StartTls))
            ]
        );
    }

    #[test]
    fn test_invalid_entries_are_skipped() {
        let hosts = parse_hosts(
            "xyz://bogus:25;tls://[bogus]:25;ssl://localhost:12345;tls://localhost:587;10.10.10.10:54321;localhost:12345;10.10.10.10;[::1]:12345",
        );
        assert_eq!(hosts.len(), 6);
        assert_eq!(hosts[0], candidate("localhost", Some(12345), Some(Security::Implicit)));
        assert_eq!(hosts[5], candidate("::1", Some(12345), None));
    }

    #[test]
    fn test_invalid_ports_and_hosts() {
        assert!(HostCandidate::parse("localhost:0").is_err());
        assert!(HostCandidate::parse("localhost:65536").is_err());
        assert!(HostCandidate::parse("localhost:abc").is_err());
        assert!(HostCandidate::parse("999.1.1.1").is_err());
        assert!(HostCandidate::parse("-bad-.example.com").is_err());
        assert!(HostCandidate::parse("[::1]25").is_err());
        assert!(HostCandidate::parse("").is_err());
    }

    #[test]
    fn test_display_round_trip() {
        for entry in ["ssl://smtp.example.com:465", "[::1]:25", "tls://10.0.0.1"] {
            assert_eq!(HostCandidate::parse(entry).unwrap().to_string(), entry);
        }
    }
}
