//! SMTP service extensions and what the server advertised.

use std::collections::HashSet;

use super::Reply;

/// SMTP extensions discovered from EHLO response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Extension {
    /// STARTTLS - TLS upgrade
    StartTls,
    /// AUTH - Authentication
    Auth(Vec<AuthMechanism>),
    /// SIZE - Maximum message size
    Size(Option<usize>),
    /// 8BITMIME - 8-bit MIME transport
    EightBitMime,
    /// PIPELINING - Command pipelining
    Pipelining,
    /// SMTPUTF8 - UTF-8 email addresses
    SmtpUtf8,
    /// DSN - Delivery status notifications
    Dsn,
    /// Any other keyword, kept verbatim.
    Unknown(String),
}

impl Extension {
    /// Parses one EHLO keyword line.
    ///
    /// The legacy `AUTH=LOGIN PLAIN` spelling is accepted as well.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let mut parts = line.split(|c: char| c.is_ascii_whitespace() || c == '=');
        let Some(keyword) = parts.next().filter(|k| !k.is_empty()) else {
            return Self::Unknown(line.to_string());
        };

        match keyword.to_ascii_uppercase().as_str() {
            "STARTTLS" => Self::StartTls,
            "AUTH" => Self::Auth(
                parts
                    .filter_map(AuthMechanism::parse)
                    .fold(Vec::new(), |mut mechanisms, m| {
                        if !mechanisms.contains(&m) {
                            mechanisms.push(m);
                        }
                        mechanisms
                    }),
            ),
            "SIZE" => Self::Size(parts.next().and_then(|s| s.parse().ok()).filter(|&n| n > 0)),
            "8BITMIME" => Self::EightBitMime,
            "PIPELINING" => Self::Pipelining,
            "SMTPUTF8" => Self::SmtpUtf8,
            "DSN" => Self::Dsn,
            _ => Self::Unknown(line.to_string()),
        }
    }
}

/// SASL authentication mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub enum AuthMechanism {
    /// PLAIN - plaintext authentication
    #[cfg_attr(feature = "serde", serde(rename = "PLAIN"))]
    Plain,
    /// LOGIN - legacy plaintext
    #[cfg_attr(feature = "serde", serde(rename = "LOGIN"))]
    Login,
    /// CRAM-MD5 - challenge-response
    #[cfg_attr(feature = "serde", serde(rename = "CRAM-MD5"))]
    CramMd5,
    /// `XOAUTH2` - `OAuth2` bearer token
    #[cfg_attr(feature = "serde", serde(rename = "XOAUTH2"))]
    XOAuth2,
}

impl AuthMechanism {
    /// Preference order when no mechanism is configured.
    pub const PREFERENCE: [Self; 4] = [Self::CramMd5, Self::Login, Self::Plain, Self::XOAuth2];

    /// Parses an authentication mechanism name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PLAIN" => Some(Self::Plain),
            "LOGIN" => Some(Self::Login),
            "CRAM-MD5" => Some(Self::CramMd5),
            "XOAUTH2" => Some(Self::XOAuth2),
            _ => None,
        }
    }

    /// Returns the mechanism name as a string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
            Self::CramMd5 => "CRAM-MD5",
            Self::XOAuth2 => "XOAUTH2",
        }
    }
}

impl std::fmt::Display for AuthMechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server capabilities from the greeting and EHLO response.
#[derive(Debug, Clone, Default)]
pub struct ServerInfo {
    /// Server hostname from greeting.
    pub hostname: String,
    /// Supported extensions.
    pub extensions: HashSet<Extension>,
    /// False when the server only answered HELO.
    pub esmtp: bool,
}

impl ServerInfo {
    /// Records the extensions listed in an EHLO reply.
    ///
    /// The first line of the reply is the server's greeting, not a keyword.
    pub fn apply_ehlo(&mut self, reply: &Reply) {
        self.esmtp = true;
        self.extensions = reply
            .message
            .iter()
            .skip(1)
            .map(|line| Extension::parse(line))
            .collect();
    }

    /// Forgets every extension, as after a HELO greeting or STARTTLS.
    pub fn clear_extensions(&mut self) {
        self.esmtp = false;
        self.extensions.clear();
    }

    /// Checks if the server supports an extension.
    #[must_use]
    pub fn supports(&self, ext: &Extension) -> bool {
        self.extensions.contains(ext)
    }

    /// Checks if STARTTLS is supported.
    #[must_use]
    pub fn supports_starttls(&self) -> bool {
        self.supports(&Extension::StartTls)
    }

    /// Checks if MAIL/RCPT may be pipelined.
    #[must_use]
    pub fn supports_pipelining(&self) -> bool {
        self.supports(&Extension::Pipelining)
    }

    /// Returns the maximum message size, if advertised.
    #[must_use]
    pub fn max_message_size(&self) -> Option<usize> {
        self.extensions.iter().find_map(|ext| match ext {
            Extension::Size(size) => *size,
            _ => None,
        })
    }

    /// Checks if the server advertised `SIZE`, with or without a limit.
    #[must_use]
    pub fn supports_size(&self) -> bool {
        self.extensions
            .iter()
            .any(|ext| matches!(ext, Extension::Size(_)))
    }

    /// Returns supported authentication mechanisms.
    #[must_use]
    pub fn auth_mechanisms(&self) -> Vec<AuthMechanism> {
        self.extensions
            .iter()
            .find_map(|ext| match ext {
                Extension::Auth(mechanisms) => Some(mechanisms.clone()),
                _ => None,
            })
            .unwrap_or_default()
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
    use crate::types::ReplyCode;

    mod extension_parse_tests {
        use super::*;

        #[test]
        fn parse_starttls() {
            assert_eq!(Extension::parse("STARTTLS"), Extension::StartTls);
            assert_eq!(Extension::parse("starttls"), Extension::StartTls);
        }

        #[test]
        fn parse_auth_list() {
            assert_eq!(
                Extension::parse("AUTH PLAIN LOGIN CRAM-MD5 GSSAPI"),
                Extension::Auth(vec![
                    AuthMechanism::Plain,
                    AuthMechanism::Login,
                    AuthMechanism::CramMd5
                ])
            );
        }

        #[test]
        fn parse_legacy_auth_spelling() {
            assert_eq!(
                Extension::parse("AUTH=LOGIN PLAIN"),
                Extension::Auth(vec![AuthMechanism::Login, AuthMechanism::Plain])
            );
        }

        #[test]
        fn parse_size() {
            assert_eq!(
                Extension::parse("SIZE 52428800"),
                Extension::Size(Some(52_428_800))
            );
            assert_eq!(Extension::parse("SIZE"), Extension::Size(None));
            assert_eq!(Extension::parse("SIZE 0"), Extension::Size(None));
        }

        #[test]
        fn parse_flags() {
            assert_eq!(Extension::parse("8BITMIME"), Extension::EightBitMime);
            assert_eq!(Extension::parse("PIPELINING"), Extension::Pipelining);
            assert_eq!(Extension::parse("SMTPUTF8"), Extension::SmtpUtf8);
            assert_eq!(Extension::parse("DSN"), Extension::Dsn);
        }

        #[test]
        fn parse_unknown() {
            assert_eq!(
                Extension::parse("CHUNKING"),
                Extension::Unknown("CHUNKING".into())
            );
            assert!(matches!(Extension::parse(""), Extension::Unknown(_)));
        }
    }

    #[test]
    fn test_server_info_from_ehlo() {
        let reply = Reply::new(
            ReplyCode::OK,
            vec![
                "mail.example.com Hello".into(),
                "PIPELINING".into(),
                "SIZE 1000".into(),
                "AUTH LOGIN XOAUTH2".into(),
            ],
        );
        let mut info = ServerInfo::default();
        info.apply_ehlo(&reply);

        assert!(info.esmtp);
        assert!(info.supports_pipelining());
        assert!(!info.supports_starttls());
        assert!(info.supports_size());
        assert_eq!(info.max_message_size(), Some(1000));
        assert_eq!(
            info.auth_mechanisms(),
            vec![AuthMechanism::Login, AuthMechanism::XOAuth2]
        );

        info.clear_extensions();
        assert!(!info.esmtp);
        assert!(info.auth_mechanisms().is_empty());
    }

    #[test]
    fn test_mechanism_names() {
        for mechanism in AuthMechanism::PREFERENCE {
            assert_eq!(AuthMechanism::parse(mechanism.as_str()), Some(mechanism));
        }
        assert_eq!(AuthMechanism::parse("cram-md5"), Some(AuthMechanism::CramMd5));
        assert_eq!(AuthMechanism::parse("OAUTHBEARER"), None);
    }
}
