//! Mailer configuration.

use std::path::PathBuf;

use mailforge_smtp::{DsnNotify, SessionConfig};

use crate::sign::SigningMaterial;

/// Default path of the sendmail binary.
pub const DEFAULT_SENDMAIL_PATH: &str = "/usr/sbin/sendmail";

/// Default path of the qmail injector.
pub const DEFAULT_QMAIL_PATH: &str = "/var/qmail/bin/qmail-inject";

/// How assembled messages leave the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum Transport {
    /// Deliver over an SMTP session.
    #[default]
    Smtp,
    /// Pipe to `sendmail -oi -t`.
    Sendmail,
    /// Pipe to `qmail-inject`.
    Qmail,
}

/// Configuration of a [`Mailer`](crate::Mailer).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(default))]
pub struct MailerConfig {
    /// Delivery transport.
    pub transport: Transport,
    /// SMTP session settings, used by [`Transport::Smtp`].
    pub smtp: SessionConfig,
    /// Keep the SMTP connection open between sends.
    pub keep_alive: bool,
    /// Allow sending a message with an empty body.
    pub allow_empty: bool,
    /// Path of the sendmail binary.
    pub sendmail_path: PathBuf,
    /// Path of the qmail injector.
    pub qmail_path: PathBuf,
    /// DSN conditions requested for every recipient.
    pub dsn: Option<DsnNotify>,
    /// Replaces the message's `X-Mailer` header when set. An empty string
    /// removes the header.
    pub x_mailer: Option<String>,
    /// S/MIME signing material. Requires a signer on the mailer.
    pub signing: Option<SigningMaterial>,
}

impl Default for MailerConfig {
    fn default() -> Self {
        Self {
            transport: Transport::Smtp,
            smtp: SessionConfig::default(),
            keep_alive: false,
            allow_empty: false,
            sendmail_path: PathBuf::from(DEFAULT_SENDMAIL_PATH),
            qmail_path: PathBuf::from(DEFAULT_QMAIL_PATH),
            dsn: None,
            x_mailer: None,
            signing: None,
        }
    }
}

impl MailerConfig {
    /// Creates an SMTP configuration for the given host list.
    #[must_use]
    pub fn smtp(hosts: impl Into<String>) -> Self {
        Self {
            smtp: SessionConfig::new(hosts),
            ..Self::default()
        }
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder() -> MailerConfigBuilder {
        MailerConfigBuilder::default()
    }

    /// Returns the program used by the selected pipe transport.
    #[must_use]
    pub fn program(&self) -> Option<&PathBuf> {
        match self.transport {
            Transport::Smtp => None,
            Transport::Sendmail => Some(&self.sendmail_path),
            Transport::Qmail => Some(&self.qmail_path),
        }
    }
}

/// Builder for [`MailerConfig`].
#[derive(Debug, Clone, Default)]
pub struct MailerConfigBuilder {
    config: MailerConfig,
}

impl MailerConfigBuilder {
    /// Sets the transport.
    #[must_use]
    pub const fn transport(mut self, transport: Transport) -> Self {
        self.config.transport = transport;
        self
    }

    /// Sets the SMTP session configuration.
    #[must_use]
    pub fn smtp(mut self, smtp: SessionConfig) -> Self {
        self.config.smtp = smtp;
        self
    }

    /// Keeps the SMTP connection open between sends.
    #[must_use]
    pub const fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.config.keep_alive = keep_alive;
        self
    }

    /// Allows messages with an empty body.
    #[must_use]
    pub const fn allow_empty(mut self, allow_empty: bool) -> Self {
        self.config.allow_empty = allow_empty;
        self
    }

    /// Sets the sendmail path.
    #[must_use]
    pub fn sendmail_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.sendmail_path = path.into();
        self
    }

    /// Sets the qmail injector path.
    #[must_use]
    pub fn qmail_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.qmail_path = path.into();
        self
    }

    /// Requests delivery status notifications.
    #[must_use]
    pub const fn dsn(mut self, notify: DsnNotify) -> Self {
        self.config.dsn = Some(notify);
        self
    }

    /// Overrides the `X-Mailer` header.
    #[must_use]
    pub fn x_mailer(mut self, x_mailer: impl Into<String>) -> Self {
        self.config.x_mailer = Some(x_mailer.into());
        self
    }

    /// Enables S/MIME signing.
    #[must_use]
    pub fn signing(mut self, material: SigningMaterial) -> Self {
        self.config.signing = Some(material);
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> MailerConfig {
        self.config
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
    fn test_defaults() {
        let config = MailerConfig::default();
        assert_eq!(config.transport, Transport::Smtp);
        assert!(!config.keep_alive);
        assert!(!config.allow_empty);
        assert_eq!(config.sendmail_path, PathBuf::from("/usr/sbin/sendmail"));
        assert!(config.program().is_none());
        assert!(config.dsn.is_none());
    }

    #[test]
    fn test_builder() {
        let config = MailerConfig::builder()
            .transport(Transport::Qmail)
            .qmail_path("/opt/qmail-inject")
            .keep_alive(true)
            .allow_empty(true)
            .dsn(DsnNotify::SUCCESS)
            .x_mailer("Reports 2.1")
            .build();

        assert_eq!(config.program(), Some(&PathBuf::from("/opt/qmail-inject")));
        assert!(config.keep_alive);
        assert!(config.allow_empty);
        assert_eq!(config.dsn, Some(DsnNotify::SUCCESS));
        assert_eq!(config.x_mailer.as_deref(), Some("Reports 2.1"));
    }

    #[test]
    fn test_smtp_constructor() {
        let config = MailerConfig::smtp("mx1.example.com;mx2.example.com");
        assert_eq!(config.smtp.hosts, "mx1.example.com;mx2.example.com");
        assert_eq!(config.transport, Transport::Smtp);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_deserialize() {
        let config: MailerConfig = serde_json::from_str(
            r#"{"transport": "sendmail", "keep_alive": true, "dsn": "SUCCESS,FAILURE",
                "smtp": {"hosts": "smtp.example.com", "security": "tls"}}"#,
        )
        .unwrap();
        assert_eq!(config.transport, Transport::Sendmail);
        assert!(config.keep_alive);
        assert_eq!(config.dsn, Some(DsnNotify::SUCCESS.union(DsnNotify::FAILURE)));
        assert_eq!(config.smtp.hosts, "smtp.example.com");
    }
}
