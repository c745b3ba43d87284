//! Session configuration types.

use std::time::Duration;

use crate::auth::Credentials;

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum Security {
    /// Plaintext unless the server offers STARTTLS and `auto_tls` is on.
    #[default]
    None,
    /// Start with plaintext and require a STARTTLS upgrade (port 587).
    #[cfg_attr(feature = "serde", serde(alias = "tls"))]
    StartTls,
    /// TLS from the start (port 465).
    #[cfg_attr(feature = "serde", serde(alias = "ssl"))]
    Implicit,
}

impl Security {
    /// Returns the default port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None => 25,
            Self::StartTls => 587,
            Self::Implicit => 465,
        }
    }
}

/// SMTP session configuration.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(default))]
pub struct SessionConfig {
    /// Host list, `;`-separated `[scheme://]host[:port]` entries.
    pub hosts: String,
    /// Port for entries that do not name one. Falls back to the default
    /// port of the entry's security mode.
    pub port: Option<u16>,
    /// Security mode for entries without a scheme prefix.
    pub security: Security,
    /// Credentials for AUTH. No AUTH is attempted without them.
    pub credentials: Option<Credentials>,
    /// Name announced in EHLO/HELO.
    pub helo_name: String,
    /// Timeout for each connection attempt.
    #[cfg_attr(feature = "serde", serde(with = "seconds"))]
    pub connect_timeout: Duration,
    /// Timeout for each command round trip.
    #[cfg_attr(feature = "serde", serde(with = "seconds"))]
    pub io_timeout: Duration,
    /// Upgrade with STARTTLS whenever the server offers it.
    pub auto_tls: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new("localhost")
    }
}

impl SessionConfig {
    /// Creates a configuration with opportunistic TLS on port 25.
    #[must_use]
    pub fn new(hosts: impl Into<String>) -> Self {
        Self {
            hosts: hosts.into(),
            port: None,
            security: Security::None,
            credentials: None,
            helo_name: "localhost.localdomain".into(),
            connect_timeout: Duration::from_secs(30),
            io_timeout: Duration::from_secs(300),
            auto_tls: true,
        }
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(hosts: impl Into<String>) -> SessionConfigBuilder {
        SessionConfigBuilder::new(hosts)
    }

    /// Resolves the port for a candidate without an explicit one.
    #[must_use]
    pub fn port_for(&self, security: Security) -> u16 {
        self.port.unwrap_or_else(|| security.default_port())
    }
}

/// Builder for session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    /// Creates a new builder with the given host list.
    #[must_use]
    pub fn new(hosts: impl Into<String>) -> Self {
        Self {
            config: SessionConfig::new(hosts),
        }
    }

    /// Sets the port used by entries that do not name one.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.config.port = Some(port);
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.config.security = security;
        self
    }

    /// Sets the AUTH credentials.
    #[must_use]
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.config.credentials = Some(credentials);
        self
    }

    /// Sets the name announced in EHLO/HELO.
    #[must_use]
    pub fn helo_name(mut self, name: impl Into<String>) -> Self {
        self.config.helo_name = name.into();
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Sets the I/O timeout.
    #[must_use]
    pub const fn io_timeout(mut self, timeout: Duration) -> Self {
        self.config.io_timeout = timeout;
        self
    }

    /// Enables or disables opportunistic STARTTLS.
    #[must_use]
    pub const fn auto_tls(mut self, enabled: bool) -> Self {
        self.config.auto_tls = enabled;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> SessionConfig {
        self.config
    }
}

#[cfg(feature = "serde")]
mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
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
    fn test_default_ports() {
        assert_eq!(Security::None.default_port(), 25);
        assert_eq!(Security::StartTls.default_port(), 587);
        assert_eq!(Security::Implicit.default_port(), 465);
    }

    #[test]
    fn test_config_new() {
        let config = SessionConfig::new("smtp.example.com");
        assert_eq!(config.hosts, "smtp.example.com");
        assert_eq!(config.security, Security::None);
        assert!(config.auto_tls);
        assert!(config.credentials.is_none());
        assert_eq!(config.port_for(Security::Implicit), 465);
    }

    #[test]
    fn test_builder() {
        let config = SessionConfig::builder("a.example.com;b.example.com")
            .port(2525)
            .security(Security::StartTls)
            .credentials(Credentials::new("user", "pass"))
            .helo_name("client.example.com")
            .connect_timeout(Duration::from_secs(5))
            .io_timeout(Duration::from_secs(10))
            .auto_tls(false)
            .build();

        assert_eq!(config.port_for(Security::Implicit), 2525);
        assert_eq!(config.security, Security::StartTls);
        assert_eq!(config.credentials.unwrap().username(), "user");
        assert_eq!(config.helo_name, "client.example.com");
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.io_timeout, Duration::from_secs(10));
        assert!(!config.auto_tls);
    }
}
