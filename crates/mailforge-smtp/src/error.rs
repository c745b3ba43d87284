//! Error types for SMTP operations.

use std::io;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
///
/// Errors split into two groups. Protocol errors ([`Error::Smtp`],
/// [`Error::Protocol`], [`Error::Auth`]) mean the server answered but
/// refused or misbehaved. Transport errors ([`Error::Io`], [`Error::Tls`],
/// [`Error::Timeout`], [`Error::Connect`]) mean the conversation itself broke
/// down and the session is no longer usable.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// A connect, read or write did not finish in time.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// No host in the host list accepted a connection.
    #[error("SMTP connect() failed: {0}")]
    Connect(String),

    /// Server returned an error response.
    #[error("SMTP error {code}: {message}")]
    Smtp {
        /// Reply code (e.g., 550).
        code: u16,
        /// Error message from server.
        message: String,
    },

    /// Protocol error (unexpected or malformed response).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Command argument contains a line break.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Authentication could not be attempted or was rejected.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Feature not supported by server.
    #[error("Server does not support {0}")]
    NotSupported(String),

    /// Invalid state for operation.
    #[error("Invalid state for operation: {0}")]
    InvalidState(String),

    /// Host list entry could not be parsed.
    #[error("Invalid host: {0}")]
    InvalidHost(String),
}

impl Error {
    /// Creates an SMTP error from a reply code and message.
    #[must_use]
    pub fn smtp_error(code: u16, message: impl Into<String>) -> Self {
        Self::Smtp {
            code,
            message: message.into(),
        }
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Smtp { code, .. } if *code >= 500 && *code < 600)
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Smtp { code, .. } if *code >= 400 && *code < 500)
    }

    /// Returns true if the connection broke down.
    ///
    /// A session that produced a transport error is closed.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::Tls(_) | Self::Timeout(_) | Self::Connect(_)
        )
    }

    /// Returns true if the server answered with a refusal or an unexpected reply.
    #[must_use]
    pub const fn is_protocol(&self) -> bool {
        matches!(
            self,
            Self::Smtp { .. } | Self::Protocol(_) | Self::Auth(_) | Self::NotSupported(_)
        )
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
    fn test_reply_classes() {
        let permanent = Error::smtp_error(550, "No such user");
        assert!(permanent.is_permanent());
        assert!(!permanent.is_transient());
        assert!(permanent.is_protocol());
        assert!(!permanent.is_transport());

        let transient = Error::smtp_error(451, "Try later");
        assert!(transient.is_transient());
        assert_eq!(transient.to_string(), "SMTP error 451: Try later");
    }

    #[test]
    fn test_transport_errors() {
        assert!(Error::Timeout("read".into()).is_transport());
        assert!(Error::Connect("no hosts".into()).is_transport());
        assert!(Error::from(io::Error::from(io::ErrorKind::BrokenPipe)).is_transport());
        assert!(!Error::InvalidArgument("x".into()).is_transport());
    }
}
