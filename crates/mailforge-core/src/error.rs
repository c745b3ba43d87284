//! Error types for sending.

use std::path::PathBuf;

/// Result type alias for send operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while preparing or delivering a message.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The message failed a precondition checked before any I/O.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Assembling the message failed.
    #[error(transparent)]
    Mime(#[from] mailforge_mime::Error),

    /// The SMTP conversation failed.
    #[error(transparent)]
    Smtp(#[from] mailforge_smtp::Error),

    /// The mail program could not be started or fed.
    #[error("Could not execute {}: {source}", program.display())]
    Process {
        /// Program that was run.
        program: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The mail program exited unsuccessfully.
    #[error("{} exited with {status}: {stderr}", program.display())]
    ProcessFailed {
        /// Program that was run.
        program: PathBuf,
        /// Exit status description.
        status: String,
        /// Captured standard error.
        stderr: String,
    },

    /// Signing the message failed.
    #[error("Signing error: {0}")]
    Signing(String),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad input: addresses, empty body, missing sender or recipients.
    Validation,
    /// A file or other local resource is unavailable.
    Resource,
    /// The server replied with an error or broke the protocol.
    Protocol,
    /// The connection or mail program failed.
    Transport,
    /// The signer failed or was not configured.
    Signing,
}

impl Error {
    /// Returns the category of this error.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Mime(e) => match e {
                mailforge_mime::Error::FileAccess(_) | mailforge_mime::Error::Io(_) => {
                    ErrorCategory::Resource
                }
                _ => ErrorCategory::Validation,
            },
            Self::Smtp(e) => match e {
                mailforge_smtp::Error::InvalidArgument(_)
                | mailforge_smtp::Error::InvalidAddress(_) => ErrorCategory::Validation,
                e if e.is_transport() => ErrorCategory::Transport,
                _ => ErrorCategory::Protocol,
            },
            Self::Process { .. } | Self::ProcessFailed { .. } => ErrorCategory::Transport,
            Self::Signing(_) => ErrorCategory::Signing,
        }
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
    fn test_categories() {
        assert_eq!(
            Error::Validation("no recipients".into()).category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            Error::from(mailforge_mime::Error::FileAccess("a.txt".into())).category(),
            ErrorCategory::Resource
        );
        assert_eq!(
            Error::from(mailforge_mime::Error::InvalidAddress("x".into())).category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            Error::from(mailforge_smtp::Error::smtp_error(550, "no such user")).category(),
            ErrorCategory::Protocol
        );
        assert_eq!(
            Error::from(mailforge_smtp::Error::Timeout("read".into())).category(),
            ErrorCategory::Transport
        );
        assert_eq!(
            Error::from(mailforge_smtp::Error::InvalidArgument("CR".into())).category(),
            ErrorCategory::Validation
        );
        assert_eq!(Error::Signing("bad key".into()).category(), ErrorCategory::Signing);
    }

    #[test]
    fn test_display_is_transparent() {
        let err = Error::from(mailforge_smtp::Error::smtp_error(550, "no such user"));
        assert_eq!(
            err.to_string(),
            mailforge_smtp::Error::smtp_error(550, "no such user").to_string()
        );
    }
}
