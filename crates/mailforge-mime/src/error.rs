//! Error types for MIME operations.

use std::string::FromUtf8Error;

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// MIME error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Address failed RFC 5322 validation.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Address is already present in the recipient set.
    #[error("Duplicate address ignored: {0}")]
    DuplicateAddress(String),

    /// Content-transfer-encoding name outside the supported set.
    #[error("Unknown encoding: {0}")]
    UnsupportedEncoding(String),

    /// Malformed encoded data.
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// Header name or value rejected.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Invalid content type.
    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    /// Attachment source is missing, unreadable or not a local file.
    #[error("Could not access file: {0}")]
    FileAccess(String),

    /// I/O error while reading attachment content.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Base64 decode error.
    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// UTF-8 decode error.
    #[error("UTF-8 decode error: {0}")]
    Utf8Decode(#[from] FromUtf8Error),
}
