//! S/MIME signing seam.
//!
//! The crate ships no cryptography. A [`Signer`] receives the MIME entity
//! (content headers, blank line, body) and returns the signed entity, such
//! as a `multipart/signed` wrapper, which replaces the original.

use std::fmt;
use std::path::PathBuf;

use crate::error::Result;

/// Certificate, key and chain used to sign outgoing messages.
#[derive(Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct SigningMaterial {
    /// Signing certificate (PEM).
    pub cert: PathBuf,
    /// Private key (PEM).
    pub key: PathBuf,
    /// Passphrase protecting the key.
    #[cfg_attr(feature = "serde", serde(default))]
    pub passphrase: Option<String>,
    /// Additional certificates to include in the signature.
    #[cfg_attr(feature = "serde", serde(default))]
    pub extra_certs: Option<PathBuf>,
}

impl SigningMaterial {
    /// Creates signing material without a passphrase or extra certificates.
    #[must_use]
    pub fn new(cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        Self {
            cert: cert.into(),
            key: key.into(),
            passphrase: None,
            extra_certs: None,
        }
    }

    /// Sets the key passphrase.
    #[must_use]
    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    /// Sets the extra certificate chain file.
    #[must_use]
    pub fn with_extra_certs(mut self, path: impl Into<PathBuf>) -> Self {
        self.extra_certs = Some(path.into());
        self
    }
}

impl fmt::Debug for SigningMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningMaterial")
            .field("cert", &self.cert)
            .field("key", &self.key)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .field("extra_certs", &self.extra_certs)
            .finish()
    }
}

/// Produces a signed MIME entity.
pub trait Signer: Send + Sync {
    /// Signs `entity` with `material`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Signing`](crate::Error::Signing) if the material
    /// cannot be loaded or signing fails.
    fn sign(&self, entity: &[u8], material: &SigningMaterial) -> Result<Vec<u8>>;
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
    fn test_debug_redacts_passphrase() {
        let material = SigningMaterial::new("cert.pem", "key.pem").with_passphrase("hunter2");
        let debug = format!("{material:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_builders() {
        let material = SigningMaterial::new("cert.pem", "key.pem").with_extra_certs("chain.pem");
        assert_eq!(material.extra_certs, Some(PathBuf::from("chain.pem")));
        assert!(material.passphrase.is_none());
    }
}
