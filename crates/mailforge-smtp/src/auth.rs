//! SASL credentials and mechanism payloads (RFC 4954).

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};

use crate::error::{Error, Result};
use crate::types::AuthMechanism;

type HmacMd5 = Hmac<md5::Md5>;

/// Login credentials for SMTP AUTH.
///
/// Holds a password for PLAIN, LOGIN and CRAM-MD5, and an `OAuth2` access
/// token for XOAUTH2. Either may be absent; mechanisms that need the missing
/// one are skipped during automatic selection.
#[derive(Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct Credentials {
    username: String,
    #[cfg_attr(feature = "serde", serde(default))]
    password: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    oauth_token: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    mechanism: Option<AuthMechanism>,
}

impl Credentials {
    /// Username and password credentials.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Some(password.into()),
            ..Self::default()
        }
    }

    /// Username and `OAuth2` access token credentials.
    #[must_use]
    pub fn oauth(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            oauth_token: Some(token.into()),
            ..Self::default()
        }
    }

    /// Forces a mechanism instead of picking one from the server's list.
    #[must_use]
    pub const fn with_mechanism(mut self, mechanism: AuthMechanism) -> Self {
        self.mechanism = Some(mechanism);
        self
    }

    /// Returns the username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the configured mechanism, if any.
    #[must_use]
    pub const fn mechanism(&self) -> Option<AuthMechanism> {
        self.mechanism
    }

    const fn can_use(&self, mechanism: AuthMechanism) -> bool {
        match mechanism {
            AuthMechanism::XOAuth2 => self.oauth_token.is_some(),
            AuthMechanism::Plain | AuthMechanism::Login | AuthMechanism::CramMd5 => {
                self.password.is_some()
            }
        }
    }

    fn password(&self) -> Result<&str> {
        self.password
            .as_deref()
            .ok_or_else(|| Error::Auth("no password configured".into()))
    }

    fn token(&self) -> Result<&str> {
        self.oauth_token
            .as_deref()
            .ok_or_else(|| Error::Auth("no OAuth token configured".into()))
    }

    /// `AUTH PLAIN` initial response: `\0user\0password`, base64 encoded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if no password is configured.
    pub fn plain_response(&self) -> Result<String> {
        let password = self.password()?;
        Ok(STANDARD.encode(format!("\0{}\0{password}", self.username)))
    }

    /// `AUTH LOGIN` answers to the username and password prompts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if no password is configured.
    pub fn login_responses(&self) -> Result<(String, String)> {
        let password = self.password()?;
        Ok((STANDARD.encode(&self.username), STANDARD.encode(password)))
    }

    /// `AUTH CRAM-MD5` answer to a base64 challenge:
    /// `user hex(hmac_md5(password, challenge))`, base64 encoded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if no password is configured or the challenge
    /// is not valid base64.
    pub fn cram_md5_response(&self, challenge: &str) -> Result<String> {
        let password = self.password()?;
        let challenge = STANDARD
            .decode(challenge.trim())
            .map_err(|e| Error::Auth(format!("invalid CRAM-MD5 challenge: {e}")))?;

        let mut mac = HmacMd5::new_from_slice(password.as_bytes())
            .map_err(|e| Error::Auth(format!("invalid CRAM-MD5 key: {e}")))?;
        mac.update(&challenge);
        let digest = hex::encode(mac.finalize().into_bytes());

        Ok(STANDARD.encode(format!("{} {digest}", self.username)))
    }

    /// `AUTH XOAUTH2` initial response.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if no token is configured.
    pub fn xoauth2_response(&self) -> Result<String> {
        let token = self.token()?;
        Ok(STANDARD.encode(format!(
            "user={}\x01auth=Bearer {token}\x01\x01",
            self.username
        )))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("oauth_token", &self.oauth_token.as_ref().map(|_| "<redacted>"))
            .field("mechanism", &self.mechanism)
            .finish()
    }
}

/// Picks the mechanism to authenticate with.
///
/// A configured mechanism must be advertised. Otherwise the first advertised
/// mechanism usable with the credentials wins, in the order CRAM-MD5, LOGIN,
/// PLAIN, XOAUTH2.
///
/// # Errors
///
/// Returns [`Error::NotSupported`] if the configured mechanism is not
/// advertised, and [`Error::Auth`] if nothing usable is.
pub fn select_mechanism(
    credentials: &Credentials,
    advertised: &[AuthMechanism],
) -> Result<AuthMechanism> {
    if let Some(mechanism) = credentials.mechanism {
        if !advertised.contains(&mechanism) {
            return Err(Error::NotSupported(format!("AUTH {mechanism}")));
        }
        if !credentials.can_use(mechanism) {
            return Err(Error::Auth(format!("missing secret for {mechanism}")));
        }
        return Ok(mechanism);
    }

    AuthMechanism::PREFERENCE
        .into_iter()
        .find(|m| advertised.contains(m) && credentials.can_use(*m))
        .ok_or_else(|| Error::Auth("no supported authentication mechanism advertised".into()))
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

    fn decode(s: &str) -> Vec<u8> {
        STANDARD.decode(s).unwrap()
    }

    #[test]
    fn test_plain_response() {
        let creds = Credentials::new("user", "pass");
        assert_eq!(decode(&creds.plain_response().unwrap()), b"\0user\0pass");
    }

    #[test]
    fn test_login_responses() {
        let (user, pass) = Credentials::new("user", "pass").login_responses().unwrap();
        assert_eq!(user, "dXNlcg==");
        assert_eq!(pass, "cGFzcw==");
    }

    #[test]
    fn test_cram_md5_rfc2195_vector() {
        let creds = Credentials::new("tim", "tanstaaftanstaaf");
        let response = creds
            .cram_md5_response("PDE4OTYuNjk3MTcwOTUyQHBvc3RvZmZpY2UucmVzdG9uLm1jaS5uZXQ+")
            .unwrap();
        assert_eq!(
            String::from_utf8(decode(&response)).unwrap(),
            "tim b913a602c7eda7a495b4e6e7334d3890"
        );
    }

    #[test]
    fn test_cram_md5_bad_challenge() {
        let creds = Credentials::new("tim", "x");
        assert!(matches!(
            creds.cram_md5_response("not base64!"),
            Err(Error::Auth(_))
        ));
    }

    #[test]
    fn test_xoauth2_response() {
        let creds = Credentials::oauth("user@example.com", "ya29.token");
        assert_eq!(
            decode(&creds.xoauth2_response().unwrap()),
            b"user=user@example.com\x01auth=Bearer ya29.token\x01\x01"
        );
        assert!(creds.plain_response().is_err());
    }

    #[test]
    fn test_select_prefers_cram_md5() {
        let creds = Credentials::new("u", "p");
        let advertised = [AuthMechanism::Plain, AuthMechanism::Login, AuthMechanism::CramMd5];
        assert_eq!(
            select_mechanism(&creds, &advertised).unwrap(),
            AuthMechanism::CramMd5
        );
        assert_eq!(
            select_mechanism(&creds, &[AuthMechanism::Plain, AuthMechanism::XOAuth2]).unwrap(),
            AuthMechanism::Plain
        );
    }

    #[test]
    fn test_select_token_only_uses_xoauth2() {
        let creds = Credentials::oauth("u", "t");
        let advertised = [AuthMechanism::Login, AuthMechanism::XOAuth2];
        assert_eq!(
            select_mechanism(&creds, &advertised).unwrap(),
            AuthMechanism::XOAuth2
        );
        assert!(select_mechanism(&creds, &[AuthMechanism::Login]).is_err());
    }

    #[test]
    fn test_select_configured_mechanism() {
        let creds = Credentials::new("u", "p").with_mechanism(AuthMechanism::Login);
        assert_eq!(
            select_mechanism(&creds, &[AuthMechanism::CramMd5, AuthMechanism::Login]).unwrap(),
            AuthMechanism::Login
        );
        assert!(matches!(
            select_mechanism(&creds, &[AuthMechanism::Plain]),
            Err(Error::NotSupported(_))
        ));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let rendered = format!("{:?}", Credentials::new("user", "hunter2"));
        assert!(rendered.contains("user"));
        assert!(!rendered.contains("hunter2"));
    }
}
