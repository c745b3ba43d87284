//! SMTP command builder.

use std::fmt::Write;

use crate::error::{Error, Result};
use crate::types::{Address, AuthMechanism, DsnNotify};

/// Optional `MAIL FROM` parameters. Each is only sent when the server
/// advertised the matching extension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MailParams {
    /// `BODY=8BITMIME`
    pub eight_bit_mime: bool,
    /// `SMTPUTF8`
    pub smtp_utf8: bool,
    /// `SIZE=n`
    pub size: Option<usize>,
}

/// SMTP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// HELO - Simple greeting
    Helo {
        /// Client hostname
        hostname: String,
    },
    /// EHLO - Extended greeting
    Ehlo {
        /// Client hostname
        hostname: String,
    },
    /// STARTTLS - Upgrade to TLS
    StartTls,
    /// AUTH - Begin authentication
    Auth {
        /// Authentication mechanism
        mechanism: AuthMechanism,
        /// Initial response (SASL-IR), already base64 encoded
        initial_response: Option<String>,
    },
    /// A base64 line answering a `334` challenge.
    AuthResponse(String),
    /// MAIL FROM - Start mail transaction
    MailFrom {
        /// Reverse path
        from: Address,
        /// Extension parameters
        params: MailParams,
    },
    /// RCPT TO - Add recipient
    RcptTo {
        /// Forward path
        to: Address,
        /// DSN notify conditions
        notify: Option<DsnNotify>,
    },
    /// DATA - Begin message data
    Data,
    /// RSET - Reset transaction
    Rset,
    /// NOOP - No operation
    Noop,
    /// QUIT - Close connection
    Quit,
}

impl Command {
    /// Serializes the command to a CRLF-terminated line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if any argument contains CR or LF.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let line = self.render(false);
        if line.contains(['\r', '\n']) {
            return Err(Error::InvalidArgument(format!(
                "line break in command {}",
                self.render(true).escape_debug()
            )));
        }

        let mut buf = line.into_bytes();
        buf.extend_from_slice(b"\r\n");
        Ok(buf)
    }

    /// The command as it may appear in logs, with credentials masked.
    #[must_use]
    pub fn log_line(&self) -> String {
        self.render(true)
    }

    fn render(&self, redact: bool) -> String {
        let secret = |value: &str| {
            if redact {
                "<redacted>".to_string()
            } else {
                value.to_string()
            }
        };

        match self {
            Self::Helo { hostname } => format!("HELO {hostname}"),
            Self::Ehlo { hostname } => format!("EHLO {hostname}"),
            Self::StartTls => "STARTTLS".into(),
            Self::Auth {
                mechanism,
                initial_response: None,
            } => format!("AUTH {mechanism}"),
            Self::Auth {
                mechanism,
                initial_response: Some(response),
            } => format!("AUTH {mechanism} {}", secret(response)),
            Self::AuthResponse(response) => secret(response),
            Self::MailFrom { from, params } => {
                let mut line = format!("MAIL FROM:{from}");
                if params.eight_bit_mime {
                    line.push_str(" BODY=8BITMIME");
                }
                if params.smtp_utf8 {
                    line.push_str(" SMTPUTF8");
                }
                if let Some(size) = params.size {
                    let _ = write!(line, " SIZE={size}");
                }
                line
            }
            Self::RcptTo { to, notify } => {
                let notify = notify.map(DsnNotify::to_param).unwrap_or_default();
                format!("RCPT TO:{to}{notify}")
            }
            Self::Data => "DATA".into(),
            Self::Rset => "RSET".into(),
            Self::Noop => "NOOP".into(),
            Self::Quit => "QUIT".into(),
        }
    }
}

/// Prepares message data for the DATA phase.
///
/// Line endings are normalized to CRLF, lines starting with `.` get an extra
/// leading dot, and the terminating `.` line is appended.
#[must_use]
pub fn dot_stuff(message: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(message.len() + 64);
    let body = message.strip_suffix(b"\n").unwrap_or(message);
    let body = body.strip_suffix(b"\r").unwrap_or(body);

    if !message.is_empty() {
        for line in body.split(|&b| b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.first() == Some(&b'.') {
                out.push(b'.');
            }
            out.extend_from_slice(line);
            out.extend_from_slice(b"\r\n");
        }
    }

    out.extend_from_slice(b".\r\n");
    out
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

    fn address(s: &str) -> Address {
        Address::new(s).unwrap()
    }

    #[test]
    fn test_greetings() {
        let cmd = Command::Ehlo {
            hostname: "client.example.com".to_string(),
        };
        assert_eq!(cmd.serialize().unwrap(), b"EHLO client.example.com\r\n");
        let cmd = Command::Helo {
            hostname: "[127.0.0.1]".to_string(),
        };
        assert_eq!(cmd.serialize().unwrap(), b"HELO [127.0.0.1]\r\n");
    }

    #[test]
    fn test_auth_is_redacted_in_logs() {
        let cmd = Command::Auth {
            mechanism: AuthMechanism::Plain,
            initial_response: Some("AHVzZXIAcGFzcw==".to_string()),
        };
        assert_eq!(cmd.serialize().unwrap(), b"AUTH PLAIN AHVzZXIAcGFzcw==\r\n");
        assert_eq!(cmd.log_line(), "AUTH PLAIN <redacted>");

        let cmd = Command::AuthResponse("c2VjcmV0".into());
        assert_eq!(cmd.serialize().unwrap(), b"c2VjcmV0\r\n");
        assert_eq!(cmd.log_line(), "<redacted>");
    }

    #[test]
    fn test_mail_from_simple() {
        let cmd = Command::MailFrom {
            from: address("sender@example.com"),
            params: MailParams::default(),
        };
        assert_eq!(cmd.serialize().unwrap(), b"MAIL FROM:<sender@example.com>\r\n");
    }

    #[test]
    fn test_mail_from_null_path_with_params() {
        let cmd = Command::MailFrom {
            from: Address::null(),
            params: MailParams {
                eight_bit_mime: true,
                smtp_utf8: true,
                size: Some(12345),
            },
        };
        assert_eq!(
            cmd.serialize().unwrap(),
            b"MAIL FROM:<> BODY=8BITMIME SMTPUTF8 SIZE=12345\r\n"
        );
    }

    #[test]
    fn test_rcpt_to_with_notify() {
        let cmd = Command::RcptTo {
            to: address("recipient@example.com"),
            notify: DsnNotify::parse("SUCCESS,FAILURE"),
        };
        assert_eq!(
            cmd.serialize().unwrap(),
            b"RCPT TO:<recipient@example.com> NOTIFY=SUCCESS,FAILURE\r\n"
        );
    }

    #[test]
    fn test_line_break_in_argument_is_rejected() {
        let cmd = Command::Ehlo {
            hostname: "evil\r\nRSET".to_string(),
        };
        assert!(matches!(cmd.serialize(), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_simple_verbs() {
        assert_eq!(Command::Data.serialize().unwrap(), b"DATA\r\n");
        assert_eq!(Command::Rset.serialize().unwrap(), b"RSET\r\n");
        assert_eq!(Command::Noop.serialize().unwrap(), b"NOOP\r\n");
        assert_eq!(Command::Quit.serialize().unwrap(), b"QUIT\r\n");
        assert_eq!(Command::StartTls.serialize().unwrap(), b"STARTTLS\r\n");
    }

    #[test]
    fn test_dot_stuffing() {
        assert_eq!(
            dot_stuff(b"Subject: x\n\n.hidden\nline\n"),
            b"Subject: x\r\n\r\n..hidden\r\nline\r\n.\r\n"
        );
        assert_eq!(dot_stuff(b"a\r\n.\r\nb"), b"a\r\n..\r\nb\r\n.\r\n");
        assert_eq!(dot_stuff(b""), b".\r\n");
    }
}
