//! # mailforge-core
//!
//! Send orchestration on top of `mailforge-mime` and `mailforge-smtp`.
//!
//! A [`Mailer`] takes a [`Message`](mailforge_mime::Message) through four
//! steps:
//!
//! 1. **Checks** before any I/O: a valid `From`, at least one recipient, a
//!    body (unless [`MailerConfig::allow_empty`]), a valid read-receipt
//!    address and attachment files that still exist.
//! 2. **Assembly** into headers and an encoded MIME body.
//! 3. **Signing**, when [`SigningMaterial`] and a [`Signer`] are configured.
//! 4. **Delivery** over SMTP, `sendmail` or `qmail-inject`.
//!
//! ## Example
//!
//! ```ignore
//! use mailforge_core::{Mailer, MailerConfig};
//! use mailforge_mime::Message;
//!
//! let mut mailer = Mailer::new(MailerConfig::smtp("smtp.example.com"));
//!
//! let mut message = Message::new();
//! message.set_from("sender@example.com", "Sender");
//! message.add_address("recipient@example.com", "");
//! message.set_subject("Hello");
//! message.set_body("Hello, World!");
//!
//! mailer.try_send(&message).await?;
//! ```
//!
//! Errors carry an [`ErrorCategory`] so callers can tell bad input from
//! server rejections and network failures.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod mailer;
mod sign;

pub mod transport;

pub use config::{
    DEFAULT_QMAIL_PATH, DEFAULT_SENDMAIL_PATH, MailerConfig, MailerConfigBuilder, Transport,
};
pub use error::{Error, ErrorCategory, Result};
pub use mailer::Mailer;
pub use sign::{Signer, SigningMaterial};
