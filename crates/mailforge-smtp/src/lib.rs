//! # mailforge-smtp
//!
//! An SMTP submission client implementing RFC 5321.
//!
//! ## Features
//!
//! - **Host lists**: `;`-separated candidates with `ssl://`/`tls://` prefixes
//!   and bracketed IPv6 literals, tried in order
//! - **TLS**: implicit TLS (port 465), required STARTTLS, or opportunistic
//!   STARTTLS when the server offers it
//! - **Authentication**: CRAM-MD5, LOGIN, PLAIN, XOAUTH2
//! - **Extensions**: PIPELINING, 8BITMIME, SMTPUTF8, SIZE, DSN
//! - **Keep-alive**: one session delivers any number of messages
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailforge_smtp::{Credentials, Envelope, Security, SessionConfig, SmtpSession};
//!
//! #[tokio::main]
//! async fn main() -> mailforge_smtp::Result<()> {
//!     let config = SessionConfig::builder("smtp1.example.com;smtp2.example.com")
//!         .security(Security::StartTls)
//!         .credentials(Credentials::new("user@example.com", "password"))
//!         .build();
//!     let mut session = SmtpSession::new(config);
//!
//!     let envelope = Envelope::new("sender@example.com", ["recipient@example.com"])?;
//!     let message = b"Subject: Test\r\n\r\nHello, World!\r\n";
//!     session.send(&envelope, message).await?;
//!     session.close().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Session States
//!
//! ```text
//! Disconnected ── connect() ──→ Connected ── EHLO ──→ Greeted ── AUTH ──→ Authenticated
//!                                                        │                     │
//!                                                        └──── MAIL FROM ──────┤
//!                                                                              ↓
//!                          Greeted/Authenticated ←── DATA/RSET ── InTransaction
//! ```
//!
//! Any state falls back to `Disconnected` on QUIT, a transport error or a
//! timeout.
//!
//! ## Modules
//!
//! - [`command`]: SMTP command builders
//! - [`host`]: host list parsing
//! - [`parser`]: reply parser
//! - [`transport`]: connection traits and the TCP/rustls implementation
//! - [`types`]: addresses, extensions, replies, DSN requests

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod auth;
pub mod command;
mod config;
mod error;
pub mod host;
pub mod parser;
mod session;
pub mod transport;
pub mod types;

pub use auth::{Credentials, select_mechanism};
pub use config::{Security, SessionConfig, SessionConfigBuilder};
pub use error::{Error, Result};
pub use host::{HostCandidate, parse_hosts};
pub use session::{Envelope, SessionState, SmtpSession};
pub use transport::{ConnectOptions, Connection, Connector, TcpConnection, TcpConnector};
pub use types::{Address, AuthMechanism, DsnNotify, Extension, Reply, ReplyCode, ServerInfo};
