//! # mailforge-mime
//!
//! Message composition for outgoing email.
//!
//! ## Features
//!
//! - **Addresses**: RFC 5322 validation, IDN domains converted to punycode,
//!   duplicate-free recipient sets
//! - **Header encoding**: RFC 2047 `B`/`Q` encoded-words folded on character
//!   boundaries
//! - **Assembly**: multipart `mixed`/`related`/`alternative` trees with
//!   attachments and embedded images
//! - **Body encoding**: 7bit, 8bit, base64, quoted-printable and binary, with
//!   automatic downgrade and long-line protection
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailforge_mime::{Message, assemble};
//!
//! let mut message = Message::new();
//! message.set_from("sender@example.com", "Sender");
//! message.add_address("recipient@example.com", "Recipient");
//! message.set_subject("Hello");
//! message.set_body("Hello, World!");
//!
//! let assembled = assemble(&message)?;
//! let bytes = assembled.to_bytes();
//! ```
//!
//! ### HTML with an embedded image
//!
//! ```ignore
//! use mailforge_mime::{Disposition, Message, TransferEncoding};
//!
//! let mut message = Message::new();
//! message.set_html(true);
//! message.set_body(r#"<img src="cid:logo">"#);
//! message.set_alt_body("Our logo");
//! message.add_embedded_image(
//!     "logo.png",
//!     "logo",
//!     "",
//!     TransferEncoding::Base64,
//!     "",
//!     Disposition::Inline,
//! );
//! ```
//!
//! ### Header encoding
//!
//! ```ignore
//! use mailforge_mime::encoding::{HeaderPosition, encode_header, MAIL_MAX_LINE_LENGTH};
//!
//! let subject = encode_header("Héllo", "utf-8", HeaderPosition::Text, MAIL_MAX_LINE_LENGTH);
//! assert_eq!(subject, "=?utf-8?Q?H=C3=A9llo?=");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod assemble;
mod attachment;
mod content_type;
mod error;
mod header;
mod message;

pub mod address;
pub mod encoding;

pub use address::{
    Address, RecipientKind, Recipients, canonicalize, idn_supported, validate_address,
};
pub use assemble::{
    AssembleOptions, AssembledMessage, MULTIPART_PREAMBLE, assemble, assemble_with,
};
pub use attachment::{
    Attachment, ContentSource, Disposition, FileSource, LocalFiles, file_is_accessible,
    is_permitted_path,
};
pub use content_type::{ContentType, quote_parameter};
pub use error::{Error, Result};
pub use header::Headers;
pub use message::{DEFAULT_X_MAILER, Message, MessageType, TransferEncoding};
