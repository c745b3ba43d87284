//! The message model: recipients, content, attachments and per-message settings.

use crate::address::{Address, RecipientKind, Recipients, canonicalize};
use crate::attachment::{
    Attachment, ContentSource, Disposition, FileSource, LocalFiles, file_is_accessible,
};
use crate::encoding::{DEFAULT_CHARSET, MAX_LINE_LENGTH};
use crate::error::{Error, Result};
use regex::Regex;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};

/// Default `X-Mailer` header value.
pub const DEFAULT_X_MAILER: &str = concat!("mailforge ", env!("CARGO_PKG_VERSION"));

/// Content-transfer-encodings (RFC 2045 section 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    #[cfg_attr(feature = "serde", serde(rename = "7bit"))]
    SevenBit,
    /// 8-bit text with line length limits.
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "8bit"))]
    EightBit,
    /// Base64 encoding.
    #[cfg_attr(feature = "serde", serde(rename = "base64"))]
    Base64,
    /// Quoted-Printable encoding.
    #[cfg_attr(feature = "serde", serde(rename = "quoted-printable"))]
    QuotedPrintable,
    /// Binary (no encoding).
    #[cfg_attr(feature = "serde", serde(rename = "binary"))]
    Binary,
}

impl TransferEncoding {
    /// Returns the header token for this encoding.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SevenBit => "7bit",
            Self::EightBit => "8bit",
            Self::Base64 => "base64",
            Self::QuotedPrintable => "quoted-printable",
            Self::Binary => "binary",
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransferEncoding {
    type Err = Error;

    /// Parses an encoding name, ignoring case and surrounding whitespace.
    ///
    /// Names outside the five supported encodings are rejected.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "7bit" => Ok(Self::SevenBit),
            "8bit" => Ok(Self::EightBit),
            "base64" => Ok(Self::Base64),
            "quoted-printable" => Ok(Self::QuotedPrintable),
            "binary" => Ok(Self::Binary),
            _ => Err(Error::UnsupportedEncoding(s.trim().to_string())),
        }
    }
}

/// Shape of the MIME tree, derived from which kinds of content are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// A single text or HTML part.
    Plain,
    /// Body plus embedded images.
    Inline,
    /// Body plus attachments.
    Attach,
    /// Body, embedded images and attachments.
    InlineAttach,
    /// Plain text and HTML alternatives.
    Alt,
    /// Alternatives plus embedded images.
    AltInline,
    /// Alternatives plus attachments.
    AltAttach,
    /// Alternatives, embedded images and attachments.
    AltInlineAttach,
}

impl MessageType {
    /// Picks the message type for a combination of content kinds.
    #[must_use]
    pub const fn classify(has_alt: bool, has_inline: bool, has_attachments: bool) -> Self {
        match (has_alt, has_inline, has_attachments) {
            (false, false, false) => Self::Plain,
            (false, true, false) => Self::Inline,
            (false, false, true) => Self::Attach,
            (false, true, true) => Self::InlineAttach,
            (true, false, false) => Self::Alt,
            (true, true, false) => Self::AltInline,
            (true, false, true) => Self::AltAttach,
            (true, true, true) => Self::AltInlineAttach,
        }
    }

    /// Returns `true` if the body has a plain text alternative.
    #[must_use]
    pub const fn has_alternative(self) -> bool {
        matches!(
            self,
            Self::Alt | Self::AltInline | Self::AltAttach | Self::AltInlineAttach
        )
    }

    /// Returns `true` if embedded images are present.
    #[must_use]
    pub const fn has_inline(self) -> bool {
        matches!(
            self,
            Self::Inline | Self::InlineAttach | Self::AltInline | Self::AltInlineAttach
        )
    }

    /// Returns `true` if regular attachments are present.
    #[must_use]
    pub const fn has_attachments(self) -> bool {
        matches!(
            self,
            Self::Attach | Self::InlineAttach | Self::AltAttach | Self::AltInlineAttach
        )
    }

    /// Returns a short identifier such as `alt_inline_attach`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Inline => "inline",
            Self::Attach => "attach",
            Self::InlineAttach => "inline_attach",
            Self::Alt => "alt",
            Self::AltInline => "alt_inline",
            Self::AltAttach => "alt_attach",
            Self::AltInlineAttach => "alt_inline_attach",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[allow(clippy::expect_used)]
static MESSAGE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^<[^<>@\s]+@[^<>@\s]+>$").expect("message-id pattern compiles")
});

/// An email message under construction.
///
/// Setters validate their input and report rejection with `false`, leaving
/// the message unchanged and recording the reason in [`Message::last_error`].
/// Attachment files are checked when added and again when the message is
/// assembled.
#[derive(Debug, Clone)]
pub struct Message {
    from: Option<Address>,
    sender: Option<Address>,
    recipients: Recipients,
    subject: String,
    body: String,
    alt_body: String,
    is_html: bool,
    charset: String,
    encoding: TransferEncoding,
    priority: Option<u8>,
    word_wrap: usize,
    custom_headers: Vec<(String, String)>,
    confirm_reading_to: Option<String>,
    message_id: Option<String>,
    date: Option<String>,
    x_mailer: Option<String>,
    hostname: Option<String>,
    header_line_length: usize,
    max_line_length: usize,
    attachments: Vec<Attachment>,
    files: Arc<dyn FileSource>,
    last_error: Option<String>,
}

impl Default for Message {
    fn default() -> Self {
        Self {
            from: None,
            sender: None,
            recipients: Recipients::new(),
            subject: String::new(),
            body: String::new(),
            alt_body: String::new(),
            is_html: false,
            charset: DEFAULT_CHARSET.to_string(),
            encoding: TransferEncoding::default(),
            priority: None,
            word_wrap: 0,
            custom_headers: Vec::new(),
            confirm_reading_to: None,
            message_id: None,
            date: None,
            x_mailer: Some(DEFAULT_X_MAILER.to_string()),
            hostname: None,
            header_line_length: MAX_LINE_LENGTH,
            max_line_length: MAX_LINE_LENGTH,
            attachments: Vec::new(),
            files: Arc::new(LocalFiles),
            last_error: None,
        }
    }
}

impl Message {
    /// Creates an empty message using the local filesystem for attachments.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty message reading attachment files through `files`.
    #[must_use]
    pub fn with_files(files: Arc<dyn FileSource>) -> Self {
        Self {
            files,
            ..Self::default()
        }
    }

    fn reject(&mut self, error: &Error) -> bool {
        tracing::debug!(error = %error, "Message update rejected");
        self.last_error = Some(error.to_string());
        false
    }

    // ========== Addresses ==========

    /// Sets the `From` address.
    pub fn set_from(&mut self, address: &str, name: &str) -> bool {
        match Address::with_name(address, name) {
            Ok(address) => {
                self.from = Some(address);
                true
            }
            Err(_) => self.reject(&Error::InvalidAddress(format!("(From): {}", address.trim()))),
        }
    }

    /// Sets the envelope sender (return path) used for `MAIL FROM`.
    ///
    /// Defaults to the `From` mailbox when unset. An empty string clears it.
    pub fn set_sender(&mut self, address: &str) -> bool {
        if address.trim().is_empty() {
            self.sender = None;
            return true;
        }
        match canonicalize(address) {
            Ok(address) => {
                self.sender = Some(address);
                true
            }
            Err(e) => self.reject(&e),
        }
    }

    /// Returns the `From` address.
    #[must_use]
    pub const fn from(&self) -> Option<&Address> {
        self.from.as_ref()
    }

    /// Returns the explicit envelope sender, if set.
    #[must_use]
    pub const fn sender(&self) -> Option<&Address> {
        self.sender.as_ref()
    }

    /// Returns the envelope sender: the explicit sender or the `From` mailbox.
    #[must_use]
    pub fn envelope_sender(&self) -> Option<&str> {
        self.sender
            .as_ref()
            .or(self.from.as_ref())
            .map(Address::mailbox)
    }

    fn add_recipient(&mut self, kind: RecipientKind, address: &str, name: &str) -> bool {
        match self.recipients.try_add(kind, address, name) {
            Ok(()) => true,
            Err(e) => self.reject(&e),
        }
    }

    /// Adds a `To` recipient.
    ///
    /// Returns `false` for empty, invalid or duplicate addresses.
    pub fn add_address(&mut self, address: &str, name: &str) -> bool {
        self.add_recipient(RecipientKind::To, address, name)
    }

    /// Adds a `Cc` recipient.
    pub fn add_cc(&mut self, address: &str, name: &str) -> bool {
        self.add_recipient(RecipientKind::Cc, address, name)
    }

    /// Adds a `Bcc` recipient.
    pub fn add_bcc(&mut self, address: &str, name: &str) -> bool {
        self.add_recipient(RecipientKind::Bcc, address, name)
    }

    /// Adds a `Reply-To` address.
    pub fn add_reply_to(&mut self, address: &str, name: &str) -> bool {
        self.add_recipient(RecipientKind::ReplyTo, address, name)
    }

    /// Removes all `To` recipients.
    pub fn clear_addresses(&mut self) {
        self.recipients.clear(RecipientKind::To);
    }

    /// Removes all `Cc` recipients.
    pub fn clear_ccs(&mut self) {
        self.recipients.clear(RecipientKind::Cc);
    }

    /// Removes all `Bcc` recipients.
    pub fn clear_bccs(&mut self) {
        self.recipients.clear(RecipientKind::Bcc);
    }

    /// Removes all `Reply-To` addresses.
    pub fn clear_reply_tos(&mut self) {
        self.recipients.clear(RecipientKind::ReplyTo);
    }

    /// Removes every `To`, `Cc` and `Bcc` recipient.
    pub fn clear_all_recipients(&mut self) {
        self.recipients.clear_all();
    }

    /// Returns the recipient sets.
    #[must_use]
    pub const fn recipients(&self) -> &Recipients {
        &self.recipients
    }

    /// Sets the read-receipt address (`Disposition-Notification-To`).
    ///
    /// The address is trimmed and canonicalized. An invalid address is
    /// still stored so that sending fails, and `false` is returned.
    pub fn set_confirm_reading_to(&mut self, address: &str) -> bool {
        let trimmed = address.trim();
        if trimmed.is_empty() {
            self.confirm_reading_to = None;
            return true;
        }
        match canonicalize(trimmed) {
            Ok(canonical) => {
                self.confirm_reading_to = Some(canonical.mailbox().to_string());
                true
            }
            Err(e) => {
                self.confirm_reading_to = Some(trimmed.to_string());
                self.reject(&e)
            }
        }
    }

    /// Returns the read-receipt address.
    #[must_use]
    pub fn confirm_reading_to(&self) -> Option<&str> {
        self.confirm_reading_to.as_deref()
    }

    // ========== Content ==========

    /// Sets the subject.
    pub fn set_subject(&mut self, subject: impl Into<String>) {
        self.subject = subject.into();
    }

    /// Returns the subject.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Sets the main body, plain text or HTML depending on [`Message::set_html`].
    pub fn set_body(&mut self, body: impl Into<String>) {
        self.body = body.into();
    }

    /// Returns the main body.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Sets the plain text alternative shown by clients without HTML support.
    pub fn set_alt_body(&mut self, alt_body: impl Into<String>) {
        self.alt_body = alt_body.into();
    }

    /// Returns the plain text alternative.
    #[must_use]
    pub fn alt_body(&self) -> &str {
        &self.alt_body
    }

    /// Marks the main body as HTML.
    pub const fn set_html(&mut self, is_html: bool) {
        self.is_html = is_html;
    }

    /// Returns `true` if the main body is HTML.
    #[must_use]
    pub const fn is_html(&self) -> bool {
        self.is_html
    }

    /// Sets the character set of text parts and encoded headers.
    pub fn set_charset(&mut self, charset: impl Into<String>) {
        self.charset = charset.into();
    }

    /// Returns the character set.
    #[must_use]
    pub fn charset(&self) -> &str {
        &self.charset
    }

    /// Sets the transfer encoding requested for text parts.
    pub const fn set_encoding(&mut self, encoding: TransferEncoding) {
        self.encoding = encoding;
    }

    /// Returns the requested transfer encoding.
    #[must_use]
    pub const fn encoding(&self) -> TransferEncoding {
        self.encoding
    }

    /// Sets the `X-Priority` value, 1 (highest) to 5 (lowest).
    pub fn set_priority(&mut self, priority: u8) -> bool {
        if (1..=5).contains(&priority) {
            self.priority = Some(priority);
            true
        } else {
            self.reject(&Error::InvalidHeader(format!(
                "X-Priority out of range: {priority}"
            )))
        }
    }

    /// Removes the `X-Priority` header.
    pub const fn clear_priority(&mut self) {
        self.priority = None;
    }

    /// Returns the priority.
    #[must_use]
    pub const fn priority(&self) -> Option<u8> {
        self.priority
    }

    /// Wraps text at `columns` characters when assembling; 0 disables wrapping.
    pub const fn set_word_wrap(&mut self, columns: usize) {
        self.word_wrap = columns;
    }

    /// Returns the word wrap column.
    #[must_use]
    pub const fn word_wrap(&self) -> usize {
        self.word_wrap
    }

    // ========== Headers ==========

    /// Adds a custom header emitted after the standard headers.
    ///
    /// The name must be printable ASCII without `:` or spaces; the value must
    /// not contain line breaks.
    pub fn add_custom_header(&mut self, name: &str, value: &str) -> bool {
        let name = name.trim();
        let valid_name = !name.is_empty()
            && name
                .bytes()
                .all(|b| (0x21..=0x7E).contains(&b) && b != b':');
        if !valid_name {
            return self.reject(&Error::InvalidHeader(format!("Invalid header name: {name}")));
        }
        if value.contains(['\r', '\n']) {
            return self.reject(&Error::InvalidHeader(format!(
                "Line break in value of {name}"
            )));
        }
        self.custom_headers
            .push((name.to_string(), value.trim().to_string()));
        true
    }

    /// Removes every custom header.
    pub fn clear_custom_headers(&mut self) {
        self.custom_headers.clear();
    }

    /// Returns the custom headers in insertion order.
    #[must_use]
    pub fn custom_headers(&self) -> &[(String, String)] {
        &self.custom_headers
    }

    /// Overrides the generated `Message-ID`.
    ///
    /// The value must look like `<local@domain>`.
    pub fn set_message_id(&mut self, message_id: &str) -> bool {
        let message_id = message_id.trim();
        if MESSAGE_ID.is_match(message_id) {
            self.message_id = Some(message_id.to_string());
            true
        } else {
            self.reject(&Error::InvalidHeader(format!(
                "Invalid Message-ID: {message_id}"
            )))
        }
    }

    /// Returns the `Message-ID` override.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    /// Overrides the `Date` header, which otherwise carries the send time.
    pub fn set_date(&mut self, date: impl Into<String>) {
        self.date = Some(date.into());
    }

    /// Returns the `Date` override.
    #[must_use]
    pub fn date(&self) -> Option<&str> {
        self.date.as_deref()
    }

    /// Sets the `X-Mailer` header; `None` omits it.
    pub fn set_x_mailer(&mut self, x_mailer: Option<String>) {
        self.x_mailer = x_mailer;
    }

    /// Returns the `X-Mailer` value.
    #[must_use]
    pub fn x_mailer(&self) -> Option<&str> {
        self.x_mailer.as_deref()
    }

    /// Sets the host name used in the generated `Message-ID`.
    pub fn set_hostname(&mut self, hostname: impl Into<String>) {
        self.hostname = Some(hostname.into());
    }

    /// Returns the configured host name.
    #[must_use]
    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    /// Sets the line budget used when encoding header values.
    ///
    /// Defaults to [`MAX_LINE_LENGTH`]: ASCII values up to that length are
    /// sent unchanged. Use [`MAIL_MAX_LINE_LENGTH`](crate::encoding::MAIL_MAX_LINE_LENGTH)
    /// for handoffs that rewrap long header lines.
    pub const fn set_header_line_length(&mut self, length: usize) {
        self.header_line_length = length;
    }

    /// Returns the header line budget.
    #[must_use]
    pub const fn header_line_length(&self) -> usize {
        self.header_line_length
    }

    /// Sets the body line length above which quoted-printable is forced.
    pub const fn set_max_line_length(&mut self, length: usize) {
        self.max_line_length = length;
    }

    /// Returns the body line length limit.
    #[must_use]
    pub const fn max_line_length(&self) -> usize {
        self.max_line_length
    }

    // ========== Attachments ==========

    fn add_file(
        &mut self,
        path: &Path,
        name: &str,
        encoding: TransferEncoding,
        mime_type: &str,
        disposition: Disposition,
        cid: Option<&str>,
    ) -> bool {
        let display = path.to_string_lossy();
        if !file_is_accessible(self.files.as_ref(), &display) {
            let error = Error::FileAccess(display.into_owned());
            return self.reject(&error);
        }

        let name = if name.is_empty() {
            path.file_name()
                .map_or_else(String::new, |n| n.to_string_lossy().into_owned())
        } else {
            name.to_string()
        };
        let mut attachment = Attachment::new(
            ContentSource::Path(path.to_path_buf()),
            &name,
            encoding,
            mime_type,
            disposition,
        );
        if let Some(cid) = cid {
            attachment = attachment.with_cid(cid);
        }
        self.attachments.push(attachment);
        true
    }

    /// Attaches a file.
    ///
    /// An empty `name` uses the file name; an empty `mime_type` is guessed
    /// from the name. Returns `false` for empty, URL-like, missing or
    /// unreadable paths.
    pub fn add_attachment(
        &mut self,
        path: impl AsRef<Path>,
        name: &str,
        encoding: TransferEncoding,
        mime_type: &str,
        disposition: Disposition,
    ) -> bool {
        self.add_file(path.as_ref(), name, encoding, mime_type, disposition, None)
    }

    /// Attaches in-memory content under `filename`.
    pub fn add_string_attachment(
        &mut self,
        content: impl Into<Vec<u8>>,
        filename: &str,
        encoding: TransferEncoding,
        mime_type: &str,
        disposition: Disposition,
    ) {
        self.attachments.push(Attachment::new(
            ContentSource::Bytes(content.into()),
            filename,
            encoding,
            mime_type,
            disposition,
        ));
    }

    /// Embeds an image file referenced from HTML as `cid:<cid>`.
    ///
    /// Fails like [`Message::add_attachment`].
    pub fn add_embedded_image(
        &mut self,
        path: impl AsRef<Path>,
        cid: &str,
        name: &str,
        encoding: TransferEncoding,
        mime_type: &str,
        disposition: Disposition,
    ) -> bool {
        self.add_file(
            path.as_ref(),
            name,
            encoding,
            mime_type,
            disposition,
            Some(cid),
        )
    }

    /// Embeds in-memory image content referenced as `cid:<cid>`.
    ///
    /// An empty `name` uses the content-id.
    pub fn add_string_embedded_image(
        &mut self,
        content: impl Into<Vec<u8>>,
        cid: &str,
        name: &str,
        encoding: TransferEncoding,
        mime_type: &str,
        disposition: Disposition,
    ) {
        let name = if name.is_empty() { cid } else { name };
        self.attachments.push(
            Attachment::new(
                ContentSource::Bytes(content.into()),
                name,
                encoding,
                mime_type,
                disposition,
            )
            .with_cid(cid),
        );
    }

    /// Removes all attachments and embedded images.
    pub fn clear_attachments(&mut self) {
        self.attachments.clear();
    }

    /// Returns attachments and embedded images in insertion order.
    #[must_use]
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// Returns `true` if there is at least one non-inline attachment.
    #[must_use]
    pub fn attachment_exists(&self) -> bool {
        self.attachments.iter().any(|a| !a.is_inline())
    }

    /// Returns `true` if there is at least one inline part.
    #[must_use]
    pub fn inline_image_exists(&self) -> bool {
        self.attachments.iter().any(Attachment::is_inline)
    }

    /// Returns `true` if a plain text alternative is set.
    #[must_use]
    pub fn alternative_exists(&self) -> bool {
        !self.alt_body.is_empty()
    }

    /// Returns the MIME tree shape this message will be assembled into.
    #[must_use]
    pub fn message_type(&self) -> MessageType {
        MessageType::classify(
            self.alternative_exists(),
            self.inline_image_exists(),
            self.attachment_exists(),
        )
    }

    /// Returns the attachment file source.
    #[must_use]
    pub fn files(&self) -> &dyn FileSource {
        self.files.as_ref()
    }

    /// Returns the reason the most recent setter or adder failed.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
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
    use std::io::Write;

    #[test]
    fn test_transfer_encoding_parse() {
        assert_eq!(
            "7bit".parse::<TransferEncoding>().unwrap(),
            TransferEncoding::SevenBit
        );
        assert_eq!(
            " BASE64 ".parse::<TransferEncoding>().unwrap(),
            TransferEncoding::Base64
        );
        assert_eq!(
            "quoted-printable".parse::<TransferEncoding>().unwrap(),
            TransferEncoding::QuotedPrintable
        );
        assert_eq!(TransferEncoding::EightBit.to_string(), "8bit");
    }

    #[test]
    fn test_transfer_encoding_unknown_is_error() {
        let err = "invalidencoding".parse::<TransferEncoding>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedEncoding(ref name) if name == "invalidencoding"));
        assert!("".parse::<TransferEncoding>().is_err());
        assert!("uuencode".parse::<TransferEncoding>().is_err());
    }

    #[test]
    fn test_classify_all_combinations() {
        let cases = [
            ((false, false, false), MessageType::Plain, "plain"),
            ((false, true, false), MessageType::Inline, "inline"),
            ((false, false, true), MessageType::Attach, "attach"),
            ((false, true, true), MessageType::InlineAttach, "inline_attach"),
            ((true, false, false), MessageType::Alt, "alt"),
            ((true, true, false), MessageType::AltInline, "alt_inline"),
            ((true, false, true), MessageType::AltAttach, "alt_attach"),
            ((true, true, true), MessageType::AltInlineAttach, "alt_inline_attach"),
        ];
        for ((alt, inline, attach), expected, name) in cases {
            let kind = MessageType::classify(alt, inline, attach);
            assert_eq!(kind, expected);
            assert_eq!(kind.as_str(), name);
            assert_eq!(kind.has_alternative(), alt);
            assert_eq!(kind.has_inline(), inline);
            assert_eq!(kind.has_attachments(), attach);
        }
    }

    #[test]
    fn test_defaults() {
        let message = Message::new();
        assert_eq!(message.charset(), DEFAULT_CHARSET);
        assert_eq!(message.encoding(), TransferEncoding::EightBit);
        assert_eq!(message.header_line_length(), MAX_LINE_LENGTH);
        assert_eq!(message.x_mailer(), Some(DEFAULT_X_MAILER));
        assert_eq!(message.message_type(), MessageType::Plain);
        assert!(message.from().is_none());
        assert!(message.last_error().is_none());
    }

    #[test]
    fn test_recipient_adds_record_errors() {
        let mut message = Message::new();
        assert!(message.add_address("a@example.com", "A"));
        assert!(!message.add_cc("A@EXAMPLE.COM", ""));
        assert!(message.last_error().unwrap().contains("Duplicate"));
        assert!(!message.add_bcc("not an address", ""));
        assert!(message.last_error().unwrap().contains("(bcc)"));
        assert!(message.add_reply_to("a@example.com", ""));
        assert_eq!(message.recipients().len(), 1);

        message.clear_addresses();
        assert!(message.add_cc("a@example.com", ""));
    }

    #[test]
    fn test_from_and_sender() {
        let mut message = Message::new();
        assert!(!message.set_from("broken@", "Broken"));
        assert!(message.envelope_sender().is_none());

        assert!(message.set_from("from@example.com", "Sender Name"));
        assert_eq!(message.envelope_sender(), Some("from@example.com"));

        assert!(message.set_sender("bounce@example.com"));
        assert_eq!(message.envelope_sender(), Some("bounce@example.com"));
        assert!(message.set_sender(""));
        assert_eq!(message.envelope_sender(), Some("from@example.com"));
    }

    #[test]
    fn test_confirm_reading_to() {
        let mut message = Message::new();
        assert!(!message.set_confirm_reading_to("test@example..com"));
        assert_eq!(message.confirm_reading_to(), Some("test@example..com"));

        assert!(message.set_confirm_reading_to(" test@example.com"));
        assert_eq!(message.confirm_reading_to(), Some("test@example.com"));

        assert!(message.set_confirm_reading_to(""));
        assert!(message.confirm_reading_to().is_none());
    }

    #[cfg(feature = "idn")]
    #[test]
    fn test_confirm_reading_to_idn() {
        let mut message = Message::new();
        assert!(message.set_confirm_reading_to("test@fran\u{e7}ois.ch"));
        assert_eq!(message.confirm_reading_to(), Some("test@xn--franois-xxa.ch"));
    }

    #[test]
    fn test_priority_range() {
        let mut message = Message::new();
        assert!(message.set_priority(5));
        assert_eq!(message.priority(), Some(5));
        assert!(!message.set_priority(0));
        assert!(!message.set_priority(6));
        assert_eq!(message.priority(), Some(5));
        message.clear_priority();
        assert!(message.priority().is_none());
    }

    #[test]
    fn test_custom_header_validation() {
        let mut message = Message::new();
        assert!(message.add_custom_header("X-Campaign", "spring"));
        assert!(!message.add_custom_header("", "value"));
        assert!(!message.add_custom_header("Bad:Name", "value"));
        assert!(!message.add_custom_header("Bad Name", "value"));
        assert!(!message.add_custom_header("X-Inject", "a\r\nBcc: evil@example.com"));
        assert_eq!(
            message.custom_headers(),
            [("X-Campaign".to_string(), "spring".to_string())]
        );
        message.clear_custom_headers();
        assert!(message.custom_headers().is_empty());
    }

    #[test]
    fn test_message_id_override() {
        let mut message = Message::new();
        assert!(message.set_message_id("<12345@example.com>"));
        assert_eq!(message.message_id(), Some("<12345@example.com>"));
        assert!(!message.set_message_id("12345@example.com"));
        assert!(!message.set_message_id("<no-at-sign>"));
        assert_eq!(message.message_id(), Some("<12345@example.com>"));
    }

    #[test]
    fn test_add_attachment_rejects_bad_paths() {
        let mut message = Message::new();
        for path in [
            "",
            "https://github.com/PHPMailer/PHPMailer/raw/master/README.md",
            "phar://phar.php",
            "/thisfiledoesntexist",
        ] {
            assert!(
                !message.add_attachment(
                    path,
                    "",
                    TransferEncoding::Base64,
                    "",
                    Disposition::Attachment
                ),
                "{path}"
            );
            assert!(message.last_error().unwrap().starts_with("Could not access file"));
        }
        assert!(!message.attachment_exists());
    }

    #[test]
    fn test_add_attachment_and_embedded_image() {
        let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        file.write_all(b"\x89PNG").unwrap();

        let mut message = Message::new();
        assert!(message.add_embedded_image(
            file.path(),
            "my-attach",
            "",
            TransferEncoding::Base64,
            "",
            Disposition::Inline,
        ));
        assert!(message.inline_image_exists());
        assert!(!message.attachment_exists());
        assert_eq!(message.message_type(), MessageType::Inline);

        let image = &message.attachments()[0];
        assert_eq!(image.cid(), Some("my-attach"));
        assert_eq!(image.content_type().essence(), "image/png");
        assert!(image.name().ends_with(".png"));

        message.add_string_attachment(
            "a,b\n",
            "data.csv",
            TransferEncoding::Base64,
            "",
            Disposition::Attachment,
        );
        message.set_alt_body("text");
        assert_eq!(message.message_type(), MessageType::AltInlineAttach);

        message.clear_attachments();
        assert_eq!(message.message_type(), MessageType::Alt);
    }

    #[test]
    fn test_string_embedded_image_defaults_name_to_cid() {
        let mut message = Message::new();
        message.add_string_embedded_image(
            vec![0u8; 4],
            "logo",
            "",
            TransferEncoding::Base64,
            "image/gif",
            Disposition::Inline,
        );
        let image = &message.attachments()[0];
        assert_eq!(image.name(), "logo");
        assert_eq!(image.content_type().essence(), "image/gif");
    }
}
