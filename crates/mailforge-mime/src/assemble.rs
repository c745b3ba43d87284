//! Turns a [`Message`] into wire-format bytes.
//!
//! The MIME tree is derived from [`MessageType`]:
//!
//! ```text
//! Plain            text or html
//! Inline           related(body, inline...)
//! Attach           mixed(body, attachment...)
//! InlineAttach     mixed(related(body, inline...), attachment...)
//! Alt              alternative(text, html)
//! AltInline        related(alternative(text, html), inline...)
//! AltAttach        mixed(alternative(text, html), attachment...)
//! AltInlineAttach  mixed(related(alternative(text, html), inline...), attachment...)
//! ```
//!
//! Each container level gets its own boundary, `b1_<id>`, `b2_<id>` and
//! `b3_<id>`, sharing one random id that is regenerated if it occurs in any
//! encoded part.

use crate::address::{Address, RecipientKind, canonicalize};
use crate::attachment::Attachment;
use crate::content_type::{ContentType, quote_parameter};
use crate::encoding::{
    CHARSET_ASCII, HeaderPosition, STD_LINE_LENGTH, encode_base64_lines, encode_header,
    encode_quoted_printable, has_8bit_chars, has_long_lines,
};
use crate::error::{Error, Result};
use crate::header::{Headers, secure_header};
use crate::message::{Message, MessageType, TransferEncoding};

/// Text placed before the first boundary of a top-level multipart body.
pub const MULTIPART_PREAMBLE: &str = "This is a multi-part message in MIME format.\r\n";

const FALLBACK_HOSTNAME: &str = "localhost.localdomain";

/// Options that depend on the transport rather than the message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssembleOptions {
    /// Emit a `Bcc` header; only for transports that strip it themselves,
    /// such as `sendmail -t`.
    pub include_bcc: bool,
}

/// A fully rendered message.
///
/// Headers are split into the envelope-level block (`From` through custom
/// headers) and the MIME block (`MIME-Version` and the content headers), so
/// the MIME entity can be handed to a signer and replaced by the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledMessage {
    headers: Headers,
    mime_headers: Headers,
    body: Vec<u8>,
    message_id: String,
    message_type: MessageType,
}

impl AssembledMessage {
    /// Returns the message headers preceding the MIME headers.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns `MIME-Version` and the top-level content headers.
    #[must_use]
    pub const fn mime_headers(&self) -> &Headers {
        &self.mime_headers
    }

    /// Returns the encoded body.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Returns the `Message-ID` header value.
    #[must_use]
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Returns the MIME tree shape that was rendered.
    #[must_use]
    pub const fn message_type(&self) -> MessageType {
        self.message_type
    }

    /// Returns the complete message: headers, blank line, body.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.body.len() + 1024);
        out.extend_from_slice(self.headers.to_string().as_bytes());
        out.extend_from_slice(self.mime_headers.to_string().as_bytes());
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }

    /// Returns the MIME entity: content headers, blank line, body.
    ///
    /// `MIME-Version` is left out; it belongs to the message, not the entity.
    #[must_use]
    pub fn entity_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.body.len() + 256);
        for (name, value) in self.mime_headers.iter() {
            if !name.eq_ignore_ascii_case("MIME-Version") {
                out.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
            }
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }

    /// Replaces the MIME entity, for example with an S/MIME signed wrapper.
    ///
    /// `entity` is a header block and a body separated by a blank line; line
    /// endings are normalized to CRLF. `MIME-Version: 1.0` is kept first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`] if `entity` has no header block or a
    /// header line without a colon.
    pub fn replace_entity(&mut self, entity: &[u8]) -> Result<()> {
        let normalized = normalize_breaks_bytes(entity);
        let split = find(&normalized, b"\r\n\r\n")
            .ok_or_else(|| Error::InvalidHeader("Entity has no header block".to_string()))?;
        let (head, body) = (&normalized[..split], &normalized[split + 4..]);

        let head = String::from_utf8_lossy(head);
        let mut parsed: Vec<(String, String)> = Vec::new();
        for line in head.split("\r\n") {
            if line.starts_with([' ', '\t']) {
                let Some((_, value)) = parsed.last_mut() else {
                    return Err(Error::InvalidHeader(format!("Orphan continuation: {line}")));
                };
                value.push_str("\r\n");
                value.push_str(line);
                continue;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| Error::InvalidHeader(line.to_string()))?;
            parsed.push((name.trim().to_string(), value.trim_start().to_string()));
        }

        let mut mime_headers = Headers::new();
        mime_headers.add("MIME-Version", "1.0");
        for (name, value) in parsed {
            if !name.eq_ignore_ascii_case("MIME-Version") {
                mime_headers.add(name, value);
            }
        }

        self.mime_headers = mime_headers;
        self.body = body.to_vec();
        Ok(())
    }
}

/// Assembles a message with default options.
///
/// # Errors
///
/// See [`assemble_with`].
pub fn assemble(message: &Message) -> Result<AssembledMessage> {
    assemble_with(message, AssembleOptions::default())
}

/// Assembles a message into headers and an encoded body.
///
/// Attachment files are re-checked and read here. The `Date` and
/// `Message-ID` headers are generated unless the message overrides them.
///
/// # Errors
///
/// Returns [`Error::InvalidAddress`] if the read-receipt address is invalid,
/// and [`Error::FileAccess`] or an I/O error if an attachment file can no
/// longer be read.
pub fn assemble_with(message: &Message, options: AssembleOptions) -> Result<AssembledMessage> {
    let message_type = message.message_type();
    let charset = message.charset();

    let mut body = normalize_breaks(message.body());
    let mut alt_body = normalize_breaks(message.alt_body());
    if message.word_wrap() > 0 {
        if message_type.has_alternative() {
            alt_body = wrap_text(&alt_body, message.word_wrap());
        } else {
            body = wrap_text(&body, message.word_wrap());
        }
    }

    let (body_encoding, body_charset) = select_encoding(
        message.encoding(),
        body.as_bytes(),
        charset,
        message.max_line_length(),
    );
    let (alt_encoding, alt_charset) = select_encoding(
        message.encoding(),
        alt_body.as_bytes(),
        charset,
        message.max_line_length(),
    );

    let mut inline = Vec::new();
    let mut attached = Vec::new();
    for attachment in message.attachments() {
        let part = attachment_part(message, attachment)?;
        if attachment.is_inline() {
            inline.push(part);
        } else {
            attached.push(part);
        }
    }

    let body_type = if message.is_html() || message_type.has_alternative() {
        ContentType::text_html(&body_charset)
    } else {
        ContentType::text_plain(&body_charset)
    };
    let body_part = text_part(body_type.clone(), body_encoding, body.as_bytes());

    let content = if message_type.has_alternative() {
        Part::Multipart {
            sub_type: "alternative",
            parameters: Vec::new(),
            children: vec![
                text_part(
                    ContentType::text_plain(&alt_charset),
                    alt_encoding,
                    alt_body.as_bytes(),
                ),
                body_part,
            ],
        }
    } else {
        body_part
    };
    let root_type = if message_type.has_alternative() {
        "multipart/alternative".to_string()
    } else {
        body_type.essence()
    };
    let content = if inline.is_empty() {
        content
    } else {
        let mut children = vec![content];
        children.extend(inline);
        Part::Multipart {
            sub_type: "related",
            parameters: vec![("type".to_string(), root_type)],
            children,
        }
    };
    let root = if attached.is_empty() {
        content
    } else {
        let mut children = vec![content];
        children.extend(attached);
        Part::Multipart {
            sub_type: "mixed",
            parameters: Vec::new(),
            children,
        }
    };

    let mut mime_headers = Headers::new();
    mime_headers.add("MIME-Version", "1.0");
    let mut out = Vec::new();
    match root {
        Part::Leaf { body, .. } => {
            mime_headers.add("Content-Type", body_type.to_string());
            if body_encoding != TransferEncoding::SevenBit {
                mime_headers.add("Content-Transfer-Encoding", body_encoding.as_str());
            }
            out = body;
        }
        multipart @ Part::Multipart { .. } => {
            let id = unique_id(&multipart);
            let content_type = multipart
                .content_type(1, &id)
                .unwrap_or_else(|| ContentType::multipart("mixed", boundary(1, &id)));
            mime_headers.add("Content-Type", content_type.to_string());
            if message.encoding() == TransferEncoding::EightBit {
                mime_headers.add("Content-Transfer-Encoding", "8bit");
            }
            out.extend_from_slice(MULTIPART_PREAMBLE.as_bytes());
            out.extend_from_slice(b"\r\n");
            multipart.render_children(1, &id, &mut out);
        }
    }

    let message_id = match message.message_id() {
        Some(id) => id.to_string(),
        None => format!(
            "<{}@{}>",
            uuid::Uuid::new_v4().simple(),
            server_hostname(message)
        ),
    };
    let headers = message_headers(message, options, &message_id)?;

    tracing::debug!(
        message_type = %message_type,
        size = out.len(),
        "Message assembled"
    );

    Ok(AssembledMessage {
        headers,
        mime_headers,
        body: out,
        message_id,
        message_type,
    })
}

fn message_headers(
    message: &Message,
    options: AssembleOptions,
    message_id: &str,
) -> Result<Headers> {
    let charset = message.charset();
    let line_length = message.header_line_length();
    let recipients = message.recipients();
    let mut headers = Headers::new();

    if let Some(from) = message.from() {
        headers.add("From", from.to_header(charset, line_length));
    }
    let to = recipients.list(RecipientKind::To);
    let cc = recipients.list(RecipientKind::Cc);
    if to.is_empty() && cc.is_empty() {
        headers.add("To", "undisclosed-recipients:;");
    } else if !to.is_empty() {
        headers.add("To", address_list("To", to, charset, line_length));
    }
    if !cc.is_empty() {
        headers.add("Cc", address_list("Cc", cc, charset, line_length));
    }
    let bcc = recipients.list(RecipientKind::Bcc);
    if options.include_bcc && !bcc.is_empty() {
        headers.add("Bcc", address_list("Bcc", bcc, charset, line_length));
    }
    let reply_to = recipients.list(RecipientKind::ReplyTo);
    if !reply_to.is_empty() {
        headers.add(
            "Reply-To",
            address_list("Reply-To", reply_to, charset, line_length),
        );
    }

    headers.add(
        "Subject",
        encode_header(
            &secure_header(message.subject()),
            charset,
            HeaderPosition::Text,
            line_length,
        ),
    );
    headers.add(
        "Date",
        message
            .date()
            .map_or_else(|| chrono::Local::now().to_rfc2822(), str::to_string),
    );
    headers.add("Message-ID", message_id);
    if let Some(x_mailer) = message.x_mailer() {
        headers.add("X-Mailer", secure_header(x_mailer));
    }
    if let Some(priority) = message.priority() {
        headers.add("X-Priority", priority.to_string());
    }
    if let Some(receipt) = message.confirm_reading_to() {
        let receipt = canonicalize(receipt).map_err(|_| {
            Error::InvalidAddress(format!("(Disposition-Notification-To): {receipt}"))
        })?;
        headers.add(
            "Disposition-Notification-To",
            format!("<{}>", receipt.mailbox()),
        );
    }
    for (name, value) in message.custom_headers() {
        headers.add(
            name.as_str(),
            encode_header(
                &secure_header(value),
                charset,
                HeaderPosition::Text,
                line_length,
            ),
        );
    }

    Ok(headers)
}

/// Joins rendered addresses with `, `, folding before a line would pass 76
/// columns.
fn address_list(name: &str, addresses: &[Address], charset: &str, line_length: usize) -> String {
    let mut out = String::new();
    let mut column = name.len() + 2;
    for (index, address) in addresses.iter().enumerate() {
        let rendered = address.to_header(charset, line_length);
        let width = rendered.split("\r\n").next().map_or(0, str::len);
        if index > 0 {
            // Room for the separator and a trailing comma if the next one folds
            if column + 3 + width > STD_LINE_LENGTH {
                out.push_str(",\r\n ");
                column = 1;
            } else {
                out.push_str(", ");
                column += 2;
            }
        }
        out.push_str(&rendered);
        column = match rendered.rsplit_once("\r\n") {
            Some((_, last)) => last.len(),
            None => column + rendered.len(),
        };
    }
    out
}

fn server_hostname(message: &Message) -> String {
    if let Some(hostname) = message.hostname().filter(|h| !h.trim().is_empty()) {
        return hostname.trim().to_string();
    }
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty() && h.contains('.'))
        .unwrap_or_else(|| FALLBACK_HOSTNAME.to_string())
}

/// Picks the transfer encoding and charset actually used for a text part.
fn select_encoding(
    requested: TransferEncoding,
    text: &[u8],
    charset: &str,
    max_line_length: usize,
) -> (TransferEncoding, String) {
    let eight_bit = has_8bit_chars(text);
    let mut encoding = requested;
    let mut charset = charset.to_string();

    if encoding == TransferEncoding::EightBit && !eight_bit {
        encoding = TransferEncoding::SevenBit;
        charset = CHARSET_ASCII.to_string();
    } else if encoding == TransferEncoding::SevenBit && eight_bit {
        encoding = TransferEncoding::EightBit;
    }
    if requested != TransferEncoding::Base64 && has_long_lines(text, max_line_length) {
        encoding = TransferEncoding::QuotedPrintable;
    }

    (encoding, charset)
}

/// A node of the MIME tree.
#[derive(Debug)]
enum Part {
    Leaf {
        headers: Headers,
        body: Vec<u8>,
    },
    Multipart {
        sub_type: &'static str,
        parameters: Vec<(String, String)>,
        children: Vec<Part>,
    },
}

impl Part {
    fn content_type(&self, depth: usize, id: &str) -> Option<ContentType> {
        match self {
            Self::Leaf { .. } => None,
            Self::Multipart {
                sub_type,
                parameters,
                ..
            } => Some(
                parameters.iter().fold(
                    ContentType::multipart(sub_type, boundary(depth, id)),
                    |ct, (key, value)| ct.with_parameter(key.as_str(), value.as_str()),
                ),
            ),
        }
    }

    fn contains(&self, needle: &[u8]) -> bool {
        match self {
            Self::Leaf { body, .. } => find(body, needle).is_some(),
            Self::Multipart { children, .. } => children.iter().any(|c| c.contains(needle)),
        }
    }

    fn render_children(&self, depth: usize, id: &str, out: &mut Vec<u8>) {
        let Self::Multipart { children, .. } = self else {
            return;
        };
        let boundary = boundary(depth, id);
        for child in children {
            out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
            match child {
                Self::Leaf { headers, body } => {
                    out.extend_from_slice(headers.to_string().as_bytes());
                    out.extend_from_slice(b"\r\n");
                    out.extend_from_slice(body);
                }
                Self::Multipart { .. } => {
                    if let Some(content_type) = child.content_type(depth + 1, id) {
                        let header = format!("Content-Type: {content_type}\r\n\r\n");
                        out.extend_from_slice(header.as_bytes());
                    }
                    child.render_children(depth + 1, id, out);
                }
            }
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    }
}

fn boundary(depth: usize, id: &str) -> String {
    format!("b{depth}_{id}")
}

/// Returns a boundary id that does not occur in any encoded part.
fn unique_id(root: &Part) -> String {
    loop {
        let id = uuid::Uuid::new_v4().simple().to_string();
        if !root.contains(id.as_bytes()) {
            return id;
        }
        tracing::debug!("Boundary collided with content, regenerating");
    }
}

fn text_part(content_type: ContentType, encoding: TransferEncoding, text: &[u8]) -> Part {
    let mut headers = Headers::new();
    headers.add("Content-Type", content_type.to_string());
    if encoding != TransferEncoding::SevenBit {
        headers.add("Content-Transfer-Encoding", encoding.as_str());
    }
    Part::Leaf {
        headers,
        body: encode_body(text, encoding),
    }
}

fn attachment_part(message: &Message, attachment: &Attachment) -> Result<Part> {
    let content = attachment.read_content(message.files())?;
    // Only 8-bit names become encoded-words; ASCII names are just quoted.
    let name = secure_header(attachment.name());
    let name = if has_8bit_chars(name.as_bytes()) {
        encode_header(
            &name,
            message.charset(),
            HeaderPosition::Text,
            message.header_line_length(),
        )
    } else {
        name
    };

    let mut content_type = attachment.content_type().clone();
    let mut disposition = attachment.disposition().to_string();
    if !name.is_empty() {
        content_type = content_type.with_parameter("name", name.as_str());
        disposition = format!("{disposition}; filename={}", quote_parameter(&name));
    }

    let mut headers = Headers::new();
    headers.add("Content-Type", content_type.to_string());
    if attachment.encoding() != TransferEncoding::SevenBit {
        headers.add("Content-Transfer-Encoding", attachment.encoding().as_str());
    }
    if let Some(cid) = attachment.cid() {
        headers.add("Content-ID", format!("<{}>", secure_header(cid)));
    }
    headers.add("Content-Disposition", disposition);

    Ok(Part::Leaf {
        headers,
        body: encode_body(&content, attachment.encoding()),
    })
}

/// Applies a transfer encoding to part content.
fn encode_body(data: &[u8], encoding: TransferEncoding) -> Vec<u8> {
    match encoding {
        TransferEncoding::SevenBit | TransferEncoding::EightBit => {
            let mut out = normalize_breaks_bytes(data);
            if !out.ends_with(b"\r\n") {
                out.extend_from_slice(b"\r\n");
            }
            out
        }
        TransferEncoding::Base64 => encode_base64_lines(data).into_bytes(),
        TransferEncoding::QuotedPrintable => encode_quoted_printable(data).into_bytes(),
        TransferEncoding::Binary => data.to_vec(),
    }
}

/// Converts CRLF, CR and LF line breaks to CRLF.
fn normalize_breaks(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\n', "\r\n")
}

fn normalize_breaks_bytes(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 32);
    let mut i = 0;
    while i < data.len() {
        match data[i] {
            b'\r' => {
                out.extend_from_slice(b"\r\n");
                if data.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
            }
            b'\n' => out.extend_from_slice(b"\r\n"),
            byte => out.push(byte),
        }
        i += 1;
    }
    out
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Wraps CRLF text at `width` characters, breaking at spaces and splitting
/// words that are longer than a whole line.
fn wrap_text(text: &str, width: usize) -> String {
    let mut lines = Vec::new();
    for line in text.split("\r\n") {
        if line.chars().count() <= width {
            lines.push(line.to_string());
            continue;
        }
        let mut current = String::new();
        let mut current_len = 0;
        for word in line.split(' ') {
            let mut word = word;
            let mut word_len = word.chars().count();
            if current_len > 0 && current_len + 1 + word_len > width {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            while word_len > width {
                if current_len > 0 {
                    lines.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                let split = word
                    .char_indices()
                    .nth(width)
                    .map_or(word.len(), |(index, _)| index);
                lines.push(word[..split].to_string());
                word = &word[split..];
                word_len -= width;
            }
            if current_len > 0 {
                current.push(' ');
                current_len += 1;
            }
            current.push_str(word);
            current_len += word_len;
        }
        lines.push(current);
    }
    lines.join("\r\n")
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
    use crate::attachment::Disposition;
    use crate::encoding::{decode_quoted_printable, decode_rfc2047};

    fn base_message() -> Message {
        let mut message = Message::new();
        message.set_from("unit_test@phpmailer.example.com", "Unit Tester");
        message.add_address("somebody@example.com", "");
        message.set_subject("Unit Test");
        message.set_date("Thu, 1 Jan 2026 00:00:00 +0000");
        message.set_hostname("example.com");
        message
    }

    fn render(message: &AssembledMessage) -> String {
        String::from_utf8(message.to_bytes()).unwrap()
    }

    #[test]
    fn test_plain_ascii_downgrades_to_7bit() {
        let mut message = base_message();
        message.set_body("Here is the main body");
        let assembled = assemble(&message).unwrap();

        assert_eq!(
            assembled.mime_headers().get("Content-Type"),
            Some("text/plain; charset=us-ascii")
        );
        assert!(assembled.mime_headers().get("Content-Transfer-Encoding").is_none());
        assert_eq!(assembled.body(), b"Here is the main body\r\n");
        assert_eq!(assembled.message_type(), MessageType::Plain);
    }

    #[test]
    fn test_plain_8bit_keeps_charset() {
        let mut message = base_message();
        message.set_body("Caf\u{e9}\nnext");
        let assembled = assemble(&message).unwrap();

        assert_eq!(
            assembled.mime_headers().get("Content-Type"),
            Some("text/plain; charset=utf-8")
        );
        assert_eq!(
            assembled.mime_headers().get("Content-Transfer-Encoding"),
            Some("8bit")
        );
        assert_eq!(assembled.body(), "Caf\u{e9}\r\nnext\r\n".as_bytes());
    }

    #[test]
    fn test_seven_bit_upgrades_for_8bit_text() {
        let mut message = base_message();
        message.set_encoding(TransferEncoding::SevenBit);
        message.set_body("na\u{ef}ve");
        let assembled = assemble(&message).unwrap();
        assert_eq!(
            assembled.mime_headers().get("Content-Transfer-Encoding"),
            Some("8bit")
        );
    }

    #[test]
    fn test_long_line_forces_quoted_printable() {
        let mut message = base_message();
        let body = "x".repeat(1200);
        message.set_body(body.clone());
        let assembled = assemble(&message).unwrap();

        assert_eq!(
            assembled.mime_headers().get("Content-Transfer-Encoding"),
            Some("quoted-printable")
        );
        for line in render(&assembled).split("\r\n") {
            assert!(line.len() <= 998);
        }
        let decoded = decode_quoted_printable(assembled.body()).unwrap();
        assert_eq!(decoded, body.as_bytes());
    }

    #[test]
    fn test_base64_body_not_forced_to_qp() {
        let mut message = base_message();
        message.set_encoding(TransferEncoding::Base64);
        message.set_body("y".repeat(1200));
        let assembled = assemble(&message).unwrap();
        assert_eq!(
            assembled.mime_headers().get("Content-Transfer-Encoding"),
            Some("base64")
        );
    }

    #[test]
    fn test_quoted_printable_line_breaks_normalized() {
        let mut message = base_message();
        message.set_encoding(TransferEncoding::QuotedPrintable);
        message.set_body("This message\ncontains\nUNIX-format\nLF line breaks.");
        let assembled = assemble(&message).unwrap();
        assert_eq!(
            assembled.body(),
            b"This message\r\ncontains\r\nUNIX-format\r\nLF line breaks."
        );
    }

    #[test]
    fn test_header_order() {
        let mut message = base_message();
        message.add_cc("cc@example.com", "");
        message.add_bcc("bcc@example.com", "");
        message.add_reply_to("reply@example.com", "Reply Guy");
        message.set_priority(1);
        message.set_confirm_reading_to("receipt@example.com");
        message.add_custom_header("X-Campaign", "spring");
        message.set_body("body");

        let assembled = assemble_with(&message, AssembleOptions { include_bcc: true }).unwrap();
        let names: Vec<&str> = assembled
            .headers()
            .iter()
            .chain(assembled.mime_headers().iter())
            .map(|(name, _)| name)
            .collect();
        assert_eq!(
            names,
            [
                "From",
                "To",
                "Cc",
                "Bcc",
                "Reply-To",
                "Subject",
                "Date",
                "Message-ID",
                "X-Mailer",
                "X-Priority",
                "Disposition-Notification-To",
                "X-Campaign",
                "MIME-Version",
                "Content-Type",
            ]
        );
        assert_eq!(
            assembled.headers().get("Disposition-Notification-To"),
            Some("<receipt@example.com>")
        );
        assert_eq!(assembled.headers().get("Reply-To"), Some("Reply Guy <reply@example.com>"));
    }

    #[test]
    fn test_bcc_hidden_by_default() {
        let mut message = base_message();
        message.add_bcc("hidden@example.com", "");
        message.set_body("body");
        let assembled = assemble(&message).unwrap();
        assert!(assembled.headers().get("Bcc").is_none());
        assert!(!render(&assembled).contains("hidden@example.com"));
    }

    #[test]
    fn test_undisclosed_recipients() {
        let mut message = Message::new();
        message.set_from("from@example.com", "");
        message.add_bcc("hidden@example.com", "");
        message.set_body("body");
        let assembled = assemble(&message).unwrap();
        assert_eq!(assembled.headers().get("To"), Some("undisclosed-recipients:;"));
    }

    #[test]
    fn test_invalid_receipt_fails() {
        let mut message = base_message();
        message.set_body("body");
        message.set_confirm_reading_to("test@example..com");
        assert!(matches!(assemble(&message), Err(Error::InvalidAddress(_))));
    }

    #[test]
    fn test_generated_message_id_and_date() {
        let mut message = Message::new();
        message.set_hostname("mail.example.org");
        let assembled = assemble(&message).unwrap();
        assert!(assembled.message_id().starts_with('<'));
        assert!(assembled.message_id().ends_with("@mail.example.org>"));
        assert!(chrono::DateTime::parse_from_rfc2822(assembled.headers().get("Date").unwrap()).is_ok());

        message.set_x_mailer(None);
        let assembled = assemble(&message).unwrap();
        assert!(assembled.headers().get("X-Mailer").is_none());
    }

    #[test]
    fn test_subject_is_encoded_and_secured() {
        let mut message = base_message();
        message.set_subject("Caf\u{e9}\r\nBcc: evil@example.com");
        let assembled = assemble(&message).unwrap();
        let subject = assembled.headers().get("Subject").unwrap();
        assert!(subject.starts_with("=?utf-8?"));
        assert_eq!(
            decode_rfc2047(subject).unwrap(),
            "Caf\u{e9}Bcc: evil@example.com"
        );
    }

    #[test]
    fn test_mime_structure_alternative() {
        let mut message = base_message();
        message.set_body("<h3>MIME structure test.</h3>");
        message.set_alt_body("MIME structure test.");
        message.set_html(true);
        let assembled = assemble(&message).unwrap();
        let text = render(&assembled);

        assert!(text.contains(
            "Content-Transfer-Encoding: 8bit\r\n\r\nThis is a multi-part message in MIME format."
        ));
        let content_type = ContentType::parse(assembled.mime_headers().get("Content-Type").unwrap()).unwrap();
        assert_eq!(content_type.essence(), "multipart/alternative");
        let boundary = content_type.boundary().unwrap().to_string();
        assert!(boundary.starts_with("b1_"));

        let plain = text.find("Content-Type: text/plain; charset=us-ascii").unwrap();
        let html = text.find("Content-Type: text/html; charset=us-ascii").unwrap();
        assert!(plain < html);
        assert!(text.ends_with(&format!("--{boundary}--\r\n")));
        assert_eq!(text.matches(&format!("--{boundary}\r\n")).count(), 2);
    }

    #[test]
    fn test_alt_inline_attach_nesting() {
        let mut message = base_message();
        message.set_html(true);
        message.set_body("<img src=\"cid:my-attach\">");
        message.set_alt_body("alt");
        message.add_string_embedded_image(
            vec![1, 2, 3],
            "my-attach",
            "phpmailer.png",
            TransferEncoding::Base64,
            "",
            Disposition::Inline,
        );
        message.add_string_attachment(
            "a,b",
            "data.csv",
            TransferEncoding::Base64,
            "",
            Disposition::Attachment,
        );
        let assembled = assemble(&message).unwrap();
        assert_eq!(assembled.message_type(), MessageType::AltInlineAttach);
        let text = render(&assembled);

        let top = ContentType::parse(assembled.mime_headers().get("Content-Type").unwrap()).unwrap();
        assert_eq!(top.essence(), "multipart/mixed");
        let id = top.boundary().unwrap().strip_prefix("b1_").unwrap().to_string();

        let related = text.find("Content-Type: multipart/related; boundary=b2_").unwrap();
        let alternative = text
            .find("Content-Type: multipart/alternative; boundary=b3_")
            .unwrap();
        let image = text.find("Content-ID: <my-attach>").unwrap();
        let csv = text.find("filename=data.csv").unwrap();
        assert!(related < alternative && alternative < image && image < csv);
        assert!(text.contains(&format!("b2_{id}; type=\"multipart/alternative\"")));
        assert!(text.contains("Content-Disposition: inline; filename=phpmailer.png"));
        for level in 1..=3 {
            assert!(text.contains(&format!("--b{level}_{id}--\r\n")));
        }
    }

    #[test]
    fn test_inline_without_alternative_is_related() {
        let mut message = base_message();
        message.set_html(true);
        message.set_body("<img src=\"cid:logo\">");
        message.add_string_embedded_image(
            vec![0; 8],
            "logo",
            "",
            TransferEncoding::Base64,
            "image/gif",
            Disposition::Inline,
        );
        let assembled = assemble(&message).unwrap();
        let top = ContentType::parse(assembled.mime_headers().get("Content-Type").unwrap()).unwrap();
        assert_eq!(top.essence(), "multipart/related");
        assert_eq!(top.parameter("type"), Some("text/html"));
    }

    #[test]
    fn test_long_ascii_subject_and_filename_stay_plain() {
        let subject = "Quarterly report for the engineering team, March 2026 draft";
        let filename = "quarterly_engineering_report_march_2026_final.pdf";
        let mut message = base_message();
        message.set_subject(subject);
        message.set_body("body");
        message.add_string_attachment(
            vec![0u8; 3],
            filename,
            TransferEncoding::Base64,
            "application/pdf",
            Disposition::Attachment,
        );

        let assembled = assemble(&message).unwrap();
        assert_eq!(assembled.headers().get("Subject"), Some(subject));
        let text = render(&assembled);
        assert!(text.contains(&format!("Content-Type: application/pdf; name={filename}\r\n")));
        assert!(text.contains(&format!("Content-Disposition: attachment; filename={filename}\r\n")));
        assert!(!text.contains("=?us-ascii?"));
    }

    #[test]
    fn test_8bit_filename_is_encoded() {
        let mut message = base_message();
        message.set_body("body");
        message.add_string_attachment(
            vec![0u8; 3],
            "résumé.pdf",
            TransferEncoding::Base64,
            "application/pdf",
            Disposition::Attachment,
        );
        let text = render(&assemble(&message).unwrap());
        assert!(text.contains("name=\"=?utf-8?Q?r=C3=A9sum=C3=A9.pdf?=\""));
    }

    #[test]
    fn test_attachment_name_quoting() {
        for (name, expected) in [
            ("phpmailer.png", "name=phpmailer.png"),
            ("PHPMailer card logo.png", "name=\"PHPMailer card logo.png\""),
            ("phpmailer_mini.png\";.jpg", "name=\"phpmailer_mini.png\\\";.jpg\""),
        ] {
            let mut message = base_message();
            message.set_body("body");
            message.add_string_attachment(
                vec![0u8; 3],
                name,
                TransferEncoding::Base64,
                "image/png",
                Disposition::Attachment,
            );
            let text = render(&assemble(&message).unwrap());
            assert!(text.contains(&format!("Content-Type: image/png; {expected}")), "{name}");
        }
    }

    #[test]
    fn test_missing_attachment_file_fails() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut message = base_message();
        message.set_body("body");
        assert!(message.add_attachment(
            file.path(),
            "",
            TransferEncoding::Base64,
            "",
            Disposition::Attachment,
        ));
        assert!(assemble(&message).is_ok());

        drop(file);
        assert!(matches!(assemble(&message), Err(Error::FileAccess(_))));
    }

    #[test]
    fn test_word_wrap() {
        assert_eq!(wrap_text("aaa bbb ccc", 7), "aaa bbb\r\nccc");
        assert_eq!(wrap_text("abcdefghij", 4), "abcd\r\nefgh\r\nij");
        assert_eq!(wrap_text("short\r\nlines", 10), "short\r\nlines");

        let mut message = base_message();
        message.set_word_wrap(10);
        message.set_body("one two three four five");
        let assembled = assemble(&message).unwrap();
        assert_eq!(assembled.body(), b"one two\r\nthree four\r\nfive\r\n");
    }

    #[test]
    fn test_word_wrap_targets_alt_body() {
        let mut message = base_message();
        message.set_word_wrap(5);
        message.set_body("<p>not wrapped at all</p>");
        message.set_alt_body("aaa bbb");
        let text = render(&assemble(&message).unwrap());
        assert!(text.contains("aaa\r\nbbb"));
        assert!(text.contains("<p>not wrapped at all</p>"));
    }

    #[test]
    fn test_replace_entity() {
        let mut message = base_message();
        message.set_body("signed body");
        let mut assembled = assemble(&message).unwrap();
        let entity = String::from_utf8(assembled.entity_bytes()).unwrap();
        assert!(entity.starts_with("Content-Type: text/plain; charset=us-ascii\r\n\r\n"));

        assembled
            .replace_entity(
                b"MIME-Version: 1.0\nContent-Type: multipart/signed;\n protocol=\"application/pkcs7-signature\"\n\nwrapped\n",
            )
            .unwrap();
        assert_eq!(
            assembled.mime_headers().get("Content-Type"),
            Some("multipart/signed;\r\n protocol=\"application/pkcs7-signature\"")
        );
        assert_eq!(assembled.mime_headers().get_all("MIME-Version"), ["1.0"]);
        assert_eq!(assembled.body(), b"wrapped\r\n");
        assert!(assembled.replace_entity(b"no header block").is_err());
    }

    #[test]
    fn test_address_list_folds() {
        let mut message = base_message();
        for i in 0..6 {
            message.add_cc(&format!("recipient.number{i}@example.com"), "");
        }
        message.set_body("body");
        let assembled = assemble(&message).unwrap();
        let cc = assembled.headers().get("Cc").unwrap();
        assert!(cc.contains(",\r\n "));
        for line in format!("Cc: {cc}").split("\r\n") {
            assert!(line.len() <= STD_LINE_LENGTH);
        }
    }
}
