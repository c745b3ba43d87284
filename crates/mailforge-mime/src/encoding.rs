//! MIME encoding and decoding utilities.
//!
//! Supports Base64, Quoted-Printable, and RFC 2047 header encoding with
//! line folding.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use std::fmt::Write as _;
use std::sync::LazyLock;

/// Character set used when a message does not configure one.
pub const DEFAULT_CHARSET: &str = "utf-8";

/// Character set label for values without 8-bit content.
pub const CHARSET_ASCII: &str = "us-ascii";

/// Standard line length for encoded body content (RFC 2045).
pub const STD_LINE_LENGTH: usize = 76;

/// Hard line length limit of RFC 5322, excluding CRLF.
pub const MAX_LINE_LENGTH: usize = 998;

/// Line budget for encoded-words.
///
/// Keeps `Subject: ` plus the first encoded-word inside 76 columns. Also the
/// header budget for handoffs that rewrap long header lines themselves.
pub const MAIL_MAX_LINE_LENGTH: usize = 63;

/// Encoded-words may not exceed this length (RFC 2047 section 2).
const ENCODED_WORD_MAX: usize = 75;

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Encodes data as Base64 wrapped at [`STD_LINE_LENGTH`] columns.
///
/// Every line, including the last, ends with CRLF.
#[must_use]
pub fn encode_base64_lines(data: &[u8]) -> String {
    let encoded = STANDARD.encode(data);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / STD_LINE_LENGTH * 2 + 2);
    // base64 output is pure ASCII so byte chunks are valid str slices
    for chunk in encoded.as_bytes().chunks(STD_LINE_LENGTH) {
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push_str("\r\n");
    }
    out
}

/// Decodes Base64 data, ignoring embedded line breaks and whitespace.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    let cleaned: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD.decode(cleaned).map_err(Into::into)
}

/// Returns `true` if `data` contains bytes outside 7-bit ASCII.
#[must_use]
pub fn has_8bit_chars(data: &[u8]) -> bool {
    data.iter().any(|b| *b >= 0x80)
}

/// Returns `true` if any line of `data` is longer than `limit` octets.
///
/// Line breaks are not counted. Messages use [`MAX_LINE_LENGTH`] unless
/// configured otherwise.
#[must_use]
pub fn has_long_lines(data: &[u8], limit: usize) -> bool {
    data.split(|b| *b == b'\n')
        .any(|line| line.strip_suffix(b"\r").unwrap_or(line).len() > limit)
}

/// Encodes bytes using Quoted-Printable encoding (RFC 2045).
///
/// Hard line breaks are kept exactly as they appear in the input (`CRLF`
/// or bare `LF`), so decoding restores the original bytes. Soft breaks use
/// the style of the first hard break found, CRLF if there is none. Lone CR,
/// `=`, non-printable bytes and whitespace in front of a line break are
/// escaped.
#[must_use]
pub fn encode_quoted_printable(data: &[u8]) -> String {
    let soft_break = match data.iter().position(|b| *b == b'\n') {
        Some(pos) if pos == 0 || data[pos - 1] != b'\r' => "=\n",
        _ => "=\r\n",
    };

    let mut result = String::with_capacity(data.len() + data.len() / 3);
    let mut line_length = 0;
    let mut i = 0;

    while i < data.len() {
        let byte = data[i];

        if byte == b'\n' {
            result.push('\n');
            line_length = 0;
            i += 1;
            continue;
        }
        if byte == b'\r' && data.get(i + 1) == Some(&b'\n') {
            result.push_str("\r\n");
            line_length = 0;
            i += 2;
            continue;
        }

        let at_line_end = match data.get(i + 1) {
            None | Some(b'\n') => true,
            Some(b'\r') => data.get(i + 2) == Some(&b'\n'),
            Some(_) => false,
        };

        let literal = match byte {
            b'!'..=b'<' | b'>'..=b'~' => true,
            b' ' | b'\t' => !at_line_end,
            _ => false,
        };
        let width = if literal { 1 } else { 3 };

        // Leave room for the trailing '=' of a soft break
        if line_length + width > STD_LINE_LENGTH - 1 {
            result.push_str(soft_break);
            line_length = 0;
        }

        if literal {
            result.push(char::from(byte));
        } else {
            let _ = write!(result, "={byte:02X}");
        }
        line_length += width;
        i += 1;
    }

    result
}

/// Decodes Quoted-Printable data (RFC 2045).
///
/// Soft line breaks (`=` followed by CRLF or LF, optionally after transport
/// padding) are removed; hard line breaks are returned unchanged.
///
/// # Errors
///
/// Returns an error if the input contains invalid escape sequences.
pub fn decode_quoted_printable(data: &[u8]) -> Result<Vec<u8>> {
    let mut result = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        let byte = data[i];
        if byte != b'=' {
            result.push(byte);
            i += 1;
            continue;
        }

        let rest = &data[i + 1..];
        let padding = rest
            .iter()
            .take_while(|b| **b == b' ' || **b == b'\t')
            .count();
        let after = &rest[padding..];
        if after.starts_with(b"\r\n") {
            i += 1 + padding + 2;
            continue;
        }
        if after.starts_with(b"\n") {
            i += 1 + padding + 1;
            continue;
        }

        let hex = rest
            .get(..2)
            .ok_or_else(|| Error::InvalidEncoding("Incomplete escape sequence".to_string()))?;
        let hex = std::str::from_utf8(hex)
            .map_err(|_| Error::InvalidEncoding("Invalid hex escape".to_string()))?;
        let value = u8::from_str_radix(hex, 16)
            .map_err(|e| Error::InvalidEncoding(format!("Invalid hex: {e}")))?;
        result.push(value);
        i += 3;
    }

    Ok(result)
}

/// Where an encoded header value will be placed (RFC 2047 section 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeaderPosition {
    /// Unstructured text such as `Subject`.
    #[default]
    Text,
    /// A display-name phrase in an address header.
    Phrase,
    /// Text inside a structured header comment.
    Comment,
}

/// Encodes a header value using RFC 2047 encoded-words when required.
///
/// ASCII values that fit in `line_length` are returned unchanged. Otherwise
/// base64 (`B`) is used when more than a third of the bytes need escaping,
/// `Q` when fewer do. A pure ASCII value longer than the budget is still
/// folded into `us-ascii` `Q` encoded-words. Encoded-words are folded within
/// the smaller of `line_length` and [`MAIL_MAX_LINE_LENGTH`]. Continuation
/// lines are joined with CRLF and a single space, and no encoded-word splits
/// a multi-byte character.
///
/// `charset` labels values with 8-bit content; plain ASCII is labelled
/// `us-ascii`. The value is emitted as UTF-8 bytes.
#[must_use]
pub fn encode_header(
    value: &str,
    charset: &str,
    position: HeaderPosition,
    line_length: usize,
) -> String {
    let bytes = value.as_bytes();
    let eight_bit = has_8bit_chars(bytes);

    if position == HeaderPosition::Phrase && !eight_bit && !bytes.iter().any(u8::is_ascii_control)
    {
        return quote_phrase(value);
    }

    let matches = bytes
        .iter()
        .filter(|b| counts_as_special(**b, position))
        .count();

    let charset = if eight_bit { charset } else { CHARSET_ASCII };
    let overhead = 8 + charset.len();
    let max_len = line_length.saturating_sub(overhead).max(4);
    let fold_len = line_length
        .min(MAIL_MAX_LINE_LENGTH)
        .saturating_sub(overhead)
        .max(4);

    let lines = if matches > bytes.len() / 3 {
        let chunks = if eight_bit {
            b_chunks_multibyte(value, charset)
        } else {
            b_chunks(bytes, fold_len)
        };
        chunks
            .into_iter()
            .map(|chunk| format!("=?{charset}?B?{chunk}?="))
            .collect::<Vec<_>>()
    } else if matches > 0 || bytes.len() > max_len {
        q_chunks(value, position, fold_len)
            .into_iter()
            .map(|chunk| format!("=?{charset}?Q?{chunk}?="))
            .collect()
    } else {
        return value.to_string();
    };

    lines.join("\r\n ")
}

/// Counts bytes that force an encoded-word for the given position.
const fn counts_as_special(byte: u8, position: HeaderPosition) -> bool {
    match position {
        HeaderPosition::Phrase => !matches!(byte, 0x20 | 0x21 | 0x23..=0x5B | 0x5D..=0x7E),
        HeaderPosition::Comment => {
            matches!(byte, b'(' | b')' | b'"') || is_text_special(byte)
        }
        HeaderPosition::Text => is_text_special(byte),
    }
}

const fn is_text_special(byte: u8) -> bool {
    matches!(byte, 0x00..=0x08 | 0x0B | 0x0C | 0x0E..=0x1F | 0x7F..=0xFF)
}

/// Renders an ASCII display name as an atom or a quoted-string.
fn quote_phrase(value: &str) -> String {
    let is_atext = |c: char| {
        c.is_ascii_alphanumeric() || c == ' ' || "!#$%&'*+/=?^_`{|}~-".contains(c)
    };
    if value.chars().all(is_atext) {
        return value.to_string();
    }

    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Splits base64 of ASCII data on whole quanta.
fn b_chunks(bytes: &[u8], max_len: usize) -> Vec<String> {
    let encoded = encode_base64(bytes);
    let width = (max_len - max_len % 4).max(4);
    encoded
        .as_bytes()
        .chunks(width)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect()
}

/// Splits multi-byte text into base64 chunks that never divide a character.
///
/// Each chunk is as long as possible while the complete encoded-word stays
/// within 75 octets.
fn b_chunks_multibyte(value: &str, charset: &str) -> Vec<String> {
    let budget = ENCODED_WORD_MAX.saturating_sub(charset.len() + 7).max(4);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < value.len() {
        let mut end = start;
        for (offset, c) in value[start..].char_indices() {
            let candidate = start + offset + c.len_utf8();
            if (candidate - start).div_ceil(3) * 4 > budget && end > start {
                break;
            }
            end = candidate;
        }
        chunks.push(encode_base64(&value.as_bytes()[start..end]));
        start = end;
    }

    chunks
}

/// Q-encodes text and splits it so no escape triplet or character is divided.
fn q_chunks(value: &str, position: HeaderPosition, max_len: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for c in value.chars().filter(|c| *c != '\r' && *c != '\n') {
        let mut buf = [0u8; 4];
        let mut unit = String::new();
        for byte in c.encode_utf8(&mut buf).bytes() {
            if byte == b' ' {
                unit.push('_');
            } else if q_escape(byte, position) {
                let _ = write!(unit, "={byte:02X}");
            } else {
                unit.push(char::from(byte));
            }
        }

        if !current.is_empty() && current.len() + unit.len() > max_len {
            chunks.push(std::mem::take(&mut current));
        }
        current.push_str(&unit);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Bytes that must be written as `=XX` in a Q encoded-word.
const fn q_escape(byte: u8, position: HeaderPosition) -> bool {
    match position {
        HeaderPosition::Phrase => {
            !matches!(byte, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'!' | b'*' | b'+' | b'/' | b'-')
        }
        HeaderPosition::Comment => matches!(byte, b'(' | b')' | b'"') || q_text_escape(byte),
        HeaderPosition::Text => q_text_escape(byte),
    }
}

const fn q_text_escape(byte: u8) -> bool {
    matches!(
        byte,
        0x00..=0x09 | 0x0B | 0x0C | 0x0E..=0x1F | b'=' | b'?' | b'_' | 0x7F..=0xFF
    )
}

#[allow(clippy::expect_used)]
static ENCODED_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"=\?([^?\s]+)\?([BbQq])\?([^?\s]*)\?=").expect("encoded-word pattern compiles")
});

/// Decodes RFC 2047 encoded-words in a header value.
///
/// Whitespace and folding between adjacent encoded-words is dropped, as
/// RFC 2047 section 6.2 requires. Text outside encoded-words is kept.
///
/// # Errors
///
/// Returns an error if an encoded-word has an invalid payload or the decoded
/// bytes are not UTF-8.
pub fn decode_rfc2047(text: &str) -> Result<String> {
    let unfolded = text.replace("\r\n", "");
    let mut bytes = Vec::with_capacity(unfolded.len());
    let mut last_end = 0;
    let mut previous_was_word = false;

    for caps in ENCODED_WORD.captures_iter(&unfolded) {
        let (Some(whole), Some(scheme), Some(payload)) = (caps.get(0), caps.get(2), caps.get(3))
        else {
            continue;
        };

        let between = &unfolded[last_end..whole.start()];
        if !(previous_was_word && between.chars().all(char::is_whitespace)) {
            bytes.extend_from_slice(between.as_bytes());
        }

        match scheme.as_str() {
            "B" | "b" => bytes.extend(decode_base64(payload.as_str())?),
            _ => {
                let spaced = payload.as_str().replace('_', " ");
                bytes.extend(decode_quoted_printable(spaced.as_bytes())?);
            }
        }

        last_end = whole.end();
        previous_was_word = true;
    }

    bytes.extend_from_slice(&unfolded.as_bytes()[last_end..]);
    String::from_utf8(bytes).map_err(Into::into)
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
    use proptest::prelude::*;

    fn encode(value: &str) -> String {
        encode_header(value, "utf-8", HeaderPosition::Text, MAIL_MAX_LINE_LENGTH)
    }

    #[test]
    fn test_base64_encode_decode() {
        let data = b"Hello, World!";
        let encoded = encode_base64(data);
        assert_eq!(encoded, "SGVsbG8sIFdvcmxkIQ==");

        let decoded = decode_base64(&encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_base64_lines_wrap_at_76() {
        let data = vec![0xAB; 200];
        let encoded = encode_base64_lines(&data);
        for line in encoded.split_terminator("\r\n") {
            assert!(line.len() <= STD_LINE_LENGTH);
        }
        assert!(encoded.ends_with("\r\n"));
        assert_eq!(decode_base64(&encoded).unwrap(), data);
    }

    #[test]
    fn test_long_line_detection() {
        let mut body = "a".repeat(MAX_LINE_LENGTH).into_bytes();
        body.extend_from_slice(b"\r\nshort\n");
        assert!(!has_long_lines(&body, MAX_LINE_LENGTH));
        body.insert(0, b'a');
        assert!(has_long_lines(&body, MAX_LINE_LENGTH));
        assert!(has_long_lines(b"abcdef", 5));
        assert!(!has_8bit_chars(b"plain ascii"));
        assert!(has_8bit_chars("caf\u{e9}".as_bytes()));
    }

    #[test]
    fn test_quoted_printable_encode() {
        assert_eq!(encode_quoted_printable(b"Hello, World!"), "Hello, World!");
        let encoded = encode_quoted_printable("Héllo, Wørld!".as_bytes());
        assert_eq!(encoded, "H=C3=A9llo, W=C3=B8rld!");
    }

    #[test]
    fn test_quoted_printable_escapes_trailing_whitespace() {
        assert_eq!(encode_quoted_printable(b"end \r\nnext\t"), "end=20\r\nnext=09");
    }

    #[test]
    fn test_quoted_printable_soft_breaks_follow_input_style() {
        let line = "a".repeat(100);
        let crlf = encode_quoted_printable(format!("{line}\r\n{line}").as_bytes());
        assert!(crlf.contains("=\r\n"));
        assert!(crlf.lines().all(|l| l.len() <= STD_LINE_LENGTH));

        let lf = encode_quoted_printable(format!("{line}\n{line}").as_bytes());
        assert!(lf.contains("=\n"));
        assert!(!lf.contains('\r'));
    }

    #[test]
    fn test_quoted_printable_round_trip_line_endings() {
        let lf = "Line 1\nLine 2 with trailing space \n\nLine 4 é\n";
        let crlf = lf.replace('\n', "\r\n");
        for text in [lf.to_string(), crlf] {
            let encoded = encode_quoted_printable(text.as_bytes());
            let decoded = decode_quoted_printable(encoded.as_bytes()).unwrap();
            assert_eq!(decoded, text.as_bytes());
        }
    }

    #[test]
    fn test_quoted_printable_decode() {
        let decoded = decode_quoted_printable(b"H=C3=A9llo").unwrap();
        assert_eq!(decoded, "Héllo".as_bytes());
    }

    #[test]
    fn test_quoted_printable_soft_line_break() {
        assert_eq!(decode_quoted_printable(b"Hello=\r\nWorld").unwrap(), b"HelloWorld");
        assert_eq!(decode_quoted_printable(b"Hello= \nWorld").unwrap(), b"HelloWorld");
    }

    #[test]
    fn test_quoted_printable_bad_escape() {
        assert!(decode_quoted_printable(b"abc=Z1").is_err());
        assert!(decode_quoted_printable(b"abc=4").is_err());
    }

    #[test]
    fn test_header_short_ascii_unchanged() {
        assert_eq!(encode("eeeeeeeeee"), "eeeeeeeeee");
    }

    #[test]
    fn test_header_short_q() {
        assert_eq!(
            encode(&format!("{}é", "e".repeat(9))),
            "=?utf-8?Q?eeeeeeeee=C3=A9?="
        );
    }

    #[test]
    fn test_header_short_b() {
        assert_eq!(
            encode(&"é".repeat(10)),
            "=?utf-8?B?w6nDqcOpw6nDqcOpw6nDqcOpw6k=?="
        );
    }

    #[test]
    fn test_header_long_q_folds() {
        let value = format!("{}é", "e".repeat(76));
        let expected = format!(
            "=?utf-8?Q?{}?=\r\n =?utf-8?Q?{}=C3=A9?=",
            "e".repeat(50),
            "e".repeat(26)
        );
        assert_eq!(encode(&value), expected);
    }

    #[test]
    fn test_header_long_b_folds_on_characters() {
        let encoded = encode(&"é".repeat(77));
        let lines: Vec<&str> = encoded.split("\r\n ").collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(
            lines[0],
            "=?utf-8?B?w6nDqcOpw6nDqcOpw6nDqcOpw6nDqcOpw6nDqcOpw6nDqcOpw6nDqcOpw6k=?="
        );
        assert_eq!(lines[3], "=?utf-8?B?w6nDqcOpw6nDqcOpw6nDqcOpw6nDqQ==?=");
        assert!(lines.iter().all(|l| l.len() <= 75));
        assert_eq!(decode_rfc2047(&encoded).unwrap(), "é".repeat(77));
    }

    #[test]
    fn test_header_long_b_86_chars() {
        let encoded = encode(&"é".repeat(86));
        let lines: Vec<&str> = encoded.split("\r\n ").collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(decode_rfc2047(lines[3]).unwrap(), "é".repeat(20));
    }

    #[test]
    fn test_header_long_ascii_is_q_folded() {
        let encoded = encode(&"e".repeat(86));
        let expected = format!(
            "=?us-ascii?Q?{}?=\r\n =?us-ascii?Q?{}?=",
            "e".repeat(47),
            "e".repeat(39)
        );
        assert_eq!(encoded, expected);
    }

    #[test]
    fn test_header_ascii_within_wide_budget_unchanged() {
        let subject = "Quarterly report for the engineering team, March 2026 draft";
        assert_eq!(subject.len(), 59);
        assert_eq!(
            encode_header(subject, "utf-8", HeaderPosition::Text, MAX_LINE_LENGTH),
            subject
        );
    }

    #[test]
    fn test_header_wide_budget_still_folds_encoded_words() {
        let value = format!("{}é", "e".repeat(76));
        assert_eq!(
            encode_header(&value, "utf-8", HeaderPosition::Text, MAX_LINE_LENGTH),
            encode(&value)
        );

        let long_ascii = "e".repeat(1000);
        let encoded = encode_header(&long_ascii, "utf-8", HeaderPosition::Text, MAX_LINE_LENGTH);
        assert!(encoded.starts_with("=?us-ascii?Q?"));
        assert!(encoded.split("\r\n ").all(|l| l.len() <= MAIL_MAX_LINE_LENGTH));
    }

    #[test]
    fn test_header_q_space_and_specials() {
        assert_eq!(encode("caf\u{e9} = ok?"), "=?utf-8?Q?caf=C3=A9_=3D_ok=3F?=");
    }

    #[test]
    fn test_header_phrase_quoting() {
        let phrase = |v| encode_header(v, "utf-8", HeaderPosition::Phrase, MAIL_MAX_LINE_LENGTH);
        assert_eq!(phrase("Foo"), "Foo");
        assert_eq!(phrase("Tim \"The Book\" O'Reilly"), "\"Tim \\\"The Book\\\" O'Reilly\"");
        assert_eq!(phrase("Doe, John"), "\"Doe, John\"");
        assert!(phrase("Zoë").starts_with("=?utf-8?"));
    }

    #[test]
    fn test_rfc2047_decode() {
        assert_eq!(decode_rfc2047("Hello").unwrap(), "Hello");
        assert_eq!(decode_rfc2047("=?utf-8?B?SMOpbGxv?=").unwrap(), "Héllo");
        assert_eq!(decode_rfc2047("=?utf-8?Q?H=C3=A9llo?=").unwrap(), "Héllo");
        assert_eq!(
            decode_rfc2047("Re: =?utf-8?Q?a?=\r\n =?utf-8?Q?b_c?= end").unwrap(),
            "Re: ab c end"
        );
    }

    proptest! {
        #[test]
        fn quoted_printable_round_trips(data in proptest::collection::vec(any::<u8>(), 0..400)) {
            let encoded = encode_quoted_printable(&data);
            prop_assert!(encoded.is_ascii());
            let decoded = decode_quoted_printable(encoded.as_bytes()).unwrap();
            prop_assert_eq!(decoded, data);
        }

        #[test]
        fn header_encoding_round_trips(value in "[a-zA-Z0-9 éøü€?=_]{0,120}") {
            let encoded = encode(&value);
            for line in encoded.split("\r\n ") {
                prop_assert!(line.len() <= ENCODED_WORD_MAX);
            }
            prop_assert_eq!(decode_rfc2047(&encoded).unwrap(), value);
        }
    }
}
