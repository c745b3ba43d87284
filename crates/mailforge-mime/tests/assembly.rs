//! Integration tests for message assembly.
//!
//! Attachments are served from an in-memory file source so the tests do not
//! depend on the local filesystem.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use mailforge_mime::encoding::{decode_base64, decode_rfc2047};
use mailforge_mime::{
    ContentType, Disposition, FileSource, Message, MessageType, TransferEncoding, assemble,
};

/// File source backed by a map that tests can modify after adding files.
#[derive(Debug, Default)]
struct MemoryFiles {
    files: Mutex<HashMap<PathBuf, Vec<u8>>>,
}

impl MemoryFiles {
    fn insert(&self, path: &str, content: &[u8]) {
        self.files
            .lock()
            .unwrap()
            .insert(PathBuf::from(path), content.to_vec());
    }

    fn remove(&self, path: &str) {
        self.files.lock().unwrap().remove(Path::new(path));
    }
}

impl FileSource for MemoryFiles {
    fn exists(&self, path: &Path) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    fn readable(&self, path: &Path) -> bool {
        self.exists(path)
    }

    fn read(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::NotFound))
    }
}

fn message_with(files: &Arc<MemoryFiles>) -> Message {
    let mut message = Message::with_files(files.clone());
    message.set_from("unit_test@phpmailer.example.com", "Unit Tester");
    message.add_address("somebody@example.com", "");
    message.set_subject("Unit Test");
    message.set_hostname("example.com");
    message
}

fn boundary_of(headers_value: &str) -> String {
    ContentType::parse(headers_value)
        .unwrap()
        .boundary()
        .unwrap()
        .to_string()
}

#[test]
fn test_embedded_image_from_file_source() {
    let files = Arc::new(MemoryFiles::default());
    files.insert("/images/phpmailer.png", b"\x89PNG\r\n\x1a\nrest");

    let mut message = message_with(&files);
    message.set_html(true);
    message.set_body("Embedded Image: <img alt=\"phpmailer\" src=\"cid:my-attach\">");
    assert!(message.add_embedded_image(
        "/images/phpmailer.png",
        "my-attach",
        "phpmailer.png",
        TransferEncoding::Base64,
        "image/png",
        Disposition::Inline,
    ));
    assert!(message.inline_image_exists());

    let assembled = assemble(&message).unwrap();
    assert_eq!(assembled.message_type(), MessageType::Inline);
    let text = String::from_utf8(assembled.to_bytes()).unwrap();

    assert!(text.contains("Content-ID: <my-attach>\r\n"));
    assert!(text.contains("Content-Type: image/png; name=phpmailer.png\r\n"));

    let encoded = text
        .split("Content-Disposition: inline; filename=phpmailer.png\r\n\r\n")
        .nth(1)
        .unwrap()
        .split("\r\n\r\n")
        .next()
        .unwrap();
    assert_eq!(decode_base64(encoded).unwrap(), b"\x89PNG\r\n\x1a\nrest");
}

#[test]
fn test_attachment_removed_before_send() {
    let files = Arc::new(MemoryFiles::default());
    files.insert("/tmp/report.pdf", b"%PDF-1.7");

    let mut message = message_with(&files);
    message.set_body("See attached");
    assert!(message.add_attachment(
        "/tmp/report.pdf",
        "",
        TransferEncoding::Base64,
        "",
        Disposition::Attachment,
    ));
    assert_eq!(message.attachments()[0].name(), "report.pdf");
    assert_eq!(
        message.attachments()[0].content_type().essence(),
        "application/pdf"
    );

    files.remove("/tmp/report.pdf");
    assert!(matches!(
        assemble(&message),
        Err(mailforge_mime::Error::FileAccess(_))
    ));
}

#[test]
fn test_alt_body_with_attachment() {
    let files = Arc::new(MemoryFiles::default());
    let mut message = message_with(&files);
    message.set_html(true);
    message.set_body("This is the <strong>HTML</strong> part of the email.");
    message.set_alt_body("This is the text part of the email.");
    message.add_string_attachment(
        "attachment text",
        "test.txt",
        TransferEncoding::SevenBit,
        "",
        Disposition::Attachment,
    );

    let assembled = assemble(&message).unwrap();
    assert_eq!(assembled.message_type(), MessageType::AltAttach);

    let top = assembled.mime_headers().get("Content-Type").unwrap();
    assert!(top.starts_with("multipart/mixed"));
    let outer = boundary_of(top);
    let inner = outer.replacen("b1_", "b2_", 1);

    let text = String::from_utf8(assembled.to_bytes()).unwrap();
    assert!(text.contains(&format!("Content-Type: multipart/alternative; boundary={inner}")));
    assert!(text.contains(
        "Content-Type: text/plain; name=test.txt\r\nContent-Disposition: attachment; filename=test.txt\r\n\r\nattachment text\r\n"
    ));
    assert!(text.contains(&format!("--{inner}--\r\n")));
    assert!(text.ends_with(&format!("--{outer}--\r\n")));
}

#[test]
fn test_utf8_subject_and_names_round_trip() {
    let files = Arc::new(MemoryFiles::default());
    let mut message = message_with(&files);
    message.set_charset("utf-8");
    let subject = "\u{41f}\u{440}\u{438}\u{432}\u{435}\u{442} \u{43c}\u{438}\u{440}! \u{e9}\u{e8}\u{ea}";
    message.set_subject(subject);
    message.add_cc("cc@example.com", "Fran\u{e7}ois M\u{fc}ller");
    message.set_body("body");

    let assembled = assemble(&message).unwrap();
    let encoded = assembled.headers().get("Subject").unwrap();
    assert!(encoded.starts_with("=?utf-8?B?"));
    assert_eq!(decode_rfc2047(encoded).unwrap(), subject);
    for word in encoded.split("\r\n ") {
        assert!(word.len() <= 75, "{word}");
    }

    let cc = assembled.headers().get("Cc").unwrap();
    assert!(cc.ends_with(" <cc@example.com>"));
    let name = cc.trim_end_matches(" <cc@example.com>");
    assert_eq!(decode_rfc2047(name).unwrap(), "Fran\u{e7}ois M\u{fc}ller");
}

#[test]
fn test_display_name_with_quotes() {
    let files = Arc::new(MemoryFiles::default());
    let mut message = Message::with_files(files);
    message.set_from("foo@example.com", "Tim \"The Book\" O'Reilly");
    message.add_address("to@example.com", "");
    let assembled = assemble(&message).unwrap();
    assert_eq!(
        assembled.headers().get("From"),
        Some("\"Tim \\\"The Book\\\" O'Reilly\" <foo@example.com>")
    );
}

#[test]
fn test_boundaries_unique_per_assembly() {
    let files = Arc::new(MemoryFiles::default());
    let mut message = message_with(&files);
    message.set_body("html");
    message.set_alt_body("text");

    let first = assemble(&message).unwrap();
    let second = assemble(&message).unwrap();
    let first = boundary_of(first.mime_headers().get("Content-Type").unwrap());
    let second = boundary_of(second.mime_headers().get("Content-Type").unwrap());
    assert_ne!(first, second);
    assert_ne!(
        assemble(&message).unwrap().message_id(),
        assemble(&message).unwrap().message_id()
    );
}
