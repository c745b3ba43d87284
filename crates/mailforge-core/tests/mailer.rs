//! Integration tests for the mailer.
//!
//! SMTP delivery runs against a scripted connector; pipe delivery runs a
//! small shell script standing in for sendmail.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use mailforge_core::{
    Error, ErrorCategory, Mailer, MailerConfig, Signer, SigningMaterial, Transport,
};
use mailforge_mime::{Disposition, Message, TransferEncoding};
use mailforge_smtp::{
    ConnectOptions, Connection, Connector, Credentials, DsnNotify, SessionConfig, SessionState,
    SmtpSession,
};

#[derive(Debug, Default)]
struct Server {
    replies: VecDeque<String>,
    writes: Vec<u8>,
    opened: usize,
}

#[derive(Debug, Clone, Default)]
struct ScriptedConnector(Arc<Mutex<Server>>);

impl ScriptedConnector {
    fn new(script: &[&str]) -> Self {
        let connector = Self::default();
        connector
            .0
            .lock()
            .unwrap()
            .replies
            .extend(script.iter().map(ToString::to_string));
        connector
    }

    fn sent(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().writes.clone()).unwrap()
    }

    fn opened(&self) -> usize {
        self.0.lock().unwrap().opened
    }

    fn count(&self, verb: &str) -> usize {
        self.sent()
            .split("\r\n")
            .filter(|line| line.starts_with(verb))
            .count()
    }
}

struct ScriptedConnection(Arc<Mutex<Server>>);

impl Connector for ScriptedConnector {
    type Connection = ScriptedConnection;

    async fn open(
        &self,
        _host: &str,
        _port: u16,
        _options: &ConnectOptions,
    ) -> mailforge_smtp::Result<ScriptedConnection> {
        self.0.lock().unwrap().opened += 1;
        Ok(ScriptedConnection(Arc::clone(&self.0)))
    }
}

impl Connection for ScriptedConnection {
    async fn write_all(&mut self, data: &[u8]) -> mailforge_smtp::Result<()> {
        self.0.lock().unwrap().writes.extend_from_slice(data);
        Ok(())
    }

    async fn read_line(&mut self) -> mailforge_smtp::Result<String> {
        self.0
            .lock()
            .unwrap()
            .replies
            .pop_front()
            .ok_or_else(|| io::Error::from(io::ErrorKind::UnexpectedEof).into())
    }

    async fn upgrade_tls(&mut self, _server_name: &str) -> mailforge_smtp::Result<()> {
        Ok(())
    }

    async fn close(&mut self) -> mailforge_smtp::Result<()> {
        Ok(())
    }

    fn is_tls(&self) -> bool {
        false
    }
}

const HANDSHAKE: [&str; 2] = ["220 mx.example.com ESMTP", "250 mx.example.com"];
const TRANSACTION: [&str; 4] = ["250 2.1.0 Ok", "250 2.1.5 Ok", "354 Go ahead", "250 2.0.0 Queued"];
const QUIT: &str = "221 2.0.0 Bye";

fn script(transactions: usize) -> Vec<&'static str> {
    let mut lines = HANDSHAKE.to_vec();
    for _ in 0..transactions {
        lines.extend(TRANSACTION);
    }
    lines.push(QUIT);
    lines
}

fn message() -> Message {
    let mut message = Message::new();
    assert!(message.set_from("sender@example.com", "Sender"));
    assert!(message.add_address("recipient@example.com", "Recipient"));
    message.set_subject("Quarterly report");
    message.set_body("Figures attached.");
    message
}

fn mailer(config: MailerConfig, script: &[&str]) -> (Mailer<ScriptedConnector>, ScriptedConnector) {
    let connector = ScriptedConnector::new(script);
    (Mailer::with_connector(config, connector.clone()), connector)
}

#[tokio::test]
async fn test_send_over_smtp() {
    let (mut mailer, server) = mailer(MailerConfig::smtp("mx.example.com"), &script(1));

    mailer.try_send(&message()).await.unwrap();

    let sent = server.sent();
    assert!(sent.contains("MAIL FROM:<sender@example.com>\r\n"));
    assert!(sent.contains("RCPT TO:<recipient@example.com>\r\n"));
    assert!(sent.contains("Subject: Quarterly report\r\n"));
    assert!(sent.ends_with("QUIT\r\n"));
    assert!(mailer.last_error().is_none());
    let last = String::from_utf8(mailer.last_message().unwrap().to_vec()).unwrap();
    assert!(last.contains("Figures attached."));
}

#[tokio::test]
async fn test_keep_alive_reuses_connection() {
    let config = MailerConfig::builder()
        .smtp(SessionConfig::new("mx.example.com"))
        .keep_alive(true)
        .build();
    let (mut mailer, server) = mailer(config, &script(2));

    assert!(mailer.send(&message()).await);
    assert!(mailer.session().state().is_connected());
    assert!(mailer.send(&message()).await);
    assert_eq!(server.count("EHLO"), 1);
    assert_eq!(server.count("MAIL FROM"), 2);
    assert_eq!(server.count("QUIT"), 0);

    mailer.close().await;
    assert_eq!(server.count("QUIT"), 1);
    assert_eq!(server.opened(), 1);
    assert_eq!(mailer.session().state(), SessionState::Disconnected);
}

#[tokio::test]
async fn test_keep_alive_with_credentials_authenticates_once() {
    let smtp = SessionConfig::builder("mx.example.com")
        .credentials(Credentials::new("user", "pass"))
        .build();
    let config = MailerConfig::builder().smtp(smtp).keep_alive(true).build();
    let mut script = vec![
        "220 mx.example.com ESMTP",
        "250-mx.example.com",
        "250 AUTH PLAIN",
        "235 2.7.0 Authentication successful",
    ];
    script.extend(TRANSACTION);
    script.extend(TRANSACTION);
    script.push(QUIT);
    let (mut mailer, server) = mailer(config, &script);

    mailer.try_send(&message()).await.unwrap();
    assert_eq!(mailer.session().state(), SessionState::Authenticated);
    mailer.try_send(&message()).await.unwrap();
    assert_eq!(mailer.session().state(), SessionState::Authenticated);
    assert_eq!(server.count("AUTH"), 1);
    assert_eq!(server.count("MAIL FROM"), 2);
    assert_eq!(server.opened(), 1);

    mailer.close().await;
    assert_eq!(server.count("QUIT"), 1);
}

#[tokio::test]
async fn test_bcc_is_in_envelope_not_headers() {
    let mut script = HANDSHAKE.to_vec();
    script.extend(["250 Ok", "250 Ok", "250 Ok", "354 Go", "250 Queued", QUIT]);
    let (mut mailer, server) = mailer(MailerConfig::smtp("mx.example.com"), &script);

    let mut message = message();
    assert!(message.add_bcc("hidden@example.com", ""));
    mailer.try_send(&message).await.unwrap();

    let sent = server.sent();
    assert!(sent.contains("RCPT TO:<hidden@example.com>\r\n"));
    assert!(!sent.contains("Bcc:"));
}

#[tokio::test]
async fn test_empty_body() {
    let mut message = message();
    message.set_body("");

    let (mut strict, server) = mailer(MailerConfig::smtp("mx.example.com"), &[]);
    let err = strict.try_send(&message).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Validation);
    assert!(strict.last_error().unwrap().contains("Message body empty"));
    assert_eq!(server.opened(), 0);

    let config = MailerConfig::builder().allow_empty(true).build();
    let (mut lenient, _) = mailer(config, &script(1));
    assert!(lenient.send(&message).await);
}

#[tokio::test]
async fn test_missing_sender_and_recipients() {
    let (mut mailer, server) = mailer(MailerConfig::smtp("mx.example.com"), &[]);

    let mut no_from = Message::new();
    no_from.add_address("recipient@example.com", "");
    no_from.set_body("Hi");
    assert!(matches!(
        mailer.try_send(&no_from).await,
        Err(Error::Validation(_))
    ));

    let mut no_rcpt = Message::new();
    no_rcpt.set_from("sender@example.com", "");
    no_rcpt.set_body("Hi");
    assert!(!mailer.send(&no_rcpt).await);
    assert!(mailer.last_error().unwrap().contains("recipient"));
    assert_eq!(server.opened(), 0);
}

#[tokio::test]
async fn test_deleted_attachment_fails_in_both_modes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.pdf");
    std::fs::write(&path, b"%PDF-1.4").unwrap();

    let mut message = message();
    assert!(message.add_attachment(
        &path,
        "",
        TransferEncoding::Base64,
        "",
        Disposition::Attachment
    ));
    std::fs::remove_file(&path).unwrap();

    let (mut mailer, server) = mailer(MailerConfig::smtp("mx.example.com"), &[]);
    assert!(!mailer.send(&message).await);
    assert!(mailer.last_error().unwrap().contains("report.pdf"));

    let err = mailer.try_send(&message).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Resource);
    assert_eq!(server.opened(), 0);
}

#[tokio::test]
async fn test_invalid_read_receipt_fails() {
    let mut message = message();
    assert!(!message.set_confirm_reading_to("not an address"));

    let (mut mailer, server) = mailer(MailerConfig::smtp("mx.example.com"), &[]);
    let err = mailer.try_send(&message).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Validation);
    assert_eq!(server.opened(), 0);
}

#[tokio::test]
async fn test_rejected_recipient() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let script = [
        HANDSHAKE[0],
        HANDSHAKE[1],
        "250 Ok",
        "550 5.1.1 No such user",
        "250 Reset",
        QUIT,
    ];
    let (mut mailer, server) = mailer(MailerConfig::smtp("mx.example.com"), &script);

    let err = mailer.try_send(&message()).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Protocol);
    assert!(mailer.last_error().unwrap().contains("550"));
    assert_eq!(server.count("RSET"), 1);
    assert_eq!(server.count("DATA"), 0);
    assert!(mailer.last_message().is_none());
}

#[tokio::test]
async fn test_dsn_request() {
    let script = [
        "220 mx.example.com ESMTP",
        "250-mx.example.com",
        "250 DSN",
        "250 Ok",
        "250 Ok",
        "354 Go",
        "250 Queued",
        QUIT,
    ];
    let config = MailerConfig::builder()
        .dsn(DsnNotify::SUCCESS.union(DsnNotify::FAILURE))
        .build();
    let (mut mailer, server) = mailer(config, &script);

    mailer.try_send(&message()).await.unwrap();
    assert!(
        server
            .sent()
            .contains("RCPT TO:<recipient@example.com> NOTIFY=SUCCESS,FAILURE\r\n")
    );
}

#[tokio::test]
async fn test_x_mailer_override() {
    let config = MailerConfig::builder().x_mailer("Reports 2.1").build();
    let (mut mailer, _) = mailer(config, &script(1));
    mailer.try_send(&message()).await.unwrap();
    let last = String::from_utf8(mailer.last_message().unwrap().to_vec()).unwrap();
    assert!(last.contains("X-Mailer: Reports 2.1\r\n"));

    let config = MailerConfig::builder().x_mailer("").build();
    let (mut mailer, _) = self::mailer(config, &script(1));
    mailer.try_send(&message()).await.unwrap();
    let last = String::from_utf8(mailer.last_message().unwrap().to_vec()).unwrap();
    assert!(!last.contains("X-Mailer:"));
}

#[tokio::test]
async fn test_send_with_borrowed_session() {
    let connector = ScriptedConnector::new(&script(1));
    let mut session =
        SmtpSession::with_connector(SessionConfig::new("mx.example.com"), connector.clone());
    let mut mailer = Mailer::with_connector(MailerConfig::default(), ScriptedConnector::default());

    mailer.send_with(&message(), &mut session).await.unwrap();
    assert!(session.state().is_ready());
    assert_eq!(connector.count("QUIT"), 0);

    session.close().await;
    assert_eq!(connector.count("QUIT"), 1);
}

/// Wraps the entity in a `multipart/signed` container with a fake signature.
struct FakeSigner;

impl Signer for FakeSigner {
    fn sign(&self, entity: &[u8], material: &SigningMaterial) -> mailforge_core::Result<Vec<u8>> {
        if !material.cert.ends_with("cert.pem") {
            return Err(Error::Signing("unknown certificate".into()));
        }
        let mut signed = b"Content-Type: multipart/signed; protocol=\"application/pkcs7-signature\"; boundary=\"sig\"\r\n\r\n--sig\r\n".to_vec();
        signed.extend_from_slice(entity);
        signed.extend_from_slice(b"\r\n--sig\r\nContent-Type: application/pkcs7-signature\r\n\r\nFAKE\r\n--sig--\r\n");
        Ok(signed)
    }
}

#[tokio::test]
async fn test_signing_replaces_entity() {
    let config = MailerConfig::builder()
        .signing(SigningMaterial::new("/etc/mail/cert.pem", "/etc/mail/key.pem"))
        .build();
    let connector = ScriptedConnector::new(&script(1));
    let mut mailer = Mailer::with_connector(config, connector).with_signer(FakeSigner);

    mailer.try_send(&message()).await.unwrap();
    let last = String::from_utf8(mailer.last_message().unwrap().to_vec()).unwrap();
    assert!(last.contains("MIME-Version: 1.0\r\nContent-Type: multipart/signed;"));
    assert!(last.contains("--sig\r\nContent-Type: text/plain;"));
    assert!(last.contains("Figures attached."));
    assert_eq!(last.matches("MIME-Version").count(), 1);
}

#[tokio::test]
async fn test_signing_errors() {
    let config = MailerConfig::builder()
        .signing(SigningMaterial::new("cert.pem", "key.pem"))
        .build();
    let (mut unsigned, server) = mailer(config, &[]);
    let err = unsigned.try_send(&message()).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Signing);
    assert_eq!(server.opened(), 0);

    let config = MailerConfig::builder()
        .signing(SigningMaterial::new("other.pem", "key.pem"))
        .build();
    let mut failing =
        Mailer::with_connector(config, ScriptedConnector::default()).with_signer(FakeSigner);
    assert!(!failing.send(&message()).await);
    assert_eq!(failing.last_error(), Some("Signing error: unknown certificate"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_sendmail_transport() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let program = dir.path().join("sendmail");
    let out = dir.path().join("out");
    std::fs::write(
        &program,
        format!(
            "#!/bin/sh\necho \"$@\" > '{0}.args'\ncat > '{0}.msg'\n",
            out.display()
        ),
    )
    .unwrap();
    std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755)).unwrap();

    let config = MailerConfig::builder()
        .transport(Transport::Sendmail)
        .sendmail_path(&program)
        .build();
    let mut mailer = Mailer::with_connector(config, ScriptedConnector::default());

    let mut message = message();
    assert!(message.add_bcc("hidden@example.com", ""));
    mailer.try_send(&message).await.unwrap();

    let args = std::fs::read_to_string(out.with_extension("args")).unwrap();
    assert_eq!(args.trim(), "-oi -t -f sender@example.com");
    let sent = std::fs::read_to_string(out.with_extension("msg")).unwrap();
    assert!(sent.contains("Bcc: hidden@example.com\r\n"));
    assert!(sent.contains("Figures attached."));
}

#[cfg(unix)]
#[tokio::test]
async fn test_mail_program_failure() {
    let config = MailerConfig::builder()
        .transport(Transport::Qmail)
        .qmail_path("/bin/false")
        .build();
    let mut mailer = Mailer::with_connector(config, ScriptedConnector::default());

    let err = mailer.try_send(&message()).await.unwrap_err();
    assert!(matches!(err, Error::ProcessFailed { .. }));
    assert_eq!(err.category(), ErrorCategory::Transport);
}
