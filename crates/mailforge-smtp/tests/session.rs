//! Integration tests for the SMTP session.
//!
//! A scripted connector plays the server side: every line the session reads
//! comes from a prepared script, and every write is captured for inspection.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use mailforge_smtp::{
    ConnectOptions, Connection, Connector, Credentials, DsnNotify, Envelope, Error, Security,
    SessionConfig, SessionState, SmtpSession,
};

/// Server side of the conversation, shared by the connector and its connections.
#[derive(Debug, Default)]
struct Server {
    replies: VecDeque<String>,
    writes: Vec<Vec<u8>>,
    opened: Vec<(String, u16, bool)>,
    refuse: Vec<String>,
    tls_upgrades: usize,
    closed: usize,
    hang: bool,
}

#[derive(Debug, Clone, Default)]
struct ScriptedConnector(Arc<Mutex<Server>>);

impl ScriptedConnector {
    fn new(script: &[&str]) -> Self {
        let connector = Self::default();
        connector.push(script);
        connector
    }

    fn push(&self, script: &[&str]) {
        self.0
            .lock()
            .unwrap()
            .replies
            .extend(script.iter().map(ToString::to_string));
    }

    fn refuse(&self, host: &str) {
        self.0.lock().unwrap().refuse.push(host.to_string());
    }

    fn hang_when_drained(&self) {
        self.0.lock().unwrap().hang = true;
    }

    fn sent(&self) -> String {
        let server = self.0.lock().unwrap();
        String::from_utf8(server.writes.concat()).unwrap()
    }

    fn writes(&self) -> Vec<String> {
        let server = self.0.lock().unwrap();
        server
            .writes
            .iter()
            .map(|w| String::from_utf8(w.clone()).unwrap())
            .collect()
    }

    fn opened(&self) -> Vec<(String, u16, bool)> {
        self.0.lock().unwrap().opened.clone()
    }

    fn count(&self, verb: &str) -> usize {
        self.sent()
            .split("\r\n")
            .filter(|line| line.starts_with(verb))
            .count()
    }
}

#[derive(Debug)]
struct ScriptedConnection {
    server: Arc<Mutex<Server>>,
    tls: bool,
}

impl Connector for ScriptedConnector {
    type Connection = ScriptedConnection;

    async fn open(
        &self,
        host: &str,
        port: u16,
        options: &ConnectOptions,
    ) -> mailforge_smtp::Result<ScriptedConnection> {
        let mut server = self.0.lock().unwrap();
        server
            .opened
            .push((host.to_string(), port, options.implicit_tls));
        if server.refuse.iter().any(|h| h == host) {
            return Err(io::Error::from(io::ErrorKind::ConnectionRefused).into());
        }
        Ok(ScriptedConnection {
            server: Arc::clone(&self.0),
            tls: options.implicit_tls,
        })
    }
}

impl Connection for ScriptedConnection {
    async fn write_all(&mut self, data: &[u8]) -> mailforge_smtp::Result<()> {
        self.server.lock().unwrap().writes.push(data.to_vec());
        Ok(())
    }

    async fn read_line(&mut self) -> mailforge_smtp::Result<String> {
        let (line, hang) = {
            let mut server = self.server.lock().unwrap();
            (server.replies.pop_front(), server.hang)
        };
        match line {
            Some(line) => Ok(line),
            None if hang => std::future::pending().await,
            None => Err(io::Error::from(io::ErrorKind::UnexpectedEof).into()),
        }
    }

    async fn upgrade_tls(&mut self, _server_name: &str) -> mailforge_smtp::Result<()> {
        self.server.lock().unwrap().tls_upgrades += 1;
        self.tls = true;
        Ok(())
    }

    async fn close(&mut self) -> mailforge_smtp::Result<()> {
        self.server.lock().unwrap().closed += 1;
        Ok(())
    }

    fn is_tls(&self) -> bool {
        self.tls
    }
}

const GREETING: &str = "220 mail.example.com ESMTP ready";

fn session(hosts: &str, connector: &ScriptedConnector) -> SmtpSession<ScriptedConnector> {
    let config = SessionConfig::builder(hosts)
        .helo_name("client.example.com")
        .build();
    SmtpSession::with_connector(config, connector.clone())
}

fn envelope(to: &[&str]) -> Envelope {
    Envelope::new("sender@example.com", to.iter().copied()).unwrap()
}

#[tokio::test]
async fn test_keep_alive_sends_two_messages_without_new_ehlo() {
    let connector = ScriptedConnector::new(&[
        GREETING,
        "250-mail.example.com",
        "250 8BITMIME",
        "250 OK",
        "250 OK",
        "354 Go ahead",
        "250 queued as 1",
        "250 OK",
        "250 OK",
        "354 Go ahead",
        "250 queued as 2",
        "221 Bye",
    ]);
    let mut session = session("localhost", &connector);

    let first = session
        .send(&envelope(&["a@example.com"]), b"Subject: one\r\n\r\nfirst\r\n")
        .await
        .unwrap();
    assert_eq!(first.message_text(), "queued as 1");
    assert_eq!(session.state(), SessionState::Greeted);

    session
        .send(&envelope(&["b@example.com"]), b"Subject: two\r\n\r\nsecond\r\n")
        .await
        .unwrap();
    assert_eq!(connector.count("EHLO"), 1);
    assert_eq!(connector.count("MAIL FROM"), 2);
    assert_eq!(connector.opened().len(), 1);

    session.close().await;
    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(connector.sent().ends_with("QUIT\r\n"));
    assert_eq!(connector.0.lock().unwrap().closed, 1);
}

#[tokio::test]
async fn test_keep_alive_authenticates_once() {
    let connector = ScriptedConnector::new(&[
        GREETING,
        "250-mail.example.com",
        "250 AUTH PLAIN",
        "235 2.7.0 Authentication successful",
        "250 OK",
        "250 OK",
        "354 Go ahead",
        "250 queued as 1",
        "250 OK",
        "250 OK",
        "354 Go ahead",
        "250 queued as 2",
        "221 Bye",
    ]);
    let config = SessionConfig::builder("localhost")
        .helo_name("client.example.com")
        .credentials(Credentials::new("user", "pass"))
        .build();
    let mut session = SmtpSession::with_connector(config, connector.clone());

    session
        .send(&envelope(&["a@example.com"]), b"Subject: one\r\n\r\nfirst\r\n")
        .await
        .unwrap();
    assert_eq!(session.state(), SessionState::Authenticated);

    session
        .send(&envelope(&["b@example.com"]), b"Subject: two\r\n\r\nsecond\r\n")
        .await
        .unwrap();
    assert_eq!(session.state(), SessionState::Authenticated);
    assert_eq!(connector.count("AUTH"), 1);
    assert_eq!(connector.count("EHLO"), 1);
    assert_eq!(connector.count("MAIL FROM"), 2);
    assert_eq!(connector.opened().len(), 1);

    session.close().await;
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn test_line_break_in_sender_never_reaches_the_wire() {
    let connector = ScriptedConnector::new(&[GREETING, "250 mail.example.com"]);
    let mut session = session("localhost", &connector);
    session.connect().await.unwrap();

    let result = session.mail("somewhere\nbad").await;
    assert!(matches!(result, Err(Error::InvalidArgument(_))));
    assert!(!connector.sent().contains("bad"));
    assert_eq!(session.state(), SessionState::Greeted);
}

#[tokio::test]
async fn test_pipelined_envelope_is_one_write() {
    let connector = ScriptedConnector::new(&[
        GREETING,
        "250-mail.example.com",
        "250 PIPELINING",
        "250 OK",
        "250 OK",
        "251 will forward",
        "354 Go ahead",
        "250 OK",
    ]);
    let mut session = session("localhost", &connector);
    session
        .send(&envelope(&["a@example.com", "b@example.com"]), b"body")
        .await
        .unwrap();

    let writes = connector.writes();
    assert!(writes.contains(
        &"MAIL FROM:<sender@example.com>\r\nRCPT TO:<a@example.com>\r\nRCPT TO:<b@example.com>\r\n"
            .to_string()
    ));
    assert!(writes.contains(&"DATA\r\n".to_string()));
}

#[tokio::test]
async fn test_refused_recipient_resets_transaction() {
    let connector = ScriptedConnector::new(&[
        GREETING,
        "250 mail.example.com",
        "250 OK",
        "550 5.1.1 No such user",
        "250 Reset",
    ]);
    let mut session = session("localhost", &connector);

    let err = session
        .send(&envelope(&["nobody@example.com"]), b"body")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Smtp { code: 550, ref message } if message == "5.1.1 No such user"));
    assert!(err.is_permanent());
    assert!(connector.sent().ends_with("RSET\r\n"));
    assert_eq!(session.state(), SessionState::Greeted);
    assert_eq!(connector.count("DATA"), 0);
}

#[tokio::test]
async fn test_pipelined_failure_reads_every_reply_then_resets() {
    let connector = ScriptedConnector::new(&[
        GREETING,
        "250-mail.example.com",
        "250 PIPELINING",
        "250 OK",
        "450 mailbox busy",
        "250 OK",
        "250 Reset",
        "250 OK",
    ]);
    let mut session = session("localhost", &connector);

    let err = session
        .send(&envelope(&["a@example.com", "b@example.com"]), b"body")
        .await
        .unwrap_err();
    assert!(err.is_transient());
    assert!(connector.sent().ends_with("RSET\r\n"));

    // the connection is still in sync
    assert_eq!(session.noop().await.unwrap().message_text(), "OK");
}

#[tokio::test]
async fn test_dsn_notify_parameters() {
    let connector = ScriptedConnector::new(&[
        GREETING,
        "250-mail.example.com",
        "250 DSN",
        "250 OK",
        "250 OK",
        "354 Go ahead",
        "250 OK",
        "250 OK",
        "250 OK",
        "354 Go ahead",
        "250 OK",
    ]);
    let mut session = session("localhost", &connector);

    let notify = DsnNotify::parse("SUCCESS,FAILURE");
    session
        .send(&envelope(&["a@example.com"]).with_notify(notify), b"x")
        .await
        .unwrap();
    assert!(
        connector
            .sent()
            .contains("RCPT TO:<a@example.com> NOTIFY=SUCCESS,FAILURE\r\n")
    );

    let notify = DsnNotify::parse("NEVER");
    session
        .send(&envelope(&["b@example.com"]).with_notify(notify), b"x")
        .await
        .unwrap();
    assert!(connector.sent().contains("RCPT TO:<b@example.com> NOTIFY=NEVER\r\n"));
}

#[tokio::test]
async fn test_dsn_dropped_when_not_advertised() {
    let connector = ScriptedConnector::new(&[
        GREETING,
        "250 mail.example.com",
        "250 OK",
        "250 OK",
        "354 Go ahead",
        "250 OK",
    ]);
    let mut session = session("localhost", &connector);
    session
        .send(
            &envelope(&["a@example.com"]).with_notify(Some(DsnNotify::FAILURE)),
            b"x",
        )
        .await
        .unwrap();
    assert!(connector.sent().contains("RCPT TO:<a@example.com>\r\n"));
}

#[tokio::test]
async fn test_mail_parameters_follow_extensions() {
    let connector = ScriptedConnector::new(&[
        GREETING,
        "250-mail.example.com",
        "250-8BITMIME",
        "250-SMTPUTF8",
        "250 SIZE 1000000",
        "250 OK",
        "250 OK",
        "354 Go ahead",
        "250 OK",
    ]);
    let mut session = session("localhost", &connector);
    let message = "Subject: caf\u{e9}\r\n\r\n\u{e9}\r\n".as_bytes();
    let envelope = Envelope::new("sender@example.com", ["j\u{f6}rg@example.com"]).unwrap();
    session.send(&envelope, message).await.unwrap();

    assert!(connector.sent().contains(&format!(
        "MAIL FROM:<sender@example.com> BODY=8BITMIME SMTPUTF8 SIZE={}\r\n",
        message.len()
    )));
}

#[tokio::test]
async fn test_utf8_address_requires_smtputf8() {
    let connector = ScriptedConnector::new(&[GREETING, "250 mail.example.com"]);
    let mut session = session("localhost", &connector);
    let envelope = Envelope::new("sender@example.com", ["j\u{f6}rg@example.com"]).unwrap();

    let err = session.send(&envelope, b"x").await.unwrap_err();
    assert!(matches!(err, Error::NotSupported(_)));
    assert_eq!(connector.count("MAIL FROM"), 0);
}

#[tokio::test]
async fn test_data_is_dot_stuffed() {
    let connector = ScriptedConnector::new(&[
        GREETING,
        "250 mail.example.com",
        "250 OK",
        "250 OK",
        "354 Go ahead",
        "250 OK",
    ]);
    let mut session = session("localhost", &connector);
    session
        .send(&envelope(&["a@example.com"]), b"line\n.dot\nend")
        .await
        .unwrap();
    assert!(connector.sent().contains("DATA\r\nline\r\n..dot\r\nend\r\n.\r\n"));
}

#[tokio::test]
async fn test_host_list_failover_with_whitespace_and_ipv6() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let connector = ScriptedConnector::new(&[GREETING, "250 mail.example.com"]);
    connector.refuse("bad.example.com");
    let mut session = session(" bad.example.com:12345 ; [::1]:2525 ", &connector);

    session.connect().await.unwrap();
    assert_eq!(
        connector.opened(),
        vec![
            ("bad.example.com".to_string(), 12345, false),
            ("::1".to_string(), 2525, false)
        ]
    );
    assert_eq!(session.connected_host().unwrap().to_string(), "[::1]:2525");
}

#[tokio::test]
async fn test_all_candidates_fail() {
    let connector = ScriptedConnector::default();
    connector.refuse("a.example.com");
    connector.refuse("b.example.com");
    let mut session = session("a.example.com;b.example.com", &connector);

    let err = session.connect().await.unwrap_err();
    assert!(err.is_transport());
    assert_eq!(connector.opened().len(), 2);
    assert_eq!(session.state(), SessionState::Disconnected);

    let mut session = self::session("xyz://bogus:25;tls://[bogus]:25", &connector);
    assert!(matches!(session.connect().await, Err(Error::Connect(_))));
}

#[tokio::test]
async fn test_implicit_tls_candidate() {
    let connector = ScriptedConnector::new(&[GREETING, "250 mail.example.com"]);
    let mut session = session("ssl://smtp.example.com", &connector);
    session.connect().await.unwrap();
    assert_eq!(
        connector.opened(),
        vec![("smtp.example.com".to_string(), 465, true)]
    );
}

#[tokio::test]
async fn test_starttls_repeats_ehlo() {
    let connector = ScriptedConnector::new(&[
        GREETING,
        "250-mail.example.com",
        "250-STARTTLS",
        "250 AUTH PLAIN",
        "220 Ready to start TLS",
        "250-mail.example.com",
        "250 AUTH PLAIN LOGIN",
    ]);
    let config = SessionConfig::builder("tls://smtp.example.com")
        .helo_name("client.example.com")
        .build();
    let mut session = SmtpSession::with_connector(config, connector.clone());
    session.connect().await.unwrap();

    assert_eq!(connector.opened()[0].1, 587);
    assert_eq!(connector.0.lock().unwrap().tls_upgrades, 1);
    assert_eq!(connector.count("EHLO"), 2);
    assert!(!session.server_info().supports_starttls());
    assert_eq!(session.server_info().auth_mechanisms().len(), 2);
}

#[tokio::test]
async fn test_required_starttls_not_offered() {
    let connector = ScriptedConnector::new(&[GREETING, "250 mail.example.com", "221 Bye"]);
    let config = SessionConfig::builder("smtp.example.com")
        .security(Security::StartTls)
        .build();
    let mut session = SmtpSession::with_connector(config, connector.clone());

    assert!(matches!(
        session.connect().await,
        Err(Error::NotSupported(_))
    ));
    assert!(connector.sent().ends_with("QUIT\r\n"));
}

#[tokio::test]
async fn test_helo_fallback() {
    let connector = ScriptedConnector::new(&[
        GREETING,
        "502 Command not implemented",
        "250 mail.example.com",
    ]);
    let mut session = session("localhost", &connector);
    session.connect().await.unwrap();

    assert!(connector.sent().contains("HELO client.example.com\r\n"));
    assert!(!session.server_info().esmtp);
    assert_eq!(session.state(), SessionState::Greeted);
}

#[tokio::test]
async fn test_auth_login() {
    let connector = ScriptedConnector::new(&[
        GREETING,
        "250-mail.example.com",
        "250 AUTH LOGIN",
        "334 VXNlcm5hbWU6",
        "334 UGFzc3dvcmQ6",
        "235 Authentication successful",
    ]);
    let config = SessionConfig::builder("localhost")
        .credentials(Credentials::new("user", "pass"))
        .build();
    let mut session = SmtpSession::with_connector(config, connector.clone());
    session.connect().await.unwrap();

    assert_eq!(session.state(), SessionState::Authenticated);
    assert!(connector.sent().contains("AUTH LOGIN\r\ndXNlcg==\r\ncGFzcw==\r\n"));
}

#[tokio::test]
async fn test_auth_cram_md5() {
    let connector = ScriptedConnector::new(&[
        GREETING,
        "250-mail.example.com",
        "250 AUTH PLAIN LOGIN CRAM-MD5",
        "334 PDE4OTYuNjk3MTcwOTUyQHBvc3RvZmZpY2UucmVzdG9uLm1jaS5uZXQ+",
        "235 OK",
    ]);
    let config = SessionConfig::builder("localhost")
        .credentials(Credentials::new("tim", "tanstaaftanstaaf"))
        .build();
    let mut session = SmtpSession::with_connector(config, connector.clone());
    session.connect().await.unwrap();

    let expected = STANDARD.encode("tim b913a602c7eda7a495b4e6e7334d3890");
    assert!(connector.sent().contains(&format!("AUTH CRAM-MD5\r\n{expected}\r\n")));
}

#[tokio::test]
async fn test_auth_rejected() {
    let connector = ScriptedConnector::new(&[
        GREETING,
        "250-mail.example.com",
        "250 AUTH PLAIN",
        "535 5.7.8 Authentication credentials invalid",
        "221 Bye",
    ]);
    let config = SessionConfig::builder("localhost")
        .credentials(Credentials::new("user", "wrong"))
        .build();
    let mut session = SmtpSession::with_connector(config, connector.clone());

    let err = session.connect().await.unwrap_err();
    assert!(matches!(err, Error::Smtp { code: 535, .. }));
    assert!(err.is_protocol());
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn test_auth_rejected_keeps_error_when_quit_fails() {
    let connector = ScriptedConnector::new(&[
        GREETING,
        "250-mail.example.com",
        "250 AUTH PLAIN",
        "535 5.7.8 Authentication credentials invalid",
    ]);
    let config = SessionConfig::builder("localhost")
        .credentials(Credentials::new("user", "wrong"))
        .build();
    let mut session = SmtpSession::with_connector(config, connector.clone());

    let err = session.connect().await.unwrap_err();
    assert!(matches!(err, Error::Smtp { code: 535, .. }));
    assert_eq!(connector.count("QUIT"), 1);
    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(matches!(
        session.noop().await,
        Err(Error::InvalidState(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_disconnects() {
    let connector = ScriptedConnector::new(&[GREETING, "250 mail.example.com"]);
    connector.hang_when_drained();
    let config = SessionConfig::builder("localhost")
        .io_timeout(Duration::from_secs(5))
        .build();
    let mut session = SmtpSession::with_connector(config, connector.clone());
    session.connect().await.unwrap();

    let err = session.noop().await.unwrap_err();
    assert!(matches!(err, Error::Timeout(_)));
    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(matches!(
        session.noop().await,
        Err(Error::InvalidState(_))
    ));
}

#[tokio::test]
async fn test_server_closing_channel() {
    let connector = ScriptedConnector::new(&[
        GREETING,
        "250 mail.example.com",
        "421 4.3.2 Shutting down",
    ]);
    let mut session = session("localhost", &connector);
    session.connect().await.unwrap();

    let err = session.mail("sender@example.com").await.unwrap_err();
    assert!(err.is_transient());
    assert_eq!(session.state(), SessionState::Disconnected);
}
