//! Stateful SMTP session.
//!
//! A session owns at most one connection and walks it through
//! greeting, EHLO, STARTTLS, AUTH and any number of mail transactions.

use std::time::Duration;

use tokio::time::timeout;

use crate::auth::{Credentials, select_mechanism};
use crate::command::{Command, MailParams, dot_stuff};
use crate::config::{Security, SessionConfig};
use crate::error::{Error, Result};
use crate::host::{HostCandidate, parse_hosts};
use crate::parser::{is_last_reply_line, parse_reply};
use crate::transport::{ConnectOptions, Connection, Connector, TcpConnector};
use crate::types::{Address, AuthMechanism, DsnNotify, Extension, Reply, ReplyCode, ServerInfo};

/// Where a session is in the SMTP conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No connection.
    #[default]
    Disconnected,
    /// Connected, greeting not yet accepted.
    Connected,
    /// EHLO/HELO accepted.
    Greeted,
    /// AUTH accepted.
    Authenticated,
    /// MAIL FROM accepted, transaction open.
    InTransaction,
}

impl SessionState {
    /// Returns true if there is a live connection.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        !matches!(self, Self::Disconnected)
    }

    /// Returns true if a new transaction can start.
    #[must_use]
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Greeted | Self::Authenticated)
    }

    /// Returns true inside a mail transaction.
    #[must_use]
    pub const fn is_in_transaction(self) -> bool {
        matches!(self, Self::InTransaction)
    }
}

/// Reverse path, forward paths and DSN request of one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    from: Address,
    recipients: Vec<Address>,
    notify: Option<DsnNotify>,
}

impl Envelope {
    /// Creates an envelope. An empty sender is the null reverse-path.
    ///
    /// # Errors
    ///
    /// Returns an error if an address is malformed or contains a line break,
    /// or if there are no recipients.
    pub fn new<I, S>(from: &str, recipients: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let from = if from.is_empty() {
            Address::null()
        } else {
            Address::new(from)?
        };
        let recipients = recipients
            .into_iter()
            .map(|r| Address::new(r.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        if recipients.is_empty() {
            return Err(Error::InvalidArgument("envelope has no recipients".into()));
        }

        Ok(Self {
            from,
            recipients,
            notify: None,
        })
    }

    /// Requests delivery status notifications for every recipient.
    #[must_use]
    pub const fn with_notify(mut self, notify: Option<DsnNotify>) -> Self {
        self.notify = notify;
        self
    }

    /// Returns the reverse path.
    #[must_use]
    pub const fn from(&self) -> &Address {
        &self.from
    }

    /// Returns the forward paths.
    #[must_use]
    pub fn recipients(&self) -> &[Address] {
        &self.recipients
    }

    /// Returns the DSN request.
    #[must_use]
    pub const fn notify(&self) -> Option<DsnNotify> {
        self.notify
    }

    fn needs_smtputf8(&self) -> bool {
        self.from.is_utf8() || self.recipients.iter().any(Address::is_utf8)
    }
}

/// An SMTP client session.
///
/// All operations take `&mut self`; a session serves one caller at a time.
/// With keep-alive use, call [`SmtpSession::close`] when done.
pub struct SmtpSession<C: Connector = TcpConnector> {
    config: SessionConfig,
    connector: C,
    connection: Option<C::Connection>,
    state: SessionState,
    server_info: ServerInfo,
    last_reply: Option<Reply>,
    host: Option<HostCandidate>,
    authenticated: bool,
}

impl SmtpSession<TcpConnector> {
    /// Creates a session that connects over TCP.
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self::with_connector(config, TcpConnector::new())
    }
}

impl<C: Connector> std::fmt::Debug for SmtpSession<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpSession")
            .field("state", &self.state)
            .field("host", &self.host)
            .field("server_info", &self.server_info)
            .field("last_reply", &self.last_reply)
            .finish_non_exhaustive()
    }
}

impl<C: Connector> SmtpSession<C> {
    /// Creates a session that opens connections through `connector`.
    #[must_use]
    pub fn with_connector(config: SessionConfig, connector: C) -> Self {
        Self {
            config,
            connector,
            connection: None,
            state: SessionState::Disconnected,
            server_info: ServerInfo::default(),
            last_reply: None,
            host: None,
            authenticated: false,
        }
    }

    /// Returns the session configuration.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Returns true if there is a live connection.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Returns what the server advertised.
    #[must_use]
    pub const fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Returns the last reply received.
    #[must_use]
    pub const fn last_reply(&self) -> Option<&Reply> {
        self.last_reply.as_ref()
    }

    /// Returns the host list entry the session is connected to.
    #[must_use]
    pub const fn connected_host(&self) -> Option<&HostCandidate> {
        self.host.as_ref()
    }

    /// Connects to the first host in the configured list that completes
    /// greeting, EHLO, STARTTLS and AUTH.
    ///
    /// Does nothing if the session is already connected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connect`] if the host list has no valid entry,
    /// otherwise the error of the last candidate tried.
    pub async fn connect(&mut self) -> Result<()> {
        if self.state.is_connected() {
            return Ok(());
        }

        let candidates = parse_hosts(&self.config.hosts);
        if candidates.is_empty() {
            return Err(Error::Connect(format!(
                "no valid host in {:?}",
                self.config.hosts
            )));
        }

        let mut last_error = None;
        for candidate in candidates {
            match self.connect_candidate(&candidate).await {
                Ok(()) => {
                    tracing::debug!(host = %candidate, "SMTP session established");
                    self.host = Some(candidate);
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(host = %candidate, error = %e, "SMTP connect attempt failed");
                    self.abandon(&e).await;
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Connect("no host accepted".into())))
    }

    async fn connect_candidate(&mut self, candidate: &HostCandidate) -> Result<()> {
        let security = candidate.security.unwrap_or(self.config.security);
        let port = candidate.port.unwrap_or_else(|| self.config.port_for(security));
        let options = ConnectOptions {
            implicit_tls: security == Security::Implicit,
        };

        tracing::debug!(host = %candidate.host, port, ?security, "Connecting to SMTP server");
        let connection = timeout(
            self.config.connect_timeout,
            self.connector.open(&candidate.host, port, &options),
        )
        .await
        .map_err(|_| {
            Error::Timeout(format!("connecting to {}:{port}", candidate.host))
        })??;
        self.connection = Some(connection);
        self.state = SessionState::Connected;
        self.server_info = ServerInfo::default();
        self.authenticated = false;

        let greeting = self.read_reply().await?;
        if greeting.code != ReplyCode::SERVICE_READY {
            return Err(greeting.into_error());
        }
        self.server_info.hostname = greeting
            .message
            .first()
            .and_then(|msg| msg.split_whitespace().next())
            .unwrap_or("unknown")
            .to_string();

        self.hello().await?;

        let encrypted = self.connection.as_ref().is_some_and(|c| c.is_tls());
        let offered = self.server_info.supports_starttls();
        let wants_tls = match security {
            Security::StartTls => true,
            Security::None => self.config.auto_tls && offered,
            Security::Implicit => false,
        };
        if wants_tls && !encrypted {
            self.starttls(&candidate.host).await?;
        }

        if let Some(credentials) = self.config.credentials.clone() {
            self.authenticate(&credentials).await?;
        }
        Ok(())
    }

    async fn hello(&mut self) -> Result<()> {
        let hostname = self.config.helo_name.clone();
        let reply = self
            .command(Command::Ehlo {
                hostname: hostname.clone(),
            })
            .await?;
        if reply.is_success() {
            self.server_info.apply_ehlo(&reply);
        } else {
            let reply = self.command(Command::Helo { hostname }).await?;
            if !reply.is_success() {
                return Err(reply.into_error());
            }
            self.server_info.clear_extensions();
        }
        self.state = SessionState::Greeted;
        Ok(())
    }

    async fn starttls(&mut self, server_name: &str) -> Result<()> {
        if !self.server_info.supports_starttls() {
            return Err(Error::NotSupported("STARTTLS".into()));
        }
        self.expect(Command::StartTls, &[ReplyCode::SERVICE_READY])
            .await?;

        let limit = self.config.connect_timeout;
        let connection = self.connection_mut()?;
        let upgraded = timeout(limit, connection.upgrade_tls(server_name))
            .await
            .map_err(|_| Error::Timeout("TLS handshake".into()))
            .and_then(|r| r);
        if let Err(e) = upgraded {
            return Err(self.fail(e));
        }

        // RFC 3207: forget everything learned before the handshake
        self.server_info.clear_extensions();
        self.state = SessionState::Connected;
        self.hello().await
    }

    /// Authenticates with the given credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if no usable mechanism is advertised or the server
    /// rejects the credentials.
    pub async fn authenticate(&mut self, credentials: &Credentials) -> Result<()> {
        if !self.state.is_ready() {
            return Err(Error::InvalidState(format!(
                "AUTH in state {:?}",
                self.state
            )));
        }
        let mechanism = select_mechanism(credentials, &self.server_info.auth_mechanisms())?;
        tracing::debug!(%mechanism, user = credentials.username(), "Authenticating");

        match mechanism {
            AuthMechanism::Plain => {
                self.expect(
                    Command::Auth {
                        mechanism,
                        initial_response: Some(credentials.plain_response()?),
                    },
                    &[ReplyCode::AUTH_SUCCESS],
                )
                .await?;
            }
            AuthMechanism::Login => {
                let (user, password) = credentials.login_responses()?;
                let prompt = [ReplyCode::AUTH_CONTINUE];
                self.expect(
                    Command::Auth {
                        mechanism,
                        initial_response: None,
                    },
                    &prompt,
                )
                .await?;
                self.expect(Command::AuthResponse(user), &prompt).await?;
                self.expect(Command::AuthResponse(password), &[ReplyCode::AUTH_SUCCESS])
                    .await?;
            }
            AuthMechanism::CramMd5 => {
                let challenge = self
                    .expect(
                        Command::Auth {
                            mechanism,
                            initial_response: None,
                        },
                        &[ReplyCode::AUTH_CONTINUE],
                    )
                    .await?;
                let response = credentials.cram_md5_response(&challenge.message_text())?;
                self.expect(Command::AuthResponse(response), &[ReplyCode::AUTH_SUCCESS])
                    .await?;
            }
            AuthMechanism::XOAuth2 => {
                let reply = self
                    .command(Command::Auth {
                        mechanism,
                        initial_response: Some(credentials.xoauth2_response()?),
                    })
                    .await?;
                if reply.code == ReplyCode::AUTH_CONTINUE {
                    // The challenge carries a JSON error; an empty line ends the exchange.
                    let reply = self.command(Command::AuthResponse(String::new())).await?;
                    return Err(Error::Auth(format!("XOAUTH2 rejected: {reply}")));
                }
                if reply.code != ReplyCode::AUTH_SUCCESS {
                    return Err(reply.into_error());
                }
            }
        }

        self.authenticated = true;
        self.state = SessionState::Authenticated;
        Ok(())
    }

    /// Starts a transaction with `MAIL FROM`. An empty sender is `<>`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the sender contains a line break,
    /// [`Error::InvalidState`] outside Greeted/Authenticated, or the server's
    /// refusal.
    pub async fn mail(&mut self, from: &str) -> Result<Reply> {
        let from = if from.is_empty() {
            Address::null()
        } else {
            Address::new(from)?
        };
        self.mail_with(from, MailParams::default()).await
    }

    async fn mail_with(&mut self, from: Address, params: MailParams) -> Result<Reply> {
        self.require_ready("MAIL")?;
        let reply = self
            .expect(Command::MailFrom { from, params }, &[ReplyCode::OK])
            .await?;
        self.state = SessionState::InTransaction;
        Ok(reply)
    }

    /// Adds a recipient with `RCPT TO`.
    ///
    /// The DSN request is only sent to servers that advertise `DSN`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the address contains a line
    /// break, [`Error::InvalidState`] outside a transaction, or the server's
    /// refusal.
    pub async fn recipient(&mut self, to: &str, notify: Option<DsnNotify>) -> Result<Reply> {
        let to = Address::new(to)?;
        self.require_transaction("RCPT")?;
        let command = self.rcpt_command(to, notify);
        self.expect(command, &[ReplyCode::OK, ReplyCode::FORWARD])
            .await
    }

    fn rcpt_command(&self, to: Address, notify: Option<DsnNotify>) -> Command {
        let notify = notify.filter(|n| !n.is_empty());
        if notify.is_some() && !self.server_info.supports(&Extension::Dsn) {
            tracing::debug!("Server does not advertise DSN, dropping NOTIFY");
            return Command::RcptTo { to, notify: None };
        }
        Command::RcptTo { to, notify }
    }

    /// Sends `DATA` followed by the dot-stuffed message.
    ///
    /// On success the session is ready for the next transaction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] outside a transaction or the server's
    /// refusal of DATA or of the message.
    pub async fn data(&mut self, message: &[u8]) -> Result<Reply> {
        self.require_transaction("DATA")?;
        self.expect(Command::Data, &[ReplyCode::START_DATA]).await?;
        self.write(&dot_stuff(message)).await?;
        let reply = self.read_reply().await?;
        if reply.code != ReplyCode::OK {
            return Err(reply.into_error());
        }
        self.state = self.ready_state();
        Ok(reply)
    }

    /// Aborts the current transaction with `RSET`.
    ///
    /// # Errors
    ///
    /// Returns an error if not connected or the server refuses.
    pub async fn reset(&mut self) -> Result<Reply> {
        self.require_connected("RSET")?;
        let reply = self.expect(Command::Rset, &[ReplyCode::OK]).await?;
        self.state = self.ready_state();
        Ok(reply)
    }

    /// Sends `NOOP`, checking that the connection is still usable.
    ///
    /// # Errors
    ///
    /// Returns an error if not connected or the server refuses.
    pub async fn noop(&mut self) -> Result<Reply> {
        self.require_connected("NOOP")?;
        self.expect(Command::Noop, &[ReplyCode::OK]).await
    }

    /// Sends `QUIT` and closes the connection.
    ///
    /// The connection is closed even if QUIT fails.
    ///
    /// # Errors
    ///
    /// Returns an error if not connected or QUIT is refused.
    pub async fn quit(&mut self) -> Result<Reply> {
        self.require_connected("QUIT")?;
        let result = self
            .expect(Command::Quit, &[ReplyCode::CLOSING, ReplyCode::OK])
            .await;
        self.disconnect().await;
        result
    }

    /// Ends the session: `QUIT` if connected, then drop the connection.
    pub async fn close(&mut self) {
        if !self.state.is_connected() {
            return;
        }
        if let Err(e) = self.quit().await {
            tracing::debug!(error = %e, "QUIT failed while closing");
        }
    }

    /// Delivers one message, connecting first if needed.
    ///
    /// With `PIPELINING`, MAIL and every RCPT are written in one batch.
    /// `BODY=8BITMIME`, `SMTPUTF8` and `SIZE=` are added when advertised.
    /// A refused command issues `RSET` before the error is returned, leaving
    /// the session ready for the next message.
    ///
    /// # Errors
    ///
    /// Returns the connection error, [`Error::NotSupported`] for UTF-8
    /// addresses without `SMTPUTF8`, or the first refusal as
    /// [`Error::Smtp`].
    pub async fn send(&mut self, envelope: &Envelope, message: &[u8]) -> Result<Reply> {
        self.connect().await?;
        if self.state.is_in_transaction() {
            self.reset().await?;
        }

        let info = &self.server_info;
        if envelope.needs_smtputf8() && !info.supports(&Extension::SmtpUtf8) {
            return Err(Error::NotSupported("SMTPUTF8".into()));
        }
        let params = MailParams {
            eight_bit_mime: info.supports(&Extension::EightBitMime) && !message.is_ascii(),
            smtp_utf8: envelope.needs_smtputf8(),
            size: info.supports_size().then_some(message.len()),
        };

        match self.transaction(envelope, message, params).await {
            Ok(reply) => {
                tracing::info!(
                    recipients = envelope.recipients().len(),
                    bytes = message.len(),
                    "Message accepted for delivery"
                );
                Ok(reply)
            }
            Err(e) => {
                if self.state.is_connected() && !e.is_transport() {
                    if let Err(reset) = self.reset().await {
                        tracing::debug!(error = %reset, "RSET after failed transaction failed");
                    }
                }
                Err(e)
            }
        }
    }

    async fn transaction(
        &mut self,
        envelope: &Envelope,
        message: &[u8],
        params: MailParams,
    ) -> Result<Reply> {
        if self.server_info.supports_pipelining() {
            self.pipelined_envelope(envelope, params).await?;
        } else {
            self.mail_with(envelope.from.clone(), params).await?;
            for to in &envelope.recipients {
                let command = self.rcpt_command(to.clone(), envelope.notify);
                self.expect(command, &[ReplyCode::OK, ReplyCode::FORWARD])
                    .await?;
            }
        }
        self.data(message).await
    }

    /// RFC 2920: MAIL and RCPT go out together, replies are read in order.
    async fn pipelined_envelope(&mut self, envelope: &Envelope, params: MailParams) -> Result<()> {
        self.require_ready("MAIL")?;

        let mut commands = vec![Command::MailFrom {
            from: envelope.from.clone(),
            params,
        }];
        commands.extend(
            envelope
                .recipients
                .iter()
                .map(|to| self.rcpt_command(to.clone(), envelope.notify)),
        );

        let mut batch = Vec::new();
        for command in &commands {
            batch.extend(command.serialize()?);
            tracing::debug!(command = %command.log_line(), "SMTP command (pipelined)");
        }
        self.write(&batch).await?;

        let mut failure = None;
        for index in 0..commands.len() {
            let reply = self.read_reply().await?;
            let accepted = if index == 0 {
                reply.code == ReplyCode::OK
            } else {
                matches!(reply.code, ReplyCode::OK | ReplyCode::FORWARD)
            };
            if index == 0 && accepted {
                self.state = SessionState::InTransaction;
            }
            if !accepted && failure.is_none() {
                failure = Some(reply.into_error());
            }
        }

        failure.map_or(Ok(()), Err)
    }

    const fn ready_state(&self) -> SessionState {
        if self.state.is_connected() {
            if self.authenticated {
                SessionState::Authenticated
            } else {
                SessionState::Greeted
            }
        } else {
            SessionState::Disconnected
        }
    }

    fn require_connected(&self, verb: &str) -> Result<()> {
        if self.state.is_connected() {
            Ok(())
        } else {
            Err(Error::InvalidState(format!("{verb} without a connection")))
        }
    }

    fn require_ready(&self, verb: &str) -> Result<()> {
        if self.state.is_ready() {
            Ok(())
        } else {
            Err(Error::InvalidState(format!(
                "{verb} in state {:?}",
                self.state
            )))
        }
    }

    fn require_transaction(&self, verb: &str) -> Result<()> {
        if self.state.is_in_transaction() {
            Ok(())
        } else {
            Err(Error::InvalidState(format!(
                "{verb} in state {:?}",
                self.state
            )))
        }
    }

    /// Sends a command and fails unless the reply code is one of `accepted`.
    async fn expect(&mut self, command: Command, accepted: &[ReplyCode]) -> Result<Reply> {
        let reply = self.command(command).await?;
        if accepted.contains(&reply.code) {
            Ok(reply)
        } else {
            Err(reply.into_error())
        }
    }

    async fn command(&mut self, command: Command) -> Result<Reply> {
        let bytes = command.serialize()?;
        tracing::debug!(command = %command.log_line(), "SMTP command");
        self.write(&bytes).await?;
        self.read_reply().await
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let limit = self.config.io_timeout;
        let connection = self.connection_mut()?;
        let result = timeout(limit, connection.write_all(bytes))
            .await
            .map_err(|_| Error::Timeout(format!("writing after {}", secs(limit))))
            .and_then(|r| r);
        result.map_err(|e| self.fail(e))
    }

    async fn read_reply(&mut self) -> Result<Reply> {
        let limit = self.config.io_timeout;
        let connection = self.connection_mut()?;
        let result = timeout(limit, read_lines(connection))
            .await
            .map_err(|_| Error::Timeout(format!("no reply after {}", secs(limit))))
            .and_then(|r| r);
        let reply = result.map_err(|e| self.fail(e))?;

        tracing::debug!(reply = %reply, "SMTP reply");
        if reply.code == ReplyCode::SERVICE_UNAVAILABLE {
            // 421: the server is closing the channel
            self.connection = None;
            self.state = SessionState::Disconnected;
            self.authenticated = false;
        }
        self.last_reply = Some(reply.clone());
        Ok(reply)
    }

    fn connection_mut(&mut self) -> Result<&mut C::Connection> {
        self.connection
            .as_mut()
            .ok_or_else(|| Error::InvalidState("not connected".into()))
    }

    /// Drops the connection after a transport failure.
    fn fail(&mut self, error: Error) -> Error {
        if error.is_transport() {
            self.connection = None;
            self.state = SessionState::Disconnected;
            self.host = None;
            self.authenticated = false;
        }
        error
    }

    /// Cleans up after a failed connect attempt.
    async fn abandon(&mut self, error: &Error) {
        if self.state.is_connected() && !error.is_transport() {
            if let Err(e) = self.command(Command::Quit).await {
                tracing::debug!(error = %e, "QUIT failed while abandoning connection");
            }
        }
        self.disconnect().await;
    }

    async fn disconnect(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            if let Err(e) = connection.close().await {
                tracing::debug!(error = %e, "Error closing SMTP connection");
            }
        }
        self.state = SessionState::Disconnected;
        self.host = None;
        self.authenticated = false;
    }
}

async fn read_lines<T: Connection>(connection: &mut T) -> Result<Reply> {
    let mut lines = Vec::new();
    loop {
        let line = connection.read_line().await?;
        let is_last = is_last_reply_line(&line);
        lines.push(line);
        if is_last {
            break;
        }
    }
    parse_reply(&lines)
}

fn secs(duration: Duration) -> String {
    format!("{}s", duration.as_secs())
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

    #[test]
    fn test_default_state() {
        let state = SessionState::default();
        assert_eq!(state, SessionState::Disconnected);
        assert!(!state.is_connected());
        assert!(!state.is_ready());
    }

    #[test]
    fn test_state_helpers() {
        assert!(SessionState::Greeted.is_ready());
        assert!(SessionState::Authenticated.is_ready());
        assert!(!SessionState::InTransaction.is_ready());
        assert!(SessionState::InTransaction.is_in_transaction());
        assert!(SessionState::Connected.is_connected());
    }

    #[test]
    fn test_envelope() {
        let envelope = Envelope::new("", ["a@example.com", "b@example.com"])
            .unwrap()
            .with_notify(DsnNotify::parse("FAILURE"));
        assert!(envelope.from().is_null());
        assert_eq!(envelope.recipients().len(), 2);
        assert_eq!(envelope.notify(), Some(DsnNotify::FAILURE));
        assert!(!envelope.needs_smtputf8());

        assert!(Envelope::new("a@example.com", Vec::<String>::new()).is_err());
        assert!(matches!(
            Envelope::new("somewhere\nbad", ["b@example.com"]),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_connect_without_valid_hosts() {
        let mut session = SmtpSession::new(SessionConfig::new(" ; xyz://bogus "));
        let result = tokio_test::block_on(session.connect());
        assert!(matches!(result, Err(Error::Connect(_))));
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[test]
    fn test_session_starts_disconnected() {
        let session = SmtpSession::new(SessionConfig::new("localhost"));
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(session.last_reply().is_none());
        assert!(session.connected_host().is_none());
    }
}
