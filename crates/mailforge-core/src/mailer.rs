//! The send orchestrator.

use std::borrow::Cow;

use mailforge_mime::{
    Address, AssembleOptions, AssembledMessage, ContentSource, Message, assemble_with,
    canonicalize, file_is_accessible,
};
use mailforge_smtp::{Connector, Envelope, SmtpSession, TcpConnector};

use crate::config::{MailerConfig, Transport};
use crate::error::{Error, Result};
use crate::sign::Signer;
use crate::transport::{pipe_arguments, pipe_message};

/// Validates, assembles, signs and delivers messages.
///
/// The mailer owns an SMTP session for [`Transport::Smtp`]. With
/// `keep_alive` the connection survives between sends and must be released
/// with [`Mailer::close`].
///
/// Every failure is recorded and available from [`Mailer::last_error`],
/// whether it was reported through [`Mailer::try_send`] or [`Mailer::send`].
pub struct Mailer<C: Connector = TcpConnector> {
    config: MailerConfig,
    session: SmtpSession<C>,
    signer: Option<Box<dyn Signer>>,
    last_error: Option<String>,
    last_message: Option<Vec<u8>>,
}

impl Mailer<TcpConnector> {
    /// Creates a mailer that connects over TCP.
    #[must_use]
    pub fn new(config: MailerConfig) -> Self {
        let session = SmtpSession::new(config.smtp.clone());
        Self::from_parts(config, session)
    }
}

impl<C: Connector> std::fmt::Debug for Mailer<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailer")
            .field("config", &self.config)
            .field("session", &self.session)
            .field("signer", &self.signer.is_some())
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}

impl<C: Connector> Mailer<C> {
    /// Creates a mailer that opens SMTP connections through `connector`.
    #[must_use]
    pub fn with_connector(config: MailerConfig, connector: C) -> Self {
        let session = SmtpSession::with_connector(config.smtp.clone(), connector);
        Self::from_parts(config, session)
    }

    const fn from_parts(config: MailerConfig, session: SmtpSession<C>) -> Self {
        Self {
            config,
            session,
            signer: None,
            last_error: None,
            last_message: None,
        }
    }

    /// Sets the signer used when signing material is configured.
    #[must_use]
    pub fn with_signer(mut self, signer: impl Signer + 'static) -> Self {
        self.signer = Some(Box::new(signer));
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &MailerConfig {
        &self.config
    }

    /// Returns the owned SMTP session.
    #[must_use]
    pub const fn session(&self) -> &SmtpSession<C> {
        &self.session
    }

    /// Returns the diagnostic of the last failed operation.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Returns the bytes of the last successfully sent message.
    #[must_use]
    pub fn last_message(&self) -> Option<&[u8]> {
        self.last_message.as_deref()
    }

    /// Sends a message, reporting failure as `false`.
    ///
    /// The reason is available from [`Mailer::last_error`].
    pub async fn send(&mut self, message: &Message) -> bool {
        self.try_send(message).await.is_ok()
    }

    /// Sends a message through the configured transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] or a MIME error if the message fails a
    /// precondition, in which case nothing is sent. Otherwise returns the
    /// transport's error.
    pub async fn try_send(&mut self, message: &Message) -> Result<()> {
        let result = self.dispatch(message).await;
        self.finish(result)
    }

    /// Sends a message over a caller-owned SMTP session.
    ///
    /// The configured transport and keep-alive setting are ignored; the
    /// session stays open for the caller to reuse or close.
    ///
    /// # Errors
    ///
    /// Same as [`Mailer::try_send`].
    pub async fn send_with<D: Connector>(
        &mut self,
        message: &Message,
        session: &mut SmtpSession<D>,
    ) -> Result<()> {
        let result = match self.prepare(message) {
            Ok(assembled) => deliver_smtp(&self.config, session, message, &assembled)
                .await
                .map(|()| assembled.to_bytes()),
            Err(e) => Err(e),
        };
        self.finish(result)
    }

    /// Closes the owned SMTP connection, if any.
    pub async fn close(&mut self) {
        self.session.close().await;
    }

    async fn dispatch(&mut self, message: &Message) -> Result<Vec<u8>> {
        let assembled = self.prepare(message)?;
        match self.config.transport {
            Transport::Smtp => {
                let result =
                    deliver_smtp(&self.config, &mut self.session, message, &assembled).await;
                if !self.config.keep_alive {
                    self.session.close().await;
                }
                result?;
            }
            Transport::Sendmail | Transport::Qmail => {
                let program = self.config.program().ok_or_else(|| {
                    Error::Validation("No mail program configured".to_string())
                })?;
                let args = pipe_arguments(self.config.transport, message.envelope_sender());
                pipe_message(program, &args, &assembled.to_bytes()).await?;
                tracing::info!(
                    program = %program.display(),
                    message_id = assembled.message_id(),
                    "Message handed to mail program"
                );
            }
        }
        Ok(assembled.to_bytes())
    }

    fn finish(&mut self, result: Result<Vec<u8>>) -> Result<()> {
        match result {
            Ok(bytes) => {
                self.last_error = None;
                self.last_message = Some(bytes);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, category = ?e.category(), "Send failed");
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Checks preconditions, then assembles and signs the message.
    fn prepare(&self, message: &Message) -> Result<AssembledMessage> {
        if message.from().is_none() {
            return Err(Error::Validation(
                "You must provide a valid From address".to_string(),
            ));
        }
        if message.recipients().is_empty() {
            return Err(Error::Validation(
                "You must provide at least one recipient email address".to_string(),
            ));
        }
        if message.body().is_empty() && !self.config.allow_empty {
            return Err(Error::Validation("Message body empty".to_string()));
        }
        if let Some(address) = message.confirm_reading_to() {
            canonicalize(address)?;
        }
        for attachment in message.attachments() {
            if let ContentSource::Path(path) = attachment.source() {
                let path = path.to_string_lossy();
                if !file_is_accessible(message.files(), &path) {
                    return Err(mailforge_mime::Error::FileAccess(path.into_owned()).into());
                }
            }
        }

        let message = match &self.config.x_mailer {
            Some(x_mailer) => {
                let mut message = message.clone();
                message.set_x_mailer(Some(x_mailer.clone()).filter(|x| !x.is_empty()));
                Cow::Owned(message)
            }
            None => Cow::Borrowed(message),
        };
        let options = AssembleOptions {
            include_bcc: self.config.transport != Transport::Smtp,
        };
        let mut assembled = assemble_with(&message, options)?;

        if let Some(material) = &self.config.signing {
            let signer = self.signer.as_ref().ok_or_else(|| {
                Error::Signing("Signing material is configured but no signer is set".to_string())
            })?;
            let signed = signer.sign(&assembled.entity_bytes(), material)?;
            assembled.replace_entity(&signed)?;
        }
        Ok(assembled)
    }
}

async fn deliver_smtp<D: Connector>(
    config: &MailerConfig,
    session: &mut SmtpSession<D>,
    message: &Message,
    assembled: &AssembledMessage,
) -> Result<()> {
    let envelope = Envelope::new(
        message.envelope_sender().unwrap_or_default(),
        message.recipients().envelope().map(Address::mailbox),
    )?
    .with_notify(config.dsn);

    let reply = session.send(&envelope, &assembled.to_bytes()).await?;
    tracing::info!(
        message_id = assembled.message_id(),
        recipients = envelope.recipients().len(),
        reply = %reply,
        "Message delivered"
    );
    Ok(())
}
