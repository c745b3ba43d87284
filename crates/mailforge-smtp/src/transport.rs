//! Byte transport beneath the SMTP session.
//!
//! [`Connector`] opens a [`Connection`]; the session only ever writes
//! whole commands and reads whole lines. [`TcpConnector`] is the network
//! implementation, tests substitute scripted ones.

use std::future::Future;
use std::io;
use std::sync::Arc;

use rustls::pki_types::ServerName;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};

use crate::error::{Error, Result};

/// Options passed to [`Connector::open`].
#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    /// Negotiate TLS immediately after the TCP handshake.
    pub implicit_tls: bool,
}

/// An open, line-oriented connection to a server.
pub trait Connection: Send {
    /// Writes and flushes all bytes.
    fn write_all(&mut self, data: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Reads one line without its line terminator.
    ///
    /// End of stream is an error, never an empty line.
    fn read_line(&mut self) -> impl Future<Output = Result<String>> + Send;

    /// Performs a TLS handshake over the existing connection.
    fn upgrade_tls(&mut self, server_name: &str) -> impl Future<Output = Result<()>> + Send;

    /// Shuts the connection down.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Returns true once the connection is encrypted.
    fn is_tls(&self) -> bool;
}

/// Opens connections to SMTP servers.
pub trait Connector: Send + Sync {
    /// Connection type produced by this connector.
    type Connection: Connection;

    /// Connects to `host:port`.
    fn open(
        &self,
        host: &str,
        port: u16,
        options: &ConnectOptions,
    ) -> impl Future<Output = Result<Self::Connection>> + Send;
}

/// Connector for TCP with rustls.
#[derive(Clone)]
pub struct TcpConnector {
    tls: Arc<ClientConfig>,
}

impl TcpConnector {
    /// Creates a connector that trusts the webpki root certificates.
    #[must_use]
    pub fn new() -> Self {
        let root_store = RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };
        let config = ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();
        Self::with_tls_config(Arc::new(config))
    }

    /// Creates a connector with a caller supplied TLS configuration.
    #[must_use]
    pub const fn with_tls_config(tls: Arc<ClientConfig>) -> Self {
        Self { tls }
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TcpConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpConnector").finish_non_exhaustive()
    }
}

impl Connector for TcpConnector {
    type Connection = TcpConnection;

    async fn open(&self, host: &str, port: u16, options: &ConnectOptions) -> Result<TcpConnection> {
        let tcp = TcpStream::connect((host, port)).await?;
        let mut connection = TcpConnection {
            stream: Stream::Tcp(BufReader::new(tcp)),
            tls: Arc::clone(&self.tls),
        };
        if options.implicit_tls {
            connection.upgrade_tls(host).await?;
        }
        Ok(connection)
    }
}

enum Stream {
    Tcp(BufReader<TcpStream>),
    Tls(Box<BufReader<TlsStream<TcpStream>>>),
    Closed,
}

/// A TCP connection, optionally upgraded to TLS.
pub struct TcpConnection {
    stream: Stream,
    tls: Arc<ClientConfig>,
}

impl std::fmt::Debug for TcpConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpConnection")
            .field("tls", &self.is_tls())
            .finish_non_exhaustive()
    }
}

fn closed() -> Error {
    Error::Io(io::Error::new(
        io::ErrorKind::NotConnected,
        "connection is closed",
    ))
}

impl Connection for TcpConnection {
    async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        match &mut self.stream {
            Stream::Tcp(reader) => {
                reader.get_mut().write_all(data).await?;
                reader.get_mut().flush().await?;
            }
            Stream::Tls(reader) => {
                reader.get_mut().write_all(data).await?;
                reader.get_mut().flush().await?;
            }
            Stream::Closed => return Err(closed()),
        }
        Ok(())
    }

    async fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let read = match &mut self.stream {
            Stream::Tcp(reader) => reader.read_line(&mut line).await?,
            Stream::Tls(reader) => reader.read_line(&mut line).await?,
            Stream::Closed => return Err(closed()),
        };
        if read == 0 {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed by server",
            )));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    async fn upgrade_tls(&mut self, server_name: &str) -> Result<()> {
        let tcp = match std::mem::replace(&mut self.stream, Stream::Closed) {
            Stream::Tcp(reader) => reader.into_inner(),
            other => {
                self.stream = other;
                return Err(Error::Protocol("Connection is not plain TCP".into()));
            }
        };

        let name = ServerName::try_from(server_name.to_string())
            .map_err(|_| Error::Protocol(format!("Invalid TLS server name: {server_name}")))?;
        let tls = TlsConnector::from(Arc::clone(&self.tls))
            .connect(name, tcp)
            .await?;
        self.stream = Stream::Tls(Box::new(BufReader::new(tls)));
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.stream, Stream::Closed) {
            Stream::Tcp(mut reader) => reader.get_mut().shutdown().await?,
            Stream::Tls(mut reader) => reader.get_mut().shutdown().await?,
            Stream::Closed => {}
        }
        Ok(())
    }

    fn is_tls(&self) -> bool {
        matches!(self.stream, Stream::Tls(_))
    }
}
