use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

use crate::config::{ConnectionConfig, Security};
use crate::{ImapError, tls};

/// The network transport of a session: plain TCP or TLS over TCP.
pub enum MailStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl MailStream {
    /// Opens TCP and, for [`Security::Tls`], completes the TLS handshake.
    /// STARTTLS sessions start out plain; see [`MailStream::upgrade`].
    pub async fn open(config: &ConnectionConfig) -> Result<Self, ImapError> {
        let addr = config.addr();
        let sock = TcpStream::connect(&addr)
            .await
            .map_err(|e| ImapError::Connection(format!("TCP connect to {} failed: {}", addr, e)))?;

        match config.security() {
            Security::Tls => Self::Plain(sock).upgrade(config).await,
            Security::StartTls | Security::Plain => Ok(Self::Plain(sock)),
        }
    }

    pub async fn upgrade(self, config: &ConnectionConfig) -> Result<Self, ImapError> {
        match self {
            Self::Plain(sock) => {
                let server_name = tls::parse_server_name(config.server_name())?;
                let connector = TlsConnector::from(tls::create_tls_config());
                let stream = connector
                    .connect(server_name, sock)
                    .await
                    .map_err(|e| ImapError::Connection(format!("TLS handshake failed: {}", e)))?;
                tracing::debug!(server_name = config.server_name(), "TLS established");
                Ok(Self::Tls(Box::new(stream)))
            }
            Self::Tls(_) => Err(ImapError::Connection("Stream is already TLS".to_string())),
        }
    }

    pub fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

impl AsyncRead for MailStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for MailStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}
