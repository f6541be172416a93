//! Outbound connections to cluster nodes.
//!
//! [`Dialer`] resolves a [`DialTarget`], connects with TCP keepalive and
//! `TCP_NODELAY`, and optionally completes a TLS handshake, all inside the
//! connect timeout. The result is a [`Transport`] that hides which of the two
//! stream types is underneath.

mod tls;

pub use tls::build_connector;

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{lookup_host, TcpSocket, TcpStream};
use tokio_rustls::TlsConnector;
use tracing::trace;

use crate::config::DialTarget;
use crate::error::{ConfigError, ConnectionError};

/// A connected stream, plain or TLS.
pub enum Transport {
    Tcp(TcpStream),
    Tls(Box<tokio_rustls::client::TlsStream<TcpStream>>),
}

impl Transport {
    pub fn is_tls(&self) -> bool {
        matches!(self, Transport::Tls(_))
    }
}

impl AsyncRead for Transport {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Tcp(stream) => Pin::new(stream).poll_read(cx, buf),
            Transport::Tls(stream) => Pin::new(stream.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Transport {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Transport::Tcp(stream) => Pin::new(stream).poll_write(cx, buf),
            Transport::Tls(stream) => Pin::new(stream.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Tcp(stream) => Pin::new(stream).poll_flush(cx),
            Transport::Tls(stream) => Pin::new(stream.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Tcp(stream) => Pin::new(stream).poll_shutdown(cx),
            Transport::Tls(stream) => Pin::new(stream.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Opens transports. Built once and shared by every worker.
#[derive(Clone)]
pub struct Dialer {
    tls: TlsConnector,
}

impl Dialer {
    /// `verify_certificates` selects webpki root verification; without it any
    /// server certificate is accepted.
    pub fn new(verify_certificates: bool) -> Result<Self, ConfigError> {
        let tls = build_connector(verify_certificates).map_err(|e| ConfigError::InvalidValue {
            field: "target.tls_verify",
            reason: e.to_string(),
        })?;
        Ok(Self { tls })
    }

    /// Connect to `target`, bounded as a whole by `timeout`.
    pub async fn dial(
        &self,
        target: &DialTarget,
        timeout: Duration,
    ) -> Result<Transport, ConnectionError> {
        match tokio::time::timeout(timeout, self.dial_unbounded(target)).await {
            Ok(result) => result,
            Err(_) => Err(ConnectionError::ConnectTimeout {
                addr: target.address.clone(),
                timeout,
            }),
        }
    }

    async fn dial_unbounded(&self, target: &DialTarget) -> Result<Transport, ConnectionError> {
        let stream = connect_tcp(&target.address)
            .await
            .map_err(|source| ConnectionError::Dial {
                addr: target.address.clone(),
                source,
            })?;

        if !target.use_tls {
            return Ok(Transport::Tcp(stream));
        }

        let server_name =
            ServerName::try_from(target.host().to_string()).map_err(|e| ConnectionError::Tls {
                addr: target.address.clone(),
                reason: e.to_string(),
            })?;
        let stream = self
            .tls
            .connect(server_name, stream)
            .await
            .map_err(|e| ConnectionError::Tls {
                addr: target.address.clone(),
                reason: e.to_string(),
            })?;
        trace!(addr = %target.address, "TLS handshake complete");
        Ok(Transport::Tls(Box::new(stream)))
    }
}

/// Try every resolved address in turn, returning the first connection.
async fn connect_tcp(addr: &str) -> io::Result<TcpStream> {
    let mut last_err = None;
    for sock_addr in lookup_host(addr).await? {
        let socket = if sock_addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_keepalive(true)?;
        match socket.connect(sock_addr).await {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, format!("{addr} resolved to no addresses"))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn dials_plain_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let dialer = Dialer::new(false).unwrap();

        let transport = dialer
            .dial(&DialTarget::new(addr, false), Duration::from_secs(1))
            .await
            .unwrap();
        assert!(!transport.is_tls());
    }

    #[tokio::test]
    async fn refused_dial_reports_address() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = Dialer::new(false)
            .unwrap()
            .dial(&DialTarget::new(addr.clone(), false), Duration::from_secs(1))
            .await
            .err()
            .unwrap();
        match err {
            ConnectionError::Dial { addr: reported, .. } => assert_eq!(reported, addr),
            other => panic!("expected dial error, got {other}"),
        }
    }

    #[tokio::test]
    async fn tls_against_plain_server_fails_cleanly() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            // Accept and immediately hang up so the handshake sees EOF.
            if let Ok((stream, _)) = listener.accept().await {
                drop(stream);
            }
        });

        let result = Dialer::new(false)
            .unwrap()
            .dial(&DialTarget::new(addr, true), Duration::from_secs(1))
            .await;
        assert!(matches!(result, Err(ConnectionError::Tls { .. })));
    }
}
