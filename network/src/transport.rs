//! Dialing and accepting peer streams, plain TCP or TLS.

use std::sync::Arc;
use std::time::Duration;

use meshchat_crypto::TlsMaterial;
use meshchat_types::Node;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::{TlsAcceptor, TlsConnector};

use crate::NetworkError;

/// Timeout for the initial connection attempt, TLS handshake included.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Anything a peer connection can be: TCP, TLS over TCP, or an in-memory pipe.
pub trait PeerIo: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> PeerIo for T {}

pub type PeerStream = Box<dyn PeerIo>;

#[derive(Clone)]
struct TlsLayer {
    acceptor: TlsAcceptor,
    connector: TlsConnector,
}

/// Opens and accepts peer streams.
#[derive(Clone)]
pub struct Transport {
    tls: Option<TlsLayer>,
    connect_timeout: Duration,
}

impl Transport {
    /// Plain TCP transport.
    pub fn plain(connect_timeout: Duration) -> Self {
        Self {
            tls: None,
            connect_timeout,
        }
    }

    /// TLS transport presenting `material` on both sides.
    pub fn with_tls(material: &TlsMaterial, connect_timeout: Duration) -> Result<Self, NetworkError> {
        let server = material
            .server_config()
            .map_err(|e| NetworkError::Tls(e.to_string()))?;
        let client = material
            .client_config()
            .map_err(|e| NetworkError::Tls(e.to_string()))?;
        Ok(Self {
            tls: Some(TlsLayer {
                acceptor: TlsAcceptor::from(Arc::new(server)),
                connector: TlsConnector::from(Arc::new(client)),
            }),
            connect_timeout,
        })
    }

    pub fn is_tls(&self) -> bool {
        self.tls.is_some()
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Dial `node`, bounded by the configured connect timeout.
    pub async fn connect(&self, node: &Node) -> Result<PeerStream, NetworkError> {
        self.connect_within(node, self.connect_timeout).await
    }

    /// Dial `node`; `limit` covers TCP connect and the TLS handshake.
    pub async fn connect_within(&self, node: &Node, limit: Duration) -> Result<PeerStream, NetworkError> {
        let address = node.address();
        match tokio::time::timeout(limit, self.dial(&address, &node.hostname)).await {
            Ok(result) => result,
            Err(_) => Err(NetworkError::ConnectionFailed {
                address,
                reason: format!("timed out after {limit:?}"),
            }),
        }
    }

    async fn dial(&self, address: &str, hostname: &str) -> Result<PeerStream, NetworkError> {
        let tcp = TcpStream::connect(address)
            .await
            .map_err(|e| NetworkError::ConnectionFailed {
                address: address.to_string(),
                reason: e.to_string(),
            })?;
        if let Err(e) = tcp.set_nodelay(true) {
            tracing::trace!(address, error = %e, "set_nodelay failed");
        }
        let Some(tls) = &self.tls else {
            return Ok(Box::new(tcp));
        };
        let stream = tls
            .connector
            .connect(server_name(hostname)?, tcp)
            .await
            .map_err(|e| NetworkError::Tls(format!("handshake with {address}: {e}")))?;
        Ok(Box::new(stream))
    }

    /// Wrap an accepted TCP stream, running the server handshake if TLS is on.
    pub async fn accept(&self, tcp: TcpStream) -> Result<PeerStream, NetworkError> {
        let Some(tls) = &self.tls else {
            return Ok(Box::new(tcp));
        };
        let stream = tokio::time::timeout(self.connect_timeout, tls.acceptor.accept(tcp))
            .await
            .map_err(|_| NetworkError::Tls("handshake timed out".into()))?
            .map_err(|e| NetworkError::Tls(e.to_string()))?;
        Ok(Box::new(stream))
    }
}

/// SNI name for `hostname`. Bracketed IPv6 literals are unwrapped; names
/// rustls cannot represent fall back to `localhost` (certificates are not
/// checked against names anyway).
fn server_name(hostname: &str) -> Result<ServerName<'static>, NetworkError> {
    let host = hostname.trim().trim_start_matches('[').trim_end_matches(']');
    ServerName::try_from(host.to_string())
        .or_else(|_| ServerName::try_from("localhost".to_string()))
        .map_err(|e| NetworkError::Tls(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshchat_messages::{Envelope, MessageType};
    use meshchat_protocol::{read_envelope, write_envelope};
    use tokio::net::TcpListener;

    async fn listener() -> (TcpListener, Node) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, Node::new("127.0.0.1", port.to_string(), "peer"))
    }

    async fn exchange(transport: Transport) {
        let (listener, node) = listener().await;
        let server = transport.clone();
        let accepted = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut stream = server.accept(tcp).await.unwrap();
            read_envelope(&mut stream).await.unwrap()
        });

        let mut stream = transport.connect(&node).await.unwrap();
        let env = Envelope::new(MessageType::Chat, &node, "over the wire");
        write_envelope(&mut stream, &env).await.unwrap();

        assert_eq!(accepted.await.unwrap(), Some(env));
    }

    #[tokio::test]
    async fn plain_connect_and_accept() {
        exchange(Transport::plain(DEFAULT_CONNECT_TIMEOUT)).await;
    }

    #[tokio::test]
    async fn tls_connect_and_accept() {
        let dir = tempfile::tempdir().unwrap();
        let material = TlsMaterial::load_or_generate(dir.path(), "127.0.0.1").unwrap();
        let transport = Transport::with_tls(&material, DEFAULT_CONNECT_TIMEOUT).unwrap();
        assert!(transport.is_tls());
        exchange(transport).await;
    }

    #[tokio::test]
    async fn refused_connection_is_reported() {
        let (listener, node) = listener().await;
        drop(listener);
        let err = Transport::plain(DEFAULT_CONNECT_TIMEOUT)
            .connect(&node)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, NetworkError::ConnectionFailed { .. }));
    }

    #[test]
    fn server_name_unwraps_ipv6() {
        assert!(server_name("[::1]").is_ok());
        assert!(server_name("example.org").is_ok());
    }
}
