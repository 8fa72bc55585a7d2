//! Connectors: how an endpoint opens a byte stream to its node.
//!
//! Every RPC opens its own stream, so one endpoint can serve many concurrent
//! calls. Framing and size limits live above this layer, in
//! `ledgerlink_core::frame`, and work the same over any connector.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use ledgerlink_core::config::ConfigError;
use ledgerlink_core::crypto::{load_certificates, load_private_key};

/// Connect attempts are abandoned after this long.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// A bidirectional byte stream to a node.
pub trait RpcStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> RpcStream for T {}

/// Opens fresh streams to one remote node.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self) -> io::Result<Box<dyn RpcStream>>;

    /// Short description for logs.
    fn describe(&self) -> String;
}

/// Plain TCP, for `grpc://` addresses.
pub struct TcpConnector {
    host: String,
    port: u16,
}

impl TcpConnector {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self) -> io::Result<Box<dyn RpcStream>> {
        let stream = tcp_connect(&self.host, self.port).await?;
        Ok(Box::new(stream))
    }

    fn describe(&self) -> String {
        format!("tcp {}:{}", self.host, self.port)
    }
}

/// Mutual TLS, for `grpcs://` addresses.
pub struct TlsConnector {
    host: String,
    port: u16,
    server_name: ServerName<'static>,
    tls: tokio_rustls::TlsConnector,
}

impl TlsConnector {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        server_name: ServerName<'static>,
        config: Arc<rustls::ClientConfig>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            server_name,
            tls: tokio_rustls::TlsConnector::from(config),
        }
    }
}

#[async_trait]
impl Connector for TlsConnector {
    async fn connect(&self) -> io::Result<Box<dyn RpcStream>> {
        let tcp = tcp_connect(&self.host, self.port).await?;
        let tls = tokio::time::timeout(
            CONNECT_TIMEOUT,
            self.tls.connect(self.server_name.clone(), tcp),
        )
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "TLS handshake timed out"))??;
        Ok(Box::new(tls))
    }

    fn describe(&self) -> String {
        format!("tls {}:{} ({:?})", self.host, self.port, self.server_name)
    }
}

async fn tcp_connect(host: &str, port: u16) -> io::Result<TcpStream> {
    let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect((host, port)))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))??;
    stream.set_nodelay(true)?;
    Ok(stream)
}

/// Build a mutual-TLS client config from a trust root and a client identity.
pub fn client_tls_config(
    trust_root_pem: &[u8],
    certificate_pem: &[u8],
    private_key_pem: &[u8],
) -> Result<Arc<rustls::ClientConfig>, ConfigError> {
    let pem_err = |e: ledgerlink_core::crypto::CryptoError| ConfigError::InvalidPem(e.to_string());

    let mut roots = rustls::RootCertStore::empty();
    for cert in load_certificates(trust_root_pem).map_err(pem_err)? {
        roots
            .add(cert)
            .map_err(|e| ConfigError::InvalidPem(format!("trust root: {e}")))?;
    }
    let chain = load_certificates(certificate_pem).map_err(pem_err)?;
    let key = load_private_key(private_key_pem).map_err(pem_err)?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| ConfigError::Tls(e.to_string()))?
        .with_root_certificates(roots)
        .with_client_auth_cert(chain, key)
        .map_err(|e| ConfigError::Tls(e.to_string()))?;
    Ok(Arc::new(config))
}
