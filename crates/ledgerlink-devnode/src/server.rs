//! RPC listener: one request frame and one response frame per connection,
//! over mutual TLS or plain TCP.

use std::sync::Arc;
use std::time::Duration;

use rustls::server::WebPkiClientVerifier;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_rustls::TlsAcceptor;

use ledgerlink_core::config::ConfigError;
use ledgerlink_core::crypto::{load_certificates, load_private_key};
use ledgerlink_core::frame::{discard_frame_body, read_frame_body, read_frame_len, write_frame};
use ledgerlink_core::limits::SizeLimit;
use ledgerlink_core::wire::{self, Response};
use ledgerlink_core::TransportError;

use crate::ledger::Ledger;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Serve a single RPC on `stream`.
///
/// A request over `receive_limit` is drained and answered with an `Error`
/// frame carrying the receive-overflow text.
pub async fn serve_connection<S>(
    mut stream: S,
    ledger: Arc<Ledger>,
    receive_limit: SizeLimit,
) -> Result<(), TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let len = read_frame_len(&mut stream).await?;
    let response = if receive_limit.allows(len) {
        let body = read_frame_body(&mut stream, len).await?;
        ledger.handle(&body)
    } else {
        discard_frame_body(&mut stream, len).await?;
        let err = TransportError::receive_limit(len, receive_limit);
        tracing::warn!(len, limit = %receive_limit, "request over receive limit");
        Response::Error {
            message: err.detail,
        }
    };

    let bytes = wire::encode(&response).map_err(|e| TransportError::other(e.to_string()))?;
    write_frame(&mut stream, &bytes, SizeLimit::Unlimited).await?;
    let _ = stream.shutdown().await;
    Ok(())
}

/// Mutual-TLS server config: clients must present a certificate issued by
/// the CA in `client_ca_pem`.
pub fn server_tls_config(
    client_ca_pem: &[u8],
    certificate_pem: &[u8],
    private_key_pem: &[u8],
) -> Result<Arc<rustls::ServerConfig>, ConfigError> {
    let pem_err = |e: ledgerlink_core::crypto::CryptoError| ConfigError::InvalidPem(e.to_string());

    let mut roots = rustls::RootCertStore::empty();
    for cert in load_certificates(client_ca_pem).map_err(pem_err)? {
        roots
            .add(cert)
            .map_err(|e| ConfigError::InvalidPem(format!("client CA: {e}")))?;
    }
    let chain = load_certificates(certificate_pem).map_err(pem_err)?;
    let key = load_private_key(private_key_pem).map_err(pem_err)?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider.clone())
        .build()
        .map_err(|e| ConfigError::Tls(e.to_string()))?;
    let config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| ConfigError::Tls(e.to_string()))?
        .with_client_cert_verifier(verifier)
        .with_single_cert(chain, key)
        .map_err(|e| ConfigError::Tls(e.to_string()))?;
    Ok(Arc::new(config))
}

/// Accept connections until `shutdown` fires. `tls: None` serves plain TCP.
pub async fn serve_rpc(
    listener: TcpListener,
    tls: Option<TlsAcceptor>,
    ledger: Arc<Ledger>,
    receive_limit: SizeLimit,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("rpc listener shutting down");
                return;
            }

            accepted = listener.accept() => {
                let (tcp, peer) = match accepted {
                    Ok(a) => a,
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                        continue;
                    }
                };
                let _ = tcp.set_nodelay(true);
                let ledger = ledger.clone();
                let tls = tls.clone();
                tokio::spawn(async move {
                    let result = match tls {
                        Some(acceptor) => {
                            match tokio::time::timeout(HANDSHAKE_TIMEOUT, acceptor.accept(tcp)).await {
                                Ok(Ok(stream)) => serve_connection(stream, ledger, receive_limit).await,
                                Ok(Err(e)) => Err(TransportError::io("TLS handshake", e)),
                                Err(_) => Err(TransportError::other("TLS handshake timed out")),
                            }
                        }
                        None => serve_connection(tcp, ledger, receive_limit).await,
                    };
                    if let Err(e) = result {
                        tracing::debug!(%peer, error = %e, "connection ended with error");
                    }
                });
            }
        }
    }
}
