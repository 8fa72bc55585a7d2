//! Endpoint factory: turns a URL, trust root, identity and options into an
//! authenticated endpoint handle with fixed size limits.
//!
//! Limits are resolved once, in `EndpointFactory::create_endpoint`, from the
//! factory's `LimitSettings` snapshot. A new factory snapshot only affects
//! endpoints created from it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rustls::pki_types::ServerName;
use tokio::io::AsyncWriteExt;

use ledgerlink_core::config::ConfigError;
use ledgerlink_core::frame::{check_outbound, read_frame, write_frame};
use ledgerlink_core::limits::{self, LimitSettings, ResolvedLimits};
use ledgerlink_core::wire::{self, Response};
use ledgerlink_core::{Identity, TransportError};

use crate::transport::{client_tls_config, Connector, TcpConnector, TlsConnector};

// ── Addresses ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// `grpc://`, plain TCP
    Grpc,
    /// `grpcs://`, mutual TLS
    Grpcs,
}

/// A parsed `grpc[s]://host:port` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointAddress {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
}

impl EndpointAddress {
    pub fn parse(url: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidAddress(url.to_string(), reason.to_string());

        let (scheme, rest) = url
            .split_once("://")
            .ok_or_else(|| invalid("missing scheme"))?;
        let scheme = match scheme {
            "grpc" => Scheme::Grpc,
            "grpcs" => Scheme::Grpcs,
            _ => return Err(invalid("scheme must be grpc or grpcs")),
        };
        let authority = rest.strip_suffix('/').unwrap_or(rest);
        if authority.contains('/') || authority.contains('?') || authority.contains('#') {
            return Err(invalid("unexpected path"));
        }

        let (host, port) = if let Some(bracketed) = authority.strip_prefix('[') {
            let (host, after) = bracketed
                .split_once(']')
                .ok_or_else(|| invalid("unterminated IPv6 literal"))?;
            let port = after
                .strip_prefix(':')
                .ok_or_else(|| invalid("missing port"))?;
            (host, port)
        } else {
            let (host, port) = authority
                .rsplit_once(':')
                .ok_or_else(|| invalid("missing port"))?;
            if host.contains(':') {
                return Err(invalid("IPv6 hosts must be bracketed"));
            }
            (host, port)
        };

        if host.is_empty() {
            return Err(invalid("missing host"));
        }
        let port: u16 = port.parse().map_err(|_| invalid("invalid port"))?;
        if port == 0 {
            return Err(invalid("invalid port"));
        }

        Ok(Self {
            scheme,
            host: host.to_string(),
            port,
        })
    }

    pub fn is_tls(&self) -> bool {
        self.scheme == Scheme::Grpcs
    }
}

impl std::fmt::Display for EndpointAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scheme = match self.scheme {
            Scheme::Grpc => "grpc",
            Scheme::Grpcs => "grpcs",
        };
        if self.host.contains(':') {
            write!(f, "{scheme}://[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{scheme}://{}:{}", self.host, self.port)
        }
    }
}

// ── Options ───────────────────────────────────────────────────────────────────

pub const TRUST_ROOT_PEM: &str = "trustRootPem";
pub const CLIENT_CERTIFICATE: &str = "clientCertificate";
pub const CLIENT_PRIVATE_KEY: &str = "clientPrivateKey";
pub const HOSTNAME_OVERRIDE: &str = "hostnameOverride";
pub const SEND_LIMIT_OVERRIDE: &str = "sendLimitOverride";
pub const RECEIVE_LIMIT_OVERRIDE: &str = "receiveLimitOverride";

/// Named transport options for one endpoint.
///
/// PEM options replace the matching `create_endpoint` argument. The limit
/// overrides beat every policy tier.
#[derive(Clone, Default)]
pub struct EndpointOptions {
    trust_root_pem: Option<Vec<u8>>,
    client_certificate: Option<Vec<u8>>,
    client_private_key: Option<Vec<u8>>,
    hostname_override: Option<String>,
    send_limit_override: Option<i64>,
    receive_limit_override: Option<i64>,
}

impl EndpointOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trust_root_pem(mut self, pem: impl Into<Vec<u8>>) -> Self {
        self.trust_root_pem = Some(pem.into());
        self
    }

    pub fn client_certificate(mut self, pem: impl Into<Vec<u8>>) -> Self {
        self.client_certificate = Some(pem.into());
        self
    }

    pub fn client_private_key(mut self, pem: impl Into<Vec<u8>>) -> Self {
        self.client_private_key = Some(pem.into());
        self
    }

    pub fn hostname_override(mut self, name: impl Into<String>) -> Self {
        self.hostname_override = Some(name.into());
        self
    }

    pub fn send_limit_override(mut self, value: i64) -> Self {
        self.send_limit_override = Some(value);
        self
    }

    pub fn receive_limit_override(mut self, value: i64) -> Self {
        self.receive_limit_override = Some(value);
        self
    }

    /// Set an option by its transport name.
    pub fn set(self, name: &str, value: &str) -> Result<Self, ConfigError> {
        let limit = |value: &str| -> Result<i64, ConfigError> {
            let parsed: i64 = value.trim().parse().map_err(|_| ConfigError::InvalidOption {
                option: name.to_string(),
                reason: format!("not an integer: {value:?}"),
            })?;
            limits::validate(name, parsed)?;
            Ok(parsed)
        };
        Ok(match name {
            TRUST_ROOT_PEM => self.trust_root_pem(value),
            CLIENT_CERTIFICATE => self.client_certificate(value),
            CLIENT_PRIVATE_KEY => self.client_private_key(value),
            HOSTNAME_OVERRIDE => {
                if value.is_empty() {
                    return Err(ConfigError::InvalidOption {
                        option: name.to_string(),
                        reason: "empty hostname".to_string(),
                    });
                }
                self.hostname_override(value)
            }
            SEND_LIMIT_OVERRIDE => self.send_limit_override(limit(value)?),
            RECEIVE_LIMIT_OVERRIDE => self.receive_limit_override(limit(value)?),
            other => {
                return Err(ConfigError::InvalidOption {
                    option: other.to_string(),
                    reason: "unknown option".to_string(),
                })
            }
        })
    }

    pub fn get_hostname_override(&self) -> Option<&str> {
        self.hostname_override.as_deref()
    }

    pub fn get_send_limit_override(&self) -> Option<i64> {
        self.send_limit_override
    }

    pub fn get_receive_limit_override(&self) -> Option<i64> {
        self.receive_limit_override
    }
}

impl std::fmt::Debug for EndpointOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointOptions")
            .field("trust_root_pem", &self.trust_root_pem.as_ref().map(Vec::len))
            .field("client_certificate", &self.client_certificate.as_ref().map(Vec::len))
            .field(
                "client_private_key",
                &self.client_private_key.as_ref().map(|_| "<redacted>"),
            )
            .field("hostname_override", &self.hostname_override)
            .field("send_limit_override", &self.send_limit_override)
            .field("receive_limit_override", &self.receive_limit_override)
            .finish()
    }
}

// ── Endpoint ──────────────────────────────────────────────────────────────────

static NEXT_ENDPOINT_ID: AtomicU64 = AtomicU64::new(1);

/// An addressable, authenticated handle to one peer or orderer.
///
/// Limits are fixed for the endpoint's lifetime. Each call opens its own
/// connection, so one endpoint may be used from many tasks at once.
pub struct Endpoint {
    id: u64,
    address: EndpointAddress,
    trust_root: Vec<u8>,
    identity: Arc<Identity>,
    options: EndpointOptions,
    limits: ResolvedLimits,
    connector: Box<dyn Connector>,
}

impl Endpoint {
    /// Process-unique; two handles are the same endpoint iff ids match.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn address(&self) -> &EndpointAddress {
        &self.address
    }

    pub fn trust_root(&self) -> &[u8] {
        &self.trust_root
    }

    pub fn identity(&self) -> &Arc<Identity> {
        &self.identity
    }

    pub fn options(&self) -> &EndpointOptions {
        &self.options
    }

    pub fn limits(&self) -> ResolvedLimits {
        self.limits
    }

    /// One raw RPC: send `body` as a frame, return the reply frame body.
    pub async fn call(&self, body: &[u8]) -> Result<Vec<u8>, TransportError> {
        check_outbound(body.len(), self.limits.send)?;

        let mut stream = self
            .connector
            .connect()
            .await
            .map_err(|e| TransportError::io(&format!("connect {}", self.address), e))?;
        write_frame(&mut stream, body, self.limits.send).await?;
        let reply = read_frame(&mut stream, self.limits.receive).await?;
        let _ = stream.shutdown().await;

        tracing::debug!(
            endpoint = %self.address,
            sent = body.len(),
            received = reply.len(),
            "rpc complete"
        );
        Ok(reply)
    }

    /// Send an encoded `SignedEnvelope` and decode the node's answer.
    ///
    /// An `Error` frame from the node becomes a classified `TransportError`.
    pub async fn rpc(&self, envelope: &[u8]) -> Result<Response, TransportError> {
        let reply = self.call(envelope).await?;
        match wire::decode::<Response>(&reply) {
            Ok(Response::Error { message }) => Err(TransportError::from_message(message)),
            Ok(response) => Ok(response),
            Err(e) => Err(TransportError::other(format!(
                "malformed response from {}: {e}",
                self.address
            ))),
        }
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("id", &self.id)
            .field("address", &self.address.to_string())
            .field("limits", &self.limits)
            .field("connector", &self.connector.describe())
            .finish()
    }
}

// ── Factory ───────────────────────────────────────────────────────────────────

/// Builds endpoints against one immutable limit snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct EndpointFactory {
    limits: LimitSettings,
}

impl EndpointFactory {
    pub fn new(limits: LimitSettings) -> Self {
        Self { limits }
    }

    /// A new factory with different settings. Endpoints made by `self` keep
    /// the limits they were built with.
    pub fn with_limits(&self, limits: LimitSettings) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &LimitSettings {
        &self.limits
    }

    /// Build an endpoint with a TLS or TCP connector chosen by URL scheme.
    pub fn create_endpoint(
        &self,
        address: &str,
        trust_root: &[u8],
        identity: Arc<Identity>,
        options: EndpointOptions,
    ) -> Result<Endpoint, ConfigError> {
        let parsed = EndpointAddress::parse(address)?;
        let trust_root = options
            .trust_root_pem
            .clone()
            .unwrap_or_else(|| trust_root.to_vec());

        let connector: Box<dyn Connector> = if parsed.is_tls() {
            let certificate = options
                .client_certificate
                .as_deref()
                .unwrap_or(identity.certificate());
            let private_key = options
                .client_private_key
                .as_deref()
                .unwrap_or(identity.private_key());
            let tls = client_tls_config(&trust_root, certificate, private_key)?;

            let name = options
                .hostname_override
                .clone()
                .unwrap_or_else(|| parsed.host.clone());
            let server_name =
                ServerName::try_from(name.clone()).map_err(|e| ConfigError::InvalidOption {
                    option: HOSTNAME_OVERRIDE.to_string(),
                    reason: format!("{name:?}: {e}"),
                })?;
            Box::new(TlsConnector::new(
                parsed.host.clone(),
                parsed.port,
                server_name,
                tls,
            ))
        } else {
            Box::new(TcpConnector::new(parsed.host.clone(), parsed.port))
        };

        self.assemble(parsed, trust_root, identity, options, connector)
    }

    /// Build an endpoint around a caller-supplied connector.
    pub fn create_endpoint_with(
        &self,
        address: &str,
        identity: Arc<Identity>,
        options: EndpointOptions,
        connector: Box<dyn Connector>,
    ) -> Result<Endpoint, ConfigError> {
        let parsed = EndpointAddress::parse(address)?;
        let trust_root = options.trust_root_pem.clone().unwrap_or_default();
        self.assemble(parsed, trust_root, identity, options, connector)
    }

    fn assemble(
        &self,
        address: EndpointAddress,
        trust_root: Vec<u8>,
        identity: Arc<Identity>,
        options: EndpointOptions,
        connector: Box<dyn Connector>,
    ) -> Result<Endpoint, ConfigError> {
        if let Some(v) = options.send_limit_override {
            limits::validate(SEND_LIMIT_OVERRIDE, v)?;
        }
        if let Some(v) = options.receive_limit_override {
            limits::validate(RECEIVE_LIMIT_OVERRIDE, v)?;
        }
        let resolved = self
            .limits
            .resolve(options.send_limit_override, options.receive_limit_override);

        let endpoint = Endpoint {
            id: NEXT_ENDPOINT_ID.fetch_add(1, Ordering::Relaxed),
            address,
            trust_root,
            identity,
            options,
            limits: resolved,
            connector,
        };
        tracing::debug!(
            id = endpoint.id,
            endpoint = %endpoint.address,
            send_limit = %resolved.send,
            receive_limit = %resolved.receive,
            "endpoint created"
        );
        Ok(endpoint)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
