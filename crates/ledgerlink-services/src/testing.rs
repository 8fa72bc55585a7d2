//! In-memory fixtures for unit tests: a devnode ledger served over duplex
//! pipes, plus connectors that refuse or never answer.

use std::io;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::DuplexStream;

use ledgerlink_core::ca::DevAuthority;
use ledgerlink_core::limits::SizeLimit;
use ledgerlink_core::{Identity, Role};
use ledgerlink_devnode::ledger::Ledger;
use ledgerlink_devnode::server::serve_connection;

use crate::context::ClientContext;
use crate::endpoint::{Endpoint, EndpointFactory, EndpointOptions};
use crate::transport::{Connector, RpcStream};

const PIPE_CAPACITY: usize = 64 * 1024;

/// Serves each connection with `serve_connection` on a spawned task.
pub struct LedgerConnector {
    ledger: Arc<Ledger>,
    receive_limit: SizeLimit,
}

#[async_trait]
impl Connector for LedgerConnector {
    async fn connect(&self) -> io::Result<Box<dyn RpcStream>> {
        let (client, server) = tokio::io::duplex(PIPE_CAPACITY);
        let ledger = self.ledger.clone();
        let limit = self.receive_limit;
        tokio::spawn(async move {
            let _ = serve_connection(server, ledger, limit).await;
        });
        Ok(Box::new(client))
    }

    fn describe(&self) -> String {
        "in-memory ledger".to_string()
    }
}

/// Accepts connections and never replies.
#[derive(Default)]
pub struct StallConnector {
    held: Mutex<Vec<DuplexStream>>,
}

#[async_trait]
impl Connector for StallConnector {
    async fn connect(&self) -> io::Result<Box<dyn RpcStream>> {
        let (client, server) = tokio::io::duplex(PIPE_CAPACITY);
        if let Ok(mut held) = self.held.lock() {
            held.push(server);
        }
        Ok(Box::new(client))
    }

    fn describe(&self) -> String {
        "stalled".to_string()
    }
}

pub struct RefusingConnector;

#[async_trait]
impl Connector for RefusingConnector {
    async fn connect(&self) -> io::Result<Box<dyn RpcStream>> {
        Err(io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"))
    }

    fn describe(&self) -> String {
        "refusing".to_string()
    }
}

/// A ledger with one channel, reachable through in-memory endpoints.
pub struct TestNode {
    pub ledger: Arc<Ledger>,
    receive_limit: SizeLimit,
}

impl TestNode {
    pub fn new(channel: &str) -> Self {
        let ledger = Arc::new(Ledger::new());
        ledger.create_channel(channel);
        Self {
            ledger,
            receive_limit: SizeLimit::Unlimited,
        }
    }

    pub fn with_receive_limit(channel: &str, bytes: usize) -> Self {
        Self {
            receive_limit: SizeLimit::Bytes(bytes),
            ..Self::new(channel)
        }
    }

    pub fn endpoint(&self) -> Arc<Endpoint> {
        self.endpoint_with(EndpointOptions::new())
    }

    pub fn endpoint_with(&self, options: EndpointOptions) -> Arc<Endpoint> {
        self.endpoint_from(&EndpointFactory::default(), options)
    }

    pub fn endpoint_from(&self, factory: &EndpointFactory, options: EndpointOptions) -> Arc<Endpoint> {
        let connector = LedgerConnector {
            ledger: self.ledger.clone(),
            receive_limit: self.receive_limit,
        };
        Arc::new(
            factory
                .create_endpoint_with("grpc://node.test:7051", identity(Role::Tls), options, Box::new(connector))
                .unwrap(),
        )
    }
}

pub fn refusing_endpoint() -> Arc<Endpoint> {
    Arc::new(
        EndpointFactory::default()
            .create_endpoint_with(
                "grpc://refused.test:7051",
                identity(Role::Tls),
                EndpointOptions::new(),
                Box::new(RefusingConnector),
            )
            .unwrap(),
    )
}

pub fn stalled_endpoint() -> Arc<Endpoint> {
    Arc::new(
        EndpointFactory::default()
            .create_endpoint_with(
                "grpc://stalled.test:7051",
                identity(Role::Tls),
                EndpointOptions::new(),
                Box::new(StallConnector::default()),
            )
            .unwrap(),
    )
}

pub fn identity(role: Role) -> Arc<Identity> {
    let ca = DevAuthority::new("test-ca").unwrap();
    ca.register("org1", "user1", "pw");
    let issued = ca.enroll("org1", "user1", "pw", role).unwrap();
    Arc::new(Identity::new(
        issued.certificate.into_bytes(),
        issued.private_key.into_bytes(),
        "org1",
        "user1",
        role,
    ))
}

pub fn context() -> Arc<ClientContext> {
    Arc::new(ClientContext::new(identity(Role::Application)).unwrap())
}
