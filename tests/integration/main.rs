//! ledgerlink integration test harness.
//!
//! Every test starts its own in-process devnode on ephemeral loopback
//! ports, enrolls over the HTTP API, and talks to the node over real
//! mutual TLS. Nothing needs to be running beforehand:
//!
//!   cargo test --test integration
//!
//! Tests never share a node, so they may run in parallel.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use ledgerlink_core::limits::LimitSettings;
use ledgerlink_core::Identity;
use ledgerlink_devnode::{Devnode, DevnodeConfig, MemberConfig};
use ledgerlink_services::{
    Channel, ClientContext, Endpoint, EndpointFactory, EndpointOptions, EnrollmentClient,
    HttpAuthority, JoinRequest,
};

mod channel;
mod enrollment;
mod limits;
mod proposals;

// ── Harness ───────────────────────────────────────────────────────────────────

pub const CHANNEL: &str = "mychannel";
pub const ORG: &str = "org1";
pub const ADMIN: &str = "admin";
pub const ADMIN_SECRET: &str = "adminpw";
pub const CHAINCODE: &str = "example_cc";

/// Name on the node's server certificate.
pub const SERVER_NAME: &str = "localhost";

pub const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

pub fn devnode_config(max_receive_bytes: i64) -> DevnodeConfig {
    DevnodeConfig {
        rpc_listen: "127.0.0.1:0".to_string(),
        api_listen: "127.0.0.1:0".to_string(),
        tls: true,
        hostnames: vec![SERVER_NAME.to_string()],
        channels: vec![CHANNEL.to_string()],
        members: vec![MemberConfig {
            org: ORG.to_string(),
            enrollment_id: ADMIN.to_string(),
            secret: ADMIN_SECRET.to_string(),
        }],
        max_receive_bytes,
        state_dir: std::env::temp_dir().join(format!("ledgerlink-it-{}", std::process::id())),
    }
}

/// A running devnode plus identities enrolled against it.
pub struct TestNetwork {
    pub node: Devnode,
    pub tls: Arc<Identity>,
    pub ctx: Arc<ClientContext>,
}

impl TestNetwork {
    /// Devnode with no receive limit of its own.
    pub async fn start() -> Result<Self> {
        Self::start_with(devnode_config(-1)).await
    }

    pub async fn start_with(config: DevnodeConfig) -> Result<Self> {
        let node = Devnode::start_ephemeral(&config).await?;

        let authority = HttpAuthority::new(node.api_url())?;
        let client = EnrollmentClient::new(Arc::new(authority)).with_registrar(ORG, ADMIN, ADMIN_SECRET);
        let tls = client.enroll_tls(ORG).await.context("enroll tls")?;
        let app = client
            .enroll_application_user(ORG)
            .await
            .context("enroll application user")?;
        let ctx = ClientContext::new(Arc::new(app)).context("client context")?;

        Ok(Self {
            node,
            tls: Arc::new(tls),
            ctx: Arc::new(ctx),
        })
    }

    /// A fresh mutual-TLS endpoint to the node, built by `factory`.
    pub fn endpoint(&self, factory: &EndpointFactory, options: EndpointOptions) -> Result<Arc<Endpoint>> {
        let endpoint = factory.create_endpoint(
            &self.node.rpc_url(true),
            self.node.ca.root_pem().as_bytes(),
            self.tls.clone(),
            options.hostname_override(SERVER_NAME),
        )?;
        Ok(Arc::new(endpoint))
    }

    pub fn default_endpoint(&self) -> Result<Arc<Endpoint>> {
        self.endpoint(&EndpointFactory::default(), EndpointOptions::new())
    }

    /// Channel with the node as orderer and peer, genesis fetched and the
    /// peer joined.
    pub async fn joined_channel(&self) -> Result<Channel> {
        let mut channel = Channel::new(CHANNEL, self.ctx.clone());
        channel.add_orderer(self.default_endpoint()?);
        channel.add_peer(self.default_endpoint()?);

        let block = channel.get_genesis_block(&self.ctx.new_transaction_id()).await?;
        let results = channel
            .join_channel(
                JoinRequest {
                    targets: channel.peers().to_vec(),
                    block,
                    tx_id: self.ctx.new_transaction_id(),
                },
                JOIN_TIMEOUT,
            )
            .await?;
        anyhow::ensure!(results.iter().all(|r| r.is_success()), "join failed: {results:?}");
        Ok(channel)
    }

    pub async fn stop(self) {
        self.node.shutdown().await;
    }
}

pub fn factory_with(settings: &[(&str, i64)]) -> Result<EndpointFactory> {
    let mut limits = LimitSettings::default();
    for (key, value) in settings {
        limits = limits.set(key, *value)?;
    }
    Ok(EndpointFactory::new(limits))
}

/// A loopback port with nothing listening on it.
pub async fn closed_port() -> Result<u16> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

/// A loopback listener that accepts connections and never answers.
pub async fn silent_listener() -> Result<u16> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    Ok(port)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_devnode_writes_ca_root() {
    let mut config = devnode_config(-1);
    config.state_dir = std::env::temp_dir().join(format!("ledgerlink-it-ca-{}", std::process::id()));
    let node = Devnode::start(&config).await.unwrap();

    let path = node.ca_path.clone().expect("start writes the CA root");
    let pem = std::fs::read_to_string(&path).unwrap();
    assert_eq!(pem, node.ca.root_pem());

    node.shutdown().await;
    let _ = std::fs::remove_dir_all(&config.state_dir);
}

#[tokio::test]
async fn test_full_flow_enroll_genesis_join_invoke() {
    let net = TestNetwork::start().await.unwrap();
    let channel = net.joined_channel().await.unwrap();
    assert!(channel.genesis_block().is_some());

    let request = ledgerlink_services::ProposalRequest::new(
        channel.peers().to_vec(),
        CHAINCODE,
        "echo",
        vec![b"ping".to_vec()],
        net.ctx.new_transaction_id(),
    );
    let responses = channel.send_transaction_proposal(request).await.unwrap();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].status(), Some(200));
    assert_eq!(responses[0].payload(), Some(&b"ping"[..]));

    net.stop().await;
}
