//! ledgerlink-devnode: a single-process development network.
//!
//! One RPC listener plays both orderer and peer for every configured
//! channel. A development CA issues the node's own server certificate and
//! enrolls members through the HTTP API.

pub mod config;
pub mod enroll_api;
pub mod ledger;
pub mod server;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use ledgerlink_core::ca::DevAuthority;

pub use config::{DevnodeConfig, MemberConfig};
pub use ledger::Ledger;

/// A started devnode.
pub struct Devnode {
    pub rpc_addr: SocketAddr,
    pub api_addr: SocketAddr,
    pub ca: Arc<DevAuthority>,
    pub ledger: Arc<Ledger>,
    /// Where the CA root was written, when a state dir is in use.
    pub ca_path: Option<PathBuf>,
    shutdown_tx: broadcast::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
}

impl Devnode {
    /// Bind listeners, write `ca.pem` into the state dir, and start serving.
    pub async fn start(config: &DevnodeConfig) -> Result<Self> {
        let node = Self::start_ephemeral(config).await?;

        std::fs::create_dir_all(&config.state_dir)
            .with_context(|| format!("create {}", config.state_dir.display()))?;
        let ca_path = config.state_dir.join("ca.pem");
        std::fs::write(&ca_path, node.ca.root_pem())
            .with_context(|| format!("write {}", ca_path.display()))?;
        tracing::info!(path = %ca_path.display(), "CA root written");

        Ok(Self {
            ca_path: Some(ca_path),
            ..node
        })
    }

    /// Like `start`, but keeps everything in memory.
    pub async fn start_ephemeral(config: &DevnodeConfig) -> Result<Self> {
        let ca = Arc::new(DevAuthority::new("ledgerlink-devnode-ca").context("create CA")?);
        for m in &config.members {
            ca.register(&m.org, &m.enrollment_id, &m.secret);
        }

        let ledger = Arc::new(Ledger::new());
        for channel in &config.channels {
            ledger.create_channel(channel);
        }

        let tls = if config.tls {
            let server = ca
                .issue_server(&config.hostnames)
                .context("issue server certificate")?;
            let tls_config = server::server_tls_config(
                ca.root_pem().as_bytes(),
                server.certificate.as_bytes(),
                server.private_key.as_bytes(),
            )
            .context("build server TLS config")?;
            Some(tokio_rustls::TlsAcceptor::from(tls_config))
        } else {
            None
        };

        let rpc = TcpListener::bind(&config.rpc_listen)
            .await
            .with_context(|| format!("bind rpc listener {}", config.rpc_listen))?;
        let api = TcpListener::bind(&config.api_listen)
            .await
            .with_context(|| format!("bind api listener {}", config.api_listen))?;
        let rpc_addr = rpc.local_addr()?;
        let api_addr = api.local_addr()?;

        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let receive_limit = config.receive_limit();

        let rpc_task = {
            let ledger = ledger.clone();
            let shutdown = shutdown_tx.subscribe();
            tokio::spawn(server::serve_rpc(rpc, tls, ledger, receive_limit, shutdown))
        };
        let api_task = {
            let ca = ca.clone();
            let shutdown = shutdown_tx.subscribe();
            tokio::spawn(async move {
                if let Err(e) = enroll_api::serve(api, ca, shutdown).await {
                    tracing::error!(error = %e, "enrollment API exited");
                }
            })
        };

        tracing::info!(
            rpc = %rpc_addr,
            api = %api_addr,
            tls = config.tls,
            receive_limit = %receive_limit,
            channels = ?ledger.channels(),
            "devnode listening"
        );

        Ok(Self {
            rpc_addr,
            api_addr,
            ca,
            ledger,
            ca_path: None,
            shutdown_tx,
            tasks: vec![rpc_task, api_task],
        })
    }

    /// `grpcs://` (or `grpc://`) URL of the RPC listener.
    pub fn rpc_url(&self, tls: bool) -> String {
        let scheme = if tls { "grpcs" } else { "grpc" };
        format!("{scheme}://{}", self.rpc_addr)
    }

    /// Base URL of the enrollment API.
    pub fn api_url(&self) -> String {
        format!("http://{}", self.api_addr)
    }

    /// Stop both listeners and wait for them.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        for task in self.tasks {
            let _ = task.await;
        }
        tracing::info!("devnode stopped");
    }
}
