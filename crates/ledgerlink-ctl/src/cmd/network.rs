//! Shared setup: stored identities, endpoints and the channel handle.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use ledgerlink_core::config::{data_dir, LedgerlinkConfig, NodeConfig};
use ledgerlink_core::{Identity, Role};
use ledgerlink_services::credential_store::credential_key;
use ledgerlink_services::{
    Channel, ClientContext, CredentialStore, Endpoint, EndpointFactory, EndpointOptions,
    FileCredentialStore,
};

pub fn credential_store(config: &LedgerlinkConfig) -> FileCredentialStore {
    FileCredentialStore::new(&config.identity.credential_dir)
}

pub fn load_identity(config: &LedgerlinkConfig, role: Role) -> Result<Arc<Identity>> {
    let key = credential_key(&config.identity.org, &config.identity.enrollment_id, role);
    let stored = credential_store(config)
        .get(&key)?
        .with_context(|| format!("no {role} identity for {key}; run `ledgerlink-ctl enroll` first"))?;
    Ok(Arc::new(stored.into_identity()))
}

pub fn build_endpoint(
    factory: &EndpointFactory,
    node: &NodeConfig,
    identity: Arc<Identity>,
) -> Result<Endpoint> {
    let trust_root = if node.tls_root.as_os_str().is_empty() {
        Vec::new()
    } else {
        std::fs::read(&node.tls_root)
            .with_context(|| format!("failed to read trust root {}", node.tls_root.display()))?
    };

    let mut options = EndpointOptions::new();
    if let Some(name) = &node.hostname_override {
        options = options.hostname_override(name.clone());
    }
    if let Some(v) = node.send_limit_override {
        options = options.send_limit_override(v);
    }
    if let Some(v) = node.receive_limit_override {
        options = options.receive_limit_override(v);
    }

    factory
        .create_endpoint(&node.url, &trust_root, identity, options)
        .with_context(|| format!("invalid endpoint {}", node.url))
}

/// The configured channel with its orderers and peers attached.
pub fn build_channel(config: &LedgerlinkConfig) -> Result<Channel> {
    let tls = load_identity(config, Role::Tls)?;
    let app = load_identity(config, Role::Application)?;
    let ctx = Arc::new(ClientContext::new(app).context("application identity cannot sign")?);

    let factory = EndpointFactory::new(config.limits);
    let mut channel = Channel::new(config.network.channel.clone(), ctx);
    for node in &config.network.orderers {
        channel.add_orderer(Arc::new(build_endpoint(&factory, node, tls.clone())?));
    }
    for node in &config.network.peers {
        channel.add_peer(Arc::new(build_endpoint(&factory, node, tls.clone())?));
    }
    Ok(channel)
}

/// Where `genesis` caches the channel's block for `join`.
pub fn block_path(config: &LedgerlinkConfig) -> PathBuf {
    data_dir()
        .join("blocks")
        .join(format!("{}.block", config.network.channel))
}
