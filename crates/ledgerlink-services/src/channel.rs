//! Channel handle: one named channel, its orderers and peers, and the
//! genesis-fetch and join operations.
//!
//! Per-target failures during a join are reported in the result sequence,
//! never as `Err`. Only a malformed request or a channel with no orderer
//! fails the whole call.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use futures::future::join_all;

use ledgerlink_core::wire::{
    Request, Response, STATUS_INTERNAL, STATUS_OK, STATUS_TIMEOUT, STATUS_UNAVAILABLE,
};
use ledgerlink_core::{TransactionId, TransportError};

use crate::context::{ClientContext, SigningError};
use crate::endpoint::Endpoint;

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("channel {0} has no orderer")]
    OrdererUnavailable(String),

    #[error("invalid join request: {0}")]
    ChannelJoin(String),

    #[error("invalid proposal: {0}")]
    MalformedProposal(String),

    #[error("orderer rejected request: {status} {message}")]
    Rejected { status: i32, message: String },

    #[error("unexpected {0} response")]
    UnexpectedResponse(&'static str),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to sign request: {0}")]
    Signing(#[from] SigningError),
}

// ── Join ──────────────────────────────────────────────────────────────────────

/// Ask `targets` to join the channel described by `block`.
#[derive(Debug, Clone)]
pub struct JoinRequest {
    pub targets: Vec<Arc<Endpoint>>,
    pub block: Vec<u8>,
    pub tx_id: TransactionId,
}

/// Outcome of a join on one peer.
#[derive(Debug, Clone)]
pub struct JoinResult {
    pub endpoint: Arc<Endpoint>,
    pub status_code: i32,
    pub message: String,
    /// Set when the peer was never heard from.
    pub error: Option<TransportError>,
}

impl JoinResult {
    pub fn is_success(&self) -> bool {
        self.status_code == STATUS_OK
    }
}

// ── Channel ───────────────────────────────────────────────────────────────────

pub struct Channel {
    name: String,
    ctx: Arc<ClientContext>,
    orderers: Vec<Arc<Endpoint>>,
    peers: Vec<Arc<Endpoint>>,
    genesis: OnceLock<Vec<u8>>,
}

impl Channel {
    /// An empty channel handle.
    pub fn new(name: impl Into<String>, ctx: Arc<ClientContext>) -> Self {
        Self {
            name: name.into(),
            ctx,
            orderers: Vec::new(),
            peers: Vec::new(),
            genesis: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn context(&self) -> &Arc<ClientContext> {
        &self.ctx
    }

    /// Returns false if this endpoint was already an orderer.
    pub fn add_orderer(&mut self, endpoint: Arc<Endpoint>) -> bool {
        insert_unique(&mut self.orderers, endpoint)
    }

    /// Returns false if this endpoint was already a peer.
    pub fn add_peer(&mut self, endpoint: Arc<Endpoint>) -> bool {
        insert_unique(&mut self.peers, endpoint)
    }

    pub fn orderers(&self) -> &[Arc<Endpoint>] {
        &self.orderers
    }

    pub fn peers(&self) -> &[Arc<Endpoint>] {
        &self.peers
    }

    /// The genesis block, once one has been fetched.
    pub fn genesis_block(&self) -> Option<&[u8]> {
        self.genesis.get().map(Vec::as_slice)
    }

    /// Fetch block 0 from the first orderer.
    pub async fn get_genesis_block(&self, tx_id: &TransactionId) -> Result<Vec<u8>, ChannelError> {
        let orderer = self
            .orderers
            .first()
            .ok_or_else(|| ChannelError::OrdererUnavailable(self.name.clone()))?;

        let envelope = self
            .ctx
            .sign_request(&self.name, tx_id, Request::FetchBlock { number: 0 })?;

        match orderer.rpc(&envelope).await? {
            Response::Block { block } => {
                if self.genesis.set(block.clone()).is_ok() {
                    tracing::info!(
                        channel = %self.name,
                        orderer = %orderer.address(),
                        bytes = block.len(),
                        "genesis block fetched"
                    );
                }
                Ok(block)
            }
            Response::Status {
                status, message, ..
            } => Err(ChannelError::Rejected { status, message }),
            // `rpc` turns Error frames into `Err`.
            _ => Err(ChannelError::UnexpectedResponse("error")),
        }
    }

    /// Join every target concurrently. Each target gets its own `timeout`.
    ///
    /// The result at position `i` belongs to `request.targets[i]`.
    pub async fn join_channel(
        &self,
        request: JoinRequest,
        timeout: Duration,
    ) -> Result<Vec<JoinResult>, ChannelError> {
        if request.targets.is_empty() {
            return Err(ChannelError::ChannelJoin("no target peers".to_string()));
        }
        if request.block.is_empty() {
            return Err(ChannelError::ChannelJoin("empty genesis block".to_string()));
        }
        if !self.ctx.claim(&request.tx_id) {
            return Err(ChannelError::ChannelJoin(format!(
                "transaction id {} is reused or was not issued by this client",
                request.tx_id
            )));
        }

        let envelope = self.ctx.sign_request(
            &self.name,
            &request.tx_id,
            Request::JoinChannel {
                block: request.block,
            },
        )?;

        let envelope = &envelope;
        let results = join_all(request.targets.into_iter().map(|peer| async move {
            let outcome = tokio::time::timeout(timeout, peer.rpc(envelope)).await;
            join_result(peer, outcome, timeout)
        }))
        .await;

        let joined = results.iter().filter(|r| r.is_success()).count();
        tracing::info!(
            channel = %self.name,
            tx_id = %request.tx_id,
            joined,
            total = results.len(),
            "join complete"
        );
        Ok(results)
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("orderers", &self.orderers.len())
            .field("peers", &self.peers.len())
            .field("genesis", &self.genesis.get().map(Vec::len))
            .finish()
    }
}

fn insert_unique(set: &mut Vec<Arc<Endpoint>>, endpoint: Arc<Endpoint>) -> bool {
    if set.iter().any(|e| e.id() == endpoint.id()) {
        return false;
    }
    set.push(endpoint);
    true
}

fn join_result(
    endpoint: Arc<Endpoint>,
    outcome: Result<Result<Response, TransportError>, tokio::time::error::Elapsed>,
    timeout: Duration,
) -> JoinResult {
    let (status_code, message, error) = match outcome {
        Ok(Ok(Response::Status {
            status, message, ..
        })) => (status, message, None),
        Ok(Ok(_)) => (
            STATUS_INTERNAL,
            "unexpected response to join".to_string(),
            None,
        ),
        Ok(Err(e)) => (STATUS_UNAVAILABLE, e.to_string(), Some(e)),
        Err(_) => {
            let e = TransportError::other(format!(
                "join timed out after {} ms",
                timeout.as_millis()
            ));
            (STATUS_TIMEOUT, e.to_string(), Some(e))
        }
    };
    if status_code != STATUS_OK {
        tracing::warn!(peer = %endpoint.address(), status = status_code, %message, "join failed");
    }
    JoinResult {
        endpoint,
        status_code,
        message,
        error,
    }
}
