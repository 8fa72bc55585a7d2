//! Client context: the identity requests are signed with, and the
//! transaction ids it has handed out.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashSet;

use ledgerlink_core::crypto::{CryptoError, RequestSigner};
use ledgerlink_core::wire::{self, Header, Payload, Request, SignedEnvelope, WireError};
use ledgerlink_core::{Identity, TransactionId};

#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Wire(#[from] WireError),
}

/// Signs requests on behalf of one application identity.
pub struct ClientContext {
    identity: Arc<Identity>,
    signer: RequestSigner,
    issued: DashSet<String>,
    submitted: DashSet<String>,
}

impl ClientContext {
    pub fn new(identity: Arc<Identity>) -> Result<Self, CryptoError> {
        let signer = RequestSigner::from_pem(identity.private_key())?;
        tracing::debug!(
            member = %identity.organization_member(),
            scheme = ?signer.scheme(),
            "client context ready"
        );
        Ok(Self {
            identity,
            signer,
            issued: DashSet::new(),
            submitted: DashSet::new(),
        })
    }

    pub fn identity(&self) -> &Arc<Identity> {
        &self.identity
    }

    /// A transaction id this context has never issued before.
    pub fn new_transaction_id(&self) -> TransactionId {
        loop {
            let id = TransactionId::generate(self.identity.certificate());
            if self.issued.insert(id.value().to_string()) {
                return id;
            }
            tracing::warn!(tx_id = %id, "transaction id collision, regenerating");
        }
    }

    /// How many ids this context has issued.
    pub fn issued_count(&self) -> usize {
        self.issued.len()
    }

    /// Mark `tx_id` as submitted. False if this context never issued it or
    /// it was already submitted.
    pub fn claim(&self, tx_id: &TransactionId) -> bool {
        if !self.issued.contains(tx_id.value()) {
            tracing::warn!(%tx_id, "transaction id not issued by this context");
            return false;
        }
        if !self.submitted.insert(tx_id.value().to_string()) {
            tracing::warn!(%tx_id, "transaction id already submitted");
            return false;
        }
        true
    }

    /// Wrap `request` in a header for `channel`, sign it, and encode the
    /// envelope ready for the wire.
    pub fn sign_request(
        &self,
        channel: &str,
        tx_id: &TransactionId,
        request: Request,
    ) -> Result<Vec<u8>, SigningError> {
        let payload = Payload {
            header: Header {
                channel: channel.to_string(),
                tx_id: tx_id.value().to_string(),
                nonce: tx_id.nonce().to_vec(),
                creator: self.identity.certificate().to_vec(),
                timestamp_ms: now_ms(),
            },
            request,
        };
        let payload = wire::encode(&payload)?;
        let signature = self.signer.sign(&payload)?;
        Ok(wire::encode(&SignedEnvelope { payload, signature })?)
    }
}

impl std::fmt::Debug for ClientContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientContext")
            .field("identity", &self.identity)
            .field("signer", &self.signer)
            .field("issued", &self.issued.len())
            .field("submitted", &self.submitted.len())
            .finish()
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
