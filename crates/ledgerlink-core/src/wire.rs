//! ledgerlink wire format: the messages carried inside RPC frames.
//!
//! One RPC = one request frame, one response frame. The request frame body
//! is a bincode `SignedEnvelope`; its `payload` is a bincode `Payload`. The
//! signature covers the payload bytes exactly as sent.
//!
//! Block contents and chaincode semantics are opaque at this layer.

use serde::{Deserialize, Serialize};

/// Status code for a successful join or proposal.
pub const STATUS_OK: i32 = 200;

/// Status for a request without a creator or signature.
pub const STATUS_FORBIDDEN: i32 = 403;

/// Status for a request naming something the node does not have.
pub const STATUS_NOT_FOUND: i32 = 404;

/// Status for a request the node refused or failed to execute.
pub const STATUS_INTERNAL: i32 = 500;

/// Status recorded for a target that failed at the transport layer.
pub const STATUS_UNAVAILABLE: i32 = 503;

/// Status recorded for a target that did not answer in time.
pub const STATUS_TIMEOUT: i32 = 504;

/// Who sent the request and under which transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub channel: String,
    pub tx_id: String,
    pub nonce: Vec<u8>,
    /// Creator's PEM certificate.
    pub creator: Vec<u8>,
    pub timestamp_ms: u64,
}

/// The operation requested of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    /// Orderer: return block `number` of the header's channel.
    FetchBlock { number: u64 },
    /// Peer: join the channel described by `block`.
    JoinChannel { block: Vec<u8> },
    /// Peer: execute `function(args)` on `chaincode_id`.
    Proposal {
        chaincode_id: String,
        function: String,
        args: Vec<Vec<u8>>,
    },
}

impl Request {
    pub fn name(&self) -> &'static str {
        match self {
            Request::FetchBlock { .. } => "fetch_block",
            Request::JoinChannel { .. } => "join_channel",
            Request::Proposal { .. } => "proposal",
        }
    }
}

/// Signed content of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    pub header: Header,
    pub request: Request,
}

/// What actually travels in a request frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedEnvelope {
    pub payload: Vec<u8>,
    pub signature: Vec<u8>,
}

/// A node's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    /// Orderer: the requested block.
    Block { block: Vec<u8> },
    /// Peer: outcome of a join or proposal.
    Status {
        status: i32,
        message: String,
        payload: Vec<u8>,
    },
    /// The node could not process the frame. `message` is transport text
    /// and is classified like any other transport error.
    Error { message: String },
}

impl Response {
    pub fn ok(payload: Vec<u8>) -> Self {
        Response::Status {
            status: STATUS_OK,
            message: String::new(),
            payload,
        }
    }

    pub fn status(status: i32, message: impl Into<String>) -> Self {
        Response::Status {
            status,
            message: message.into(),
            payload: Vec::new(),
        }
    }
}

// ── Encoding ──────────────────────────────────────────────────────────────────

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, WireError> {
    bincode::serialize(value).map_err(|e| WireError::Encode(e.to_string()))
}

pub fn decode<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T, WireError> {
    bincode::deserialize(bytes).map_err(|e| WireError::Decode(e.to_string()))
}

impl SignedEnvelope {
    /// Decode the inner payload. Does not verify the signature.
    pub fn open(&self) -> Result<Payload, WireError> {
        decode(&self.payload)
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("encode failed: {0}")]
    Encode(String),

    #[error("decode failed: {0}")]
    Decode(String),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
