//! Development ledger: per-channel genesis blocks, joined channels, and two
//! built-in chaincode functions.
//!
//!   echo <bytes>   returns its first argument
//!   fill <n>       returns n bytes of b'x'
//!
//! Signatures are required to be present but are not verified.

use dashmap::{DashMap, DashSet};
use rand::RngCore;
use serde::Serialize;

use ledgerlink_core::wire::{
    self, Request, Response, SignedEnvelope, STATUS_FORBIDDEN, STATUS_INTERNAL, STATUS_NOT_FOUND,
};

/// Largest payload `fill` will produce.
pub const FILL_MAX_BYTES: usize = 64 * 1024 * 1024;

#[derive(Serialize)]
struct GenesisBlock<'a> {
    channel: &'a str,
    number: u64,
    salt: [u8; 16],
}

/// In-memory state shared by every connection of one node.
#[derive(Default)]
pub struct Ledger {
    genesis: DashMap<String, Vec<u8>>,
    joined: DashSet<String>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `channel` if needed and return its genesis block.
    pub fn create_channel(&self, channel: &str) -> Vec<u8> {
        self.genesis
            .entry(channel.to_string())
            .or_insert_with(|| {
                let mut salt = [0u8; 16];
                rand::thread_rng().fill_bytes(&mut salt);
                let block = GenesisBlock {
                    channel,
                    number: 0,
                    salt,
                };
                tracing::info!(channel, "channel created");
                wire::encode(&block).unwrap_or_else(|_| channel.as_bytes().to_vec())
            })
            .value()
            .clone()
    }

    pub fn genesis(&self, channel: &str) -> Option<Vec<u8>> {
        self.genesis.get(channel).map(|b| b.value().clone())
    }

    pub fn is_joined(&self, channel: &str) -> bool {
        self.joined.contains(channel)
    }

    pub fn channels(&self) -> Vec<String> {
        let mut names: Vec<String> = self.genesis.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Answer one encoded `SignedEnvelope`.
    pub fn handle(&self, body: &[u8]) -> Response {
        let envelope: SignedEnvelope = match wire::decode(body) {
            Ok(env) => env,
            Err(e) => {
                return Response::Error {
                    message: format!("malformed envelope: {e}"),
                }
            }
        };
        let payload = match envelope.open() {
            Ok(p) => p,
            Err(e) => {
                return Response::Error {
                    message: format!("malformed payload: {e}"),
                }
            }
        };
        if envelope.signature.is_empty() || payload.header.creator.is_empty() {
            return Response::status(STATUS_FORBIDDEN, "unsigned request");
        }

        let channel = payload.header.channel.as_str();
        tracing::debug!(
            channel,
            tx_id = %payload.header.tx_id,
            request = payload.request.name(),
            "request"
        );
        match &payload.request {
            Request::FetchBlock { number } => self.fetch_block(channel, *number),
            Request::JoinChannel { block } => self.join(channel, block),
            Request::Proposal {
                chaincode_id,
                function,
                args,
            } => self.invoke(channel, chaincode_id, function, args),
        }
    }

    fn fetch_block(&self, channel: &str, number: u64) -> Response {
        match self.genesis(channel) {
            None => Response::status(STATUS_NOT_FOUND, format!("channel {channel} not found")),
            Some(block) if number == 0 => Response::Block { block },
            Some(_) => Response::status(STATUS_NOT_FOUND, format!("block {number} not found")),
        }
    }

    fn join(&self, channel: &str, block: &[u8]) -> Response {
        let Some(genesis) = self.genesis(channel) else {
            return Response::status(STATUS_NOT_FOUND, format!("channel {channel} not found"));
        };
        if genesis != block {
            return Response::status(
                STATUS_INTERNAL,
                format!("block does not match genesis of {channel}"),
            );
        }
        if !self.joined.insert(channel.to_string()) {
            return Response::status(STATUS_INTERNAL, format!("already joined {channel}"));
        }
        tracing::info!(channel, "joined");
        Response::status(wire::STATUS_OK, format!("joined {channel}"))
    }

    fn invoke(&self, channel: &str, chaincode_id: &str, function: &str, args: &[Vec<u8>]) -> Response {
        if !self.is_joined(channel) {
            return Response::status(STATUS_NOT_FOUND, format!("channel {channel} not joined"));
        }
        match function {
            "echo" => Response::ok(args.first().cloned().unwrap_or_default()),
            "fill" => match fill_len(args) {
                Some(n) => Response::ok(vec![b'x'; n]),
                None => Response::status(
                    STATUS_INTERNAL,
                    format!("fill expects a byte count up to {FILL_MAX_BYTES}"),
                ),
            },
            other => Response::status(
                STATUS_INTERNAL,
                format!("{chaincode_id}: unknown function {other}"),
            ),
        }
    }
}

fn fill_len(args: &[Vec<u8>]) -> Option<usize> {
    let text = std::str::from_utf8(args.first()?).ok()?;
    let n: usize = text.trim().parse().ok()?;
    (n <= FILL_MAX_BYTES).then_some(n)
}
