//! `invoke`: send one proposal to every configured peer.

use anyhow::Result;

use ledgerlink_core::config::LedgerlinkConfig;
use ledgerlink_services::{ProposalRequest, ProposalResponse};

use super::network::build_channel;

/// Payloads longer than this are summarised.
const PREVIEW_BYTES: usize = 64;

pub async fn run(config: &LedgerlinkConfig, function: &str, args: &[&str]) -> Result<()> {
    let channel = build_channel(config)?;
    let request = ProposalRequest::new(
        channel.peers().to_vec(),
        &config.network.chaincode_id,
        function,
        args.iter().map(|a| a.as_bytes().to_vec()).collect(),
        channel.context().new_transaction_id(),
    );
    let tx_id = request.tx_id.clone();
    let responses = channel.send_transaction_proposal(request).await?;

    println!("═══════════════════════════════════════");
    println!("  {}:{} on {}", config.network.chaincode_id, function, channel.name());
    println!("  tx {}", tx_id);
    println!("═══════════════════════════════════════");
    for response in &responses {
        match response {
            ProposalResponse::Responded {
                endpoint,
                status,
                message,
                payload,
            } => {
                println!("  ┌─ {}", endpoint.address());
                println!("  │  status  : {status} {message}");
                println!("  └─ payload : {}", preview(payload));
            }
            ProposalResponse::TransportFailed { endpoint, error } => {
                println!("  ┌─ {}", endpoint.address());
                println!("  │  failed  : {}", error.kind);
                println!("  └─ detail  : {error}");
            }
        }
    }
    Ok(())
}

fn preview(payload: &[u8]) -> String {
    if payload.len() > PREVIEW_BYTES {
        return format!("{} bytes", payload.len());
    }
    match std::str::from_utf8(payload) {
        Ok(text) => format!("{text:?}"),
        Err(_) => hex::encode(payload),
    }
}
