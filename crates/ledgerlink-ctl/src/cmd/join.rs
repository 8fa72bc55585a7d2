//! `join`: join every configured peer to the channel.

use std::time::Duration;

use anyhow::{Context, Result};

use ledgerlink_core::config::LedgerlinkConfig;
use ledgerlink_services::JoinRequest;

use super::network::{block_path, build_channel};

pub async fn run(config: &LedgerlinkConfig) -> Result<()> {
    let channel = build_channel(config)?;
    let ctx = channel.context().clone();

    let path = block_path(config);
    let block = match std::fs::read(&path) {
        Ok(block) => block,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => channel
            .get_genesis_block(&ctx.new_transaction_id())
            .await
            .context("no cached genesis block and fetch failed")?,
        Err(e) => return Err(e).with_context(|| format!("failed to read {}", path.display())),
    };

    let request = JoinRequest {
        targets: channel.peers().to_vec(),
        block,
        tx_id: ctx.new_transaction_id(),
    };
    let timeout = Duration::from_millis(config.network.join_timeout_ms);
    let results = channel.join_channel(request, timeout).await?;

    println!("═══════════════════════════════════════");
    println!("  Join {} ({} peers)", channel.name(), results.len());
    println!("═══════════════════════════════════════");
    for r in &results {
        let icon = if r.is_success() { "✓" } else { "✗" };
        println!("  {} {} ({}) {}", icon, r.endpoint.address(), r.status_code, r.message);
    }

    let failed = results.iter().filter(|r| !r.is_success()).count();
    if failed > 0 {
        anyhow::bail!("{failed} of {} peers failed to join", results.len());
    }
    Ok(())
}
