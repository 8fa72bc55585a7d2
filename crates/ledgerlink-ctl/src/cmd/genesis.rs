//! `genesis`: fetch block 0 from the first orderer and cache it.

use anyhow::{Context, Result};

use ledgerlink_core::config::LedgerlinkConfig;
use ledgerlink_core::crypto;

use super::network::{block_path, build_channel};

pub async fn run(config: &LedgerlinkConfig) -> Result<()> {
    let channel = build_channel(config)?;
    let tx_id = channel.context().new_transaction_id();
    let block = channel
        .get_genesis_block(&tx_id)
        .await
        .with_context(|| format!("failed to fetch genesis block of {}", channel.name()))?;

    let path = block_path(config);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, &block).with_context(|| format!("failed to write {}", path.display()))?;

    println!("═══════════════════════════════════════");
    println!("  Genesis block: {}", channel.name());
    println!("═══════════════════════════════════════");
    println!("  Size   : {} bytes", block.len());
    println!("  BLAKE3 : {}", hex::encode(crypto::hash(&block)));
    println!("  Saved  : {}", path.display());
    Ok(())
}
