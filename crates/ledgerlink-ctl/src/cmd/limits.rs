//! `limits`: show the limit settings and what each peer would resolve to.

use anyhow::Result;

use ledgerlink_core::config::LedgerlinkConfig;
use ledgerlink_core::limits::{
    CURRENT_RECEIVE_LIMIT, CURRENT_SEND_LIMIT, LEGACY_RECEIVE_LIMIT, LEGACY_SEND_LIMIT,
};

pub fn run(config: &LedgerlinkConfig) -> Result<()> {
    let limits = &config.limits;

    println!("═══════════════════════════════════════");
    println!("  Limit settings");
    println!("═══════════════════════════════════════");
    for key in [
        LEGACY_SEND_LIMIT,
        CURRENT_SEND_LIMIT,
        LEGACY_RECEIVE_LIMIT,
        CURRENT_RECEIVE_LIMIT,
    ] {
        let value = limits
            .get(key)?
            .map(|v| v.to_string())
            .unwrap_or_else(|| "unset".to_string());
        println!("  {key:<22}: {value}");
    }

    let defaults = limits.resolve(None, None);
    println!();
    println!("  Effective without overrides:");
    println!("    send    : {}", defaults.send);
    println!("    receive : {}", defaults.receive);

    for node in config.network.orderers.iter().chain(&config.network.peers) {
        let resolved = limits.resolve(node.send_limit_override, node.receive_limit_override);
        println!("  ┌─ {}", node.url);
        println!("  │  send    : {}", resolved.send);
        println!("  └─ receive : {}", resolved.receive);
    }
    Ok(())
}
