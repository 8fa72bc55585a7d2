//! ledgerlink-devnode: development orderer/peer and enrollment API.

use std::path::PathBuf;

use anyhow::{Context, Result};

use ledgerlink_devnode::{Devnode, DevnodeConfig};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut config_path: Option<PathBuf> = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                config_path = Some(PathBuf::from(
                    args.get(i).context("--config requires a path")?,
                ));
            }
            "help" | "--help" | "-h" => {
                println!("Usage: ledgerlink-devnode [--config <path>]");
                return Ok(());
            }
            other => anyhow::bail!("unknown argument: {other}"),
        }
        i += 1;
    }

    let config = match config_path {
        Some(path) => DevnodeConfig::load_from(&path),
        None => DevnodeConfig::load(),
    }
    .context("load devnode config")?;

    let node = Devnode::start(&config).await?;
    println!("rpc      : {}", node.rpc_url(config.tls));
    println!("enroll   : {}", node.api_url());
    if let Some(path) = &node.ca_path {
        println!("ca root  : {}", path.display());
    }

    tokio::signal::ctrl_c().await.ok();
    tracing::info!("shutdown signal received");
    node.shutdown().await;
    Ok(())
}
