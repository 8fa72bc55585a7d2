//! ledgerlink-ctl: drive the enroll → genesis → join → invoke flow.

use std::path::PathBuf;

use anyhow::{Context, Result};

use ledgerlink_core::config::LedgerlinkConfig;

mod cmd;

fn print_usage() {
    println!("Usage: ledgerlink-ctl [--config <path>] <command>");
    println!();
    println!("Commands:");
    println!("  enroll                 Enroll TLS and application identities");
    println!("  genesis                Fetch the channel's genesis block from the orderer");
    println!("  join                   Join every configured peer to the channel");
    println!("  invoke <fn> [args...]  Send a proposal to every configured peer");
    println!("  limits                 Show limit settings and effective per-peer limits");
    println!();
    println!("Options:");
    println!("  --config <path>   Config file (default: {})", LedgerlinkConfig::file_path().display());
}

fn load_config(path: Option<PathBuf>) -> Result<LedgerlinkConfig> {
    match path {
        Some(path) => LedgerlinkConfig::load_from(&path)
            .with_context(|| format!("failed to load {}", path.display())),
        None => {
            if let Err(e) = LedgerlinkConfig::write_default_if_missing() {
                tracing::warn!(error = %e, "failed to write default config");
            }
            LedgerlinkConfig::load().context("failed to load config")
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut config_path = None;
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--config" {
            i += 1;
            config_path = Some(PathBuf::from(
                args.get(i).context("--config requires a value")?,
            ));
        } else {
            remaining.push(&args[i]);
        }
        i += 1;
    }

    if matches!(remaining.as_slice(), ["help"] | ["--help"] | ["-h"] | []) {
        print_usage();
        return Ok(());
    }
    let config = load_config(config_path)?;

    match remaining.as_slice() {
        ["enroll"]                    => cmd::enroll::run(&config).await,
        ["genesis"]                   => cmd::genesis::run(&config).await,
        ["join"]                      => cmd::join::run(&config).await,
        ["invoke", function, args @ ..] => cmd::invoke::run(&config, function, args).await,
        ["limits"]                    => cmd::limits::run(&config),
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
