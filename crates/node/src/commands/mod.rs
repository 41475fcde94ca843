//! CLI commands module.

use crate::config::NodeConfig;
use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::Path;

mod demo;
mod keygen;
mod send_tx;
mod start;

#[derive(Subcommand)]
pub enum Commands {
    /// Run a node: sync with peers, serve RPC and optionally mine
    Start(start::StartArgs),
    /// Mine a few blocks in a throwaway chain and show the result
    Demo(demo::DemoArgs),
    /// Generate a signing key
    Keygen(keygen::KeygenArgs),
    /// Sign a transfer and hand it to a running node
    SendTx(send_tx::SendTxArgs),
    /// Print version information
    Version,
}

pub fn run(config_path: Option<&Path>, cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Start(args) => start::run(load_config(config_path)?, args),
        Commands::Demo(args) => demo::run(args),
        Commands::Keygen(args) => keygen::run(args),
        Commands::SendTx(args) => send_tx::run(load_config(config_path)?, args),
        Commands::Version => {
            println!("powchain {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<NodeConfig> {
    match path {
        Some(path) => NodeConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(NodeConfig::default()),
    }
}
