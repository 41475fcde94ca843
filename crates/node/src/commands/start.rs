//! Run a node.

use crate::config::NodeConfig;
use crate::rpc;
use anyhow::{anyhow, Context, Result};
use clap::Args;
use colored::Colorize;
use powchain_chain::{Blockchain, MiningLoop};
use powchain_p2p::Network;
use powchain_storage::Storage;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

#[derive(Args)]
pub struct StartArgs {
    /// Rebuild account state by replaying the stored chain before starting
    #[arg(long)]
    reindex: bool,

    /// Mine blocks (overrides the config file)
    #[arg(long)]
    mine: bool,

    /// Directory to store blockchain data
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// RPC listen address
    #[arg(long)]
    rpc_addr: Option<String>,

    /// P2P listen address
    #[arg(long)]
    p2p_addr: Option<String>,

    /// Peer to connect to; may be repeated
    #[arg(long = "peer")]
    peers: Vec<String>,

    /// Leading zero bits required of mined blocks
    #[arg(long)]
    difficulty: Option<u32>,
}

impl StartArgs {
    fn apply(self, config: &mut NodeConfig) -> bool {
        if self.mine {
            config.mine = true;
        }
        if let Some(dir) = self.data_dir {
            config.data_dir = dir;
        }
        if let Some(addr) = self.rpc_addr {
            config.rpc_addr = addr;
        }
        if let Some(addr) = self.p2p_addr {
            config.p2p_addr = addr;
        }
        if !self.peers.is_empty() {
            config.peers = self.peers;
        }
        if let Some(difficulty) = self.difficulty {
            config.consensus_difficulty = difficulty;
        }
        self.reindex
    }
}

pub fn run(mut config: NodeConfig, args: StartArgs) -> Result<()> {
    let reindex = args.apply(&mut config);
    config.validate()?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(serve(config, reindex))
}

async fn serve(config: NodeConfig, reindex: bool) -> Result<()> {
    let signer = config.signer()?;
    let genesis = config.genesis()?;
    let chain_config = config.chain_config()?;
    let block_time = chain_config.block_time;

    fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("Failed to create data directory: {:?}", config.data_dir))?;
    let storage = Storage::open(config.db_path()).context("Failed to open storage")?;
    let chain = Arc::new(Blockchain::open(storage, chain_config, genesis).context("Failed to open chain")?);
    let mut halted = halt_signal(&chain);

    if reindex {
        let replay = chain.clone();
        let root = tokio::task::spawn_blocking(move || replay.rebuild_state())
            .await?
            .context("Reindex failed")?;
        println!("{}  Reindexed state, root {}", "✓".green().bold(), root.to_hex().bright_yellow());
    }

    let network = Network::start(chain.clone(), config.network_config())
        .await
        .context("Failed to start P2P listener")?;
    let listener = tokio::net::TcpListener::bind(&config.rpc_addr)
        .await
        .with_context(|| format!("Failed to bind RPC address {}", config.rpc_addr))?;

    let signer_address = signer.address();
    let mut miner = config
        .mine
        .then(|| MiningLoop::spawn(chain.clone(), signer, block_time));

    let head = chain.current_head();
    println!("{}", "powchain node running".bold().cyan());
    println!("  Signer:     {}", signer_address.to_hex().bright_yellow());
    println!("  Head:       #{} {}", head.number(), head.hash.to_hex().bright_black());
    println!("  P2P:        {}", network.local_addr().bright_cyan());
    println!("  RPC:        http://{}", config.rpc_addr.bright_cyan());
    println!("  Mining:     {}", if config.mine { "on".green() } else { "off".normal() });

    let result = tokio::select! {
        served = axum::serve(listener, rpc::router(chain.clone())) => {
            served.context("RPC server failed")
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            Ok(())
        }
        _ = halted.changed() => {
            let reason = halted.borrow().clone().unwrap_or_default();
            Err(anyhow!("chain halted: {reason}"))
        }
        _ = miner_stopped(miner.as_ref()) => {
            Err(anyhow!("mining stopped after a fatal chain error"))
        }
    };

    network.shutdown();
    if let Some(mut miner) = miner.take() {
        tokio::task::spawn_blocking(move || miner.stop()).await?;
    }
    chain.flush().context("Failed to flush storage")?;
    result
}

/// Receiver that changes to the error message once the chain halts.
fn halt_signal(chain: &Blockchain) -> watch::Receiver<Option<String>> {
    let (tx, rx) = watch::channel(None);
    chain.on_halt(move |e| {
        tx.send_replace(Some(e.to_string()));
    });
    rx
}

/// Resolves if the mining thread exits on its own.
async fn miner_stopped(miner: Option<&MiningLoop>) {
    let Some(miner) = miner else {
        return std::future::pending().await;
    };
    while miner.is_running() {
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}
