//! Sign a transfer and hand it to a running node.

use crate::config::NodeConfig;
use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use powchain_core::{Address, Amount, Transaction};
use powchain_p2p::{request, Message};
use std::time::Duration;

#[derive(Args)]
pub struct SendTxArgs {
    /// Recipient address
    #[arg(long)]
    to: String,

    /// Amount to transfer
    #[arg(long)]
    value: String,

    /// Fee for the miner (defaults to the configured minimum)
    #[arg(long)]
    fee: Option<String>,

    /// Sender nonce
    #[arg(long, default_value = "0")]
    nonce: u64,

    /// P2P address of the node to submit to (defaults to p2p_addr)
    #[arg(long)]
    node: Option<String>,
}

pub fn run(config: NodeConfig, args: SendTxArgs) -> Result<()> {
    let signer = config.signer()?;
    let to = Address::from_hex(&args.to).with_context(|| format!("Invalid recipient '{}'", args.to))?;
    let value: Amount = args
        .value
        .parse()
        .with_context(|| format!("Invalid value '{}'", args.value))?;
    let fee: Amount = match &args.fee {
        Some(fee) => fee.parse().with_context(|| format!("Invalid fee '{fee}'"))?,
        None => config.min_fee()?,
    };

    let tx = Transaction::transfer(signer.address(), to, value, fee, args.nonce).signed(&signer);
    let hash = tx.hash();
    let node = args.node.unwrap_or_else(|| config.p2p_addr.clone());
    let timeout = Duration::from_millis(config.peer_timeout_ms);

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let message = Message::NewTransaction {
        from: String::new(),
        tx,
    };
    let response = runtime
        .block_on(request(&node, &message, timeout))
        .with_context(|| format!("Failed to reach node at {node}"))?;

    match response {
        Message::Ack => {
            println!("{}  Transaction accepted", "✓".green().bold());
            println!("    Hash: {}", hash.to_hex().bright_yellow());
            Ok(())
        }
        Message::Error(reason) => bail!("transaction rejected: {reason}"),
        other => bail!("unexpected reply: {}", other.kind()),
    }
}
