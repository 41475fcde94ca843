//! Throwaway walkthrough: mine, transfer, and resolve a fork.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use powchain_chain::{Blockchain, ChainConfig, Genesis, ImportOutcome, Origin};
use powchain_consensus::{CancelToken, MineOutcome};
use powchain_core::{Address, Amount, Block, Keypair, Transaction};
use powchain_storage::Storage;
use std::time::Instant;

#[derive(Args)]
pub struct DemoArgs {
    /// Leading zero bits required of mined blocks
    #[arg(short, long, default_value = "12")]
    difficulty: u32,
}

fn open_node(genesis: &Genesis, difficulty: u32) -> Result<Blockchain> {
    let config = ChainConfig {
        difficulty,
        ..ChainConfig::default()
    };
    let storage = Storage::open_temporary().context("Failed to open temporary storage")?;
    Ok(Blockchain::open(storage, config, genesis.clone())?)
}

fn mine(chain: &Blockchain, miner: &Keypair, label: &str) -> Result<Block> {
    let started = Instant::now();
    let txs = chain.pending_transactions(chain.config().max_block_transactions)?;
    match chain.add_block(label.as_bytes().to_vec(), txs, &CancelToken::new(), miner)? {
        MineOutcome::Mined(block) => {
            println!(
                "  {} #{} {} ({} txs, nonce {}, {:.2?})",
                label.bright_cyan(),
                block.number(),
                block.hash.short().bright_yellow(),
                block.tx_count(),
                block.header.nonce,
                started.elapsed()
            );
            Ok(block)
        }
        MineOutcome::Cancelled => anyhow::bail!("mining was cancelled"),
    }
}

fn balance(chain: &Blockchain, address: &Address) -> Result<Amount> {
    Ok(chain.account(address)?.balance)
}

pub fn run(args: DemoArgs) -> Result<()> {
    let alice = Keypair::generate();
    let bob = Keypair::generate();
    let (miner_a, miner_b) = (Keypair::generate(), Keypair::generate());
    let genesis = Genesis::new([(alice.address(), Amount::from(1000u32))]);

    println!("{}", "powchain demo".bold().cyan());
    println!("  Difficulty: {} bits", args.difficulty);
    println!("  Alice:      {}", alice.address().to_hex().bright_yellow());
    println!("  Bob:        {}", bob.address().to_hex().bright_yellow());
    println!();

    let node_a = open_node(&genesis, args.difficulty)?;
    let node_b = open_node(&genesis, args.difficulty)?;

    println!("{}", "Transfer 500 from Alice to Bob (fee 100) on node A".bold());
    let tx = Transaction::transfer(alice.address(), bob.address(), 500u64, 100u64, 0).signed(&alice);
    node_a.submit_transaction(tx, Origin::Local)?;
    mine(&node_a, &miner_a, "A")?;
    println!(
        "  Alice {}  Bob {}  miner A {}",
        balance(&node_a, &alice.address())?,
        balance(&node_a, &bob.address())?,
        balance(&node_a, &miner_a.address())?
    );
    println!();

    println!("{}", "Node B mines a longer competing branch".bold());
    let branch = vec![mine(&node_b, &miner_b, "B")?, mine(&node_b, &miner_b, "B")?];
    println!();

    println!("{}", "Node A receives B's branch".bold());
    for block in branch {
        let outcome = node_a.import_block(block, Origin::Peer("node-b".into()))?;
        let text = match outcome {
            ImportOutcome::Reorganized { depth, .. } => format!("reorganized (depth {depth})").yellow(),
            other => format!("{other:?}").normal(),
        };
        println!("  {text}");
    }
    println!(
        "  Alice {}  Bob {}  pending {}",
        balance(&node_a, &alice.address())?,
        balance(&node_a, &bob.address())?,
        node_a.mempool_len()
    );
    println!();

    println!("{}", "Node A mines the returned transfer on the new head".bold());
    mine(&node_a, &miner_a, "A")?;
    println!(
        "  Alice {}  Bob {}  head #{}",
        balance(&node_a, &alice.address())?,
        balance(&node_a, &bob.address())?,
        node_a.height()
    );
    println!();
    println!("{}", "Demo complete!".green().bold());
    Ok(())
}
