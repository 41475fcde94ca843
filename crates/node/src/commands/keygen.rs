//! Generate a signing key.

use crate::config::NodeConfig;
use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;
use powchain_core::Keypair;
use std::path::PathBuf;

#[derive(Args)]
pub struct KeygenArgs {
    /// Also write a node config using the new key, funding its address
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Genesis balance given to the new address in the written config
    #[arg(long, default_value = "1000000")]
    balance: String,
}

pub fn run(args: KeygenArgs) -> Result<()> {
    let keypair = Keypair::generate();
    let private_key = hex::encode(keypair.private_key());

    println!("{}", "Generated keypair".bold().cyan());
    println!("  Address:     {}", keypair.address().to_hex().bright_yellow());
    println!("  Public key:  {}", hex::encode(keypair.public_key.as_bytes()));
    println!("  Private key: {}", private_key.bright_black());

    if let Some(path) = args.output {
        if path.exists() {
            bail!("refusing to overwrite {}", path.display());
        }
        let mut config = NodeConfig {
            signer_private_key: Some(private_key),
            ..NodeConfig::default()
        };
        config
            .balance_alloc
            .insert(keypair.address().to_hex(), args.balance);
        config.validate()?;
        config.save(&path)?;
        println!();
        println!(
            "{}  Saved config to: {}",
            "✓".green().bold(),
            path.display().to_string().bright_black()
        );
    }
    Ok(())
}
