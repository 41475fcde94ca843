//! Node configuration file.
//!
//! A JSON object whose fields all have defaults, so an empty `{}` is a
//! valid (if keyless) configuration.

use powchain_chain::{ChainConfig, Genesis, MempoolConfig, TxOrdering};
use powchain_core::{Address, Amount, Keypair};
use powchain_p2p::NetworkConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("signer_private_key is not set")]
    MissingKey,

    #[error("invalid signer_private_key")]
    InvalidKey,

    #[error("invalid address '{0}' in balance_alloc")]
    InvalidAddress(String),

    #[error("unknown consensus '{0}' (only \"pow\" is supported)")]
    UnknownConsensus(String),

    #[error("invalid amount '{value}' for {field}")]
    InvalidAmount { field: String, value: String },

    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub consensus_difficulty: u32,
    pub consensus_name: String,
    /// The chain and state database lives in `<data_dir>/db`.
    pub data_dir: PathBuf,
    /// Decimal string.
    pub min_fee: String,
    pub rpc_addr: String,
    pub p2p_addr: String,
    pub peers: Vec<String>,
    pub block_time_secs: u64,
    /// 32-byte Ed25519 seed, hex encoded.
    pub signer_private_key: Option<String>,
    /// Address hex to decimal balance.
    pub balance_alloc: BTreeMap<String, String>,
    pub mine: bool,
    pub max_block_transactions: usize,
    pub tx_ordering: TxOrdering,
    pub max_reorg_depth: u64,
    pub peer_timeout_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            consensus_difficulty: 16,
            consensus_name: "pow".into(),
            data_dir: PathBuf::from("./data"),
            min_fee: "100".into(),
            rpc_addr: "127.0.0.1:1711".into(),
            p2p_addr: "127.0.0.1:6060".into(),
            peers: Vec::new(),
            block_time_secs: 4,
            signer_private_key: None,
            balance_alloc: BTreeMap::new(),
            mine: false,
            max_block_transactions: 1000,
            tx_ordering: TxOrdering::Fifo,
            max_reorg_depth: 64,
            peer_timeout_ms: 5000,
        }
    }
}

impl NodeConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.consensus_name != "pow" {
            return Err(ConfigError::UnknownConsensus(self.consensus_name.clone()));
        }
        self.min_fee()?;
        self.genesis()?;
        Ok(())
    }

    pub fn signer(&self) -> Result<Keypair> {
        let key = self.signer_private_key.as_deref().ok_or(ConfigError::MissingKey)?;
        Keypair::from_hex(key).map_err(|_| ConfigError::InvalidKey)
    }

    pub fn min_fee(&self) -> Result<Amount> {
        parse_amount("min_fee", &self.min_fee)
    }

    pub fn genesis(&self) -> Result<Genesis> {
        let alloc = self
            .balance_alloc
            .iter()
            .map(|(address, amount)| {
                let address = Address::from_hex(address)
                    .map_err(|_| ConfigError::InvalidAddress(address.clone()))?;
                let amount = parse_amount(&format!("balance_alloc[{address}]"), amount)?;
                Ok((address, amount))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Genesis::new(alloc))
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("db")
    }

    pub fn chain_config(&self) -> Result<ChainConfig> {
        Ok(ChainConfig {
            difficulty: self.consensus_difficulty,
            max_block_transactions: self.max_block_transactions,
            max_reorg_depth: self.max_reorg_depth,
            block_time: Duration::from_secs(self.block_time_secs),
            mempool: MempoolConfig {
                min_fee: self.min_fee()?,
                ordering: self.tx_ordering,
                ..MempoolConfig::default()
            },
        })
    }

    pub fn network_config(&self) -> NetworkConfig {
        NetworkConfig {
            listen_addr: self.p2p_addr.clone(),
            peers: self.peers.clone(),
            peer_timeout: Duration::from_millis(self.peer_timeout_ms),
            ..NetworkConfig::default()
        }
    }
}

fn parse_amount(field: &str, value: &str) -> Result<Amount> {
    value.trim().parse::<Amount>().map_err(|_| ConfigError::InvalidAmount {
        field: field.to_string(),
        value: value.to_string(),
    })
}
