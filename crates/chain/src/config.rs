//! Chain manager configuration.

use crate::mempool::MempoolConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Order in which pooled transactions are offered for block assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxOrdering {
    /// Arrival order.
    #[default]
    Fifo,
    /// Highest fee first, arrival order among equal fees.
    Fee,
}

impl FromStr for TxOrdering {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fifo" => Ok(TxOrdering::Fifo),
            "fee" => Ok(TxOrdering::Fee),
            other => Err(format!("unknown tx ordering '{other}' (expected fifo or fee)")),
        }
    }
}

impl fmt::Display for TxOrdering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxOrdering::Fifo => write!(f, "fifo"),
            TxOrdering::Fee => write!(f, "fee"),
        }
    }
}

/// Blockchain configuration.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// Leading zero bits required of locally mined blocks.
    pub difficulty: u32,
    /// Maximum transactions per mined block.
    pub max_block_transactions: usize,
    /// Deepest reorganisation the node will perform.
    pub max_reorg_depth: u64,
    /// Pause between locally mined blocks.
    pub block_time: Duration,
    pub mempool: MempoolConfig,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            difficulty: 16,
            max_block_transactions: 1000,
            max_reorg_depth: 64,
            block_time: Duration::from_secs(4),
            mempool: MempoolConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_ordering_parse() {
        assert_eq!("fifo".parse::<TxOrdering>().unwrap(), TxOrdering::Fifo);
        assert_eq!("FEE".parse::<TxOrdering>().unwrap(), TxOrdering::Fee);
        assert!("lifo".parse::<TxOrdering>().is_err());
        assert_eq!(TxOrdering::Fee.to_string(), "fee");
    }

    #[test]
    fn test_defaults() {
        let config = ChainConfig::default();
        assert_eq!(config.difficulty, 16);
        assert_eq!(config.max_reorg_depth, 64);
        assert_eq!(config.mempool.ordering, TxOrdering::Fifo);
    }
}
