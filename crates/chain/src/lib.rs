//! Chain management for powchain.
//!
//! This crate turns the core, storage and consensus pieces into a running
//! chain:
//! - **Blockchain**: block import, fork choice and reorganisation
//! - **Mempool**: pending transactions with nonce and balance pre-checks
//! - **Miner**: background block production
//! - **Genesis**: the initial allocation every node must agree on
//!
//! # Example
//!
//! ```rust,no_run
//! use powchain_chain::{Blockchain, ChainConfig, Genesis, Origin};
//! use powchain_consensus::CancelToken;
//! use powchain_core::{Keypair, Transaction};
//! use powchain_storage::Storage;
//!
//! let alice = Keypair::generate();
//! let genesis = Genesis::new([(alice.address(), 1_000u64.into())]);
//! let storage = Storage::open("./powchain_data").unwrap();
//! let chain = Blockchain::open(storage, ChainConfig::default(), genesis).unwrap();
//!
//! let tx = Transaction::transfer(alice.address(), Keypair::generate().address(), 500u64, 100u64, 0)
//!     .signed(&alice);
//! chain.submit_transaction(tx, Origin::Local).unwrap();
//!
//! let txs = chain.pending_transactions(100).unwrap();
//! chain.add_block(Vec::new(), txs, &CancelToken::new(), &alice).unwrap();
//! ```

pub mod blockchain;
pub mod config;
pub mod genesis;
pub mod index;
pub mod mempool;
pub mod miner;

pub use blockchain::{
    Blockchain, Broadcast, ChainError, ChainStats, ImportOutcome, Origin, Result,
    MAX_BLOCKS_PER_RANGE,
};
pub use config::{ChainConfig, TxOrdering};
pub use genesis::Genesis;
pub use index::{BlockIndex, IndexNode};
pub use mempool::{Mempool, MempoolConfig, MempoolError, MempoolStats};
pub use miner::MiningLoop;
