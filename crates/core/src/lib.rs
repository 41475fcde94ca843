//! Core ledger primitives for powchain.
//!
//! This crate provides the fundamental types used throughout the node:
//! - Cryptographic primitives (hashing, signing, addresses)
//! - Account state
//! - Transactions
//! - Blocks and block headers
//! - Merkle roots

pub mod account;
pub mod block;
pub mod crypto;
pub mod hash;
pub mod merkle;
pub mod transaction;

// Re-export commonly used types at the crate root
pub use account::{Account, Amount};
pub use block::{compute_tx_root, Block, BlockHeader};
pub use crypto::{Address, CryptoError, Keypair, PublicKey, Signature, SignatureRecord};
pub use hash::{canonical_encode, hash, hash_concat, Hash, H256};
pub use merkle::merkle_root;
pub use transaction::Transaction;
