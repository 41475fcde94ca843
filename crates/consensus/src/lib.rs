//! Proof-of-work consensus for powchain.
//!
//! This crate provides:
//! - Difficulty targets and block work (`2^difficulty`)
//! - Cancellable nonce search producing signed blocks
//! - Block validation (links, work, tx root, signatures, state, timestamp)
//!
//! # Example
//!
//! ```rust,no_run
//! use powchain_consensus::{BlockValidator, CancelToken, MineOutcome, ProofOfWork};
//! use powchain_core::{Block, Keypair};
//! use powchain_storage::{StateOverlay, Storage};
//!
//! let storage = Storage::open_temporary().unwrap();
//! let genesis = Block::genesis(vec![]);
//! let miner = Keypair::generate();
//!
//! let pow = ProofOfWork::new(12);
//! if let MineOutcome::Mined(block) =
//!     pow.mine(&genesis, vec![], b"hello".to_vec(), &miner, &CancelToken::new())
//! {
//!     let mut state = StateOverlay::new(&storage);
//!     BlockValidator::validate_and_apply(&block, &genesis, &mut state).unwrap();
//! }
//! ```

pub mod pow;
pub mod validator;

// Re-export commonly used types
pub use pow::{meets_target, target, work, CancelToken, MineOutcome, ProofOfWork, CANCEL_POLL_INTERVAL};
pub use validator::{BlockValidator, ValidationError};
