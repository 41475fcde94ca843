//! Proof-of-work: targets, work and the cancellable nonce search.

use num_bigint::BigUint;
use num_traits::One;
use powchain_core::{Block, BlockHeader, Hash, Keypair, Transaction};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Number of hash attempts between cancellation checks.
pub const CANCEL_POLL_INTERVAL: u64 = 256;

/// Largest meaningful difficulty: a 256-bit hash has at most 256 zero bits.
pub const MAX_DIFFICULTY: u32 = 256;

/// Target for `difficulty` leading zero bits: `2^(256 - difficulty)`.
pub fn target(difficulty: u32) -> BigUint {
    BigUint::one() << (MAX_DIFFICULTY - difficulty.min(MAX_DIFFICULTY))
}

/// Expected work of a block at `difficulty`: `2^difficulty`.
pub fn work(difficulty: u32) -> BigUint {
    BigUint::one() << difficulty.min(MAX_DIFFICULTY)
}

/// Whether `hash`, read as a big-endian integer, is below the target.
pub fn meets_target(hash: &Hash, difficulty: u32) -> bool {
    difficulty <= MAX_DIFFICULTY && hash.to_biguint() < target(difficulty)
}

/// Shared cancellation flag for an in-flight mining attempt.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of a mining attempt. Cancellation is an outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MineOutcome {
    Mined(Block),
    Cancelled,
}

impl MineOutcome {
    pub fn block(self) -> Option<Block> {
        match self {
            MineOutcome::Mined(block) => Some(block),
            MineOutcome::Cancelled => None,
        }
    }
}

/// Nonce search at a fixed difficulty.
#[derive(Debug, Clone, Copy)]
pub struct ProofOfWork {
    difficulty: u32,
}

impl ProofOfWork {
    pub fn new(difficulty: u32) -> Self {
        Self {
            difficulty: difficulty.min(MAX_DIFFICULTY),
        }
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    /// Build a block on `parent` and search for a nonce that satisfies the
    /// target. The found block is signed by `keypair`, whose address is the
    /// fee beneficiary.
    pub fn mine(
        &self,
        parent: &Block,
        transactions: Vec<Transaction>,
        data: Vec<u8>,
        keypair: &Keypair,
        cancel: &CancelToken,
    ) -> MineOutcome {
        let candidate = Block::candidate(
            parent,
            transactions,
            data,
            self.difficulty,
            keypair.address(),
        );
        self.seal(candidate, keypair, cancel)
    }

    /// Search the nonce space of an already assembled candidate.
    ///
    /// If every nonce is tried without success the timestamp is refreshed
    /// and the search starts over.
    pub fn seal(&self, mut block: Block, keypair: &Keypair, cancel: &CancelToken) -> MineOutcome {
        let mut attempts: u64 = 0;
        loop {
            let mut nonce: u64 = 0;
            loop {
                if attempts % CANCEL_POLL_INTERVAL == 0 && cancel.is_cancelled() {
                    debug!(number = block.number(), attempts, "Mining cancelled");
                    return MineOutcome::Cancelled;
                }
                attempts = attempts.wrapping_add(1);

                block.header.nonce = nonce;
                let hash = block.header.hash();
                if meets_target(&hash, self.difficulty) {
                    block.seal(keypair);
                    debug!(number = block.number(), nonce, attempts, "Found nonce");
                    return MineOutcome::Mined(block);
                }

                match nonce.checked_add(1) {
                    Some(next) => nonce = next,
                    None => break,
                }
            }
            block.header.timestamp =
                BlockHeader::current_timestamp().max(block.header.timestamp.saturating_add(1));
        }
    }
}
