//! Block validation rules.
//!
//! Checks run in a fixed order and the first failure wins: parent link,
//! number, hash, work, tx root, signatures, state application, timestamp.

use crate::pow::meets_target;
use powchain_core::{Address, Amount, Block, Hash};
use powchain_storage::{StateError, StateOverlay, StorageError, TxApplyError};
use std::collections::HashSet;
use thiserror::Error;

/// Reasons a block is rejected.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("parent hash mismatch (expected {expected}, got {got})")]
    BadParentLink { expected: Hash, got: Hash },

    #[error("block number mismatch (expected {expected}, got {got})")]
    NumberMismatch { expected: u64, got: u64 },

    #[error("carried hash does not match header (claimed {claimed}, derived {derived})")]
    HashMismatch { claimed: Hash, derived: Hash },

    #[error("hash {hash} does not satisfy difficulty {difficulty}")]
    InsufficientWork { hash: Hash, difficulty: u32 },

    #[error("transaction root mismatch")]
    BadTxRoot,

    #[error("transaction {index} repeats an earlier transaction")]
    DuplicateTransaction { index: usize },

    #[error("bad signature: {0}")]
    BadSignature(String),

    #[error("transaction {index}: insufficient balance for {address} (required {required}, available {available})")]
    InsufficientBalance {
        index: usize,
        address: Address,
        required: Amount,
        available: Amount,
    },

    #[error("transaction {index}: nonce mismatch for {address} (expected {expected}, got {got})")]
    NonceMismatch {
        index: usize,
        address: Address,
        expected: u64,
        got: u64,
    },

    #[error("timestamp {got} earlier than parent's {parent}")]
    StaleTimestamp { parent: u64, got: u64 },

    #[error("storage failure during validation: {0}")]
    Storage(#[from] StorageError),
}

impl ValidationError {
    /// Storage failures are node faults, not properties of the block.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ValidationError::Storage(_))
    }
}

impl From<TxApplyError> for ValidationError {
    fn from(err: TxApplyError) -> Self {
        let index = err.index;
        match err.source {
            StateError::NonceMismatch {
                address,
                expected,
                got,
            } => ValidationError::NonceMismatch {
                index,
                address,
                expected,
                got,
            },
            StateError::InsufficientBalance {
                address,
                required,
                available,
            } => ValidationError::InsufficientBalance {
                index,
                address,
                required,
                available,
            },
            StateError::Storage(e) => ValidationError::Storage(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, ValidationError>;

/// Block validator.
pub struct BlockValidator;

impl BlockValidator {
    /// Validate block extends the parent correctly.
    pub fn validate_extends_parent(block: &Block, parent: &Block) -> Result<()> {
        if block.header.parent_hash != parent.hash {
            return Err(ValidationError::BadParentLink {
                expected: parent.hash,
                got: block.header.parent_hash,
            });
        }
        let expected = parent.number() + 1;
        if block.number() != expected {
            return Err(ValidationError::NumberMismatch {
                expected,
                got: block.number(),
            });
        }
        Ok(())
    }

    /// Carried hash is the derived one and satisfies the declared difficulty.
    pub fn validate_work(block: &Block) -> Result<()> {
        let derived = block.header.hash();
        if block.hash != derived {
            return Err(ValidationError::HashMismatch {
                claimed: block.hash,
                derived,
            });
        }
        if !meets_target(&derived, block.header.difficulty) {
            return Err(ValidationError::InsufficientWork {
                hash: derived,
                difficulty: block.header.difficulty,
            });
        }
        Ok(())
    }

    /// The transaction list matches `tx_root` and holds no repeated hash.
    ///
    /// The merkle tree pairs an odd node with itself, so a list with its
    /// tail repeated yields the same root as the original list.
    pub fn validate_tx_root(block: &Block) -> Result<()> {
        let mut seen = HashSet::with_capacity(block.transactions.len());
        for (index, tx) in block.transactions.iter().enumerate() {
            if !seen.insert(tx.hash()) {
                return Err(ValidationError::DuplicateTransaction { index });
            }
        }
        if !block.verify_tx_root() {
            return Err(ValidationError::BadTxRoot);
        }
        Ok(())
    }

    /// Miner signature and every transaction signature.
    pub fn validate_signatures(block: &Block) -> Result<()> {
        block
            .verify_signature()
            .map_err(|e| ValidationError::BadSignature(format!("block: {e}")))?;
        for (index, tx) in block.transactions.iter().enumerate() {
            tx.verify()
                .map_err(|e| ValidationError::BadSignature(format!("transaction {index}: {e}")))?;
        }
        Ok(())
    }

    pub fn validate_timestamp(block: &Block, parent: &Block) -> Result<()> {
        if block.header.timestamp < parent.header.timestamp {
            return Err(ValidationError::StaleTimestamp {
                parent: parent.header.timestamp,
                got: block.header.timestamp,
            });
        }
        Ok(())
    }

    /// Every check that does not need state. Used for side-chain blocks.
    pub fn validate_header(block: &Block, parent: &Block) -> Result<()> {
        Self::validate_extends_parent(block, parent)?;
        Self::validate_work(block)?;
        Self::validate_tx_root(block)?;
        Self::validate_signatures(block)?;
        Self::validate_timestamp(block, parent)
    }

    /// Full validation against `state`, which must reflect the parent.
    ///
    /// On success the block's transactions are left applied in `state`;
    /// on failure `state` is exactly as it was.
    pub fn validate_and_apply(block: &Block, parent: &Block, state: &mut StateOverlay) -> Result<()> {
        Self::validate_extends_parent(block, parent)?;
        Self::validate_work(block)?;
        Self::validate_tx_root(block)?;
        Self::validate_signatures(block)?;

        let snapshot = state.snapshot();
        state.apply_transactions_atomically(&block.transactions, &block.header.miner)?;
        if let Err(e) = Self::validate_timestamp(block, parent) {
            state.revert_to_snapshot(snapshot);
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pow::{CancelToken, ProofOfWork};
    use powchain_core::{Account, Keypair, Transaction};
    use powchain_storage::{StateManager, Storage};

    struct Fixture {
        storage: Storage,
        genesis: Block,
        alice: Keypair,
        miner: Keypair,
    }

    fn setup() -> Fixture {
        let storage = Storage::open_temporary().unwrap();
        let alice = Keypair::generate();
        StateManager::new(&storage)
            .put_account(&alice.address(), &Account::with_balance(1000u32))
            .unwrap();
        Fixture {
            storage,
            genesis: Block::genesis(vec![]),
            alice,
            miner: Keypair::generate(),
        }
    }

    fn mine(f: &Fixture, txs: Vec<Transaction>) -> Block {
        ProofOfWork::new(4)
            .mine(&f.genesis, txs, vec![], &f.miner, &CancelToken::new())
            .block()
            .unwrap()
    }

    fn pay(f: &Fixture, value: u64, nonce: u64) -> Transaction {
        Transaction::transfer(f.alice.address(), Address([0xBB; 20]), value, 100u32, nonce)
            .signed(&f.alice)
    }

    /// Re-mine a block after mutating its header.
    fn remine(mut block: Block, miner: &Keypair) -> Block {
        block.header.nonce = 0;
        ProofOfWork::new(block.header.difficulty)
            .seal(block, miner, &CancelToken::new())
            .block()
            .unwrap()
    }

    #[test]
    fn test_valid_block_applies() {
        let f = setup();
        let block = mine(&f, vec![pay(&f, 500, 0)]);

        let mut overlay = StateOverlay::new(&f.storage);
        BlockValidator::validate_and_apply(&block, &f.genesis, &mut overlay).unwrap();

        let sender = overlay.get_account(&f.alice.address()).unwrap();
        assert_eq!(sender.balance, Amount::from(400u32));
        assert_eq!(sender.nonce, 1);
        assert_eq!(
            overlay.get_account(&f.miner.address()).unwrap().balance,
            Amount::from(100u32)
        );
    }

    #[test]
    fn test_bad_parent_link() {
        let f = setup();
        let block = mine(&f, vec![]);
        let other_parent = Block::genesis(b"other".to_vec());

        let result = BlockValidator::validate_header(&block, &other_parent);
        assert!(matches!(result, Err(ValidationError::BadParentLink { .. })));
    }

    #[test]
    fn test_number_mismatch() {
        let f = setup();
        let mut block = mine(&f, vec![]);
        block.header.number = 5;
        let block = remine(block, &f.miner);

        let result = BlockValidator::validate_header(&block, &f.genesis);
        assert!(matches!(
            result,
            Err(ValidationError::NumberMismatch { expected: 1, got: 5 })
        ));
    }

    #[test]
    fn test_hash_mismatch() {
        let f = setup();
        let mut block = mine(&f, vec![]);
        block.header.data = b"tampered".to_vec();

        let result = BlockValidator::validate_header(&block, &f.genesis);
        assert!(matches!(result, Err(ValidationError::HashMismatch { .. })));
    }

    #[test]
    fn test_insufficient_work() {
        let f = setup();
        let mut block = mine(&f, vec![]);
        // Claim far more work than was done, with a consistent carried hash.
        block.header.difficulty = 200;
        block.hash = block.header.hash();

        let result = BlockValidator::validate_work(&block);
        assert!(matches!(result, Err(ValidationError::InsufficientWork { .. })));
    }

    #[test]
    fn test_bad_tx_root() {
        let f = setup();
        let mut block = mine(&f, vec![pay(&f, 1, 0)]);
        block.transactions.clear();

        let result = BlockValidator::validate_header(&block, &f.genesis);
        assert!(matches!(result, Err(ValidationError::BadTxRoot)));
    }

    #[test]
    fn test_repeated_tail_transaction_rejected() {
        let f = setup();
        let block = mine(&f, vec![pay(&f, 1, 0), pay(&f, 1, 1), pay(&f, 1, 2)]);
        let mut forged = block.clone();
        forged.transactions.push(block.transactions[2].clone());

        // Same root, hash and signature as the genuine block.
        assert!(forged.verify_tx_root());
        assert_eq!(forged.header.hash(), block.hash);

        let result = BlockValidator::validate_header(&forged, &f.genesis);
        assert!(matches!(result, Err(ValidationError::DuplicateTransaction { index: 3 })));
        BlockValidator::validate_header(&block, &f.genesis).unwrap();
    }

    #[test]
    fn test_bad_block_signature() {
        let f = setup();
        let block = mine(&f, vec![]);
        let mut forged = block.clone();
        forged.signature = Some(f.alice.sign_record(block.hash.as_bytes()));

        let result = BlockValidator::validate_header(&forged, &f.genesis);
        assert!(matches!(result, Err(ValidationError::BadSignature(_))));
    }

    #[test]
    fn test_bad_transaction_signature() {
        let f = setup();
        let thief = Keypair::generate();
        let stolen = Transaction::transfer(f.alice.address(), thief.address(), 900u32, 0u32, 0)
            .signed(&thief);
        let block = mine(&f, vec![stolen]);

        let mut overlay = StateOverlay::new(&f.storage);
        let result = BlockValidator::validate_and_apply(&block, &f.genesis, &mut overlay);
        assert!(matches!(result, Err(ValidationError::BadSignature(_))));
        assert_eq!(overlay.dirty_len(), 0);
    }

    #[test]
    fn test_nonce_mismatch_later_in_block() {
        let f = setup();
        let block = mine(&f, vec![pay(&f, 10, 0), pay(&f, 10, 0)]);

        let mut overlay = StateOverlay::new(&f.storage);
        let result = BlockValidator::validate_and_apply(&block, &f.genesis, &mut overlay);
        assert!(matches!(
            result,
            Err(ValidationError::NonceMismatch { index: 1, expected: 1, got: 0, .. })
        ));
        assert_eq!(overlay.get_account(&f.alice.address()).unwrap().nonce, 0);
    }

    #[test]
    fn test_insufficient_balance() {
        let f = setup();
        let block = mine(&f, vec![pay(&f, 950, 0)]);

        let mut overlay = StateOverlay::new(&f.storage);
        let result = BlockValidator::validate_and_apply(&block, &f.genesis, &mut overlay);
        assert!(matches!(
            result,
            Err(ValidationError::InsufficientBalance { index: 0, .. })
        ));
    }

    #[test]
    fn test_stale_timestamp_reverts_state() {
        let f = setup();
        let mut parent = f.genesis.clone();
        parent.header.timestamp = u64::MAX;
        parent.hash = parent.header.hash();

        let mut block = ProofOfWork::new(4)
            .mine(&parent, vec![pay(&f, 1, 0)], vec![], &f.miner, &CancelToken::new())
            .block()
            .unwrap();
        block.header.timestamp = 10;
        let block = remine(block, &f.miner);

        let mut overlay = StateOverlay::new(&f.storage);
        let result = BlockValidator::validate_and_apply(&block, &parent, &mut overlay);
        assert!(matches!(result, Err(ValidationError::StaleTimestamp { .. })));
        assert_eq!(overlay.get_account(&f.alice.address()).unwrap().nonce, 0);
    }

    #[test]
    fn test_validation_leaves_store_untouched() {
        let f = setup();
        let block = mine(&f, vec![pay(&f, 500, 0)]);
        let root = StateManager::new(&f.storage).compute_state_root().unwrap();

        let mut overlay = StateOverlay::new(&f.storage);
        BlockValidator::validate_and_apply(&block, &f.genesis, &mut overlay).unwrap();
        drop(overlay);

        assert_eq!(StateManager::new(&f.storage).compute_state_root().unwrap(), root);
    }
}
