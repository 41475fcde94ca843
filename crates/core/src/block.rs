//! Block and block header structures.

use crate::crypto::{Address, CryptoError, Keypair, SignatureRecord};
use crate::hash::{canonical_encode, hash, Hash};
use crate::merkle::merkle_root;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// The header of a block. Its canonical encoding is what proof-of-work hashes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Block number (0 for genesis).
    pub number: u64,
    /// Hash of the parent block.
    pub parent_hash: Hash,
    /// Unix timestamp in seconds.
    pub timestamp: u64,
    /// Proof-of-work search variable.
    pub nonce: u64,
    /// Required number of leading zero bits in the block hash.
    pub difficulty: u32,
    /// Arbitrary payload chosen by the miner.
    pub data: Vec<u8>,
    /// Merkle root over the transaction hashes.
    pub tx_root: Hash,
    /// Address credited with the fees of this block.
    pub miner: Address,
}

impl BlockHeader {
    /// Canonical byte encoding of the header.
    pub fn encode(&self) -> Vec<u8> {
        canonical_encode(self)
    }

    /// Derived block hash.
    pub fn hash(&self) -> Hash {
        hash(&self.encode())
    }

    /// Current Unix timestamp.
    pub fn current_timestamp() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    }
}

/// A block: header, ordered transactions, the miner's signature and the
/// derived hash carried alongside so receivers can check it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
    /// Miner signature over the header hash (absent on genesis).
    pub signature: Option<SignatureRecord>,
    /// Derived hash of `header`, as claimed by the sender.
    pub hash: Hash,
}

impl Block {
    /// Create the genesis block. `data` is the allocation commitment.
    pub fn genesis(data: Vec<u8>) -> Self {
        let header = BlockHeader {
            number: 0,
            parent_hash: Hash::ZERO,
            timestamp: 0,
            nonce: 0,
            difficulty: 0,
            data,
            tx_root: Hash::ZERO,
            miner: Address::ZERO,
        };
        let hash = header.hash();
        Self {
            header,
            transactions: Vec::new(),
            signature: None,
            hash,
        }
    }

    /// Build an unsealed candidate on top of `parent`.
    ///
    /// The timestamp is never earlier than the parent's.
    pub fn candidate(
        parent: &Block,
        transactions: Vec<Transaction>,
        data: Vec<u8>,
        difficulty: u32,
        miner: Address,
    ) -> Self {
        let header = BlockHeader {
            number: parent.number() + 1,
            parent_hash: parent.hash,
            timestamp: BlockHeader::current_timestamp().max(parent.header.timestamp),
            nonce: 0,
            difficulty,
            data,
            tx_root: compute_tx_root(&transactions),
            miner,
        };
        let hash = header.hash();
        Self {
            header,
            transactions,
            signature: None,
            hash,
        }
    }

    pub fn number(&self) -> u64 {
        self.header.number
    }

    pub fn parent_hash(&self) -> Hash {
        self.header.parent_hash
    }

    pub fn is_genesis(&self) -> bool {
        self.header.number == 0 && self.header.parent_hash == Hash::ZERO
    }

    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }

    /// Fix the derived hash and sign it with the miner's key.
    pub fn seal(&mut self, keypair: &Keypair) {
        self.hash = self.header.hash();
        self.signature = Some(keypair.sign_record(self.hash.as_bytes()));
    }

    /// The carried hash matches the header.
    pub fn verify_hash(&self) -> bool {
        self.hash == self.header.hash()
    }

    /// The header's tx root commits to exactly these transactions.
    pub fn verify_tx_root(&self) -> bool {
        compute_tx_root(&self.transactions) == self.header.tx_root
    }

    /// The block was signed by the key behind `header.miner`.
    pub fn verify_signature(&self) -> Result<(), CryptoError> {
        let record = self
            .signature
            .as_ref()
            .ok_or(CryptoError::VerificationFailed)?;
        record.verify_for(&self.header.miner, self.header.hash().as_bytes())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        canonical_encode(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}

/// Merkle commitment over a transaction list.
pub fn compute_tx_root(transactions: &[Transaction]) -> Hash {
    let hashes: Vec<Hash> = transactions.iter().map(Transaction::hash).collect();
    merkle_root(&hashes)
}
