//! Transaction mempool for pending transactions.
//!
//! The mempool stores signed transfers waiting to be included in a block.
//! Admission is checked against an account view of the current head;
//! transactions with future nonces are queued until the gap closes.

use crate::config::TxOrdering;
use powchain_core::{Address, Amount, Hash, Transaction};
use powchain_storage::{AccountView, StorageError};
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;
use thiserror::Error;

/// Errors that can occur during mempool operations.
#[derive(Debug, Error)]
pub enum MempoolError {
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("stale nonce (account nonce {expected}, got {got})")]
    StaleNonce { expected: u64, got: u64 },

    #[error("insufficient balance (required {required}, available {available})")]
    InsufficientBalance { required: Amount, available: Amount },

    #[error("fee too low (minimum {minimum}, got {got})")]
    FeeTooLow { minimum: Amount, got: Amount },

    #[error("transaction already in mempool")]
    Duplicate,

    #[error("mempool is full (capacity: {0})")]
    Full(usize),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, MempoolError>;

/// Configuration for the mempool.
#[derive(Debug, Clone)]
pub struct MempoolConfig {
    /// Maximum number of transactions in the mempool.
    pub max_transactions: usize,
    /// Maximum transactions per account.
    pub max_per_account: usize,
    /// Lowest fee accepted.
    pub min_fee: Amount,
    pub ordering: TxOrdering,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            max_transactions: 10_000,
            max_per_account: 100,
            min_fee: Amount::from(100u32),
            ordering: TxOrdering::Fifo,
        }
    }
}

#[derive(Debug, Clone)]
struct PoolEntry {
    tx: Transaction,
    seq: u64,
    arrived: Instant,
}

/// Transaction mempool.
pub struct Mempool {
    config: MempoolConfig,
    /// Transactions indexed by hash.
    entries: HashMap<Hash, PoolEntry>,
    /// Per-sender queues keyed by nonce.
    by_sender: HashMap<Address, BTreeMap<u64, Hash>>,
    next_seq: u64,
}

impl Mempool {
    /// Create a new mempool with default configuration.
    pub fn new() -> Self {
        Self::with_config(MempoolConfig::default())
    }

    pub fn with_config(config: MempoolConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
            by_sender: HashMap::new(),
            next_seq: 0,
        }
    }

    pub fn config(&self) -> &MempoolConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, tx_hash: &Hash) -> bool {
        self.entries.contains_key(tx_hash)
    }

    pub fn get(&self, tx_hash: &Hash) -> Option<&Transaction> {
        self.entries.get(tx_hash).map(|e| &e.tx)
    }

    /// Admit a transaction after checking it against `state`.
    ///
    /// Returns the transaction hash.
    pub fn submit(&mut self, tx: Transaction, state: &dyn AccountView) -> Result<Hash> {
        tx.verify()
            .map_err(|e| MempoolError::InvalidSignature(e.to_string()))?;

        if tx.fee < self.config.min_fee {
            return Err(MempoolError::FeeTooLow {
                minimum: self.config.min_fee.clone(),
                got: tx.fee.clone(),
            });
        }

        let account = state.account(&tx.from)?;
        if tx.nonce < account.nonce {
            return Err(MempoolError::StaleNonce {
                expected: account.nonce,
                got: tx.nonce,
            });
        }
        let cost = tx.cost();
        if !account.has_balance(&cost) {
            return Err(MempoolError::InsufficientBalance {
                required: cost,
                available: account.balance,
            });
        }

        let tx_hash = tx.hash();
        let queue = self.by_sender.get(&tx.from);
        if self.contains(&tx_hash) || queue.is_some_and(|q| q.contains_key(&tx.nonce)) {
            return Err(MempoolError::Duplicate);
        }
        if self.entries.len() >= self.config.max_transactions {
            return Err(MempoolError::Full(self.config.max_transactions));
        }
        if queue.is_some_and(|q| q.len() >= self.config.max_per_account) {
            return Err(MempoolError::Full(self.config.max_per_account));
        }

        self.by_sender
            .entry(tx.from)
            .or_default()
            .insert(tx.nonce, tx_hash);
        self.entries.insert(
            tx_hash,
            PoolEntry {
                tx,
                seq: self.next_seq,
                arrived: Instant::now(),
            },
        );
        self.next_seq += 1;
        Ok(tx_hash)
    }

    /// Up to `max_count` executable transactions in policy order.
    ///
    /// Only gap-free nonce runs starting at each sender's account nonce are
    /// offered, and a sender's transactions always appear in nonce order.
    /// Nothing is removed; see [`Mempool::evict`].
    pub fn drain(&self, max_count: usize, state: &dyn AccountView) -> Result<Vec<Transaction>> {
        // Ready runs per sender, front = next nonce.
        let mut runs: Vec<Vec<&PoolEntry>> = Vec::new();
        for (sender, queue) in &self.by_sender {
            let mut expected = state.account(sender)?.nonce;
            let mut run = Vec::new();
            for (nonce, hash) in queue.range(expected..) {
                if *nonce != expected {
                    break;
                }
                if let Some(entry) = self.entries.get(hash) {
                    run.push(entry);
                }
                expected += 1;
            }
            if !run.is_empty() {
                run.reverse();
                runs.push(run);
            }
        }

        let mut selected = Vec::new();
        while selected.len() < max_count {
            let best = runs
                .iter()
                .enumerate()
                .filter_map(|(i, run)| run.last().map(|head| (i, *head)))
                .min_by(|(_, a), (_, b)| self.priority(a, b));
            let Some((i, entry)) = best else {
                break;
            };
            selected.push(entry.tx.clone());
            runs[i].pop();
        }
        Ok(selected)
    }

    /// `Less` means `a` is offered before `b`.
    fn priority(&self, a: &PoolEntry, b: &PoolEntry) -> std::cmp::Ordering {
        match self.config.ordering {
            TxOrdering::Fifo => a.seq.cmp(&b.seq),
            TxOrdering::Fee => b.tx.fee.cmp(&a.tx.fee).then(a.seq.cmp(&b.seq)),
        }
    }

    fn remove(&mut self, tx_hash: &Hash) -> Option<Transaction> {
        let entry = self.entries.remove(tx_hash)?;
        let from = entry.tx.from;
        if let Some(queue) = self.by_sender.get_mut(&from) {
            queue.retain(|_, h| h != tx_hash);
            if queue.is_empty() {
                self.by_sender.remove(&from);
            }
        }
        Some(entry.tx)
    }

    /// Remove transactions included in an accepted block.
    pub fn evict(&mut self, included: &[Transaction]) -> usize {
        included
            .iter()
            .filter(|tx| self.remove(&tx.hash()).is_some())
            .count()
    }

    /// Remove every entry whose nonce is below its sender's account nonce.
    pub fn prune_invalidated(&mut self, state: &dyn AccountView) -> Result<usize> {
        let mut stale = Vec::new();
        for (sender, queue) in &self.by_sender {
            let nonce = state.account(sender)?.nonce;
            stale.extend(queue.range(..nonce).map(|(_, h)| *h));
        }
        for hash in &stale {
            self.remove(hash);
        }
        Ok(stale.len())
    }

    /// Get transactions from a specific sender, in nonce order.
    pub fn get_by_sender(&self, sender: &Address) -> Vec<Transaction> {
        self.by_sender
            .get(sender)
            .map(|queue| {
                queue
                    .values()
                    .filter_map(|h| self.entries.get(h).map(|e| e.tx.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Clear all transactions from the mempool.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.by_sender.clear();
    }

    pub fn stats(&self) -> MempoolStats {
        MempoolStats {
            total_transactions: self.len(),
            unique_senders: self.by_sender.len(),
            capacity: self.config.max_transactions,
            oldest_age_secs: self
                .entries
                .values()
                .map(|e| e.arrived.elapsed().as_secs())
                .max()
                .unwrap_or(0),
        }
    }
}

impl Default for Mempool {
    fn default() -> Self {
        Self::new()
    }
}

/// Mempool statistics.
#[derive(Debug, Clone)]
pub struct MempoolStats {
    pub total_transactions: usize,
    pub unique_senders: usize,
    pub capacity: usize,
    /// Age of the longest-waiting transaction.
    pub oldest_age_secs: u64,
}
