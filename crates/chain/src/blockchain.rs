//! Main blockchain orchestration.
//!
//! Every block, mined locally or received from a peer, goes through
//! [`Blockchain::import_block`]: validate, apply state, persist, advance
//! the head and maintain the mempool under the chain lock, then cancel
//! in-flight mining and rebroadcast.
//!
//! The first storage failure halts the chain: it is logged once and handed
//! to the hook registered with [`Blockchain::on_halt`].

use crate::config::ChainConfig;
use crate::genesis::Genesis;
use crate::index::BlockIndex;
use crate::mempool::{Mempool, MempoolError, MempoolStats};
use num_bigint::BigUint;
use parking_lot::{Mutex, RwLock};
use powchain_consensus::{BlockValidator, CancelToken, MineOutcome, ProofOfWork, ValidationError};
use powchain_core::{Account, Address, Block, Hash, Keypair, Transaction};
use powchain_storage::{
    BatchOp, ChainStore, StateError, StateManager, StateOverlay, Storage, StorageError,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Most blocks returned by a single range query.
pub const MAX_BLOCKS_PER_RANGE: u64 = 256;

/// Errors that can occur during blockchain operations.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("invalid block: {0}")]
    Invalid(ValidationError),

    #[error("transaction rejected: {0}")]
    Mempool(MempoolError),

    #[error("unknown parent {parent} for block {number}")]
    MissingParent { parent: Hash, number: u64 },

    #[error("reorg depth {depth} exceeds maximum {max}")]
    ReorgTooDeep { depth: u64, max: u64 },

    #[error("genesis mismatch (expected {expected}, found {found})")]
    GenesisMismatch { expected: Hash, found: Hash },

    #[error("invalid chain state: {0}")]
    InvalidChainState(String),
}

impl ChainError {
    /// Errors the node cannot continue after.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ChainError::Storage(_) | ChainError::InvalidChainState(_))
    }
}

impl From<ValidationError> for ChainError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::Storage(e) => ChainError::Storage(e),
            other => ChainError::Invalid(other),
        }
    }
}

impl From<MempoolError> for ChainError {
    fn from(err: MempoolError) -> Self {
        match err {
            MempoolError::Storage(e) => ChainError::Storage(e),
            other => ChainError::Mempool(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, ChainError>;

/// Where a block or transaction came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Local,
    /// A peer, identified by its listen address.
    Peer(String),
}

impl Origin {
    pub fn peer(&self) -> Option<&str> {
        match self {
            Origin::Local => None,
            Origin::Peer(addr) => Some(addr.as_str()),
        }
    }
}

/// Outbound gossip. Implemented by the peer layer.
pub trait Broadcast: Send + Sync {
    /// Send `block` to every peer except `exclude`.
    fn broadcast_block(&self, block: &Block, exclude: Option<&str>);
    /// Send `tx` to every peer except `exclude`.
    fn broadcast_transaction(&self, tx: &Transaction, exclude: Option<&str>);
}

/// What importing a block did to the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    AlreadyKnown,
    /// The block extended the current head.
    Extended,
    /// Stored on a branch that does not beat the head.
    SideChain,
    /// The block's branch replaced the head's.
    Reorganized {
        depth: u64,
        reverted: usize,
        applied: usize,
    },
}

impl ImportOutcome {
    pub fn head_changed(&self) -> bool {
        matches!(
            self,
            ImportOutcome::Extended | ImportOutcome::Reorganized { .. }
        )
    }
}

struct ChainInner {
    index: BlockIndex,
    head: Block,
}

type HaltHook = Box<dyn Fn(&ChainError) + Send + Sync>;

/// Blocks that joined and left the canonical chain in one head change.
struct HeadChange {
    outcome: ImportOutcome,
    applied: Vec<Block>,
    reverted: Vec<Block>,
}

/// Main blockchain struct that orchestrates all components.
pub struct Blockchain {
    storage: Storage,
    config: ChainConfig,
    genesis: Genesis,
    genesis_hash: Hash,
    pow: ProofOfWork,
    inner: Mutex<ChainInner>,
    mempool: Mutex<Mempool>,
    /// Token of the mining attempt to cancel on the next head change.
    mining: Mutex<Option<CancelToken>>,
    broadcaster: RwLock<Option<Arc<dyn Broadcast>>>,
    halted: AtomicBool,
    halt_hook: RwLock<Option<HaltHook>>,
}

impl Blockchain {
    /// Open the chain in `storage`, creating genesis on first start.
    ///
    /// An existing chain must have been created from the same allocation.
    /// A state rebuild interrupted by a crash is finished before returning.
    pub fn open(storage: Storage, config: ChainConfig, genesis: Genesis) -> Result<Self> {
        let chain = ChainStore::new(&storage);
        let genesis_block = genesis.block();

        if chain.is_initialized()? {
            let found = chain
                .canonical_hash(0)?
                .ok_or_else(|| ChainError::InvalidChainState("missing genesis block".into()))?;
            if found != genesis_block.hash {
                return Err(ChainError::GenesisMismatch {
                    expected: genesis_block.hash,
                    found,
                });
            }
        } else {
            let accounts = genesis.accounts();
            let ops = accounts
                .iter()
                .map(|(address, account)| BatchOp::put(Storage::account_key(address), account))
                .collect::<powchain_storage::Result<Vec<_>>>()?;
            chain.init_genesis(&genesis_block, ops)?;
            info!(hash = %genesis_block.hash, accounts = accounts.len(), "Initialized genesis");
        }

        let (index, orphans) = BlockIndex::rebuild(chain.all_blocks()?);
        if !orphans.is_empty() {
            warn!(count = orphans.len(), "Stored blocks with unknown ancestry ignored");
        }
        let head = chain
            .get_latest_block()?
            .ok_or_else(|| ChainError::InvalidChainState("missing head block".into()))?;
        if !index.contains(&head.hash) {
            return Err(ChainError::InvalidChainState(format!(
                "head {} not reachable from genesis",
                head.hash
            )));
        }
        info!(number = head.number(), hash = %head.hash, blocks = index.len(), "Chain loaded");
        let reindex_pending = chain.reindex_pending()?;

        let pow = ProofOfWork::new(config.difficulty);
        let mempool = Mempool::with_config(config.mempool.clone());
        let blockchain = Self {
            storage,
            config,
            genesis,
            genesis_hash: genesis_block.hash,
            pow,
            inner: Mutex::new(ChainInner { index, head }),
            mempool: Mutex::new(mempool),
            mining: Mutex::new(None),
            broadcaster: RwLock::new(None),
            halted: AtomicBool::new(false),
            halt_hook: RwLock::new(None),
        };

        if reindex_pending {
            warn!("Previous state rebuild did not finish; rebuilding again");
            blockchain.rebuild_state()?;
        }
        Ok(blockchain)
    }

    pub fn set_broadcaster(&self, broadcaster: Arc<dyn Broadcast>) {
        *self.broadcaster.write() = Some(broadcaster);
    }

    /// Register `hook` to run once, with the first fatal error.
    ///
    /// The hook may run while chain locks are held and must not call back
    /// into the chain.
    pub fn on_halt(&self, hook: impl Fn(&ChainError) + Send + Sync + 'static) {
        *self.halt_hook.write() = Some(Box::new(hook));
    }

    /// Whether a fatal error has been seen.
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Pass `result` through, halting the chain if it holds a fatal error.
    fn guard<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.is_fatal() && !self.halted.swap(true, Ordering::SeqCst) {
                error!(error = %e, "Fatal chain error; halting");
                if let Some(hook) = self.halt_hook.read().as_ref() {
                    hook(e);
                }
            }
        }
        result
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn genesis_hash(&self) -> Hash {
        self.genesis_hash
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn current_head(&self) -> Block {
        self.inner.lock().head.clone()
    }

    pub fn height(&self) -> u64 {
        self.inner.lock().head.number()
    }

    /// Whether the block is known, on any branch.
    pub fn has_block(&self, hash: &Hash) -> bool {
        self.inner.lock().index.contains(hash)
    }

    pub fn get_block_by_hash(&self, hash: &Hash) -> Result<Option<Block>> {
        self.guard(ChainStore::new(&self.storage).get_block_by_hash(hash).map_err(Into::into))
    }

    /// Canonical block at `number`.
    pub fn get_block_by_number(&self, number: u64) -> Result<Option<Block>> {
        self.guard(ChainStore::new(&self.storage).get_block_by_number(number).map_err(Into::into))
    }

    /// Canonical blocks in `[from, to]`, clipped to the head and to
    /// [`MAX_BLOCKS_PER_RANGE`].
    pub fn blocks_range(&self, from: u64, to: u64) -> Result<Vec<Block>> {
        let head = self.height();
        let to = to
            .min(head)
            .min(from.saturating_add(MAX_BLOCKS_PER_RANGE - 1));
        if from > to {
            return Ok(Vec::new());
        }
        self.guard(ChainStore::new(&self.storage).get_blocks_range(from, to).map_err(Into::into))
    }

    /// Account state at the current head.
    pub fn account(&self, address: &Address) -> Result<Account> {
        self.guard(StateManager::new(&self.storage).get_account(address).map_err(Into::into))
    }

    pub fn state_root(&self) -> Result<Hash> {
        self.guard(StateManager::new(&self.storage).compute_state_root().map_err(Into::into))
    }

    /// Executable pooled transactions in policy order, left in the pool.
    pub fn pending_transactions(&self, max_count: usize) -> Result<Vec<Transaction>> {
        let _inner = self.inner.lock();
        let state = StateManager::new(&self.storage);
        let drained = self.mempool.lock().drain(max_count, &state);
        self.guard(drained.map_err(Into::into))
    }

    pub fn mempool_len(&self) -> usize {
        self.mempool.lock().len()
    }

    pub fn stats(&self) -> ChainStats {
        let (head, total_work, known_blocks) = {
            let inner = self.inner.lock();
            let total_work = inner
                .index
                .get(&inner.head.hash)
                .map(|node| node.total_work.clone())
                .unwrap_or_default();
            (inner.head.clone(), total_work, inner.index.len())
        };
        ChainStats {
            height: head.number(),
            head_hash: head.hash,
            head_timestamp: head.header.timestamp,
            total_work,
            known_blocks,
            mempool: self.mempool.lock().stats(),
        }
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Pre-check and pool a transaction, then gossip it.
    pub fn submit_transaction(&self, tx: Transaction, origin: Origin) -> Result<Hash> {
        let submitted = {
            let _inner = self.inner.lock();
            let state = StateManager::new(&self.storage);
            self.mempool.lock().submit(tx.clone(), &state)
        };
        let hash = self.guard(submitted.map_err(Into::into))?;
        debug!(tx = %hash.short(), from = %tx.from, nonce = tx.nonce, "Transaction pooled");
        if let Some(broadcaster) = self.broadcaster.read().as_ref() {
            broadcaster.broadcast_transaction(&tx, origin.peer());
        }
        Ok(hash)
    }

    // =========================================================================
    // Mining
    // =========================================================================

    /// Mine a block on the current head and import it.
    ///
    /// Transactions that would not apply on top of the head are dropped.
    /// A head change while mining cancels `cancel`, yielding
    /// [`MineOutcome::Cancelled`].
    pub fn add_block(
        &self,
        data: Vec<u8>,
        transactions: Vec<Transaction>,
        cancel: &CancelToken,
        signer: &Keypair,
    ) -> Result<MineOutcome> {
        *self.mining.lock() = Some(cancel.clone());

        let (parent, transactions) = {
            let inner = self.inner.lock();
            let selected = self.guard(self.select_applicable(transactions, &signer.address()))?;
            (inner.head.clone(), selected)
        };

        match self.pow.mine(&parent, transactions, data, signer, cancel) {
            MineOutcome::Cancelled => Ok(MineOutcome::Cancelled),
            MineOutcome::Mined(block) => {
                let outcome = self.import_block(block.clone(), Origin::Local)?;
                info!(
                    number = block.number(),
                    hash = %block.hash,
                    txs = block.tx_count(),
                    ?outcome,
                    "Mined block"
                );
                Ok(MineOutcome::Mined(block))
            }
        }
    }

    /// Keep the transactions that apply, in order, on the committed state.
    fn select_applicable(
        &self,
        transactions: Vec<Transaction>,
        miner: &Address,
    ) -> Result<Vec<Transaction>> {
        let mut overlay = StateOverlay::new(&self.storage);
        let mut selected = Vec::new();
        for tx in transactions {
            if selected.len() >= self.config.max_block_transactions {
                break;
            }
            if let Err(e) = tx.verify() {
                warn!(tx = %tx.hash().short(), error = %e, "Dropping unsigned transaction");
                continue;
            }
            match overlay.apply_transaction(&tx, miner) {
                Ok(()) => selected.push(tx),
                Err(StateError::Storage(e)) => return Err(e.into()),
                Err(e) => debug!(tx = %tx.hash().short(), error = %e, "Skipping transaction"),
            }
        }
        Ok(selected)
    }

    /// Cancel the registered mining attempt, if any.
    pub fn cancel_mining(&self) {
        if let Some(token) = self.mining.lock().take() {
            token.cancel();
        }
    }

    // =========================================================================
    // Block Import
    // =========================================================================

    /// Validate and accept a block.
    ///
    /// Rejected blocks leave chain, state and mempool untouched.
    pub fn import_block(&self, block: Block, origin: Origin) -> Result<ImportOutcome> {
        let outcome = match self.guard(self.accept(&block)) {
            Ok(outcome) => outcome,
            Err(e) => {
                match &e {
                    ChainError::MissingParent { .. } => {
                        debug!(number = block.number(), hash = %block.hash, "Block with unknown parent")
                    }
                    e if e.is_fatal() => error!(hash = %block.hash, error = %e, "Block import failed"),
                    e => warn!(number = block.number(), hash = %block.hash, error = %e, "Rejected block"),
                }
                return Err(e);
            }
        };

        if outcome.head_changed() {
            self.cancel_mining();
            if let Some(broadcaster) = self.broadcaster.read().as_ref() {
                broadcaster.broadcast_block(&block, origin.peer());
            }
        }
        Ok(outcome)
    }

    /// Import under the chain lock, updating the mempool before releasing it.
    fn accept(&self, block: &Block) -> Result<ImportOutcome> {
        let mut inner = self.inner.lock();
        let change = self.import_locked(&mut inner, block)?;
        if change.outcome.head_changed() {
            self.maintain_mempool(&change.applied, &change.reverted)?;
        }
        Ok(change.outcome)
    }

    fn import_locked(&self, inner: &mut ChainInner, block: &Block) -> Result<HeadChange> {
        let unchanged = |outcome| HeadChange {
            outcome,
            applied: Vec::new(),
            reverted: Vec::new(),
        };

        if inner.index.contains(&block.hash) {
            return Ok(unchanged(ImportOutcome::AlreadyKnown));
        }
        if block.number() == 0 {
            return Err(ChainError::GenesisMismatch {
                expected: self.genesis_hash,
                found: block.hash,
            });
        }
        let parent_idx = inner
            .index
            .position(&block.parent_hash())
            .ok_or(ChainError::MissingParent {
                parent: block.parent_hash(),
                number: block.number(),
            })?;
        let parent = self.load_block(&block.parent_hash())?;

        if parent.hash == inner.head.hash {
            self.extend(inner, block, &parent)?;
            info!(number = block.number(), hash = %block.hash, txs = block.tx_count(), "Accepted block");
            return Ok(HeadChange {
                outcome: ImportOutcome::Extended,
                applied: vec![block.clone()],
                reverted: Vec::new(),
            });
        }

        BlockValidator::validate_header(block, &parent)?;
        let (ancestor, depth) = self.fork_point(inner, &parent, parent_idx)?;
        let total_work = inner.index.child_work(parent_idx, block.header.difficulty);
        let head_node = inner
            .index
            .get(&inner.head.hash)
            .ok_or_else(|| ChainError::InvalidChainState("head not indexed".into()))?;

        if BlockIndex::is_better(block.number(), &total_work, head_node) {
            self.reorganize(inner, block, parent_idx, ancestor, depth)
        } else {
            ChainStore::new(&self.storage).put_block(block)?;
            inner.index.insert(block);
            info!(number = block.number(), hash = %block.hash, "Stored side-chain block");
            Ok(unchanged(ImportOutcome::SideChain))
        }
    }

    /// Common ancestor of `parent` and the head, and how many head blocks
    /// lie above it.
    ///
    /// Fails with [`ChainError::ReorgTooDeep`] when a branch through
    /// `parent` could never be adopted.
    fn fork_point(&self, inner: &ChainInner, parent: &Block, parent_idx: usize) -> Result<(usize, u64)> {
        let max = self.config.max_reorg_depth;
        let head_number = inner.head.number();
        // The ancestor is at or below the parent.
        let shallowest = head_number.saturating_sub(parent.number());
        if shallowest > max {
            return Err(ChainError::ReorgTooDeep {
                depth: shallowest,
                max,
            });
        }

        let head_idx = inner
            .index
            .position(&inner.head.hash)
            .ok_or_else(|| ChainError::InvalidChainState("head not indexed".into()))?;
        let ancestor = inner
            .index
            .common_ancestor(parent_idx, head_idx)
            .ok_or_else(|| ChainError::InvalidChainState("branches share no ancestor".into()))?;
        let depth = head_number - inner.index.node(ancestor).number;
        if depth > max {
            return Err(ChainError::ReorgTooDeep { depth, max });
        }
        Ok((ancestor, depth))
    }

    fn load_block(&self, hash: &Hash) -> Result<Block> {
        ChainStore::new(&self.storage)
            .get_block_by_hash(hash)?
            .ok_or_else(|| ChainError::InvalidChainState(format!("indexed block {hash} not stored")))
    }

    /// Validate `block` against `parent` and stage it as canonical.
    fn connect(&self, overlay: &mut StateOverlay, parent: &Block, block: &Block) -> Result<Vec<BatchOp>> {
        let snapshot = overlay.snapshot();
        BlockValidator::validate_and_apply(block, parent, overlay)?;
        let undo = overlay.undo_since(snapshot, block.hash)?;
        Ok(vec![
            ChainStore::block_op(block)?,
            ChainStore::canonical_op(block.number(), &block.hash)?,
            ChainStore::undo_op(&undo)?,
        ])
    }

    fn extend(&self, inner: &mut ChainInner, block: &Block, parent: &Block) -> Result<()> {
        let mut overlay = StateOverlay::new(&self.storage);
        let mut ops = self.connect(&mut overlay, parent, block)?;
        ops.extend(overlay.into_ops()?);
        ops.extend(ChainStore::head_ops(&block.hash, block.number())?);
        self.storage.batch(ops)?;

        inner.index.insert(block);
        inner.head = block.clone();
        Ok(())
    }

    /// Switch the canonical chain to the branch ending in `tip`.
    ///
    /// Everything is staged in one overlay and committed in one batch; any
    /// failure leaves the chain as it was.
    fn reorganize(
        &self,
        inner: &mut ChainInner,
        tip: &Block,
        parent_idx: usize,
        ancestor: usize,
        depth: u64,
    ) -> Result<HeadChange> {
        let head_idx = inner
            .index
            .position(&inner.head.hash)
            .ok_or_else(|| ChainError::InvalidChainState("head not indexed".into()))?;

        let chain = ChainStore::new(&self.storage);
        let mut overlay = StateOverlay::new(&self.storage);
        let mut ops = Vec::new();

        let mut reverted = Vec::new();
        for hash in inner.index.branch(ancestor, head_idx).iter().rev() {
            let undo = chain
                .get_undo(hash)?
                .ok_or_else(|| ChainError::InvalidChainState(format!("missing undo record for {hash}")))?;
            overlay.apply_undo(&undo);
            let block = self.load_block(hash)?;
            ops.push(ChainStore::uncanonical_op(block.number()));
            reverted.push(block);
        }

        let mut applied = Vec::new();
        let mut prev = self.load_block(&inner.index.node(ancestor).hash)?;
        for hash in inner.index.branch(ancestor, parent_idx) {
            let block = self.load_block(&hash)?;
            ops.extend(self.connect(&mut overlay, &prev, &block)?);
            applied.push(block.clone());
            prev = block;
        }
        ops.extend(self.connect(&mut overlay, &prev, tip)?);
        applied.push(tip.clone());

        ops.extend(overlay.into_ops()?);
        ops.extend(ChainStore::head_ops(&tip.hash, tip.number())?);
        self.storage.batch(ops)?;

        inner.index.insert(tip);
        inner.head = tip.clone();

        info!(
            depth,
            reverted = reverted.len(),
            applied = applied.len(),
            head = %tip.hash,
            number = tip.number(),
            "Chain reorganized"
        );
        Ok(HeadChange {
            outcome: ImportOutcome::Reorganized {
                depth,
                reverted: reverted.len(),
                applied: applied.len(),
            },
            applied,
            reverted,
        })
    }

    /// Evict included transactions, return reverted ones to the pool and
    /// drop anything the new state made stale.
    fn maintain_mempool(&self, applied: &[Block], reverted: &[Block]) -> Result<()> {
        let state = StateManager::new(&self.storage);
        let mut mempool = self.mempool.lock();

        let mut included = HashSet::new();
        for block in applied {
            mempool.evict(&block.transactions);
            included.extend(block.transactions.iter().map(Transaction::hash));
        }

        let mut resubmitted = 0;
        for tx in reverted.iter().flat_map(|b| &b.transactions) {
            if included.contains(&tx.hash()) {
                continue;
            }
            match mempool.submit(tx.clone(), &state) {
                Ok(_) => resubmitted += 1,
                Err(MempoolError::Storage(e)) => return Err(e.into()),
                Err(_) => {}
            }
        }

        let pruned = mempool.prune_invalidated(&state)?;
        if resubmitted > 0 || pruned > 0 {
            debug!(resubmitted, pruned, pending = mempool.len(), "Mempool updated");
        }
        Ok(())
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Rebuild account state by replaying the canonical chain from genesis.
    ///
    /// Returns the resulting state root. A marker key is held from the
    /// wipe until the last block is replayed, so a crash in between is
    /// finished by the next [`Blockchain::open`].
    pub fn rebuild_state(&self) -> Result<Hash> {
        let inner = self.inner.lock();
        self.guard(self.replay_canonical(&inner))
    }

    fn replay_canonical(&self, inner: &ChainInner) -> Result<Hash> {
        let chain = ChainStore::new(&self.storage);
        let state = StateManager::new(&self.storage);

        let mut ops = state.clear_ops()?;
        for (address, account) in self.genesis.accounts() {
            ops.push(BatchOp::put(Storage::account_key(&address), &account)?);
        }
        ops.push(ChainStore::reindex_started_op()?);
        self.storage.batch(ops)?;

        let mut prev = self.load_block(&self.genesis_hash)?;
        for number in 1..=inner.head.number() {
            let block = chain.get_block_by_number(number)?.ok_or_else(|| {
                ChainError::InvalidChainState(format!("missing canonical block {number}"))
            })?;
            let mut overlay = StateOverlay::new(&self.storage);
            let mut ops = self.connect(&mut overlay, &prev, &block)?;
            ops.extend(overlay.into_ops()?);
            self.storage.batch(ops)?;
            prev = block;
        }
        self.storage.batch(vec![ChainStore::reindex_finished_op()])?;

        let root = state.compute_state_root()?;
        info!(blocks = inner.head.number(), root = %root, "State rebuilt from chain");
        Ok(root)
    }

    pub fn flush(&self) -> Result<()> {
        self.guard(self.storage.flush().map_err(Into::into))
    }
}

/// Blockchain statistics.
#[derive(Debug, Clone)]
pub struct ChainStats {
    pub height: u64,
    pub head_hash: Hash,
    pub head_timestamp: u64,
    /// Cumulative work of the head's branch.
    pub total_work: BigUint,
    /// Blocks known on all branches.
    pub known_blocks: usize,
    pub mempool: MempoolStats,
}
