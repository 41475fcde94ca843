//! Block storage and chain state management.

use crate::db::{BatchOp, Result, Storage, StorageError, BLOCK_HASH_PREFIX};
use crate::state::UndoRecord;
use powchain_core::{Block, Hash};

/// Keys for chain metadata.
const CHAIN_HEAD_KEY: &[u8] = b"chain:head";
const CHAIN_HEIGHT_KEY: &[u8] = b"chain:height";
/// Present while account state is being rebuilt from the chain.
const REINDEX_KEY: &[u8] = b"chain:reindex";

/// Manages block storage and chain state.
///
/// Blocks are stored once by hash, whether canonical or not. The number
/// index only points at canonical blocks and is rewritten on reorgs.
pub struct ChainStore<'a> {
    storage: &'a Storage,
}

impl<'a> ChainStore<'a> {
    /// Create a new ChainStore wrapping the given storage.
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    // =========================================================================
    // Block Storage
    // =========================================================================

    /// Store a block by hash without touching the canonical index.
    pub fn put_block(&self, block: &Block) -> Result<()> {
        self.storage.put(Storage::block_hash_key(&block.hash), block)
    }

    /// Get a block by its hash.
    pub fn get_block_by_hash(&self, hash: &Hash) -> Result<Option<Block>> {
        self.storage.get(Storage::block_hash_key(hash))
    }

    /// Canonical block hash at `number`.
    pub fn canonical_hash(&self, number: u64) -> Result<Option<Hash>> {
        self.storage.get(Storage::block_number_key(number))
    }

    /// Get the canonical block at `number`.
    ///
    /// Two lookups: number → hash, then hash → block.
    pub fn get_block_by_number(&self, number: u64) -> Result<Option<Block>> {
        match self.canonical_hash(number)? {
            Some(h) => self.get_block_by_hash(&h),
            None => Ok(None),
        }
    }

    /// Check if a block exists by hash.
    pub fn has_block(&self, hash: &Hash) -> Result<bool> {
        self.storage.contains(Storage::block_hash_key(hash))
    }

    /// Every stored block, canonical or not, in no particular order.
    pub fn all_blocks(&self) -> Result<Vec<Block>> {
        let entries: Vec<(Vec<u8>, Block)> = self.storage.scan_prefix(BLOCK_HASH_PREFIX)?;
        Ok(entries.into_iter().map(|(_, block)| block).collect())
    }

    pub fn get_undo(&self, hash: &Hash) -> Result<Option<UndoRecord>> {
        self.storage.get(Storage::undo_key(hash))
    }

    // =========================================================================
    // Chain Head Tracking
    // =========================================================================

    /// Get the current chain head hash.
    pub fn get_head(&self) -> Result<Option<Hash>> {
        self.storage.get(CHAIN_HEAD_KEY)
    }

    /// Get the current chain height. Returns 0 if the chain is not initialized.
    pub fn get_height(&self) -> Result<u64> {
        Ok(self.storage.get::<_, u64>(CHAIN_HEIGHT_KEY)?.unwrap_or(0))
    }

    /// Get the head block.
    pub fn get_latest_block(&self) -> Result<Option<Block>> {
        match self.get_head()? {
            Some(hash) => self.get_block_by_hash(&hash),
            None => Ok(None),
        }
    }

    // =========================================================================
    // Batch Builders
    // =========================================================================

    pub fn block_op(block: &Block) -> Result<BatchOp> {
        BatchOp::put(Storage::block_hash_key(&block.hash), block)
    }

    pub fn canonical_op(number: u64, hash: &Hash) -> Result<BatchOp> {
        BatchOp::put(Storage::block_number_key(number), hash)
    }

    pub fn uncanonical_op(number: u64) -> BatchOp {
        BatchOp::remove(Storage::block_number_key(number))
    }

    pub fn undo_op(record: &UndoRecord) -> Result<BatchOp> {
        BatchOp::put(Storage::undo_key(&record.block), record)
    }

    pub fn head_ops(hash: &Hash, number: u64) -> Result<Vec<BatchOp>> {
        Ok(vec![
            BatchOp::put(CHAIN_HEAD_KEY.to_vec(), hash)?,
            BatchOp::put(CHAIN_HEIGHT_KEY.to_vec(), &number)?,
        ])
    }

    /// Marks a state rebuild as started. Commit it with the batch that
    /// clears the accounts.
    pub fn reindex_started_op() -> Result<BatchOp> {
        BatchOp::put(REINDEX_KEY.to_vec(), &true)
    }

    pub fn reindex_finished_op() -> BatchOp {
        BatchOp::remove(REINDEX_KEY.to_vec())
    }

    /// Whether a state rebuild was interrupted before finishing.
    pub fn reindex_pending(&self) -> Result<bool> {
        self.storage.contains(REINDEX_KEY)
    }

    // =========================================================================
    // Genesis Block
    // =========================================================================

    /// Initialize the chain with a genesis block.
    ///
    /// `extra` is committed in the same batch (the genesis allocation).
    /// Fails if the block is not number 0 or the chain already exists.
    pub fn init_genesis(&self, genesis: &Block, extra: Vec<BatchOp>) -> Result<()> {
        if !genesis.is_genesis() {
            return Err(StorageError::InvalidGenesis(
                "Genesis block must have number 0 and a zero parent".into(),
            ));
        }
        if self.is_initialized()? {
            return Err(StorageError::InvalidGenesis(
                "Chain already initialized".into(),
            ));
        }

        let mut ops = extra;
        ops.push(Self::block_op(genesis)?);
        ops.push(Self::canonical_op(0, &genesis.hash)?);
        ops.extend(Self::head_ops(&genesis.hash, 0)?);
        self.storage.batch(ops)
    }

    /// Check if the chain is initialized (has a genesis block).
    pub fn is_initialized(&self) -> Result<bool> {
        Ok(self.get_head()?.is_some())
    }

    // =========================================================================
    // Chain Queries
    // =========================================================================

    /// Canonical blocks in `[from, to]`, stopping at the first gap.
    pub fn get_blocks_range(&self, from: u64, to: u64) -> Result<Vec<Block>> {
        let mut blocks = Vec::new();
        for number in from..=to {
            match self.get_block_by_number(number)? {
                Some(block) => blocks.push(block),
                None => break,
            }
        }
        Ok(blocks)
    }

    /// Get the last N canonical blocks (most recent first).
    pub fn get_recent_blocks(&self, count: u64) -> Result<Vec<Block>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let height = self.get_height()?;
        let from = height.saturating_sub(count - 1);
        let mut blocks = self.get_blocks_range(from, height)?;
        blocks.reverse();
        Ok(blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use powchain_core::{Address, Keypair};

    fn setup() -> Storage {
        Storage::open_temporary().unwrap()
    }

    fn child(parent: &Block, data: &[u8]) -> Block {
        let miner = Keypair::generate();
        let mut block = Block::candidate(parent, vec![], data.to_vec(), 0, miner.address());
        block.seal(&miner);
        block
    }

    /// Commit `block` as the new canonical head.
    fn append(storage: &Storage, block: &Block) {
        let mut ops = vec![
            ChainStore::block_op(block).unwrap(),
            ChainStore::canonical_op(block.number(), &block.hash).unwrap(),
        ];
        ops.extend(ChainStore::head_ops(&block.hash, block.number()).unwrap());
        storage.batch(ops).unwrap();
    }

    #[test]
    fn test_reindex_marker() {
        let storage = setup();
        let chain = ChainStore::new(&storage);
        assert!(!chain.reindex_pending().unwrap());

        storage.batch(vec![ChainStore::reindex_started_op().unwrap()]).unwrap();
        assert!(chain.reindex_pending().unwrap());

        storage.batch(vec![ChainStore::reindex_finished_op()]).unwrap();
        assert!(!chain.reindex_pending().unwrap());
    }

    #[test]
    fn test_genesis_init() {
        let storage = setup();
        let chain = ChainStore::new(&storage);

        assert!(!chain.is_initialized().unwrap());

        let genesis = Block::genesis(vec![]);
        chain.init_genesis(&genesis, vec![]).unwrap();

        assert!(chain.is_initialized().unwrap());
        assert_eq!(chain.get_height().unwrap(), 0);
        assert_eq!(chain.get_head().unwrap(), Some(genesis.hash));
        assert_eq!(chain.canonical_hash(0).unwrap(), Some(genesis.hash));
    }

    #[test]
    fn test_genesis_double_init_fails() {
        let storage = setup();
        let chain = ChainStore::new(&storage);

        let genesis = Block::genesis(vec![]);
        chain.init_genesis(&genesis, vec![]).unwrap();

        let result = chain.init_genesis(&genesis, vec![]);
        assert!(matches!(result, Err(StorageError::InvalidGenesis(_))));
    }

    #[test]
    fn test_non_genesis_as_genesis_fails() {
        let storage = setup();
        let chain = ChainStore::new(&storage);

        let block = child(&Block::genesis(vec![]), b"1");
        let result = chain.init_genesis(&block, vec![]);
        assert!(matches!(result, Err(StorageError::InvalidGenesis(_))));
    }

    #[test]
    fn test_block_by_hash_and_number() {
        let storage = setup();
        let chain = ChainStore::new(&storage);

        let genesis = Block::genesis(vec![]);
        chain.init_genesis(&genesis, vec![]).unwrap();
        let block1 = child(&genesis, b"1");
        append(&storage, &block1);

        let by_hash = chain.get_block_by_hash(&block1.hash).unwrap().unwrap();
        assert_eq!(by_hash, block1);
        let by_number = chain.get_block_by_number(1).unwrap().unwrap();
        assert_eq!(by_number.hash, block1.hash);
        assert!(chain.get_block_by_number(2).unwrap().is_none());
        assert_eq!(chain.get_latest_block().unwrap().unwrap().hash, block1.hash);
    }

    #[test]
    fn test_side_block_not_canonical() {
        let storage = setup();
        let chain = ChainStore::new(&storage);

        let genesis = Block::genesis(vec![]);
        chain.init_genesis(&genesis, vec![]).unwrap();
        let main = child(&genesis, b"main");
        let side = child(&genesis, b"side");
        append(&storage, &main);
        chain.put_block(&side).unwrap();

        assert!(chain.has_block(&side.hash).unwrap());
        assert_eq!(chain.canonical_hash(1).unwrap(), Some(main.hash));
        assert_eq!(chain.all_blocks().unwrap().len(), 3);

        storage.batch(vec![ChainStore::uncanonical_op(1)]).unwrap();
        assert!(chain.canonical_hash(1).unwrap().is_none());
    }

    #[test]
    fn test_get_blocks_range_and_recent() {
        let storage = setup();
        let chain = ChainStore::new(&storage);

        let genesis = Block::genesis(vec![]);
        chain.init_genesis(&genesis, vec![]).unwrap();
        let block1 = child(&genesis, b"1");
        append(&storage, &block1);
        let block2 = child(&block1, b"2");
        append(&storage, &block2);

        let blocks = chain.get_blocks_range(0, 5).unwrap();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[2].number(), 2);

        let recent = chain.get_recent_blocks(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].number(), 2);
        assert_eq!(recent[1].number(), 1);
    }

    #[test]
    fn test_undo_record_storage() {
        let storage = setup();
        let chain = ChainStore::new(&storage);
        let record = UndoRecord {
            block: Hash([9; 32]),
            accounts: vec![(Address([1; 20]), None)],
        };
        storage.batch(vec![ChainStore::undo_op(&record).unwrap()]).unwrap();
        assert_eq!(chain.get_undo(&record.block).unwrap(), Some(record));
        assert!(chain.get_undo(&Hash::ZERO).unwrap().is_none());
    }
}
