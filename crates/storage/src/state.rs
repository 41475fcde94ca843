//! Account state: the persistent store and an in-memory overlay.
//!
//! All state mutation goes through [`StateOverlay`]. The overlay reads
//! through to the committed accounts, journals every write so it can be
//! rolled back to a [`Snapshot`], and is finally turned into a list of
//! [`BatchOp`]s committed together with the block that produced it.

use crate::db::{BatchOp, Result, Storage, StorageError, ACCOUNT_PREFIX};
use num_traits::Zero;
use powchain_core::{hash, merkle_root, Account, Address, Amount, Hash, Transaction};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Errors from applying a transaction to state.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("Nonce mismatch for {address}: expected {expected}, got {got}")]
    NonceMismatch {
        address: Address,
        expected: u64,
        got: u64,
    },

    #[error("Insufficient balance for {address}: required {required}, available {available}")]
    InsufficientBalance {
        address: Address,
        required: Amount,
        available: Amount,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Failure of an all-or-nothing batch, naming the offending transaction.
#[derive(Error, Debug)]
#[error("Transaction {index} failed: {source}")]
pub struct TxApplyError {
    pub index: usize,
    #[source]
    pub source: StateError,
}

/// Read access to account state.
///
/// Implemented by the committed store and by overlays, so pre-checks can
/// run against whichever view the caller holds.
pub trait AccountView {
    fn account(&self, address: &Address) -> Result<Account>;
}

// =============================================================================
// Committed State
// =============================================================================

/// Manages the committed world state (all accounts).
pub struct StateManager<'a> {
    storage: &'a Storage,
}

impl<'a> StateManager<'a> {
    /// Create a new StateManager wrapping the given storage.
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Create or update an account.
    pub fn put_account(&self, address: &Address, account: &Account) -> Result<()> {
        let key = Storage::account_key(address);
        self.storage.put(key, account)
    }

    /// Get an account, returning default (empty) if not found.
    ///
    /// Every address implicitly exists with zero balance and nonce.
    pub fn get_account(&self, address: &Address) -> Result<Account> {
        Ok(self.load_account(address)?.unwrap_or_default())
    }

    /// The stored record, if the account was ever created.
    pub fn load_account(&self, address: &Address) -> Result<Option<Account>> {
        let key = Storage::account_key(address);
        self.storage.get(key)
    }

    /// Check if an account exists (has been explicitly stored).
    pub fn account_exists(&self, address: &Address) -> Result<bool> {
        let key = Storage::account_key(address);
        self.storage.contains(key)
    }

    pub fn get_balance(&self, address: &Address) -> Result<Amount> {
        Ok(self.get_account(address)?.balance)
    }

    pub fn get_nonce(&self, address: &Address) -> Result<u64> {
        Ok(self.get_account(address)?.nonce)
    }

    /// All stored accounts, ordered by address.
    pub fn accounts(&self) -> Result<Vec<(Address, Account)>> {
        let entries: Vec<(Vec<u8>, Account)> = self.storage.scan_prefix(ACCOUNT_PREFIX)?;
        entries
            .into_iter()
            .map(|(key, account)| {
                Storage::address_from_account_key(&key)
                    .map(|address| (address, account))
                    .ok_or_else(|| StorageError::Corrupted("malformed account key".into()))
            })
            .collect()
    }

    /// Ops removing every account record. Used before replaying the chain.
    pub fn clear_ops(&self) -> Result<Vec<BatchOp>> {
        let mut ops = Vec::new();
        for entry in self.storage.inner().scan_prefix(ACCOUNT_PREFIX) {
            let (key, _) = entry?;
            ops.push(BatchOp::remove(key.to_vec()));
        }
        Ok(ops)
    }

    /// Compute the state root from all accounts.
    ///
    /// Hashes every `(key, value)` record, sorts the hashes and takes their
    /// merkle root. O(n) in the number of accounts.
    pub fn compute_state_root(&self) -> Result<Hash> {
        let mut account_hashes = Vec::new();
        for entry in self.storage.inner().scan_prefix(ACCOUNT_PREFIX) {
            let (key, value) = entry?;
            account_hashes.push(hash(&[key.as_ref(), value.as_ref()].concat()));
        }
        account_hashes.sort();
        Ok(merkle_root(&account_hashes))
    }
}

impl AccountView for StateManager<'_> {
    fn account(&self, address: &Address) -> Result<Account> {
        self.get_account(address)
    }
}

// =============================================================================
// Undo Records
// =============================================================================

/// Pre-images of every account a block touched, keyed by the block hash.
///
/// `None` means the account did not exist before the block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoRecord {
    pub block: Hash,
    pub accounts: Vec<(Address, Option<Account>)>,
}

// =============================================================================
// Overlay
// =============================================================================

/// Position in an overlay's journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot(usize);

/// A journal entry: the address written and what the overlay held for it
/// before the write (`None` if it was not in the overlay yet).
type JournalEntry = (Address, Option<Option<Account>>);

/// Uncommitted account changes layered over the committed state.
pub struct StateOverlay<'a> {
    base: StateManager<'a>,
    /// Current overlay values; `None` marks a deleted account.
    dirty: HashMap<Address, Option<Account>>,
    journal: Vec<JournalEntry>,
}

impl<'a> StateOverlay<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self {
            base: StateManager::new(storage),
            dirty: HashMap::new(),
            journal: Vec::new(),
        }
    }

    /// Overlay view of an account, defaulting to empty.
    pub fn get_account(&self, address: &Address) -> Result<Account> {
        Ok(self.load_account(address)?.unwrap_or_default())
    }

    fn load_account(&self, address: &Address) -> Result<Option<Account>> {
        match self.dirty.get(address) {
            Some(value) => Ok(value.clone()),
            None => self.base.load_account(address),
        }
    }

    fn write(&mut self, address: Address, value: Option<Account>) {
        let previous = self.dirty.insert(address, value);
        self.journal.push((address, previous));
    }

    pub fn set_account(&mut self, address: Address, account: Account) {
        self.write(address, Some(account));
    }

    /// Number of accounts changed relative to the committed state.
    pub fn dirty_len(&self) -> usize {
        self.dirty.len()
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    pub fn snapshot(&self) -> Snapshot {
        Snapshot(self.journal.len())
    }

    /// Undo every write made after `snapshot` was taken.
    pub fn revert_to_snapshot(&mut self, snapshot: Snapshot) {
        while self.journal.len() > snapshot.0 {
            let Some((address, previous)) = self.journal.pop() else {
                break;
            };
            match previous {
                Some(value) => {
                    self.dirty.insert(address, value);
                }
                None => {
                    self.dirty.remove(&address);
                }
            }
        }
    }

    /// Pre-images, as of `snapshot`, of every account written since.
    pub fn undo_since(&self, snapshot: Snapshot, block: Hash) -> Result<UndoRecord> {
        let mut seen: HashMap<Address, Option<Account>> = HashMap::new();
        for (address, previous) in &self.journal[snapshot.0..] {
            if seen.contains_key(address) {
                continue;
            }
            let pre_image = match previous {
                Some(value) => value.clone(),
                None => self.base.load_account(address)?,
            };
            seen.insert(*address, pre_image);
        }
        let mut accounts: Vec<_> = seen.into_iter().collect();
        accounts.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(UndoRecord { block, accounts })
    }

    /// Restore the account pre-images of a block being reverted.
    pub fn apply_undo(&mut self, record: &UndoRecord) {
        for (address, pre_image) in &record.accounts {
            self.write(*address, pre_image.clone());
        }
    }

    // =========================================================================
    // Transaction Application
    // =========================================================================

    /// Apply one transfer, crediting its fee to `miner`.
    ///
    /// On error nothing is written.
    pub fn apply_transaction(
        &mut self,
        tx: &Transaction,
        miner: &Address,
    ) -> std::result::Result<(), StateError> {
        let mut sender = self.get_account(&tx.from)?;
        if sender.nonce != tx.nonce {
            return Err(StateError::NonceMismatch {
                address: tx.from,
                expected: sender.nonce,
                got: tx.nonce,
            });
        }
        let cost = tx.cost();
        if !sender.debit(&cost) {
            return Err(StateError::InsufficientBalance {
                address: tx.from,
                required: cost,
                available: sender.balance,
            });
        }
        sender.increment_nonce();
        self.set_account(tx.from, sender);

        if !tx.value.is_zero() {
            let mut recipient = self.get_account(&tx.to)?;
            recipient.credit(&tx.value);
            self.set_account(tx.to, recipient);
        }
        if !tx.fee.is_zero() {
            let mut beneficiary = self.get_account(miner)?;
            beneficiary.credit(&tx.fee);
            self.set_account(*miner, beneficiary);
        }
        Ok(())
    }

    /// Apply all transactions in order, or none of them.
    pub fn apply_transactions_atomically(
        &mut self,
        txs: &[Transaction],
        miner: &Address,
    ) -> std::result::Result<(), TxApplyError> {
        let snapshot = self.snapshot();
        for (index, tx) in txs.iter().enumerate() {
            if let Err(source) = self.apply_transaction(tx, miner) {
                self.revert_to_snapshot(snapshot);
                return Err(TxApplyError { index, source });
            }
        }
        Ok(())
    }

    // =========================================================================
    // Commit
    // =========================================================================

    /// Turn the overlay into batch operations over the account records.
    pub fn into_ops(self) -> Result<Vec<BatchOp>> {
        let mut entries: Vec<_> = self.dirty.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
            .into_iter()
            .map(|(address, value)| {
                let key = Storage::account_key(&address);
                match value {
                    Some(account) => BatchOp::put(key, &account),
                    None => Ok(BatchOp::remove(key)),
                }
            })
            .collect()
    }
}

impl AccountView for StateOverlay<'_> {
    fn account(&self, address: &Address) -> Result<Account> {
        self.get_account(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use powchain_core::Keypair;

    fn setup() -> Storage {
        Storage::open_temporary().unwrap()
    }

    fn amount(v: u64) -> Amount {
        Amount::from(v)
    }

    fn commit(storage: &Storage, overlay: StateOverlay) {
        storage.batch(overlay.into_ops().unwrap()).unwrap();
    }

    fn transfer(keypair: &Keypair, to: Address, value: u64, fee: u64, nonce: u64) -> Transaction {
        Transaction::transfer(keypair.address(), to, value, fee, nonce).signed(keypair)
    }

    #[test]
    fn test_account_crud() {
        let storage = setup();
        let state = StateManager::new(&storage);
        let address = Address([0xAA; 20]);

        assert!(!state.account_exists(&address).unwrap());
        assert!(state.get_account(&address).unwrap().is_empty());

        let mut account = Account::with_balance(1000u32);
        account.nonce = 5;
        state.put_account(&address, &account).unwrap();

        assert!(state.account_exists(&address).unwrap());
        assert_eq!(state.get_balance(&address).unwrap(), amount(1000));
        assert_eq!(state.get_nonce(&address).unwrap(), 5);
    }

    #[test]
    fn test_apply_transfer_moves_value_and_fee() {
        let storage = setup();
        let alice = Keypair::generate();
        let bob = Address([0xBB; 20]);
        let miner = Address([0xCC; 20]);
        StateManager::new(&storage)
            .put_account(&alice.address(), &Account::with_balance(1000u32))
            .unwrap();

        let mut overlay = StateOverlay::new(&storage);
        overlay
            .apply_transaction(&transfer(&alice, bob, 500, 100, 0), &miner)
            .unwrap();
        commit(&storage, overlay);

        let state = StateManager::new(&storage);
        let sender = state.get_account(&alice.address()).unwrap();
        assert_eq!(sender.balance, amount(400));
        assert_eq!(sender.nonce, 1);
        assert_eq!(state.get_balance(&bob).unwrap(), amount(500));
        assert_eq!(state.get_balance(&miner).unwrap(), amount(100));
    }

    #[test]
    fn test_nonce_mismatch_rejected() {
        let storage = setup();
        let alice = Keypair::generate();
        StateManager::new(&storage)
            .put_account(&alice.address(), &Account::with_balance(1000u32))
            .unwrap();

        let mut overlay = StateOverlay::new(&storage);
        let result = overlay.apply_transaction(&transfer(&alice, Address::ZERO, 1, 0, 3), &Address::ZERO);
        assert!(matches!(
            result,
            Err(StateError::NonceMismatch { expected: 0, got: 3, .. })
        ));
        assert_eq!(overlay.dirty_len(), 0);
    }

    #[test]
    fn test_insufficient_balance_rejected() {
        let storage = setup();
        let alice = Keypair::generate();
        StateManager::new(&storage)
            .put_account(&alice.address(), &Account::with_balance(100u32))
            .unwrap();

        let mut overlay = StateOverlay::new(&storage);
        let result = overlay.apply_transaction(&transfer(&alice, Address::ZERO, 90, 20, 0), &Address::ZERO);
        assert!(matches!(result, Err(StateError::InsufficientBalance { .. })));
        assert_eq!(overlay.get_account(&alice.address()).unwrap().balance, amount(100));
    }

    #[test]
    fn test_atomic_batch_all_or_nothing() {
        let storage = setup();
        let alice = Keypair::generate();
        let bob = Address([0xBB; 20]);
        StateManager::new(&storage)
            .put_account(&alice.address(), &Account::with_balance(1000u32))
            .unwrap();

        let txs = vec![
            transfer(&alice, bob, 100, 0, 0),
            transfer(&alice, bob, 100, 0, 1),
            transfer(&alice, bob, 100, 0, 1),
        ];
        let mut overlay = StateOverlay::new(&storage);
        let err = overlay
            .apply_transactions_atomically(&txs, &Address::ZERO)
            .unwrap_err();
        assert_eq!(err.index, 2);
        assert!(matches!(err.source, StateError::NonceMismatch { .. }));

        assert_eq!(overlay.get_account(&bob).unwrap().balance, amount(0));
        assert_eq!(overlay.get_account(&alice.address()).unwrap().nonce, 0);
    }

    #[test]
    fn test_snapshot_revert_nested() {
        let storage = setup();
        let a = Address([1; 20]);
        let mut overlay = StateOverlay::new(&storage);

        overlay.set_account(a, Account::with_balance(10u32));
        let outer = overlay.snapshot();
        overlay.set_account(a, Account::with_balance(20u32));
        let inner = overlay.snapshot();
        overlay.set_account(a, Account::with_balance(30u32));

        overlay.revert_to_snapshot(inner);
        assert_eq!(overlay.get_account(&a).unwrap().balance, amount(20));
        overlay.revert_to_snapshot(outer);
        assert_eq!(overlay.get_account(&a).unwrap().balance, amount(10));
    }

    #[test]
    fn test_overlay_does_not_touch_store_until_commit() {
        let storage = setup();
        let a = Address([1; 20]);
        let mut overlay = StateOverlay::new(&storage);
        overlay.set_account(a, Account::with_balance(10u32));

        assert!(!StateManager::new(&storage).account_exists(&a).unwrap());
        commit(&storage, overlay);
        assert!(StateManager::new(&storage).account_exists(&a).unwrap());
    }

    #[test]
    fn test_undo_record_restores_pre_images() {
        let storage = setup();
        let alice = Keypair::generate();
        let bob = Address([0xBB; 20]);
        let miner = Address([0xCC; 20]);
        let state = StateManager::new(&storage);
        state
            .put_account(&alice.address(), &Account::with_balance(1000u32))
            .unwrap();
        let root_before = state.compute_state_root().unwrap();

        let block = Hash([7; 32]);
        let mut overlay = StateOverlay::new(&storage);
        let snapshot = overlay.snapshot();
        overlay
            .apply_transaction(&transfer(&alice, bob, 500, 100, 0), &miner)
            .unwrap();
        let undo = overlay.undo_since(snapshot, block).unwrap();
        commit(&storage, overlay);

        assert_eq!(undo.block, block);
        assert_eq!(undo.accounts.len(), 3);
        assert!(undo.accounts.iter().any(|(a, pre)| *a == bob && pre.is_none()));

        let mut overlay = StateOverlay::new(&storage);
        overlay.apply_undo(&undo);
        commit(&storage, overlay);

        let state = StateManager::new(&storage);
        assert!(!state.account_exists(&bob).unwrap());
        assert_eq!(state.compute_state_root().unwrap(), root_before);
    }

    #[test]
    fn test_compute_state_root() {
        let storage = setup();
        let state = StateManager::new(&storage);

        let root1 = state.compute_state_root().unwrap();

        let alice = Address([0xAA; 20]);
        state.put_account(&alice, &Account::with_balance(1000u32)).unwrap();
        let root2 = state.compute_state_root().unwrap();
        assert_ne!(root1, root2);
        assert_eq!(root2, state.compute_state_root().unwrap());

        state.put_account(&alice, &Account::with_balance(2000u32)).unwrap();
        assert_ne!(root2, state.compute_state_root().unwrap());
    }

    #[test]
    fn test_accounts_listing_and_clear() {
        let storage = setup();
        let state = StateManager::new(&storage);
        state.put_account(&Address([2; 20]), &Account::with_balance(2u32)).unwrap();
        state.put_account(&Address([1; 20]), &Account::with_balance(1u32)).unwrap();

        let accounts = state.accounts().unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].0, Address([1; 20]));

        storage.batch(state.clear_ops().unwrap()).unwrap();
        assert!(state.accounts().unwrap().is_empty());
    }
}
