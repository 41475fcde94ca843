//! Persistent storage layer for powchain.
//!
//! This crate provides the storage backend for the node:
//! - Account state (balances, nonces) and an in-memory overlay with
//!   snapshot/revert for validating and applying blocks
//! - Block storage (by hash, canonical number index, head)
//! - Undo records used to revert state during reorganisations
//! - State root computation
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                 Chain / Ledger Manager                  │
//! └────────────────────────┬────────────────────────────────┘
//!                          │
//! ┌────────────────────────▼────────────────────────────────┐
//! │                   Storage Layer                          │
//! │  ┌──────────────┐ ┌─────────────┐ ┌─────────────────┐   │
//! │  │ StateOverlay │ │ ChainStore  │ │ Storage (DB)    │   │
//! │  │  - journal   │ │  - Blocks   │ │  - sled wrapper │   │
//! │  │  - snapshots │ │  - Numbers  │ │  - batches      │   │
//! │  │ StateManager │ │  - Head     │ │  - key helpers  │   │
//! │  │  - Accounts  │ │  - Undo     │ │                 │   │
//! │  └──────────────┘ └─────────────┘ └─────────────────┘   │
//! └────────────────────────┬────────────────────────────────┘
//!                          │
//! ┌────────────────────────▼────────────────────────────────┐
//! │                    sled Database                         │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use powchain_storage::{Storage, StateManager, StateOverlay};
//! use powchain_core::{Account, Address};
//!
//! let storage = Storage::open("./powchain_data/db").unwrap();
//!
//! let state = StateManager::new(&storage);
//! let alice = Address::from_bytes([0xAA; 20]);
//! state.put_account(&alice, &Account::with_balance(1_000u32)).unwrap();
//!
//! let mut overlay = StateOverlay::new(&storage);
//! let snapshot = overlay.snapshot();
//! // ... apply transactions ...
//! overlay.revert_to_snapshot(snapshot);
//! ```

pub mod chain;
pub mod db;
pub mod state;

// Re-export commonly used types
pub use chain::ChainStore;
pub use db::{BatchOp, Result, Storage, StorageError};
pub use state::{
    AccountView, Snapshot, StateError, StateManager, StateOverlay, TxApplyError, UndoRecord,
};
