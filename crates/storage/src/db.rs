//! sled database wrapper with serialization helpers.

use powchain_core::{Address, Hash};
use sled::Db;
use std::path::Path;
use thiserror::Error;

/// Storage errors.
///
/// Any of these surfacing from the node's accept path is fatal.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Database(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Key not found: {0}")]
    NotFound(String),

    #[error("Invalid genesis: {0}")]
    InvalidGenesis(String),

    #[error("Corrupted store: {0}")]
    Corrupted(String),
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Wrapper around sled database with serialization helpers.
///
/// Cloning is cheap; clones share the same underlying database.
#[derive(Clone)]
pub struct Storage {
    db: Db,
}

impl Storage {
    /// Open a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Open an in-memory database (for testing).
    pub fn open_temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    /// Store a serializable value.
    pub fn put<K, V>(&self, key: K, value: &V) -> Result<()>
    where
        K: AsRef<[u8]>,
        V: serde::Serialize,
    {
        let encoded = bincode::serialize(value)?;
        self.db.insert(key, encoded)?;
        Ok(())
    }

    /// Retrieve and deserialize a value.
    pub fn get<K, V>(&self, key: K) -> Result<Option<V>>
    where
        K: AsRef<[u8]>,
        V: serde::de::DeserializeOwned,
    {
        match self.db.get(key)? {
            Some(bytes) => {
                let value = bincode::deserialize(&bytes)?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Retrieve a value, returning error if not found.
    pub fn get_or_err<K, V>(&self, key: K) -> Result<V>
    where
        K: AsRef<[u8]> + std::fmt::Debug + Clone,
        V: serde::de::DeserializeOwned,
    {
        self.get(key.clone())?
            .ok_or_else(|| StorageError::NotFound(format!("{:?}", key)))
    }

    /// Delete a key.
    pub fn delete<K: AsRef<[u8]>>(&self, key: K) -> Result<()> {
        self.db.remove(key)?;
        Ok(())
    }

    /// Check if a key exists.
    pub fn contains<K: AsRef<[u8]>>(&self, key: K) -> Result<bool> {
        Ok(self.db.contains_key(key)?)
    }

    /// Decode every value stored under `prefix`, in key order.
    pub fn scan_prefix<V>(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, V)>>
    where
        V: serde::de::DeserializeOwned,
    {
        let mut out = Vec::new();
        for entry in self.db.scan_prefix(prefix) {
            let (key, bytes) = entry?;
            out.push((key.to_vec(), bincode::deserialize(&bytes)?));
        }
        Ok(out)
    }

    /// Get the underlying sled database (for raw scans).
    pub fn inner(&self) -> &Db {
        &self.db
    }

    /// Apply multiple operations atomically.
    ///
    /// The whole batch lands or none of it does; a crash mid-commit leaves
    /// the previous state intact.
    pub fn batch(&self, operations: Vec<BatchOp>) -> Result<()> {
        let mut batch = sled::Batch::default();
        for op in operations {
            match op {
                BatchOp::Insert { key, value } => batch.insert(key, value),
                BatchOp::Remove { key } => batch.remove(key),
            }
        }
        self.db.apply_batch(batch)?;
        Ok(())
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    // =========================================================================
    // Key Construction Helpers
    // =========================================================================

    /// Format: "account:" + address_bytes
    pub fn account_key(address: &Address) -> Vec<u8> {
        let mut key = ACCOUNT_PREFIX.to_vec();
        key.extend_from_slice(&address.0);
        key
    }

    /// Recover the address from an account key.
    pub fn address_from_account_key(key: &[u8]) -> Option<Address> {
        let raw = key.strip_prefix(ACCOUNT_PREFIX)?;
        let bytes: [u8; 20] = raw.try_into().ok()?;
        Some(Address(bytes))
    }

    /// Canonical number index.
    /// Format: "block:number:{number}"
    pub fn block_number_key(number: u64) -> Vec<u8> {
        format!("block:number:{}", number).into_bytes()
    }

    /// Format: "block:hash:" + hash_bytes
    pub fn block_hash_key(hash: &Hash) -> Vec<u8> {
        let mut key = BLOCK_HASH_PREFIX.to_vec();
        key.extend_from_slice(&hash.0);
        key
    }

    /// Format: "undo:" + hash_bytes
    pub fn undo_key(hash: &Hash) -> Vec<u8> {
        let mut key = b"undo:".to_vec();
        key.extend_from_slice(&hash.0);
        key
    }
}

pub(crate) const ACCOUNT_PREFIX: &[u8] = b"account:";
pub(crate) const BLOCK_HASH_PREFIX: &[u8] = b"block:hash:";

/// Batch operation for atomic updates.
#[derive(Debug, Clone)]
pub enum BatchOp {
    Insert { key: Vec<u8>, value: Vec<u8> },
    Remove { key: Vec<u8> },
}

impl BatchOp {
    /// Insert of a bincode-encoded value.
    pub fn put<V: serde::Serialize>(key: Vec<u8>, value: &V) -> Result<Self> {
        Ok(Self::Insert {
            key,
            value: bincode::serialize(value)?,
        })
    }

    pub fn remove(key: Vec<u8>) -> Self {
        Self::Remove { key }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_temporary() {
        let storage = Storage::open_temporary().unwrap();
        assert!(storage.db.is_empty());
    }

    #[test]
    fn test_put_get() {
        let storage = Storage::open_temporary().unwrap();

        storage.put("key1", &42u64).unwrap();

        let value: Option<u64> = storage.get("key1").unwrap();
        assert_eq!(value, Some(42));

        let missing: Option<u64> = storage.get("missing").unwrap();
        assert_eq!(missing, None);
    }

    #[test]
    fn test_get_or_err() {
        let storage = Storage::open_temporary().unwrap();

        storage.put("exists", &100u64).unwrap();

        let value: u64 = storage.get_or_err("exists").unwrap();
        assert_eq!(value, 100);

        let result: Result<u64> = storage.get_or_err("missing");
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[test]
    fn test_delete() {
        let storage = Storage::open_temporary().unwrap();

        storage.put("key", &"value").unwrap();
        assert!(storage.contains("key").unwrap());

        storage.delete("key").unwrap();
        assert!(!storage.contains("key").unwrap());
    }

    #[test]
    fn test_batch_operations() {
        let storage = Storage::open_temporary().unwrap();
        storage.put("c", &3u64).unwrap();

        let ops = vec![
            BatchOp::put(b"a".to_vec(), &1u64).unwrap(),
            BatchOp::put(b"b".to_vec(), &2u64).unwrap(),
            BatchOp::remove(b"c".to_vec()),
        ];
        storage.batch(ops).unwrap();

        let a: u64 = storage.get("a").unwrap().unwrap();
        let b: u64 = storage.get("b").unwrap().unwrap();
        assert_eq!(a, 1);
        assert_eq!(b, 2);
        assert!(!storage.contains("c").unwrap());
    }

    #[test]
    fn test_scan_prefix() {
        let storage = Storage::open_temporary().unwrap();
        storage.put("p:1", &1u64).unwrap();
        storage.put("p:2", &2u64).unwrap();
        storage.put("q:1", &9u64).unwrap();

        let values: Vec<(Vec<u8>, u64)> = storage.scan_prefix(b"p:").unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0].1, 1);
        assert_eq!(values[1].1, 2);
    }

    #[test]
    fn test_key_construction() {
        let address = Address([0xAA; 20]);
        let hash = Hash([0xBB; 32]);

        let account_key = Storage::account_key(&address);
        assert!(account_key.starts_with(b"account:"));
        assert_eq!(Storage::address_from_account_key(&account_key), Some(address));

        assert_eq!(Storage::block_number_key(42), b"block:number:42");

        let hash_key = Storage::block_hash_key(&hash);
        assert!(hash_key.starts_with(b"block:hash:"));

        assert!(Storage::undo_key(&hash).starts_with(b"undo:"));
    }

    #[test]
    fn test_reopen_persists() {
        let dir = tempfile::tempdir().unwrap();
        {
            let storage = Storage::open(dir.path()).unwrap();
            storage.put("height", &7u64).unwrap();
            storage.flush().unwrap();
        }
        let storage = Storage::open(dir.path()).unwrap();
        let height: Option<u64> = storage.get("height").unwrap();
        assert_eq!(height, Some(7));
    }
}
