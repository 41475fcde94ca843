//! Genesis block and initial balance allocation.

use num_traits::Zero;
use powchain_core::{canonical_encode, hash, Account, Address, Amount, Block, Hash};
use std::collections::BTreeMap;

/// The initial balance allocation and the genesis block committing to it.
///
/// Nodes configured with different allocations derive different genesis
/// hashes and therefore never share a chain.
#[derive(Debug, Clone, Default)]
pub struct Genesis {
    alloc: BTreeMap<Address, Amount>,
}

impl Genesis {
    /// Later entries for the same address replace earlier ones.
    pub fn new(alloc: impl IntoIterator<Item = (Address, Amount)>) -> Self {
        Self {
            alloc: alloc.into_iter().collect(),
        }
    }

    pub fn alloc(&self) -> &BTreeMap<Address, Amount> {
        &self.alloc
    }

    /// Hash of the sorted allocation.
    pub fn commitment(&self) -> Hash {
        let entries: Vec<(&Address, &Amount)> = self.alloc.iter().collect();
        hash(&canonical_encode(&entries))
    }

    pub fn block(&self) -> Block {
        Block::genesis(self.commitment().as_bytes().to_vec())
    }

    /// Accounts created by the allocation. Zero entries create nothing.
    pub fn accounts(&self) -> Vec<(Address, Account)> {
        self.alloc
            .iter()
            .filter(|(_, amount)| !amount.is_zero())
            .map(|(address, amount)| (*address, Account::with_balance(amount.clone())))
            .collect()
    }
}
