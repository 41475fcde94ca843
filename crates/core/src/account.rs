//! Account state representation.

use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Serialize};

/// Arbitrary-precision, non-negative token amount.
pub type Amount = BigUint;

/// An account in the ledger state.
///
/// Every address implicitly has an account with zero balance and nonce zero.
/// Accounts are created on first credit and never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Account {
    /// Number of transactions sent from this account.
    pub nonce: u64,
    /// Balance in the native token.
    pub balance: Amount,
}

impl Account {
    pub fn with_balance(balance: impl Into<Amount>) -> Self {
        Self {
            nonce: 0,
            balance: balance.into(),
        }
    }

    pub fn increment_nonce(&mut self) {
        self.nonce = self.nonce.saturating_add(1);
    }

    pub fn credit(&mut self, amount: &Amount) {
        self.balance += amount;
    }

    /// Subtract `amount` from the balance.
    /// Returns false and leaves the balance untouched if it is too small.
    pub fn debit(&mut self, amount: &Amount) -> bool {
        if self.balance >= *amount {
            self.balance -= amount;
            true
        } else {
            false
        }
    }

    pub fn has_balance(&self, amount: &Amount) -> bool {
        self.balance >= *amount
    }

    /// True for an account indistinguishable from an unused address.
    pub fn is_empty(&self) -> bool {
        self.nonce == 0 && self.balance.is_zero()
    }
}
