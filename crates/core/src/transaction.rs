//! Value-transfer transactions.

use crate::account::Amount;
use crate::crypto::{Address, CryptoError, Keypair, SignatureRecord};
use crate::hash::{canonical_encode, hash, Hash};
use serde::{Deserialize, Serialize};

/// A signed transfer of `value` from `from` to `to`, paying `fee` to the miner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub from: Address,
    pub to: Address,
    pub value: Amount,
    pub fee: Amount,
    /// Sender's sequence number; must equal the sender's account nonce.
    pub nonce: u64,
    pub signature: Option<SignatureRecord>,
}

/// The signed portion of a transaction, in canonical field order.
#[derive(Serialize)]
struct UnsignedTransaction<'a> {
    from: &'a Address,
    to: &'a Address,
    value: &'a Amount,
    fee: &'a Amount,
    nonce: u64,
}

impl Transaction {
    /// Create a new unsigned transfer.
    pub fn transfer(
        from: Address,
        to: Address,
        value: impl Into<Amount>,
        fee: impl Into<Amount>,
        nonce: u64,
    ) -> Self {
        Self {
            from,
            to,
            value: value.into(),
            fee: fee.into(),
            nonce,
            signature: None,
        }
    }

    /// Canonical encoding of the unsigned fields; this is what gets signed.
    pub fn signing_bytes(&self) -> Vec<u8> {
        canonical_encode(&UnsignedTransaction {
            from: &self.from,
            to: &self.to,
            value: &self.value,
            fee: &self.fee,
            nonce: self.nonce,
        })
    }

    /// Transaction id: hash over the full record including the signature.
    pub fn hash(&self) -> Hash {
        hash(&self.to_bytes())
    }

    pub fn sign(&mut self, keypair: &Keypair) {
        self.signature = Some(keypair.sign_record(&self.signing_bytes()));
    }

    pub fn signed(mut self, keypair: &Keypair) -> Self {
        self.sign(keypair);
        self
    }

    /// Check the signature was produced by the key behind `from`.
    pub fn verify(&self) -> Result<(), CryptoError> {
        let record = self
            .signature
            .as_ref()
            .ok_or(CryptoError::VerificationFailed)?;
        record.verify_for(&self.from, &self.signing_bytes())
    }

    /// Total debit from the sender: value plus fee.
    pub fn cost(&self) -> Amount {
        &self.value + &self.fee
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        canonical_encode(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}
