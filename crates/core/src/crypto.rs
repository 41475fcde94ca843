//! Ed25519 signing, verification and address derivation.

use crate::hash::hash;
use ed25519_dalek::{Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A 20-byte address derived from the public key hash.
pub type AddressBytes = [u8; 20];

/// An account address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Address(pub AddressBytes);

impl Address {
    pub const ZERO: Self = Self([0u8; 20]);

    pub fn from_bytes(bytes: AddressBytes) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &AddressBytes {
        &self.0
    }

    /// Convert to a hex string (with 0x prefix).
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parse from a hex string (with or without 0x prefix).
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|_| CryptoError::InvalidAddress)?;
        let arr: AddressBytes = bytes.try_into().map_err(|_| CryptoError::InvalidAddress)?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Address {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Errors that can occur during cryptographic operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid public key")]
    InvalidPublicKey,
    #[error("invalid private key")]
    InvalidPrivateKey,
    #[error("invalid address format")]
    InvalidAddress,
    #[error("signature verification failed")]
    VerificationFailed,
    #[error("signer {signer} does not match expected address {expected}")]
    SignerMismatch { expected: Address, signer: Address },
}

/// A raw 64-byte Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; 64]);

impl Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bytes: Vec<u8> = serde::Deserialize::deserialize(deserializer)?;
        let arr: [u8; 64] = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("signature must be 64 bytes"))?;
        Ok(Signature(arr))
    }
}

impl Signature {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl Default for Signature {
    fn default() -> Self {
        Self([0u8; 64])
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}...)", &self.to_hex()[..16])
    }
}

/// A public key for signature verification.
#[derive(Clone, Copy)]
pub struct PublicKey(pub VerifyingKey);

impl Serialize for PublicKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.to_bytes().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bytes = <[u8; 32]>::deserialize(deserializer)?;
        VerifyingKey::from_bytes(&bytes)
            .map(PublicKey)
            .map_err(serde::de::Error::custom)
    }
}

impl PublicKey {
    /// Parse a compressed 32-byte Ed25519 key.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, CryptoError> {
        VerifyingKey::from_bytes(bytes)
            .map(PublicKey)
            .map_err(|_| CryptoError::InvalidPublicKey)
    }

    /// Derive the address from this public key.
    /// Address is the first 20 bytes of the Blake3 hash of the public key.
    pub fn to_address(&self) -> Address {
        let digest = hash(self.0.as_bytes());
        let mut addr = [0u8; 20];
        addr.copy_from_slice(&digest.0[..20]);
        Address(addr)
    }

    pub fn as_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// Verify a signature over `message` against this public key.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), CryptoError> {
        let sig = DalekSignature::from_bytes(&signature.0);
        self.0
            .verify(message, &sig)
            .map_err(|_| CryptoError::VerificationFailed)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(&self.0.as_bytes()[..8]))
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_bytes() == other.0.as_bytes()
    }
}

impl Eq for PublicKey {}

/// A signature together with the key that produced it.
///
/// Ed25519 keys cannot be recovered from a signature alone, so the signer's
/// public key travels with it. A record authenticates an address only when
/// the signature verifies *and* the key hashes to that address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRecord {
    pub public_key: PublicKey,
    pub signature: Signature,
}

impl SignatureRecord {
    /// The address of the key that produced this signature.
    pub fn signer(&self) -> Address {
        self.public_key.to_address()
    }

    /// Verify that `expected` signed `message`.
    pub fn verify_for(&self, expected: &Address, message: &[u8]) -> Result<(), CryptoError> {
        let signer = self.signer();
        if signer != *expected {
            return Err(CryptoError::SignerMismatch {
                expected: *expected,
                signer,
            });
        }
        self.public_key.verify(message, &self.signature)
    }
}

/// A keypair for signing and verification.
pub struct Keypair {
    signing_key: SigningKey,
    pub public_key: PublicKey,
}

impl Keypair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::generate(&mut OsRng))
    }

    /// Create a keypair from a private key (32 bytes).
    pub fn from_private_key(bytes: &[u8; 32]) -> Self {
        Self::from_signing_key(SigningKey::from_bytes(bytes))
    }

    /// Parse a hex-encoded 32-byte private key (with or without 0x prefix).
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|_| CryptoError::InvalidPrivateKey)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self::from_private_key(&arr))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let public_key = PublicKey(signing_key.verifying_key());
        Self {
            signing_key,
            public_key,
        }
    }

    pub fn private_key(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    pub fn address(&self) -> Address {
        self.public_key.to_address()
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.signing_key.sign(message).to_bytes())
    }

    /// Sign a message and attach our public key.
    pub fn sign_record(&self, message: &[u8]) -> SignatureRecord {
        SignatureRecord {
            public_key: self.public_key,
            signature: self.sign(message),
        }
    }
}

impl Clone for Keypair {
    fn clone(&self) -> Self {
        Self::from_private_key(&self.private_key())
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("address", &self.address())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let kp = Keypair::generate();
        let sig = kp.sign(b"hello world");
        assert!(kp.public_key.verify(b"hello world", &sig).is_ok());
        assert!(kp.public_key.verify(b"hello", &sig).is_err());
    }

    #[test]
    fn test_wrong_key_fails() {
        let kp1 = Keypair::generate();
        let kp2 = Keypair::generate();
        let sig = kp1.sign(b"hello");
        assert_eq!(
            kp2.public_key.verify(b"hello", &sig),
            Err(CryptoError::VerificationFailed)
        );
    }

    #[test]
    fn test_record_recovers_signer() {
        let kp = Keypair::generate();
        let record = kp.sign_record(b"payload");
        assert_eq!(record.signer(), kp.address());
        assert!(record.verify_for(&kp.address(), b"payload").is_ok());
    }

    #[test]
    fn test_record_rejects_other_address() {
        let kp = Keypair::generate();
        let other = Keypair::generate().address();
        let record = kp.sign_record(b"payload");
        assert!(matches!(
            record.verify_for(&other, b"payload"),
            Err(CryptoError::SignerMismatch { .. })
        ));
    }

    #[test]
    fn test_address_hex_roundtrip() {
        let addr = Keypair::generate().address();
        assert_eq!(Address::from_hex(&addr.to_hex()).unwrap(), addr);
        assert_eq!(hex::encode(addr.0).parse::<Address>().unwrap(), addr);
    }

    #[test]
    fn test_address_rejects_bad_input() {
        assert_eq!(Address::from_hex("0x1234"), Err(CryptoError::InvalidAddress));
        assert_eq!(Address::from_hex("zz"), Err(CryptoError::InvalidAddress));
    }

    #[test]
    fn test_keypair_from_hex_is_deterministic() {
        let key = "c3fc038a9abc0f483e2e1f8a0b4db676bce3eaebd7d9afc68e1e7e28ca8738a1";
        let kp1 = Keypair::from_hex(key).unwrap();
        let kp2 = Keypair::from_hex(&format!("0x{key}")).unwrap();
        assert_eq!(kp1.address(), kp2.address());
        assert_eq!(kp1.clone().address(), kp1.address());
    }

    #[test]
    fn test_keypair_from_hex_rejects_short_key() {
        assert!(matches!(
            Keypair::from_hex("abcd"),
            Err(CryptoError::InvalidPrivateKey)
        ));
    }

    #[test]
    fn test_signature_record_bincode_roundtrip() {
        let kp = Keypair::generate();
        let record = kp.sign_record(b"x");
        let bytes = bincode::serialize(&record).unwrap();
        let decoded: SignatureRecord = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, record);
    }
}
