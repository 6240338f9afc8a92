//! Encoding, hashing and signature primitives for Thor transactions and certificates
//!
//! This module provides:
//! - blake2b-256 hashing used for signing hashes and transaction ids
//! - secp256k1 recoverable signatures and address derivation
//! - RLP encoding/decoding of transaction bodies
//! - Canonical certificate encoding

pub mod certificate;
pub mod crypto;
pub mod transaction;

pub use certificate::{Annex, CertMessage, CertPayload, Certificate};
pub use crypto::{DELEGATED_SIGNATURE_LENGTH, SIGNATURE_LENGTH};
pub use transaction::{intrinsic_gas, Clause, Reserved, Transaction, TxBody, DELEGATION_FEATURE};

use crate::error::{DriverError, DriverResult};

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use ethers::types::{Address, H256};

type Blake2b256 = Blake2b<U32>;

/// blake2b-256 over the concatenation of `parts`
pub fn blake2b256(parts: &[&[u8]]) -> H256 {
    let mut hasher = Blake2b256::new();
    for part in parts {
        hasher.update(part);
    }
    H256::from_slice(&hasher.finalize())
}

/// `0x`-prefixed lowercase hex
pub fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Full lowercase hex form of an address
pub fn address_hex(address: &Address) -> String {
    to_hex(address.as_bytes())
}

/// Parse `0x`-prefixed (or bare) hex into bytes
pub fn parse_hex(input: &str) -> DriverResult<Vec<u8>> {
    let stripped = input.strip_prefix("0x").unwrap_or(input);
    hex::decode(stripped).map_err(|e| DriverError::Codec(format!("invalid hex {:?}: {}", input, e)))
}
