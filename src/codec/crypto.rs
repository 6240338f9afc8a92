//! secp256k1 recoverable signatures and address derivation

use crate::error::{DriverError, DriverResult};

use ethers::types::{Address, H256};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use sha3::{Digest, Keccak256};

/// `r || s || recovery_id`
pub const SIGNATURE_LENGTH: usize = 65;

/// Origin signature followed by the delegator signature
pub const DELEGATED_SIGNATURE_LENGTH: usize = SIGNATURE_LENGTH * 2;

/// Sign a 32-byte hash, producing a 65-byte recoverable signature
pub fn sign_hash(key: &SigningKey, hash: &H256) -> DriverResult<[u8; SIGNATURE_LENGTH]> {
    let (signature, recovery_id) = key
        .sign_prehash_recoverable(hash.as_bytes())
        .map_err(|e| DriverError::Signing(e.to_string()))?;

    let mut out = [0u8; SIGNATURE_LENGTH];
    out[..64].copy_from_slice(&signature.to_bytes());
    out[64] = recovery_id.to_byte();
    Ok(out)
}

/// Recover the signer address of a 65-byte signature over `hash`
pub fn recover(hash: &H256, signature: &[u8]) -> DriverResult<Address> {
    if signature.len() != SIGNATURE_LENGTH {
        return Err(DriverError::Codec(format!(
            "signature must be {} bytes, got {}",
            SIGNATURE_LENGTH,
            signature.len()
        )));
    }

    let sig = Signature::from_slice(&signature[..64])
        .map_err(|e| DriverError::Codec(format!("invalid signature: {}", e)))?;
    let recovery_id = RecoveryId::from_byte(signature[64])
        .ok_or_else(|| DriverError::Codec(format!("invalid recovery id {}", signature[64])))?;

    let key = VerifyingKey::recover_from_prehash(hash.as_bytes(), &sig, recovery_id)
        .map_err(|e| DriverError::Codec(format!("signature recovery failed: {}", e)))?;
    Ok(public_key_to_address(&key))
}

/// Last 20 bytes of keccak-256 over the uncompressed public key
pub fn public_key_to_address(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let digest = Keccak256::digest(&point.as_bytes()[1..]);
    Address::from_slice(&digest[12..])
}

/// Parse a 32-byte secp256k1 private key from hex (optional `0x`)
pub fn parse_private_key(input: &str) -> DriverResult<SigningKey> {
    let stripped = input.strip_prefix("0x").unwrap_or(input);
    if stripped.len() != 64 || !stripped.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(DriverError::InvalidKey(
            "expected 64 hex characters".to_string(),
        ));
    }
    let bytes = hex::decode(stripped).map_err(|e| DriverError::InvalidKey(e.to_string()))?;
    SigningKey::from_slice(&bytes).map_err(|e| DriverError::InvalidKey(e.to_string()))
}
