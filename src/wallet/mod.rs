//! Key registry seam and key resolution
//!
//! The driver never caches wallet contents: every resolution enumerates the
//! wallet again, so removals and imports take effect on the next call.

pub mod simple;

pub use simple::SimpleWallet;

use crate::error::{DriverError, DriverResult};

use async_trait::async_trait;
use ethers::types::{Address, H256};
use std::fmt;
use std::sync::Arc;

/// Produces 65-byte recoverable signatures over 32-byte hashes
#[async_trait]
pub trait KeySigner: Send + Sync {
    async fn sign(&self, hash: &H256) -> DriverResult<Vec<u8>>;
}

/// An address together with the capability to sign for it
#[derive(Clone)]
pub struct KeyEntity {
    pub address: Address,
    signer: Arc<dyn KeySigner>,
}

impl KeyEntity {
    pub fn new(address: Address, signer: Arc<dyn KeySigner>) -> Self {
        Self { address, signer }
    }

    pub async fn sign(&self, hash: &H256) -> DriverResult<Vec<u8>> {
        self.signer.sign(hash).await
    }
}

impl fmt::Debug for KeyEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyEntity")
            .field("address", &self.address)
            .finish()
    }
}

/// Ordered enumeration of signing keys
pub trait Wallet: Send + Sync {
    fn list(&self) -> Vec<KeyEntity>;
}

/// Pick the key for `address`, or the first key when no address is given.
///
/// Fails synchronously with a configuration error; never touches the network.
pub fn resolve_key(wallet: Option<&dyn Wallet>, address: Option<Address>) -> DriverResult<KeyEntity> {
    let keys = wallet.map(|w| w.list()).unwrap_or_default();
    if keys.is_empty() {
        return Err(DriverError::EmptyWallet);
    }

    match address {
        Some(address) => keys
            .into_iter()
            .find(|k| k.address == address)
            .ok_or(DriverError::SignerNotFound { address }),
        None => keys
            .into_iter()
            .next()
            .ok_or(DriverError::EmptyWallet),
    }
}

/// Whether the wallet currently holds a key for `address`
pub fn is_address_owned(wallet: Option<&dyn Wallet>, address: &Address) -> bool {
    wallet.map_or(false, |w| w.list().iter().any(|k| &k.address == address))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_A: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const KEY_B: &str = "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

    #[test]
    fn test_resolve_first_key_by_default() {
        let wallet = SimpleWallet::new();
        let a = wallet.import(KEY_A).unwrap();
        let _b = wallet.import(KEY_B).unwrap();

        let key = resolve_key(Some(&wallet), None).unwrap();
        assert_eq!(key.address, a);
    }

    #[test]
    fn test_resolve_exact_match() {
        let wallet = SimpleWallet::new();
        wallet.import(KEY_A).unwrap();
        let b = wallet.import(KEY_B).unwrap();

        assert_eq!(resolve_key(Some(&wallet), Some(b)).unwrap().address, b);
    }

    #[test]
    fn test_resolve_failures_are_config_errors() {
        let err = resolve_key(None, None).unwrap_err();
        assert!(matches!(err, DriverError::EmptyWallet));

        let wallet = SimpleWallet::new();
        assert!(matches!(
            resolve_key(Some(&wallet), None),
            Err(DriverError::EmptyWallet)
        ));

        wallet.import(KEY_A).unwrap();
        let missing = Address::repeat_byte(0x99);
        let err = resolve_key(Some(&wallet), Some(missing)).unwrap_err();
        assert!(err.is_config_error());
        assert!(matches!(err, DriverError::SignerNotFound { address } if address == missing));
    }

    #[test]
    fn test_resolution_reflects_current_wallet() {
        let wallet = SimpleWallet::new();
        let a = wallet.import(KEY_A).unwrap();
        let b = wallet.import(KEY_B).unwrap();
        assert!(is_address_owned(Some(&wallet), &a));

        assert!(wallet.remove(&a));
        assert!(!is_address_owned(Some(&wallet), &a));
        assert_eq!(resolve_key(Some(&wallet), None).unwrap().address, b);
        assert!(!is_address_owned(None, &b));
    }
}
