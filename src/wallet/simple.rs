//! In-memory wallet holding raw secp256k1 private keys

use super::{KeyEntity, KeySigner, Wallet};
use crate::codec::crypto::{parse_private_key, public_key_to_address, sign_hash};
use crate::error::DriverResult;

use async_trait::async_trait;
use ethers::types::{Address, H256};
use k256::ecdsa::SigningKey;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;

struct LocalKey {
    address: Address,
    key: SigningKey,
}

#[async_trait]
impl KeySigner for LocalKey {
    async fn sign(&self, hash: &H256) -> DriverResult<Vec<u8>> {
        Ok(sign_hash(&self.key, hash)?.to_vec())
    }
}

/// Wallet keeping imported keys in memory, in import order
#[derive(Default)]
pub struct SimpleWallet {
    keys: RwLock<Vec<Arc<LocalKey>>>,
}

impl SimpleWallet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Import a hex-encoded private key (with or without `0x`), returning its address
    ///
    /// The key itself is never logged.
    pub fn import(&self, private_key_hex: &str) -> DriverResult<Address> {
        let key = parse_private_key(private_key_hex)?;
        let address = public_key_to_address(key.verifying_key());

        self.keys
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(LocalKey { address, key }));

        info!(address = ?address, "Key imported");
        Ok(address)
    }

    /// Remove the key for `address`; returns whether one was found
    pub fn remove(&self, address: &Address) -> bool {
        let mut keys = self.keys.write().unwrap_or_else(PoisonError::into_inner);
        match keys.iter().position(|k| &k.address == address) {
            Some(index) => {
                keys.remove(index);
                true
            }
            None => false,
        }
    }
}

impl Wallet for SimpleWallet {
    fn list(&self) -> Vec<KeyEntity> {
        self.keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|k| KeyEntity::new(k.address, k.clone() as Arc<dyn KeySigner>))
            .collect()
    }
}

impl fmt::Debug for SimpleWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let addresses: Vec<Address> = self.list().iter().map(|k| k.address).collect();
        f.debug_struct("SimpleWallet")
            .field("addresses", &addresses)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{blake2b256, crypto::recover};
    use crate::error::DriverError;

    const TEST_PRIVATE_KEY: &str =
        "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_import_with_and_without_prefix() {
        let wallet = SimpleWallet::new();
        let a = wallet.import(TEST_PRIVATE_KEY).unwrap();
        let b = wallet.import(&format!("0x{}", TEST_PRIVATE_KEY)).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            hex::encode(a.as_bytes()),
            "f39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
        assert_eq!(wallet.list().len(), 2);
    }

    #[test]
    fn test_import_rejects_invalid_key() {
        let wallet = SimpleWallet::new();
        let err = wallet.import("0x1234").unwrap_err();
        assert!(matches!(err, DriverError::InvalidKey(_)));
        assert!(wallet.list().is_empty());
    }

    #[test]
    fn test_removed_key_no_longer_signs() {
        let wallet = SimpleWallet::new();
        let address = wallet.import(TEST_PRIVATE_KEY).unwrap();
        let key = wallet.list().remove(0);

        assert!(wallet.remove(&address));
        assert!(wallet.list().is_empty());

        // A handle taken before removal keeps working
        let hash = blake2b256(&[b"late".as_slice()]);
        let signature = tokio_test::block_on(key.sign(&hash)).unwrap();
        assert_eq!(recover(&hash, &signature).unwrap(), address);
    }

    #[test]
    fn test_remove_unknown_address() {
        let wallet = SimpleWallet::new();
        wallet.import(TEST_PRIVATE_KEY).unwrap();
        assert!(!wallet.remove(&Address::repeat_byte(0x01)));
        assert_eq!(wallet.list().len(), 1);
    }

    #[tokio::test]
    async fn test_listed_key_signs() {
        let wallet = SimpleWallet::new();
        let address = wallet.import(TEST_PRIVATE_KEY).unwrap();
        let hash = blake2b256(&[b"hello".as_slice()]);

        let key = wallet.list().remove(0);
        let signature = key.sign(&hash).await.unwrap();
        assert_eq!(signature.len(), 65);
        assert_eq!(recover(&hash, &signature).unwrap(), address);
    }
}
