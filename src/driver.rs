//! Caller-facing driver: transaction building, signing and certificates

use crate::cert::{CertificateSigner, SignCertOptions, SignedCert};
use crate::chain::{head, BlockHeader, HeadState, Net, ThorProvider};
use crate::codec::{CertMessage, Clause, Transaction};
use crate::config::TxParams;
use crate::error::DriverResult;
use crate::tx::{
    sign_transaction, submit, AssembledTx, BuildContext, BuildTxOptions, CommitObserver,
    Delegation, DelegationResponse, TransactionAssembler, TxResponse,
};
use crate::wallet::{self, KeyEntity, Wallet};

use ethers::types::{Address, Bytes, H256};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

type ObserverSlot = Arc<RwLock<Option<CommitObserver>>>;

/// Driver bound to one chain and one wallet
pub struct Driver {
    provider: ThorProvider,
    genesis: BlockHeader,
    head: Arc<HeadState>,
    wallet: Option<Arc<dyn Wallet>>,
    tx_params: RwLock<TxParams>,
    observer: ObserverSlot,
    assembler: TransactionAssembler,
    cert_signer: CertificateSigner,
}

impl Driver {
    /// Fetch genesis and best block from the node and build a driver around them
    pub async fn connect(net: Arc<dyn Net>, wallet: Option<Arc<dyn Wallet>>) -> DriverResult<Self> {
        let genesis = ThorProvider::new(net.clone()).get_block("0").await?;
        let provider = ThorProvider::new(net).with_genesis(genesis.id);
        let best = provider.get_block("best").await?;

        info!(
            "Connected to chain {:?} (tag {:#04x}), head at {}",
            genesis.id,
            genesis.chain_tag(),
            best.number
        );
        Ok(Self::with_provider(provider, genesis, Some(best), wallet))
    }

    /// Build a driver from an already known genesis and head. The head defaults to genesis.
    pub fn new(
        net: Arc<dyn Net>,
        genesis: BlockHeader,
        head: Option<BlockHeader>,
        wallet: Option<Arc<dyn Wallet>>,
    ) -> Self {
        let provider = ThorProvider::new(net).with_genesis(genesis.id);
        Self::with_provider(provider, genesis, head, wallet)
    }

    fn with_provider(
        provider: ThorProvider,
        genesis: BlockHeader,
        head: Option<BlockHeader>,
        wallet: Option<Arc<dyn Wallet>>,
    ) -> Self {
        let head = head.unwrap_or_else(|| genesis.clone());
        Self {
            provider,
            genesis,
            head: Arc::new(HeadState::new(head)),
            wallet,
            tx_params: RwLock::new(TxParams::default()),
            observer: Arc::new(RwLock::new(None)),
            assembler: TransactionAssembler::default(),
            cert_signer: CertificateSigner::default(),
        }
    }

    pub fn provider(&self) -> &ThorProvider {
        &self.provider
    }

    pub fn genesis(&self) -> &BlockHeader {
        &self.genesis
    }

    /// Latest known head
    pub fn head(&self) -> BlockHeader {
        self.head.current()
    }

    /// Feed a head from an external source; returns true when it changed
    pub fn set_head(&self, head: BlockHeader) -> bool {
        self.head.update(head)
    }

    /// Re-fetch the best block from the node
    pub async fn refresh_head(&self) -> DriverResult<BlockHeader> {
        let best = self.provider.get_block("best").await?;
        self.head.update(best.clone());
        Ok(best)
    }

    /// Poll the node for new heads in the background
    pub fn spawn_head_tracker(&self, interval: Duration) -> JoinHandle<()> {
        head::spawn_tracker(self.provider.clone(), self.head.clone(), interval)
    }

    /// Default parameters applied to subsequent builds
    pub fn tx_params(&self) -> TxParams {
        *self.tx_params.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the defaults; builds already in progress keep their snapshot
    pub fn set_tx_params(&self, params: TxParams) {
        *self.tx_params.write().unwrap_or_else(PoisonError::into_inner) = params;
    }

    /// Install or clear the commit observer
    pub fn set_commit_observer(&self, observer: Option<CommitObserver>) {
        *self.observer.write().unwrap_or_else(PoisonError::into_inner) = observer;
    }

    pub fn is_address_owned(&self, address: &Address) -> bool {
        wallet::is_address_owned(self.wallet.as_deref(), address)
    }

    fn resolve_key(&self, signer: Option<Address>) -> DriverResult<KeyEntity> {
        wallet::resolve_key(self.wallet.as_deref(), signer)
    }

    /// Assemble an unsigned transaction for `clauses`.
    ///
    /// The signing key is resolved before anything touches the network.
    pub async fn build_tx(&self, clauses: Vec<Clause>, options: BuildTxOptions) -> DriverResult<BuiltTx> {
        let key = self.resolve_key(options.signer)?;
        let context = BuildContext {
            chain_tag: self.genesis.chain_tag(),
            head: self.head.current(),
            params: self.tx_params(),
        };

        let assembled = self
            .assembler
            .assemble(&self.provider, &context, clauses, key.address, &options)
            .await?;

        Ok(BuiltTx {
            raw: Bytes::from(assembled.delegated.encode()),
            origin: key.address,
            key,
            assembled,
            provider: self.provider.clone(),
            observer: self.observer.clone(),
        })
    }

    /// Sign an off-chain certificate stamped with the current head timestamp
    pub async fn sign_cert(&self, message: CertMessage, options: SignCertOptions) -> DriverResult<SignedCert> {
        let key = self.resolve_key(options.signer)?;
        self.cert_signer
            .sign(message, &key, self.head.current().timestamp)
            .await
    }
}

impl fmt::Debug for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("genesis", &self.genesis.id)
            .field("head", &self.head.current().number)
            .field("tx_params", &self.tx_params())
            .finish()
    }
}

/// An assembled, not yet signed transaction
pub struct BuiltTx {
    /// Unsigned encoding of the delegation-enabled body
    pub raw: Bytes,
    pub origin: Address,
    key: KeyEntity,
    assembled: AssembledTx,
    provider: ThorProvider,
    observer: ObserverSlot,
}

impl BuiltTx {
    /// Body a sponsor is asked to co-sign
    pub fn transaction(&self) -> &Transaction {
        &self.assembled.delegated
    }

    /// Hash a sponsor must sign to pay for this transaction
    pub fn delegator_signing_hash(&self) -> H256 {
        self.assembled.delegated.delegator_signing_hash(&self.origin)
    }

    /// Sign with the origin key, notify the commit observer and submit
    pub async fn sign(&self, delegation: Option<DelegationResponse>) -> DriverResult<TxResponse> {
        self.sign_with(Delegation::from(delegation)).await
    }

    pub async fn sign_with(&self, delegation: Delegation) -> DriverResult<TxResponse> {
        let signed = sign_transaction(&self.key, &self.assembled, delegation).await?;
        let observer = self
            .observer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        submit(&self.provider, observer, signed, self.origin).await
    }
}

impl fmt::Debug for BuiltTx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltTx")
            .field("origin", &self.origin)
            .field("raw_len", &self.raw.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{Method, MockNet};
    use crate::codec::to_hex;
    use crate::error::DriverError;
    use crate::wallet::SimpleWallet;
    use ethers::types::U256;
    use serde_json::json;

    const KEY: &str = "7582be841ca040aa940fff6c05773129e135623e41acce3e0b8ba520dc1ae26a";

    fn block_json(id: [u8; 32], number: u64, timestamp: u64) -> serde_json::Value {
        json!({
            "id": to_hex(&id),
            "number": number,
            "timestamp": timestamp,
            "parentID": to_hex(&[0u8; 32]),
            "txsFeatures": 1,
        })
    }

    fn genesis() -> BlockHeader {
        let mut id = [0u8; 32];
        id[31] = 0x27;
        serde_json::from_value(block_json(id, 0, 1_530_316_800)).unwrap()
    }

    #[tokio::test]
    async fn test_connect_binds_genesis_header() {
        let mut genesis_id = [0u8; 32];
        genesis_id[31] = 0x4a;
        let genesis_hex = to_hex(&genesis_id);

        let mut net = MockNet::new();
        net.expect_http()
            .withf(|method, path, params| {
                *method == Method::Get && path.starts_with("blocks/0") && params.headers.is_empty()
            })
            .times(1)
            .returning(move |_, _, _| Ok(block_json(genesis_id, 0, 1000)));
        net.expect_http()
            .withf(move |method, path, params| {
                *method == Method::Get
                    && path.starts_with("blocks/best")
                    && params.headers == vec![("x-genesis-id".to_string(), genesis_hex.clone())]
            })
            .times(1)
            .returning(|_, _, _| Ok(block_json([0xaa; 32], 12, 2000)));

        let driver = Driver::connect(Arc::new(net), None).await.unwrap();
        assert_eq!(driver.genesis().chain_tag(), 0x4a);
        assert_eq!(driver.head().number, 12);
        assert_eq!(driver.head().timestamp, 2000);
    }

    #[tokio::test]
    async fn test_missing_signer_fails_before_network() {
        let wallet = SimpleWallet::new();
        wallet.import(KEY).unwrap();
        let driver = Driver::new(
            Arc::new(MockNet::new()),
            genesis(),
            None,
            Some(Arc::new(wallet)),
        );

        let err = driver
            .build_tx(
                vec![Clause::transfer(Address::repeat_byte(1), U256::one())],
                BuildTxOptions {
                    signer: Some(Address::repeat_byte(0x42)),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DriverError::SignerNotFound { .. }));
    }

    #[tokio::test]
    async fn test_empty_wallet() {
        let driver = Driver::new(Arc::new(MockNet::new()), genesis(), None, None);
        let err = driver
            .build_tx(Vec::new(), BuildTxOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "empty wallet");
        assert!(!driver.is_address_owned(&Address::zero()));
    }

    #[tokio::test]
    async fn test_tx_params_snapshot_per_build() {
        let wallet = SimpleWallet::new();
        wallet.import(KEY).unwrap();
        let driver = Driver::new(Arc::new(MockNet::new()), genesis(), None, Some(Arc::new(wallet)));

        let options = BuildTxOptions {
            gas: Some(21_000),
            ..Default::default()
        };
        let clauses = vec![Clause::transfer(Address::repeat_byte(1), U256::one())];

        let first = driver.build_tx(clauses.clone(), options.clone()).await.unwrap();
        driver.set_tx_params(TxParams {
            expiration: 100,
            gas_price_coef: 255,
        });
        let second = driver.build_tx(clauses, options).await.unwrap();

        assert_eq!(first.transaction().body.expiration, 18);
        assert_eq!(first.transaction().body.gas_price_coef, 0);
        assert_eq!(second.transaction().body.expiration, 100);
        assert_eq!(second.transaction().body.gas_price_coef, 255);
        assert_eq!(second.transaction().body.chain_tag, 0x27);
    }

    #[tokio::test]
    async fn test_sign_cert_uses_head_timestamp() {
        let wallet = SimpleWallet::new();
        let address = wallet.import(KEY).unwrap();
        let driver = Driver::new(Arc::new(MockNet::new()), genesis(), None, Some(Arc::new(wallet)));
        driver.set_head(BlockHeader {
            id: H256::repeat_byte(0xbb),
            number: 5,
            timestamp: 1_700_000_000,
            parent_id: H256::zero(),
            txs_features: 1,
        });

        let message = CertMessage {
            purpose: "agreement".to_string(),
            payload: crate::codec::CertPayload {
                kind: "text".to_string(),
                content: "terms".to_string(),
            },
        };
        let signed = driver
            .sign_cert(message.clone(), SignCertOptions::default())
            .await
            .unwrap();
        assert_eq!(signed.annex.timestamp, 1_700_000_000);
        assert_eq!(signed.annex.signer, address);
        signed.certificate(message).verify().unwrap();
    }
}
