//! Thor driver - transaction assembly, fee-delegated signing and submission
//!
//! Builds transactions against the latest known chain head, signs them with
//! wallet keys (optionally co-signed by a fee sponsor), notifies a commit
//! observer and submits them to a node. Also signs off-chain certificates.

pub mod cert;
pub mod chain;
pub mod codec;
pub mod config;
pub mod driver;
pub mod error;
pub mod metrics;
pub mod tx;
pub mod wallet;

pub use cert::{CertificateSigner, SignCertOptions, SignedCert};
pub use chain::{BlockHeader, HttpNet, HttpParams, Method, Net};
pub use codec::{CertMessage, CertPayload, Clause};
pub use config::{Settings, TxParams};
pub use driver::{BuiltTx, Driver};
pub use error::{DriverError, DriverResult};
pub use tx::{BuildTxOptions, CommitObserver, Delegation, DelegationResponse, TxObject, TxResponse};
pub use wallet::{KeyEntity, KeySigner, SimpleWallet, Wallet};
