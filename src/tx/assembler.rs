//! Transaction body assembly from caller intent and the live chain head

use super::gas::GasEstimator;
use crate::chain::{BlockHeader, ThorProvider};
use crate::codec::{intrinsic_gas, Clause, Reserved, Transaction, TxBody, DELEGATION_FEATURE};
use crate::config::TxParams;
use crate::error::{DriverError, DriverResult};

use ethers::types::{Address, H256};
use tracing::debug;

/// Per-call build options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildTxOptions {
    /// Signing key address; the first wallet key when absent
    pub signer: Option<Address>,
    /// Explicit gas limit; estimated when absent or zero
    pub gas: Option<u64>,
    pub depends_on: Option<H256>,
}

/// Chain state and defaults captured at the start of a build
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub chain_tag: u8,
    pub head: BlockHeader,
    pub params: TxParams,
}

/// The two bodies produced by one build. They share every field except the
/// reserved feature bits, so their signing hashes differ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledTx {
    /// Delegation feature bit set
    pub delegated: Transaction,
    /// Used when delegation is not requested, declined or failed
    pub plain: Transaction,
}

/// Builds unsigned transaction bodies
#[derive(Debug, Clone, Default)]
pub struct TransactionAssembler {
    gas_estimator: GasEstimator,
}

impl TransactionAssembler {
    pub fn new(gas_estimator: GasEstimator) -> Self {
        Self { gas_estimator }
    }

    /// Assemble both bodies for `clauses` signed by `origin`
    pub async fn assemble(
        &self,
        provider: &ThorProvider,
        context: &BuildContext,
        clauses: Vec<Clause>,
        origin: Address,
        options: &BuildTxOptions,
    ) -> DriverResult<AssembledTx> {
        let intrinsic = intrinsic_gas(&clauses);
        let gas = match options.gas.filter(|g| *g > 0) {
            Some(gas) if gas < intrinsic => {
                return Err(DriverError::GasBelowIntrinsic { gas, intrinsic });
            }
            Some(gas) => gas,
            None => {
                let estimated = self
                    .gas_estimator
                    .estimate(provider, &clauses, origin, context.head.id)
                    .await?;
                crate::metrics::record_gas_estimated(estimated);
                estimated
            }
        };

        let plain_body = TxBody {
            chain_tag: context.chain_tag,
            block_ref: context.head.block_ref(),
            expiration: context.params.expiration,
            clauses,
            gas_price_coef: context.params.gas_price_coef,
            gas,
            depends_on: options.depends_on,
            nonce: rand::random::<u64>(),
            reserved: Reserved::default(),
        };
        let delegated_body = plain_body.with_features(DELEGATION_FEATURE);

        debug!(
            "Assembled tx: chain_tag={:#04x} block_ref={:#018x} gas={} nonce={:#018x}",
            plain_body.chain_tag, plain_body.block_ref, plain_body.gas, plain_body.nonce
        );
        crate::metrics::record_tx_built();

        Ok(AssembledTx {
            delegated: Transaction::new(delegated_body),
            plain: Transaction::new(plain_body),
        })
    }
}
